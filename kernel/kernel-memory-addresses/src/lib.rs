//! # Virtual and Physical Memory Address Types
//!
//! Strongly typed wrappers for the raw 32-bit addresses and frame numbers used
//! by the paging and memory-management crates.
//!
//! ## Overview
//!
//! This crate prevents mixing virtual and physical addresses at compile time
//! while remaining a zero-cost wrapper around `u32` values:
//!
//! | Type | Meaning |
//! |------|---------|
//! | [`VirtualAddress`] | An address subject to page-table translation. |
//! | [`PhysicalAddress`] | An address in the flat physical space (RAM/MMIO). |
//! | [`Frame`] | A physical frame *number* (physical address >> 12). |
//!
//! The architecture has a single page size, so unlike multi-level designs
//! there is no page-size marker type: everything is 4 KiB
//! ([`PAGE_SIZE`] / [`PAGE_SHIFT`]).
//!
//! ## Typical Usage
//!
//! ```rust
//! # use kernel_memory_addresses::*;
//! let va = VirtualAddress::new(0x8040_1234);
//! assert_eq!(va.page_base().as_u32(), 0x8040_1000);
//! assert_eq!(va.page_offset(), 0x234);
//! assert_eq!(va.page_number(), 0x8_0401);
//!
//! let frame = Frame::new(0x42);
//! assert_eq!(frame.base().as_u32(), 0x42_000);
//! assert_eq!(Frame::containing(frame.base()), frame);
//! ```
//!
//! All conversions are `const fn` and free in release builds. The types are
//! `#[repr(transparent)]` and implement `Copy`, `Eq`, `Ord`, and `Hash`.

#![cfg_attr(not(any(test, doctest)), no_std)]

use core::fmt;
use core::ops::{Add, AddAssign};

/// Size of one page / physical frame in bytes.
pub const PAGE_SIZE: u32 = 4096;

/// log2([`PAGE_SIZE`]): number of low address bits forming the in-page offset.
pub const PAGE_SHIFT: u32 = 12;

/// Align `x` down to the previous multiple of `a` (`a` a power of two).
#[inline]
#[must_use]
pub const fn align_down(x: u32, a: u32) -> u32 {
    x & !(a - 1)
}

/// Align `x` up to the next multiple of `a` (`a` a power of two).
///
/// `x + (a - 1)` must not overflow `u32`; debug builds panic on overflow.
#[inline]
#[must_use]
pub const fn align_up(x: u32, a: u32) -> u32 {
    (x + a - 1) & !(a - 1)
}

/// Virtual memory address.
///
/// Carries the *kind* of address at the type level; no canonicality or
/// alignment is validated at runtime.
#[repr(transparent)]
#[derive(Copy, Clone, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct VirtualAddress(u32);

impl VirtualAddress {
    #[inline]
    #[must_use]
    pub const fn new(v: u32) -> Self {
        Self(v)
    }

    #[inline]
    #[must_use]
    pub const fn zero() -> Self {
        Self(0)
    }

    #[inline]
    #[must_use]
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    #[inline]
    #[must_use]
    pub const fn as_u32(self) -> u32 {
        self.0
    }

    /// Base of the 4 KiB page containing this address (low 12 bits zeroed).
    #[inline]
    #[must_use]
    pub const fn page_base(self) -> Self {
        Self(align_down(self.0, PAGE_SIZE))
    }

    /// In-page offset (low 12 bits).
    #[inline]
    #[must_use]
    pub const fn page_offset(self) -> u32 {
        self.0 & (PAGE_SIZE - 1)
    }

    /// Virtual page number (address >> 12).
    #[inline]
    #[must_use]
    pub const fn page_number(self) -> u32 {
        self.0 >> PAGE_SHIFT
    }

    /// Address of the page with the given virtual page number.
    #[inline]
    #[must_use]
    pub const fn from_page_number(vpn: u32) -> Self {
        Self(vpn << PAGE_SHIFT)
    }
}

impl fmt::Debug for VirtualAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VA(0x{:08X})", self.0)
    }
}

impl fmt::Display for VirtualAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08X}", self.0)
    }
}

impl Add<u32> for VirtualAddress {
    type Output = Self;
    #[inline]
    fn add(self, rhs: u32) -> Self::Output {
        Self(self.0 + rhs)
    }
}

impl AddAssign<u32> for VirtualAddress {
    #[inline]
    fn add_assign(&mut self, rhs: u32) {
        self.0 += rhs;
    }
}

impl From<u32> for VirtualAddress {
    #[inline]
    fn from(v: u32) -> Self {
        Self::new(v)
    }
}

/// Physical memory address.
///
/// Like [`VirtualAddress`], a thin wrapper that carries intent and prevents
/// accidental VA/PA mix-ups.
#[repr(transparent)]
#[derive(Copy, Clone, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct PhysicalAddress(u32);

impl PhysicalAddress {
    #[inline]
    #[must_use]
    pub const fn new(v: u32) -> Self {
        Self(v)
    }

    #[inline]
    #[must_use]
    pub const fn as_u32(self) -> u32 {
        self.0
    }

    /// Base of the 4 KiB frame containing this address.
    #[inline]
    #[must_use]
    pub const fn frame_base(self) -> Self {
        Self(align_down(self.0, PAGE_SIZE))
    }

    /// In-frame offset (low 12 bits).
    #[inline]
    #[must_use]
    pub const fn frame_offset(self) -> u32 {
        self.0 & (PAGE_SIZE - 1)
    }
}

impl fmt::Debug for PhysicalAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PA(0x{:08X})", self.0)
    }
}

impl fmt::Display for PhysicalAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08X}", self.0)
    }
}

impl Add<u32> for PhysicalAddress {
    type Output = Self;
    #[inline]
    fn add(self, rhs: u32) -> Self::Output {
        Self(self.0 + rhs)
    }
}

impl AddAssign<u32> for PhysicalAddress {
    #[inline]
    fn add_assign(&mut self, rhs: u32) {
        self.0 += rhs;
    }
}

impl From<u32> for PhysicalAddress {
    #[inline]
    fn from(v: u32) -> Self {
        Self::new(v)
    }
}

/// A physical frame number.
///
/// Frame pools hand out and take back frames by number; page-table entries
/// store the same number in their upper 20 bits. [`Frame::base`] converts to
/// the 4 KiB-aligned [`PhysicalAddress`] of the frame.
#[repr(transparent)]
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Frame(u32);

impl Frame {
    #[inline]
    #[must_use]
    pub const fn new(number: u32) -> Self {
        Self(number)
    }

    /// Frame containing `pa` (drops the in-frame offset).
    #[inline]
    #[must_use]
    pub const fn containing(pa: PhysicalAddress) -> Self {
        Self(pa.as_u32() >> PAGE_SHIFT)
    }

    #[inline]
    #[must_use]
    pub const fn number(self) -> u32 {
        self.0
    }

    /// Physical base address of this frame (always 4 KiB-aligned).
    #[inline]
    #[must_use]
    pub const fn base(self) -> PhysicalAddress {
        PhysicalAddress::new(self.0 << PAGE_SHIFT)
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Frame({:#X})", self.0)
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "frame {:#X}", self.0)
    }
}
