//! # Typed x86 (32-bit) Control Registers
//!
//! Register *images* are plain bitfield values that can be built and
//! inspected anywhere, including hosted tests. Actual register access is
//! behind the `asm` feature and only compiles for `target_arch = "x86"`;
//! everything above this crate reaches the hardware through the paging
//! crate's `Mmu` seam instead of touching these primitives directly.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

pub mod cr0;
pub mod cr2;
pub mod cr3;

pub use cr0::Cr0;
pub use cr2::Cr2;
pub use cr3::Cr3;

pub trait LoadRegisterUnsafe {
    /// # Safety
    /// The caller must uphold the implementation-specific safety requirements.
    /// Control-register access is privileged and requires kernel mode (Ring 0).
    unsafe fn load_unsafe() -> Self;
}

pub trait StoreRegisterUnsafe {
    /// # Safety
    /// The caller must uphold the implementation-specific safety requirements.
    /// Control-register access is privileged and requires kernel mode (Ring 0).
    unsafe fn store_unsafe(self);
}
