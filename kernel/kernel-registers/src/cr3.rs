use bitfield_struct::bitfield;
use kernel_memory_addresses::{Frame, PhysicalAddress};

/// CR3 — Page-Directory Base Register.
///
/// Holds the physical base address of the page directory and cache-control
/// flags for directory walks. The base must be 4 KiB-aligned; writing CR3
/// also flushes all non-global TLB entries, which is how this kernel performs
/// its full TLB flush.
#[bitfield(u32)]
pub struct Cr3 {
    /// Bits 0–2 — Reserved (must be 0).
    #[bits(3, default = 0)]
    _reserved0: u8,

    /// Bit 3 — PWT: Page-level Write-Through for directory accesses.
    pub pwt: bool,

    /// Bit 4 — PCD: Page-level Cache Disable for directory accesses.
    pub pcd: bool,

    /// Bits 5–11 — Reserved (must be 0 when written).
    #[bits(7, default = 0)]
    _reserved1: u8,

    /// Bits 12–31 — physical directory base >> 12.
    ///
    /// To get the full physical address: `directory_base = bits << 12`.
    #[bits(20)]
    directory_base_4k: u32,
}

impl Cr3 {
    /// Create a `Cr3` value pointing at the directory in `frame`.
    #[must_use]
    pub const fn from_directory_frame(frame: Frame) -> Self {
        Self::new().with_directory_base_4k(frame.number())
    }

    /// The frame holding the page directory.
    #[must_use]
    pub const fn directory_frame(&self) -> Frame {
        Frame::new(self.directory_base_4k())
    }

    /// Full physical address of the directory base.
    #[must_use]
    pub const fn directory_phys(&self) -> PhysicalAddress {
        self.directory_frame().base()
    }
}

#[cfg(all(feature = "asm", target_arch = "x86"))]
impl crate::LoadRegisterUnsafe for Cr3 {
    unsafe fn load_unsafe() -> Self {
        let mut cr3: u32;
        unsafe {
            core::arch::asm!("mov {}, cr3", out(reg) cr3, options(nomem, nostack, preserves_flags));
        }
        Self::from_bits(cr3)
    }
}

#[cfg(all(feature = "asm", target_arch = "x86"))]
impl crate::StoreRegisterUnsafe for Cr3 {
    unsafe fn store_unsafe(self) {
        let cr3 = self.into_bits();
        unsafe {
            core::arch::asm!("mov cr3, {}", in(reg) cr3, options(nostack, preserves_flags));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directory_base_round_trip() {
        let cr3 = Cr3::from_directory_frame(Frame::new(0x123));
        assert_eq!(cr3.into_bits(), 0x0012_3000);
        assert_eq!(cr3.directory_frame(), Frame::new(0x123));
        assert_eq!(cr3.directory_phys().as_u32(), 0x0012_3000);
    }

    #[test]
    fn flags_do_not_disturb_base() {
        let cr3 = Cr3::from_directory_frame(Frame::new(1)).with_pwt(true).with_pcd(true);
        assert_eq!(cr3.directory_frame(), Frame::new(1));
        assert_eq!(cr3.into_bits() & 0x18, 0x18);
    }
}
