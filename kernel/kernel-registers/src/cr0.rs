use bitfield_struct::bitfield;

/// Architectural model of CR0 in 32-bit protected mode.
///
/// Only the bits this kernel manipulates are named; everything else is kept
/// reserved and forced to 0 on write. The one that matters here is
/// [`paging`](Cr0::paging): setting it (with a valid directory base in CR3)
/// turns address translation on.
#[bitfield(u32)]
pub struct Cr0 {
    /// Bit 0 — Protection Enable (PE).
    ///
    /// - 0: Real mode (no paging, no protection).
    /// - 1: Protected mode (required before paging can be enabled).
    pub protection_enable: bool,

    /// Bits 1–15 — Coprocessor/task bits this kernel never touches.
    #[bits(15, default = 0)]
    _reserved_1_15: u16,

    /// Bit 16 — Write Protect (WP).
    ///
    /// When set, supervisor code must respect read-only pages.
    pub write_protect: bool,

    /// Bits 17–30 — Reserved (must be 0).
    #[bits(14, default = 0)]
    _reserved_17_30: u16,

    /// Bit 31 — Paging (PG).
    ///
    /// When set, linear addresses go through the page directory referenced by
    /// CR3. Requires `protection_enable` to be set.
    pub paging: bool,
}

#[cfg(all(feature = "asm", target_arch = "x86"))]
impl crate::LoadRegisterUnsafe for Cr0 {
    unsafe fn load_unsafe() -> Self {
        let mut cr0: u32;
        unsafe {
            core::arch::asm!("mov {}, cr0", out(reg) cr0, options(nomem, nostack, preserves_flags));
        }
        Self::from_bits(cr0)
    }
}

#[cfg(all(feature = "asm", target_arch = "x86"))]
impl crate::StoreRegisterUnsafe for Cr0 {
    unsafe fn store_unsafe(self) {
        let cr0 = self.into_bits();
        unsafe {
            core::arch::asm!("mov cr0, {}", in(reg) cr0, options(nostack, preserves_flags));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paging_is_bit_31() {
        let cr0 = Cr0::new().with_protection_enable(true).with_paging(true);
        assert_eq!(cr0.into_bits(), 0x8000_0001);
    }
}
