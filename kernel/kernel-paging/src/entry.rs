use bitfield_struct::bitfield;
use kernel_memory_addresses::Frame;

/// A 32-bit paging entry, shared between directory and table level.
///
/// Both levels use the same layout: three architectural flag bits at the
/// bottom and a 20-bit frame number at the top. At directory level the frame
/// is the page *table* frame; at table level it is the mapped data frame.
///
/// ```text
///  31                     12 11      3  2   1   0
/// ┌─────────────────────────┬─────────┬───┬───┬───┐
/// │     frame number        │ ignored │U/S│R/W│ P │
/// └─────────────────────────┴─────────┴───┴───┴───┘
/// ```
///
/// Bits 3–11 (PWT, PCD, accessed, dirty, …) are left zero; this kernel does
/// not use them.
#[bitfield(u32)]
#[derive(PartialEq, Eq)]
pub struct PageEntryBits {
    /// Bit 0 — P: translation through this entry is valid.
    pub present: bool,

    /// Bit 1 — R/W: writable (subject to CR0.WP for supervisor accesses).
    pub writable: bool,

    /// Bit 2 — U/S: accessible from user mode.
    pub user_access: bool,

    /// Bits 3–11 — unused by this kernel.
    #[bits(9, default = 0)]
    _ignored: u16,

    /// Bits 12–31 — frame number (physical address >> 12).
    #[bits(20)]
    frame_number: u32,
}

impl PageEntryBits {
    /// The frame this entry points at.
    #[must_use]
    pub const fn frame(&self) -> Frame {
        Frame::new(self.frame_number())
    }

    /// Builder-style frame assignment.
    #[must_use]
    pub const fn with_frame(self, frame: Frame) -> Self {
        self.with_frame_number(frame.number())
    }

    /// Point this entry at `frame` in place.
    pub const fn set_frame(&mut self, frame: Frame) {
        self.set_frame_number(frame.number());
    }

    /// A present, writable, supervisor-only mapping of `frame`.
    #[must_use]
    pub const fn present_rw(frame: Frame) -> Self {
        Self::new().with_present(true).with_writable(true).with_frame(frame)
    }

    /// The "no mapping yet" state: writable but not present.
    ///
    /// Used for untouched directory slots and for table slots after
    /// [`free_page`](crate::AddressSpace::free_page).
    #[must_use]
    pub const fn absent_writable() -> Self {
        Self::new().with_writable(true)
    }

    /// The fill value for a freshly allocated page table: user-accessible,
    /// read-only, not present.
    #[must_use]
    pub const fn absent_user() -> Self {
        Self::new().with_user_access(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_matches_architecture() {
        let e = PageEntryBits::present_rw(Frame::new(0x7_1234));
        assert_eq!(e.into_bits(), 0x7123_4003);
        assert!(e.present());
        assert!(e.writable());
        assert!(!e.user_access());
        assert_eq!(e.frame(), Frame::new(0x7_1234));
    }

    #[test]
    fn absent_states() {
        assert_eq!(PageEntryBits::absent_writable().into_bits(), 0x2);
        assert_eq!(PageEntryBits::absent_user().into_bits(), 0x4);
        assert!(!PageEntryBits::absent_writable().present());
        assert!(!PageEntryBits::absent_user().present());
    }

    #[test]
    fn frame_update_preserves_flags() {
        let mut e = PageEntryBits::present_rw(Frame::new(1));
        e.set_frame(Frame::new(0xF_FFFF));
        assert!(e.present() && e.writable());
        assert_eq!(e.frame().number(), 0xF_FFFF);
    }
}
