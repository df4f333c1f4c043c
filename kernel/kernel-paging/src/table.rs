use crate::entry::PageEntryBits;
use kernel_memory_addresses::VirtualAddress;

/// Entries per directory or table (one 4 KiB frame of 32-bit entries).
pub const ENTRY_COUNT: usize = 1024;

/// Index into the page directory (virtual address bits 22–31).
#[repr(transparent)]
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug)]
pub struct DirectoryIndex(u16);

impl DirectoryIndex {
    /// # Panics
    /// Debug builds panic if `index` is not below [`ENTRY_COUNT`].
    #[must_use]
    pub const fn new(index: u16) -> Self {
        debug_assert!((index as usize) < ENTRY_COUNT);
        Self(index)
    }

    /// The directory slot translating `address`.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn of(address: VirtualAddress) -> Self {
        Self((address.as_u32() >> 22) as u16)
    }

    #[must_use]
    pub const fn as_u32(self) -> u32 {
        self.0 as u32
    }

    #[must_use]
    pub const fn as_usize(self) -> usize {
        self.0 as usize
    }
}

/// Index into a page table (virtual address bits 12–21).
#[repr(transparent)]
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug)]
pub struct TableIndex(u16);

impl TableIndex {
    /// # Panics
    /// Debug builds panic if `index` is not below [`ENTRY_COUNT`].
    #[must_use]
    pub const fn new(index: u16) -> Self {
        debug_assert!((index as usize) < ENTRY_COUNT);
        Self(index)
    }

    /// The table slot translating `address`.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn of(address: VirtualAddress) -> Self {
        Self(((address.as_u32() >> 12) & 0x3FF) as u16)
    }

    #[must_use]
    pub const fn as_u32(self) -> u32 {
        self.0 as u32
    }

    #[must_use]
    pub const fn as_usize(self) -> usize {
        self.0 as usize
    }
}

/// Split a virtual address into its two translation indices.
///
/// The in-page offset (low 12 bits) is not part of translation and is
/// dropped here.
#[must_use]
pub const fn split_indices(address: VirtualAddress) -> (DirectoryIndex, TableIndex) {
    (DirectoryIndex::of(address), TableIndex::of(address))
}

/// The top-level translation structure: 1024 directory entries in one frame.
#[repr(C, align(4096))]
pub struct PageDirectory {
    entries: [PageEntryBits; ENTRY_COUNT],
}

impl PageDirectory {
    #[must_use]
    pub const fn get(&self, index: DirectoryIndex) -> PageEntryBits {
        self.entries[index.as_usize()]
    }

    pub const fn set(&mut self, index: DirectoryIndex, entry: PageEntryBits) {
        self.entries[index.as_usize()] = entry;
    }
}

/// A second-level page table: 1024 page entries in one frame.
#[repr(C, align(4096))]
pub struct PageTable {
    entries: [PageEntryBits; ENTRY_COUNT],
}

impl PageTable {
    #[must_use]
    pub const fn get(&self, index: TableIndex) -> PageEntryBits {
        self.entries[index.as_usize()]
    }

    pub const fn set(&mut self, index: TableIndex, entry: PageEntryBits) {
        self.entries[index.as_usize()] = entry;
    }

    /// Set every entry of the table to `entry`.
    pub fn fill(&mut self, entry: PageEntryBits) {
        self.entries = [entry; ENTRY_COUNT];
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_extraction() {
        // 0b_1000000000_0111111111_000000000000
        let va = VirtualAddress::new(0x801F_F000);
        let (dir, table) = split_indices(va);
        assert_eq!(dir, DirectoryIndex::new(0x200));
        assert_eq!(table, TableIndex::new(0x1FF));
    }

    #[test]
    fn offset_does_not_affect_indices() {
        let a = split_indices(VirtualAddress::new(0x1234_5000));
        let b = split_indices(VirtualAddress::new(0x1234_5FFF));
        assert_eq!(a, b);
    }

    #[test]
    fn extremes() {
        assert_eq!(
            split_indices(VirtualAddress::zero()),
            (DirectoryIndex::new(0), TableIndex::new(0))
        );
        assert_eq!(
            split_indices(VirtualAddress::new(0xFFFF_FFFF)),
            (DirectoryIndex::new(1023), TableIndex::new(1023))
        );
    }

    #[test]
    fn structures_are_frame_sized() {
        assert_eq!(core::mem::size_of::<PageDirectory>(), 4096);
        assert_eq!(core::mem::size_of::<PageTable>(), 4096);
        assert_eq!(core::mem::align_of::<PageDirectory>(), 4096);
    }
}
