//! Recursive directory mapping.
//!
//! The last directory slot points back at the directory frame itself. That
//! single trick makes all paging structures reachable through fixed virtual
//! windows once paging is on, without any dedicated mapping area:
//!
//! * A 2-level walk that takes the recursive slot *twice* lands on the
//!   directory frame: [`DIRECTORY_WINDOW`] (`0xFFFF_F000`).
//! * A walk that takes it *once* and then slot `d` lands on the page table
//!   frame for directory slot `d`: [`table_window`]`(d)` inside the top
//!   4 MiB (`0xFFC0_0000..`).
//!
//! The price is that the top 4 MiB of the virtual space are reserved for the
//! windows and must never be handed out by a VM pool.

use crate::table::DirectoryIndex;
use kernel_memory_addresses::VirtualAddress;

/// The directory slot that maps the directory onto itself.
pub const RECURSIVE_SLOT: DirectoryIndex = DirectoryIndex::new(1023);

/// Start of the 4 MiB window region (`RECURSIVE_SLOT << 22`).
pub const WINDOW_BASE: VirtualAddress = VirtualAddress::new(0xFFC0_0000);

/// Virtual address at which the page directory is visible through the
/// recursive mapping.
pub const DIRECTORY_WINDOW: VirtualAddress = VirtualAddress::new(0xFFFF_F000);

/// Virtual address at which the page table for directory slot `index` is
/// visible through the recursive mapping.
#[must_use]
pub const fn table_window(index: DirectoryIndex) -> VirtualAddress {
    VirtualAddress::new(WINDOW_BASE.as_u32() | (index.as_u32() << 12))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::{TableIndex, split_indices};

    #[test]
    fn window_addresses() {
        assert_eq!(table_window(DirectoryIndex::new(0)).as_u32(), 0xFFC0_0000);
        assert_eq!(table_window(DirectoryIndex::new(1)).as_u32(), 0xFFC0_1000);
        assert_eq!(table_window(RECURSIVE_SLOT), DIRECTORY_WINDOW);
    }

    #[test]
    fn windows_translate_through_the_recursive_slot() {
        // A table window walks the recursive slot once, then slot `d`.
        let (dir, table) = split_indices(table_window(DirectoryIndex::new(42)));
        assert_eq!(dir, RECURSIVE_SLOT);
        assert_eq!(table, TableIndex::new(42));

        // The directory window walks it twice.
        let (dir, table) = split_indices(DIRECTORY_WINDOW);
        assert_eq!(dir, RECURSIVE_SLOT);
        assert_eq!(table, TableIndex::new(1023));
    }
}
