//! # Demand-Paged Two-Level Address Translation
//!
//! Page directory, page tables, and the fault-driven mapping logic for a
//! 32-bit address space with 4 KiB pages.
//!
//! ## Translation Model
//!
//! A virtual address splits 10/10/12:
//!
//! ```text
//!  31          22 21          12 11           0
//! ┌──────────────┬──────────────┬──────────────┐
//! │ directory idx│  table idx   │ page offset  │
//! └──────────────┴──────────────┴──────────────┘
//!        │              │
//!        │              └── selects one of 1024 entries in a page table
//!        └── selects one of 1024 entries in the page directory
//! ```
//!
//! Each [`AddressSpace`] owns one directory frame. The first directory slot
//! points at a table that identity-maps the shared low region (kernel code
//! and data); the last slot maps the directory onto itself (the recursive
//! self-map, see [`recursive`]); everything in between starts absent and is
//! materialized on demand by [`AddressSpace::handle_fault`].
//!
//! ## Seams
//!
//! Two traits isolate the code from the machine:
//!
//! * [`Mmu`] — raw frame access, the recursive windows, and CR0/CR3. The
//!   `asm` feature provides the real implementation; the `emulated` feature
//!   (and this crate's own tests) provide a software model.
//! * [`FrameAlloc`] — the physical frame pool the space draws from.
//!
//! Faults reach the active space through the [`current`] module, which holds
//! the one process-wide reference the exception stub consults.

#![cfg_attr(not(any(test, doctest, feature = "emulated")), no_std)]
#![allow(unsafe_code)]

mod address_space;
pub mod current;
#[cfg(any(test, feature = "emulated"))]
pub mod emulated;
mod entry;
mod fault;
mod mmu;
pub mod recursive;
mod table;

pub use address_space::{
    AddressSpace, FaultSink, MAX_POOLS, PagingConfig, PoolRegistryFull, PoolSpan, init_paging,
};
pub use entry::PageEntryBits;
pub use fault::{FaultError, PageFault};
pub use mmu::Mmu;
#[cfg(all(feature = "asm", target_arch = "x86"))]
pub use mmu::X86Mmu;
pub use table::{
    DirectoryIndex, ENTRY_COUNT, PageDirectory, PageTable, TableIndex, split_indices,
};

use kernel_memory_addresses::Frame;

/// A pool of physical frames the paging code can draw from.
///
/// Implementations hand out whole 4 KiB frames by number and take them back
/// on [`release_frame`](Self::release_frame). Methods take `&self`; pools
/// are shared between the address space and its VM pools.
pub trait FrameAlloc {
    /// Allocate one frame, or `None` if the pool is exhausted.
    fn allocate_frame(&self) -> Option<Frame>;

    /// Return a frame previously handed out by this pool.
    fn release_frame(&self, frame: Frame);
}
