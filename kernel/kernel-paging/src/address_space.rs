use crate::FrameAlloc;
use crate::entry::PageEntryBits;
use crate::fault::PageFault;
use crate::mmu::Mmu;
use crate::recursive::RECURSIVE_SLOT;
use crate::table::{DirectoryIndex, ENTRY_COUNT, PageDirectory, PageTable, TableIndex, split_indices};
use kernel_memory_addresses::{Frame, PAGE_SIZE, VirtualAddress};
use kernel_sync::{SpinLock, SyncOnceCell};

/// Process-wide paging parameters, set once during bring-up.
#[derive(Copy, Clone, Debug)]
pub struct PagingConfig {
    /// Bytes of low memory identity-mapped into every address space. Must
    /// fit a single page table (at most 4 MiB).
    pub shared_region_size: u32,
}

static CONFIG: SyncOnceCell<PagingConfig> = SyncOnceCell::new();

/// Record the paging parameters. First call wins; later calls return the
/// configuration already in effect.
///
/// Must run before the first [`AddressSpace::new`].
pub fn init_paging(shared_region_size: u32) -> &'static PagingConfig {
    CONFIG.get_or_init(|| PagingConfig { shared_region_size })
}

/// Maximum number of VM pools one address space will watch.
pub const MAX_POOLS: usize = 8;

/// The virtual span managed by one VM pool.
///
/// Fault validation is deliberately coarse: an address anywhere inside the
/// span is considered legitimate, whether or not a region has been allocated
/// there. The pools own the fine-grained bookkeeping.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub struct PoolSpan {
    base: VirtualAddress,
    size: u32,
}

impl PoolSpan {
    #[must_use]
    pub const fn new(base: VirtualAddress, size: u32) -> Self {
        Self { base, size }
    }

    #[must_use]
    pub const fn base(self) -> VirtualAddress {
        self.base
    }

    #[must_use]
    pub const fn size(self) -> u32 {
        self.size
    }

    /// Whether `address` falls inside the span.
    #[must_use]
    pub const fn contains(self, address: VirtualAddress) -> bool {
        // Wrapping subtraction keeps this a single comparison and is safe
        // near the top of the address space.
        address.as_u32().wrapping_sub(self.base.as_u32()) < self.size
    }
}

/// The registry of pool spans is full; the pool will not be watched.
#[derive(Debug, Eq, PartialEq, thiserror::Error)]
#[error("address space already watches {MAX_POOLS} pools")]
pub struct PoolRegistryFull;

struct PoolRegistry {
    spans: [Option<PoolSpan>; MAX_POOLS],
}

impl PoolRegistry {
    const fn new() -> Self {
        Self { spans: [None; MAX_POOLS] }
    }

    fn insert(&mut self, span: PoolSpan) -> Result<(), PoolRegistryFull> {
        for slot in &mut self.spans {
            if slot.is_none() {
                *slot = Some(span);
                return Ok(());
            }
        }
        Err(PoolRegistryFull)
    }

    fn claims(&self, address: VirtualAddress) -> bool {
        self.spans.iter().flatten().any(|span| span.contains(address))
    }
}

/// Anything that can resolve a page fault; implemented by [`AddressSpace`]
/// and consumed by [`current`](crate::current) for the exception path.
pub trait FaultSink: Sync {
    /// Resolve `fault` or panic if it cannot be legitimate.
    fn handle_fault(&self, fault: PageFault);
}

/// One demand-paged address space: a page directory, a recursive self-map,
/// and an identity-mapped shared region, with all further pages materialized
/// lazily by the fault handler.
///
/// All methods take `&self`; the registry of watched pools sits behind a
/// [`SpinLock`]. Accesses to the paging structures themselves go through the
/// recursive windows and therefore require this space to be the loaded one.
pub struct AddressSpace<'m, M, A> {
    mmu: &'m M,
    alloc: &'m A,
    directory: Frame,
    pools: SpinLock<PoolRegistry>,
}

impl<'m, M: Mmu, A: FrameAlloc> AddressSpace<'m, M, A> {
    /// Build a fresh address space.
    ///
    /// Allocates two frames: the directory and the first page table. The
    /// first table identity-maps the shared region present+writable; every
    /// other directory slot starts writable-but-absent; the last directory
    /// slot is the recursive self-map.
    ///
    /// Runs with translation off (or identity-mapped), writing both frames
    /// through their physical addresses.
    ///
    /// # Panics
    /// Panics if [`init_paging`] has not run, if the shared region exceeds
    /// one page table, or if the frame allocator is exhausted.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn new(mmu: &'m M, alloc: &'m A) -> Self {
        let config = CONFIG
            .get()
            .unwrap_or_else(|| panic!("init_paging must run before creating an address space"));
        let shared_pages = config.shared_region_size.div_ceil(PAGE_SIZE) as usize;
        assert!(
            shared_pages <= ENTRY_COUNT,
            "shared region of {} bytes exceeds one page table",
            config.shared_region_size
        );

        let directory_frame = Self::fresh_frame_in(alloc);
        let table_frame = Self::fresh_frame_in(alloc);

        // SAFETY: fresh frame, written through its physical address before
        // translation can be pointed at it.
        let table: &mut PageTable = unsafe { mmu.frame_mut(table_frame) };
        table.fill(PageEntryBits::absent_writable());
        for page in 0..shared_pages {
            table.set(
                TableIndex::new(page as u16),
                PageEntryBits::present_rw(Frame::new(page as u32)),
            );
        }

        // SAFETY: as above.
        let directory: &mut PageDirectory = unsafe { mmu.frame_mut(directory_frame) };
        directory.set(DirectoryIndex::new(0), PageEntryBits::present_rw(table_frame));
        for slot in 1..ENTRY_COUNT as u16 {
            directory.set(DirectoryIndex::new(slot), PageEntryBits::absent_writable());
        }
        // Self-map last: everything above overwrote slot 1023 as absent.
        directory.set(RECURSIVE_SLOT, PageEntryBits::present_rw(directory_frame));

        log::debug!("created address space, directory in {directory_frame}");
        Self {
            mmu,
            alloc,
            directory: directory_frame,
            pools: SpinLock::new(PoolRegistry::new()),
        }
    }

    /// The frame holding this space's page directory.
    #[must_use]
    pub const fn directory_frame(&self) -> Frame {
        self.directory
    }

    /// Make this the active address space: point CR3 at the directory and
    /// publish this space as the fault-handling target.
    ///
    /// Takes `&'static self` because the exception path may consult the
    /// space at any later time.
    pub fn load(&'static self)
    where
        M: Sync,
        A: Sync,
    {
        self.mmu.set_directory_base(self.directory);
        crate::current::set_active(self);
        log::trace!("loaded address space with directory in {}", self.directory);
    }

    /// Turn translation on. [`load`](Self::load) (or an equivalent CR3
    /// write) must have happened first.
    pub fn enable_paging(&self) {
        debug_assert_eq!(
            self.mmu.directory_base(),
            self.directory,
            "address space must be loaded before enabling paging"
        );
        self.mmu.enable_paging();
        log::info!("paging enabled, directory in {}", self.directory);
    }

    /// Watch `span` so that faults inside it are considered legitimate.
    ///
    /// # Errors
    /// [`PoolRegistryFull`] if [`MAX_POOLS`] pools are already watched; the
    /// pool's addresses will then fail fault validation.
    pub fn register_pool(&self, span: PoolSpan) -> Result<(), PoolRegistryFull> {
        let result = self.pools.with_lock(|pools| pools.insert(span));
        match &result {
            Ok(()) => log::debug!("watching pool at {} ({} bytes)", span.base(), span.size()),
            Err(e) => log::warn!("cannot watch pool at {}: {e}", span.base()),
        }
        result
    }

    /// Resolve a not-present fault by materializing the missing mapping.
    ///
    /// Requires this space to be the loaded one, since all structure access
    /// goes through the recursive windows.
    ///
    /// # Panics
    /// Panics if the faulting address lies outside every watched pool (a
    /// stray access, unrecoverable at this layer) or if the frame allocator
    /// is exhausted.
    pub fn handle_fault(&self, fault: PageFault) {
        if !fault.error.is_not_present() {
            // Protection violations are not demand-paging work.
            log::warn!("ignoring {fault:?}");
            return;
        }

        let address = fault.address;
        let legitimate = self.pools.with_lock(|pools| pools.claims(address));
        assert!(legitimate, "page fault at {address} outside every registered pool");

        let (dir_index, table_index) = split_indices(address);

        // SAFETY: this space is loaded and its recursive slot installed.
        let directory = unsafe { self.mmu.directory_window() };
        if !directory.get(dir_index).present() {
            let table_frame = self.fresh_frame();
            directory.set(dir_index, PageEntryBits::present_rw(table_frame));
            // SAFETY: the directory entry was made present just above.
            let table = unsafe { self.mmu.table_window(dir_index) };
            table.fill(PageEntryBits::absent_user());
            log::trace!(
                "installed page table in {table_frame} for directory slot {}",
                dir_index.as_u32()
            );
        }

        let frame = self.fresh_frame();
        // SAFETY: the directory entry is present (checked or just installed).
        let table = unsafe { self.mmu.table_window(dir_index) };
        table.set(table_index, PageEntryBits::present_rw(frame));
        log::trace!("mapped page {} to {frame}", address.page_base());
    }

    /// Unmap the page with virtual page number `page_number` and return its
    /// frame to the allocator. The entry reverts to writable-but-absent and
    /// the TLB is flushed in full.
    pub fn free_page(&self, page_number: u32) {
        let address = VirtualAddress::from_page_number(page_number);
        let (dir_index, table_index) = split_indices(address);

        // SAFETY: this space is loaded; pages are only freed below present
        // directory entries (they were mapped through them).
        let table = unsafe { self.mmu.table_window(dir_index) };
        let entry = table.get(table_index);
        if !entry.present() {
            log::warn!("free of unmapped page {address}");
            return;
        }

        self.alloc.release_frame(entry.frame());
        table.set(table_index, PageEntryBits::absent_writable());
        // No per-page invalidation in this design; reload CR3 instead.
        self.mmu.flush_tlb();
    }

    /// Reload CR3 with this space's directory, discarding all cached
    /// translations.
    pub fn reload(&self) {
        self.mmu.set_directory_base(self.directory);
    }

    fn fresh_frame(&self) -> Frame {
        Self::fresh_frame_in(self.alloc)
    }

    fn fresh_frame_in(alloc: &A) -> Frame {
        let Some(frame) = alloc.allocate_frame() else {
            panic!("physical frame pool exhausted");
        };
        frame
    }
}

impl<M: Mmu + Sync, A: FrameAlloc + Sync> FaultSink for AddressSpace<'_, M, A> {
    fn handle_fault(&self, fault: PageFault) {
        Self::handle_fault(self, fault);
    }
}
