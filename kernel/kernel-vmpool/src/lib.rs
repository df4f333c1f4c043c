//! # Virtual Memory Pools
//!
//! Region-granular allocation of *virtual* memory on top of the demand
//! pager. A [`VmPool`] owns a contiguous span of an address space and hands
//! out page-multiple regions from it; no physical frame moves until the
//! first touch of a region faults the page in.
//!
//! ## Division of Labor
//!
//! ```text
//! VmPool::allocate   →  bump pointer, region table entry   (no frames)
//! first touch        →  page fault → AddressSpace maps a frame
//! VmPool::release    →  AddressSpace::free_page per page, table compaction
//! ```
//!
//! Registration with the address space is coarse by contract: the fault
//! handler asks only whether an address lies inside the pool's span, not
//! whether it lies inside an allocated region. A stray access between
//! regions of a pool is therefore mapped rather than rejected; the trade
//! keeps the fault path free of region-table walks.

#![cfg_attr(not(any(test, doctest)), no_std)]

use kernel_memory_addresses::{PAGE_SIZE, VirtualAddress, align_up};
use kernel_paging::{AddressSpace, FrameAlloc, Mmu, PoolRegistryFull, PoolSpan};
use kernel_sync::SpinLock;

/// Maximum live regions per pool.
pub const MAX_REGIONS: usize = 64;

/// One allocated region: page-aligned base and page-multiple size.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
struct Region {
    base: VirtualAddress,
    size: u32,
}

struct RegionTable {
    regions: [Region; MAX_REGIONS],
    len: usize,
}

impl RegionTable {
    const fn new() -> Self {
        const EMPTY: Region = Region { base: VirtualAddress::zero(), size: 0 };
        Self { regions: [EMPTY; MAX_REGIONS], len: 0 }
    }

    /// End of the last region, i.e. the next free address.
    fn frontier(&self, default: VirtualAddress) -> VirtualAddress {
        if self.len == 0 {
            default
        } else {
            let last = self.regions[self.len - 1];
            last.base + last.size
        }
    }

    fn push(&mut self, region: Region) {
        assert!(self.len < MAX_REGIONS, "virtual memory pool region table full");
        self.regions[self.len] = region;
        self.len += 1;
    }

    /// Remove the region starting at `base`, keeping the table compact.
    fn remove(&mut self, base: VirtualAddress) -> Region {
        let Some(index) = self.regions[..self.len].iter().position(|r| r.base == base) else {
            panic!("release of unknown region at {base}");
        };
        let region = self.regions[index];
        // Shift the tail down one slot.
        for i in index..self.len - 1 {
            self.regions[i] = self.regions[i + 1];
        }
        self.len -= 1;
        region
    }
}

/// A bump allocator over a span of virtual addresses.
///
/// Construction registers the span with the address space so that faults
/// inside it are legitimate. The first page of the span is never handed
/// out; a returned [`VirtualAddress::zero`] therefore unambiguously means
/// "allocation refused".
pub struct VmPool<'m, M, A> {
    base: VirtualAddress,
    size: u32,
    space: &'m AddressSpace<'m, M, A>,
    regions: SpinLock<RegionTable>,
}

impl<'m, M: Mmu, A: FrameAlloc> VmPool<'m, M, A> {
    /// Create a pool over `base..base + size` and register it with `space`.
    ///
    /// `base` must be page-aligned and the span must not reach into the
    /// recursive-window region at the top of the address space.
    ///
    /// # Errors
    /// [`PoolRegistryFull`] if `space` already watches its maximum number
    /// of pools; faults in this span would then be fatal.
    pub fn new(
        base: VirtualAddress,
        size: u32,
        space: &'m AddressSpace<'m, M, A>,
    ) -> Result<Self, PoolRegistryFull> {
        debug_assert_eq!(base.page_offset(), 0, "pool base must be page-aligned");
        debug_assert!(
            base.as_u32().checked_add(size).is_some_and(|end| end <= kernel_paging::recursive::WINDOW_BASE.as_u32()),
            "pool span must stay below the recursive windows"
        );
        space.register_pool(PoolSpan::new(base, size))?;
        log::debug!("virtual memory pool at {base}, {size} bytes");
        Ok(Self { base, size, space, regions: SpinLock::new(RegionTable::new()) })
    }

    /// Allocate a region of at least `size` bytes, rounded up to whole
    /// pages. Returns [`VirtualAddress::zero`] for a zero-size request.
    ///
    /// No memory is mapped here; pages materialize on first touch.
    ///
    /// # Panics
    /// Panics when the region table is full ([`MAX_REGIONS`] live regions)
    /// or when the region would extend past the pool's span — handing out
    /// addresses the pool never registered would either halt at fault time
    /// or bleed into a neighboring pool.
    pub fn allocate(&self, size: u32) -> VirtualAddress {
        if size == 0 {
            log::warn!("refusing zero-size allocation");
            return VirtualAddress::zero();
        }
        let bytes = align_up(size, PAGE_SIZE);
        self.regions.with_lock(|table| {
            // The pool's first page stays reserved.
            let start = table.frontier(self.base + PAGE_SIZE);
            let end = start.as_u32().checked_add(bytes);
            assert!(
                end.is_some_and(|end| end <= self.base.as_u32() + self.size),
                "pool exhausted: no room for {bytes} bytes at {start}"
            );
            table.push(Region { base: start, size: bytes });
            log::trace!("allocated region at {start}, {bytes} bytes");
            start
        })
    }

    /// Release the region starting at `start`: free every page it covers
    /// and drop it from the region table.
    ///
    /// # Panics
    /// Panics if `start` is not the base of a live region.
    pub fn release(&self, start: VirtualAddress) {
        let region = self.regions.with_lock(|table| table.remove(start));
        for page in 0..region.size / PAGE_SIZE {
            self.space.free_page((region.base + page * PAGE_SIZE).page_number());
        }
        // Freed translations may still be cached.
        self.space.reload();
        log::trace!("released region at {start}, {} bytes", region.size);
    }

    /// Whether `address` falls inside this pool's span.
    ///
    /// Deliberately span-coarse, matching what the fault handler checks;
    /// addresses between regions still count as legitimate.
    #[must_use]
    pub const fn is_legitimate(&self, address: VirtualAddress) -> bool {
        address.as_u32().wrapping_sub(self.base.as_u32()) < self.size
    }

    /// The pool's page-aligned base address.
    #[must_use]
    pub const fn base(&self) -> VirtualAddress {
        self.base
    }

    /// The pool's span in bytes.
    #[must_use]
    pub const fn size(&self) -> u32 {
        self.size
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kernel_paging::emulated::{BumpFrameAlloc, EmulatedMmu};
    use kernel_paging::{PageFault, init_paging};

    const SHARED_4M: u32 = 4 * 1024 * 1024;
    const POOL_BASE: VirtualAddress = VirtualAddress::new(0x0040_0000);
    const POOL_SIZE: u32 = 64 * PAGE_SIZE;

    struct Fixture {
        mmu: EmulatedMmu,
        alloc: BumpFrameAlloc,
    }

    impl Fixture {
        fn new() -> Self {
            init_paging(SHARED_4M);
            Self { mmu: EmulatedMmu::new(), alloc: BumpFrameAlloc::new(0, 64) }
        }

        fn space(&self) -> AddressSpace<'_, EmulatedMmu, BumpFrameAlloc> {
            let space = AddressSpace::new(&self.mmu, &self.alloc);
            self.mmu.set_directory_base(space.directory_frame());
            space
        }
    }

    #[test]
    fn first_page_is_reserved() {
        let f = Fixture::new();
        let space = f.space();
        let pool = VmPool::new(POOL_BASE, POOL_SIZE, &space).unwrap();

        let first = pool.allocate(1);
        assert_eq!(first, POOL_BASE + PAGE_SIZE);
    }

    #[test]
    fn allocations_are_page_rounded_and_contiguous() {
        let f = Fixture::new();
        let space = f.space();
        let pool = VmPool::new(POOL_BASE, POOL_SIZE, &space).unwrap();

        let a = pool.allocate(1);
        let b = pool.allocate(PAGE_SIZE + 1);
        let c = pool.allocate(PAGE_SIZE);
        assert_eq!(b, a + PAGE_SIZE, "one byte still occupies a page");
        assert_eq!(c, b + 2 * PAGE_SIZE, "rounded to two pages");
    }

    #[test]
    fn allocation_maps_nothing_until_touched() {
        let f = Fixture::new();
        let space = f.space();
        let pool = VmPool::new(POOL_BASE, POOL_SIZE, &space).unwrap();

        let frames_before = f.alloc.allocated();
        let region = pool.allocate(4 * PAGE_SIZE);
        assert_eq!(f.alloc.allocated(), frames_before, "allocation is lazy");
        assert_eq!(f.mmu.resolve(region), None);

        // First touch faults the page in.
        space.handle_fault(PageFault::not_present(region));
        assert!(f.mmu.resolve(region).is_some());
    }

    #[test]
    fn zero_size_allocation_is_refused() {
        let f = Fixture::new();
        let space = f.space();
        let pool = VmPool::new(POOL_BASE, POOL_SIZE, &space).unwrap();

        assert!(pool.allocate(0).is_zero());
        // The refusal does not consume address space.
        assert_eq!(pool.allocate(1), POOL_BASE + PAGE_SIZE);
    }

    #[test]
    fn release_frees_every_touched_page() {
        let f = Fixture::new();
        let space = f.space();
        let pool = VmPool::new(POOL_BASE, POOL_SIZE, &space).unwrap();

        let region = pool.allocate(3 * PAGE_SIZE);
        space.handle_fault(PageFault::not_present(region));
        space.handle_fault(PageFault::not_present(region + 2 * PAGE_SIZE));
        assert_eq!(f.alloc.released().len(), 0);

        pool.release(region);
        assert_eq!(f.alloc.released().len(), 2, "both touched pages freed");
        assert_eq!(f.mmu.resolve(region), None);
        assert_eq!(f.mmu.resolve(region + 2 * PAGE_SIZE), None);
    }

    #[test]
    fn release_compacts_and_reuses_the_frontier() {
        let f = Fixture::new();
        let space = f.space();
        let pool = VmPool::new(POOL_BASE, POOL_SIZE, &space).unwrap();

        let a = pool.allocate(PAGE_SIZE);
        let b = pool.allocate(PAGE_SIZE);
        pool.release(b);

        // With the last region gone the frontier moves back.
        let c = pool.allocate(PAGE_SIZE);
        assert_eq!(c, b);

        // Releasing an inner region keeps later regions intact.
        pool.release(a);
        let d = pool.allocate(PAGE_SIZE);
        assert_eq!(d, c + PAGE_SIZE);
    }

    #[test]
    #[should_panic(expected = "pool exhausted")]
    fn allocation_past_the_pool_end_is_fatal() {
        let f = Fixture::new();
        let space = f.space();
        // Four pages total; one is the reserved first page.
        let pool = VmPool::new(POOL_BASE, 4 * PAGE_SIZE, &space).unwrap();

        let _ = pool.allocate(4 * PAGE_SIZE);
    }

    #[test]
    #[should_panic(expected = "region table full")]
    fn region_table_overflow_is_fatal() {
        let f = Fixture::new();
        let space = f.space();
        // Large enough span that the table, not the pool, is the limit.
        let pool = VmPool::new(POOL_BASE, 128 * PAGE_SIZE, &space).unwrap();

        for _ in 0..MAX_REGIONS {
            let _ = pool.allocate(PAGE_SIZE);
        }
        let _ = pool.allocate(PAGE_SIZE);
    }

    #[test]
    #[should_panic(expected = "release of unknown region")]
    fn release_of_unknown_region_is_fatal() {
        let f = Fixture::new();
        let space = f.space();
        let pool = VmPool::new(POOL_BASE, POOL_SIZE, &space).unwrap();

        let region = pool.allocate(PAGE_SIZE);
        pool.release(region + PAGE_SIZE);
    }

    #[test]
    fn legitimacy_is_span_coarse() {
        let f = Fixture::new();
        let space = f.space();
        let pool = VmPool::new(POOL_BASE, POOL_SIZE, &space).unwrap();

        // Nothing allocated yet, the whole span still answers yes.
        assert!(pool.is_legitimate(POOL_BASE));
        assert!(pool.is_legitimate(POOL_BASE + (POOL_SIZE - 1)));
        assert!(!pool.is_legitimate(POOL_BASE + POOL_SIZE));
        assert!(!pool.is_legitimate(VirtualAddress::new(POOL_BASE.as_u32() - 1)));
    }
}
