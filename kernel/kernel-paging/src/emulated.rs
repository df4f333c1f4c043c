//! Deterministic software MMU for hosted tests.
//!
//! [`EmulatedMmu`] models a small bank of physical frames plus the CR0/CR3
//! state the paging code manipulates. The recursive windows are *not*
//! shortcuts onto stored pointers: every window access re-reads CR3 and
//! walks the emulated directory exactly as the hardware would, so a broken
//! self-map fails tests instead of being papered over.

use crate::FrameAlloc;
use crate::mmu::Mmu;
use crate::recursive::RECURSIVE_SLOT;
use crate::table::{DirectoryIndex, PageDirectory, PageTable, split_indices};
use core::cell::UnsafeCell;
use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use kernel_memory_addresses::{Frame, PhysicalAddress, VirtualAddress};
use kernel_sync::SpinLock;

/// Frames of emulated RAM (256 KiB).
pub const RAM_FRAMES: u32 = 64;

#[repr(C, align(4096))]
struct RawFrame([u8; 4096]);

/// In-memory MMU: frame bank, CR3, paging flag, and a flush counter.
pub struct EmulatedMmu {
    ram: Box<[UnsafeCell<RawFrame>]>,
    cr3: AtomicU32,
    paging: AtomicBool,
    flushes: AtomicU32,
}

// Safety: tests drive each instance from a single thread; the `FaultSink`
// bound merely requires the type to be shareable.
unsafe impl Sync for EmulatedMmu {}

impl Default for EmulatedMmu {
    fn default() -> Self {
        Self::new()
    }
}

impl EmulatedMmu {
    #[must_use]
    pub fn new() -> Self {
        let ram = (0..RAM_FRAMES)
            .map(|_| UnsafeCell::new(RawFrame([0; 4096])))
            .collect();
        Self {
            ram,
            cr3: AtomicU32::new(0),
            paging: AtomicBool::new(false),
            flushes: AtomicU32::new(0),
        }
    }

    /// Number of CR3 writes so far (each one is a full TLB flush).
    #[must_use]
    pub fn flush_count(&self) -> u32 {
        self.flushes.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn paging_enabled(&self) -> bool {
        self.paging.load(Ordering::SeqCst)
    }

    /// Translate `address` by walking the loaded directory, as the hardware
    /// would. `None` if either level is not present.
    #[must_use]
    pub fn resolve(&self, address: VirtualAddress) -> Option<PhysicalAddress> {
        let (dir_index, table_index) = split_indices(address);
        // SAFETY: emulated frames are plain memory.
        let directory: &PageDirectory = unsafe { self.frame_mut(self.directory_base()) };
        let dir_entry = directory.get(dir_index);
        if !dir_entry.present() {
            return None;
        }
        // SAFETY: as above.
        let table: &PageTable = unsafe { self.frame_mut(dir_entry.frame()) };
        let entry = table.get(table_index);
        entry
            .present()
            .then(|| entry.frame().base() + address.page_offset())
    }

    fn frame_ptr(&self, frame: Frame) -> *mut u8 {
        let index = frame.number() as usize;
        assert!(index < self.ram.len(), "{frame} outside emulated RAM");
        self.ram[index].get().cast()
    }
}

impl Mmu for EmulatedMmu {
    unsafe fn frame_mut<'a, T>(&self, frame: Frame) -> &'a mut T {
        assert!(size_of::<T>() <= 4096, "type does not fit one frame");
        // SAFETY: the frame bank is 4 KiB-aligned plain memory; aliasing
        // discipline is the caller's contract, as on hardware.
        unsafe { &mut *self.frame_ptr(frame).cast::<T>() }
    }

    unsafe fn directory_window<'a>(&self) -> &'a mut PageDirectory {
        let directory_frame = self.directory_base();
        // SAFETY: emulated frames are plain memory.
        let directory: &PageDirectory = unsafe { self.frame_mut(directory_frame) };
        let recursive = directory.get(RECURSIVE_SLOT);
        assert!(recursive.present(), "recursive directory slot not present");
        assert_eq!(
            recursive.frame(),
            directory_frame,
            "recursive slot must map the directory onto itself"
        );
        // SAFETY: as above; the walk just proved this is the directory.
        unsafe { self.frame_mut(recursive.frame()) }
    }

    unsafe fn table_window<'a>(&self, index: DirectoryIndex) -> &'a mut PageTable {
        // SAFETY: forwarded caller contract.
        let directory = unsafe { self.directory_window() };
        let entry = directory.get(index);
        assert!(
            entry.present(),
            "table window for non-present directory slot {}",
            index.as_u32()
        );
        // SAFETY: emulated frames are plain memory.
        unsafe { self.frame_mut(entry.frame()) }
    }

    fn set_directory_base(&self, frame: Frame) {
        self.cr3.store(frame.number(), Ordering::SeqCst);
        self.flushes.fetch_add(1, Ordering::SeqCst);
    }

    fn directory_base(&self) -> Frame {
        Frame::new(self.cr3.load(Ordering::SeqCst))
    }

    fn enable_paging(&self) {
        self.paging.store(true, Ordering::SeqCst);
    }
}

/// Monotonic frame allocator with a release log, mirroring how tests hand
/// emulated RAM to the paging code.
pub struct BumpFrameAlloc {
    first: u32,
    end: u32,
    next: AtomicU32,
    released: SpinLock<Vec<Frame>>,
}

impl BumpFrameAlloc {
    /// Hand out frames `first..end`.
    #[must_use]
    pub const fn new(first: u32, end: u32) -> Self {
        Self {
            first,
            end,
            next: AtomicU32::new(first),
            released: SpinLock::new(Vec::new()),
        }
    }

    /// Frames handed out so far.
    #[must_use]
    pub fn allocated(&self) -> u32 {
        self.next.load(Ordering::SeqCst).min(self.end) - self.first
    }

    /// Frames given back, in release order.
    #[must_use]
    pub fn released(&self) -> Vec<Frame> {
        self.released.lock().clone()
    }
}

impl FrameAlloc for BumpFrameAlloc {
    fn allocate_frame(&self) -> Option<Frame> {
        let number = self.next.fetch_add(1, Ordering::SeqCst);
        (number < self.end).then(|| Frame::new(number))
    }

    fn release_frame(&self, frame: Frame) {
        self.released.lock().push(frame);
    }
}
