use crate::table::{DirectoryIndex, PageDirectory, PageTable};
use kernel_memory_addresses::Frame;

/// Hardware seam for everything the paging code cannot express in safe Rust:
/// raw frame access, the recursive windows, and the control registers.
///
/// The production implementation ([`X86Mmu`], `asm` feature) talks to CR0/CR3
/// and dereferences the window addresses directly. Hosted tests substitute a
/// software MMU that emulates physical memory and resolves the windows by
/// performing the same two-level walk the hardware would.
pub trait Mmu {
    /// Access `frame` as a `T` through its *physical* address.
    ///
    /// Only meaningful while translation is off (or identity-mapped), which
    /// is why [`AddressSpace::new`](crate::AddressSpace::new) is the sole
    /// caller: it builds directory and first table before paging is enabled.
    ///
    /// # Safety
    /// `frame` must be backed by RAM, not aliased as a different type, and
    /// reachable under the current translation state. `T` must be 4 KiB or
    /// smaller and satisfied by the frame's alignment.
    unsafe fn frame_mut<'a, T>(&self, frame: Frame) -> &'a mut T;

    /// The page directory of the active space, via
    /// [`DIRECTORY_WINDOW`](crate::recursive::DIRECTORY_WINDOW).
    ///
    /// # Safety
    /// The active directory's slot [`RECURSIVE_SLOT`](crate::recursive::RECURSIVE_SLOT)
    /// must map the directory onto itself; the returned reference must not
    /// outlive a directory switch.
    unsafe fn directory_window<'a>(&self) -> &'a mut PageDirectory;

    /// The page table serving directory slot `index`, via
    /// [`table_window`](crate::recursive::table_window).
    ///
    /// # Safety
    /// As for [`directory_window`](Self::directory_window); additionally the
    /// directory entry at `index` must be present.
    unsafe fn table_window<'a>(&self, index: DirectoryIndex) -> &'a mut PageTable;

    /// Point translation at the directory in `frame` (write CR3).
    ///
    /// As a side effect this discards all cached translations.
    fn set_directory_base(&self, frame: Frame);

    /// The directory frame translation currently uses (read CR3).
    fn directory_base(&self) -> Frame;

    /// Turn translation on (set CR0.PG). CR3 must already be loaded.
    fn enable_paging(&self);

    /// Discard all cached translations by rewriting CR3 with its own value.
    fn flush_tlb(&self) {
        self.set_directory_base(self.directory_base());
    }
}

/// The real MMU: control registers via inline asm, windows via raw pointers.
#[cfg(all(feature = "asm", target_arch = "x86"))]
pub struct X86Mmu;

#[cfg(all(feature = "asm", target_arch = "x86"))]
impl Mmu for X86Mmu {
    unsafe fn frame_mut<'a, T>(&self, frame: Frame) -> &'a mut T {
        // SAFETY: caller guarantees the frame is identity-reachable.
        unsafe { &mut *(frame.base().as_u32() as *mut T) }
    }

    unsafe fn directory_window<'a>(&self) -> &'a mut PageDirectory {
        // SAFETY: caller guarantees the recursive slot is installed.
        unsafe { &mut *(crate::recursive::DIRECTORY_WINDOW.as_u32() as *mut PageDirectory) }
    }

    unsafe fn table_window<'a>(&self, index: DirectoryIndex) -> &'a mut PageTable {
        // SAFETY: caller guarantees the directory entry is present.
        unsafe { &mut *(crate::recursive::table_window(index).as_u32() as *mut PageTable) }
    }

    fn set_directory_base(&self, frame: Frame) {
        use kernel_registers::{Cr3, StoreRegisterUnsafe};
        // SAFETY: the directory in `frame` is fully initialized by
        // `AddressSpace::new` before it is ever loaded.
        unsafe { Cr3::from_directory_frame(frame).store_unsafe() }
    }

    fn directory_base(&self) -> Frame {
        use kernel_registers::{Cr3, LoadRegisterUnsafe};
        // SAFETY: reading CR3 has no side effects.
        unsafe { Cr3::load_unsafe() }.directory_frame()
    }

    fn enable_paging(&self) {
        use kernel_registers::{Cr0, LoadRegisterUnsafe, StoreRegisterUnsafe};
        // SAFETY: CR3 points at a valid directory (debug-asserted by the
        // caller); identity-mapped code keeps executing across the switch.
        unsafe {
            let cr0 = Cr0::load_unsafe().with_paging(true).with_write_protect(true);
            cr0.store_unsafe();
        }
    }
}
