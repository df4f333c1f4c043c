//! The process-wide fault-handling target.
//!
//! The page-fault exception fires with nothing but CR2 and an error code in
//! hand, so the exception stub needs one well-known place to find the active
//! address space. [`AddressSpace::load`](crate::AddressSpace::load) publishes
//! it here; [`dispatch`] is what the stub calls.

use crate::address_space::FaultSink;
use crate::fault::PageFault;
use kernel_sync::SpinLock;

static ACTIVE: SpinLock<Option<&'static dyn FaultSink>> = SpinLock::new(None);

/// Publish `space` as the target for subsequent page faults.
pub fn set_active(space: &'static dyn FaultSink) {
    *ACTIVE.lock() = Some(space);
}

/// The currently published fault target, if any.
#[must_use]
pub fn active() -> Option<&'static dyn FaultSink> {
    *ACTIVE.lock()
}

/// Forward `fault` to the active address space.
///
/// # Panics
/// A fault before any space was loaded is unrecoverable.
pub fn dispatch(fault: PageFault) {
    // Copy the reference out so the lock is not held while handling.
    let Some(space) = active() else {
        panic!("page fault {fault:?} with no active address space");
    };
    space.handle_fault(fault);
}
