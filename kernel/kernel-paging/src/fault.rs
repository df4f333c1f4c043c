use bitfield_struct::bitfield;
use core::fmt;
use kernel_memory_addresses::VirtualAddress;

/// Page-fault error code as pushed by the CPU (exception 14).
#[bitfield(u32)]
#[derive(PartialEq, Eq)]
pub struct FaultError {
    /// Bit 0 — P: `false` means the fault was caused by a non-present
    /// translation; `true` means a protection violation on a present one.
    pub protection_violation: bool,

    /// Bit 1 — W/R: the faulting access was a write.
    pub caused_by_write: bool,

    /// Bit 2 — U/S: the access originated in user mode.
    pub user_mode: bool,

    #[bits(29, default = 0)]
    _reserved: u32,
}

impl FaultError {
    /// A fault on a translation that is simply not present yet.
    ///
    /// This is the only fault cause the demand pager resolves.
    #[must_use]
    pub const fn is_not_present(&self) -> bool {
        !self.protection_violation()
    }
}

/// A page fault: the faulting address (CR2) plus the pushed error code.
#[derive(Copy, Clone, Eq, PartialEq)]
pub struct PageFault {
    pub address: VirtualAddress,
    pub error: FaultError,
}

impl PageFault {
    #[must_use]
    pub const fn new(address: VirtualAddress, error: FaultError) -> Self {
        Self { address, error }
    }

    /// A not-present read fault at `address`, the common demand-paging case.
    #[must_use]
    pub const fn not_present(address: VirtualAddress) -> Self {
        Self::new(address, FaultError::new())
    }
}

impl fmt::Debug for PageFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "PageFault({}, {}, {}, {})",
            self.address,
            if self.error.protection_violation() { "protection" } else { "not-present" },
            if self.error.caused_by_write() { "write" } else { "read" },
            if self.error.user_mode() { "user" } else { "supervisor" },
        )
    }
}
