//! # QEMU Development and Debug Support
//!
//! Routes kernel output to QEMU's debug console so the virtual-memory and
//! scheduler crates can use the standard [`log`] macros long before any real
//! console driver exists.
//!
//! ## Mechanism
//!
//! QEMU's `-debugcon` option captures byte writes to I/O port `0x402` and
//! forwards them to the host (stdio, file, or socket):
//!
//! ```text
//! log::debug! / qemu_trace!  →  QemuSink (fmt::Write)  →  out 0x402  →  host
//! ```
//!
//! Two entry points are provided:
//!
//! * [`QemuLogger`] — a `log::Log` implementation installed once during
//!   bring-up; everything after that uses `log::{trace,debug,info,warn}`.
//! * [`qemu_trace!`] — direct, formatter-only output for the earliest boot
//!   path and for fault diagnostics that must not re-enter the logger.
//!
//! The consumer is the kernel image's boot path, which installs the logger
//! before enabling paging; the library crates in this workspace only talk to
//! the `log` facade and never depend on this crate directly. Hosted tests
//! install no logger at all (emitting here would execute a privileged `out`
//! instruction on the host).
//!
//! With the `enabled` feature turned off every operation compiles to a
//! no-op, so release images carry no port I/O. Output is best-effort and
//! unbuffered; there is nothing to flush.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

mod logger;

pub use logger::QemuLogger;

#[cfg(feature = "enabled")]
#[doc(hidden)]
pub mod qemu_fmt {
    use core::fmt::{self, Write};

    /// The port number for QEMU's debug port.
    const QEMU_DEBUG_PORT: u16 = 0x402;

    /// Write a single byte to QEMU's debug port.
    #[allow(clippy::inline_always)]
    #[inline(always)]
    pub fn dbg_putc(c: u8) {
        unsafe { outb(QEMU_DEBUG_PORT, c) }
    }

    #[allow(clippy::inline_always)]
    #[inline(always)]
    unsafe fn outb(port: u16, val: u8) {
        #[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
        unsafe {
            core::arch::asm!(
            "out dx, al",
            in("dx") port,
            in("al") val,
            options(nomem, preserves_flags)
            );
        }
        #[cfg(not(any(target_arch = "x86", target_arch = "x86_64")))]
        let _ = (port, val);
    }

    pub struct QemuSink;

    impl Write for QemuSink {
        #[inline]
        fn write_str(&mut self, s: &str) -> fmt::Result {
            for b in s.bytes() {
                dbg_putc(b);
            }
            Ok(())
        }

        #[inline]
        fn write_char(&mut self, c: char) -> fmt::Result {
            // UTF-8 encode without allocation.
            let mut buf = [0u8; 4];
            let s = c.encode_utf8(&mut buf);
            self.write_str(s)
        }
    }

    #[doc(hidden)]
    #[inline(always)]
    #[allow(clippy::inline_always)]
    pub fn qemu_write(args: fmt::Arguments) {
        // Ignore errors; this is best-effort debug output.
        let _ = fmt::write(&mut QemuSink, args);
    }
}

#[cfg(not(feature = "enabled"))]
#[doc(hidden)]
pub mod qemu_fmt {
    use core::fmt;
    #[doc(hidden)]
    #[inline(always)]
    pub fn qemu_write(_: fmt::Arguments) {
        // no-op when feature disabled
    }
}

#[macro_export]
macro_rules! qemu_trace {
    ($($arg:tt)*) => {{
        // No allocation: `format_args!` builds a lightweight `Arguments`.
        $crate::qemu_fmt::qemu_write(core::format_args!($($arg)*));
    }};
}
