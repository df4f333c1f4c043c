//! # Kernel synchronization primitives
//!
//! The subsystem runs on a single hardware thread with cooperative
//! scheduling, so these locks are uncontended in practice; they exist so the
//! shared structures (ready queues, pool registries, the active-table cell)
//! can expose `&self` APIs with interior mutability instead of threading
//! `&mut` borrows through every caller.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

mod spin_lock;
mod sync_once_cell;

pub use spin_lock::{SpinLock, SpinLockGuard};
pub use sync_once_cell::SyncOnceCell;
