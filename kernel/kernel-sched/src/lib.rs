//! # Cooperative Round-Robin Scheduling
//!
//! A FIFO scheduler for cooperatively yielding execution contexts, with one
//! twist: a registered blocking device ([`WaitSource`]) gets priority. When
//! a context yields and the device has become ready while a context is
//! parked on it, that parked context runs next, ahead of the whole ready
//! queue. Everything else is strict round-robin.
//!
//! The scheduler moves *references*: contexts live wherever the kernel put
//! them, and [`ContextSwitch`] performs the actual stack switch. Nothing
//! here preempts — control changes hands only inside
//! [`Scheduler::yield_now`].

#![cfg_attr(not(any(test, doctest)), no_std)]

extern crate alloc;

mod queue;
mod scheduler;

pub use queue::ReadyQueue;
pub use scheduler::{ContextSwitch, Scheduler, WaitSource};

use core::fmt;

/// Identity of an execution context, used to find it in the ready queue.
#[repr(transparent)]
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct ContextId(u32);

impl ContextId {
    #[must_use]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    #[must_use]
    pub const fn as_u32(self) -> u32 {
        self.0
    }
}

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "context {}", self.0)
    }
}

/// A schedulable unit: something with an identity and a resumable stack.
///
/// The scheduler never inspects a context beyond its [`id`](Self::id); the
/// registered [`ContextSwitch`] knows how to actually run one.
pub trait ExecutionContext {
    fn id(&self) -> ContextId;
}
