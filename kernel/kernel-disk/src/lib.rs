//! # Blocking Disk Access
//!
//! [`BlockingDisk`] wraps a raw block [`DiskDevice`] so that a context
//! issuing I/O gives up the CPU instead of busy-polling the controller.
//!
//! ## Protocol
//!
//! A context that finds the device busy parks itself on the disk's own wait
//! queue and yields. The scheduler polls the disk (through the
//! [`WaitSource`] registration) on every subsequent yield; once the device
//! reports ready, the longest-waiting context is dispatched ahead of the
//! whole ready queue and finishes its transfer.
//!
//! Nobody actively wakes the waiters: progress depends on *other* contexts
//! yielding. A system where everyone blocks on the disk at once stalls
//! until the scheduler runs again for any reason.

#![cfg_attr(not(any(test, doctest)), no_std)]

use kernel_sched::{ContextSwitch, ExecutionContext, ReadyQueue, Scheduler, WaitSource};
use kernel_sync::SpinLock;

/// Bytes per disk block.
pub const BLOCK_SIZE: usize = 512;

/// One disk block worth of data.
pub type Block = [u8; BLOCK_SIZE];

/// A raw block device: readiness plus whole-block transfers.
///
/// Implementations issue the actual controller commands; completion is
/// signalled solely through [`is_ready`](Self::is_ready).
pub trait DiskDevice {
    /// Whether the device can accept or complete a transfer right now.
    fn is_ready(&self) -> bool;

    /// Transfer block `block` into `buffer`. The device must be ready.
    fn read_block(&self, block: u32, buffer: &mut Block);

    /// Transfer `buffer` to block `block`. The device must be ready.
    fn write_block(&self, block: u32, buffer: &Block);
}

/// A [`DiskDevice`] wrapper that parks contexts while the device is busy.
///
/// Register it with the scheduler
/// ([`Scheduler::register_blocking_device`]) so parked contexts get
/// priority dispatch once the device is ready.
pub struct BlockingDisk<'t, D> {
    device: D,
    waiters: SpinLock<ReadyQueue<'t>>,
}

impl<'t, D: DiskDevice> BlockingDisk<'t, D> {
    #[must_use]
    pub const fn new(device: D) -> Self {
        Self {
            device,
            waiters: SpinLock::new(ReadyQueue::new()),
        }
    }

    /// Whether the underlying device is ready.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.device.is_ready()
    }

    /// Contexts currently parked on this disk.
    #[must_use]
    pub fn waiting(&self) -> usize {
        self.waiters.lock().len()
    }

    /// Read block `block` into `buffer`, parking `current` first if the
    /// device is busy.
    pub fn read<S: ContextSwitch>(
        &self,
        scheduler: &Scheduler<'t, S>,
        current: &'t dyn ExecutionContext,
        block: u32,
        buffer: &mut Block,
    ) {
        self.wait_until_ready(scheduler, current);
        self.device.read_block(block, buffer);
    }

    /// Write `buffer` to block `block`, parking `current` first if the
    /// device is busy.
    pub fn write<S: ContextSwitch>(
        &self,
        scheduler: &Scheduler<'t, S>,
        current: &'t dyn ExecutionContext,
        block: u32,
        buffer: &Block,
    ) {
        self.wait_until_ready(scheduler, current);
        self.device.write_block(block, buffer);
    }

    /// Park `current` and yield until the device is ready.
    ///
    /// Control returns here once the scheduler redispatches the context,
    /// which it only does when the device reported ready.
    fn wait_until_ready<S: ContextSwitch>(
        &self,
        scheduler: &Scheduler<'t, S>,
        current: &'t dyn ExecutionContext,
    ) {
        if !self.device.is_ready() {
            log::trace!("{} parks on busy disk", current.id());
            self.waiters.lock().enqueue(current);
            scheduler.yield_now();
        }
    }
}

impl<'t, D: DiskDevice> WaitSource<'t> for BlockingDisk<'t, D> {
    fn is_ready(&self) -> bool {
        self.device.is_ready()
    }

    fn take_waiter(&self) -> Option<&'t dyn ExecutionContext> {
        self.waiters.lock().dequeue()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::cell::{Cell, RefCell};
    use kernel_sched::ContextId;
    use std::rc::Rc;

    struct Ctx(ContextId);

    impl ExecutionContext for Ctx {
        fn id(&self) -> ContextId {
            self.0
        }
    }

    /// Records dispatches instead of switching stacks; the test keeps a
    /// handle on the record.
    #[derive(Default, Clone)]
    struct Recorder {
        dispatched: Rc<RefCell<Vec<ContextId>>>,
    }

    impl ContextSwitch for Recorder {
        fn dispatch_to(&self, next: &dyn ExecutionContext) {
            self.dispatched.borrow_mut().push(next.id());
        }
    }

    /// In-memory device: 16 blocks, readiness scripted by the test.
    struct FakeDevice {
        ready_after: Cell<u32>,
        blocks: RefCell<Vec<Block>>,
    }

    impl FakeDevice {
        fn new(ready_after: u32) -> Self {
            Self {
                ready_after: Cell::new(ready_after),
                blocks: RefCell::new(vec![[0; BLOCK_SIZE]; 16]),
            }
        }
    }

    impl DiskDevice for FakeDevice {
        fn is_ready(&self) -> bool {
            let remaining = self.ready_after.get();
            if remaining == 0 {
                true
            } else {
                self.ready_after.set(remaining - 1);
                false
            }
        }

        fn read_block(&self, block: u32, buffer: &mut Block) {
            *buffer = self.blocks.borrow()[block as usize];
        }

        fn write_block(&self, block: u32, buffer: &Block) {
            self.blocks.borrow_mut()[block as usize] = *buffer;
        }
    }

    #[test]
    fn ready_device_transfers_without_parking() {
        let current = Ctx(ContextId::new(1));
        let recorder = Recorder::default();
        let scheduler = Scheduler::new(recorder.clone());
        let disk = BlockingDisk::new(FakeDevice::new(0));

        let mut data: Block = [0xAB; BLOCK_SIZE];
        disk.write(&scheduler, &current, 3, &data);
        data = [0; BLOCK_SIZE];
        disk.read(&scheduler, &current, 3, &mut data);

        assert_eq!(data, [0xAB; BLOCK_SIZE]);
        assert_eq!(disk.waiting(), 0);
        assert!(recorder.dispatched.borrow().is_empty(), "no yield happened");
    }

    #[test]
    fn busy_device_parks_the_caller_and_yields() {
        let current = Ctx(ContextId::new(1));
        let scheduler = Scheduler::new(Recorder::default());
        // Busy for the first readiness poll, ready afterwards.
        let disk = BlockingDisk::new(FakeDevice::new(1));

        let mut data: Block = [0; BLOCK_SIZE];
        disk.read(&scheduler, &current, 0, &mut data);

        // The caller parked itself before yielding.
        assert_eq!(disk.waiting(), 1);
    }

    #[test]
    fn waiters_are_served_in_fifo_order() {
        let (a, b) = (Ctx(ContextId::new(1)), Ctx(ContextId::new(2)));
        let disk = BlockingDisk::new(FakeDevice::new(0));

        disk.waiters.lock().enqueue(&a);
        disk.waiters.lock().enqueue(&b);

        assert_eq!(disk.take_waiter().unwrap().id(), ContextId::new(1));
        assert_eq!(disk.take_waiter().unwrap().id(), ContextId::new(2));
        assert!(disk.take_waiter().is_none());
    }

    #[test]
    fn scheduler_prioritizes_the_parked_context_once_ready() {
        let (runner, sleeper) = (Ctx(ContextId::new(1)), Ctx(ContextId::new(2)));
        // Busy for the next two readiness polls.
        let disk = BlockingDisk::new(FakeDevice::new(2));
        let recorder = Recorder::default();
        let scheduler = Scheduler::new(recorder.clone());
        scheduler.register_blocking_device(&disk);
        scheduler.add(&runner);

        // The sleeper tries to read, parks, and yields; the device is still
        // busy at that yield, so the runner is dispatched instead.
        let mut data: Block = [0; BLOCK_SIZE];
        disk.read(&scheduler, &sleeper, 0, &mut data);
        assert_eq!(*recorder.dispatched.borrow(), [ContextId::new(1)]);

        // At the next yield the device has become ready: the parked sleeper
        // outranks the re-queued runner.
        scheduler.resume(&runner);
        scheduler.yield_now();
        assert_eq!(
            *recorder.dispatched.borrow(),
            [ContextId::new(1), ContextId::new(2)]
        );
        assert_eq!(disk.waiting(), 0);
    }
}
