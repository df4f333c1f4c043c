use crate::queue::ReadyQueue;
use crate::{ContextId, ExecutionContext};
use kernel_sync::SpinLock;

/// The low-level stack switch.
///
/// [`dispatch_to`](Self::dispatch_to) transfers control to `next` and
/// returns only once the calling context has been switched back in.
pub trait ContextSwitch {
    fn dispatch_to(&self, next: &dyn ExecutionContext);
}

/// A device contexts can park on, polled by the scheduler at every yield.
///
/// The scheduler holds at most one wait source (the blocking disk); its
/// parked contexts bypass the ready queue once the device reports ready.
pub trait WaitSource<'t> {
    /// Whether the device has completed its outstanding operation.
    fn is_ready(&self) -> bool;

    /// Unpark the longest-waiting context, if any.
    fn take_waiter(&self) -> Option<&'t dyn ExecutionContext>;
}

/// Cooperative round-robin scheduler with device priority.
///
/// All methods take `&self`; the ready queue sits behind a [`SpinLock`] so
/// the scheduler can be shared between the running context and the device
/// wrapper that parks contexts on it.
pub struct Scheduler<'t, S> {
    switch: S,
    ready: SpinLock<ReadyQueue<'t>>,
    device: SpinLock<Option<&'t dyn WaitSource<'t>>>,
}

impl<'t, S: ContextSwitch> Scheduler<'t, S> {
    #[must_use]
    pub const fn new(switch: S) -> Self {
        Self {
            switch,
            ready: SpinLock::new(ReadyQueue::new()),
            device: SpinLock::new(None),
        }
    }

    /// Give up the CPU and dispatch the next context.
    ///
    /// Priority goes to a context parked on the registered device if the
    /// device is ready; otherwise the head of the ready queue runs. With
    /// nothing runnable the call logs and returns to the caller, which
    /// remains the running context.
    ///
    /// The device priority is strict, not fair: an always-ready device with
    /// a steady stream of waiters starves the ready queue. Accepted
    /// limitation of this design.
    ///
    /// The yielding context is *not* requeued; a context that wants to run
    /// again calls [`resume`](Self::resume) on itself first.
    pub fn yield_now(&self) {
        let device = *self.device.lock();
        if let Some(device) = device
            && device.is_ready()
            && let Some(waiter) = device.take_waiter()
        {
            log::trace!("device ready, dispatching parked {}", waiter.id());
            self.switch.dispatch_to(waiter);
            return;
        }

        match self.ready.with_lock(ReadyQueue::dequeue) {
            Some(next) => {
                log::trace!("dispatching {}", next.id());
                self.switch.dispatch_to(next);
            }
            None => log::debug!("yield with nothing runnable, caller keeps the CPU"),
        }
    }

    /// Admit a context to the tail of the ready queue.
    pub fn add(&self, context: &'t dyn ExecutionContext) {
        self.ready.with_lock(|queue| queue.enqueue(context));
        log::trace!("admitted {}", context.id());
    }

    /// Requeue a context that is runnable again. Re-entry after a wait is
    /// the same motion as first admission.
    pub fn resume(&self, context: &'t dyn ExecutionContext) {
        self.ready.with_lock(|queue| queue.enqueue(context));
        log::trace!("resumed {}", context.id());
    }

    /// Remove one queued occurrence of `context` from the ready queue.
    ///
    /// Rotates the queue exactly once, dropping the first entry whose id
    /// matches; the relative order of all other contexts is preserved. A
    /// context that is not queued (e.g. the running one) is left alone.
    pub fn terminate(&self, context: &dyn ExecutionContext) {
        let id = context.id();
        let removed = self.ready.with_lock(|queue| {
            let mut removed = false;
            for _ in 0..queue.len() {
                let Some(head) = queue.dequeue() else { break };
                if !removed && head.id() == id {
                    removed = true;
                } else {
                    queue.enqueue(head);
                }
            }
            removed
        });
        if removed {
            log::debug!("terminated {id}");
        } else {
            log::debug!("terminate: {id} was not queued");
        }
    }

    /// Register the blocking device whose waiters get dispatch priority.
    /// Only one device is supported; a second registration replaces the
    /// first.
    pub fn register_blocking_device(&self, device: &'t dyn WaitSource<'t>) {
        *self.device.lock() = Some(device);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::cell::{Cell, RefCell};
    use std::collections::VecDeque;

    struct Ctx(ContextId);

    impl Ctx {
        fn new(id: u32) -> Self {
            Self(ContextId::new(id))
        }
    }

    impl ExecutionContext for Ctx {
        fn id(&self) -> ContextId {
            self.0
        }
    }

    /// Records dispatches instead of switching stacks.
    #[derive(Default)]
    struct Recorder {
        dispatched: RefCell<Vec<ContextId>>,
    }

    impl ContextSwitch for Recorder {
        fn dispatch_to(&self, next: &dyn ExecutionContext) {
            self.dispatched.borrow_mut().push(next.id());
        }
    }

    struct FakeDevice<'t> {
        ready: Cell<bool>,
        parked: RefCell<VecDeque<&'t dyn ExecutionContext>>,
    }

    impl FakeDevice<'_> {
        fn new() -> Self {
            Self { ready: Cell::new(false), parked: RefCell::new(VecDeque::new()) }
        }
    }

    impl<'t> WaitSource<'t> for FakeDevice<'t> {
        fn is_ready(&self) -> bool {
            self.ready.get()
        }

        fn take_waiter(&self) -> Option<&'t dyn ExecutionContext> {
            self.parked.borrow_mut().pop_front()
        }
    }

    #[test]
    fn round_robin_dispatch_order() {
        let (a, b, c) = (Ctx::new(1), Ctx::new(2), Ctx::new(3));
        let scheduler = Scheduler::new(Recorder::default());
        scheduler.add(&a);
        scheduler.add(&b);
        scheduler.add(&c);

        scheduler.yield_now();
        scheduler.yield_now();
        scheduler.yield_now();
        assert_eq!(
            *scheduler.switch.dispatched.borrow(),
            [ContextId::new(1), ContextId::new(2), ContextId::new(3)]
        );
    }

    #[test]
    fn resume_goes_to_the_tail() {
        let (a, b) = (Ctx::new(1), Ctx::new(2));
        let scheduler = Scheduler::new(Recorder::default());
        scheduler.add(&a);
        scheduler.add(&b);

        scheduler.yield_now(); // a runs
        scheduler.resume(&a); // a behind b now
        scheduler.yield_now();
        scheduler.yield_now();
        assert_eq!(
            *scheduler.switch.dispatched.borrow(),
            [ContextId::new(1), ContextId::new(2), ContextId::new(1)]
        );
    }

    #[test]
    fn yield_with_empty_queue_keeps_the_caller() {
        let scheduler = Scheduler::new(Recorder::default());
        scheduler.yield_now();
        assert!(scheduler.switch.dispatched.borrow().is_empty());
    }

    #[test]
    fn terminate_removes_exactly_one_occurrence() {
        let (a, b, c) = (Ctx::new(1), Ctx::new(2), Ctx::new(3));
        let scheduler = Scheduler::new(Recorder::default());
        scheduler.add(&a);
        scheduler.add(&b);
        scheduler.add(&a);
        scheduler.add(&c);

        scheduler.terminate(&a);

        scheduler.yield_now();
        scheduler.yield_now();
        scheduler.yield_now();
        scheduler.yield_now();
        assert_eq!(
            *scheduler.switch.dispatched.borrow(),
            [ContextId::new(2), ContextId::new(1), ContextId::new(3)],
            "first occurrence gone, order otherwise preserved"
        );
    }

    #[test]
    fn terminate_of_unqueued_context_is_a_noop() {
        let (a, b) = (Ctx::new(1), Ctx::new(2));
        let scheduler = Scheduler::new(Recorder::default());
        scheduler.add(&a);

        scheduler.terminate(&b);
        scheduler.yield_now();
        assert_eq!(*scheduler.switch.dispatched.borrow(), [ContextId::new(1)]);
    }

    #[test]
    fn ready_device_waiter_outranks_the_ready_queue() {
        let (a, w) = (Ctx::new(1), Ctx::new(9));
        let device = FakeDevice::new();
        let scheduler = Scheduler::new(Recorder::default());
        scheduler.register_blocking_device(&device);
        scheduler.add(&a);
        device.parked.borrow_mut().push_back(&w);

        // Device still busy: round-robin proceeds.
        scheduler.yield_now();
        assert_eq!(*scheduler.switch.dispatched.borrow(), [ContextId::new(1)]);

        // Device done: the parked context preempts the queue.
        scheduler.resume(&a);
        device.ready.set(true);
        scheduler.yield_now();
        scheduler.yield_now();
        assert_eq!(
            *scheduler.switch.dispatched.borrow(),
            [ContextId::new(1), ContextId::new(9), ContextId::new(1)]
        );
    }

    #[test]
    fn ready_device_without_waiters_falls_through() {
        let a = Ctx::new(1);
        let device = FakeDevice::new();
        device.ready.set(true);
        let scheduler = Scheduler::new(Recorder::default());
        scheduler.register_blocking_device(&device);
        scheduler.add(&a);

        scheduler.yield_now();
        assert_eq!(*scheduler.switch.dispatched.borrow(), [ContextId::new(1)]);
    }
}
