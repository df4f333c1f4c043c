use crate::ExecutionContext;
use alloc::boxed::Box;

/// Unbounded FIFO of context references, as a singly linked list.
///
/// Enqueue walks to the tail; the queues involved are as short as the
/// number of live contexts, so the walk is not worth a tail pointer.
pub struct ReadyQueue<'t> {
    head: Option<Box<Node<'t>>>,
    len: usize,
}

struct Node<'t> {
    context: &'t dyn ExecutionContext,
    next: Option<Box<Node<'t>>>,
}

impl<'t> ReadyQueue<'t> {
    #[must_use]
    pub const fn new() -> Self {
        Self { head: None, len: 0 }
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Append `context` at the tail.
    pub fn enqueue(&mut self, context: &'t dyn ExecutionContext) {
        let mut cursor = &mut self.head;
        while let Some(node) = cursor {
            cursor = &mut node.next;
        }
        *cursor = Some(Box::new(Node { context, next: None }));
        self.len += 1;
    }

    /// Remove and return the head.
    pub fn dequeue(&mut self) -> Option<&'t dyn ExecutionContext> {
        self.head.take().map(|node| {
            self.head = node.next;
            self.len -= 1;
            node.context
        })
    }
}

impl Default for ReadyQueue<'_> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ContextId;

    struct Ctx(ContextId);

    impl ExecutionContext for Ctx {
        fn id(&self) -> ContextId {
            self.0
        }
    }

    #[test]
    fn fifo_order() {
        let (a, b, c) = (Ctx(ContextId::new(1)), Ctx(ContextId::new(2)), Ctx(ContextId::new(3)));
        let mut queue = ReadyQueue::new();
        queue.enqueue(&a);
        queue.enqueue(&b);
        queue.enqueue(&c);
        assert_eq!(queue.len(), 3);

        assert_eq!(queue.dequeue().unwrap().id(), ContextId::new(1));
        assert_eq!(queue.dequeue().unwrap().id(), ContextId::new(2));
        assert_eq!(queue.dequeue().unwrap().id(), ContextId::new(3));
        assert!(queue.dequeue().is_none());
        assert!(queue.is_empty());
    }

    #[test]
    fn interleaved_use() {
        let (a, b) = (Ctx(ContextId::new(1)), Ctx(ContextId::new(2)));
        let mut queue = ReadyQueue::new();
        queue.enqueue(&a);
        assert_eq!(queue.dequeue().unwrap().id(), ContextId::new(1));
        queue.enqueue(&b);
        queue.enqueue(&a);
        assert_eq!(queue.dequeue().unwrap().id(), ContextId::new(2));
        assert_eq!(queue.dequeue().unwrap().id(), ContextId::new(1));
    }
}
