//! Thread-safe inbound task queue.
//!
//! One instance per [`crate::ProcessorPool`] thread: the pool pushes onto
//! it from any producer thread, the owning processor drains it with
//! non-blocking `try_pop`. Grounded in
//! `original_source/readwrite_queue.h`'s `ReadWriteQueue<T>`.

use std::collections::VecDeque;

use crate::spinlock::SpinLock;

pub struct InboundQueue<T> {
    inner: SpinLock<VecDeque<T>>,
}

impl<T> InboundQueue<T> {
    pub fn new() -> InboundQueue<T> {
        InboundQueue {
            inner: SpinLock::new(VecDeque::new()),
        }
    }

    pub fn push(&self, value: T) {
        self.inner.lock().push_back(value);
    }

    /// Non-blocking dequeue. Returns `None` if the queue is currently empty.
    pub fn try_pop(&self) -> Option<T> {
        self.inner.lock().pop_front()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }
}

impl<T> Default for InboundQueue<T> {
    fn default() -> InboundQueue<T> {
        InboundQueue::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fifo_order() {
        let q = InboundQueue::new();
        q.push(1);
        q.push(2);
        q.push(3);
        assert_eq!(q.try_pop(), Some(1));
        assert_eq!(q.try_pop(), Some(2));
        assert_eq!(q.try_pop(), Some(3));
        assert_eq!(q.try_pop(), None);
    }

    #[test]
    fn try_pop_empty_returns_none() {
        let q: InboundQueue<u32> = InboundQueue::new();
        assert!(q.is_empty());
        assert_eq!(q.try_pop(), None);
    }
}
