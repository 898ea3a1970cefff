//! A typed, single-consumer channel built on the coroutine primitives.
//!
//! This is the synchronization surface between a processor's scheduler
//! loop (the producer) and its worker coroutines (the consumer): `push`
//! resumes the designated consumer if it is suspended, `pop` yields until
//! an item arrives or the channel closes. Grounded in
//! `original_source/coroutine.h`'s `coro::Channel<Type>`.
//!
//! A `Channel` is only meaningful on the OS thread whose Ordinator its
//! `taker` id refers to — like the coroutine primitives, it is not `Send`.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;

use crate::coroutine::{self, RoutineId};

pub struct Channel<T> {
    queue: RefCell<VecDeque<T>>,
    taker: Cell<RoutineId>,
    closed: Cell<bool>,
}

impl<T> Channel<T> {
    pub fn new() -> Channel<T> {
        Channel {
            queue: RefCell::new(VecDeque::new()),
            taker: Cell::new(0),
            closed: Cell::new(false),
        }
    }

    /// Creates a channel with its consumer already bound, rather than
    /// waiting for the first `pop`.
    pub fn with_consumer(id: RoutineId) -> Channel<T> {
        let channel = Channel::new();
        channel.taker.set(id);
        channel
    }

    /// Binds the designated consumer routine.
    pub fn consumer(&self, id: RoutineId) {
        self.taker.set(id);
    }

    /// Appends `value`. If a designated consumer exists and isn't the
    /// caller, resumes it immediately — a push from the scheduler context
    /// therefore runs the consumer synchronously until it next yields.
    pub fn push(&self, value: T) {
        self.queue.borrow_mut().push_back(value);
        self.wake_taker();
    }

    fn wake_taker(&self) {
        let taker = self.taker.get();
        if taker != 0 && taker != coroutine::current() {
            if let Err(e) = coroutine::resume(taker) {
                log::warn!("failed to resume channel taker {}: {}", taker, e);
            }
        }
    }

    /// If no consumer is bound yet, binds the calling routine. Yields while
    /// the channel is empty and open; returns `None` once it is empty and
    /// closed, otherwise the front item.
    pub fn pop(&self) -> Option<T> {
        if self.taker.get() == 0 {
            self.taker.set(coroutine::current());
        }

        while self.queue.borrow().is_empty() && !self.closed.get() {
            coroutine::yield_now();
        }

        let mut queue = self.queue.borrow_mut();
        if queue.is_empty() {
            None
        } else {
            queue.pop_front()
        }
    }

    /// Permanently closes the channel. Does not itself wake the consumer —
    /// it observes the closure the next time it is resumed and re-checks
    /// the loop condition in `pop`.
    pub fn close(&self) {
        self.closed.set(true);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.get()
    }

    /// Resumes the designated consumer (if any, and not the caller) without
    /// pushing a value — used by the scheduler to nudge a coroutine that
    /// should re-examine state such as the closed flag.
    pub fn touch(&self) {
        self.wake_taker();
    }

    pub fn clear(&self) {
        self.queue.borrow_mut().clear();
    }

    pub fn len(&self) -> usize {
        self.queue.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.borrow().is_empty()
    }
}

impl<T> Default for Channel<T> {
    fn default() -> Channel<T> {
        Channel::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coroutine::{create, destroy, resume, ResumeResult};
    use std::rc::Rc;

    #[test]
    fn push_then_pop_is_fifo() {
        let channel: Rc<Channel<i32>> = Rc::new(Channel::new());
        let consumer_channel = channel.clone();
        let received = Rc::new(std::cell::RefCell::new(Vec::new()));
        let received2 = received.clone();

        let consumer = create(move || {
            while let Some(v) = consumer_channel.pop() {
                received2.borrow_mut().push(v);
            }
        });

        channel.consumer(consumer);
        assert_eq!(resume(consumer).unwrap(), ResumeResult::Ok); // blocks in pop()

        channel.push(1);
        channel.push(2);
        channel.push(3);
        channel.close();

        // Draining the close requires one more scheduler visit since close()
        // does not itself wake the consumer.
        assert_eq!(resume(consumer).unwrap(), ResumeResult::Finished);
        assert_eq!(*received.borrow(), vec![1, 2, 3]);
        destroy(consumer);
    }

    #[test]
    fn close_drains_then_returns_none() {
        let channel: Rc<Channel<i32>> = Rc::new(Channel::new());
        let consumer_channel = channel.clone();
        let got_none = Rc::new(Cell::new(false));
        let got_none2 = got_none.clone();

        let consumer = create(move || {
            let mut out = Vec::new();
            loop {
                match consumer_channel.pop() {
                    Some(v) => out.push(v),
                    None => {
                        got_none2.set(true);
                        assert_eq!(out, vec![1, 2, 3]);
                        break;
                    }
                }
            }
        });

        channel.consumer(consumer);
        resume(consumer).unwrap();
        channel.push(1);
        channel.push(2);
        channel.push(3);
        channel.close();
        resume(consumer).unwrap();

        assert!(got_none.get());
        destroy(consumer);
    }
}
