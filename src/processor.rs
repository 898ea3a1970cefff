//! The per-thread driver that pumps tasks from the inbound queue into
//! worker coroutines.
//!
//! Grounded in `original_source/processor_pool.h`'s `coro::Processor`: `W`
//! worker routines run `ConsumeTask` in a loop, and the scheduler-context
//! `Run` loop visits each worker once per sweep, moving at most one task
//! from the inbound queue into the internal channel and resuming the
//! worker, until a full sweep makes no progress and the pool is stopping.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::channel::Channel;
use crate::coroutine::Coroutine;
use crate::options::Options;
use crate::queue::InboundQueue;

pub type Task = Box<dyn FnOnce() + Send>;

pub struct Processor {
    task_queue: Arc<InboundQueue<Task>>,
    internal: Arc<Channel<Task>>,
    stop: Arc<AtomicBool>,
    workers: Vec<Coroutine>,
}

impl Processor {
    pub fn new(num_workers: u64, task_queue: Arc<InboundQueue<Task>>, stop: Arc<AtomicBool>) -> Processor {
        // A single internal channel shared by every worker on this thread,
        // exactly as `original_source/processor_pool.h`'s `Processor` has
        // one `Channel<Task> tasks_` rather than one per worker. Its single
        // designated taker ends up being whichever worker calls `pop()`
        // first (see `Channel::pop`'s implicit-bind-on-first-call rule) —
        // the scheduler never calls `consumer()` itself, matching the
        // grounding source.
        let internal = Arc::new(Channel::new());
        let mut workers = Vec::with_capacity(num_workers as usize);

        for i in 0..num_workers {
            let channel = internal.clone();
            let stop = stop.clone();
            let worker = Coroutine::spawn_opts(
                move || consume_task(channel, stop),
                Options::new().name(format!("worker-{}", i)),
            );
            workers.push(worker);
        }

        Processor {
            task_queue,
            internal,
            stop,
            workers,
        }
    }

    /// Runs the scheduler loop until the pool quiesces: a full sweep over
    /// every worker dequeues no inbound task, resumes no worker that makes
    /// progress, the stop flag is set, and the internal channel is empty.
    /// Destroys every worker before returning.
    pub fn run(&mut self) {
        let mut work_done = false;

        while !work_done {
            work_done = true;

            for worker in &self.workers {
                if let Some(task) = self.task_queue.try_pop() {
                    work_done = false;
                    self.internal.push(task);
                }

                match worker.resume() {
                    Ok(_) => work_done = false,
                    Err(crate::error::Error::AlreadyFinished(_)) => {}
                    Err(e) => log::warn!("worker {:?} resume failed: {}", worker, e),
                }

                if self.stop.load(Ordering::Acquire) && work_done && self.internal.is_empty() {
                    self.internal.close();
                }
            }
        }

        for worker in self.workers.drain(..) {
            worker.destroy();
        }
        log::debug!("processor quiesced and destroyed its workers");
    }
}

/// Body of every worker coroutine: pop a task from the internal channel and
/// run it, trapping any panic at the task boundary (spec.md §4.4's Failure
/// semantics) so one bad task doesn't take down the whole worker.
///
/// Mirrors `original_source/processor_pool.h`'s `ConsumeTask` do-while
/// exactly: the stop-and-empty check runs *after* every iteration, before
/// looping back to `pop()` — not only when `pop()` itself returns `None`.
/// `Channel::pop` blocks (via repeated internal yields) for as long as the
/// channel is open and empty, so a worker that called `pop()` again instead
/// of checking this first would wait forever for a `Close()` that the
/// processor's quiescence check (`Processor::run`) may never reach once
/// every worker looks identically idle to it. Checking before re-entering
/// `pop()` lets a worker that just finished its last task exit on its own,
/// the same way the source relies on for its common shutdown path.
fn consume_task(channel: Arc<Channel<Task>>, stop: Arc<AtomicBool>) {
    loop {
        if let Some(task) = channel.pop() {
            if let Err(payload) = std::panic::catch_unwind(std::panic::AssertUnwindSafe(task)) {
                log::warn!("task panicked: {}", panic_message(&payload));
            }
        }
        if stop.load(Ordering::Acquire) && channel.is_empty() {
            break;
        }
    }
}

fn panic_message(payload: &Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "task panicked with a non-string payload".to_owned()
    }
}
