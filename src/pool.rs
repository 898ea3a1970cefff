//! The top-level object owning all threads and inbound queues.
//!
//! Grounded in `original_source/processor_pool.h`'s `coro::ProcessorPool`:
//! `C` OS threads, each running its own [`crate::Processor`] against its
//! own inbound queue; `add_task` round-robins across queues advancing the
//! cursor *before* pushing (so the first task after construction lands on
//! queue `1`, not `0` — spec.md §9 requires preserving this, not "fixing"
//! it); `finalize` flips a shared stop flag and joins every thread.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crate::processor::{Processor, Task};
use crate::queue::InboundQueue;

pub struct ProcessorPool {
    num_cores: u64,
    cursor: AtomicUsize,
    stop: Arc<AtomicBool>,
    task_queues: Vec<Arc<InboundQueue<Task>>>,
    threads: Vec<JoinHandle<()>>,
}

impl ProcessorPool {
    /// `C` defaults to [`num_cpus::get`].
    pub fn new(num_workers_per_core: u64) -> ProcessorPool {
        ProcessorPool::with_cores(num_cpus::get() as u64, num_workers_per_core)
    }

    pub fn with_cores(num_cores: u64, num_workers_per_core: u64) -> ProcessorPool {
        assert!(num_cores > 0, "a ProcessorPool needs at least one core");
        assert!(
            num_workers_per_core > 0,
            "a ProcessorPool needs at least one worker per core"
        );

        let stop = Arc::new(AtomicBool::new(false));
        let mut task_queues = Vec::with_capacity(num_cores as usize);
        let mut threads = Vec::with_capacity(num_cores as usize);

        for core in 0..num_cores {
            let task_queue = Arc::new(InboundQueue::new());
            task_queues.push(task_queue.clone());

            let stop = stop.clone();
            let handle = thread::Builder::new()
                .name(format!("processor-{}", core))
                .spawn(move || {
                    let mut processor = Processor::new(num_workers_per_core, task_queue, stop);
                    processor.run();
                })
                .expect("failed to spawn processor thread");
            threads.push(handle);
        }

        log::debug!(
            "ProcessorPool started: {} cores x {} workers/core",
            num_cores,
            num_workers_per_core
        );

        ProcessorPool {
            num_cores,
            cursor: AtomicUsize::new(0),
            stop,
            task_queues,
            threads,
        }
    }

    /// Dispatches `task` round-robin across the pool's inbound queues. The
    /// cursor advances *before* the push, so the first call after
    /// construction lands on queue `1` (or queue `0` if `C == 1`) — see the
    /// module docs.
    pub fn add_task<F>(&self, task: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let cursor = (self.cursor.fetch_add(1, Ordering::Relaxed) + 1) % self.num_cores as usize;
        self.task_queues[cursor].push(Box::new(task));
    }

    /// Sets the shared stop flag and joins every processor thread. Safe to
    /// call more than once; only the first call's join actually blocks.
    pub fn finalize(&mut self) {
        self.stop.store(true, Ordering::Release);
        for handle in self.threads.drain(..) {
            if let Err(e) = handle.join() {
                log::warn!("processor thread panicked while shutting down: {:?}", e);
            }
        }
        log::debug!("ProcessorPool finalized");
    }
}

impl Drop for ProcessorPool {
    fn drop(&mut self) {
        self.finalize();
    }
}

// Scenario-level coverage (S1, S2, S3, S6 from spec.md §8) lives in
// `tests/pool.rs`, exercised purely through this public API.
