//! A two-level cooperative task execution engine.
//!
//! User-submitted tasks are distributed round-robin across a fixed pool of
//! OS threads ([`ProcessorPool`]); within each thread, a bounded group of
//! cooperative coroutines ([`coroutine`]) pulls tasks off a per-thread
//! channel and runs them, voluntarily yielding to interleave execution.
//!
//! ```rust
//! use taskengine::ProcessorPool;
//! use std::sync::{Arc, Mutex};
//!
//! let results = Arc::new(Mutex::new(Vec::new()));
//! {
//!     let mut pool = ProcessorPool::with_cores(1, 1);
//!     for i in 0..10 {
//!         let results = results.clone();
//!         pool.add_task(move || results.lock().unwrap().push(i));
//!     }
//!     pool.finalize();
//! }
//! assert_eq!(*results.lock().unwrap(), (0..10).collect::<Vec<_>>());
//! ```
//!
//! Inside a task, the coroutine primitives are available directly:
//!
//! ```rust
//! use taskengine::coroutine::yield_now;
//!
//! // Voluntarily hands control back to the scheduler; legal anywhere
//! // inside a running coroutine, including deep inside a task's call
//! // stack.
//! fn cooperative_step() {
//!     yield_now();
//! }
//! ```
//!
//! Configuration: [`options::DEFAULT_STACK_SIZE`] (1 MiB) is the default
//! per-routine stack size; override it per-coroutine with [`Options`] or
//! pool-wide with [`coroutine::set_default_stack_size`]. `RUST_LOG`
//! controls the ambient `log` lines this crate emits around routine
//! creation/destruction and pool shutdown — no logger implementation is
//! bundled, wire one up (`env_logger` or similar) in your application.
//!
//! See `DESIGN.md` for how each module here is grounded in the reference
//! implementation this crate generalizes.

pub mod channel;
pub mod coroutine;
pub mod error;
pub mod options;
pub mod pool;
pub mod processor;
pub mod queue;
mod spinlock;

pub use channel::Channel;
pub use coroutine::{Coroutine, State};
pub use error::{Error, Result};
pub use options::Options;
pub use pool::ProcessorPool;
pub use processor::{Processor, Task};
pub use queue::InboundQueue;
