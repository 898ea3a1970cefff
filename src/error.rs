//! Crate error type.
//!
//! The scheduler core itself mostly reports outcomes through small status
//! codes (see [`crate::coroutine::ResumeResult`]) rather than `Result`, per
//! the original design: resuming a vacant or finished routine, or an empty
//! channel pop, are expected outcomes a caller branches on, not failures.
//!
//! `Error` exists for the handful of things that really are failures: a
//! coroutine stack that could not be allocated, and a user task that
//! panicked while running on a worker.

use thiserror::Error as ThisError;

/// Errors surfaced by the public, ergonomic layer of the crate
/// ([`crate::Coroutine`], [`crate::ProcessorPool`]).
#[derive(Debug, ThisError)]
pub enum Error {
    /// The OS refused to map a stack of the requested size for a new
    /// coroutine.
    #[error("failed to allocate a {size}-byte coroutine stack: {source}")]
    StackAllocation {
        size: usize,
        #[source]
        source: context::stack::StackError,
    },

    /// [`crate::Coroutine::resume`] was called on a routine whose slot is
    /// vacant (destroyed, or never created on this Ordinator).
    #[error("coroutine {0} does not exist")]
    Vacant(usize),

    /// [`crate::Coroutine::resume`] was called on a routine that has
    /// already run to completion.
    #[error("coroutine {0} has already finished")]
    AlreadyFinished(usize),

    /// The coroutine's function panicked while running.
    #[error("coroutine panicked: {0}")]
    Panicked(String),
}

pub type Result<T> = std::result::Result<T, Error>;
