//! Ergonomic wrapper over the raw [`super`] primitives.
//!
//! `examples/cheme-coroutine-rs`'s `Handle`/`Coroutine` pair is the model:
//! a cheap, `Clone`-able id wrapper with `spawn`/`resume`/`join`/`current`,
//! returning `Result<State>` rather than the raw scheduler status codes the
//! [`super::resume`] free function uses. Unlike that file (a stub —
//! every method there returns a placeholder), this one is a complete
//! implementation built on the working primitives in `super`.

use std::fmt;

use crate::error::{Error, Result};
use crate::options::Options;

use super::{
    create_opts, current, destroy, is_finished, name, resume, take_panic, ResumeResult, RoutineId,
};

/// Outcome of a single [`Coroutine::resume`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    /// The routine yielded and can be resumed again.
    Suspended,
    /// The routine ran to completion.
    Finished,
}

/// A handle to a single coroutine, identified by its routine id on the
/// calling thread's Ordinator.
///
/// Like the raw primitives it wraps, a `Coroutine` is only meaningful on
/// the OS thread that created it — it is not `Send`.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Coroutine {
    id: RoutineId,
}

impl fmt::Debug for Coroutine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Coroutine").field("id", &self.id).finish()
    }
}

impl Coroutine {
    /// Spawns a coroutine with default [`Options`].
    pub fn spawn<F>(f: F) -> Coroutine
    where
        F: FnOnce() + 'static,
    {
        Coroutine::spawn_opts(f, Options::default())
    }

    /// Spawns a coroutine with explicit [`Options`].
    pub fn spawn_opts<F>(f: F, opts: Options) -> Coroutine
    where
        F: FnOnce() + 'static,
    {
        let id = create_opts(f, opts);
        Coroutine { id }
    }

    /// Resumes this coroutine.
    ///
    /// Returns `Ok(State::Finished)` the call that runs the routine to
    /// completion, `Ok(State::Suspended)` on every call before that, and an
    /// `Err` if the routine panicked, was already finished, no longer
    /// exists, or (on a first resume) its stack could not be allocated.
    pub fn resume(&self) -> Result<State> {
        match resume(self.id)? {
            ResumeResult::Ok => {
                if let Some(payload) = take_panic(self.id) {
                    return Err(Error::Panicked(panic_message(&payload)));
                }
                if is_finished(self.id) {
                    Ok(State::Finished)
                } else {
                    Ok(State::Suspended)
                }
            }
            ResumeResult::Vacant => Err(Error::Vacant(self.id)),
            ResumeResult::Finished => Err(Error::AlreadyFinished(self.id)),
        }
    }

    /// Resumes this coroutine until it finishes, propagating the first
    /// panic encountered. Must be called from the scheduler context (the
    /// same constraint [`super::resume`] has).
    pub fn join(&self) -> Result<State> {
        loop {
            match self.resume()? {
                State::Finished => return Ok(State::Finished),
                State::Suspended => continue,
            }
        }
    }

    /// Whether this coroutine has already run to completion.
    pub fn finished(&self) -> bool {
        is_finished(self.id)
    }

    /// This coroutine's name, if it was given one via [`Options::name`].
    pub fn name(&self) -> Option<String> {
        name(self.id)
    }

    /// The routine id this handle wraps, for interop with the raw
    /// `super::*` primitives (e.g. [`crate::Channel::consumer`]).
    pub fn id(&self) -> RoutineId {
        self.id
    }

    /// Releases this coroutine's stack. The routine must not be the one
    /// currently executing.
    pub fn destroy(self) {
        destroy(self.id)
    }
}

/// The id of the coroutine currently executing on this thread, or `None`
/// if the scheduler context is running.
pub fn current_coroutine() -> Option<Coroutine> {
    match current() {
        0 => None,
        id => Some(Coroutine { id }),
    }
}

fn panic_message(payload: &Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "coroutine panicked with a non-string payload".to_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spawn_and_resume_to_completion() {
        let coro = Coroutine::spawn(|| {});
        assert_eq!(coro.resume().unwrap(), State::Finished);
        assert!(coro.finished());
        coro.destroy();
    }

    #[test]
    fn join_drains_a_yielding_coroutine() {
        let coro = Coroutine::spawn(|| {
            super::super::yield_now();
            super::super::yield_now();
        });
        assert_eq!(coro.join().unwrap(), State::Finished);
        coro.destroy();
    }

    #[test]
    fn resume_after_finish_is_an_error() {
        let coro = Coroutine::spawn(|| {});
        coro.resume().unwrap();
        assert!(matches!(coro.resume(), Err(Error::AlreadyFinished(_))));
        coro.destroy();
    }

    #[test]
    fn panic_inside_a_coroutine_is_reported_not_propagated() {
        let coro = Coroutine::spawn(|| panic!("boom"));
        match coro.resume() {
            Err(Error::Panicked(msg)) => assert!(msg.contains("boom")),
            other => panic!("expected Panicked, got {:?}", other),
        }
    }
}
