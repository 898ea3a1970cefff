//! The cooperative coroutine runtime.
//!
//! One [`Ordinator`] lives per OS thread, in thread-local storage, and owns
//! every [`Routine`] created on that thread. `create`/`resume`/`yield_now`/
//! `current`/`destroy` are free functions rather than methods on a passed-in
//! context object, matching `original_source/coroutine.h`'s free-function
//! surface (`coro::Create`, `coro::Resume`, ...) and
//! `examples/cheme-coroutine-rs`'s module-level `spawn`/`sched` functions —
//! callers inside a task never see the Ordinator itself.
//!
//! Stack switching is symmetric: a routine's [`context::Context`] resumes
//! straight into another routine's (or the scheduler's) saved registers,
//! there is no privileged "kernel" context. The `context` crate — the same
//! dependency the teacher crate declares — supplies the machine-specific
//! half of that switch; everything in this module is the bookkeeping layer
//! spec.md assigns to the Ordinator.

mod handle;

pub use handle::{Coroutine, State};

use std::cell::RefCell;
use std::collections::VecDeque;

use context::stack::ProtectedFixedSizeStack;
use context::{Context, Transfer};

use crate::error::{Error, Result};
use crate::options::{Options, DEFAULT_STACK_SIZE};

/// A 1-based routine identifier. `0` is reserved for "the scheduler context
/// is running" (see [`current`]).
pub type RoutineId = usize;

/// Outcome of a [`resume`] call, the Rust-native standin for the source's
/// `-1` / `-2` / `0` return codes (spec.md §4.1, §7).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResumeResult {
    /// The routine ran and either yielded or completed (return code `0`).
    Ok,
    /// `id` refers to a vacant slot (return code `-1`).
    Vacant,
    /// `id` refers to a routine that has already finished (return code
    /// `-2`).
    Finished,
}

impl ResumeResult {
    /// Mirrors the processor loop's `ret != -2` check (spec.md §4.4 step
    /// 2b): true unless the routine is permanently done.
    pub fn made_progress(self) -> bool {
        !matches!(self, ResumeResult::Finished)
    }
}

struct RoutineSlot {
    func: Option<Box<dyn FnOnce()>>,
    stack: Option<ProtectedFixedSizeStack>,
    stack_size: usize,
    ctx: Option<Context>,
    finished: bool,
    name: Option<String>,
    /// Set if the routine's function panicked. Stashed here rather than
    /// propagated by unwinding because the routine's stack is not a normal
    /// Rust call frame of the scheduler's — unwinding across the `context`
    /// switch boundary is undefined behavior, so `entry_trampoline` catches
    /// the panic itself and the caller of [`resume`]/[`Coroutine::resume`]
    /// re-raises it as an [`crate::Error::Panicked`] instead.
    panic: Option<Box<dyn std::any::Any + Send>>,
}

struct OrdinatorState {
    routines: Vec<Option<RoutineSlot>>,
    free_list: VecDeque<RoutineId>,
    current: RoutineId,
    default_stack_size: usize,
    /// The context to switch to in order to hand control back to the
    /// scheduler. Populated on a routine's first entry and refreshed on
    /// every subsequent yield/resume round trip (see [`yield_now`] and
    /// [`resume`]).
    sched_ctx: Option<Context>,
}

impl OrdinatorState {
    fn new() -> OrdinatorState {
        OrdinatorState {
            routines: Vec::new(),
            free_list: VecDeque::new(),
            current: 0,
            default_stack_size: DEFAULT_STACK_SIZE,
            sched_ctx: None,
        }
    }
}

thread_local! {
    static ORDINATOR: RefCell<OrdinatorState> = RefCell::new(OrdinatorState::new());
}

/// Sets the stack size used for routines created after this call that don't
/// request their own size via [`Options::stack_size`]. Default
/// [`DEFAULT_STACK_SIZE`].
pub fn set_default_stack_size(size: usize) {
    ORDINATOR.with(|o| o.borrow_mut().default_stack_size = size);
}

/// Registers `f` as a new routine and returns its id. No stack is allocated
/// yet — that happens lazily on the first [`resume`].
pub fn create<F>(f: F) -> RoutineId
where
    F: FnOnce() + 'static,
{
    create_opts(f, Options::default())
}

pub fn create_opts<F>(f: F, opts: Options) -> RoutineId
where
    F: FnOnce() + 'static,
{
    ORDINATOR.with(|o| {
        let mut ord = o.borrow_mut();
        let stack_size = opts.stack_size.unwrap_or(ord.default_stack_size);
        let slot = RoutineSlot {
            func: Some(Box::new(f)),
            stack: None,
            stack_size,
            ctx: None,
            finished: false,
            name: opts.name,
            panic: None,
        };
        if let Some(id) = ord.free_list.pop_front() {
            debug_assert!(ord.routines[id - 1].is_none());
            ord.routines[id - 1] = Some(slot);
            log::trace!("coroutine {} created (slot reused)", id);
            id
        } else {
            ord.routines.push(Some(slot));
            let id = ord.routines.len();
            log::trace!("coroutine {} created", id);
            id
        }
    })
}

/// Returns the id of the routine presently executing, or `0` if the
/// scheduler context is running.
pub fn current() -> RoutineId {
    ORDINATOR.with(|o| o.borrow().current)
}

/// Resumes routine `id`. May only be called from the scheduler context.
///
/// On the first call for a given routine this allocates its stack and
/// primes its context with [`entry_trampoline`] as the entry point; later
/// calls restore the context saved at the routine's last suspension point.
///
/// Returns `Err(Error::StackAllocation { .. })` if a first resume's stack
/// allocation fails — the one construction-time failure spec.md's
/// `-1`/`-2`/`0` return-code contract has no code for (SPEC_FULL.md §7).
pub fn resume(id: RoutineId) -> Result<ResumeResult> {
    assert_ne!(id, 0, "routine id 0 is reserved for the scheduler context");
    assert_eq!(
        current(),
        0,
        "Resume may only be called from the scheduler context"
    );

    enum Prepared {
        Vacant,
        Finished,
        Ready(Context),
        NeedsStack(usize),
    }

    let prepared = ORDINATOR.with(|o| {
        let mut ord = o.borrow_mut();
        match ord.routines.get_mut(id - 1) {
            None | Some(None) => Prepared::Vacant,
            Some(Some(slot)) => {
                if slot.finished {
                    Prepared::Finished
                } else if let Some(ctx) = slot.ctx.take() {
                    Prepared::Ready(ctx)
                } else {
                    Prepared::NeedsStack(slot.stack_size)
                }
            }
        }
    });

    let ctx = match prepared {
        Prepared::Vacant => return Ok(ResumeResult::Vacant),
        Prepared::Finished => return Ok(ResumeResult::Finished),
        Prepared::Ready(ctx) => ctx,
        Prepared::NeedsStack(stack_size) => {
            let stack = ProtectedFixedSizeStack::new(stack_size).map_err(|source| {
                Error::StackAllocation {
                    size: stack_size,
                    source,
                }
            })?;
            // SAFETY: `stack` outlives the context we build on it — it is
            // moved into the routine's slot below and kept alive there
            // until `destroy` releases it.
            let ctx = unsafe { Context::new(&stack, entry_trampoline) };
            ORDINATOR.with(|o| {
                let mut ord = o.borrow_mut();
                if let Some(Some(slot)) = ord.routines.get_mut(id - 1) {
                    slot.stack = Some(stack);
                }
            });
            ctx
        }
    };

    ORDINATOR.with(|o| o.borrow_mut().current = id);
    let transfer = ctx.resume(0);
    ORDINATOR.with(|o| {
        let mut ord = o.borrow_mut();
        ord.current = 0;
        if let Some(Some(slot)) = ord.routines.get_mut(id - 1) {
            slot.ctx = Some(transfer.context);
        }
    });

    Ok(ResumeResult::Ok)
}

/// Yields the current routine back to the scheduler context. May only be
/// called from a routine context; `resume(id)` continues execution right
/// after this call.
pub fn yield_now() {
    let id = current();
    assert_ne!(id, 0, "Yield may only be called from a routine context");

    let sched_ctx = ORDINATOR.with(|o| {
        let mut ord = o.borrow_mut();
        ord.current = 0;
        ord.sched_ctx
            .take()
            .expect("no scheduler context recorded to yield to")
    });

    let transfer = sched_ctx.resume(0);

    ORDINATOR.with(|o| {
        let mut ord = o.borrow_mut();
        ord.sched_ctx = Some(transfer.context);
        ord.current = id;
    });
}

/// Releases routine `id`'s stack and returns its id to the free-list. Per
/// spec.md §9's prescribed policy, this is the *only* way a slot is
/// reclaimed — a routine that completes does not free itself; the caller
/// (the [`crate::Processor`], at shutdown) must `destroy` it explicitly.
pub fn destroy(id: RoutineId) {
    ORDINATOR.with(|o| {
        let mut ord = o.borrow_mut();
        assert_ne!(
            ord.current, id,
            "cannot destroy the currently running routine"
        );
        match ord.routines.get_mut(id - 1) {
            Some(slot @ Some(_)) => {
                *slot = None;
                ord.free_list.push_back(id);
                log::trace!("coroutine {} destroyed", id);
            }
            _ => panic!("Destroy called on a vacant routine slot {}", id),
        }
    });
}

pub fn is_finished(id: RoutineId) -> bool {
    ORDINATOR.with(|o| {
        o.borrow()
            .routines
            .get(id - 1)
            .and_then(|slot| slot.as_ref())
            .map(|slot| slot.finished)
            .unwrap_or(false)
    })
}

pub fn name(id: RoutineId) -> Option<String> {
    ORDINATOR.with(|o| {
        o.borrow()
            .routines
            .get(id - 1)
            .and_then(|slot| slot.as_ref())
            .and_then(|slot| slot.name.clone())
    })
}

/// Takes the stored panic payload out of a finished routine's slot, if its
/// function panicked instead of returning normally.
pub fn take_panic(id: RoutineId) -> Option<Box<dyn std::any::Any + Send>> {
    ORDINATOR.with(|o| {
        o.borrow_mut()
            .routines
            .get_mut(id - 1)
            .and_then(|slot| slot.as_mut())
            .and_then(|slot| slot.panic.take())
    })
}

/// Entry point for every routine's first resume. Runs the routine's
/// function to completion, then hands control back to the scheduler
/// context one final time and never returns — the Rust-native equivalent
/// of the `uc_link`-driven trampoline return in `original_source`'s unix
/// branch, made explicit because the `context` crate has no successor-link
/// concept of its own (the fiber branch of `original_source/coroutine.h`
/// makes the same switch explicit for the same reason).
extern "C" fn entry_trampoline(t: Transfer) -> ! {
    let id = ORDINATOR.with(|o| o.borrow().current);
    ORDINATOR.with(|o| o.borrow_mut().sched_ctx = Some(t.context));

    let func = ORDINATOR.with(|o| {
        let mut ord = o.borrow_mut();
        ord.routines[id - 1]
            .as_mut()
            .expect("routine vanished before its first resume")
            .func
            .take()
            .expect("routine function missing on first entry")
    });

    // A panic must never unwind across this context switch boundary: the
    // routine's stack is not a Rust call frame nested under the scheduler's,
    // so the unwinder has nowhere to go. Catch it here and let the caller
    // of `resume`/`Coroutine::resume` re-raise it on the scheduler's own
    // stack instead.
    let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(func));

    let sched_ctx = ORDINATOR.with(|o| {
        let mut ord = o.borrow_mut();
        let slot = ord.routines[id - 1]
            .as_mut()
            .expect("routine vanished before completion");
        slot.finished = true;
        if let Err(payload) = outcome {
            slot.panic = Some(payload);
        }
        ord.current = 0;
        ord.sched_ctx
            .take()
            .expect("scheduler context missing at routine completion")
    });

    sched_ctx.resume(0);
    unreachable!("a context was resumed after its coroutine had already finished");
}

/// Drives a blocking computation on a background `std::thread` to
/// completion while cooperatively yielding control back to the Ordinator
/// between polls, so sibling routines on this thread keep making progress.
///
/// Grounded in `original_source/coroutine.h`'s `Await`, present in both its
/// MSVC and unix branches; the distilled spec.md drops it from the
/// coroutine runtime's contract list without naming it a Non-goal, so it is
/// carried forward as supplemental capability rather than a core primitive.
pub fn await_blocking<F, T>(f: F) -> T
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    use std::sync::mpsc::{self, TryRecvError};

    let (tx, rx) = mpsc::channel();
    std::thread::spawn(move || {
        let _ = tx.send(f());
    });

    loop {
        match rx.try_recv() {
            Ok(value) => return value,
            Err(TryRecvError::Empty) => {
                if current() != 0 {
                    yield_now();
                } else {
                    std::thread::yield_now();
                }
            }
            Err(TryRecvError::Disconnected) => {
                panic!("await_blocking: worker thread disconnected without producing a result")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell as StdRefCell;
    use std::rc::Rc;

    #[test]
    fn completion_detection() {
        let ran = Rc::new(StdRefCell::new(false));
        let ran2 = ran.clone();
        let id = create(move || {
            *ran2.borrow_mut() = true;
        });

        assert_eq!(resume(id).unwrap(), ResumeResult::Ok);
        assert!(*ran.borrow());
        assert_eq!(resume(id).unwrap(), ResumeResult::Finished);
        destroy(id);
    }

    #[test]
    fn resume_vacant_slot() {
        let id = create(|| {});
        destroy(id);
        assert_eq!(resume(id).unwrap(), ResumeResult::Vacant);
    }

    #[test]
    fn yield_and_resume_round_trips() {
        let trace = Rc::new(StdRefCell::new(Vec::new()));
        let trace2 = trace.clone();
        let id = create(move || {
            trace2.borrow_mut().push(0);
            yield_now();
            trace2.borrow_mut().push(1);
            yield_now();
            trace2.borrow_mut().push(2);
        });

        assert_eq!(resume(id).unwrap(), ResumeResult::Ok);
        assert_eq!(resume(id).unwrap(), ResumeResult::Ok);
        assert_eq!(resume(id).unwrap(), ResumeResult::Ok);
        assert_eq!(resume(id).unwrap(), ResumeResult::Finished);
        assert_eq!(*trace.borrow(), vec![0, 1, 2]);
        destroy(id);
    }

    #[test]
    fn slot_reused_after_destroy() {
        let a = create(|| {});
        resume(a).unwrap();
        destroy(a);
        let b = create(|| {});
        assert_eq!(a, b, "freed slot should be the lowest-index vacant one");
        resume(b).unwrap();
        destroy(b);
    }

    #[test]
    #[should_panic(expected = "scheduler context")]
    fn resume_from_inside_a_routine_panics() {
        let id = create(|| {
            let inner = create(|| {});
            resume(inner).unwrap();
        });
        resume(id).unwrap();
    }

    #[test]
    #[should_panic(expected = "routine context")]
    fn yield_from_scheduler_panics() {
        yield_now();
    }
}
