//! Scenario-level coverage for `ProcessorPool`, exercised through the
//! public API only (spec.md §8's S1, S2, S3, S6).

use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use taskengine::coroutine;
use taskengine::ProcessorPool;

#[test]
fn single_core_single_worker_preserves_submission_order() {
    // S1: one core, one worker — tasks execute in the exact order submitted.
    let results = Arc::new(Mutex::new(Vec::new()));
    {
        let mut pool = ProcessorPool::with_cores(1, 1);
        for i in 0..10 {
            let results = results.clone();
            pool.add_task(move || results.lock().unwrap().push(i));
        }
        pool.finalize();
    }
    assert_eq!(*results.lock().unwrap(), (0..10).collect::<Vec<_>>());
}

#[test]
fn yielding_tasks_interleave_round_robin() {
    // S2: one core, two workers, each task records (task index, step) and
    // yields between steps. Expect the two tasks' records to interleave
    // rather than one running to completion before the other starts.
    // spec.md §8 gives one possible exact interleaving as an illustrative
    // example, not a mandated sequence — `Channel::push`'s wake-the-taker
    // behavior can reorder which worker records a given step first.
    let trace = Arc::new(Mutex::new(Vec::new()));

    {
        let mut pool = ProcessorPool::with_cores(1, 2);
        for k in 0..2 {
            let trace = trace.clone();
            pool.add_task(move || {
                for step in 0..3 {
                    trace.lock().unwrap().push((k, step));
                    coroutine::yield_now();
                }
            });
        }
        pool.finalize();
    }

    let trace = trace.lock().unwrap();

    let mut counts = [0u32; 2];
    let mut last_step = [None; 2];
    for &(k, step) in trace.iter() {
        counts[k] += 1;
        assert_eq!(last_step[k], if step == 0 { None } else { Some(step - 1) });
        last_step[k] = Some(step);
    }
    assert_eq!(counts, [3, 3]);

    // Genuine interleaving: task 1 records at least one step before task 0
    // has recorded all of its steps.
    let first_k1 = trace.iter().position(|&(k, _)| k == 1).unwrap();
    let last_k0 = trace.iter().rposition(|&(k, _)| k == 0).unwrap();
    assert!(
        first_k1 < last_k0,
        "expected the two tasks to interleave, got {:?}",
        *trace
    );
}

#[test]
fn round_robin_dispatch_across_cores() {
    // S3: four cores, one worker each, eight tasks. Each processor thread
    // is named "processor-{core}" (see `ProcessorPool::with_cores`), so a
    // task can record which core ran it without extra plumbing.
    let hits: Arc<Mutex<Vec<usize>>> = Arc::new(Mutex::new(Vec::new()));
    {
        let mut pool = ProcessorPool::with_cores(4, 1);
        for _ in 0..8 {
            let hits = hits.clone();
            pool.add_task(move || {
                let name = thread::current().name().unwrap_or_default().to_owned();
                let core: usize = name.rsplit('-').next().unwrap().parse().unwrap();
                hits.lock().unwrap().push(core);
            });
        }
        pool.finalize();
    }

    let hits = hits.lock().unwrap();
    let mut counts = [0u32; 4];
    for &core in hits.iter() {
        counts[core] += 1;
    }
    // Pre-increment cursor: task 0 -> queue 1, task 1 -> queue 2, ...,
    // task 3 -> queue 0, task 4 -> queue 1, ... — every core gets exactly
    // 2 of the 8 tasks (spec.md §9's round-robin off-by-one, preserved).
    assert_eq!(counts, [2, 2, 2, 2]);
}

#[test]
fn shutdown_runs_every_submitted_task() {
    // S6: submit 1,000 tasks, finalize immediately — all must complete
    // before finalize (and the implicit join it does) returns.
    let completed = Arc::new(Mutex::new(0u32));
    {
        let mut pool = ProcessorPool::with_cores(2, 4);
        for _ in 0..1000 {
            let completed = completed.clone();
            pool.add_task(move || {
                thread::sleep(Duration::from_micros(10));
                *completed.lock().unwrap() += 1;
            });
        }
        pool.finalize();
    }
    assert_eq!(*completed.lock().unwrap(), 1000);
}
