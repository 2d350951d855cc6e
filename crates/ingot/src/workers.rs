//! Bounded worker pool for external translator invocations
//!
//! Translation has no cross-descriptor data dependency — no descriptor's
//! translation reads another's output — so dirty modules fan out across a
//! small pool of scoped threads, each running blocking subprocess calls.
//! Everything else in the pipeline stays sequential; only the bootstrap
//! generator has a global dependency, and it runs strictly after this pool
//! drains.

use std::{
    num::NonZeroUsize,
    sync::{
        Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    thread,
};

/// Resolve the requested worker count; `0` means auto-detect.
pub fn effective_jobs(requested: usize) -> usize {
    if requested > 0 {
        requested
    } else {
        thread::available_parallelism()
            .map(NonZeroUsize::get)
            .unwrap_or(1)
    }
}

/// Apply `op` to every item, at most `jobs` at a time, and return the results
/// in item order. The pool drains fully even when an item fails; the caller
/// decides what to do with the collected results.
pub fn run_parallel<T, R, F>(items: &[T], jobs: usize, op: F) -> Vec<R>
where
    T: Sync,
    R: Send,
    F: Fn(usize, &T) -> R + Sync,
{
    let jobs = jobs.clamp(1, items.len().max(1));
    if jobs <= 1 {
        return items
            .iter()
            .enumerate()
            .map(|(index, item)| op(index, item))
            .collect();
    }

    let next = AtomicUsize::new(0);
    let slots: Vec<Mutex<Option<R>>> = items.iter().map(|_| Mutex::new(None)).collect();
    thread::scope(|scope| {
        for _ in 0..jobs {
            scope.spawn(|| {
                loop {
                    let index = next.fetch_add(1, Ordering::Relaxed);
                    let Some(item) = items.get(index) else {
                        break;
                    };
                    let result = op(index, item);
                    *slots[index].lock().expect("result slot poisoned") = Some(result);
                }
            });
        }
    });

    slots
        .into_iter()
        .map(|slot| {
            slot.into_inner()
                .expect("result slot poisoned")
                .expect("every item was processed")
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn results_keep_item_order() {
        let items: Vec<usize> = (0..32).collect();
        let results = run_parallel(&items, 4, |index, item| {
            assert_eq!(index, *item);
            item * 2
        });
        assert_eq!(results, (0..32).map(|n| n * 2).collect::<Vec<_>>());
    }

    #[test]
    fn single_job_runs_inline() {
        let items = vec!["a", "b"];
        let results = run_parallel(&items, 1, |_, item| item.to_uppercase());
        assert_eq!(results, vec!["A", "B"]);
    }

    #[test]
    fn empty_input_is_fine() {
        let items: Vec<u8> = Vec::new();
        let results: Vec<u8> = run_parallel(&items, 8, |_, item| *item);
        assert!(results.is_empty());
    }

    #[test]
    fn effective_jobs_honors_explicit_count() {
        assert_eq!(effective_jobs(3), 3);
        assert!(effective_jobs(0) >= 1);
    }
}
