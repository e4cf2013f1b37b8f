//! PW-012: Bounded worker pool for I/O-bound per-file work.
//!
//! Workers pull indices from a shared counter and keep their results local;
//! the caller receives them in input order once every worker has joined.

use std::sync::atomic::{AtomicUsize, Ordering};

/// Resolve the worker count: `configured` (0 = available parallelism),
/// never more than the number of jobs, never less than one.
pub fn worker_count(configured: usize, jobs: usize) -> usize {
    let wanted = if configured == 0 {
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
    } else {
        configured
    };
    wanted.min(jobs).max(1)
}

/// Apply `f` to every item on at most `workers` threads, preserving order.
pub fn map_bounded<T, R, F>(items: &[T], workers: usize, f: F) -> Vec<R>
where
    T: Sync,
    R: Send,
    F: Fn(&T) -> R + Sync,
{
    let workers = worker_count(workers, items.len());
    if workers <= 1 || items.len() <= 1 {
        return items.iter().map(&f).collect();
    }

    let next = AtomicUsize::new(0);
    let mut indexed: Vec<(usize, R)> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..workers)
            .map(|_| {
                scope.spawn(|| {
                    let mut local = Vec::new();
                    loop {
                        let i = next.fetch_add(1, Ordering::Relaxed);
                        let Some(item) = items.get(i) else {
                            break;
                        };
                        local.push((i, f(item)));
                    }
                    local
                })
            })
            .collect();

        let mut all = Vec::with_capacity(items.len());
        for handle in handles {
            match handle.join() {
                Ok(part) => all.extend(part),
                Err(panic) => std::panic::resume_unwind(panic),
            }
        }
        all
    });

    indexed.sort_by_key(|(i, _)| *i);
    indexed.into_iter().map(|(_, r)| r).collect()
}
