use std::sync::mpsc;
use std::thread;

use anyhow::Result;
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};

pub fn build_pool(jobs: usize) -> Result<ThreadPool> {
    Ok(ThreadPoolBuilder::new()
        .num_threads(jobs.max(1))
        .thread_name(|i| format!("subfetch-worker-{i}"))
        .build()?)
}

/// Runs `work` over `items` on `pool` and hands each result to
/// `on_complete` on the calling thread, in completion order. Returns once
/// every item has completed; the first error from `on_complete` is
/// returned after the remaining results are drained.
pub fn run_to_completion<T, R, W, C>(pool: &ThreadPool, items: &[T], work: W, mut on_complete: C) -> Result<()>
where
    T: Sync,
    R: Send,
    W: Fn(&T) -> R + Sync,
    C: FnMut(&T, R) -> Result<()>,
{
    let (tx, rx) = mpsc::channel::<(usize, R)>();
    let work = &work;
    let mut first_error = None;

    thread::scope(|scope| {
        scope.spawn(move || {
            pool.install(|| {
                items
                    .par_iter()
                    .enumerate()
                    .for_each_with(tx, |tx, (index, item)| {
                        // receiver outlives the pool, send only fails if it panicked
                        let _ = tx.send((index, work(item)));
                    })
            })
        });

        for (index, result) in rx {
            if let Err(e) = on_complete(&items[index], result) {
                first_error.get_or_insert(e);
            }
        }
    });

    match first_error {
        Some(e) => Err(e),
        None => Ok(()),
    }
}
