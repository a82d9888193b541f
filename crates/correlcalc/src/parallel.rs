//! The parallel dispatcher for the weighted pair counts.
//!
//! The query points get split into `W` contiguous shards. Every shard is
//! handled by a single task on a dedicated rayon pool with `W` threads (see
//! [`worker_pool`]) and yields a complete histogram. The partial histograms are summed in shard
//! order, so the result doesn't depend on scheduling.
//!
//! Workers only ever read the shared kernel (the tree, the query points and
//! the weights). A failure (or panic) in any worker fails the whole
//! calculation and the other partial histograms are discarded.

use crate::config::CancelToken;
use crate::error::Error;
use correlcalc_internal::{Metric, WeightedPairKernel};
use core::ops::Range;
use rayon::ThreadPool;
use rayon::prelude::*;
use std::num::NonZeroUsize;
use std::panic::{AssertUnwindSafe, catch_unwind};

/// Split `0..n_points` into `n_shards` contiguous, nearly equal ranges.
///
/// Shard `i` is `n*i/W .. n*(i+1)/W`. When `n_shards > n_points`, some of
/// the shards are empty.
pub fn shard_ranges(n_points: usize, n_shards: NonZeroUsize) -> Vec<Range<usize>> {
    let w = n_shards.get();
    let bound = |i: usize| ((n_points as u128 * i as u128) / w as u128) as usize;
    (0..w).map(|i| bound(i)..bound(i + 1)).collect()
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("panicked: {s}")
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("panicked: {s}")
    } else {
        "panicked".to_owned()
    }
}

/// Build the dedicated pool of `n_workers` threads that runs the shards.
pub fn worker_pool(n_workers: NonZeroUsize) -> Result<ThreadPool, Error> {
    rayon::ThreadPoolBuilder::new()
        .num_threads(n_workers.get())
        .thread_name(|i| format!("correlcalc-worker-{i}"))
        .build()
        .map_err(|e| Error::thread_pool(n_workers.get(), e.to_string()))
}

/// Compute `kernel`'s histogram over all of its query points, with one shard
/// per thread of `pool`.
pub fn parallel_histogram<M: Metric>(
    kernel: &WeightedPairKernel<'_, '_, M>,
    pool: &ThreadPool,
    cancel: Option<&CancelToken>,
) -> Result<Vec<f64>, Error> {
    let should_stop = || cancel.is_some_and(CancelToken::is_cancelled);
    if should_stop() {
        return Err(Error::cancelled());
    }

    let n_workers = NonZeroUsize::new(pool.current_num_threads()).unwrap_or(NonZeroUsize::MIN);
    let shards = shard_ranges(kernel.n_queries(), n_workers);
    log::debug!(
        "dispatching {} query points over {} workers",
        kernel.n_queries(),
        shards.len()
    );

    let partials: Vec<Result<Vec<f64>, Error>> = pool.install(|| {
        shards
            .par_iter()
            .enumerate()
            .map(|(worker, range)| {
                let run_shard = || kernel.histogram(range.clone(), &should_stop);
                let outcome = catch_unwind(AssertUnwindSafe(run_shard));
                match outcome {
                    Ok(Ok(hist)) => Ok(hist),
                    Ok(Err(_)) if should_stop() => Err(Error::cancelled()),
                    Ok(Err(what)) => {
                        Err(Error::worker_failure(worker, range.start, range.end, what))
                    }
                    Err(payload) => Err(Error::worker_failure(
                        worker,
                        range.start,
                        range.end,
                        panic_message(payload.as_ref()),
                    )),
                }
            })
            .collect()
    });

    if should_stop() {
        return Err(Error::cancelled());
    }

    let mut total = vec![0.0; kernel.n_bins()];
    for partial in partials {
        for (acc, val) in total.iter_mut().zip(partial?) {
            *acc += val;
        }
    }
    Ok(total)
}
