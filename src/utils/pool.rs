//! Worker pool used by the batch transforms.

use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};

use crate::error::{RescaleError, Result};

/// Number of workers for a joblib-style `n_jobs` value.
///
/// Positive values are taken as is. Negative values count back from the
/// number of CPUs (`-1` = all CPUs, `-2` = all but one), never below one.
pub fn resolve_n_jobs(n_jobs: isize) -> Result<usize> {
    match n_jobs {
        0 => Err(RescaleError::InvalidJobs),
        n if n > 0 => Ok(n as usize),
        n => {
            let cpus = num_cpus::get() as isize;
            Ok((cpus + 1 + n).max(1) as usize)
        }
    }
}

/// Build a dedicated pool sized for `n_jobs`.
pub fn build_pool(n_jobs: isize) -> Result<ThreadPool> {
    let workers = resolve_n_jobs(n_jobs)?;
    let pool = ThreadPoolBuilder::new()
        .num_threads(workers)
        .thread_name(|i| format!("rescale-worker-{}", i))
        .build()?;
    Ok(pool)
}

/// Apply `f` to every item on `pool`.
///
/// Results come back in input order. The first error ends the stage.
pub fn parallel_map<T, U, F>(pool: &ThreadPool, items: &[T], f: F) -> Result<Vec<U>>
where
    T: Sync,
    U: Send,
    F: Fn(&T) -> Result<U> + Sync + Send,
{
    pool.install(|| items.par_iter().map(|item| f(item)).collect())
}
