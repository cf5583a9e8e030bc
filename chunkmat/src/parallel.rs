//! Splitting work over contiguous blocks of jobs

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};

use rayon::prelude::*;

use crate::error::{Error, Result};

/// Run `f(worker, start, length)` over contiguous blocks covering `0..njobs`
///
/// At most `nthreads` blocks are created, each of `ceil(njobs / nthreads)`
/// jobs except possibly the last. Results come back in block order. If any
/// block fails, the error of the earliest failing block is returned, and a
/// panicking block is reported as [`Error::Worker`].
pub fn parallelize<T, F>(njobs: usize, nthreads: usize, f: F) -> Result<Vec<T>>
where
    T: Send,
    F: Fn(usize, usize, usize) -> Result<T> + Sync,
{
    let blocks = job_blocks(njobs, nthreads);
    let run = |(worker, (start, length)): (usize, (usize, usize))| {
        catch_unwind(AssertUnwindSafe(|| f(worker, start, length)))
            .unwrap_or_else(|payload| Err(Error::Worker(panic_message(payload, "worker panicked"))))
    };

    let results: Vec<Result<T>> = if blocks.len() <= 1 {
        blocks.into_iter().enumerate().map(run).collect()
    } else {
        blocks.into_par_iter().enumerate().map(run).collect()
    };
    results.into_iter().collect()
}

/// `(start, length)` of each block of jobs
pub(crate) fn job_blocks(njobs: usize, nthreads: usize) -> Vec<(usize, usize)> {
    if njobs == 0 {
        return Vec::new();
    }
    let per_worker = njobs.div_ceil(nthreads.max(1));
    (0..njobs)
        .step_by(per_worker)
        .map(|start| (start, per_worker.min(njobs - start)))
        .collect()
}

pub(crate) fn panic_message(payload: Box<dyn Any + Send>, fallback: &str) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        fallback.to_string()
    }
}
