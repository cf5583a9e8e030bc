//! Bridge for chunks that may only be touched from the main thread
//!
//! Workers hand closures to [`MainThreadExecutor::run`], which block until
//! the thread inside [`MainThreadExecutor::listen`] has executed them.
//! Outside of an `initialize`/`listen` session, `run` executes inline.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use parking_lot::{Condvar, Mutex, MutexGuard};

use crate::error::{Error, Result};
use crate::parallel::{job_blocks, panic_message};

type Task = Box<dyn FnOnce() + Send>;

struct ExecutorState {
    active: bool,
    unfinished: usize,
    pending: Option<Task>,
    submitted: u64,
    completed: u64,
    fallback: String,
}

/// Serializes worker requests onto one listening thread
pub struct MainThreadExecutor {
    state: Mutex<ExecutorState>,
    ready: Condvar,
}

impl Default for MainThreadExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl MainThreadExecutor {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(ExecutorState {
                active: false,
                unfinished: 0,
                pending: None,
                submitted: 0,
                completed: 0,
                fallback: String::new(),
            }),
            ready: Condvar::new(),
        }
    }

    /// Start a session with `n_workers` workers
    ///
    /// `fallback_err` is reported when a task panics without a message.
    pub fn initialize(&self, n_workers: usize, fallback_err: impl Into<String>) {
        let mut state = self.state.lock();
        state.active = true;
        state.unfinished = n_workers;
        state.fallback = fallback_err.into();
    }

    /// Announce that the calling worker will submit no more tasks
    pub fn finish_thread(&self) {
        let mut state = self.state.lock();
        state.unfinished = state.unfinished.saturating_sub(1);
        self.ready.notify_all();
    }

    /// Execute `f` on the listening thread and wait for its result
    pub fn run<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce() -> Result<T> + Send + 'static,
    {
        let mut state = self.state.lock();
        if !state.active {
            let fallback = state.fallback.clone();
            drop(state);
            return catch_unwind(AssertUnwindSafe(f))
                .unwrap_or_else(|payload| Err(Error::MainThread(panic_message(payload, &fallback))));
        }

        let slot = Arc::new(Mutex::new(None));
        let filled = Arc::clone(&slot);
        while state.pending.is_some() {
            self.ready.wait(&mut state);
        }
        state.submitted += 1;
        let ticket = state.submitted;
        state.pending = Some(Box::new(move || {
            *filled.lock() = Some(catch_unwind(AssertUnwindSafe(f)));
        }));
        self.ready.notify_all();
        while state.completed < ticket {
            self.ready.wait(&mut state);
        }
        let fallback = state.fallback.clone();
        drop(state);

        let outcome = slot.lock().take();
        match outcome {
            Some(Ok(result)) => result,
            Some(Err(payload)) => Err(Error::MainThread(panic_message(payload, &fallback))),
            None => Err(Error::MainThread(fallback)),
        }
    }

    /// Serve tasks until every worker has called `finish_thread`
    pub fn listen(&self) {
        let mut state = self.state.lock();
        loop {
            if let Some(task) = state.pending.take() {
                self.ready.notify_all();
                MutexGuard::unlocked(&mut state, task);
                state.completed += 1;
                self.ready.notify_all();
                continue;
            }
            if state.unfinished == 0 {
                break;
            }
            self.ready.wait(&mut state);
        }
        state.active = false;
    }
}

/// Like [`crate::parallelize`], but on dedicated threads that can reach the
/// calling thread through a [`MainThreadExecutor`]
///
/// The calling thread serves `run` requests until all workers are done.
/// The first failing block's error is returned.
pub fn parallelize_with_executor<T, F>(njobs: usize, nthreads: usize, f: F) -> Result<Vec<T>>
where
    T: Send,
    F: Fn(usize, usize, usize, &MainThreadExecutor) -> Result<T> + Sync,
{
    let blocks = job_blocks(njobs, nthreads);
    let executor = MainThreadExecutor::new();
    executor.initialize(blocks.len(), "main thread task failed");

    let results: Vec<Result<T>> = std::thread::scope(|scope| {
        let handles: Vec<_> = blocks
            .iter()
            .enumerate()
            .map(|(worker, &(start, length))| {
                let executor = &executor;
                let f = &f;
                scope.spawn(move || {
                    let out = catch_unwind(AssertUnwindSafe(|| f(worker, start, length, executor)));
                    executor.finish_thread();
                    out.unwrap_or_else(|payload| Err(Error::Worker(panic_message(payload, "worker panicked"))))
                })
            })
            .collect();

        executor.listen();
        handles
            .into_iter()
            .map(|handle| {
                handle
                    .join()
                    .unwrap_or_else(|payload| Err(Error::Worker(panic_message(payload, "worker panicked"))))
            })
            .collect()
    });
    results.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use chunkmat_core::ChunkError;

    use super::*;

    #[test]
    fn test_inline_without_session() {
        let executor = MainThreadExecutor::new();
        assert_eq!(executor.run(|| Ok(5)).unwrap(), 5);
        assert_eq!(
            executor.run(|| -> Result<()> { Err(ChunkError::CacheMisuse.into()) }),
            Err(ChunkError::CacheMisuse.into())
        );
    }

    #[test]
    fn test_tasks_run_on_calling_thread() {
        let main = std::thread::current().id();
        let out = parallelize_with_executor(12, 4, |_, start, length, executor| {
            let here = std::thread::current().id();
            let there = executor.run(|| Ok(std::thread::current().id()))?;
            assert_ne!(here, there);
            let doubled = executor.run(move || Ok((start..start + length).map(|x| 2 * x).sum::<usize>()))?;
            Ok((there, doubled))
        })
        .unwrap();
        assert_eq!(out.len(), 4);
        assert!(out.iter().all(|&(id, _)| id == main));
        assert_eq!(out.iter().map(|&(_, s)| s).sum::<usize>(), 132);
    }

    #[test]
    fn test_main_thread_panic() {
        let result = parallelize_with_executor(2, 2, |worker, _, _, executor| {
            executor.run(move || -> Result<()> {
                if worker == 1 {
                    panic!("runtime refused");
                }
                Ok(())
            })
        });
        assert_eq!(result, Err(Error::MainThread("runtime refused".into())));
    }

    #[test]
    fn test_first_worker_error() {
        let result = parallelize_with_executor(3, 3, |worker, _, _, _| {
            if worker == 0 {
                Ok(())
            } else {
                Err(Error::Worker(format!("worker {worker}")))
            }
        });
        assert_eq!(result, Err(Error::Worker("worker 1".into())));
    }
}
