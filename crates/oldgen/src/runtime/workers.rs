//! Worker Pool - Scoped Threads Claiming Task Indices
//!
//! `run_task(count, f)` calls `f(i)` exactly once for every `i` in
//! `0..count`. Indices are claimed from a shared atomic counter, so fast
//! workers simply take more of them. The calling thread participates as
//! worker 0; helpers are spawned for the duration of the call.

use crate::heap::page;
use std::any::Any;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Bytes each pretouch task covers
pub const PRETOUCH_CHUNK_SIZE: usize = 4 * 1024 * 1024;

/// Stack size for helper threads
const WORKER_STACK_SIZE: usize = 256 * 1024;

/// WorkerPool - fixed degree of parallelism for bulk generation work
#[derive(Debug, Clone)]
pub struct WorkerPool {
    /// Thread name prefix
    name: String,

    /// Maximum threads used by one task (including the caller)
    threads: usize,
}

impl WorkerPool {
    /// Create a pool using up to `threads` threads (at least one)
    pub fn new(threads: usize) -> Self {
        Self::with_name("oldgen-worker", threads)
    }

    pub fn with_name(name: &str, threads: usize) -> Self {
        Self {
            name: name.to_string(),
            threads: threads.max(1),
        }
    }

    /// Degree of parallelism
    pub fn threads(&self) -> usize {
        self.threads
    }

    /// Run `f(i)` for every `i` in `0..count`
    ///
    /// Returns once every index has been processed. A panic in any worker
    /// is re-raised on the calling thread.
    pub fn run_task<F>(&self, count: usize, f: F)
    where
        F: Fn(usize) + Sync,
    {
        if count == 0 {
            return;
        }

        let helpers = self.threads.min(count) - 1;
        if helpers == 0 {
            (0..count).for_each(&f);
            return;
        }

        let next = AtomicUsize::new(0);
        let drain = || loop {
            let index = next.fetch_add(1, Ordering::Relaxed);
            if index >= count {
                return;
            }
            f(index);
        };

        let result = crossbeam::scope(|s| {
            for id in 1..=helpers {
                let spawned = s
                    .builder()
                    .name(format!("{}-{}", self.name, id))
                    .stack_size(WORKER_STACK_SIZE)
                    .spawn(|_| drain());
                if let Err(e) = spawned {
                    // The caller drains whatever the missing helper would have.
                    log::warn!("Failed to spawn {}-{}: {}", self.name, id, e);
                    break;
                }
            }
            drain();
        });

        if let Err(panic) = result {
            // Helper panics arrive bundled; re-raise the first one as is.
            let payload: Box<dyn Any + Send> = match panic.downcast::<Vec<Box<dyn Any + Send>>>() {
                Ok(mut panics) if !panics.is_empty() => panics.swap_remove(0),
                Ok(_) => Box::new("worker panicked"),
                Err(other) => other,
            };
            std::panic::resume_unwind(payload);
        }
    }

    /// Fault in every page of `[start, end)` in parallel
    ///
    /// # Safety
    /// The whole range must be committed and writable.
    pub unsafe fn pretouch(&self, start: usize, end: usize, page_size: usize) {
        if start >= end {
            return;
        }

        let chunk = PRETOUCH_CHUNK_SIZE.max(page_size);
        let chunks = (end - start).div_ceil(chunk);
        self.run_task(chunks, |i| {
            let chunk_start = start + i * chunk;
            let chunk_end = (chunk_start + chunk).min(end);
            // SAFETY: chunk lies inside the caller's committed range.
            unsafe { page::pretouch_range(chunk_start, chunk_end, page_size) };
        });
    }
}

impl Default for WorkerPool {
    fn default() -> Self {
        Self::new(num_cpus::get().clamp(1, 8))
    }
}
