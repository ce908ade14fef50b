use crate::telemetry::log::LogManager;
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared flag a caller sets to abandon a batch between items.
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag {
    cancelled: Arc<AtomicBool>,
}

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Items completed before (or despite) a cancellation, in input order.
#[derive(Debug, Clone)]
pub struct Partial<R> {
    pub items: Vec<R>,
    pub cancelled: bool,
}

/// Worker pool for independent snapshot and window computations.
pub struct WorkerPool {
    pool: Option<ThreadPool>,
}

impl WorkerPool {
    /// Pool with `workers` threads, or one per core when `None`.
    pub fn new(workers: Option<usize>) -> Self {
        let mut builder = ThreadPoolBuilder::new().thread_name(|idx| format!("trackcore-{}", idx));
        if let Some(count) = workers {
            builder = builder.num_threads(count.max(1));
        }
        match builder.build() {
            Ok(pool) => Self { pool: Some(pool) },
            Err(err) => {
                LogManager::new("pool").warn(&format!(
                    "falling back to the global rayon pool: {}",
                    err
                ));
                Self { pool: None }
            }
        }
    }

    pub fn threads(&self) -> usize {
        match &self.pool {
            Some(pool) => pool.current_num_threads(),
            None => rayon::current_num_threads(),
        }
    }

    /// Applies `task` to every item in parallel. Items not yet started when
    /// `cancel` is raised are skipped; finished items are kept.
    pub fn map<T, R, F>(&self, items: &[T], cancel: &CancellationFlag, task: F) -> Partial<R>
    where
        T: Sync,
        R: Send,
        F: Fn(&T) -> R + Sync + Send,
    {
        let run = || {
            items
                .par_iter()
                .map(|item| {
                    if cancel.is_cancelled() {
                        None
                    } else {
                        Some(task(item))
                    }
                })
                .collect::<Vec<Option<R>>>()
        };
        let results = match &self.pool {
            Some(pool) => pool.install(run),
            None => run(),
        };

        let cancelled = results.iter().any(Option::is_none);
        Partial {
            items: results.into_iter().flatten().collect(),
            cancelled,
        }
    }
}

impl Default for WorkerPool {
    fn default() -> Self {
        Self::new(None)
    }
}
