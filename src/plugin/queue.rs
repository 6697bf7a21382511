// src/plugin/queue.rs
// =============================================================================
// A small async work queue with bounded concurrency.
//
// How it works:
// 1. add() bumps the "total" counter and spawns a tokio task right away,
//    so the caller never waits
// 2. The spawned task waits for a semaphore permit (this is the concurrency
//    limit), then builds and runs the unit of work
// 3. When the work finishes the queue bumps "done", hands the output to the
//    completion hook, and fires the idle hook if nothing is left
//
// Both hooks run while the queue holds its bookkeeping lock. That keeps
// anything the completion hook counts in step with `done`, and guarantees
// the idle hook fires once per drain. Hooks must never call back into the
// queue.
//
// Rust concepts:
// - Generics: TaskQueue<T> works for any output type T
// - Semaphore: a pool of N permits, a task must hold one to run
// - catch_unwind: turns a panic inside a future into an Err we can log
// - Drop: QueueHold releases itself when it goes out of scope
// =============================================================================

use futures::FutureExt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;
use tokio::sync::Semaphore;
use tracing::{debug, error, trace};

/// Default number of tasks allowed to run at the same time
pub const DEFAULT_CONCURRENCY: usize = 8;

/// Counters describing the queue at one instant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueStats {
    /// Tasks ever added
    pub total: usize,
    /// Tasks that finished (successfully or by panicking)
    pub done: usize,
    /// Tasks waiting for a permit
    pub pending: usize,
    /// Tasks currently running
    pub running: usize,
    /// Outstanding holds (see TaskQueue::hold)
    pub holds: usize,
    /// Whole seconds since the queue was armed
    pub duration_secs: u64,
}

impl QueueStats {
    pub fn is_idle(&self) -> bool {
        self.pending == 0 && self.running == 0 && self.holds == 0
    }
}

/// Called with each task's output, right after `done` was bumped.
pub type CompletionHook<T> = Arc<dyn Fn(T, &QueueStats) + Send + Sync>;
/// Called when the queue goes from busy to idle.
pub type IdleHook = Arc<dyn Fn(&QueueStats) + Send + Sync>;

#[derive(Debug, Default)]
struct State {
    stats: QueueStats,
    armed: Option<Instant>,
}

impl State {
    fn snapshot(&self) -> QueueStats {
        QueueStats {
            duration_secs: self.armed.map(|t| t.elapsed().as_secs()).unwrap_or(0),
            ..self.stats
        }
    }
}

struct Inner<T> {
    state: Mutex<State>,
    permits: Arc<Semaphore>,
    on_complete: CompletionHook<T>,
    on_idle: IdleHook,
}

impl<T> Inner<T> {
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    // Fire the idle hook if this change emptied the queue.
    // Must be called with the state lock held (the guard proves it).
    fn notify_if_idle(&self, state: &MutexGuard<'_, State>) {
        let stats = state.snapshot();
        if stats.is_idle() {
            debug!(total = stats.total, done = stats.done, "queue drained");
            (self.on_idle)(&stats);
        }
    }
}

pub struct TaskQueue<T> {
    inner: Arc<Inner<T>>,
}

// Manual impl: derive(Clone) would wrongly require T: Clone
impl<T> Clone for TaskQueue<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Send + 'static> TaskQueue<T> {
    /// Create a queue that runs at most `concurrency` tasks at once
    /// (values below 1 are treated as 1).
    pub fn new(concurrency: usize, on_complete: CompletionHook<T>, on_idle: IdleHook) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(State::default()),
                permits: Arc::new(Semaphore::new(concurrency.max(1))),
                on_complete,
                on_idle,
            }),
        }
    }

    /// Start the duration clock. Later calls keep the first start time.
    pub fn arm(&self) {
        self.inner.lock().armed.get_or_insert_with(Instant::now);
    }

    /// Schedule a unit of work and return immediately.
    ///
    /// `task` is only called once a permit is available, so no work is
    /// started (and no future is built) before the queue decides to run it.
    /// Must be called from inside a tokio runtime.
    pub fn add<F, Fut>(&self, task: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = T> + Send + 'static,
    {
        {
            let mut state = self.inner.lock();
            state.armed.get_or_insert_with(Instant::now);
            state.stats.total += 1;
            state.stats.pending += 1;
            trace!(total = state.stats.total, "task added");
        }

        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            // We never close the semaphore, so acquiring cannot fail. If it
            // somehow did, running without a permit beats dropping the task.
            let _permit = Arc::clone(&inner.permits).acquire_owned().await.ok();

            {
                let mut state = inner.lock();
                state.stats.pending -= 1;
                state.stats.running += 1;
            }

            let output = AssertUnwindSafe(task()).catch_unwind().await;

            let mut state = inner.lock();
            state.stats.running -= 1;
            state.stats.done += 1;
            match output {
                Ok(value) => {
                    let stats = state.snapshot();
                    (inner.on_complete)(value, &stats);
                }
                Err(panic) => {
                    error!(panic = %panic_message(panic.as_ref()), "queued task panicked");
                }
            }
            inner.notify_if_idle(&state);
        });
    }

    /// Keep the queue from reporting idle until the returned guard is dropped.
    ///
    /// Used while work for the queue is still being computed, so the queue
    /// cannot look drained between "we found something" and "we added it".
    pub fn hold(&self) -> QueueHold<T> {
        self.inner.lock().stats.holds += 1;
        QueueHold {
            inner: Arc::clone(&self.inner),
        }
    }

    pub fn stats(&self) -> QueueStats {
        self.inner.lock().snapshot()
    }

    /// Run `f` against the stats while the queue cannot change.
    pub fn with_stats<R>(&self, f: impl FnOnce(&QueueStats) -> R) -> R {
        let state = self.inner.lock();
        f(&state.snapshot())
    }

    pub fn total(&self) -> usize {
        self.stats().total
    }

    pub fn done(&self) -> usize {
        self.stats().done
    }

    pub fn duration_secs(&self) -> u64 {
        self.stats().duration_secs
    }

    pub fn is_idle(&self) -> bool {
        self.stats().is_idle()
    }
}

/// Guard returned by TaskQueue::hold.
pub struct QueueHold<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Drop for QueueHold<T> {
    fn drop(&mut self) {
        let mut state = self.inner.lock();
        state.stats.holds -= 1;
        self.inner.notify_if_idle(&state);
    }
}

/// Best-effort text of a panic payload (panics carry &str or String).
pub fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
