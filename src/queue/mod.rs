//! In-process FIFO task queue.
//!
//! [`TaskQueue`] holds an ordered backlog of deferred async actions and runs
//! them strictly one at a time, in enqueue order. Two run modes are provided:
//!
//! - [`TaskQueue::run_once`] drains the backlog to empty and returns.
//! - [`TaskQueue::run_continuously`] keeps draining, picking up work enqueued
//!   while it runs, until [`TaskQueue::stop_when_queue_is_empty`] is called and
//!   the backlog has been emptied again.
//!
//! `TaskQueue` is a cheap, cloneable handle. Run the continuous loop on its own
//! task and keep a clone around to enqueue work and request the stop:
//!
//! ```rust
//! use taskrunner::TaskQueue;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), taskrunner::TaskError> {
//! let queue = TaskQueue::new();
//! let worker = tokio::spawn(queue.run_continuously());
//!
//! queue.enqueue(|| async {
//!     println!("hello from the queue");
//!     Ok(())
//! });
//! queue.stop_when_queue_is_empty();
//!
//! let executed = worker.await.expect("worker panicked")?;
//! assert_eq!(executed, 1);
//! # Ok(())
//! # }
//! ```
//!
//! ## Failure semantics
//!
//! Action errors are returned to whoever awaits the run, unchanged. The drain
//! stops at the failing action; entries queued behind it stay in the backlog.
//! A failure in continuous mode also ends continuous mode.

use std::collections::VecDeque;
use std::fmt;
use std::future::Future;
use std::pin::pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::{Mutex as AsyncMutex, Notify};
use tracing::{debug, info, trace};

use crate::config::QueueConfig;

pub mod action;

pub use action::{Action, ActionFuture, TaskError};

type Backlog<E> = VecDeque<Box<dyn Action<E>>>;

/// A FIFO queue of async actions executed one at a time.
///
/// `E` is the error type the queued actions fail with. It defaults to
/// [`TaskError`]; any `Send + 'static` type works.
pub struct TaskQueue<E = TaskError> {
    shared: Arc<Shared<E>>,
}

struct Shared<E> {
    config: QueueConfig,
    // Never held across an `.await`.
    backlog: Mutex<Backlog<E>>,
    running_continuously: AtomicBool,
    // Wakes an idle continuous loop on enqueue or stop.
    wake: Notify,
    // Held for a whole drain pass so two runners never overlap.
    drain_lock: AsyncMutex<()>,
}

impl TaskQueue<TaskError> {
    /// Creates an empty queue whose actions fail with [`TaskError`].
    pub fn new() -> Self {
        Self::default()
    }
}

impl<E> Default for TaskQueue<E>
where
    E: Send + 'static,
{
    fn default() -> Self {
        Self::with_config(QueueConfig::default())
    }
}

impl<E> Clone for TaskQueue<E> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<E> fmt::Debug for TaskQueue<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let pending = lock_backlog(&self.shared.backlog).len();
        f.debug_struct("TaskQueue")
            .field("name", &self.shared.config.name)
            .field("pending", &pending)
            .field(
                "running_continuously",
                &self.shared.running_continuously.load(Ordering::SeqCst),
            )
            .finish()
    }
}

impl<E> TaskQueue<E>
where
    E: Send + 'static,
{
    /// Creates an empty queue from `config`.
    pub fn with_config(config: QueueConfig) -> Self {
        let backlog = VecDeque::with_capacity(config.initial_capacity);
        Self {
            shared: Arc::new(Shared {
                config,
                backlog: Mutex::new(backlog),
                running_continuously: AtomicBool::new(false),
                wake: Notify::new(),
                drain_lock: AsyncMutex::new(()),
            }),
        }
    }

    /// Returns the config this queue was built with.
    pub fn config(&self) -> &QueueConfig {
        &self.shared.config
    }

    /// Appends `action` to the tail of the backlog.
    ///
    /// Never blocks and never fails. If a continuous run is idle waiting for
    /// work, it is woken up.
    ///
    /// # Examples
    ///
    /// ```
    /// use taskrunner::TaskQueue;
    ///
    /// let queue = TaskQueue::new();
    /// queue.enqueue(|| async { Ok(()) });
    /// assert_eq!(queue.len(), 1);
    /// ```
    pub fn enqueue<A>(&self, action: A)
    where
        A: Action<E>,
    {
        let pending = {
            let mut backlog = self.backlog();
            backlog.push_back(Box::new(action));
            backlog.len()
        };
        trace!(queue = %self.shared.config.name, pending, "task enqueued");
        self.shared.wake.notify_one();
    }

    /// Number of actions waiting to start.
    ///
    /// An action that is currently executing is no longer counted.
    pub fn len(&self) -> usize {
        self.backlog().len()
    }

    /// Returns `true` if no actions are waiting to start.
    pub fn is_empty(&self) -> bool {
        self.backlog().is_empty()
    }

    /// Drops every pending action without running it and returns how many
    /// were dropped. An action that is already executing is not affected.
    pub fn clear(&self) -> usize {
        let dropped = std::mem::take(&mut *self.backlog());
        let count = dropped.len();
        debug!(queue = %self.shared.config.name, dropped = count, "backlog cleared");
        count
    }

    /// Returns `true` between [`run_continuously`](Self::run_continuously)
    /// being called and a stop being requested, the run failing, or the run
    /// being dropped before it finished.
    pub fn is_running_continuously(&self) -> bool {
        self.shared.running_continuously.load(Ordering::SeqCst)
    }

    /// Executes queued actions one at a time until the backlog is empty.
    ///
    /// Actions enqueued while the drain is in progress, whether by a running
    /// action or by concurrent code during one of its suspension points, are
    /// executed in the same pass. Yields to the scheduler once before
    /// returning.
    ///
    /// The returned future owns a handle to the queue, so it can be awaited in
    /// place or handed to [`tokio::spawn`]. It resolves to the number of
    /// actions executed.
    ///
    /// # Errors
    ///
    /// Resolves to the first error produced by an action, unchanged. The drain
    /// stops there; actions queued behind the failing one are left in the
    /// backlog.
    ///
    /// # Deadlocks
    ///
    /// Only one drain runs at a time. An action that awaits `run_once` or
    /// `run_continuously` on its own queue waits for the drain it is part of
    /// and never completes. Enqueue the follow-up work instead: it runs in the
    /// same pass.
    pub fn run_once(&self) -> impl Future<Output = Result<usize, E>> + Send + use<E> {
        let queue = self.clone();
        async move {
            let executed = queue.drain().await?;
            tokio::task::yield_now().await;
            Ok(executed)
        }
    }

    /// Executes queued actions until stopped.
    ///
    /// Continuous mode is switched on as soon as this method is called, before
    /// the returned future is first polled, so a stop requested right after
    /// spawning the run is never lost. The future drains the backlog, then
    /// waits for more work and drains again, for as long as continuous mode is
    /// on. After [`stop_when_queue_is_empty`](Self::stop_when_queue_is_empty)
    /// it still finishes the in-flight action and everything already queued,
    /// and resolves once it observes an empty backlog.
    ///
    /// Resolves to the total number of actions executed during this run.
    ///
    /// # Errors
    ///
    /// Resolves to the first error produced by an action, unchanged.
    /// Continuous mode is switched off; call this method again to resume.
    ///
    /// Dropping the returned future before it resolves, including dropping it
    /// unpolled or aborting the task it was spawned on, also switches
    /// continuous mode off.
    ///
    /// # Deadlocks
    ///
    /// See [`run_once`](Self::run_once#deadlocks).
    pub fn run_continuously(&self) -> impl Future<Output = Result<usize, E>> + Send + use<E> {
        self.shared
            .running_continuously
            .store(true, Ordering::SeqCst);
        info!(queue = %self.shared.config.name, "continuous run started");

        let run = ContinuousRun {
            queue: self.clone(),
            finished: false,
        };
        async move {
            let mut run = run;
            let executed = run.queue.drain_until_stopped().await?;
            run.finished = true;

            info!(queue = %run.queue.shared.config.name, executed, "continuous run stopped");
            tokio::task::yield_now().await;
            Ok(executed)
        }
    }

    /// Asks a continuous run to return once the backlog is empty.
    ///
    /// This does not interrupt the action that is currently executing, nor
    /// discard anything already queued. It has no effect on
    /// [`run_once`](Self::run_once).
    pub fn stop_when_queue_is_empty(&self) {
        self.shared
            .running_continuously
            .store(false, Ordering::SeqCst);
        debug!(queue = %self.shared.config.name, "stop requested");
        // Every parked loop must see the cleared flag; the stored permit covers
        // a loop that is mid-drain and not yet waiting.
        self.shared.wake.notify_waiters();
        self.shared.wake.notify_one();
    }

    // Drain, then sleep until woken, until stopped with an empty backlog.
    async fn drain_until_stopped(&self) -> Result<usize, E> {
        let shared = &self.shared;
        let mut executed = 0;
        loop {
            executed += self.drain().await?;

            // Register for a wake-up before checking state so an enqueue or
            // stop landing in between is not missed.
            let mut notified = pin!(shared.wake.notified());
            notified.as_mut().enable();

            // Flag first: work enqueued before the stop must be seen below.
            let stopping = !shared.running_continuously.load(Ordering::SeqCst);
            if !self.is_empty() {
                continue;
            }
            if stopping {
                return Ok(executed);
            }
            notified.await;
        }
    }

    // One drain pass: pop, invoke, await, repeat until the backlog is empty.
    async fn drain(&self) -> Result<usize, E> {
        let _guard = self.shared.drain_lock.lock().await;
        let name = &self.shared.config.name;
        debug!(queue = %name, pending = self.len(), "drain started");

        let mut executed = 0;
        while let Some(action) = self.pop_front() {
            action.invoke().await?;
            executed += 1;
        }

        debug!(queue = %name, executed, "drain finished");
        Ok(executed)
    }

    fn pop_front(&self) -> Option<Box<dyn Action<E>>> {
        self.backlog().pop_front()
    }

    fn backlog(&self) -> MutexGuard<'_, Backlog<E>> {
        lock_backlog(&self.shared.backlog)
    }
}

// Switches continuous mode off when a run ends without observing a stop,
// whether it failed or its future was dropped.
struct ContinuousRun<E> {
    queue: TaskQueue<E>,
    finished: bool,
}

impl<E> Drop for ContinuousRun<E> {
    fn drop(&mut self) {
        if !self.finished {
            self.queue
                .shared
                .running_continuously
                .store(false, Ordering::SeqCst);
        }
    }
}

// The backlog is a plain `VecDeque`; a panic elsewhere cannot leave it torn.
fn lock_backlog<E>(backlog: &Mutex<Backlog<E>>) -> MutexGuard<'_, Backlog<E>> {
    backlog.lock().unwrap_or_else(PoisonError::into_inner)
}
