//! Cancellable deferred tasks.
//!
//! [`TokioScheduler`] runs tasks on a tokio runtime after a real (or paused)
//! delay. [`ManualScheduler`] keeps a virtual clock that only moves when
//! [`ManualScheduler::advance`] is called, for deterministic tests and for
//! hosts that drive their own event loop.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::trace;

/// A deferred unit of work.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Runs tasks after a delay.
pub trait Scheduler: Send + Sync {
    /// Run `task` once `delay` has elapsed, unless the returned handle is
    /// cancelled first.
    fn schedule(&self, delay: Duration, task: Task) -> TaskHandle;
}

/// Handle to a scheduled task.
pub struct TaskHandle {
    cancelled: Arc<AtomicBool>,
    join: Option<JoinHandle<()>>,
}

impl TaskHandle {
    fn new(cancelled: Arc<AtomicBool>, join: Option<JoinHandle<()>>) -> Self {
        Self { cancelled, join }
    }

    /// Prevent the task from running. No effect once it has started.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        if let Some(join) = &self.join {
            join.abort();
        }
    }

    /// Whether [`cancel`](Self::cancel) was called.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

impl fmt::Debug for TaskHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskHandle")
            .field("cancelled", &self.is_cancelled())
            .finish_non_exhaustive()
    }
}

/// Scheduler backed by a tokio runtime.
#[derive(Clone, Debug)]
pub struct TokioScheduler {
    handle: Handle,
}

impl TokioScheduler {
    /// Schedule onto the given runtime.
    #[must_use]
    pub const fn new(handle: Handle) -> Self {
        Self { handle }
    }

    /// Schedule onto the runtime of the calling context, if any.
    #[must_use]
    pub fn try_current() -> Option<Self> {
        Handle::try_current().ok().map(Self::new)
    }
}

impl Scheduler for TokioScheduler {
    fn schedule(&self, delay: Duration, task: Task) -> TaskHandle {
        let cancelled = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&cancelled);
        let join = self.handle.spawn(async move {
            tokio::time::sleep(delay).await;
            if flag.load(Ordering::SeqCst) {
                return;
            }
            task();
        });
        TaskHandle::new(cancelled, Some(join))
    }
}

struct ManualTask {
    due: Duration,
    seq: u64,
    cancelled: Arc<AtomicBool>,
    task: Task,
}

#[derive(Default)]
struct ManualQueue {
    now: Duration,
    seq: u64,
    tasks: Vec<ManualTask>,
}

/// Virtual-time scheduler.
///
/// Tasks run on the thread calling [`advance`](Self::advance), in due-time
/// order (ties in scheduling order). A running task may schedule further
/// tasks; those run in the same call if they fall due before its end.
#[derive(Default)]
pub struct ManualScheduler {
    queue: Mutex<ManualQueue>,
}

impl ManualScheduler {
    /// Create a scheduler at virtual time zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Virtual time elapsed since creation.
    #[must_use]
    pub fn now(&self) -> Duration {
        self.lock().now
    }

    /// Number of tasks scheduled and not yet run or cancelled.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.lock()
            .tasks
            .iter()
            .filter(|task| !task.cancelled.load(Ordering::SeqCst))
            .count()
    }

    /// Move the clock forward by `by`, running every task that falls due.
    /// Returns how many tasks ran.
    pub fn advance(&self, by: Duration) -> usize {
        let target = self.lock().now + by;
        let mut ran = 0;
        while let Some(task) = self.pop_due(target) {
            task();
            ran += 1;
        }
        self.lock().now = target;
        ran
    }

    /// Run everything currently queued, regardless of due time.
    pub fn run_all(&self) -> usize {
        let latest = {
            let queue = self.lock();
            queue
                .tasks
                .iter()
                .map(|task| task.due)
                .max()
                .unwrap_or(queue.now)
        };
        let now = self.now();
        self.advance(latest.saturating_sub(now))
    }

    fn pop_due(&self, target: Duration) -> Option<Task> {
        let mut queue = self.lock();
        queue
            .tasks
            .retain(|task| !task.cancelled.load(Ordering::SeqCst));
        let index = queue
            .tasks
            .iter()
            .enumerate()
            .filter(|(_, task)| task.due <= target)
            .min_by_key(|(_, task)| (task.due, task.seq))
            .map(|(index, _)| index)?;
        let next = queue.tasks.swap_remove(index);
        queue.now = next.due;
        trace!(due_ms = next.due.as_millis(), "running scheduled task");
        Some(next.task)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ManualQueue> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for ManualScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManualScheduler")
            .field("now", &self.now())
            .field("pending", &self.pending())
            .finish()
    }
}

impl Scheduler for ManualScheduler {
    fn schedule(&self, delay: Duration, task: Task) -> TaskHandle {
        let cancelled = Arc::new(AtomicBool::new(false));
        let mut queue = self.lock();
        let due = queue.now + delay;
        let seq = queue.seq;
        queue.seq += 1;
        queue.tasks.push(ManualTask {
            due,
            seq,
            cancelled: Arc::clone(&cancelled),
            task,
        });
        TaskHandle::new(cancelled, None)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use super::*;

    fn recorder() -> (Arc<Mutex<Vec<&'static str>>>, impl Fn(&'static str) -> Task) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&log);
        let make = move |name: &'static str| -> Task {
            let sink = Arc::clone(&sink);
            Box::new(move || sink.lock().unwrap().push(name))
        };
        (log, make)
    }

    #[test]
    fn test_manual_runs_in_due_order() {
        let scheduler = ManualScheduler::new();
        let (log, task) = recorder();
        scheduler.schedule(Duration::from_millis(300), task("c"));
        scheduler.schedule(Duration::from_millis(100), task("a"));
        scheduler.schedule(Duration::from_millis(100), task("b"));

        assert_eq!(scheduler.advance(Duration::from_millis(99)), 0);
        assert_eq!(scheduler.advance(Duration::from_millis(1)), 2);
        assert_eq!(*log.lock().unwrap(), ["a", "b"]);
        assert_eq!(scheduler.pending(), 1);

        scheduler.advance(Duration::from_millis(200));
        assert_eq!(*log.lock().unwrap(), ["a", "b", "c"]);
        assert_eq!(scheduler.now(), Duration::from_millis(300));
    }

    #[test]
    fn test_manual_cancel() {
        let scheduler = ManualScheduler::new();
        let (log, task) = recorder();
        let handle = scheduler.schedule(Duration::from_millis(10), task("x"));
        handle.cancel();
        assert!(handle.is_cancelled());
        assert_eq!(scheduler.pending(), 0);
        assert_eq!(scheduler.advance(Duration::from_secs(1)), 0);
        assert!(log.lock().unwrap().is_empty());
    }

    #[test]
    fn test_manual_task_can_reschedule() {
        let scheduler = Arc::new(ManualScheduler::new());
        let count = Arc::new(AtomicUsize::new(0));
        let inner_scheduler = Arc::clone(&scheduler);
        let inner_count = Arc::clone(&count);
        scheduler.schedule(
            Duration::from_millis(10),
            Box::new(move || {
                inner_count.fetch_add(1, Ordering::SeqCst);
                let again = Arc::clone(&inner_count);
                inner_scheduler.schedule(
                    Duration::from_millis(10),
                    Box::new(move || {
                        again.fetch_add(1, Ordering::SeqCst);
                    }),
                );
            }),
        );

        assert_eq!(scheduler.advance(Duration::from_millis(20)), 2);
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_run_all() {
        let scheduler = ManualScheduler::new();
        let (log, task) = recorder();
        scheduler.schedule(Duration::from_secs(5), task("late"));
        assert_eq!(scheduler.run_all(), 1);
        assert_eq!(*log.lock().unwrap(), ["late"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_tokio_scheduler_fires_after_delay() {
        let scheduler = TokioScheduler::try_current().unwrap();
        let (log, task) = recorder();
        scheduler.schedule(Duration::from_millis(500), task("fired"));
        let cancelled = scheduler.schedule(Duration::from_millis(500), task("cancelled"));
        cancelled.cancel();

        tokio::time::sleep(Duration::from_millis(499)).await;
        assert!(log.lock().unwrap().is_empty());
        tokio::time::sleep(Duration::from_millis(2)).await;
        assert_eq!(*log.lock().unwrap(), ["fired"]);
    }
}
