//! Debounced persistence.
//!
//! Each [`DebouncedWriter::schedule`] cancels the pending write and queues a
//! new one. The flush function runs when the task fires and reads whatever
//! state is current at that moment, so a burst of mutations costs one write.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tracing::{debug, warn};

use crate::chat::core::errors::StorageResult;
use crate::chat::persist::scheduler::{Scheduler, TaskHandle};

/// Writes the current state to storage.
pub type FlushFn = Arc<dyn Fn() -> StorageResult<()> + Send + Sync>;

/// Generation counters: a write is outstanding while `saved < requested`.
#[derive(Debug, Default)]
struct Generations {
    requested: AtomicU64,
    saved: AtomicU64,
}

impl Generations {
    fn request(&self) -> u64 {
        self.requested.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn mark_saved(&self, generation: u64) {
        self.saved.fetch_max(generation, Ordering::SeqCst);
    }

    fn is_dirty(&self) -> bool {
        self.saved.load(Ordering::SeqCst) < self.requested.load(Ordering::SeqCst)
    }
}

/// Coalesces write requests into one delayed flush.
pub struct DebouncedWriter {
    scheduler: Arc<dyn Scheduler>,
    delay: Duration,
    flush: FlushFn,
    generations: Arc<Generations>,
    pending: Option<TaskHandle>,
}

impl DebouncedWriter {
    /// Create a writer that calls `flush` `delay` after the last request.
    #[must_use]
    pub fn new(scheduler: Arc<dyn Scheduler>, delay: Duration, flush: FlushFn) -> Self {
        Self {
            scheduler,
            delay,
            flush,
            generations: Arc::new(Generations::default()),
            pending: None,
        }
    }

    /// Request a write, replacing any pending one.
    pub fn schedule(&mut self) {
        if let Some(pending) = self.pending.take() {
            pending.cancel();
        }

        let generation = self.generations.request();
        let flush = Arc::clone(&self.flush);
        let generations = Arc::clone(&self.generations);
        let handle = self.scheduler.schedule(
            self.delay,
            Box::new(move || run_flush(&flush, &generations, generation)),
        );
        self.pending = Some(handle);
    }

    /// Cancel the pending write and flush immediately.
    ///
    /// # Errors
    /// Returns the storage error if the write fails; the writer stays dirty.
    pub fn flush_now(&mut self) -> StorageResult<()> {
        self.cancel();
        let generation = self.generations.requested.load(Ordering::SeqCst);
        (self.flush)()?;
        self.generations.mark_saved(generation);
        Ok(())
    }

    /// Drop the pending write without flushing.
    pub fn cancel(&mut self) {
        if let Some(pending) = self.pending.take() {
            pending.cancel();
        }
    }

    /// Whether a requested write has not reached storage yet.
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.generations.is_dirty()
    }

    /// Configured debounce delay.
    #[must_use]
    pub const fn delay(&self) -> Duration {
        self.delay
    }
}

impl fmt::Debug for DebouncedWriter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DebouncedWriter")
            .field("delay", &self.delay)
            .field("dirty", &self.is_dirty())
            .field("pending", &self.pending)
            .finish_non_exhaustive()
    }
}

fn run_flush(flush: &FlushFn, generations: &Generations, generation: u64) {
    match flush() {
        Ok(()) => {
            generations.mark_saved(generation);
            debug!(generation, "debounced write completed");
        }
        Err(err) => warn!(error = %err, "debounced write failed"),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use super::*;
    use crate::chat::core::errors::StorageError;
    use crate::chat::persist::scheduler::ManualScheduler;

    fn counting_writer(
        scheduler: &Arc<ManualScheduler>,
        fail: bool,
    ) -> (DebouncedWriter, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let flush: FlushFn = Arc::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            if fail {
                Err(StorageError::QuotaExceeded {
                    needed: 1,
                    available: 0,
                })
            } else {
                Ok(())
            }
        });
        let writer = DebouncedWriter::new(scheduler.clone(), Duration::from_millis(500), flush);
        (writer, calls)
    }

    #[test]
    fn test_burst_coalesces_into_one_write() {
        let scheduler = Arc::new(ManualScheduler::new());
        let (mut writer, calls) = counting_writer(&scheduler, false);

        for _ in 0..5 {
            writer.schedule();
            scheduler.advance(Duration::from_millis(100));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(writer.is_dirty());

        scheduler.advance(Duration::from_millis(400));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(!writer.is_dirty());
    }

    #[test]
    fn test_flush_now_cancels_pending() {
        let scheduler = Arc::new(ManualScheduler::new());
        let (mut writer, calls) = counting_writer(&scheduler, false);

        writer.schedule();
        writer.flush_now().unwrap();
        assert!(!writer.is_dirty());
        scheduler.advance(Duration::from_secs(1));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_failed_write_stays_dirty() {
        let scheduler = Arc::new(ManualScheduler::new());
        let (mut writer, calls) = counting_writer(&scheduler, true);

        writer.schedule();
        scheduler.advance(Duration::from_millis(500));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(writer.is_dirty());
        assert!(writer.flush_now().is_err());
    }

    #[test]
    fn test_cancel_keeps_dirty() {
        let scheduler = Arc::new(ManualScheduler::new());
        let (mut writer, calls) = counting_writer(&scheduler, false);
        writer.schedule();
        writer.cancel();
        scheduler.advance(Duration::from_secs(1));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(writer.is_dirty());
    }
}
