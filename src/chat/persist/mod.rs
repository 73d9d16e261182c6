//! Deferred task scheduling and debounced persistence.

pub mod debounce;
pub mod scheduler;

pub use debounce::{DebouncedWriter, FlushFn};
pub use scheduler::{ManualScheduler, Scheduler, Task, TaskHandle, TokioScheduler};
