//! Timer Scheduling
//!
//! Replaces the host page's process-wide `setTimeout`/`setInterval` with an
//! injected scheduler that has an explicit lifecycle.
//!
//! ## Implementations
//!
//! - [`VirtualScheduler`]: deterministic virtual time, driven by the caller
//!   (`advance`, `advance_to`, `flush`). Used by tests and the simulator.
//! - [`TokioScheduler`]: real time on a tokio runtime. Every callback is run
//!   by a single event-loop task, so callbacks never overlap.
//!
//! ## Ordering
//!
//! Timers fire in non-decreasing order of their due time. Ties are broken by
//! scheduling order.

mod error;
mod tokio_loop;
mod virtual_time;

pub use error::{SchedulerError, SchedulerResult};
pub use tokio_loop::TokioScheduler;
pub use virtual_time::{VirtualScheduler, DEFAULT_STEP_LIMIT};

use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Handle identifying a registered timer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct TimerId(pub u64);

impl fmt::Display for TimerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "timer-{}", self.0)
    }
}

/// One-shot callback
pub type OnceJob = Box<dyn FnOnce() + Send + 'static>;

/// Repeating callback, invoked once per period
pub type RepeatJob = Arc<dyn Fn() + Send + Sync + 'static>;

/// Timer facility shared by every component of a page
///
/// Implementations must run callbacks to completion, one at a time.
pub trait Scheduler: Send + Sync {
    /// Time elapsed since the scheduler started
    fn now(&self) -> Duration;

    /// Run `job` once after `delay`
    fn schedule_once(&self, delay: Duration, job: OnceJob) -> SchedulerResult<TimerId>;

    /// Run `job` every `period`, first firing one period from now
    fn schedule_repeating(&self, period: Duration, job: RepeatJob) -> SchedulerResult<TimerId>;

    /// Cancel a pending timer. Returns false if it already fired or never existed.
    fn cancel(&self, id: TimerId) -> bool;

    /// Discard every pending timer and refuse new ones
    fn stop(&self);

    /// Whether the scheduler still accepts timers
    fn is_running(&self) -> bool;
}

/// Snapshot of a timer waiting in a scheduler queue
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PendingTimer {
    pub id: TimerId,
    pub due_at: Duration,
    pub order: u64,
    pub period: Option<Duration>,
}
