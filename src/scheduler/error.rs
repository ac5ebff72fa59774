//! Scheduler error types

use thiserror::Error;

/// Errors that can occur when registering or running timers
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchedulerError {
    /// The scheduler was stopped; no new timers are accepted
    #[error("Scheduler is stopped")]
    Stopped,

    /// Repeating timers need a non-zero period
    #[error("Invalid period: repeating timers require a period greater than zero")]
    InvalidPeriod,

    /// A run exceeded its step budget (usually an interval that never ends)
    #[error("Timer run exceeded {limit} steps with {pending} timers still pending")]
    StepLimit { limit: usize, pending: usize },

    /// Virtual time can only move forward
    #[error("Cannot move time backwards: target {target_ms}ms is before now {now_ms}ms")]
    TimeTravel { target_ms: u128, now_ms: u128 },
}

/// Result type alias for scheduler operations
pub type SchedulerResult<T> = Result<T, SchedulerError>;
