//! Virtual Time Scheduler
//!
//! Deterministic timer queue. Time only moves when the owner calls
//! [`VirtualScheduler::advance`], [`VirtualScheduler::advance_to`],
//! [`VirtualScheduler::run_next`] or [`VirtualScheduler::flush`].
//!
//! Callbacks run on the caller's thread with the queue unlocked, so a
//! callback may schedule, cancel or stop freely.

use super::{
    OnceJob, PendingTimer, RepeatJob, Scheduler, SchedulerError, SchedulerResult, TimerId,
};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// Maximum callbacks a [`VirtualScheduler::flush`] may execute, and the
/// maximum callbacks an `advance` may execute at a single virtual instant
pub const DEFAULT_STEP_LIMIT: usize = 10_000;

enum TaskJob {
    Once(OnceJob),
    Repeat(RepeatJob),
}

struct ScheduledTask {
    id: TimerId,
    due_at: Duration,
    order: u64,
    period: Option<Duration>,
    job: TaskJob,
}

struct Inner {
    now: Duration,
    queue: Vec<ScheduledTask>,
    next_id: u64,
    next_order: u64,
    running: bool,
    step_limit: usize,
}

impl Inner {
    fn push(&mut self, id: TimerId, due_at: Duration, period: Option<Duration>, job: TaskJob) {
        let order = self.next_order;
        self.next_order += 1;
        self.queue.push(ScheduledTask {
            id,
            due_at,
            order,
            period,
            job,
        });
    }

    fn allocate_id(&mut self) -> TimerId {
        let id = TimerId(self.next_id);
        self.next_id += 1;
        id
    }

    fn next_index(&self, due_limit: Option<Duration>) -> Option<usize> {
        self.queue
            .iter()
            .enumerate()
            .filter(|(_, task)| due_limit.map_or(true, |limit| task.due_at <= limit))
            .min_by_key(|(_, task)| (task.due_at, task.order))
            .map(|(idx, _)| idx)
    }
}

/// Scheduler driven by explicit calls instead of the wall clock
pub struct VirtualScheduler {
    inner: Mutex<Inner>,
}

impl VirtualScheduler {
    /// Create a scheduler at virtual time zero
    pub fn new() -> Self {
        Self::with_step_limit(DEFAULT_STEP_LIMIT)
    }

    /// Create a scheduler with a custom per-run step budget
    pub fn with_step_limit(step_limit: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                now: Duration::ZERO,
                queue: Vec::new(),
                next_id: 1,
                next_order: 0,
                running: true,
                step_limit,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Move time forward by `delta`, running every timer that falls due
    ///
    /// Returns the number of callbacks executed.
    pub fn advance(&self, delta: Duration) -> SchedulerResult<usize> {
        let target = self.now().saturating_add(delta);
        self.advance_to(target)
    }

    /// Move time forward to `target`, running every timer due at or before it
    pub fn advance_to(&self, target: Duration) -> SchedulerResult<usize> {
        let now = self.now();
        if target < now {
            return Err(SchedulerError::TimeTravel {
                target_ms: target.as_millis(),
                now_ms: now.as_millis(),
            });
        }

        let ran = self.run_queue(Some(target))?;

        let mut inner = self.lock();
        if inner.now < target {
            inner.now = target;
        }
        tracing::trace!(to_ms = target.as_millis() as u64, ran, "Virtual time advanced");
        Ok(ran)
    }

    /// Run only the timers already due at the current time
    pub fn run_due(&self) -> SchedulerResult<usize> {
        let now = self.now();
        self.run_queue(Some(now))
    }

    /// Run the next pending timer, jumping time to its due point
    ///
    /// Returns false when nothing is pending.
    pub fn run_next(&self) -> SchedulerResult<bool> {
        Ok(self.run_steps(None, Some(1))? == 1)
    }

    /// Run timers until the queue is empty
    ///
    /// Fails with [`SchedulerError::StepLimit`] when repeating timers keep the
    /// queue alive past the step budget. `advance` and `advance_to` have a
    /// fixed end and are only limited per virtual instant.
    pub fn flush(&self) -> SchedulerResult<usize> {
        self.run_queue(None)
    }

    /// Timers still waiting, in firing order
    pub fn pending(&self) -> Vec<PendingTimer> {
        let inner = self.lock();
        let mut timers: Vec<PendingTimer> = inner
            .queue
            .iter()
            .map(|task| PendingTimer {
                id: task.id,
                due_at: task.due_at,
                order: task.order,
                period: task.period,
            })
            .collect();
        timers.sort_by_key(|timer| (timer.due_at, timer.order));
        timers
    }

    /// Number of timers waiting
    pub fn pending_count(&self) -> usize {
        self.lock().queue.len()
    }

    fn run_queue(&self, due_limit: Option<Duration>) -> SchedulerResult<usize> {
        self.run_steps(due_limit, None)
    }

    /// Bounded runs (`due_limit` set) only count callbacks sharing one
    /// virtual instant against the step limit, so long spans of ordinary
    /// timers always complete. Unbounded runs count every callback.
    fn run_steps(
        &self,
        due_limit: Option<Duration>,
        max_runs: Option<usize>,
    ) -> SchedulerResult<usize> {
        let mut steps = 0usize;
        let mut instant = None;
        let mut at_instant = 0usize;

        loop {
            if max_runs.map_or(false, |max| steps >= max) {
                break;
            }

            let job = {
                let mut inner = self.lock();
                if !inner.running {
                    break;
                }
                let Some(idx) = inner.next_index(due_limit) else {
                    break;
                };

                let due_at = inner.queue[idx].due_at;
                if instant != Some(due_at) {
                    instant = Some(due_at);
                    at_instant = 0;
                }
                let used = if due_limit.is_some() { at_instant } else { steps };
                if used >= inner.step_limit {
                    return Err(SchedulerError::StepLimit {
                        limit: inner.step_limit,
                        pending: inner.queue.len(),
                    });
                }

                let task = inner.queue.remove(idx);
                if task.due_at > inner.now {
                    inner.now = task.due_at;
                }

                tracing::trace!(
                    timer = %task.id,
                    due_ms = task.due_at.as_millis() as u64,
                    "Running timer"
                );

                match task.job {
                    TaskJob::Once(job) => job,
                    TaskJob::Repeat(job) => {
                        // Re-queue before running so the callback can cancel itself
                        let period = task.period.unwrap_or(Duration::ZERO);
                        let due_at = task.due_at.saturating_add(period);
                        let next = TaskJob::Repeat(Arc::clone(&job));
                        inner.push(task.id, due_at, task.period, next);
                        Box::new(move || job()) as OnceJob
                    }
                }
            };

            steps += 1;
            at_instant += 1;
            job();
        }

        Ok(steps)
    }
}

impl Default for VirtualScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler for VirtualScheduler {
    fn now(&self) -> Duration {
        self.lock().now
    }

    fn schedule_once(&self, delay: Duration, job: OnceJob) -> SchedulerResult<TimerId> {
        let mut inner = self.lock();
        if !inner.running {
            return Err(SchedulerError::Stopped);
        }

        let id = inner.allocate_id();
        let due_at = inner.now.saturating_add(delay);
        inner.push(id, due_at, None, TaskJob::Once(job));

        tracing::trace!(timer = %id, delay_ms = delay.as_millis() as u64, "Scheduled timeout");
        Ok(id)
    }

    fn schedule_repeating(&self, period: Duration, job: RepeatJob) -> SchedulerResult<TimerId> {
        if period.is_zero() {
            return Err(SchedulerError::InvalidPeriod);
        }

        let mut inner = self.lock();
        if !inner.running {
            return Err(SchedulerError::Stopped);
        }

        let id = inner.allocate_id();
        let due_at = inner.now.saturating_add(period);
        inner.push(id, due_at, Some(period), TaskJob::Repeat(job));

        tracing::trace!(timer = %id, period_ms = period.as_millis() as u64, "Scheduled interval");
        Ok(id)
    }

    fn cancel(&self, id: TimerId) -> bool {
        let mut inner = self.lock();
        let before = inner.queue.len();
        inner.queue.retain(|task| task.id != id);
        inner.queue.len() != before
    }

    fn stop(&self) {
        let mut inner = self.lock();
        let discarded = inner.queue.len();
        inner.queue.clear();
        inner.running = false;
        tracing::debug!(discarded, "Virtual scheduler stopped");
    }

    fn is_running(&self) -> bool {
        self.lock().running
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(value: u64) -> Duration {
        Duration::from_millis(value)
    }

    fn recorder() -> (Arc<Mutex<Vec<&'static str>>>, impl Fn(&'static str) -> OnceJob) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let log_clone = Arc::clone(&log);
        let make = move |label: &'static str| -> OnceJob {
            let log = Arc::clone(&log_clone);
            Box::new(move || log.lock().unwrap().push(label))
        };
        (log, make)
    }

    #[test]
    fn test_runs_in_due_order_with_ties_by_schedule_order() {
        let scheduler = VirtualScheduler::new();
        let (log, job) = recorder();

        scheduler.schedule_once(ms(200), job("late")).unwrap();
        scheduler.schedule_once(ms(100), job("first-tie")).unwrap();
        scheduler.schedule_once(ms(100), job("second-tie")).unwrap();
        scheduler.schedule_once(ms(0), job("immediate")).unwrap();

        let ran = scheduler.flush().unwrap();
        assert_eq!(ran, 4);
        assert_eq!(
            *log.lock().unwrap(),
            vec!["immediate", "first-tie", "second-tie", "late"]
        );
        assert_eq!(scheduler.now(), ms(200));
    }

    #[test]
    fn test_advance_runs_only_due_timers() {
        let scheduler = VirtualScheduler::new();
        let (log, job) = recorder();

        scheduler.schedule_once(ms(50), job("a")).unwrap();
        scheduler.schedule_once(ms(150), job("b")).unwrap();

        assert_eq!(scheduler.advance(ms(100)).unwrap(), 1);
        assert_eq!(*log.lock().unwrap(), vec!["a"]);
        assert_eq!(scheduler.now(), ms(100));
        assert_eq!(scheduler.pending_count(), 1);

        assert_eq!(scheduler.advance(ms(49)).unwrap(), 0);
        assert_eq!(scheduler.advance(ms(1)).unwrap(), 1);
        assert_eq!(*log.lock().unwrap(), vec!["a", "b"]);
    }

    #[test]
    fn test_callback_sees_its_own_due_time() {
        let scheduler = Arc::new(VirtualScheduler::new());
        let seen = Arc::new(Mutex::new(None));

        let inner = Arc::clone(&scheduler);
        let seen_clone = Arc::clone(&seen);
        scheduler
            .schedule_once(
                ms(30),
                Box::new(move || {
                    *seen_clone.lock().unwrap() = Some(inner.now());
                }),
            )
            .unwrap();

        scheduler.advance(ms(500)).unwrap();
        assert_eq!(*seen.lock().unwrap(), Some(ms(30)));
        assert_eq!(scheduler.now(), ms(500));
    }

    #[test]
    fn test_repeating_timer_fires_every_period() {
        let scheduler = VirtualScheduler::new();
        let count = Arc::new(Mutex::new(0u32));

        let count_clone = Arc::clone(&count);
        scheduler
            .schedule_repeating(
                ms(1000),
                Arc::new(move || *count_clone.lock().unwrap() += 1),
            )
            .unwrap();

        scheduler.advance(ms(999)).unwrap();
        assert_eq!(*count.lock().unwrap(), 0);

        scheduler.advance(ms(4001)).unwrap();
        assert_eq!(*count.lock().unwrap(), 5);
        assert_eq!(scheduler.pending()[0].due_at, ms(6000));
    }

    #[test]
    fn test_zero_period_rejected() {
        let scheduler = VirtualScheduler::new();
        let result = scheduler.schedule_repeating(Duration::ZERO, Arc::new(|| {}));
        assert_eq!(result, Err(SchedulerError::InvalidPeriod));
    }

    #[test]
    fn test_flush_with_interval_hits_step_limit() {
        let scheduler = VirtualScheduler::with_step_limit(20);
        scheduler
            .schedule_repeating(ms(10), Arc::new(|| {}))
            .unwrap();

        let err = scheduler.flush().unwrap_err();
        assert!(matches!(err, SchedulerError::StepLimit { limit: 20, .. }));
    }

    #[test]
    fn test_advance_is_not_capped_by_step_limit() {
        let scheduler = VirtualScheduler::with_step_limit(20);
        let count = Arc::new(Mutex::new(0u32));

        let count_clone = Arc::clone(&count);
        scheduler
            .schedule_repeating(ms(10), Arc::new(move || *count_clone.lock().unwrap() += 1))
            .unwrap();
        for i in 0..50 {
            scheduler.schedule_once(ms(i * 7), Box::new(|| {})).unwrap();
        }

        assert_eq!(scheduler.advance(ms(1000)).unwrap(), 150);
        assert_eq!(*count.lock().unwrap(), 100);
        assert_eq!(scheduler.now(), ms(1000));
    }

    fn respawn(scheduler: Arc<VirtualScheduler>) {
        let inner = Arc::clone(&scheduler);
        let _ = scheduler.schedule_once(Duration::ZERO, Box::new(move || respawn(inner)));
    }

    #[test]
    fn test_advance_catches_work_stuck_at_one_instant() {
        let scheduler = Arc::new(VirtualScheduler::with_step_limit(20));
        respawn(Arc::clone(&scheduler));

        let err = scheduler.advance(ms(10)).unwrap_err();
        assert!(matches!(err, SchedulerError::StepLimit { limit: 20, .. }));
        assert_eq!(scheduler.now(), Duration::ZERO);
        scheduler.stop();
    }

    #[test]
    fn test_callback_can_schedule_more_work() {
        let scheduler = Arc::new(VirtualScheduler::new());
        let (log, job) = recorder();
        let follow_up = job("follow-up");

        let inner = Arc::clone(&scheduler);
        scheduler
            .schedule_once(
                ms(10),
                Box::new(move || {
                    inner.schedule_once(ms(10), follow_up).unwrap();
                }),
            )
            .unwrap();

        scheduler.advance(ms(15)).unwrap();
        assert!(log.lock().unwrap().is_empty());

        scheduler.advance(ms(5)).unwrap();
        assert_eq!(*log.lock().unwrap(), vec!["follow-up"]);
    }

    #[test]
    fn test_cancel_pending_timer() {
        let scheduler = VirtualScheduler::new();
        let (log, job) = recorder();

        let id = scheduler.schedule_once(ms(10), job("cancelled")).unwrap();
        assert!(scheduler.cancel(id));
        assert!(!scheduler.cancel(id));

        scheduler.flush().unwrap();
        assert!(log.lock().unwrap().is_empty());
    }

    #[test]
    fn test_interval_can_cancel_itself() {
        let scheduler = Arc::new(VirtualScheduler::new());
        let count = Arc::new(Mutex::new(0u32));
        let id_slot: Arc<Mutex<Option<TimerId>>> = Arc::new(Mutex::new(None));

        let inner = Arc::clone(&scheduler);
        let count_clone = Arc::clone(&count);
        let slot_clone = Arc::clone(&id_slot);
        let id = scheduler
            .schedule_repeating(
                ms(100),
                Arc::new(move || {
                    let mut count = count_clone.lock().unwrap();
                    *count += 1;
                    if *count == 3 {
                        if let Some(id) = *slot_clone.lock().unwrap() {
                            inner.cancel(id);
                        }
                    }
                }),
            )
            .unwrap();
        *id_slot.lock().unwrap() = Some(id);

        scheduler.flush().unwrap();
        assert_eq!(*count.lock().unwrap(), 3);
        assert_eq!(scheduler.pending_count(), 0);
    }

    #[test]
    fn test_stop_discards_and_refuses() {
        let scheduler = Arc::new(VirtualScheduler::new());
        let (log, job) = recorder();

        let inner = Arc::clone(&scheduler);
        scheduler
            .schedule_once(ms(10), Box::new(move || inner.stop()))
            .unwrap();
        scheduler.schedule_once(ms(20), job("never")).unwrap();

        assert_eq!(scheduler.flush().unwrap(), 1);
        assert!(!scheduler.is_running());
        assert!(log.lock().unwrap().is_empty());
        assert_eq!(scheduler.pending_count(), 0);

        let result = scheduler.schedule_once(ms(1), job("refused"));
        assert_eq!(result, Err(SchedulerError::Stopped));
    }

    #[test]
    fn test_advance_to_rejects_past() {
        let scheduler = VirtualScheduler::new();
        scheduler.advance(ms(100)).unwrap();

        let err = scheduler.advance_to(ms(50)).unwrap_err();
        assert!(matches!(err, SchedulerError::TimeTravel { .. }));
    }

    #[test]
    fn test_run_next_jumps_to_due_time() {
        let scheduler = VirtualScheduler::new();
        let (log, job) = recorder();

        scheduler.schedule_once(ms(300), job("a")).unwrap();
        scheduler.schedule_once(ms(700), job("b")).unwrap();

        assert!(scheduler.run_next().unwrap());
        assert_eq!(scheduler.now(), ms(300));
        assert_eq!(*log.lock().unwrap(), vec!["a"]);

        assert!(scheduler.run_next().unwrap());
        assert!(!scheduler.run_next().unwrap());
        assert_eq!(scheduler.now(), ms(700));
    }
}
