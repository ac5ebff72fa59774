//! Tokio Scheduler
//!
//! Real-time timers on a tokio runtime. One event-loop task owns the timer
//! queue: it sleeps until the earliest due timer, runs it, and repeats.
//! Callbacks therefore run one at a time, in `(due time, scheduling order)`
//! order, whatever the runtime flavour.

use super::{OnceJob, RepeatJob, Scheduler, SchedulerError, SchedulerResult, TimerId};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Queue position: due instant, then scheduling order
type QueueKey = (Instant, u64);

enum TimerJob {
    Once(OnceJob),
    Repeat { period: Duration, job: RepeatJob },
}

struct Timer {
    id: TimerId,
    job: TimerJob,
}

#[derive(Default)]
struct TimerQueue {
    timers: BTreeMap<QueueKey, Timer>,
    keys: HashMap<TimerId, QueueKey>,
    next_order: u64,
}

impl TimerQueue {
    fn push(&mut self, due_at: Instant, timer: Timer) {
        let key = (due_at, self.next_order);
        self.next_order += 1;
        self.keys.insert(timer.id, key);
        self.timers.insert(key, timer);
    }

    fn remove(&mut self, id: TimerId) -> bool {
        match self.keys.remove(&id) {
            Some(key) => self.timers.remove(&key).is_some(),
            None => false,
        }
    }

    fn next_due(&self) -> Option<Instant> {
        self.timers.keys().next().map(|(due_at, _)| *due_at)
    }

    /// Take the earliest timer if it is due at `now`. Repeating timers are
    /// re-queued before they run, so a callback can cancel its own interval.
    fn pop_due(&mut self, now: Instant) -> Option<(TimerId, OnceJob)> {
        let entry = self.timers.first_entry()?;
        if entry.key().0 > now {
            return None;
        }

        let ((due_at, _), timer) = entry.remove_entry();
        self.keys.remove(&timer.id);

        match timer.job {
            TimerJob::Once(job) => Some((timer.id, job)),
            TimerJob::Repeat { period, job } => {
                // A late tick delays the cadence instead of bursting
                let mut next = due_at + period;
                if next <= now {
                    next = now + period;
                }
                self.push(
                    next,
                    Timer {
                        id: timer.id,
                        job: TimerJob::Repeat {
                            period,
                            job: Arc::clone(&job),
                        },
                    },
                );
                Some((timer.id, Box::new(move || job())))
            }
        }
    }

    fn clear(&mut self) -> usize {
        let count = self.timers.len();
        self.timers.clear();
        self.keys.clear();
        count
    }
}

/// State shared between the scheduler handle and its event loop
struct Shared {
    queue: Mutex<TimerQueue>,
    wake: Notify,
    running: AtomicBool,
}

impl Shared {
    fn queue(&self) -> MutexGuard<'_, TimerQueue> {
        self.queue.lock().unwrap_or_else(|e| e.into_inner())
    }
}

enum Step {
    Run(TimerId, OnceJob),
    Wait(Option<Instant>),
}

/// Scheduler backed by tokio timers
pub struct TokioScheduler {
    started: Instant,
    shared: Arc<Shared>,
    next_id: AtomicU64,
    event_loop: Mutex<Option<JoinHandle<()>>>,
}

impl TokioScheduler {
    /// Start the scheduler and its event loop
    ///
    /// Must be called from within a tokio runtime.
    pub fn start() -> Arc<Self> {
        let shared = Arc::new(Shared {
            queue: Mutex::new(TimerQueue::default()),
            wake: Notify::new(),
            running: AtomicBool::new(true),
        });

        let event_loop = tokio::spawn(run_event_loop(Arc::clone(&shared)));

        tracing::debug!("Tokio scheduler started");

        Arc::new(Self {
            started: Instant::now(),
            shared,
            next_id: AtomicU64::new(1),
            event_loop: Mutex::new(Some(event_loop)),
        })
    }

    /// Number of timers not yet fired or cancelled
    pub fn pending_count(&self) -> usize {
        self.shared.queue().keys.len()
    }

    fn ensure_running(&self) -> SchedulerResult<()> {
        if self.shared.running.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(SchedulerError::Stopped)
        }
    }

    fn enqueue(&self, due_at: Instant, job: TimerJob) -> TimerId {
        let id = TimerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.shared.queue().push(due_at, Timer { id, job });
        self.shared.wake.notify_one();
        id
    }
}

async fn run_event_loop(shared: Arc<Shared>) {
    while shared.running.load(Ordering::SeqCst) {
        let step = {
            let mut queue = shared.queue();
            match queue.pop_due(Instant::now()) {
                Some((id, job)) => Step::Run(id, job),
                None => Step::Wait(queue.next_due()),
            }
        };

        match step {
            Step::Run(id, job) => {
                tracing::trace!(timer = %id, "Running timer");
                job();
            }
            Step::Wait(Some(due_at)) => {
                tokio::select! {
                    _ = tokio::time::sleep_until(due_at) => {}
                    _ = shared.wake.notified() => {}
                }
            }
            Step::Wait(None) => shared.wake.notified().await,
        }
    }

    tracing::debug!("Scheduler event loop exited");
}

impl Scheduler for TokioScheduler {
    fn now(&self) -> Duration {
        Instant::now().duration_since(self.started)
    }

    fn schedule_once(&self, delay: Duration, job: OnceJob) -> SchedulerResult<TimerId> {
        self.ensure_running()?;

        let id = self.enqueue(Instant::now() + delay, TimerJob::Once(job));

        tracing::trace!(timer = %id, delay_ms = delay.as_millis() as u64, "Scheduled timeout");
        Ok(id)
    }

    fn schedule_repeating(&self, period: Duration, job: RepeatJob) -> SchedulerResult<TimerId> {
        if period.is_zero() {
            return Err(SchedulerError::InvalidPeriod);
        }
        self.ensure_running()?;

        let id = self.enqueue(Instant::now() + period, TimerJob::Repeat { period, job });

        tracing::trace!(timer = %id, period_ms = period.as_millis() as u64, "Scheduled interval");
        Ok(id)
    }

    fn cancel(&self, id: TimerId) -> bool {
        let removed = self.shared.queue().remove(id);
        if removed {
            self.shared.wake.notify_one();
        }
        removed
    }

    fn stop(&self) {
        if !self.shared.running.swap(false, Ordering::SeqCst) {
            return;
        }

        let discarded = self.shared.queue().clear();
        self.shared.wake.notify_one();

        // Safe to call from inside a callback: the loop task ends at its next await
        if let Some(event_loop) = self
            .event_loop
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
        {
            event_loop.abort();
        }

        tracing::debug!(discarded, "Tokio scheduler stopped");
    }

    fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::SeqCst)
    }
}

impl Drop for TokioScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(value: u64) -> Duration {
        Duration::from_millis(value)
    }

    fn recorder() -> (Arc<Mutex<Vec<usize>>>, impl Fn(usize) -> OnceJob) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let log_clone = Arc::clone(&log);
        let make = move |label: usize| -> OnceJob {
            let log = Arc::clone(&log_clone);
            Box::new(move || log.lock().unwrap().push(label))
        };
        (log, make)
    }

    #[tokio::test(start_paused = true)]
    async fn test_once_fires_after_delay() {
        let scheduler = TokioScheduler::start();
        let fired = Arc::new(Mutex::new(Vec::new()));

        let fired_clone = Arc::clone(&fired);
        let inner = Arc::clone(&scheduler);
        scheduler
            .schedule_once(
                ms(120),
                Box::new(move || fired_clone.lock().unwrap().push(inner.now())),
            )
            .unwrap();

        tokio::time::sleep(ms(100)).await;
        assert!(fired.lock().unwrap().is_empty());

        tokio::time::sleep(ms(50)).await;
        let fired = fired.lock().unwrap();
        assert_eq!(fired.len(), 1);
        assert!(fired[0] >= ms(120));
        assert_eq!(scheduler.pending_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_repeating_fires_each_period() {
        let scheduler = TokioScheduler::start();
        let ticks = Arc::new(AtomicU64::new(0));

        let ticks_clone = Arc::clone(&ticks);
        scheduler
            .schedule_repeating(
                ms(1000),
                Arc::new(move || {
                    ticks_clone.fetch_add(1, Ordering::SeqCst);
                }),
            )
            .unwrap();

        tokio::time::sleep(ms(5050)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 5);
        assert_eq!(scheduler.pending_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_equal_due_times_fire_in_scheduling_order() {
        let scheduler = TokioScheduler::start();
        let (log, job) = recorder();

        scheduler.schedule_once(ms(100), job(99)).unwrap();
        for label in 0..10 {
            scheduler.schedule_once(ms(50), job(label)).unwrap();
        }

        tokio::time::sleep(ms(150)).await;
        let mut expected: Vec<usize> = (0..10).collect();
        expected.push(99);
        assert_eq!(*log.lock().unwrap(), expected);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_ordering_holds_on_multi_thread_runtime() {
        let scheduler = TokioScheduler::start();
        let (log, job) = recorder();

        for label in 0..50 {
            scheduler.schedule_once(ms(20), job(label)).unwrap();
        }

        tokio::time::sleep(ms(300)).await;
        let expected: Vec<usize> = (0..50).collect();
        assert_eq!(*log.lock().unwrap(), expected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_prevents_firing() {
        let scheduler = TokioScheduler::start();
        let fired = Arc::new(AtomicBool::new(false));

        let fired_clone = Arc::clone(&fired);
        let id = scheduler
            .schedule_once(
                ms(50),
                Box::new(move || fired_clone.store(true, Ordering::SeqCst)),
            )
            .unwrap();

        assert!(scheduler.cancel(id));
        tokio::time::sleep(ms(100)).await;
        assert!(!fired.load(Ordering::SeqCst));
        assert!(!scheduler.cancel(id));
    }

    #[tokio::test(start_paused = true)]
    async fn test_interval_can_cancel_itself() {
        let scheduler = TokioScheduler::start();
        let ticks = Arc::new(AtomicU64::new(0));
        let id_slot: Arc<Mutex<Option<TimerId>>> = Arc::new(Mutex::new(None));

        let inner = Arc::downgrade(&scheduler);
        let ticks_clone = Arc::clone(&ticks);
        let slot_clone = Arc::clone(&id_slot);
        let id = scheduler
            .schedule_repeating(
                ms(100),
                Arc::new(move || {
                    if ticks_clone.fetch_add(1, Ordering::SeqCst) + 1 == 3 {
                        let id = *slot_clone.lock().unwrap();
                        if let (Some(id), Some(scheduler)) = (id, inner.upgrade()) {
                            scheduler.cancel(id);
                        }
                    }
                }),
            )
            .unwrap();
        *id_slot.lock().unwrap() = Some(id);

        tokio::time::sleep(ms(1000)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 3);
        assert_eq!(scheduler.pending_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_from_callback_discards_pending() {
        let scheduler = TokioScheduler::start();
        let late = Arc::new(AtomicBool::new(false));

        let inner = Arc::clone(&scheduler);
        scheduler
            .schedule_once(ms(10), Box::new(move || inner.stop()))
            .unwrap();

        let late_clone = Arc::clone(&late);
        scheduler
            .schedule_once(
                ms(20),
                Box::new(move || late_clone.store(true, Ordering::SeqCst)),
            )
            .unwrap();

        tokio::time::sleep(ms(100)).await;
        assert!(!scheduler.is_running());
        assert!(!late.load(Ordering::SeqCst));
        assert_eq!(scheduler.pending_count(), 0);
        assert_eq!(
            scheduler.schedule_once(ms(1), Box::new(|| {})),
            Err(SchedulerError::Stopped)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_stops_timers() {
        let scheduler = TokioScheduler::start();
        let ticks = Arc::new(AtomicU64::new(0));

        let ticks_clone = Arc::clone(&ticks);
        scheduler
            .schedule_repeating(
                ms(100),
                Arc::new(move || {
                    ticks_clone.fetch_add(1, Ordering::SeqCst);
                }),
            )
            .unwrap();

        tokio::time::sleep(ms(250)).await;
        drop(scheduler);

        tokio::time::sleep(ms(1000)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_period_rejected() {
        let scheduler = TokioScheduler::start();
        let result = scheduler.schedule_repeating(Duration::ZERO, Arc::new(|| {}));
        assert_eq!(result, Err(SchedulerError::InvalidPeriod));
    }
}
