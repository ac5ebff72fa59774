//! Clock Updater
//!
//! Writes the current French-formatted date and time into the clock
//! display once per second.

use super::{SplashResult, CLOCK_ELEMENT_ID, CLOCK_PERIOD};
use crate::scheduler::{Scheduler, TimerId};
use crate::surface::UiSurface;
use chrono::{Local, NaiveDateTime};
use std::sync::{Arc, Weak};

/// `fr-FR` date and time, as rendered by `toLocaleString`
pub const FR_DATETIME_FORMAT: &str = "%d/%m/%Y %H:%M:%S";

/// Format a date and time the French way: `19/10/2026 14:03:05`
pub fn format_fr(datetime: &NaiveDateTime) -> String {
    datetime.format(FR_DATETIME_FORMAT).to_string()
}

/// Parse a string produced by [`format_fr`]
pub fn parse_fr(text: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(text, FR_DATETIME_FORMAT).ok()
}

/// Source of wall-clock time for the display
pub trait WallClock: Send + Sync {
    fn now(&self) -> NaiveDateTime;
}

/// System local time
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalWallClock;

impl WallClock for LocalWallClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

impl<F> WallClock for F
where
    F: Fn() -> NaiveDateTime + Send + Sync,
{
    fn now(&self) -> NaiveDateTime {
        self()
    }
}

/// Wall time derived from a scheduler's elapsed time, starting at `origin`
pub struct VirtualWallClock {
    origin: NaiveDateTime,
    scheduler: Weak<dyn Scheduler>,
}

impl VirtualWallClock {
    pub fn new(origin: NaiveDateTime, scheduler: &Arc<dyn Scheduler>) -> Self {
        Self {
            origin,
            scheduler: Arc::downgrade(scheduler),
        }
    }
}

impl WallClock for VirtualWallClock {
    fn now(&self) -> NaiveDateTime {
        let elapsed = self
            .scheduler
            .upgrade()
            .map(|scheduler| scheduler.now())
            .unwrap_or_default();
        let elapsed =
            chrono::Duration::from_std(elapsed).unwrap_or_else(|_| chrono::Duration::zero());
        self.origin + elapsed
    }
}

/// Keeps the clock display current
#[derive(Clone)]
pub struct ClockUpdater {
    scheduler: Arc<dyn Scheduler>,
    surface: Arc<dyn UiSurface>,
    wall_clock: Arc<dyn WallClock>,
}

impl ClockUpdater {
    pub fn new(
        scheduler: Arc<dyn Scheduler>,
        surface: Arc<dyn UiSurface>,
        wall_clock: Arc<dyn WallClock>,
    ) -> Self {
        Self {
            scheduler,
            surface,
            wall_clock,
        }
    }

    /// Begin ticking every second. The timer is never cancelled by the
    /// updater; it lives until the scheduler stops.
    ///
    /// The interval holds the surface and wall clock but not the scheduler,
    /// so dropping every scheduler handle still tears the timer down.
    pub fn start(&self) -> SplashResult<TimerId> {
        let surface = Arc::clone(&self.surface);
        let wall_clock = Arc::clone(&self.wall_clock);
        let id = self.scheduler.schedule_repeating(
            CLOCK_PERIOD,
            Arc::new(move || write_time(surface.as_ref(), wall_clock.as_ref())),
        )?;

        tracing::info!(timer = %id, period_ms = CLOCK_PERIOD.as_millis() as u64, "Clock started");
        Ok(id)
    }

    /// Write the current time once. A missing display is silently ignored.
    pub fn tick(&self) {
        write_time(self.surface.as_ref(), self.wall_clock.as_ref());
    }
}

fn write_time(surface: &dyn UiSurface, wall_clock: &dyn WallClock) {
    let text = format_fr(&wall_clock.now());

    match surface.element_by_id(CLOCK_ELEMENT_ID) {
        Some(display) => {
            surface.set_text(display, &text);
        }
        None => tracing::debug!(element = CLOCK_ELEMENT_ID, "Clock display missing"),
    }
}
