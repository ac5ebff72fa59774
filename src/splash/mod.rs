//! Login Splash
//!
//! The three behaviours of the login splash page:
//!
//! - [`ClockUpdater`]: live date/time in the `#clock` display
//! - [`DotAnimator`]: staggered activation of the `.dot` indicators
//! - [`LoginTrigger`]: dot cascade followed by a redirect to `/home`
//!
//! [`SplashPage`] wires them to one scheduler and one surface and exposes the
//! entry points a host page binds to its controls.

mod clock;
mod dots;
mod login;

pub use clock::{
    format_fr, parse_fr, ClockUpdater, LocalWallClock, VirtualWallClock, WallClock,
    FR_DATETIME_FORMAT,
};
pub use dots::DotAnimator;
pub use login::{LoginOutcome, LoginTrigger};

use crate::scheduler::{Scheduler, SchedulerError, TimerId};
use crate::surface::UiSurface;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;

/// Id of the clock display element
pub const CLOCK_ELEMENT_ID: &str = "clock";

/// Class carried by every dot indicator
pub const DOT_CLASS: &str = "dot";

/// Class marking an activated dot
pub const ACTIVE_CLASS: &str = "active";

/// Where a login leads
pub const HOME_PATH: &str = "/home";

/// Clock refresh period
pub const CLOCK_PERIOD: Duration = Duration::from_millis(1000);

/// Delay between consecutive dot activations
pub const DOT_STAGGER: Duration = Duration::from_millis(120);

/// Delay between login and redirect
pub const REDIRECT_DELAY: Duration = Duration::from_millis(700);

/// Errors raised by splash components
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SplashError {
    #[error("Scheduling failed: {0}")]
    Scheduler(#[from] SchedulerError),

    #[error("Clock already started as {0}")]
    AlreadyStarted(TimerId),
}

/// Result type alias for splash operations
pub type SplashResult<T> = Result<T, SplashError>;

/// A splash page: one scheduler, one surface, three behaviours
pub struct SplashPage {
    scheduler: Arc<dyn Scheduler>,
    clock: ClockUpdater,
    login: LoginTrigger,
    clock_timer: Mutex<Option<TimerId>>,
}

impl SplashPage {
    pub fn new(
        scheduler: Arc<dyn Scheduler>,
        surface: Arc<dyn UiSurface>,
        wall_clock: Arc<dyn WallClock>,
    ) -> Self {
        let clock = ClockUpdater::new(Arc::clone(&scheduler), Arc::clone(&surface), wall_clock);
        let animator = DotAnimator::new(Arc::clone(&scheduler), Arc::clone(&surface));
        let login = LoginTrigger::new(Arc::clone(&scheduler), surface, animator);

        Self {
            scheduler,
            clock,
            login,
            clock_timer: Mutex::new(None),
        }
    }

    /// Start the clock. Calling it twice is an error rather than a second
    /// interval.
    pub fn start(&self) -> SplashResult<TimerId> {
        let mut slot = self.clock_timer.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(id) = *slot {
            return Err(SplashError::AlreadyStarted(id));
        }

        let id = self.clock.start()?;
        *slot = Some(id);
        Ok(id)
    }

    /// Entry point bound to the dot animation
    pub fn animate_dots(&self) -> SplashResult<usize> {
        self.login.animator().animate()
    }

    /// Entry point bound to the login control
    pub fn login(&self) -> SplashResult<LoginOutcome> {
        self.login.login()
    }

    /// Refresh the clock display immediately
    pub fn refresh_clock(&self) {
        self.clock.tick();
    }

    /// Whether the page is still alive (not navigated away or shut down)
    pub fn is_active(&self) -> bool {
        self.scheduler.is_running()
    }

    /// Tear the page down, dropping every pending timer
    pub fn shutdown(&self) {
        if self.scheduler.is_running() {
            tracing::info!("Splash page shutting down");
        }
        self.scheduler.stop();
    }
}
