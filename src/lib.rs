//! # Enterprise Splash
//!
//! Login splash behaviours - a live clock, a staggered dot cascade and a
//! delayed redirect - running against an injected scheduler and UI surface.
//!
//! ## Modules
//!
//! - [`scheduler`]: timer facility with explicit lifecycle (virtual and tokio)
//! - [`surface`]: host page capability and an in-memory page
//! - [`splash`]: clock updater, dot animator, login trigger
//! - [`config`]: TOML configuration with environment overrides
//!
//! ## Quick Start
//!
//! ```rust
//! use enterprise_splash::*;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! let scheduler = Arc::new(VirtualScheduler::new());
//! let timeline: Arc<dyn Scheduler> = scheduler.clone();
//! let page = Arc::new(Page::login_splash("Enterprise", 3).with_timeline(&timeline));
//! let splash = SplashPage::new(timeline, page.clone(), Arc::new(LocalWallClock));
//!
//! splash.start()?;
//! splash.login()?;
//! scheduler.advance(Duration::from_millis(700))?;
//!
//! assert_eq!(page.location(), "/home");
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod config;
pub mod logging;
pub mod scheduler;
pub mod splash;
pub mod surface;

pub use config::{
    generate_default_config, Config, ConfigError, LoadedConfig, LoggingConfig, SimulationConfig,
};

pub use scheduler::{
    OnceJob, PendingTimer, RepeatJob, Scheduler, SchedulerError, SchedulerResult, TimerId,
    TokioScheduler, VirtualScheduler,
};

pub use surface::{ElementHandle, Page, PageEvent, PageEventKind, PageSnapshot, UiSurface};

pub use splash::{
    format_fr, parse_fr, ClockUpdater, DotAnimator, LocalWallClock, LoginOutcome, LoginTrigger,
    SplashError, SplashPage, SplashResult, VirtualWallClock, WallClock,
};
