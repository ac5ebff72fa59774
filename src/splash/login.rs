//! Login Trigger
//!
//! Starts the dot cascade and, `REDIRECT_DELAY` later, leaves for the home
//! page. Leaving unloads the page, so the redirect also stops the scheduler
//! and every timer still pending dies with it.

use super::{DotAnimator, SplashResult, HOME_PATH, REDIRECT_DELAY};
use crate::scheduler::{Scheduler, TimerId};
use crate::surface::UiSurface;
use serde::Serialize;
use std::sync::Arc;

/// What a login call set in motion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LoginOutcome {
    pub dots_scheduled: usize,
    pub redirect: TimerId,
}

#[derive(Clone)]
pub struct LoginTrigger {
    scheduler: Arc<dyn Scheduler>,
    surface: Arc<dyn UiSurface>,
    animator: DotAnimator,
}

impl LoginTrigger {
    pub fn new(
        scheduler: Arc<dyn Scheduler>,
        surface: Arc<dyn UiSurface>,
        animator: DotAnimator,
    ) -> Self {
        Self {
            scheduler,
            surface,
            animator,
        }
    }

    pub fn animator(&self) -> &DotAnimator {
        &self.animator
    }

    /// Animate the dots now, then navigate to [`HOME_PATH`] after
    /// [`REDIRECT_DELAY`]. Earlier pending redirects are left alone.
    pub fn login(&self) -> SplashResult<LoginOutcome> {
        let dots_scheduled = self.animator.animate()?;

        let surface = Arc::clone(&self.surface);
        let scheduler = Arc::downgrade(&self.scheduler);
        let redirect = self.scheduler.schedule_once(
            REDIRECT_DELAY,
            Box::new(move || {
                tracing::info!(path = HOME_PATH, "Redirecting");
                surface.navigate(HOME_PATH);
                if let Some(scheduler) = scheduler.upgrade() {
                    scheduler.stop();
                }
            }),
        )?;

        tracing::info!(
            dots = dots_scheduled,
            redirect = %redirect,
            delay_ms = REDIRECT_DELAY.as_millis() as u64,
            "Login triggered"
        );

        Ok(LoginOutcome {
            dots_scheduled,
            redirect,
        })
    }
}
