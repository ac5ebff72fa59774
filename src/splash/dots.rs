//! Dot Animator
//!
//! Activates the dot indicators one after another, `DOT_STAGGER` apart, in
//! document order.

use super::{SplashResult, ACTIVE_CLASS, DOT_CLASS, DOT_STAGGER};
use crate::scheduler::Scheduler;
use crate::surface::UiSurface;
use std::sync::Arc;
use std::time::Duration;

#[derive(Clone)]
pub struct DotAnimator {
    scheduler: Arc<dyn Scheduler>,
    surface: Arc<dyn UiSurface>,
}

impl DotAnimator {
    pub fn new(scheduler: Arc<dyn Scheduler>, surface: Arc<dyn UiSurface>) -> Self {
        Self { scheduler, surface }
    }

    /// Schedule the activation cascade and return how many dots it covers.
    ///
    /// Dots are collected once, now; dot `i` is marked active `i * DOT_STAGGER`
    /// later. Markers are only ever added, so running again never clears a dot.
    pub fn animate(&self) -> SplashResult<usize> {
        let dots = self.surface.elements_by_class(DOT_CLASS);

        for (index, dot) in dots.iter().copied().enumerate() {
            let surface = Arc::clone(&self.surface);
            let delay = stagger_delay(index);

            self.scheduler.schedule_once(
                delay,
                Box::new(move || {
                    if !surface.add_class(dot, ACTIVE_CLASS) {
                        tracing::debug!(element = %dot, "Dot vanished before activation");
                    }
                }),
            )?;
        }

        tracing::debug!(dots = dots.len(), "Dot cascade scheduled");
        Ok(dots.len())
    }
}

/// Activation delay of the dot at `index`, saturating instead of wrapping
fn stagger_delay(index: usize) -> Duration {
    let index = u64::try_from(index).unwrap_or(u64::MAX);
    let stagger_ms = u64::try_from(DOT_STAGGER.as_millis()).unwrap_or(u64::MAX);
    Duration::from_millis(stagger_ms.saturating_mul(index))
}
