//! Headless overlay presenter
//!
//! Stands in for a real blur/overlay surface on hosts without one (demos,
//! services, tests): visibility changes are reported through `tracing`
//! and the latest retry action is retained so the host can trigger it in
//! place of a popup tap.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::info;

use latch_application::ports::{OverlayPresenter, RetryAction};
use latch_domain::RetryPrompt;

type SharedRetryAction = Arc<dyn Fn() + Send + Sync>;

/// Overlay presenter that logs instead of rendering.
#[derive(Clone, Default)]
pub struct TracingOverlay {
    inner: Arc<OverlayState>,
}

#[derive(Default)]
struct OverlayState {
    visible: Mutex<bool>,
    retry: Mutex<Option<SharedRetryAction>>,
}

impl TracingOverlay {
    /// Creates a hidden overlay.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the overlay is currently covering the content.
    #[must_use]
    pub fn is_visible(&self) -> bool {
        *self.visible()
    }

    /// Invokes the retained retry action, standing in for the popup tap.
    /// Returns false when no retry affordance is surfaced.
    pub fn trigger_retry(&self) -> bool {
        let action = self.retry().clone();
        action.is_some_and(|action| {
            action();
            true
        })
    }

    fn visible(&self) -> MutexGuard<'_, bool> {
        self.inner
            .visible
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn retry(&self) -> MutexGuard<'_, Option<SharedRetryAction>> {
        self.inner
            .retry
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl OverlayPresenter for TracingOverlay {
    fn show(&self) {
        let mut visible = self.visible();
        if !*visible {
            *visible = true;
            info!("overlay shown");
        }
    }

    fn show_with_retry(&self, prompt: &RetryPrompt, on_retry: RetryAction) {
        {
            let mut visible = self.visible();
            if !*visible {
                *visible = true;
                info!("overlay shown");
            }
        }
        *self.retry() = Some(Arc::from(on_retry));
        info!(title = %prompt.title, button = %prompt.button_title, "retry affordance surfaced");
    }

    fn hide(&self) {
        let mut visible = self.visible();
        if *visible {
            *visible = false;
            self.retry().take();
            info!("overlay hidden");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[test]
    fn test_show_and_hide_are_idempotent() {
        let overlay = TracingOverlay::new();
        assert!(!overlay.is_visible());

        overlay.show();
        overlay.show();
        assert!(overlay.is_visible());

        overlay.hide();
        overlay.hide();
        assert!(!overlay.is_visible());
    }

    #[test]
    fn test_trigger_retry_without_affordance() {
        let overlay = TracingOverlay::new();
        assert!(!overlay.trigger_retry());
    }

    #[test]
    fn test_trigger_retry_invokes_action() {
        let overlay = TracingOverlay::new();
        let taps = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&taps);
        overlay.show_with_retry(
            &RetryPrompt::default(),
            Box::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );

        assert!(overlay.is_visible());
        assert!(overlay.trigger_retry());
        assert_eq!(taps.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_hide_clears_retry_affordance() {
        let overlay = TracingOverlay::new();
        overlay.show_with_retry(&RetryPrompt::default(), Box::new(|| {}));
        overlay.hide();
        assert!(!overlay.trigger_retry());
    }
}
