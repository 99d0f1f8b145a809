//! Overlay presenter port
//!
//! The blocking surface that covers the application content while the
//! gate is locked. Rendering is entirely the adapter's concern.

use latch_domain::RetryPrompt;

/// Callback handed to the presenter together with the retry affordance.
///
/// May be invoked from any thread, any number of times; duplicate attempts
/// are absorbed by the gate.
pub type RetryAction = Box<dyn Fn() + Send + Sync>;

/// Port for the opaque overlay covering locked content.
///
/// All three operations are idempotent: showing an already-visible overlay
/// or hiding an already-hidden one is a no-op. The gate never calls
/// `hide` without having observed a granted credential check first.
///
/// Implementations must not invoke the retry action synchronously from
/// inside `show_with_retry`; it is meant for the user's tap handler.
pub trait OverlayPresenter: Send + Sync {
    /// Covers the content with the plain overlay.
    fn show(&self);

    /// Covers the content and surfaces the retry affordance described by
    /// `prompt`, wired to `on_retry`.
    fn show_with_retry(&self, prompt: &RetryPrompt, on_retry: RetryAction);

    /// Removes the overlay.
    fn hide(&self);
}
