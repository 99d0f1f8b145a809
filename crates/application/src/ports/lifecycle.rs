//! Lifecycle notifier port
//!
//! Delivery of application lifecycle transitions. The gate subscribes at
//! binding time; dropping the gate drops the subscription, so no callback
//! can outlive it.

use tokio::sync::broadcast;

use latch_domain::LifecycleEvent;

/// Port for app-lifecycle notification delivery.
pub trait LifecycleNotifier: Send + Sync {
    /// Returns a fresh receiver for subsequent lifecycle events.
    fn subscribe(&self) -> broadcast::Receiver<LifecycleEvent>;
}
