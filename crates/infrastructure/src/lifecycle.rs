//! Broadcast-based lifecycle notifier
//!
//! Fan-out of application lifecycle transitions to any number of
//! subscribers. The host publishes from wherever its windowing or
//! platform layer reports focus changes; the gate subscribes through the
//! `LifecycleNotifier` port.

use tokio::sync::broadcast;
use tracing::debug;

use latch_application::ports::LifecycleNotifier;
use latch_domain::LifecycleEvent;

/// Default capacity; lifecycle transitions are rare, so a small buffer
/// only has to absorb bursts while a subscriber task is scheduled.
const CHANNEL_CAPACITY: usize = 16;

/// Lifecycle event source for the process.
#[derive(Debug, Clone)]
pub struct AppLifecycle {
    tx: broadcast::Sender<LifecycleEvent>,
}

impl AppLifecycle {
    /// Creates a notifier with the default buffer capacity.
    #[must_use]
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { tx }
    }

    /// Publishes `EnteredBackground` to all subscribers.
    pub fn entered_background(&self) {
        self.publish(LifecycleEvent::EnteredBackground);
    }

    /// Publishes `WillEnterForeground` to all subscribers.
    pub fn will_enter_foreground(&self) {
        self.publish(LifecycleEvent::WillEnterForeground);
    }

    fn publish(&self, event: LifecycleEvent) {
        // Err just means nobody is subscribed right now.
        let delivered = self.tx.send(event).unwrap_or(0);
        debug!(?event, delivered, "lifecycle event published");
    }
}

impl Default for AppLifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl LifecycleNotifier for AppLifecycle {
    fn subscribe(&self) -> broadcast::Receiver<LifecycleEvent> {
        self.tx.subscribe()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_subscribers_receive_events_in_order() {
        let lifecycle = AppLifecycle::new();
        let mut events = lifecycle.subscribe();

        lifecycle.entered_background();
        lifecycle.will_enter_foreground();

        assert_eq!(events.recv().await.unwrap(), LifecycleEvent::EnteredBackground);
        assert_eq!(events.recv().await.unwrap(), LifecycleEvent::WillEnterForeground);
    }

    #[tokio::test]
    async fn test_publish_without_subscribers_is_harmless() {
        let lifecycle = AppLifecycle::new();
        lifecycle.entered_background();

        // A late subscriber only sees what is published afterwards.
        let mut events = lifecycle.subscribe();
        lifecycle.will_enter_foreground();
        assert_eq!(events.recv().await.unwrap(), LifecycleEvent::WillEnterForeground);
    }
}
