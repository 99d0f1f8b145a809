//! Application lifecycle events consumed by the gate.

use serde::{Deserialize, Serialize};

/// The two lifecycle transitions the gate reacts to.
///
/// Delivery is the lifecycle notifier's concern; the gate only interprets
/// the events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleEvent {
    /// The application left the foreground.
    EnteredBackground,

    /// The application is about to return to the foreground.
    WillEnterForeground,
}
