//! Latch Infrastructure - Adapters and implementations
//!
//! This crate provides concrete implementations of the ports
//! defined in the application layer.

pub mod adapters;
pub mod lifecycle;
pub mod overlay;

pub use adapters::{SystemClock, SystemSettingsRouter};
pub use lifecycle::AppLifecycle;
pub use overlay::TracingOverlay;
