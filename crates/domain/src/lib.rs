//! Latch Domain - Core lock-state types
//!
//! This crate defines the domain model for the Latch authentication gate.
//! All types here are pure Rust with no I/O dependencies.

pub mod credential;
pub mod error;
pub mod id;
pub mod lifecycle;
pub mod lock;
pub mod prompt;
pub mod settings;

pub use credential::{
    CredentialChallenge, CredentialOutcome, CredentialPolicy, DenialReason, GateError,
    UnavailableReason,
};
pub use error::{DomainError, DomainResult};
pub use id::AttemptId;
pub use lifecycle::LifecycleEvent;
pub use lock::{AttemptState, LockPhase, LockState};
pub use prompt::{RetryPrompt, Rgb};
pub use settings::{CredentialPrompt, GateConfig, RelockPolicy};
