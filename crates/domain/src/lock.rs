//! Lock and attempt state for the authentication gate.
//!
//! This module defines the state machine vocabulary the gate transitions
//! over. The gate owns the only mutable copy of these values; hosts observe
//! them through the gate's watch channel.

use serde::{Deserialize, Serialize};

use crate::id::AttemptId;

/// Phase of the gate while the content is locked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LockPhase {
    /// No credential check is underway.
    NoAttempt,

    /// A credential check is underway.
    Attempting,

    /// The user cancelled the credential prompt; waiting for a retry tap.
    RetryPending,
}

/// Whether the application content is accessible.
///
/// While locked, the overlay must cover the content; the gate never leaves
/// the overlay hidden in any `Locked` phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LockState {
    /// Content is covered until a credential check succeeds.
    Locked(LockPhase),

    /// Content is accessible.
    Unlocked,
}

impl Default for LockState {
    fn default() -> Self {
        Self::Locked(LockPhase::NoAttempt)
    }
}

impl LockState {
    /// Returns true while the content must stay covered.
    #[must_use]
    pub const fn is_locked(&self) -> bool {
        matches!(self, Self::Locked(_))
    }

    /// Returns true once the content is accessible.
    #[must_use]
    pub const fn is_unlocked(&self) -> bool {
        matches!(self, Self::Unlocked)
    }

    /// Returns true while a credential check is underway.
    #[must_use]
    pub const fn is_attempting(&self) -> bool {
        matches!(self, Self::Locked(LockPhase::Attempting))
    }

    /// Returns true while the gate waits for a retry tap.
    #[must_use]
    pub const fn is_retry_pending(&self) -> bool {
        matches!(self, Self::Locked(LockPhase::RetryPending))
    }

    /// Returns the locked phase, if any.
    #[must_use]
    pub const fn phase(&self) -> Option<LockPhase> {
        match self {
            Self::Locked(phase) => Some(*phase),
            Self::Unlocked => None,
        }
    }

    /// Short status text for logs and headless presenters.
    #[must_use]
    pub const fn describe(&self) -> &'static str {
        match self {
            Self::Locked(LockPhase::NoAttempt) => "locked",
            Self::Locked(LockPhase::Attempting) => "locked, checking credential",
            Self::Locked(LockPhase::RetryPending) => "locked, waiting for retry",
            Self::Unlocked => "unlocked",
        }
    }
}

/// The gate's single credential attempt slot.
///
/// At most one attempt is ever in flight; a second `authenticate` call while
/// one is outstanding is absorbed without starting a duplicate check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AttemptState {
    /// No credential check outstanding.
    #[default]
    Idle,

    /// A credential check has been started and has not yet been applied.
    InFlight {
        /// Identifier used to match the provider result to this attempt.
        id: AttemptId,
    },
}

impl AttemptState {
    /// Returns true while a check is outstanding.
    #[must_use]
    pub const fn is_in_flight(&self) -> bool {
        matches!(self, Self::InFlight { .. })
    }

    /// Returns the in-flight attempt id, if any.
    #[must_use]
    pub const fn id(&self) -> Option<AttemptId> {
        match self {
            Self::InFlight { id } => Some(*id),
            Self::Idle => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_initial_state_is_locked_no_attempt() {
        assert_eq!(LockState::default(), LockState::Locked(LockPhase::NoAttempt));
        assert!(LockState::default().is_locked());
        assert!(!LockState::default().is_unlocked());
    }

    #[test]
    fn test_phase_accessor() {
        assert_eq!(
            LockState::Locked(LockPhase::RetryPending).phase(),
            Some(LockPhase::RetryPending)
        );
        assert_eq!(LockState::Unlocked.phase(), None);
    }

    #[test]
    fn test_predicates() {
        let attempting = LockState::Locked(LockPhase::Attempting);
        assert!(attempting.is_locked());
        assert!(attempting.is_attempting());
        assert!(!attempting.is_retry_pending());
        assert!(LockState::Unlocked.is_unlocked());
    }

    #[test]
    fn test_attempt_slot() {
        let idle = AttemptState::default();
        assert!(!idle.is_in_flight());
        assert_eq!(idle.id(), None);

        let id = AttemptId::new();
        let in_flight = AttemptState::InFlight { id };
        assert!(in_flight.is_in_flight());
        assert_eq!(in_flight.id(), Some(id));
    }

    #[test]
    fn test_lock_state_serializes() {
        let json = serde_json::to_string(&LockState::Locked(LockPhase::NoAttempt))
            .unwrap_or_default();
        assert_eq!(json, r#"{"locked":"no_attempt"}"#);
    }
}
