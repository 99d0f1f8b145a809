//! Credential policies, challenges, and check outcomes.
//!
//! The credential check itself lives behind the application layer's
//! `CredentialProvider` port; these types describe what the gate asks for
//! and how it interprets the answer.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Which class of device-owner credential satisfies the gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CredentialPolicy {
    /// Any locally verifiable proof of the owner's identity: a biometric
    /// match or the passcode/PIN equivalent (default).
    #[default]
    DeviceOwner,

    /// Biometric match only; no passcode fallback.
    Biometrics,
}

/// One request handed to the credential provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialChallenge {
    /// Which credential class to evaluate.
    pub policy: CredentialPolicy,
    /// Reason string shown by the system credential sheet.
    pub reason: String,
    /// Title for the passcode-fallback affordance, if the platform shows one.
    pub fallback_title: Option<String>,
}

/// Result of a credential check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialOutcome {
    /// The user proved ownership; the gate may unlock.
    Granted,

    /// The check ran and did not grant access.
    Denied(DenialReason),

    /// The check could not run at all.
    Unavailable(UnavailableReason),
}

impl CredentialOutcome {
    /// Returns true when the outcome unlocks the gate.
    #[must_use]
    pub const fn is_granted(&self) -> bool {
        matches!(self, Self::Granted)
    }

    /// Returns true when the right response is a retry affordance rather
    /// than a failure report.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(self, Self::Denied(reason) if reason.is_cancellation())
    }
}

/// Why a credential check was denied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenialReason {
    /// The user dismissed the credential prompt.
    UserCancelled,

    /// The system tore the prompt down, e.g. on suspension.
    SystemCancelled,

    /// The hosting application cancelled the prompt.
    AppCancelled,

    /// Too many failed matches; the credential subsystem is locked out.
    LockedOut,

    /// The presented credential did not match.
    Mismatch,
}

impl DenialReason {
    /// Cancellations are normal user/system actions, not failed attempts;
    /// they surface a retry affordance instead of an error.
    #[must_use]
    pub const fn is_cancellation(&self) -> bool {
        matches!(
            self,
            Self::UserCancelled | Self::SystemCancelled | Self::AppCancelled
        )
    }
}

impl fmt::Display for DenialReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::UserCancelled => "cancelled by the user",
            Self::SystemCancelled => "cancelled by the system",
            Self::AppCancelled => "cancelled by the application",
            Self::LockedOut => "credential subsystem locked out",
            Self::Mismatch => "credential did not match",
        };
        f.write_str(text)
    }
}

/// Why a credential check could not run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnavailableReason {
    /// No device-owner credential is enrolled; a device-configuration
    /// problem, routed to system settings rather than retried.
    NoCredentialEnrolled,

    /// The credential hardware cannot be used right now.
    HardwareUnavailable,
}

impl fmt::Display for UnavailableReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::NoCredentialEnrolled => "no device-owner credential enrolled",
            Self::HardwareUnavailable => "credential hardware unavailable",
        };
        f.write_str(text)
    }
}

/// Failure reported to the host through `on_failure`.
///
/// Cancellations never become a `GateError`; they surface as the retry
/// affordance instead.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum GateError {
    /// The check ran and denied access.
    #[error("credential denied: {0}")]
    Denied(DenialReason),

    /// The check could not run.
    #[error("credential check unavailable: {0}")]
    Unavailable(UnavailableReason),
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_cancellations_are_recoverable() {
        for reason in [
            DenialReason::UserCancelled,
            DenialReason::SystemCancelled,
            DenialReason::AppCancelled,
        ] {
            assert!(CredentialOutcome::Denied(reason).is_recoverable());
        }
    }

    #[test]
    fn test_hard_denials_are_not_recoverable() {
        assert!(!CredentialOutcome::Denied(DenialReason::Mismatch).is_recoverable());
        assert!(!CredentialOutcome::Denied(DenialReason::LockedOut).is_recoverable());
        assert!(!CredentialOutcome::Granted.is_recoverable());
        assert!(
            !CredentialOutcome::Unavailable(UnavailableReason::NoCredentialEnrolled)
                .is_recoverable()
        );
    }

    #[test]
    fn test_gate_error_messages() {
        assert_eq!(
            GateError::Denied(DenialReason::Mismatch).to_string(),
            "credential denied: credential did not match"
        );
        assert_eq!(
            GateError::Unavailable(UnavailableReason::NoCredentialEnrolled).to_string(),
            "credential check unavailable: no device-owner credential enrolled"
        );
    }
}
