//! Gate Configuration Domain Model
//!
//! Defines how a host tunes the authentication gate: which credential
//! class to ask for, what the system prompt says, when a
//! background/foreground cycle re-arms the gate, and what the retry popup
//! looks like.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::credential::{CredentialChallenge, CredentialPolicy};
use crate::error::DomainResult;
use crate::prompt::RetryPrompt;

/// When a background/foreground cycle re-arms an unlocked gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RelockPolicy {
    /// Re-arm the moment the app enters the background, so the content is
    /// already covered in the app switcher (default).
    #[default]
    OnBackground,

    /// Re-arm only if the app stayed backgrounded at least this long.
    /// Short trips leave the content accessible.
    AfterBackgroundFor(Duration),

    /// Never re-arm automatically; the host decides when to lock again.
    Never,
}

impl RelockPolicy {
    /// Whether a completed background trip of the given length re-arms
    /// the gate.
    #[must_use]
    pub fn rearms_after(&self, backgrounded_for: Duration) -> bool {
        match self {
            Self::OnBackground => true,
            Self::AfterBackgroundFor(grace) => backgrounded_for >= *grace,
            Self::Never => false,
        }
    }
}

/// Text shown by the system credential sheet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialPrompt {
    /// Why the app is asking; rendered by the platform prompt.
    pub reason: String,
    /// Title for the passcode-fallback affordance, if the platform shows one.
    pub fallback_title: Option<String>,
}

impl Default for CredentialPrompt {
    fn default() -> Self {
        Self {
            reason: "Unlock the app".to_string(),
            fallback_title: Some("Enter Passcode".to_string()),
        }
    }
}

/// Everything a host configures about the gate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct GateConfig {
    /// Which credential class satisfies the gate.
    pub policy: CredentialPolicy,
    /// System credential sheet text.
    pub prompt: CredentialPrompt,
    /// When a background/foreground cycle re-arms the gate.
    pub relock: RelockPolicy,
    /// Popup description for the retry affordance.
    pub retry_prompt: RetryPrompt,
}

impl GateConfig {
    /// Builds the challenge handed to the credential provider for one
    /// attempt.
    #[must_use]
    pub fn challenge(&self) -> CredentialChallenge {
        CredentialChallenge {
            policy: self.policy,
            reason: self.prompt.reason.clone(),
            fallback_title: self.prompt.fallback_title.clone(),
        }
    }

    /// Checks the host-supplied pieces of the configuration.
    ///
    /// # Errors
    /// Returns a domain error if the retry prompt has blank user-visible
    /// fields.
    pub fn validate(&self) -> DomainResult<()> {
        self.retry_prompt.validate()
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_default_config() {
        let config = GateConfig::default();
        assert_eq!(config.policy, CredentialPolicy::DeviceOwner);
        assert_eq!(config.relock, RelockPolicy::OnBackground);
        assert_eq!(config.prompt.reason, "Unlock the app");
        assert_eq!(
            config.prompt.fallback_title.as_deref(),
            Some("Enter Passcode")
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_challenge_carries_prompt() {
        let config = GateConfig::default();
        let challenge = config.challenge();
        assert_eq!(challenge.policy, CredentialPolicy::DeviceOwner);
        assert_eq!(challenge.reason, "Unlock the app");
        assert_eq!(challenge.fallback_title.as_deref(), Some("Enter Passcode"));
    }

    #[test]
    fn test_on_background_always_rearms() {
        assert!(RelockPolicy::OnBackground.rearms_after(Duration::ZERO));
        assert!(RelockPolicy::OnBackground.rearms_after(Duration::from_secs(1)));
    }

    #[test]
    fn test_grace_window() {
        let policy = RelockPolicy::AfterBackgroundFor(Duration::from_secs(30));
        assert!(!policy.rearms_after(Duration::from_secs(5)));
        assert!(policy.rearms_after(Duration::from_secs(30)));
        assert!(policy.rearms_after(Duration::from_secs(31)));
    }

    #[test]
    fn test_never_rearms() {
        assert!(!RelockPolicy::Never.rearms_after(Duration::from_secs(3600)));
    }
}
