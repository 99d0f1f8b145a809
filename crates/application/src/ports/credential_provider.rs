//! Credential provider port
//!
//! The external capability that evaluates a device-owner credential.
//! The gate calls it but never implements it.

use async_trait::async_trait;

use latch_domain::{CredentialChallenge, CredentialOutcome};

/// Port for the platform credential check.
///
/// The gate invokes `check` at most once per attempt and never
/// concurrently for the same gate instance; the in-flight guard enforces
/// that at the gate, not here. The gate imposes no timeout — the check
/// resolves under the credential subsystem's own rules, and the gate
/// tolerates a late result. The gate cannot cancel a running check;
/// external cancellation surfaces as a `Denied` outcome with the matching
/// cancellation reason.
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    /// Evaluates the challenge and resolves to its outcome.
    async fn check(&self, challenge: &CredentialChallenge) -> CredentialOutcome;
}
