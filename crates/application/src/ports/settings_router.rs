//! Settings router port
//!
//! Navigation to the system surface where a device-owner credential can
//! be enrolled. Invoked only when a check reports that no credential is
//! enrolled; retrying in that situation would fail identically.

use thiserror::Error;

/// Errors that can occur while routing to system settings.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// The platform opener could not be launched.
    #[error("failed to launch settings: {0}")]
    Launch(String),

    /// No credential-settings surface exists on this platform.
    #[error("no credential settings surface on this platform")]
    Unsupported,
}

/// Port for opening the system credential-enrollment settings.
pub trait SettingsRouter: Send + Sync {
    /// Opens the credential-enrollment surface.
    ///
    /// # Errors
    /// Returns a `SettingsError` if the surface cannot be opened; the gate
    /// logs the failure and keeps its state unchanged.
    fn open_credential_settings(&self) -> Result<(), SettingsError>;
}
