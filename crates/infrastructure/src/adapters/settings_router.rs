//! System settings router adapter
//!
//! Opens the operating system's credential-enrollment surface with the
//! platform opener. The gate invokes this only when a check reports that
//! no device-owner credential is enrolled.

use std::process::Command;

use tracing::debug;

use latch_application::ports::{SettingsError, SettingsRouter};

/// Opens the OS credential settings via the platform opener command.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemSettingsRouter;

impl SystemSettingsRouter {
    /// Creates a new settings router.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

/// The opener program and its arguments for the current platform, or
/// `None` where no credential-settings surface is known.
#[must_use]
pub fn credential_settings_command() -> Option<(&'static str, &'static [&'static str])> {
    if cfg!(target_os = "macos") {
        Some((
            "open",
            &["x-apple.systempreferences:com.apple.preference.security"],
        ))
    } else if cfg!(target_os = "windows") {
        Some(("cmd", &["/C", "start", "ms-settings:signinoptions"]))
    } else if cfg!(target_os = "linux") {
        Some(("gnome-control-center", &["user-accounts"]))
    } else {
        None
    }
}

impl SettingsRouter for SystemSettingsRouter {
    fn open_credential_settings(&self) -> Result<(), SettingsError> {
        let (program, args) = credential_settings_command().ok_or(SettingsError::Unsupported)?;
        debug!(program, "opening credential settings");
        Command::new(program)
            .args(args)
            .spawn()
            .map(drop)
            .map_err(|error| SettingsError::Launch(error.to_string()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_opener_is_known_on_tier_one_platforms() {
        if cfg!(any(
            target_os = "macos",
            target_os = "windows",
            target_os = "linux"
        )) {
            let (program, args) = credential_settings_command().unwrap();
            assert!(!program.is_empty());
            assert!(!args.is_empty());
        }
    }

    #[test]
    fn test_opener_targets_credential_surface() {
        if let Some((_, args)) = credential_settings_command() {
            let target = args.last().unwrap();
            assert!(
                target.contains("security")
                    || target.contains("signinoptions")
                    || target.contains("user-accounts")
            );
        }
    }
}
