//! Retry-popup description handed to the overlay presenter.
//!
//! Rendering is out of scope; the gate only passes this description along
//! when it surfaces the retry affordance. Hosts may supply their own
//! `RetryPrompt` through the gate configuration.

use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};

/// An sRGB color, parsed from `#rrggbb` notation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rgb {
    /// Red channel.
    pub r: u8,
    /// Green channel.
    pub g: u8,
    /// Blue channel.
    pub b: u8,
}

impl Rgb {
    /// Parses a `#rrggbb` hex string. The leading `#` is optional.
    ///
    /// # Errors
    /// Returns `DomainError::InvalidColor` for anything that is not six
    /// hex digits.
    pub fn from_hex(hex: &str) -> DomainResult<Self> {
        let digits = hex.strip_prefix('#').unwrap_or(hex);
        if digits.len() != 6 || !digits.is_ascii() {
            return Err(DomainError::InvalidColor(hex.to_string()));
        }
        let channel = |range: std::ops::Range<usize>| {
            u8::from_str_radix(&digits[range], 16)
                .map_err(|_| DomainError::InvalidColor(hex.to_string()))
        };
        Ok(Self {
            r: channel(0..2)?,
            g: channel(2..4)?,
            b: channel(4..6)?,
        })
    }

    /// Formats the color back to `#rrggbb` notation.
    #[must_use]
    pub fn to_hex(&self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

/// What the retry popup should say and look like.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPrompt {
    /// Popup title.
    pub title: String,
    /// Supporting message under the title.
    pub message: String,
    /// Label of the retry button.
    pub button_title: String,
    /// Name of the icon resource; loading it is the presenter's concern.
    pub icon: String,
    /// Accent color for the retry button.
    pub accent_color: Rgb,
}

impl RetryPrompt {
    /// Checks that the user-visible fields are not blank.
    ///
    /// # Errors
    /// Returns `DomainError::EmptyPromptField` naming the offending field.
    pub fn validate(&self) -> DomainResult<()> {
        for (name, value) in [
            ("title", &self.title),
            ("message", &self.message),
            ("button_title", &self.button_title),
        ] {
            if value.trim().is_empty() {
                return Err(DomainError::EmptyPromptField(name));
            }
        }
        Ok(())
    }
}

impl Default for RetryPrompt {
    fn default() -> Self {
        Self {
            title: "App is Locked".to_string(),
            message: "Please unlock to continue.".to_string(),
            button_title: "Unlock".to_string(),
            icon: "lock".to_string(),
            accent_color: Rgb {
                r: 0x10,
                g: 0x58,
                b: 0x66,
            },
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_parse_hex_with_hash() {
        let color = Rgb::from_hex("#105866").unwrap();
        assert_eq!(
            color,
            Rgb {
                r: 0x10,
                g: 0x58,
                b: 0x66
            }
        );
    }

    #[test]
    fn test_parse_hex_without_hash() {
        assert_eq!(Rgb::from_hex("ffffff").unwrap(), Rgb { r: 255, g: 255, b: 255 });
    }

    #[test]
    fn test_reject_malformed_hex() {
        for bad in ["", "#fff", "#12345", "#1234567", "#10x866", "#10 866"] {
            assert!(Rgb::from_hex(bad).is_err(), "accepted {bad:?}");
        }
    }

    #[test]
    fn test_hex_round_trip() {
        assert_eq!(Rgb::from_hex("#105866").unwrap().to_hex(), "#105866");
    }

    #[test]
    fn test_default_prompt_matches_stock_popup() {
        let prompt = RetryPrompt::default();
        assert_eq!(prompt.title, "App is Locked");
        assert_eq!(prompt.button_title, "Unlock");
        assert_eq!(prompt.accent_color.to_hex(), "#105866");
        assert!(prompt.validate().is_ok());
    }

    #[test]
    fn test_blank_fields_rejected() {
        let prompt = RetryPrompt {
            button_title: "  ".to_string(),
            ..RetryPrompt::default()
        };
        assert_eq!(
            prompt.validate(),
            Err(DomainError::EmptyPromptField("button_title"))
        );
    }
}
