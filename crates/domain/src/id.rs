//! Attempt identifiers.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier for a single credential attempt.
///
/// UUID v7, so ids are unique and time-ordered. The gate tags every
/// provider call with the attempt id and discards results whose id no
/// longer matches the in-flight attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AttemptId(Uuid);

impl AttemptId {
    /// Generates a fresh attempt id.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for AttemptId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for AttemptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attempt_ids_are_unique() {
        assert_ne!(AttemptId::new(), AttemptId::new());
    }

    #[test]
    fn test_attempt_id_display_is_uuid() {
        let id = AttemptId::new();
        assert_eq!(id.to_string().len(), 36);
        assert!(Uuid::parse_str(&id.to_string()).is_ok());
    }
}
