//! Domain error types

use thiserror::Error;

/// Domain-level errors that can occur during validation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A color string is not `#rrggbb` hex notation.
    #[error("invalid color: {0}")]
    InvalidColor(String),

    /// A user-visible retry-prompt field is blank.
    #[error("retry prompt field `{0}` must not be empty")]
    EmptyPromptField(&'static str),
}

/// Result type alias for domain operations.
pub type DomainResult<T> = Result<T, DomainError>;
