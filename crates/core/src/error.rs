//! Errors raised by the pure domain crates.
//!
//! Storage and transport failures never appear here; adapters wrap a
//! `DomainError` in their own error types instead.

use thiserror::Error;

pub type DomainResult<T> = Result<T, DomainError>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Rejected input such as a blank name or a non-positive quantity.
    #[error("validation failed: {0}")]
    Validation(String),

    /// The change would break a rule the stored state relies on, such as stock
    /// going below zero or a group notification carrying a user id.
    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// The record is in the wrong state for the command: clocking in twice,
    /// closing a closed work log, starting a batch that is not planned,
    /// suspending a suspended user.
    #[error("conflict: {0}")]
    Conflict(String),

    /// The caller may not act on this record (e.g. deleting a group
    /// notification without broadcast rights).
    #[error("unauthorized")]
    Unauthorized,
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::InvariantViolation(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_keep_the_detail() {
        assert_eq!(
            DomainError::conflict("already clocked in").to_string(),
            "conflict: already clocked in"
        );
        assert_eq!(
            DomainError::invariant("stock cannot go negative").to_string(),
            "invariant violated: stock cannot go negative"
        );
    }
}
