//! Validation errors for the fundamental types.

use thiserror::Error;

/// Error type for values that fail validation at the type boundary.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BallotError {
    #[error("invalid voter id: {0}")]
    InvalidVoterId(String),

    #[error("invalid {kind} id: {value:?}")]
    InvalidId { kind: &'static str, value: String },

    #[error("name must be between 1 and {max} characters")]
    InvalidName { max: usize },

    #[error("description exceeds {max} characters")]
    DescriptionTooLong { max: usize },
}
