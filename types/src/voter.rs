//! Voter identity handed to the ledger by the identity layer.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::limits::MAX_VOTER_ID_BYTES;
use crate::BallotError;

/// An already-authenticated voter identity.
///
/// The ledger never authenticates; it only requires the identity to be a
/// non-empty string of at most [`MAX_VOTER_ID_BYTES`] bytes without control
/// characters (NUL separates voter ids from category ids in storage keys).
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct VoterId(String);

impl VoterId {
    /// Validate and wrap a raw identity string.
    pub fn parse(raw: impl Into<String>) -> Result<Self, BallotError> {
        let s = raw.into();
        if s.is_empty() {
            return Err(BallotError::InvalidVoterId("empty".to_string()));
        }
        if s.len() > MAX_VOTER_ID_BYTES {
            return Err(BallotError::InvalidVoterId(format!(
                "longer than {MAX_VOTER_ID_BYTES} bytes"
            )));
        }
        if s.chars().any(char::is_control) {
            return Err(BallotError::InvalidVoterId(
                "contains control characters".to_string(),
            ));
        }
        Ok(Self(s))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl fmt::Display for VoterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for VoterId {
    type Error = BallotError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(s)
    }
}

impl From<VoterId> for String {
    fn from(v: VoterId) -> Self {
        v.0
    }
}
