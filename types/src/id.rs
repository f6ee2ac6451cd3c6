//! Store-allocated identifiers for categories and candidates.
//!
//! Identifiers are allocated in increasing order by the ledger store. Their
//! big-endian encoding is used inside storage keys so that key order matches
//! allocation order.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::BallotError;

macro_rules! numeric_id {
    ($(#[$meta:meta])* $name:ident, $label:literal) => {
        $(#[$meta])*
        #[derive(
            Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(u64);

        impl $name {
            pub const fn new(raw: u64) -> Self {
                Self(raw)
            }

            pub fn as_u64(&self) -> u64 {
                self.0
            }

            /// Big-endian key encoding.
            pub fn to_be_bytes(&self) -> [u8; 8] {
                self.0.to_be_bytes()
            }

            pub fn from_be_bytes(bytes: [u8; 8]) -> Self {
                Self(u64::from_be_bytes(bytes))
            }

            /// Decode from a key slice, returning `None` unless it is exactly 8 bytes.
            pub fn from_slice(bytes: &[u8]) -> Option<Self> {
                let arr: [u8; 8] = bytes.try_into().ok()?;
                Some(Self::from_be_bytes(arr))
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = BallotError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                s.trim()
                    .parse::<u64>()
                    .map(Self)
                    .map_err(|_| BallotError::InvalidId {
                        kind: $label,
                        value: s.to_string(),
                    })
            }
        }
    };
}

numeric_id!(
    /// Identifies a category (a single poll question).
    CategoryId,
    "category"
);

numeric_id!(
    /// Identifies a candidate within exactly one category.
    CandidateId,
    "candidate"
);
