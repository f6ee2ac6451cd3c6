//! Input limits for category and candidate metadata.

use crate::BallotError;

/// Maximum length (in characters) of a category or candidate name.
pub const MAX_NAME_CHARS: usize = 120;

/// Maximum length (in characters) of a description.
pub const MAX_DESCRIPTION_CHARS: usize = 2000;

/// Maximum length (in bytes) of a voter identity.
pub const MAX_VOTER_ID_BYTES: usize = 128;

/// Trim and validate a display name.
pub fn validate_name(raw: &str) -> Result<String, BallotError> {
    let name = raw.trim();
    let chars = name.chars().count();
    if chars == 0 || chars > MAX_NAME_CHARS {
        return Err(BallotError::InvalidName {
            max: MAX_NAME_CHARS,
        });
    }
    Ok(name.to_string())
}

/// Trim and validate an optional description. Empty input becomes an empty string.
pub fn validate_description(raw: Option<&str>) -> Result<String, BallotError> {
    let description = raw.unwrap_or_default().trim();
    if description.chars().count() > MAX_DESCRIPTION_CHARS {
        return Err(BallotError::DescriptionTooLong {
            max: MAX_DESCRIPTION_CHARS,
        });
    }
    Ok(description.to_string())
}
