//! Request identity.
//!
//! Authentication happens in a fronting gateway. The node trusts the voter id
//! it forwards in `X-Voter-Id`, and guards admin routes with a static bearer
//! token. Without a configured token the admin routes refuse every request.

use std::sync::Arc;

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use subtle::ConstantTimeEq;

use ballot_types::VoterId;

use crate::error::RpcError;
use crate::server::RpcState;

pub const VOTER_HEADER: &str = "x-voter-id";

/// The authenticated voter making the request.
#[derive(Debug, Clone)]
pub struct VoterIdentity(pub VoterId);

#[async_trait]
impl<S> FromRequestParts<S> for VoterIdentity
where
    S: Send + Sync,
{
    type Rejection = RpcError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(VOTER_HEADER)
            .ok_or(RpcError::MissingVoter)?
            .to_str()
            .map_err(|_| RpcError::InvalidRequest("X-Voter-Id is not valid text".to_string()))?;
        VoterId::parse(raw)
            .map(VoterIdentity)
            .map_err(RpcError::InvalidVoter)
    }
}

/// Proof that the caller presented the admin token.
///
/// Admin routes are closed when no token is configured. `actor` is the
/// forwarded voter id, if it is a valid one, recorded as a category's creator.
#[derive(Debug, Clone)]
pub struct AdminAuth {
    pub actor: Option<String>,
}

#[async_trait]
impl FromRequestParts<Arc<RpcState>> for AdminAuth {
    type Rejection = RpcError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<RpcState>,
    ) -> Result<Self, Self::Rejection> {
        let expected = state
            .admin_token
            .as_deref()
            .ok_or(RpcError::AdminDisabled)?;
        let presented = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .ok_or(RpcError::Unauthorized)?;
        if !token_matches(presented.trim(), expected) {
            tracing::debug!("admin token rejected");
            return Err(RpcError::Forbidden);
        }
        let actor = parts
            .headers
            .get(VOTER_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|raw| VoterId::parse(raw).ok())
            .map(|voter| voter.as_str().to_string());
        Ok(Self { actor })
    }
}

/// Constant-time token comparison.
fn token_matches(presented: &str, expected: &str) -> bool {
    bool::from(presented.as_bytes().ct_eq(expected.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_comparison() {
        assert!(token_matches("s3cret", "s3cret"));
        assert!(!token_matches("s3cre", "s3cret"));
        assert!(!token_matches("s3cret!", "s3cret"));
        assert!(!token_matches("", "s3cret"));
    }
}
