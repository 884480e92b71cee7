//! Identity token resolution.
//!
//! Tokens are HS256 JWTs minted by the lobby service. The `sub` claim is
//! the user's UUID; `exp` is enforced. Anything that fails to decode or
//! validate resolves to [`SessionError::InvalidToken`].

use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use tavern_types::UserId;

use crate::error::SessionError;

/// Claims carried by an identity token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenClaims {
    /// User ID as a UUID string.
    pub sub: String,
    /// Expiry, seconds since the epoch.
    pub exp: i64,
    /// Issue time, seconds since the epoch.
    #[serde(default)]
    pub iat: i64,
}

/// Decodes identity tokens against a shared HS256 secret.
#[derive(Clone)]
pub struct TokenResolver {
    decoding: DecodingKey,
    encoding: EncodingKey,
    validation: Validation,
}

impl core::fmt::Debug for TokenResolver {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("TokenResolver").finish_non_exhaustive()
    }
}

impl TokenResolver {
    /// Create a resolver for tokens signed with `secret`.
    pub fn new(secret: &[u8]) -> Self {
        let mut validation = Validation::default();
        validation.validate_exp = true;
        Self {
            decoding: DecodingKey::from_secret(secret),
            encoding: EncodingKey::from_secret(secret),
            validation,
        }
    }

    /// Resolve a token to the user it identifies.
    pub fn resolve(&self, token: &str) -> Result<UserId, SessionError> {
        let data = decode::<TokenClaims>(token, &self.decoding, &self.validation).map_err(|e| {
            tracing::debug!(error = %e, "token rejected");
            SessionError::InvalidToken
        })?;
        data.claims.sub.parse().map_err(|e| {
            tracing::debug!(error = %e, "token subject is not a user id");
            SessionError::InvalidToken
        })
    }

    /// Mint a token for `user` valid for `ttl`. Used by tests and tooling;
    /// production tokens come from the lobby service.
    pub fn issue(&self, user: UserId, ttl: Duration) -> Result<String, jsonwebtoken::errors::Error> {
        let now = Utc::now();
        let claims = TokenClaims {
            sub: user.to_string(),
            exp: now.checked_add_signed(ttl).unwrap_or(now).timestamp(),
            iat: now.timestamp(),
        };
        encode(&Header::default(), &claims, &self.encoding)
    }
}
