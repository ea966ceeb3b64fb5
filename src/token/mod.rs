//! Signed, time-limited access tokens.
//!
//! Tokens are HS256 JWTs carrying the account id as `sub`, the issue time,
//! the expiry and a ULID `jti`. Verification has a single failure outcome:
//! a bad signature, a malformed token and an expired token all come back as
//! [`TokenError::Invalid`].

use crate::accounts::model::AccountId;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use thiserror::Error;
use tracing::debug;
use ulid::Ulid;

/// Validity window used when none is configured.
pub const DEFAULT_VALIDITY: Duration = Duration::from_secs(72 * 60 * 60);

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("invalid token")]
    Invalid,
    #[error("failed to sign token")]
    Signing(#[source] jsonwebtoken::errors::Error),
    #[error("token signing secret is empty")]
    EmptySecret,
}

/// Signing secret and validity window.
#[derive(Debug, Clone)]
pub struct TokenConfig {
    secret: SecretString,
    validity: Duration,
}

impl TokenConfig {
    /// # Errors
    /// Returns [`TokenError::EmptySecret`] if `secret` is empty.
    pub fn new(secret: SecretString, validity: Duration) -> Result<Self, TokenError> {
        if secret.expose_secret().is_empty() {
            return Err(TokenError::EmptySecret);
        }
        Ok(Self { secret, validity })
    }

    #[must_use]
    pub const fn validity(&self) -> Duration {
        self.validity
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    pub sub: String,
    pub iat: u64,
    pub exp: u64,
    pub jti: String,
}

/// A freshly minted token and its expiry (Unix seconds).
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: u64,
}

pub struct TokenIssuer {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validity: Duration,
}

impl std::fmt::Debug for TokenIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenIssuer")
            .field("validity", &self.validity)
            .finish_non_exhaustive()
    }
}

impl TokenIssuer {
    #[must_use]
    pub fn new(config: &TokenConfig) -> Self {
        let secret = config.secret.expose_secret().as_bytes();
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validity: config.validity,
        }
    }

    #[must_use]
    pub const fn validity(&self) -> Duration {
        self.validity
    }

    /// Mint a token for `account` valid from now.
    ///
    /// # Errors
    /// Returns [`TokenError::Signing`] if the token cannot be encoded.
    pub fn issue(&self, account: AccountId) -> Result<IssuedToken, TokenError> {
        self.issue_at(account, now_unix_seconds())
    }

    pub(crate) fn issue_at(
        &self,
        account: AccountId,
        issued_at: u64,
    ) -> Result<IssuedToken, TokenError> {
        let claims = TokenClaims {
            sub: account.to_string(),
            iat: issued_at,
            exp: issued_at.saturating_add(self.validity.as_secs()),
            jti: Ulid::new().to_string(),
        };
        let token = jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(TokenError::Signing)?;
        Ok(IssuedToken {
            token,
            expires_at: claims.exp,
        })
    }

    /// Return the account a token was issued for.
    ///
    /// # Errors
    /// Returns [`TokenError::Invalid`] for any token that does not verify.
    pub fn verify(&self, token: &str) -> Result<AccountId, TokenError> {
        let claims = self.verify_claims(token)?;
        claims.sub.parse().map_err(|_| TokenError::Invalid)
    }

    /// # Errors
    /// Returns [`TokenError::Invalid`] for any token that does not verify.
    pub fn verify_claims(&self, token: &str) -> Result<TokenClaims, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub", "iat"]);

        jsonwebtoken::decode::<TokenClaims>(token, &self.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|e| {
                debug!("token rejected: {e}");
                TokenError::Invalid
            })
    }
}

fn now_unix_seconds() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |duration| duration.as_secs())
}
