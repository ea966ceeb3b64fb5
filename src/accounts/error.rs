use crate::{accounts::store::StoreError, token::TokenError};
use std::fmt;
use thiserror::Error;

/// Which input field failed validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationKind {
    EmptyUsername,
    EmptyPassword,
    PasswordMismatch,
    EmptyEmail,
}

impl ValidationKind {
    /// Stable machine-readable code.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::EmptyUsername => "empty_username",
            Self::EmptyPassword => "empty_password",
            Self::PasswordMismatch => "password_mismatch",
            Self::EmptyEmail => "empty_email",
        }
    }

    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::EmptyUsername => "Username is empty",
            Self::EmptyPassword => "Password is empty",
            Self::PasswordMismatch => "Passwords do not match",
            Self::EmptyEmail => "Email is empty",
        }
    }
}

impl fmt::Display for ValidationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a failed account operation.
///
/// `Validation`, `UsernameTaken`, `InvalidCredentials` and `NotFound` are
/// caused by the caller's input. The rest are infrastructure failures and may
/// be retried.
#[derive(Debug, Error)]
pub enum AccountError {
    #[error("validation failed: {0}")]
    Validation(ValidationKind),
    #[error("username already taken")]
    UsernameTaken,
    #[error("invalid username or password")]
    InvalidCredentials,
    #[error("account not found")]
    NotFound,
    #[error("password hashing failed")]
    Hashing(#[source] anyhow::Error),
    #[error("account store failure")]
    Store(#[source] anyhow::Error),
    #[error("token issuance failed")]
    Token(#[source] TokenError),
}

impl AccountError {
    /// Stable machine-readable code.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Validation(kind) => kind.as_str(),
            Self::UsernameTaken => "username_taken",
            Self::InvalidCredentials => "invalid_credentials",
            Self::NotFound => "not_found",
            Self::Hashing(_) => "hashing_failure",
            Self::Store(_) => "store_error",
            Self::Token(_) => "token_error",
        }
    }

    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Hashing(_) | Self::Store(_))
    }
}

impl From<ValidationKind> for AccountError {
    fn from(kind: ValidationKind) -> Self {
        Self::Validation(kind)
    }
}

impl From<StoreError> for AccountError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => Self::NotFound,
            StoreError::UsernameTaken => Self::UsernameTaken,
            StoreError::Backend(source) => Self::Store(source),
        }
    }
}
