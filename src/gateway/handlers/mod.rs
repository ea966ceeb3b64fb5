pub mod health;
pub mod me;
pub mod user_login;
pub mod user_register;

// common functions for the handlers
use crate::accounts::{AccountError, AccountId, AccountService};
use axum::{
    BoxError, Json,
    http::{HeaderMap, StatusCode, header::AUTHORIZATION},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use tracing::{debug, error, warn};
use utoipa::ToSchema;

/// Error body returned by every endpoint.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    pub success: bool,
    /// Stable machine-readable kind, for example `username_taken`.
    pub error: String,
    pub message: String,
}

#[derive(Debug)]
pub enum ApiError {
    Account(AccountError),
    MissingPayload,
    InvalidToken,
}

impl From<AccountError> for ApiError {
    fn from(err: AccountError) -> Self {
        Self::Account(err)
    }
}

impl ApiError {
    fn parts(&self) -> (StatusCode, &'static str, &'static str) {
        match self {
            Self::MissingPayload => (StatusCode::BAD_REQUEST, "missing_payload", "Missing payload"),
            Self::InvalidToken => (
                StatusCode::UNAUTHORIZED,
                "invalid_token",
                "Missing or invalid access token",
            ),
            Self::Account(err) => {
                let (status, message) = match err {
                    AccountError::Validation(kind) => (StatusCode::BAD_REQUEST, kind.message()),
                    AccountError::UsernameTaken => {
                        (StatusCode::CONFLICT, "Username already taken")
                    }
                    AccountError::InvalidCredentials => {
                        (StatusCode::UNAUTHORIZED, "Invalid username or password")
                    }
                    AccountError::NotFound => (StatusCode::NOT_FOUND, "Account not found"),
                    AccountError::Store(_) => {
                        (StatusCode::SERVICE_UNAVAILABLE, "Account store unavailable")
                    }
                    AccountError::Hashing(_) | AccountError::Token(_) => {
                        (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
                    }
                };
                (status, err.kind(), message)
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, kind, message) = self.parts();

        // Internal details go to the log only.
        match &self {
            Self::Account(err) if status.is_server_error() => error!("request failed: {err:?}"),
            _ => debug!("request rejected: {kind}"),
        }

        let body = ErrorBody {
            success: false,
            error: kind.to_string(),
            message: message.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

/// Render a failure raised by the middleware stack.
///
/// An expired request deadline drops the in-flight handler, rolling back any
/// open store transaction, and is reported like any other store failure.
pub async fn request_failed(err: BoxError) -> ApiError {
    let err = if err.is::<tower::timeout::error::Elapsed>() {
        anyhow::anyhow!("request deadline exceeded")
    } else {
        anyhow::anyhow!("middleware failure: {err}")
    };
    ApiError::Account(AccountError::Store(err))
}

/// Resolve the `Authorization: Bearer` header to an account id.
///
/// # Errors
/// Returns [`ApiError::InvalidToken`] when the header is missing or the token
/// does not verify.
pub fn authorize(headers: &HeaderMap, service: &AccountService) -> Result<AccountId, ApiError> {
    let token = extract_bearer_token(headers).ok_or(ApiError::InvalidToken)?;
    service.tokens().verify(&token).map_err(|e| {
        warn!("Rejected access token: {e}");
        ApiError::InvalidToken
    })
}

fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let trimmed = value.trim();
    let token = trimmed
        .strip_prefix("Bearer ")
        .or_else(|| trimmed.strip_prefix("bearer "))?
        .trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}
