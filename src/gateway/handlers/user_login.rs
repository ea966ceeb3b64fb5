use super::ApiError;
use crate::accounts::{AccountId, AccountService, Credentials};
use axum::{
    Json,
    extract::Extension,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::instrument;
use utoipa::ToSchema;

#[derive(ToSchema, Deserialize, Default)]
#[serde(default)]
pub struct UserLogin {
    username: String,
    password: String,
    /// Accepted for compatibility with older clients; not used.
    email: Option<String>,
}

#[derive(ToSchema, Serialize, Debug)]
pub struct LoginResponse {
    success: bool,
    id: AccountId,
    token: String,
    /// Unix seconds.
    expires_at: u64,
}

#[utoipa::path(
    post,
    path= "/user/login",
    request_body = UserLogin,
    responses (
        (status = 200, description = "Login successful", body = LoginResponse, content_type = "application/json"),
        (status = 400, description = "Missing payload or empty username/password", body = super::ErrorBody),
        (status = 401, description = "Invalid username or password", body = super::ErrorBody),
    ),
    tag= "user"
)]
#[instrument(skip(service, payload))]
pub async fn login(
    service: Extension<Arc<AccountService>>,
    payload: Option<Json<UserLogin>>,
) -> Response {
    let Some(Json(UserLogin {
        username,
        password,
        email: _,
    })) = payload
    else {
        return ApiError::MissingPayload.into_response();
    };

    let credentials = Credentials {
        username,
        password: SecretString::from(password),
    };

    match service.authenticate_and_issue_token(credentials).await {
        Ok((account, issued)) => (
            StatusCode::OK,
            Json(LoginResponse {
                success: true,
                id: account.id,
                token: issued.token,
                expires_at: issued.expires_at,
            }),
        )
            .into_response(),
        Err(err) => ApiError::from(err).into_response(),
    }
}
