use super::ApiError;
use crate::accounts::{AccountId, AccountService, RegisterInput};
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

/// Missing fields default to empty and are reported by validation.
#[derive(ToSchema, Deserialize, Default)]
#[serde(default)]
pub struct UserRegister {
    username: String,
    password: String,
    #[serde(alias = "repeatPassword")]
    repeat_password: String,
    email: String,
}

impl From<UserRegister> for RegisterInput {
    fn from(user: UserRegister) -> Self {
        Self {
            username: user.username,
            password: SecretString::from(user.password),
            repeat_password: SecretString::from(user.repeat_password),
            email: user.email,
        }
    }
}

#[derive(ToSchema, Serialize, Debug)]
pub struct RegisterResponse {
    success: bool,
    id: AccountId,
}

#[utoipa::path(
    post,
    path= "/user/register",
    request_body = UserRegister,
    responses (
        (status = 201, description = "Registration successful", body = RegisterResponse, content_type = "application/json"),
        (status = 400, description = "Missing payload or a required field is empty", body = super::ErrorBody),
        (status = 409, description = "Username already taken", body = super::ErrorBody),
    ),
    tag= "user"
)]
#[instrument(skip(service, payload))]
pub async fn register(
    service: Extension<Arc<AccountService>>,
    payload: Option<Json<UserRegister>>,
) -> Response {
    let Some(Json(user)) = payload else {
        return ApiError::MissingPayload.into_response();
    };

    match service.register(user.into()).await {
        Ok(id) => (
            StatusCode::CREATED,
            Json(RegisterResponse { success: true, id }),
        )
            .into_response(),
        Err(err) => ApiError::from(err).into_response(),
    }
}
