//! Authenticated self-service endpoints.
//!
//! Every route resolves the bearer token to an account id first and then
//! acts on that account only.

use super::{ApiError, authorize};
use crate::accounts::{Account, AccountId, AccountService, UpdateInput};
use axum::{
    Json,
    extract::Extension,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::instrument;
use utoipa::ToSchema;

#[derive(Debug, Serialize, ToSchema)]
pub struct MeResponse {
    pub success: bool,
    pub id: AccountId,
    pub username: String,
    pub email: String,
}

impl From<Account> for MeResponse {
    fn from(account: Account) -> Self {
        Self {
            success: true,
            id: account.id,
            username: account.username,
            email: account.email,
        }
    }
}

/// Fields left out are not changed.
#[derive(Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct MeUpdate {
    pub username: Option<String>,
    pub password: Option<String>,
}

#[utoipa::path(
    get,
    path = "/user/me",
    responses(
        (status = 200, description = "Return the authenticated account.", body = MeResponse),
        (status = 401, description = "Missing or invalid access token.", body = super::ErrorBody),
        (status = 404, description = "The account no longer exists.", body = super::ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "user"
)]
#[instrument(skip_all)]
pub async fn get_me(headers: HeaderMap, service: Extension<Arc<AccountService>>) -> Response {
    let id = match authorize(&headers, &service) {
        Ok(id) => id,
        Err(err) => return err.into_response(),
    };

    match service.find_account(id).await {
        Ok(account) => (StatusCode::OK, Json(MeResponse::from(account))).into_response(),
        Err(err) => ApiError::from(err).into_response(),
    }
}

#[utoipa::path(
    patch,
    path = "/user/me",
    request_body = MeUpdate,
    responses(
        (status = 200, description = "Account updated; returns the new state.", body = MeResponse),
        (status = 400, description = "Missing payload or an empty value.", body = super::ErrorBody),
        (status = 401, description = "Missing or invalid access token.", body = super::ErrorBody),
        (status = 404, description = "The account no longer exists.", body = super::ErrorBody),
        (status = 409, description = "Username already taken.", body = super::ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "user"
)]
#[instrument(skip_all)]
pub async fn update_me(
    headers: HeaderMap,
    service: Extension<Arc<AccountService>>,
    payload: Option<Json<MeUpdate>>,
) -> Response {
    let id = match authorize(&headers, &service) {
        Ok(id) => id,
        Err(err) => return err.into_response(),
    };

    let Some(Json(update)) = payload else {
        return ApiError::MissingPayload.into_response();
    };

    let input = UpdateInput {
        username: update.username,
        password: update.password.map(SecretString::from),
    };

    if let Err(err) = service.update_account(id, input).await {
        return ApiError::from(err).into_response();
    }

    match service.find_account(id).await {
        Ok(account) => (StatusCode::OK, Json(MeResponse::from(account))).into_response(),
        Err(err) => ApiError::from(err).into_response(),
    }
}

#[utoipa::path(
    delete,
    path = "/user/me",
    responses(
        (status = 204, description = "Account deleted."),
        (status = 401, description = "Missing or invalid access token.", body = super::ErrorBody),
        (status = 404, description = "The account no longer exists.", body = super::ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "user"
)]
#[instrument(skip_all)]
pub async fn delete_me(headers: HeaderMap, service: Extension<Arc<AccountService>>) -> Response {
    let id = match authorize(&headers, &service) {
        Ok(id) => id,
        Err(err) => return err.into_response(),
    };

    match service.delete_account(id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => ApiError::from(err).into_response(),
    }
}
