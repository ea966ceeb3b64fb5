//! HTTP gateway.
//!
//! A stateless axum adapter: every handler parses the request, calls the
//! [`AccountService`] and renders the outcome. The only shared state is the
//! service handle injected through an `Extension` layer.

use crate::accounts::AccountService;
use anyhow::Result;
use axum::{
    Extension, Router,
    body::Body,
    error_handling::HandleErrorLayer,
    extract::MatchedPath,
    http::{HeaderName, HeaderValue, Method, Request, header},
    routing::{get, post},
};
use std::{sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tower::{ServiceBuilder, timeout::TimeoutLayer};
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::PropagateRequestIdLayer,
    set_header::SetRequestHeaderLayer,
    trace::TraceLayer,
};
use tracing::{Span, info, info_span};
use ulid::Ulid;
use utoipa::{
    Modify, OpenApi,
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
};

pub mod handlers;

use self::handlers::{health, me, user_login, user_register};

const REQUEST_ID: &str = "x-request-id";

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health,
        user_register::register,
        user_login::login,
        me::get_me,
        me::update_me,
        me::delete_me,
    ),
    components(schemas(
        health::Health,
        user_register::UserRegister,
        user_register::RegisterResponse,
        user_login::UserLogin,
        user_login::LoginResponse,
        me::MeResponse,
        me::MeUpdate,
        handlers::ErrorBody,
    )),
    modifiers(&BearerAuth),
    tags(
        (name = "health", description = "Service and database health"),
        (name = "user", description = "Account registration, login and self-service"),
    )
)]
struct ApiDoc;

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[must_use]
pub fn openapi() -> utoipa::openapi::OpenApi {
    ApiDoc::openapi()
}

/// Build the application router with its middleware stack.
pub fn router(service: Arc<AccountService>, request_timeout: Duration) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_origin(Any);

    Router::new()
        .route("/health", get(health::health).options(health::health))
        .route("/user/register", post(user_register::register))
        .route("/user/login", post(user_login::login))
        .route(
            "/user/me",
            get(me::get_me).patch(me::update_me).delete(me::delete_me),
        )
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestHeaderLayer::if_not_present(
                    HeaderName::from_static(REQUEST_ID),
                    |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
                ))
                .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                    REQUEST_ID,
                )))
                .layer(TraceLayer::new_for_http().make_span_with(make_span))
                .layer(HandleErrorLayer::new(handlers::request_failed))
                .layer(TimeoutLayer::new(request_timeout))
                .layer(cors)
                .layer(Extension(service)),
        )
}

/// Serve the gateway on `port` until Ctrl-C.
///
/// # Errors
/// Returns an error if the listener cannot be bound or the server fails.
pub async fn new(port: u16, service: Arc<AccountService>, request_timeout: Duration) -> Result<()> {
    let app = router(service, request_timeout);

    let listener = TcpListener::bind(format!("::0:{port}")).await?;

    info!("Listening on [::]:{}", port);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {e}");
        return;
    }
    info!("Gracefully shutdown");
}

fn make_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get(REQUEST_ID)
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");

    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| request.uri().path(), MatchedPath::as_str);

    info_span!(
        "http.request",
        http.method = %request.method(),
        http.route = route,
        request_id
    )
}
