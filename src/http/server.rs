//! HTTP server setup and gateway wiring.
//!
//! # Responsibilities
//! - Create the Axum router with all gateway endpoints
//! - Wire up middleware in the mandated order (identity → rate limit →
//!   session touch → CSRF) plus tracing, timeouts and body limits
//! - Bind the server to a listener with graceful shutdown
//!
//! Handlers here are the thin demonstration surface over the gateway API;
//! real record CRUD lives with the collaborating application.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::{Extension, Query, State};
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use tokio::net::TcpListener;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::config::GatewayConfig;
use crate::error::GatewayError;
use crate::gateway::Gateway;
use crate::http::middleware::{self, CurrentSession};
use crate::http::response;
use crate::security::authz::{Permission, ResourceKind, Role};
use crate::security::client_ip::ClientIp;
use crate::security::rate_limit::RateCategory;
use crate::session::auth::InMemoryCounter;
use crate::upload::{TransferStatus, UploadCategory, UploadDescriptor};

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub gateway: Arc<Gateway>,
    pub counters: Arc<InMemoryCounter>,
}

/// HTTP server fronting the gateway.
pub struct GatewayServer {
    router: Router,
}

impl GatewayServer {
    /// Create a new HTTP server around a gateway.
    pub fn new(gateway: Arc<Gateway>, counters: Arc<InMemoryCounter>) -> Self {
        let config = gateway.current_config();
        let state = AppState { gateway, counters };
        let router = Self::build_router(&config, state);
        Self { router }
    }

    /// Build the Axum router with all middleware layers.
    ///
    /// Layers execute outermost-last-added: trace → timeout → request id →
    /// body limit → metrics → client ip → rate limit → session → CSRF.
    fn build_router(config: &GatewayConfig, state: AppState) -> Router {
        Router::new()
            .route("/health", get(health))
            .route("/auth/login", post(login))
            .route("/auth/logout", post(logout))
            .route("/auth/token", get(issue_token))
            .route("/auth/session", get(session_info))
            .route("/uploads", post(upload))
            .route("/vehicles", post(register_vehicle))
            .with_state(state.clone())
            .layer(axum::middleware::from_fn_with_state(
                state.clone(),
                middleware::verify_csrf,
            ))
            .layer(axum::middleware::from_fn_with_state(
                state.clone(),
                middleware::touch_session,
            ))
            .layer(axum::middleware::from_fn_with_state(
                state.clone(),
                middleware::throttle_api,
            ))
            .layer(axum::middleware::from_fn_with_state(
                state,
                middleware::resolve_client_ip,
            ))
            .layer(axum::middleware::from_fn(middleware::track_request))
            .layer(axum::extract::DefaultBodyLimit::max(
                config.listener.max_body_bytes,
            ))
            .layer(RequestBodyLimitLayer::new(config.listener.max_body_bytes))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
            .layer(TimeoutLayer::new(Duration::from_secs(
                config.listener.request_timeout_secs,
            )))
            .layer(CatchPanicLayer::custom(handle_panic))
            .layer(TraceLayer::new_for_http())
    }

    /// Run the server, accepting connections on the given listener.
    pub async fn run(self, listener: TcpListener) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "Gateway HTTP server starting");

        let app = self
            .router
            .into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        tracing::info!("Gateway HTTP server stopped");
        Ok(())
    }
}

/// Boundary for unexpected faults: log with full context, answer generically.
fn handle_panic(err: Box<dyn std::any::Any + Send + 'static>) -> Response {
    let detail = err
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| err.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    tracing::error!(panic = %detail, "Request handler panicked");
    (StatusCode::INTERNAL_SERVER_ERROR, "an error occurred").into_response()
}

/// Wait for shutdown signal (Ctrl+C).
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to install Ctrl+C handler");
        return;
    }
    tracing::info!("Shutdown signal received");
}

async fn health() -> Response {
    Json(json!({"status": "ok"})).into_response()
}

#[derive(Deserialize)]
struct LoginRequest {
    identifier: String,
    secret: String,
    role: Role,
}

#[derive(Deserialize)]
struct LoginQuery {
    redirect: Option<String>,
}

async fn login(
    State(state): State<AppState>,
    Extension(client): Extension<ClientIp>,
    Extension(session): Extension<CurrentSession>,
    Query(query): Query<LoginQuery>,
    headers: HeaderMap,
    Json(body): Json<LoginRequest>,
) -> Response {
    let config = state.gateway.current_config();
    let client_key = client.normalized();

    if let Err(err) = state
        .gateway
        .check_and_record(&client_key, RateCategory::LoginAttempts)
    {
        return response::failure(&err, &headers, "/auth/login", &config);
    }

    match state.gateway.authenticate(
        session.0,
        &body.identifier,
        &body.secret,
        body.role,
        &client_key,
    ) {
        Ok(new_session) => {
            let mut response = if response::wants_json(&headers) {
                Json(json!({
                    "success": true,
                    "role": new_session.role.as_str(),
                    "display_name": new_session.display_name,
                }))
                .into_response()
            } else {
                // Only same-origin paths may be bounced back to.
                let target = query
                    .redirect
                    .as_deref()
                    .filter(|t| t.starts_with('/') && !t.starts_with("//"))
                    .unwrap_or(&config.auth.default_redirect);
                response::redirect(target)
            };
            let cookie = format!(
                "{}={}; Path=/; HttpOnly; SameSite=Lax",
                config.session.cookie_name, new_session.id
            );
            if let Ok(value) = HeaderValue::from_str(&cookie) {
                response.headers_mut().append(header::SET_COOKIE, value);
            }
            response
        }
        Err(err) => response::failure(&err, &headers, "/auth/login", &config),
    }
}

async fn logout(
    State(state): State<AppState>,
    Extension(client): Extension<ClientIp>,
    Extension(session): Extension<CurrentSession>,
    headers: HeaderMap,
) -> Response {
    let config = state.gateway.current_config();
    if let Some(id) = session.0 {
        state.gateway.logout(id, &client.normalized());
    }

    let mut response = if response::wants_json(&headers) {
        Json(json!({"success": true})).into_response()
    } else {
        response::redirect(&config.auth.default_redirect)
    };

    // Expire the cookie regardless of whether a session existed.
    let expired = format!(
        "{}=deleted; Path=/; HttpOnly; Max-Age=0",
        config.session.cookie_name
    );
    if let Ok(value) = HeaderValue::from_str(&expired) {
        response.headers_mut().append(header::SET_COOKIE, value);
    }
    response
}

async fn issue_token(
    State(state): State<AppState>,
    Extension(session): Extension<CurrentSession>,
    headers: HeaderMap,
) -> Response {
    let config = state.gateway.current_config();
    let issued = session
        .0
        .ok_or(GatewayError::NotAuthenticated)
        .and_then(|id| state.gateway.issue_token(id));

    match issued {
        Ok(token) => Json(json!({"token": token})).into_response(),
        Err(err) => response::failure(&err, &headers, "/auth/token", &config),
    }
}

async fn session_info(
    State(state): State<AppState>,
    Extension(session): Extension<CurrentSession>,
) -> Response {
    match state.gateway.require_authenticated(session.0) {
        Ok(s) => Json(json!({
            "authenticated": true,
            "principal_id": s.principal_id,
            "role": s.role.as_str(),
            "display_name": s.display_name,
            "is_admin": s.role == Role::Admin,
        }))
        .into_response(),
        Err(_) => Json(json!({"authenticated": false})).into_response(),
    }
}

#[derive(Deserialize)]
struct UploadQuery {
    category: Option<String>,
}

async fn upload(
    State(state): State<AppState>,
    Extension(client): Extension<ClientIp>,
    Extension(session): Extension<CurrentSession>,
    Query(query): Query<UploadQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let config = state.gateway.current_config();
    let client_key = client.normalized();

    if let Err(err) =
        state
            .gateway
            .require_permission(session.0, Permission::UploadDocuments, &client_key)
    {
        return response::failure(&err, &headers, "/uploads", &config);
    }

    let Ok(category) = query
        .category
        .as_deref()
        .unwrap_or("document")
        .parse::<UploadCategory>()
    else {
        return (StatusCode::UNPROCESSABLE_ENTITY, "unknown upload category").into_response();
    };

    let original_name = headers
        .get("x-upload-filename")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string();
    let declared_mime = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("application/octet-stream")
        .to_string();
    let transfer = if body.is_empty() {
        TransferStatus::Missing
    } else {
        TransferStatus::Ok
    };

    let descriptor = UploadDescriptor {
        original_name,
        declared_mime,
        size: body.len() as u64,
        bytes: body.to_vec(),
        transfer,
    };

    match state
        .gateway
        .store_upload(session.0, &descriptor, category, &client_key)
    {
        Ok(stored) => Json(json!({
            "success": true,
            "stored_name": stored.stored_name,
            "size": stored.size,
            "mime": stored.mime,
        }))
        .into_response(),
        Err(err) => response::failure(&err, &headers, "/uploads", &config),
    }
}

async fn register_vehicle(
    State(state): State<AppState>,
    Extension(client): Extension<ClientIp>,
    Extension(session): Extension<CurrentSession>,
    headers: HeaderMap,
) -> Response {
    let config = state.gateway.current_config();
    let client_key = client.normalized();

    if let Err(err) =
        state
            .gateway
            .require_permission(session.0, Permission::RegisterVehicle, &client_key)
    {
        return response::failure(&err, &headers, "/vehicles", &config);
    }

    if !state.gateway.can_register(session.0, ResourceKind::Vehicle) {
        return (
            StatusCode::CONFLICT,
            Json(json!({
                "success": false,
                "message": "vehicle limit reached for this account",
            })),
        )
            .into_response();
    }

    if let Some(principal_id) = state.gateway.current_principal_id(session.0) {
        state.counters.increment(principal_id, ResourceKind::Vehicle);
    }
    Json(json!({"success": true})).into_response()
}
