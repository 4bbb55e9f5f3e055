//! Gateway middleware chain.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → track_request (latency + status metrics)
//!     → resolve_client_ip (attach ClientIp extension)
//!     → throttle_api (api_requests sliding window)
//!     → touch_session (cookie → idle-timeout check → CurrentSession)
//!     → verify_csrf (mutating methods, minus the exemption list)
//!     → handlers
//! ```
//!
//! Ordering is strict: nothing downstream runs once a stage denies.

use std::net::SocketAddr;
use std::time::Instant;

use axum::extract::{ConnectInfo, Request, State};
use axum::http::{header, HeaderMap, Method};
use axum::middleware::Next;
use axum::response::Response;
use serde_json::json;
use uuid::Uuid;

use crate::audit::events;
use crate::error::GatewayError;
use crate::http::response;
use crate::http::server::AppState;
use crate::observability::metrics;
use crate::security::client_ip::ClientIp;
use crate::security::csrf;
use crate::security::rate_limit::RateCategory;

/// Session identifier surviving the idle-timeout check, if any.
#[derive(Debug, Clone, Copy)]
pub struct CurrentSession(pub Option<Uuid>);

/// Record method, status and latency for every request.
pub async fn track_request(request: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().to_string();
    let response = next.run(request).await;
    metrics::record_request(&method, response.status().as_u16(), start);
    response
}

/// Resolve the client identity once and attach it for everything downstream.
pub async fn resolve_client_ip(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    mut request: Request,
    next: Next,
) -> Response {
    let trust = state
        .gateway
        .current_config()
        .security
        .trust_forwarded_headers;
    let client = ClientIp::resolve(request.headers(), Some(addr), trust);
    request.extensions_mut().insert(client);
    next.run(request).await
}

/// Enforce the generic API sliding window per client.
pub async fn throttle_api(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    // Health probes must not consume the caller's window.
    if request.uri().path() == "/health" {
        return next.run(request).await;
    }

    let client = client_key(&request);
    if let Err(err) = state
        .gateway
        .check_and_record(&client, RateCategory::ApiRequests)
    {
        tracing::warn!(client = %client, "API rate limit exceeded");
        return response::failure(
            &err,
            request.headers(),
            request.uri().path(),
            &state.gateway.current_config(),
        );
    }
    next.run(request).await
}

/// Load the session cookie and apply the idle-timeout rule.
///
/// This is the once-per-request expiry check; handlers only ever see a
/// session that survived it.
pub async fn touch_session(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let cookie_name = state.gateway.current_config().session.cookie_name.clone();
    let client = client_key(&request);

    let live = session_cookie(request.headers(), &cookie_name)
        .filter(|id| state.gateway.check_session_timeout(id, &client));
    request.extensions_mut().insert(CurrentSession(live));
    next.run(request).await
}

/// Verify the anti-forgery token on state-changing requests.
pub async fn verify_csrf(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let mutating = matches!(
        *request.method(),
        Method::POST | Method::PUT | Method::PATCH | Method::DELETE
    );
    let config = state.gateway.current_config();
    let path = request.uri().path().to_string();

    if !mutating || csrf::is_exempt(&path, &config.csrf.exempt_paths) {
        return next.run(request).await;
    }

    let session = request
        .extensions()
        .get::<CurrentSession>()
        .copied()
        .unwrap_or(CurrentSession(None));
    let token = csrf_token(&request);

    let err = match &token {
        None => Some(GatewayError::CsrfMissing),
        Some(token) if !state.gateway.verify_token(session.0, token) => {
            Some(GatewayError::CsrfInvalid)
        }
        Some(_) => None,
    };

    let Some(err) = err else {
        return next.run(request).await;
    };

    let client = client_key(&request);
    state.gateway.log_security_event(
        events::CSRF_FAILURE,
        &client,
        state.gateway.current_principal_id(session.0),
        state.gateway.current_role(session.0),
        json!({"path": path, "token_missing": token.is_none()}),
    );
    metrics::record_csrf_rejected();
    response::failure(&err, request.headers(), &path, &config)
}

/// The rate-limit/audit key for this request.
pub fn client_key(request: &Request) -> String {
    request
        .extensions()
        .get::<ClientIp>()
        .map(|c| c.normalized())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Parse the session identifier out of the Cookie header.
pub fn session_cookie(headers: &HeaderMap, name: &str) -> Option<Uuid> {
    let raw = headers.get(header::COOKIE)?.to_str().ok()?;
    raw.split(';')
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .and_then(|(_, value)| Uuid::parse_str(value).ok())
}

/// The anti-forgery token from the header or the query string.
fn csrf_token(request: &Request) -> Option<String> {
    if let Some(value) = request
        .headers()
        .get("x-csrf-token")
        .and_then(|v| v.to_str().ok())
    {
        return Some(value.to_string());
    }
    request.uri().query().and_then(|query| {
        url::form_urlencoded::parse(query.as_bytes())
            .find(|(key, _)| key == "csrf_token")
            .map(|(_, value)| value.into_owned())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_session_cookie_parsing() {
        let id = Uuid::new_v4();
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_str(&format!("theme=dark; gk_session={}; lang=en", id)).unwrap(),
        );

        assert_eq!(session_cookie(&headers, "gk_session"), Some(id));
        assert_eq!(session_cookie(&headers, "other"), None);
    }

    #[test]
    fn test_session_cookie_rejects_garbage() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("gk_session=not-a-uuid"),
        );
        assert_eq!(session_cookie(&headers, "gk_session"), None);
        assert_eq!(session_cookie(&HeaderMap::new(), "gk_session"), None);
    }

    #[test]
    fn test_csrf_token_sources() {
        let request = Request::builder()
            .uri("/vehicles")
            .header("x-csrf-token", "abc123")
            .body(axum::body::Body::empty())
            .unwrap();
        assert_eq!(csrf_token(&request), Some("abc123".to_string()));

        let request = Request::builder()
            .uri("/vehicles?csrf_token=from-query")
            .body(axum::body::Body::empty())
            .unwrap();
        assert_eq!(csrf_token(&request), Some("from-query".to_string()));

        let request = Request::builder()
            .uri("/vehicles")
            .body(axum::body::Body::empty())
            .unwrap();
        assert_eq!(csrf_token(&request), None);
    }
}
