//! Failure responses and content negotiation.
//!
//! # Responsibilities
//! - Detect JSON/XHR callers from Accept and X-Requested-With
//! - Map the error taxonomy onto the wire contract: 302 redirects for
//!   browsers, `{success:false, message}` JSON otherwise
//! - Never leak internal detail outside development mode
//!
//! # Design Decisions
//! - "Not logged in" and "insufficient role" produce identical responses
//! - Redirects are 302 and carry the requested path in `redirect=`

use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::config::GatewayConfig;
use crate::error::GatewayError;

/// Non-standard "page expired" status used for failed anti-forgery checks.
const STATUS_PAGE_EXPIRED: u16 = 419;

/// Whether the caller negotiated a JSON response.
pub fn wants_json(headers: &HeaderMap) -> bool {
    let accept_json = headers
        .get(header::ACCEPT)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.contains("application/json"))
        .unwrap_or(false);
    let xhr = headers
        .get("x-requested-with")
        .and_then(|v| v.to_str().ok())
        .map(|v| v.eq_ignore_ascii_case("xmlhttprequest"))
        .unwrap_or(false);
    accept_json || xhr
}

/// Plain 302 to `location`.
pub fn redirect(location: &str) -> Response {
    let mut response = StatusCode::FOUND.into_response();
    if let Ok(value) = HeaderValue::from_str(location) {
        response.headers_mut().insert(header::LOCATION, value);
    }
    response
}

/// 302 to the login entry point, carrying the originally requested path so
/// the caller can return there after logging in.
pub fn redirect_to_login(config: &GatewayConfig, requested: &str) -> Response {
    let encoded: String = url::form_urlencoded::byte_serialize(requested.as_bytes()).collect();
    redirect(&format!("{}?redirect={}", config.auth.login_path, encoded))
}

/// Map a gateway error onto the wire contract.
pub fn failure(
    err: &GatewayError,
    headers: &HeaderMap,
    requested_path: &str,
    config: &GatewayConfig,
) -> Response {
    let json = wants_json(headers);
    match err {
        GatewayError::InvalidCredentials => {
            message_response(StatusCode::UNAUTHORIZED, &err.to_string(), json)
        }
        // Deliberately identical for both, so probing clients cannot tell
        // an unknown session from an insufficient role.
        GatewayError::NotAuthenticated | GatewayError::PermissionDenied => {
            if json {
                message_response(StatusCode::UNAUTHORIZED, "authentication required", true)
            } else {
                redirect_to_login(config, requested_path)
            }
        }
        GatewayError::CsrfMissing | GatewayError::CsrfInvalid => {
            let status = StatusCode::from_u16(STATUS_PAGE_EXPIRED)
                .unwrap_or(StatusCode::FORBIDDEN);
            message_response(status, "page expired, reload the form and try again", json)
        }
        GatewayError::RateLimited { retry_after } => {
            let mut response =
                message_response(StatusCode::TOO_MANY_REQUESTS, &err.to_string(), json);
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(retry_after.as_secs()));
            response
        }
        GatewayError::UploadRejected { reasons } => {
            let texts: Vec<String> = reasons.iter().map(|r| r.to_string()).collect();
            if json {
                (
                    StatusCode::UNPROCESSABLE_ENTITY,
                    Json(json!({
                        "success": false,
                        "message": "upload rejected",
                        "reasons": texts,
                    })),
                )
                    .into_response()
            } else {
                (
                    StatusCode::UNPROCESSABLE_ENTITY,
                    format!("Upload rejected: {}", texts.join("; ")),
                )
                    .into_response()
            }
        }
        GatewayError::Internal(detail) => {
            let message = if config.observability.expose_internal_errors {
                detail.as_str()
            } else {
                "an error occurred"
            };
            message_response(StatusCode::INTERNAL_SERVER_ERROR, message, json)
        }
    }
}

fn message_response(status: StatusCode, message: &str, json: bool) -> Response {
    if json {
        (status, Json(json!({"success": false, "message": message}))).into_response()
    } else {
        (status, message.to_string()).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn json_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::ACCEPT, HeaderValue::from_static("application/json"));
        headers
    }

    #[test]
    fn test_wants_json_detection() {
        assert!(wants_json(&json_headers()));

        let mut xhr = HeaderMap::new();
        xhr.insert("x-requested-with", HeaderValue::from_static("XMLHttpRequest"));
        assert!(wants_json(&xhr));

        let mut browser = HeaderMap::new();
        browser.insert(header::ACCEPT, HeaderValue::from_static("text/html"));
        assert!(!wants_json(&browser));
        assert!(!wants_json(&HeaderMap::new()));
    }

    #[test]
    fn test_browser_auth_failure_redirects_with_path() {
        let config = GatewayConfig::default();
        let response = failure(
            &GatewayError::NotAuthenticated,
            &HeaderMap::new(),
            "/vehicles?page=2",
            &config,
        );
        assert_eq!(response.status(), StatusCode::FOUND);
        let location = response.headers()[header::LOCATION].to_str().unwrap();
        assert!(location.starts_with("/auth/login?redirect="));
        assert!(location.contains("%2Fvehicles%3Fpage%3D2"));
    }

    #[test]
    fn test_permission_denied_matches_not_authenticated() {
        let config = GatewayConfig::default();
        let headers = json_headers();
        let a = failure(&GatewayError::NotAuthenticated, &headers, "/x", &config);
        let b = failure(&GatewayError::PermissionDenied, &headers, "/x", &config);
        assert_eq!(a.status(), b.status());
        assert_eq!(a.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_csrf_failure_is_419() {
        let config = GatewayConfig::default();
        let response = failure(&GatewayError::CsrfInvalid, &json_headers(), "/x", &config);
        assert_eq!(response.status().as_u16(), 419);
    }

    #[test]
    fn test_rate_limited_sets_retry_after() {
        let config = GatewayConfig::default();
        let response = failure(
            &GatewayError::RateLimited {
                retry_after: Duration::from_secs(120),
            },
            &json_headers(),
            "/x",
            &config,
        );
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()[header::RETRY_AFTER], "120");
    }

    #[test]
    fn test_internal_detail_hidden_by_default() {
        let mut config = GatewayConfig::default();
        let err = GatewayError::Internal("db password wrong".into());

        let hidden = failure(&err, &HeaderMap::new(), "/x", &config);
        assert_eq!(hidden.status(), StatusCode::INTERNAL_SERVER_ERROR);

        config.observability.expose_internal_errors = true;
        let shown = failure(&err, &HeaderMap::new(), "/x", &config);
        assert_eq!(shown.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
