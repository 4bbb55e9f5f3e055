//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

use crate::security::authz::Role;

/// Root configuration for the security gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration (bind address, connection limits).
    pub listener: ListenerConfig,

    /// Authentication settings and seeded principals.
    pub auth: AuthConfig,

    /// Session lifetime and cookie settings.
    pub session: SessionConfig,

    /// Anti-forgery token settings.
    pub csrf: CsrfConfig,

    /// Rate limiting configuration per category.
    pub rate_limit: RateLimitConfig,

    /// Upload validation and storage settings.
    pub upload: UploadConfig,

    /// Security event log settings.
    pub audit: AuditConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Client identity resolution settings.
    pub security: SecurityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Maximum concurrent connections (backpressure).
    pub max_connections: usize,

    /// Request timeout (total time for request/response) in seconds.
    pub request_timeout_secs: u64,

    /// Maximum request body size in bytes.
    pub max_body_bytes: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            max_connections: 10_000,
            request_timeout_secs: 30,
            max_body_bytes: 8 * 1024 * 1024,
        }
    }
}

/// Authentication configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Login entry point; unauthenticated browsers are redirected here.
    pub login_path: String,

    /// Where logout and successful browser logins land by default.
    pub default_redirect: String,

    /// When the claimed-role lookup misses, retry the identifier across all
    /// roles. Off by default: it weakens the role-selection guarantee and
    /// exists only for compatibility with deployments that relied on it.
    pub allow_cross_role_lookup: bool,

    /// Principals seeded into the in-memory directory at startup.
    pub principals: Vec<PrincipalSeed>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            login_path: "/auth/login".to_string(),
            default_redirect: "/".to_string(),
            allow_cross_role_lookup: false,
            principals: Vec::new(),
        }
    }
}

/// A principal record seeded from configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PrincipalSeed {
    /// Unique principal identifier.
    pub id: u64,

    /// Login name, matched exactly.
    pub username: String,

    /// Email address, matched case-insensitively.
    pub email: String,

    /// Role the principal holds.
    pub role: Role,

    /// Argon2 PHC-format hash of the principal's secret.
    pub secret_hash: String,

    /// Name shown in session info.
    #[serde(default)]
    pub display_name: String,
}

/// Session configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Idle lifetime in seconds before a session is expired.
    pub lifetime_secs: u64,

    /// Name of the cookie carrying the session identifier.
    pub cookie_name: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            lifetime_secs: 1800,
            cookie_name: "gk_session".to_string(),
        }
    }
}

/// Anti-forgery token configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CsrfConfig {
    /// Random bytes per token before encoding.
    pub token_bytes: usize,

    /// Token lifetime in seconds.
    pub expiry_secs: u64,

    /// Paths exempt from token verification: exact suffix match, or prefix
    /// match when the pattern ends with `*`.
    pub exempt_paths: Vec<String>,
}

impl Default for CsrfConfig {
    fn default() -> Self {
        Self {
            token_bytes: 32,
            expiry_secs: 3600,
            exempt_paths: vec![
                "/auth/login".to_string(),
                "/auth/register".to_string(),
                "/auth/password-reset".to_string(),
                "/webhooks/*".to_string(),
                "/health".to_string(),
            ],
        }
    }
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Enable rate limiting.
    pub enabled: bool,

    /// Limits for credential-guessing attempts.
    pub login: CategoryLimitConfig,

    /// Limits for generic API traffic.
    pub api: CategoryLimitConfig,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            login: CategoryLimitConfig {
                max_attempts: 5,
                window_secs: 1800,
                lockout_secs: 1800,
            },
            api: CategoryLimitConfig {
                max_attempts: 60,
                window_secs: 60,
                lockout_secs: 60,
            },
        }
    }
}

/// Sliding-window limits for one category.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CategoryLimitConfig {
    /// Attempts allowed within the decay window.
    pub max_attempts: usize,

    /// Decay window in seconds; older attempts stop counting.
    pub window_secs: u64,

    /// Lockout duration in seconds once the cap is hit.
    pub lockout_secs: u64,
}

/// Upload validation and storage configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UploadConfig {
    /// Maximum accepted file size in bytes.
    pub max_size_bytes: u64,

    /// Directory stored files are written under.
    pub dir: String,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_size_bytes: 5 * 1024 * 1024,
            dir: "uploads".to_string(),
        }
    }
}

/// Security event log configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AuditConfig {
    /// Enable the append-only event log.
    pub enabled: bool,

    /// Path of the newline-delimited event log.
    pub log_path: String,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            log_path: "security_events.log".to_string(),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,

    /// Include internal error detail in failure responses. Development only.
    pub expose_internal_errors: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
            expose_internal_errors: false,
        }
    }
}

/// Client identity resolution configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Trust X-Forwarded-For / X-Real-IP. Enable only behind a proxy that
    /// strips client-supplied values.
    pub trust_forwarded_headers: bool,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            trust_forwarded_headers: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = GatewayConfig::default();
        assert_eq!(config.session.lifetime_secs, 1800);
        assert_eq!(config.rate_limit.login.max_attempts, 5);
        assert_eq!(config.rate_limit.api.window_secs, 60);
        assert!(!config.auth.allow_cross_role_lookup);
        assert!(!config.security.trust_forwarded_headers);
    }

    #[test]
    fn test_minimal_toml_uses_defaults() {
        let config: GatewayConfig = toml::from_str("[session]\nlifetime_secs = 60\n").unwrap();
        assert_eq!(config.session.lifetime_secs, 60);
        assert_eq!(config.session.cookie_name, "gk_session");
        assert_eq!(config.csrf.token_bytes, 32);
    }

    #[test]
    fn test_principal_seed_parses() {
        let toml_str = r#"
            [[auth.principals]]
            id = 1
            username = "alice"
            email = "alice@example.edu"
            role = "student"
            secret_hash = "$argon2id$v=19$m=19456,t=2,p=1$abc$def"
        "#;
        let config: GatewayConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.auth.principals.len(), 1);
        assert_eq!(config.auth.principals[0].role, Role::Student);
    }
}
