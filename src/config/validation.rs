//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (lifetimes > 0, token length, caps)
//! - Check seeded principals for duplicates and malformed hashes
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use crate::config::schema::{CategoryLimitConfig, GatewayConfig};

/// A single semantic violation, pointing at the offending field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validate a configuration, collecting every violation.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            "not a valid socket address",
        ));
    }
    if config.listener.max_connections == 0 {
        errors.push(ValidationError::new(
            "listener.max_connections",
            "must be greater than zero",
        ));
    }
    if config.listener.request_timeout_secs == 0 {
        errors.push(ValidationError::new(
            "listener.request_timeout_secs",
            "must be greater than zero",
        ));
    }

    if config.session.lifetime_secs == 0 {
        errors.push(ValidationError::new(
            "session.lifetime_secs",
            "must be greater than zero",
        ));
    }
    if config.session.cookie_name.is_empty() {
        errors.push(ValidationError::new(
            "session.cookie_name",
            "must not be empty",
        ));
    }

    if config.csrf.token_bytes < 16 {
        errors.push(ValidationError::new(
            "csrf.token_bytes",
            "tokens shorter than 16 bytes are guessable",
        ));
    }
    if config.csrf.expiry_secs == 0 {
        errors.push(ValidationError::new(
            "csrf.expiry_secs",
            "must be greater than zero",
        ));
    }
    for (i, pattern) in config.csrf.exempt_paths.iter().enumerate() {
        if pattern.is_empty() || pattern == "*" {
            errors.push(ValidationError::new(
                &format!("csrf.exempt_paths[{}]", i),
                "pattern must not be empty or match everything",
            ));
        }
    }

    validate_category(&config.rate_limit.login, "rate_limit.login", &mut errors);
    validate_category(&config.rate_limit.api, "rate_limit.api", &mut errors);

    if config.upload.max_size_bytes == 0 {
        errors.push(ValidationError::new(
            "upload.max_size_bytes",
            "must be greater than zero",
        ));
    }
    if config.upload.dir.is_empty() {
        errors.push(ValidationError::new("upload.dir", "must not be empty"));
    }

    if config.audit.enabled && config.audit.log_path.is_empty() {
        errors.push(ValidationError::new(
            "audit.log_path",
            "must not be empty when audit is enabled",
        ));
    }

    match config.observability.log_level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => {}
        other => errors.push(ValidationError::new(
            "observability.log_level",
            format!("unknown level '{}'", other),
        )),
    }
    if config.observability.metrics_enabled
        && config
            .observability
            .metrics_address
            .parse::<SocketAddr>()
            .is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            "not a valid socket address",
        ));
    }

    let mut seen_ids = std::collections::HashSet::new();
    for (i, seed) in config.auth.principals.iter().enumerate() {
        let field = format!("auth.principals[{}]", i);
        if !seen_ids.insert(seed.id) {
            errors.push(ValidationError::new(&field, "duplicate principal id"));
        }
        if seed.username.is_empty() && seed.email.is_empty() {
            errors.push(ValidationError::new(&field, "needs a username or email"));
        }
        if !seed.secret_hash.starts_with("$argon2") {
            errors.push(ValidationError::new(
                &field,
                "secret_hash is not an argon2 PHC string",
            ));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_category(limit: &CategoryLimitConfig, field: &str, errors: &mut Vec<ValidationError>) {
    if limit.max_attempts == 0 {
        errors.push(ValidationError::new(
            &format!("{}.max_attempts", field),
            "must be greater than zero",
        ));
    }
    if limit.window_secs == 0 {
        errors.push(ValidationError::new(
            &format!("{}.window_secs", field),
            "must be greater than zero",
        ));
    }
    if limit.lockout_secs == 0 {
        errors.push(ValidationError::new(
            &format!("{}.lockout_secs", field),
            "must be greater than zero",
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&GatewayConfig::default()).is_ok());
    }

    #[test]
    fn test_collects_all_errors() {
        let mut config = GatewayConfig::default();
        config.session.lifetime_secs = 0;
        config.csrf.token_bytes = 4;
        config.rate_limit.login.max_attempts = 0;
        config.upload.max_size_bytes = 0;

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 4);
        assert!(errors.iter().any(|e| e.field == "session.lifetime_secs"));
        assert!(errors.iter().any(|e| e.field == "csrf.token_bytes"));
    }

    #[test]
    fn test_rejects_short_tokens() {
        let mut config = GatewayConfig::default();
        config.csrf.token_bytes = 8;
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("guessable"));
    }

    #[test]
    fn test_rejects_bad_principal_seed() {
        let mut config = GatewayConfig::default();
        config.auth.principals.push(crate::config::PrincipalSeed {
            id: 1,
            username: "alice".into(),
            email: "alice@example.edu".into(),
            role: crate::security::authz::Role::Student,
            secret_hash: "plaintext-oops".into(),
            display_name: String::new(),
        });
        let errors = validate_config(&config).unwrap_err();
        assert!(errors.iter().any(|e| e.message.contains("argon2")));
    }
}
