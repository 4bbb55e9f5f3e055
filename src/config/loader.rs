//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::GatewayConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Why a configuration file was rejected.
///
/// `Invalid` carries every semantic violation at once, so an operator fixes
/// the file in one pass instead of replaying load-fail loops.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("could not parse {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("{path} failed validation: {}", summarize(.violations))]
    Invalid {
        path: String,
        violations: Vec<ValidationError>,
    },
}

fn summarize(violations: &[ValidationError]) -> String {
    violations
        .iter()
        .map(ValidationError::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Load a gateway configuration from a TOML file.
///
/// Each violation is also logged on its own line before the error returns.
pub fn load_config(path: &Path) -> Result<GatewayConfig, ConfigError> {
    let shown = path.display().to_string();

    let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: shown.clone(),
        source,
    })?;
    let config: GatewayConfig = toml::from_str(&content).map_err(|source| ConfigError::Parse {
        path: shown.clone(),
        source,
    })?;

    if let Err(violations) = validate_config(&config) {
        for violation in &violations {
            tracing::error!(
                field = %violation.field,
                "Rejected configuration: {}",
                violation.message
            );
        }
        return Err(ConfigError::Invalid {
            path: shown,
            violations,
        });
    }

    tracing::debug!(
        path = %shown,
        seeded_principals = config.auth.principals.len(),
        "Configuration loaded"
    );
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_missing_file() {
        let err = load_config(Path::new("/nonexistent/gateway.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
        // The message names the file that could not be read.
        assert!(err.to_string().contains("/nonexistent/gateway.toml"));
    }

    #[test]
    fn test_load_invalid_toml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not [valid toml").unwrap();
        let err = load_config(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_load_reports_every_violation() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            "[csrf]\ntoken_bytes = 1\n\n[session]\nlifetime_secs = 0\n"
        )
        .unwrap();

        let err = load_config(file.path()).unwrap_err();
        match err {
            ConfigError::Invalid { violations, .. } => {
                assert_eq!(violations.len(), 2);
                assert!(violations.iter().any(|v| v.field == "csrf.token_bytes"));
                assert!(violations.iter().any(|v| v.field == "session.lifetime_secs"));
            }
            other => panic!("expected Invalid, got {:?}", other),
        }
    }

    #[test]
    fn test_load_valid_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "[session]\nlifetime_secs = 900\n").unwrap();
        let config = load_config(file.path()).unwrap();
        assert_eq!(config.session.lifetime_secs, 900);
    }
}
