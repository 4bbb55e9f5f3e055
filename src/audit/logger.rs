//! Append-only security event log.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::AuditConfig;
use crate::security::authz::Role;

/// Event names recorded by the gateway.
pub mod events {
    pub const LOGIN_SUCCESS: &str = "login_success";
    pub const LOGIN_FAILED: &str = "login_failed";
    pub const LOGOUT: &str = "logout";
    pub const SESSION_TIMEOUT: &str = "session_timeout";
    pub const CSRF_FAILURE: &str = "csrf_failure";
    pub const RATE_LIMIT_EXCEEDED: &str = "rate_limit_exceeded";
    pub const PERMISSION_DENIED: &str = "permission_denied";
    pub const FILE_UPLOAD_SUCCESS: &str = "file_upload_success";
    pub const FILE_UPLOAD_REJECTED: &str = "file_upload_rejected";
    pub const INTERNAL_ERROR: &str = "internal_error";
}

/// One structured audit record, serialized as a single NDJSON line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityEvent {
    pub timestamp: DateTime<Utc>,
    pub event: String,
    pub client_id: String,
    pub principal_id: Option<u64>,
    pub role: Option<Role>,
    pub data: serde_json::Value,
}

/// Append-only writer for security events.
///
/// Writes are serialized behind a mutex and flushed per record; a crashed
/// process loses at most the record being written. A disabled log swallows
/// records but still emits the tracing event.
pub struct AuditLog {
    sink: Option<Mutex<BufWriter<File>>>,
}

impl AuditLog {
    /// Open the log file in append mode, or a disabled log per config.
    pub fn open(config: &AuditConfig) -> std::io::Result<Self> {
        if !config.enabled {
            return Ok(Self::disabled());
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(Path::new(&config.log_path))?;
        Ok(Self {
            sink: Some(Mutex::new(BufWriter::new(file))),
        })
    }

    /// A log that records nothing to disk.
    pub fn disabled() -> Self {
        Self { sink: None }
    }

    /// Append one event.
    pub fn record(
        &self,
        event: &str,
        client_id: &str,
        principal_id: Option<u64>,
        role: Option<Role>,
        data: serde_json::Value,
    ) {
        tracing::info!(
            target: "gatekeeper::audit",
            event = %event,
            client_id = %client_id,
            principal_id = ?principal_id,
            role = ?role,
            "security event"
        );

        let Some(sink) = &self.sink else {
            return;
        };

        let record = SecurityEvent {
            timestamp: Utc::now(),
            event: event.to_string(),
            client_id: client_id.to_string(),
            principal_id,
            role,
            data,
        };

        let line = match serde_json::to_string(&record) {
            Ok(line) => line,
            Err(e) => {
                tracing::error!(error = %e, "Failed to serialize audit event");
                return;
            }
        };

        let mut writer = match sink.lock() {
            Ok(writer) => writer,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Err(e) = writeln!(writer, "{}", line).and_then(|_| writer.flush()) {
            tracing::error!(error = %e, "Failed to append audit event");
        }
    }
}
