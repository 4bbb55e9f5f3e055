//! The gateway context object.
//!
//! Every security decision flows through one `Gateway`: it owns the session
//! store, rate-limit windows, audit log and collaborator handles, and is the
//! only code allowed to mutate them. Handlers and middleware hold it behind
//! an `Arc` and call the operations below; per-request ordering (identity →
//! rate limit → CSRF → business logic) is enforced by the HTTP layer.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use arc_swap::ArcSwap;
use serde_json::json;
use uuid::Uuid;

use crate::audit::{events, AuditLog};
use crate::config::GatewayConfig;
use crate::error::{GatewayError, GatewayResult};
use crate::observability::metrics;
use crate::security::authz::{self, Permission, ResourceKind, Role};
use crate::security::csrf;
use crate::security::rate_limit::{CategoryLimit, RateCategory, RateLimiter};
use crate::session::auth::{verify_secret, PrincipalDirectory, ResourceCounter};
use crate::session::store::{Session, SessionStore, TouchOutcome};
use crate::upload::{self, StoredUpload, UploadCategory, UploadDescriptor, UploadRejection};

/// Request-security gateway state shared across handlers.
pub struct Gateway {
    config: ArcSwap<GatewayConfig>,
    sessions: SessionStore,
    limiter: RateLimiter,
    directory: Arc<dyn PrincipalDirectory>,
    counters: Arc<dyn ResourceCounter>,
    audit: AuditLog,
}

impl Gateway {
    /// Build a gateway, opening the audit log per config.
    pub fn new(
        config: GatewayConfig,
        directory: Arc<dyn PrincipalDirectory>,
        counters: Arc<dyn ResourceCounter>,
    ) -> GatewayResult<Self> {
        let audit = AuditLog::open(&config.audit)?;
        Ok(Self {
            config: ArcSwap::from_pointee(config),
            sessions: SessionStore::new(),
            limiter: RateLimiter::new(),
            directory,
            counters,
            audit,
        })
    }

    /// Current configuration snapshot.
    pub fn current_config(&self) -> Arc<GatewayConfig> {
        self.config.load_full()
    }

    /// Atomically swap in a reloaded configuration.
    pub fn swap_config(&self, config: GatewayConfig) {
        self.config.store(Arc::new(config));
        tracing::info!("Gateway configuration swapped");
    }

    // ---- session ----------------------------------------------------------

    /// Verify credentials and establish a fresh session.
    ///
    /// The identifier is matched under the claimed role first; the
    /// cross-role fallback only runs when explicitly configured. Unknown
    /// identifier and secret mismatch are indistinguishable to the caller.
    /// Any `prior` session identifier the caller held is destroyed, so a
    /// pre-login identifier can never name a logged-in session.
    pub fn authenticate(
        &self,
        prior: Option<Uuid>,
        identifier: &str,
        secret: &str,
        claimed_role: Role,
        client: &str,
    ) -> GatewayResult<Session> {
        let cfg = self.config.load();

        let record = self
            .directory
            .find_by_identifier_and_role(identifier, claimed_role)
            .or_else(|| {
                if cfg.auth.allow_cross_role_lookup {
                    self.directory.find_by_identifier(identifier)
                } else {
                    None
                }
            });

        let Some(record) = record else {
            self.audit.record(
                events::LOGIN_FAILED,
                client,
                None,
                None,
                json!({
                    "identifier": identifier,
                    "claimed_role": claimed_role.as_str(),
                    "reason": "unknown_identifier",
                }),
            );
            metrics::record_auth("failure");
            return Err(GatewayError::InvalidCredentials);
        };

        if !verify_secret(secret, &record.secret_hash) {
            self.audit.record(
                events::LOGIN_FAILED,
                client,
                Some(record.id),
                Some(record.role),
                json!({"identifier": identifier, "reason": "secret_mismatch"}),
            );
            metrics::record_auth("failure");
            return Err(GatewayError::InvalidCredentials);
        }

        if let Some(prior) = prior {
            self.sessions.remove(&prior);
        }

        let session = Session::new(&record, SystemTime::now());
        self.sessions.insert(session.clone());
        self.limiter.reset(client, RateCategory::LoginAttempts);

        self.audit.record(
            events::LOGIN_SUCCESS,
            client,
            Some(record.id),
            Some(record.role),
            json!({}),
        );
        metrics::record_auth("success");
        metrics::record_session_count(self.sessions.len());
        Ok(session)
    }

    /// Destroy a session. The HTTP layer expires the cookie and redirects.
    pub fn logout(&self, id: Uuid, client: &str) {
        if let Some(session) = self.sessions.remove(&id) {
            self.audit.record(
                events::LOGOUT,
                client,
                Some(session.principal_id),
                Some(session.role),
                json!({}),
            );
        }
        metrics::record_session_count(self.sessions.len());
    }

    pub fn is_authenticated(&self, session: Option<Uuid>) -> bool {
        session
            .and_then(|id| self.sessions.with(&id, |_| ()))
            .is_some()
    }

    pub fn is_admin(&self, session: Option<Uuid>) -> bool {
        self.current_role(session) == Some(Role::Admin)
    }

    pub fn current_role(&self, session: Option<Uuid>) -> Option<Role> {
        session.and_then(|id| self.sessions.with(&id, |s| s.role))
    }

    pub fn current_principal_id(&self, session: Option<Uuid>) -> Option<u64> {
        session.and_then(|id| self.sessions.with(&id, |s| s.principal_id))
    }

    /// The full session record, or `NotAuthenticated`.
    pub fn require_authenticated(&self, session: Option<Uuid>) -> GatewayResult<Session> {
        session
            .and_then(|id| self.sessions.with(&id, |s| s.clone()))
            .ok_or(GatewayError::NotAuthenticated)
    }

    /// Per-request idle-timeout check; the session's only expiry mechanism.
    ///
    /// Returns false (after forcing logout) when the idle lifetime is
    /// exceeded, true after refreshing last-activity otherwise.
    pub fn check_session_timeout(&self, id: &Uuid, client: &str) -> bool {
        self.check_session_timeout_at(id, client, SystemTime::now())
    }

    pub fn check_session_timeout_at(&self, id: &Uuid, client: &str, now: SystemTime) -> bool {
        let lifetime = Duration::from_secs(self.config.load().session.lifetime_secs);
        match self.sessions.touch_at(id, now, lifetime) {
            TouchOutcome::Refreshed => true,
            TouchOutcome::Expired(session) => {
                self.audit.record(
                    events::SESSION_TIMEOUT,
                    client,
                    Some(session.principal_id),
                    Some(session.role),
                    json!({}),
                );
                metrics::record_session_count(self.sessions.len());
                false
            }
            TouchOutcome::Absent => false,
        }
    }

    /// Live session count, for the metrics gauge and admin surface.
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    // ---- anti-forgery tokens ----------------------------------------------

    /// Issue a token bound to the session, pruning expired entries.
    pub fn issue_token(&self, session: Uuid) -> GatewayResult<String> {
        let cfg = self.config.load();
        let expiry = Duration::from_secs(cfg.csrf.expiry_secs);
        let token_bytes = cfg.csrf.token_bytes;
        self.sessions
            .with_mut(&session, |s| {
                csrf::issue_at(&mut s.csrf_tokens, SystemTime::now(), expiry, token_bytes)
            })
            .ok_or(GatewayError::NotAuthenticated)
    }

    /// Verify a token against the session's map. Fails closed.
    pub fn verify_token(&self, session: Option<Uuid>, token: &str) -> bool {
        let expiry = Duration::from_secs(self.config.load().csrf.expiry_secs);
        session
            .and_then(|id| {
                self.sessions.with_mut(&id, |s| {
                    csrf::verify_at(&mut s.csrf_tokens, token, SystemTime::now(), expiry)
                })
            })
            .unwrap_or(false)
    }

    // ---- rate limiting ----------------------------------------------------

    /// Check and record one attempt for (client, category).
    pub fn check_and_record(&self, client: &str, category: RateCategory) -> GatewayResult<()> {
        self.check_and_record_at(client, category, SystemTime::now())
    }

    pub fn check_and_record_at(
        &self,
        client: &str,
        category: RateCategory,
        now: SystemTime,
    ) -> GatewayResult<()> {
        let cfg = self.config.load();
        if !cfg.rate_limit.enabled {
            return Ok(());
        }
        let limit = match category {
            RateCategory::LoginAttempts => CategoryLimit::from(&cfg.rate_limit.login),
            RateCategory::ApiRequests => CategoryLimit::from(&cfg.rate_limit.api),
        };

        match self.limiter.check_and_record_at(client, category, limit, now) {
            Ok(()) => Ok(()),
            Err(err) => {
                if let GatewayError::RateLimited { retry_after } = &err {
                    self.audit.record(
                        events::RATE_LIMIT_EXCEEDED,
                        client,
                        None,
                        None,
                        json!({
                            "category": category.as_str(),
                            "retry_after_secs": retry_after.as_secs(),
                        }),
                    );
                    metrics::record_rate_limited(category.as_str());
                }
                Err(err)
            }
        }
    }

    /// Clear a client's window for one category.
    pub fn reset_rate_limit(&self, client: &str, category: RateCategory) {
        self.limiter.reset(client, category);
    }

    // ---- authorization ----------------------------------------------------

    /// Whether the session's role holds `permission`. False without a
    /// session; unconditional for admins.
    pub fn has_permission(&self, session: Option<Uuid>, permission: Permission) -> bool {
        self.current_role(session)
            .map(|role| authz::role_has_permission(role, permission))
            .unwrap_or(false)
    }

    /// `has_permission` that logs denials.
    ///
    /// The failure response upstream is identical for "no session" and
    /// "wrong role", so probing clients learn nothing about role existence.
    pub fn require_permission(
        &self,
        session: Option<Uuid>,
        permission: Permission,
        client: &str,
    ) -> GatewayResult<()> {
        let info = session.and_then(|id| self.sessions.with(&id, |s| (s.principal_id, s.role)));
        match info {
            Some((_, role)) if authz::role_has_permission(role, permission) => Ok(()),
            Some((principal_id, role)) => {
                self.audit.record(
                    events::PERMISSION_DENIED,
                    client,
                    Some(principal_id),
                    Some(role),
                    json!({"permission": permission.as_str()}),
                );
                Err(GatewayError::PermissionDenied)
            }
            None => {
                self.audit.record(
                    events::PERMISSION_DENIED,
                    client,
                    None,
                    None,
                    json!({"permission": permission.as_str()}),
                );
                Err(GatewayError::PermissionDenied)
            }
        }
    }

    /// Whether the session may create one more resource of `kind`:
    /// permission check plus the role's resource cap against the live count.
    pub fn can_register(&self, session: Option<Uuid>, kind: ResourceKind) -> bool {
        let Some((principal_id, role)) =
            session.and_then(|id| self.sessions.with(&id, |s| (s.principal_id, s.role)))
        else {
            return false;
        };
        if !authz::role_has_permission(role, kind.permission()) {
            return false;
        }
        authz::within_resource_cap(role, self.counters.live_count(principal_id, kind))
    }

    // ---- uploads ----------------------------------------------------------

    /// Pure validation against the configured size limit. No side effects.
    pub fn validate_upload(
        &self,
        descriptor: &UploadDescriptor,
        category: UploadCategory,
    ) -> Result<(), Vec<UploadRejection>> {
        upload::validate(
            descriptor,
            category,
            self.config.load().upload.max_size_bytes,
        )
    }

    /// Re-validate and persist, logging the outcome either way.
    pub fn store_upload(
        &self,
        session: Option<Uuid>,
        descriptor: &UploadDescriptor,
        category: UploadCategory,
        client: &str,
    ) -> GatewayResult<StoredUpload> {
        let cfg = self.config.load();
        let dir = PathBuf::from(&cfg.upload.dir);
        let (principal_id, role) = session
            .and_then(|id| self.sessions.with(&id, |s| (s.principal_id, s.role)))
            .map(|(p, r)| (Some(p), Some(r)))
            .unwrap_or((None, None));

        match upload::store(descriptor, category, cfg.upload.max_size_bytes, &dir) {
            Ok(stored) => {
                self.audit.record(
                    events::FILE_UPLOAD_SUCCESS,
                    client,
                    principal_id,
                    role,
                    json!({
                        "original_name": stored.original_name,
                        "stored_name": stored.stored_name,
                        "size": stored.size,
                        "mime": stored.mime,
                    }),
                );
                metrics::record_upload("stored");
                Ok(stored)
            }
            Err(reasons) => {
                self.audit.record(
                    events::FILE_UPLOAD_REJECTED,
                    client,
                    principal_id,
                    role,
                    json!({
                        "original_name": descriptor.original_name,
                        "reasons": reasons.iter().map(|r| r.to_string()).collect::<Vec<_>>(),
                    }),
                );
                metrics::record_upload("rejected");
                Err(GatewayError::UploadRejected { reasons })
            }
        }
    }

    // ---- audit ------------------------------------------------------------

    /// Append an event to the security trail on behalf of a collaborator.
    pub fn log_security_event(
        &self,
        event: &str,
        client: &str,
        principal_id: Option<u64>,
        role: Option<Role>,
        data: serde_json::Value,
    ) {
        self.audit.record(event, client, principal_id, role, data);
    }
}
