//! Credential verification and the principal directory seam.
//!
//! # Design Decisions
//! - Secrets are verified against argon2 PHC hashes; the comparison is
//!   constant-time inside the verifier
//! - The directory and counter store are traits so the gateway never sees
//!   the collaborator's persistence layer

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use dashmap::DashMap;

use crate::config::PrincipalSeed;
use crate::error::{GatewayError, GatewayResult};
use crate::security::authz::{ResourceKind, Role};

/// A stored account record the directory returns.
#[derive(Debug, Clone)]
pub struct PrincipalRecord {
    pub id: u64,
    pub username: String,
    pub email: String,
    pub role: Role,
    /// Argon2 PHC-format hash of the secret.
    pub secret_hash: String,
    pub display_name: String,
}

impl From<&PrincipalSeed> for PrincipalRecord {
    fn from(seed: &PrincipalSeed) -> Self {
        Self {
            id: seed.id,
            username: seed.username.clone(),
            email: seed.email.clone(),
            role: seed.role,
            secret_hash: seed.secret_hash.clone(),
            display_name: seed.display_name.clone(),
        }
    }
}

/// Lookup of principals by identifier, optionally filtered by role.
///
/// An identifier matches the username exactly or the email
/// case-insensitively.
pub trait PrincipalDirectory: Send + Sync {
    fn find_by_identifier_and_role(&self, identifier: &str, role: Role) -> Option<PrincipalRecord>;
    fn find_by_identifier(&self, identifier: &str) -> Option<PrincipalRecord>;
}

/// Live resource counts per principal, supplied by the collaborator.
pub trait ResourceCounter: Send + Sync {
    fn live_count(&self, principal_id: u64, kind: ResourceKind) -> u64;
}

/// Verify a secret against a stored PHC hash. Malformed hashes fail closed.
pub fn verify_secret(secret: &str, stored_hash: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(stored_hash) else {
        return false;
    };
    Argon2::default()
        .verify_password(secret.as_bytes(), &parsed)
        .is_ok()
}

/// Hash a secret for storage. Used by seeding tools and tests.
pub fn hash_secret(secret: &str) -> GatewayResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(secret.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| GatewayError::Internal(e.to_string()))
}

/// In-memory directory backing the binary and tests.
#[derive(Default)]
pub struct InMemoryDirectory {
    records: DashMap<u64, PrincipalRecord>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_seeds(seeds: &[PrincipalSeed]) -> Self {
        let directory = Self::new();
        for seed in seeds {
            directory.insert(seed.into());
        }
        directory
    }

    pub fn insert(&self, record: PrincipalRecord) {
        self.records.insert(record.id, record);
    }

    fn matches(record: &PrincipalRecord, identifier: &str) -> bool {
        record.username == identifier || record.email.eq_ignore_ascii_case(identifier)
    }
}

impl PrincipalDirectory for InMemoryDirectory {
    fn find_by_identifier_and_role(&self, identifier: &str, role: Role) -> Option<PrincipalRecord> {
        self.records
            .iter()
            .find(|r| r.role == role && Self::matches(r.value(), identifier))
            .map(|r| r.value().clone())
    }

    fn find_by_identifier(&self, identifier: &str) -> Option<PrincipalRecord> {
        self.records
            .iter()
            .find(|r| Self::matches(r.value(), identifier))
            .map(|r| r.value().clone())
    }
}

/// In-memory counter store backing the binary and tests.
#[derive(Default)]
pub struct InMemoryCounter {
    counts: DashMap<(u64, ResourceKind), u64>,
}

impl InMemoryCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment(&self, principal_id: u64, kind: ResourceKind) {
        *self.counts.entry((principal_id, kind)).or_insert(0) += 1;
    }

    pub fn set(&self, principal_id: u64, kind: ResourceKind, count: u64) {
        self.counts.insert((principal_id, kind), count);
    }
}

impl ResourceCounter for InMemoryCounter {
    fn live_count(&self, principal_id: u64, kind: ResourceKind) -> u64 {
        self.counts
            .get(&(principal_id, kind))
            .map(|c| *c)
            .unwrap_or(0)
    }
}
