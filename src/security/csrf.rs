//! Anti-forgery token management.
//!
//! # Responsibilities
//! - Issue cryptographically random tokens scoped to one session
//! - Verify tokens on state-changing requests, failing closed
//! - Prune expired entries lazily when new tokens are issued
//! - Match request paths against the exemption list
//!
//! # Design Decisions
//! - Token maps live inside the session record, so they die with it
//! - Verification marks `used` for the audit trail but does not enforce
//!   single-use; multi-tab flows re-submit live tokens legitimately
//! - An entry past expiry is invalid even though it is still present

use std::collections::HashMap;
use std::time::{Duration, SystemTime};

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use rand::RngCore;

/// State kept per issued token.
#[derive(Debug, Clone)]
pub struct TokenEntry {
    pub created: SystemTime,
    pub used: bool,
}

/// Issue a new token into `tokens`, pruning expired entries first.
pub fn issue_at(
    tokens: &mut HashMap<String, TokenEntry>,
    now: SystemTime,
    expiry: Duration,
    token_bytes: usize,
) -> String {
    tokens.retain(|_, entry| !expired(entry, now, expiry));

    let mut bytes = vec![0u8; token_bytes];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    let token = URL_SAFE_NO_PAD.encode(&bytes);

    tokens.insert(
        token.clone(),
        TokenEntry {
            created: now,
            used: false,
        },
    );
    token
}

/// Verify `token` against the session's map.
///
/// Fails closed on unknown tokens; deletes and fails entries aged past
/// expiry; otherwise marks the entry used and succeeds.
pub fn verify_at(
    tokens: &mut HashMap<String, TokenEntry>,
    token: &str,
    now: SystemTime,
    expiry: Duration,
) -> bool {
    let Some(entry) = tokens.get_mut(token) else {
        return false;
    };
    if expired(entry, now, expiry) {
        tokens.remove(token);
        return false;
    }
    entry.used = true;
    true
}

fn expired(entry: &TokenEntry, now: SystemTime, expiry: Duration) -> bool {
    match now.duration_since(entry.created) {
        Ok(age) => age > expiry,
        // Clock went backwards; treat as fresh.
        Err(_) => false,
    }
}

/// Whether `path` is exempt from token verification.
///
/// Patterns ending in `*` match by prefix; all others match the path
/// exactly or as a suffix.
pub fn is_exempt(path: &str, patterns: &[String]) -> bool {
    patterns.iter().any(|pattern| {
        if let Some(prefix) = pattern.strip_suffix('*') {
            path.starts_with(prefix)
        } else {
            path == pattern || path.ends_with(pattern.as_str())
        }
    })
}
