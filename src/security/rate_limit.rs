//! Sliding-window rate limiting keyed by client identity and category.
//!
//! # Responsibilities
//! - Record attempt timestamps per (client, category) key
//! - Enforce the category cap within its decay window
//! - Apply lockout once the cap is hit; lazily reset stale windows
//!
//! # Design Decisions
//! - Lazy expiry only: lockouts end by wall-clock comparison, no timers
//! - Per-key mutation happens under the map's entry guard, so concurrent
//!   submissions from the same client cannot lose attempts
//! - The clock is a parameter of the core routine; wrappers pass now()

use std::time::{Duration, SystemTime};

use dashmap::DashMap;

use crate::config::CategoryLimitConfig;
use crate::error::{GatewayError, GatewayResult};

/// Action categories with independent windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RateCategory {
    LoginAttempts,
    ApiRequests,
}

impl RateCategory {
    /// Stable name used in audit records and metrics labels.
    pub fn as_str(self) -> &'static str {
        match self {
            RateCategory::LoginAttempts => "login_attempts",
            RateCategory::ApiRequests => "api_requests",
        }
    }
}

/// Resolved limits for one category.
#[derive(Debug, Clone, Copy)]
pub struct CategoryLimit {
    pub max_attempts: usize,
    pub window: Duration,
    pub lockout: Duration,
}

impl From<&CategoryLimitConfig> for CategoryLimit {
    fn from(config: &CategoryLimitConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            window: Duration::from_secs(config.window_secs),
            lockout: Duration::from_secs(config.lockout_secs),
        }
    }
}

/// Keyed sliding-window attempt counters.
pub struct RateLimiter {
    windows: DashMap<(String, RateCategory), Vec<SystemTime>>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self {
            windows: DashMap::new(),
        }
    }

    /// Check the window for (client, category) and record this attempt.
    pub fn check_and_record(
        &self,
        client: &str,
        category: RateCategory,
        limit: CategoryLimit,
    ) -> GatewayResult<()> {
        self.check_and_record_at(client, category, limit, SystemTime::now())
    }

    /// Core routine with an explicit clock.
    ///
    /// At the cap, the attempt is rejected while the oldest recorded attempt
    /// is still inside the lockout duration; once it ages out the whole
    /// window resets. Below the cap, attempts older than the decay window
    /// stop counting.
    pub fn check_and_record_at(
        &self,
        client: &str,
        category: RateCategory,
        limit: CategoryLimit,
        now: SystemTime,
    ) -> GatewayResult<()> {
        let mut window = self
            .windows
            .entry((client.to_string(), category))
            .or_default();

        // The lockout is judged on the true oldest attempt, before decay
        // trims it out of the window; spaced attempts must not slip out one
        // by one and dodge the reset. Entries are pushed in order, so the
        // front is the oldest.
        if window.len() >= limit.max_attempts {
            if let Some(oldest) = window.first().copied() {
                let elapsed = now.duration_since(oldest).unwrap_or_default();
                if elapsed < limit.lockout {
                    return Err(GatewayError::RateLimited {
                        retry_after: limit.lockout - elapsed,
                    });
                }
            }
            window.clear();
        }

        window.retain(|t| match now.duration_since(*t) {
            Ok(age) => age < limit.window,
            // Future timestamp after a clock step; keep it.
            Err(_) => true,
        });

        window.push(now);
        Ok(())
    }

    /// Clear the window for (client, category).
    pub fn reset(&self, client: &str, category: RateCategory) {
        self.windows.remove(&(client.to_string(), category));
    }

    /// Attempts currently recorded for (client, category).
    pub fn attempts(&self, client: &str, category: RateCategory) -> usize {
        self.windows
            .get(&(client.to_string(), category))
            .map(|w| w.len())
            .unwrap_or(0)
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LOGIN: CategoryLimit = CategoryLimit {
        max_attempts: 5,
        window: Duration::from_secs(1800),
        lockout: Duration::from_secs(1800),
    };

    const API: CategoryLimit = CategoryLimit {
        max_attempts: 3,
        window: Duration::from_secs(60),
        lockout: Duration::from_secs(60),
    };

    #[test]
    fn test_sixth_attempt_rejected() {
        let limiter = RateLimiter::new();
        let start = SystemTime::now();

        for i in 0..5 {
            let at = start + Duration::from_secs(i);
            limiter
                .check_and_record_at("1.2.3.4", RateCategory::LoginAttempts, LOGIN, at)
                .unwrap();
        }

        let err = limiter
            .check_and_record_at(
                "1.2.3.4",
                RateCategory::LoginAttempts,
                LOGIN,
                start + Duration::from_secs(5),
            )
            .unwrap_err();

        match err {
            GatewayError::RateLimited { retry_after } => {
                assert!(retry_after > Duration::ZERO);
                assert!(retry_after <= LOGIN.lockout);
            }
            other => panic!("expected RateLimited, got {:?}", other),
        }
    }

    #[test]
    fn test_window_resets_after_lockout() {
        let limiter = RateLimiter::new();
        let start = SystemTime::now();

        for i in 0..5 {
            limiter
                .check_and_record_at(
                    "1.2.3.4",
                    RateCategory::LoginAttempts,
                    LOGIN,
                    start + Duration::from_secs(i),
                )
                .unwrap();
        }

        let after_lockout = start + LOGIN.lockout + Duration::from_secs(1);
        limiter
            .check_and_record_at("1.2.3.4", RateCategory::LoginAttempts, LOGIN, after_lockout)
            .unwrap();

        assert_eq!(
            limiter.attempts("1.2.3.4", RateCategory::LoginAttempts),
            1,
            "stale window must reset to just the new attempt"
        );
    }

    #[test]
    fn test_categories_are_independent() {
        let limiter = RateLimiter::new();
        let now = SystemTime::now();

        for i in 0..3 {
            limiter
                .check_and_record_at(
                    "1.2.3.4",
                    RateCategory::ApiRequests,
                    API,
                    now + Duration::from_secs(i),
                )
                .unwrap();
        }
        assert!(limiter
            .check_and_record_at(
                "1.2.3.4",
                RateCategory::ApiRequests,
                API,
                now + Duration::from_secs(3)
            )
            .is_err());

        // Login category for the same client is untouched.
        assert!(limiter
            .check_and_record_at("1.2.3.4", RateCategory::LoginAttempts, LOGIN, now)
            .is_ok());
    }

    #[test]
    fn test_clients_are_independent() {
        let limiter = RateLimiter::new();
        let now = SystemTime::now();

        for i in 0..3 {
            limiter
                .check_and_record_at(
                    "1.2.3.4",
                    RateCategory::ApiRequests,
                    API,
                    now + Duration::from_secs(i),
                )
                .unwrap();
        }
        assert!(limiter
            .check_and_record_at("5.6.7.8", RateCategory::ApiRequests, API, now)
            .is_ok());
    }

    #[test]
    fn test_reset_clears_single_category() {
        let limiter = RateLimiter::new();
        let now = SystemTime::now();

        limiter
            .check_and_record_at("1.2.3.4", RateCategory::LoginAttempts, LOGIN, now)
            .unwrap();
        limiter
            .check_and_record_at("1.2.3.4", RateCategory::ApiRequests, API, now)
            .unwrap();

        limiter.reset("1.2.3.4", RateCategory::LoginAttempts);

        assert_eq!(limiter.attempts("1.2.3.4", RateCategory::LoginAttempts), 0);
        assert_eq!(limiter.attempts("1.2.3.4", RateCategory::ApiRequests), 1);
    }

    #[test]
    fn test_decayed_attempts_stop_counting() {
        let limiter = RateLimiter::new();
        let start = SystemTime::now();

        // Two attempts, below the cap of three.
        for i in 0..2 {
            limiter
                .check_and_record_at(
                    "1.2.3.4",
                    RateCategory::ApiRequests,
                    API,
                    start + Duration::from_secs(i),
                )
                .unwrap();
        }

        // Past the decay window the old attempts no longer count.
        let later = start + API.window + Duration::from_secs(5);
        limiter
            .check_and_record_at("1.2.3.4", RateCategory::ApiRequests, API, later)
            .unwrap();
        assert_eq!(limiter.attempts("1.2.3.4", RateCategory::ApiRequests), 1);
    }

    #[test]
    fn test_spaced_attempts_still_reset_as_one_window() {
        let limiter = RateLimiter::new();
        let start = SystemTime::now();

        // Attempts spread over several seconds, then a long silence: the
        // whole window resets at once, it does not drain entry by entry.
        for i in 0..5 {
            limiter
                .check_and_record_at(
                    "1.2.3.4",
                    RateCategory::LoginAttempts,
                    LOGIN,
                    start + Duration::from_secs(i * 60),
                )
                .unwrap();
        }

        let after_lockout = start + Duration::from_secs(4 * 60) + LOGIN.lockout + Duration::from_secs(1);
        limiter
            .check_and_record_at("1.2.3.4", RateCategory::LoginAttempts, LOGIN, after_lockout)
            .unwrap();
        assert_eq!(limiter.attempts("1.2.3.4", RateCategory::LoginAttempts), 1);
    }
}
