//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → client_ip.rs (resolve rate-limit/audit key)
//!     → rate_limit.rs (check per-client, per-category windows)
//!     → csrf.rs (verify anti-forgery token on mutating requests)
//!     → authz.rs (role-based permission checks in handlers)
//! ```
//!
//! # Design Decisions
//! - Fail closed: reject on any security check failure
//! - No trust in client input; forwarded headers are opt-in
//! - Checks are ordered; nothing downstream runs once one denies

pub mod authz;
pub mod client_ip;
pub mod csrf;
pub mod rate_limit;
