//! Session subsystem.
//!
//! # Data Flow
//! ```text
//! login request
//!     → auth.rs (directory lookup, argon2 verify)
//!     → store.rs (fresh Session, caller receives the identifier)
//!
//! every authenticated request
//!     → store.rs touch_at (idle timeout or activity refresh)
//! ```

pub mod auth;
pub mod store;

pub use auth::{
    hash_secret, verify_secret, InMemoryCounter, InMemoryDirectory, PrincipalDirectory,
    PrincipalRecord, ResourceCounter,
};
pub use store::{Session, SessionStore, TouchOutcome};
