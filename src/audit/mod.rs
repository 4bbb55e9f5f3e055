//! Security audit subsystem.
//!
//! Every gateway branch that denies or violates appends a structured event
//! here. Records are newline-delimited JSON so the trail can be shipped or
//! grepped without a parser.

pub mod logger;

pub use logger::{events, AuditLog, SecurityEvent};
