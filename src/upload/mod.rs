//! Upload validation and storage subsystem.
//!
//! # Data Flow
//! ```text
//! received file
//!     → validator.rs (transfer, size, extension, declared MIME)
//!     → sniff.rs (content magic bytes vs. the same allow-list)
//!     → store.rs (randomized name, restrictive permissions)
//! ```
//!
//! # Design Decisions
//! - All validation stages run and accumulate; one response tells the
//!   caller everything wrong with the file
//! - Stored names carry no caller-controlled characters beyond a
//!   sanitized extension

pub mod sniff;
pub mod store;
pub mod validator;

pub use store::{store, StoredUpload};
pub use validator::{
    validate, TransferStatus, UploadCategory, UploadDescriptor, UploadRejection,
};
