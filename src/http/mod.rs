//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, routes, layer stack)
//!     → middleware.rs (client ip → rate limit → session → CSRF)
//!     → handlers (gateway API calls)
//!     → response.rs (redirect / JSON / plain-text failure mapping)
//! ```

pub mod middleware;
pub mod response;
pub mod server;

pub use middleware::CurrentSession;
pub use server::{AppState, GatewayServer};
