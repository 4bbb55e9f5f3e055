//! Gatekeeper — request-security gateway.
//!
//! Every mutating request to the collaborating application passes through
//! this gateway before business logic runs.
//!
//! # Architecture Overview
//!
//! ```text
//!                    ┌───────────────────────────────────────────────┐
//!                    │                 GATEWAY                       │
//!  Client Request    │  ┌─────────┐   ┌───────────┐   ┌──────────┐  │
//!  ──────────────────┼─▶│  http   │──▶│ security  │──▶│ session  │  │
//!                    │  │ server  │   │ ip/rate/  │   │ store +  │  │
//!                    │  └─────────┘   │ csrf/authz│   │ auth     │  │
//!                    │                └─────┬─────┘   └────┬─────┘  │
//!                    │                      │              │        │
//!                    │                ┌─────▼─────┐  ┌─────▼─────┐  │
//!                    │                │  upload   │  │   audit   │  │
//!                    │                │ validator │  │  ndjson   │  │
//!                    │                └───────────┘  └───────────┘  │
//!                    │  ┌─────────────────────────────────────────┐ │
//!                    │  │ Cross-cutting: config / observability   │ │
//!                    │  └─────────────────────────────────────────┘ │
//!                    └───────────────────────────────────────────────┘
//! ```

// Core subsystems
pub mod config;
pub mod gateway;
pub mod http;
pub mod session;

// Security checks
pub mod security;
pub mod upload;

// Cross-cutting concerns
pub mod audit;
pub mod error;
pub mod observability;

pub use config::GatewayConfig;
pub use error::{GatewayError, GatewayResult};
pub use gateway::Gateway;
pub use http::GatewayServer;
pub use security::authz::{Permission, ResourceKind, Role};
pub use security::rate_limit::RateCategory;
