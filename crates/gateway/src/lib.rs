//! Client for the hosted data gateway.
//!
//! The gateway provides row storage, authentication, server-side
//! procedures, and a realtime change feed. This crate defines the
//! [`Gateway`] contract the application layer is written against,
//! the production [`RestGateway`] implementation (HTTP + WebSocket),
//! and an in-memory [`MemoryGateway`] double for tests.

pub mod auth;
pub mod change;
pub mod client;
pub mod config;
pub mod error;
pub mod memory;
pub mod realtime;
pub mod rest;

pub use auth::{AuthEvent, AuthUser, Session};
pub use change::{ChangeEvent, ChangeFilter, ChangeKind, ChangeTable, Subscription};
pub use client::Gateway;
pub use config::{ConfigError, GatewayConfig};
pub use error::GatewayError;
pub use memory::MemoryGateway;
pub use rest::RestGateway;
