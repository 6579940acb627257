//! Gateway error taxonomy.
//!
//! Every variant carries the gateway's message verbatim; callers turn
//! these into user-visible text and never crash a view over them.
//! Nothing is retried automatically except the realtime reconnect
//! loop, which re-establishes the connection but never replays events.

use crate::config::ConfigError;

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// A read failed. Callers show the message and keep the prior
    /// snapshot intact.
    #[error("Fetch failed: {0}")]
    Fetch(String),

    /// A command failed. No local change is applied.
    #[error("Write failed: {0}")]
    Write(String),

    /// Sign-in or session failure. Shown inline on login, or forces a
    /// sign-out.
    #[error("Auth error: {0}")]
    Auth(String),

    /// Missing or unusable deployment configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Malformed realtime traffic. Logged and dropped, never raised
    /// into a view.
    #[error("Protocol error: {0}")]
    Protocol(String),
}
