//! # Shell Error Type
//!
//! Everything that can stop the shell before or while it runs.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  ClientConfig::load() ── ConfigError ───┐                               │
//! │  Database::new()      ── DbError ───────┼──► RunError ──► main() exit 1 │
//! │  gateway.mutate()     ── GatewayError ──┤                               │
//! │  stdin / stdout       ── io::Error ─────┘                               │
//! │                                                                         │
//! │  Screen actions never end up here: the client reports those as toasts.  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use kidbank_client::ConfigError;
use kidbank_core::gateway::GatewayError;
use kidbank_db::DbError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RunError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] DbError),

    /// The demo household could not be written.
    #[error("Gateway error: {0}")]
    Gateway(#[from] GatewayError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type RunResult<T> = Result<T, RunError>;
