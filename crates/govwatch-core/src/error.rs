//! GovWatch error type.

use thiserror::Error;

/// All the ways GovWatch operations can fail.
#[derive(Debug, Error)]
pub enum GovWatchError {
    /// Invalid or missing configuration.
    #[error("Config error: {0}")]
    Config(String),

    /// Persistent store failure (connection, query, constraint).
    #[error("Store error: {0}")]
    Store(String),

    /// Chain RPC failure (transport, malformed response, decode).
    #[error("RPC error: {0}")]
    Rpc(String),

    /// Space directory lookup failure (GraphQL or on-chain read).
    #[error("Directory error: {0}")]
    Directory(String),

    /// Outbound channel failure.
    #[error("Channel error: {0}")]
    Channel(String),
}

pub type Result<T> = std::result::Result<T, GovWatchError>;
