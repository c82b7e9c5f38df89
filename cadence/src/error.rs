use std::path::PathBuf;

use derive_more::From;
use thiserror::Error;

/// Failures at the document/real-time store boundary
#[derive(Debug, From, Error)]
pub enum StoreError {
    #[error("Store connection is closed")]
    Disconnected,

    #[error("Write to '{path}' was rejected: {reason}")]
    #[from(skip)]
    Rejected { path: String, reason: String },

    #[error("No signed-in user")]
    #[from(skip)]
    Unauthenticated,

    #[error("Failed to (de)serialize document: {0}")]
    Serde(serde_json::Error),
}

/// Failures of the local durable cache
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Failed to create cache directory '{0}': {1}")]
    CreateDirectory(PathBuf, std::io::Error),

    #[error("Failed to read cache entry: {0}")]
    ReadFile(std::io::Error),

    #[error("Failed to write cache entry: {0}")]
    WriteFile(std::io::Error),

    #[error("Failed to parse cache entry: {0}")]
    Parse(serde_json::Error),
}

/// Misuse of the lobby protocol, or a transport failure the caller asked to see
#[derive(Debug, From, Error)]
pub enum LobbyError {
    #[error("Not in a lobby")]
    NotInLobby,

    #[error("Only the host may change the lobby")]
    #[from(skip)]
    NotHost,

    #[error("Lobby '{0}' does not exist")]
    #[from(skip)]
    NotFound(String),

    #[error("Lobby transport failed: {0}")]
    Store(StoreError),
}
