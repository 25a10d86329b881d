//! Error types for Reel

use std::io;
use thiserror::Error;

/// Result type for Reel operations
pub type Result<T> = std::result::Result<T, ReelError>;

/// Errors that can occur in Reel
#[derive(Debug, Error)]
pub enum ReelError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Writing a cassette failed
    #[error("Failed to write cassette {path}: {source}")]
    FileSystem {
        /// Cassette path
        path: String,
        /// Underlying error
        #[source]
        source: io::Error,
    },

    /// Cassette exists but is not a valid document
    #[error("Invalid cassette {path}: {source}")]
    Parse {
        /// Cassette path
        path: String,
        /// Underlying error
        #[source]
        source: serde_json::Error,
    },

    /// Request matched no cassette entry and no passthrough rule
    #[error("Network blocked: no cassette entry matches {method} {url} (pending: {})", pending.join(", "))]
    NetworkBlocked {
        /// Request method
        method: String,
        /// Request URL
        url: String,
        /// Entries that have not served any request yet
        pending: Vec<String>,
    },

    /// Some loaded entries were never replayed
    #[error("The following cassette entries didn't run: {}", unmatched.join(", "))]
    Completion {
        /// Unmatched entries as `scope method path`
        unmatched: Vec<String>,
    },

    /// Another session already owns the interception hook
    #[error("Interception hook already installed by another session")]
    HookBusy,

    /// `start` called on a recorder that is already running
    #[error("Recorder session already started for {0}")]
    SessionActive(String),

    /// Invalid host or body pattern
    #[error("Invalid pattern '{pattern}': {reason}")]
    InvalidPattern {
        /// Pattern source text
        pattern: String,
        /// Why it was rejected
        reason: String,
    },

    /// Request could not be built
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Real network call failed
    #[error("Transport error: {0}")]
    Transport(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),
}
