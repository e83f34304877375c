//! Error types for clipsim-core operations.

use std::path::PathBuf;

// ═══════════════════════════════════════════════════════════════════════════════
// History Errors
// ═══════════════════════════════════════════════════════════════════════════════

/// Errors surfaced by history operations.
///
/// Policy rejects are not errors: `History::append` reports them through
/// `Appended::Rejected`.
#[derive(Debug, thiserror::Error)]
pub enum HistoryError {
    #[error("clipboard history is empty")]
    Empty,

    #[error("invalid index {0}")]
    InvalidIndex(i32),

    #[error("failed to publish entry to the clipboard: {0}")]
    Publish(#[from] PublishError),

    #[error(transparent)]
    Persist(#[from] PersistError),

    #[error("image store unavailable: {0}")]
    ImageStore(String),
}

// ═══════════════════════════════════════════════════════════════════════════════
// Persistence Errors
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, thiserror::Error)]
pub enum PersistError {
    #[error("history persistence unavailable: {0}")]
    Unavailable(&'static str),

    #[error("history file malformed: {path}: {details}")]
    Malformed { path: PathBuf, details: String },

    #[error("I/O error: {context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

// ═══════════════════════════════════════════════════════════════════════════════
// Selection Writer Errors
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("no writer command configured")]
    NoCommand,

    #[error("failed to run {command}: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{command} exited with {status}")]
    Exit { command: String, status: String },
}

// ═══════════════════════════════════════════════════════════════════════════════
// Configuration Errors
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("config file malformed: {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Convenience type alias for Results using HistoryError.
pub type Result<T> = std::result::Result<T, HistoryError>;
