//! Daemon error types.

use clipsim_protocol::ProtocolError;
use x11rb::errors::{ConnectError, ConnectionError, ReplyError, ReplyOrIdError};

/// Errors that stop the daemon.
#[derive(Debug, thiserror::Error)]
pub enum DaemonError {
    #[error("failed to prepare fifo {context}: {source}")]
    Fifo {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot open X display: {0}")]
    XConnect(#[from] ConnectError),

    #[error("X connection failed: {0}")]
    XConnection(#[from] ConnectionError),

    #[error("X request failed: {0}")]
    XReply(#[from] ReplyError),

    #[error("X request failed: {0}")]
    XReplyOrId(#[from] ReplyOrIdError),

    #[error("X server lacks the {0} extension")]
    ExtensionMissing(&'static str),

    #[error("failed to install signal handler: {0}")]
    Signal(#[from] ctrlc::Error),

    #[error("failed to spawn {name} thread: {source}")]
    Thread {
        name: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("{0} thread panicked")]
    Panicked(&'static str),
}

/// Errors that abort a single command round-trip. The server logs them and
/// goes back to waiting for the next client.
#[derive(Debug, thiserror::Error)]
pub enum IpcError {
    #[error("{context}: {source}")]
    Io {
        context: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("client closed the command fifo without sending a command")]
    NoCommand,

    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

impl IpcError {
    pub(crate) fn io(context: &'static str) -> impl FnOnce(std::io::Error) -> Self {
        move |source| IpcError::Io { context, source }
    }
}
