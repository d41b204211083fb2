//! Error types for the node server.

use std::fmt;
use std::io;
use std::net::SocketAddr;

use munin_plugin::PluginError;
use thiserror::Error;

/// The part of a session during which a transport error occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionPhase {
    /// Writing the greeting banner.
    Banner,
    /// Reading command bytes from the peer.
    Receiving,
    /// Framing and dispatching command lines.
    Processing,
    /// Writing a command response.
    Sending,
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Banner => "banner",
            Self::Receiving => "receiving",
            Self::Processing => "processing",
            Self::Sending => "sending",
        };
        f.write_str(s)
    }
}

/// Errors that can occur in the node server.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Failed to bind to the specified address.
    #[error("failed to bind to {0}: {1}")]
    BindFailed(SocketAddr, io::Error),

    /// Invalid configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// Socket I/O failed during a session.
    #[error("transport error while {phase}: {source}")]
    Transport {
        /// What the session was doing.
        phase: SessionPhase,
        /// The underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// A plugin or plugin provider failed.
    #[error("plugin error: {0}")]
    Plugin(#[from] PluginError),

    /// The operation was cancelled.
    #[error("operation cancelled")]
    Cancelled,
}

impl ServerError {
    /// Wraps an I/O error raised during `phase`.
    #[must_use]
    pub const fn transport(phase: SessionPhase, source: io::Error) -> Self {
        Self::Transport { phase, source }
    }

    /// Returns true if this error is an ordinary way for a peer to go away.
    ///
    /// Covers connection reset, abort, broken pipe, premature EOF and a
    /// socket that is no longer connected.
    #[must_use]
    pub fn is_expected_disconnect(&self) -> bool {
        match self {
            Self::Transport { source, .. } => matches!(
                source.kind(),
                io::ErrorKind::ConnectionReset
                    | io::ErrorKind::ConnectionAborted
                    | io::ErrorKind::BrokenPipe
                    | io::ErrorKind::UnexpectedEof
                    | io::ErrorKind::NotConnected
            ),
            _ => false,
        }
    }

    /// Returns true if this error signals cancellation rather than failure.
    ///
    /// A plugin may report cancellation on its own; only the server's token
    /// decides whether the node is shutting down.
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled | Self::Plugin(PluginError::Cancelled))
    }
}

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;
