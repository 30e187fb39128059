//! Client error types.

use std::fmt;

use pathviz_protocol::ProtocolError;

/// Result type for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors that can occur in the client.
#[derive(Debug)]
pub enum ClientError {
    /// Configuration error.
    Config(String),
    /// No knowledge-base address configured.
    NoAddress,
    /// Transport used before connect (or after disconnect).
    NotConnected,
    /// IO error.
    Io(std::io::Error),
    /// Framing or payload decoding error.
    Protocol(ProtocolError),
    /// The request manager has stopped; no more commands can be enqueued.
    ManagerStopped,
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "configuration error: {}", msg),
            Self::NoAddress => write!(f, "no knowledge-base address configured"),
            Self::NotConnected => write!(f, "not connected"),
            Self::Io(err) => write!(f, "IO error: {}", err),
            Self::Protocol(err) => write!(f, "protocol error: {}", err),
            Self::ManagerStopped => write!(f, "request manager stopped"),
        }
    }
}

impl std::error::Error for ClientError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::Protocol(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for ClientError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<ProtocolError> for ClientError {
    fn from(err: ProtocolError) -> Self {
        Self::Protocol(err)
    }
}
