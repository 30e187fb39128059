//! Protocol error types.

use thiserror::Error;

use crate::command::CommandKind;

/// Result type for protocol operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// Errors that can occur during framing and payload decoding.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Datagram shorter than the 4-byte length prefix.
    #[error("frame too short: {0} bytes")]
    FrameTooShort(usize),

    /// Declared length disagrees with the actual payload length.
    ///
    /// This is a corrupt message, not a parse failure; the payload is never
    /// handed to the JSON decoder.
    #[error("length prefix mismatch: declared {declared}, payload has {actual} bytes")]
    LengthMismatch { declared: usize, actual: usize },

    /// Message exceeds the maximum datagram size.
    #[error("message too large: {size} bytes (max: {max})")]
    MessageTooLarge { size: u32, max: u32 },

    /// Zero-length payload.
    #[error("empty message")]
    EmptyMessage,

    /// Payload is not valid JSON, or a request failed to serialize.
    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Payload is valid JSON but does not match the shape expected for the
    /// originating command.
    #[error("response shape mismatch for {command}: {source}")]
    Shape {
        command: CommandKind,
        #[source]
        source: serde_json::Error,
    },
}

impl ProtocolError {
    /// True for errors where the payload parsed as JSON but had the wrong
    /// shape for its command.
    pub fn is_shape_mismatch(&self) -> bool {
        matches!(self, Self::Shape { .. })
    }
}
