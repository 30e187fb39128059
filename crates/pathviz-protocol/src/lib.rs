//! Wire framing and command/response types for the knowledge-base protocol.
//!
//! The knowledge-base daemon speaks a small request/response protocol over
//! UDP. Every datagram, in both directions, is one framed message:
//! - 4 bytes: payload length (u32, big-endian)
//! - N bytes: UTF-8 JSON payload
//!
//! # Requests
//!
//! A request is a [`Command`] wrapped in a versioned [`CommandEnvelope`]:
//!
//! ```text
//! {"version": "0.1", "command": "LOOKUP", "req_type": "GET", "res_name": "/x"}
//! ```
//!
//! # Responses
//!
//! Responses carry no type tag on the wire; the daemon answers requests
//! strictly in order, so a reply is decoded against the command that is
//! waiting for it. [`decode_response`] takes that originating
//! [`CommandKind`] and produces a tagged [`ResponsePayload`].
//!
//! # Example
//!
//! ```rust
//! use pathviz_protocol::{Command, CommandEnvelope, encode_command, decode_frame};
//!
//! let envelope = CommandEnvelope::new(Command::List);
//! let datagram = encode_command(&envelope).unwrap();
//! let payload = decode_frame(&datagram).unwrap();
//! assert_eq!(payload.len(), datagram.len() - 4);
//! ```

mod command;
mod error;
mod framing;
mod response;
mod types;

pub use command::{Command, CommandEnvelope, CommandKind};
pub use error::{ProtocolError, ProtocolResult};
pub use framing::{decode_frame, encode_command, encode_frame};
pub use response::{
    EndpointsReply, Hop, LinkType, LocationMap, PathStats, ResourceEntry, ResponsePayload,
    StatusReply, TopologyLink, decode_response,
};
pub use types::{IsdAs, IsdAsParseError};

/// Protocol version carried in every request.
pub const PROTOCOL_VERSION: &str = "0.1";

/// Maximum framed message size (64 KiB, one UDP datagram).
pub const MAX_MESSAGE_SIZE: u32 = 64 * 1024;

/// Default UDP port of the knowledge-base daemon.
pub const DEFAULT_PORT: u16 = 7777;
