//! Length-prefixed message framing.
//!
//! One UDP datagram carries exactly one frame:
//!
//! ```text
//! +----------------+------------------+
//! | length (4 BE)  |  JSON payload    |
//! +----------------+------------------+
//! ```
//!
//! The length prefix counts payload *bytes* (not characters); a datagram
//! whose prefix disagrees with its actual payload length is corrupt and is
//! rejected before any JSON parsing.

use serde::Serialize;

use crate::MAX_MESSAGE_SIZE;
use crate::error::{ProtocolError, ProtocolResult};

/// Frames a payload with its length prefix.
pub fn encode_frame(payload: &[u8]) -> ProtocolResult<Vec<u8>> {
    let len = payload.len() as u32;

    if len == 0 {
        return Err(ProtocolError::EmptyMessage);
    }
    if len > MAX_MESSAGE_SIZE {
        return Err(ProtocolError::MessageTooLarge {
            size: len,
            max: MAX_MESSAGE_SIZE,
        });
    }

    let mut buffer = Vec::with_capacity(4 + payload.len());
    buffer.extend_from_slice(&len.to_be_bytes());
    buffer.extend_from_slice(payload);
    Ok(buffer)
}

/// Serializes a message to JSON and frames it, ready for transmission.
pub fn encode_command<T: Serialize>(message: &T) -> ProtocolResult<Vec<u8>> {
    let json = serde_json::to_vec(message)?;
    encode_frame(&json)
}

/// Validates a datagram's frame and returns its payload.
///
/// The whole datagram must be one frame: the declared length has to equal
/// the number of bytes that follow the prefix exactly.
pub fn decode_frame(datagram: &[u8]) -> ProtocolResult<&[u8]> {
    if datagram.len() < 4 {
        return Err(ProtocolError::FrameTooShort(datagram.len()));
    }

    let len_bytes: [u8; 4] = datagram[0..4].try_into().expect("4-byte slice");
    let declared = u32::from_be_bytes(len_bytes);

    if declared > MAX_MESSAGE_SIZE {
        return Err(ProtocolError::MessageTooLarge {
            size: declared,
            max: MAX_MESSAGE_SIZE,
        });
    }

    let actual = datagram.len() - 4;
    if declared as usize != actual {
        return Err(ProtocolError::LengthMismatch {
            declared: declared as usize,
            actual,
        });
    }
    if actual == 0 {
        return Err(ProtocolError::EmptyMessage);
    }

    Ok(&datagram[4..])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{Command, CommandEnvelope};

    #[test]
    fn encode_decode_roundtrip() {
        let envelope = CommandEnvelope::new(Command::List);
        let datagram = encode_command(&envelope).unwrap();

        // Verify the prefix counts payload bytes
        let declared = u32::from_be_bytes([datagram[0], datagram[1], datagram[2], datagram[3]]);
        assert_eq!(declared as usize, datagram.len() - 4);

        let payload = decode_frame(&datagram).unwrap();
        let decoded: CommandEnvelope = serde_json::from_slice(payload).unwrap();
        assert_eq!(decoded.command, Command::List);
    }

    #[test]
    fn prefix_counts_bytes_not_chars() {
        // Multi-byte UTF-8 in the payload must be counted in bytes.
        let envelope = CommandEnvelope::new(Command::Lookup {
            req_type: "GET".to_string(),
            res_name: "/päth".to_string(),
            conn_id: None,
        });
        let datagram = encode_command(&envelope).unwrap();

        let declared = u32::from_be_bytes([datagram[0], datagram[1], datagram[2], datagram[3]]);
        let json = serde_json::to_vec(&envelope).unwrap();
        assert_eq!(declared as usize, json.len());
        assert!(decode_frame(&datagram).is_ok());
    }

    #[test]
    fn frame_too_short() {
        let result = decode_frame(&[0, 0]);
        assert!(matches!(result, Err(ProtocolError::FrameTooShort(2))));
    }

    #[test]
    fn length_mismatch_is_rejected() {
        // Claim 100 bytes but carry 10
        let mut datagram = vec![0, 0, 0, 100];
        datagram.extend_from_slice(&[b'x'; 10]);

        let result = decode_frame(&datagram);
        assert!(matches!(
            result,
            Err(ProtocolError::LengthMismatch {
                declared: 100,
                actual: 10
            })
        ));
    }

    #[test]
    fn trailing_bytes_are_a_mismatch() {
        let mut datagram = encode_frame(b"{}").unwrap();
        datagram.push(b'!');

        let result = decode_frame(&datagram);
        assert!(matches!(result, Err(ProtocolError::LengthMismatch { .. })));
    }

    #[test]
    fn oversized_declared_length() {
        let datagram = (MAX_MESSAGE_SIZE + 1).to_be_bytes();
        let result = decode_frame(&datagram);
        assert!(matches!(result, Err(ProtocolError::MessageTooLarge { .. })));
    }

    #[test]
    fn empty_payload_rejected_both_ways() {
        assert!(matches!(encode_frame(b""), Err(ProtocolError::EmptyMessage)));

        let datagram = 0u32.to_be_bytes();
        assert!(matches!(
            decode_frame(&datagram),
            Err(ProtocolError::EmptyMessage)
        ));
    }
}
