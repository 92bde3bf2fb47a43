//! Relay message framing
//!
//! Requests and responses are either UTF-8 text (`text/plain`) or binary
//! (`application/binary`). Binary requests carry a 4-byte big-endian
//! command id ahead of the payload.

use bytes::{BufMut, Bytes, BytesMut};

use crate::types::{GateError, Result};

pub const TEXT_PLAIN: &str = "text/plain";
pub const APPLICATION_BINARY: &str = "application/binary";

/// Outgoing relay message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayMessage {
    Text(String),
    Binary(Bytes),
}

impl From<&str> for RelayMessage {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for RelayMessage {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<Bytes> for RelayMessage {
    fn from(value: Bytes) -> Self {
        Self::Binary(value)
    }
}

impl From<Vec<u8>> for RelayMessage {
    fn from(value: Vec<u8>) -> Self {
        Self::Binary(Bytes::from(value))
    }
}

impl RelayMessage {
    /// Encode into a request body and its content type.
    ///
    /// Binary payloads need a `byte_command`; without one the call shape is
    /// invalid.
    pub fn encode(self, byte_command: Option<u32>) -> Result<(Bytes, &'static str)> {
        match (self, byte_command) {
            (Self::Text(text), _) => Ok((Bytes::from(text), TEXT_PLAIN)),
            (Self::Binary(payload), Some(command)) => {
                let mut body = BytesMut::with_capacity(4 + payload.len());
                body.put_u32(command);
                body.put_slice(&payload);
                Ok((body.freeze(), APPLICATION_BINARY))
            }
            (Self::Binary(_), None) => Err(GateError::Protocol(
                "binary message sent without a byte command".into(),
            )),
        }
    }
}

/// Decoded relay response
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayResponse {
    Text(String),
    Binary(Bytes),
}

impl RelayResponse {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::Binary(_) => None,
        }
    }

    pub fn into_bytes(self) -> Bytes {
        match self {
            Self::Text(text) => Bytes::from(text),
            Self::Binary(bytes) => bytes,
        }
    }
}

/// Media type of a Content-Type header value, without parameters
pub fn media_type(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_encoding() {
        let (body, ctype) = RelayMessage::from("screen capture").encode(None).unwrap();
        assert_eq!(&body[..], b"screen capture");
        assert_eq!(ctype, TEXT_PLAIN);
    }

    #[test]
    fn test_binary_gets_command_prefix() {
        let (body, ctype) = RelayMessage::from(vec![0xAA_u8, 0xBB])
            .encode(Some(0x0102_0304))
            .unwrap();
        assert_eq!(&body[..], &[0x01, 0x02, 0x03, 0x04, 0xAA, 0xBB]);
        assert_eq!(ctype, APPLICATION_BINARY);
    }

    #[test]
    fn test_binary_without_command_is_protocol_error() {
        let result = RelayMessage::from(vec![1_u8, 2, 3]).encode(None);
        assert!(matches!(result, Err(GateError::Protocol(_))));
    }

    #[test]
    fn test_media_type_ignores_parameters() {
        assert_eq!(media_type("text/plain; charset=utf-8"), "text/plain");
        assert_eq!(media_type("Application/Binary"), "application/binary");
    }
}
