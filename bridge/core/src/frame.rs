//! Control Protocol
//!
//! Wire format between the bridge and its host controller: one flat JSON
//! object per line, every field optional and discriminated by presence.
//!
//! # Frame Kinds
//!
//! ```text
//! announcement  {"socket": "/tmp/ipc_socket_…", "version": 1}
//! connect       {"id": "…", "pid": 4242, "action": "connect"}
//! data          {"id": "…", "msg": "aGk="}
//! disconnect    {"id": "…", "pid": 4242, "action": "disconnect"}
//! error         {"error": "Client not found", "details": "Client ID … not found"}
//! command (in)  {"id": "…", "msg": "Ynll", "disconnect": true}
//! ```
//!
//! Payload bytes travel as standard padded base64 so arbitrary binary data
//! survives the line framing. Chunk boundaries carry no meaning.
//!
//! Parsing is lenient about the fields a command does not use: an
//! unrecognised `action` or out-of-range `pid` reads as absent, a `null`
//! `disconnect` reads as false, and payloads with non-zero trailing bits
//! still decode.

use std::fmt;

use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig, STANDARD as BASE64};
use base64::Engine;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

/// Version reported in the announcement frame
pub const PROTOCOL_VERSION: u32 = 1;

/// Padded standard alphabet that ignores non-zero trailing bits
const LENIENT_BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_allow_trailing_bits(true),
);

/// Lifecycle action carried by connect/disconnect frames
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    /// A peer connection was established
    Connect,
    /// A peer connection ended
    Disconnect,
}

/// Errors from the line and payload codec
#[derive(Debug, Error)]
pub enum CodecError {
    /// The line is not a JSON frame
    #[error("invalid JSON input: {0}")]
    InvalidJson(#[source] serde_json::Error),

    /// The `msg` field is not valid base64
    #[error("invalid base64 payload: {0}")]
    InvalidPayload(#[from] base64::DecodeError),

    /// A frame could not be serialized
    #[error("failed to serialize frame: {0}")]
    Serialize(#[source] serde_json::Error),
}

impl CodecError {
    /// The underlying cause, without the codec's own prefix
    ///
    /// Used as the `details` field of error frames.
    #[must_use]
    pub fn details(&self) -> String {
        match self {
            Self::InvalidJson(e) | Self::Serialize(e) => e.to_string(),
            Self::InvalidPayload(e) => e.to_string(),
        }
    }
}

/// One line of the control protocol
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Frame {
    /// Client identifier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Base64-encoded payload bytes
    #[serde(
        rename = "msg",
        alias = "payload",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub payload: Option<String>,

    /// Close the connection after writing the payload
    #[serde(
        default,
        deserialize_with = "null_as_false",
        skip_serializing_if = "std::ops::Not::not"
    )]
    pub disconnect: bool,

    /// Lifecycle action
    #[serde(
        default,
        deserialize_with = "ignore_invalid",
        skip_serializing_if = "Option::is_none"
    )]
    pub action: Option<Action>,

    /// Peer process id (0 = unknown)
    #[serde(
        default,
        deserialize_with = "ignore_invalid",
        skip_serializing_if = "Option::is_none"
    )]
    pub pid: Option<u32>,

    /// Error summary
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Error details
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,

    /// Endpoint path, announcement only
    #[serde(
        rename = "socket",
        alias = "endpoint",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub endpoint: Option<String>,

    /// Protocol version, announcement only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<u32>,
}

impl Frame {
    /// Announcement of the endpoint the bridge serves or dials
    #[must_use]
    pub fn announce(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: Some(endpoint.into()),
            version: Some(PROTOCOL_VERSION),
            ..Self::default()
        }
    }

    /// A peer connected
    #[must_use]
    pub fn connected(id: impl Into<String>, pid: u32) -> Self {
        Self::lifecycle(id.into(), pid, Action::Connect)
    }

    /// A peer disconnected
    #[must_use]
    pub fn disconnected(id: impl Into<String>, pid: u32) -> Self {
        Self::lifecycle(id.into(), pid, Action::Disconnect)
    }

    fn lifecycle(id: String, pid: u32, action: Action) -> Self {
        Self {
            id: Some(id),
            pid: Some(pid),
            action: Some(action),
            ..Self::default()
        }
    }

    /// Bytes received from a peer
    #[must_use]
    pub fn data(id: impl Into<String>, bytes: &[u8]) -> Self {
        Self {
            id: Some(id.into()),
            payload: Some(encode_payload(bytes)),
            ..Self::default()
        }
    }

    /// Command for a peer: write `bytes`, then optionally disconnect
    #[must_use]
    pub fn command(id: impl Into<String>, bytes: &[u8], disconnect: bool) -> Self {
        Self {
            disconnect,
            ..Self::data(id, bytes)
        }
    }

    /// Error report
    #[must_use]
    pub fn error(error: impl Into<String>, details: impl fmt::Display) -> Self {
        Self {
            error: Some(error.into()),
            details: Some(details.to_string()),
            ..Self::default()
        }
    }

    /// Decode one line of input (trailing newline optional)
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::InvalidJson`] if the line is not a JSON object
    /// matching the frame schema.
    pub fn from_line(line: &[u8]) -> Result<Self, CodecError> {
        serde_json::from_slice(trim_line_ending(line)).map_err(CodecError::InvalidJson)
    }

    /// Encode as one line of output, without the trailing newline
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::Serialize`] if serialization fails.
    pub fn to_line(&self) -> Result<String, CodecError> {
        serde_json::to_string(self).map_err(CodecError::Serialize)
    }

    /// Decode the payload bytes; a missing payload decodes to nothing
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::InvalidPayload`] if `msg` is not valid base64.
    pub fn payload_bytes(&self) -> Result<Vec<u8>, CodecError> {
        match &self.payload {
            Some(encoded) => decode_payload(encoded),
            None => Ok(Vec::new()),
        }
    }
}

/// Encode payload bytes for the wire
#[must_use]
pub fn encode_payload(bytes: &[u8]) -> String {
    BASE64.encode(bytes)
}

/// Decode payload bytes from the wire
///
/// # Errors
///
/// Returns [`CodecError::InvalidPayload`] if `encoded` is not valid base64.
pub fn decode_payload(encoded: &str) -> Result<Vec<u8>, CodecError> {
    Ok(LENIENT_BASE64.decode(encoded)?)
}

fn null_as_false<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<bool>::deserialize(deserializer)?.unwrap_or(false))
}

/// Any well-formed JSON value is accepted; one that does not fit `T` reads as absent
fn ignore_invalid<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).ok())
}

fn trim_line_ending(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_payload_round_trip() {
        let samples: [&[u8]; 5] = [b"", b"hi", b"\x00\xff\x10\n", &[0u8; 4096], b"bye"];
        for bytes in samples {
            assert_eq!(decode_payload(&encode_payload(bytes)).unwrap(), bytes);
        }
    }

    #[test]
    fn test_payload_uses_padded_standard_alphabet() {
        assert_eq!(encode_payload(b"hi"), "aGk=");
        assert_eq!(encode_payload(&[0xfb, 0xff]), "+/8=");
    }

    #[test]
    fn test_payload_trailing_bits_ignored() {
        assert_eq!(decode_payload("aGl=").unwrap(), b"hi");
        assert!(decode_payload("aGk").is_err());
    }

    #[test]
    fn test_invalid_payload() {
        let frame = Frame {
            payload: Some("not base64!".to_string()),
            ..Frame::default()
        };
        assert!(matches!(
            frame.payload_bytes(),
            Err(CodecError::InvalidPayload(_))
        ));
    }

    #[test]
    fn test_missing_payload_is_empty() {
        assert!(Frame::default().payload_bytes().unwrap().is_empty());
    }

    #[test]
    fn test_announcement_wire_shape() {
        let line = Frame::announce("/tmp/ipc_socket_x").to_line().unwrap();
        assert_eq!(line, r#"{"socket":"/tmp/ipc_socket_x","version":1}"#);
    }

    #[test]
    fn test_lifecycle_frames_always_carry_pid() {
        let line = Frame::connected("abc", 0).to_line().unwrap();
        assert_eq!(line, r#"{"id":"abc","action":"connect","pid":0}"#);

        let line = Frame::disconnected("abc", 77).to_line().unwrap();
        assert_eq!(line, r#"{"id":"abc","action":"disconnect","pid":77}"#);
    }

    #[test]
    fn test_data_and_error_wire_shape() {
        assert_eq!(
            Frame::data("abc", b"hi").to_line().unwrap(),
            r#"{"id":"abc","msg":"aGk="}"#
        );
        assert_eq!(
            Frame::error("Client not found", "Client ID x not found")
                .to_line()
                .unwrap(),
            r#"{"error":"Client not found","details":"Client ID x not found"}"#
        );
    }

    #[test]
    fn test_parse_command_line() {
        let frame = Frame::from_line(b"{\"id\":\"abc\",\"msg\":\"Ynll\",\"disconnect\":true}\r\n")
            .unwrap();
        assert_eq!(frame, Frame::command("abc", b"bye", true));
        assert_eq!(frame.payload_bytes().unwrap(), b"bye");
    }

    #[test]
    fn test_parse_accepts_long_field_names() {
        let frame = Frame::from_line(br#"{"id":"abc","payload":"aGk="}"#).unwrap();
        assert_eq!(frame.payload.as_deref(), Some("aGk="));

        let frame = Frame::from_line(br#"{"endpoint":"/tmp/s","version":1}"#).unwrap();
        assert_eq!(frame, Frame::announce("/tmp/s"));
    }

    #[test]
    fn test_parse_ignores_unknown_fields() {
        let frame = Frame::from_line(br#"{"id":"abc","extra":[1,2,3]}"#).unwrap();
        assert_eq!(frame.id.as_deref(), Some("abc"));
        assert!(!frame.disconnect);
    }

    #[test]
    fn test_parse_tolerates_unused_command_fields() {
        let lines: [&[u8]; 4] = [
            br#"{"id":"abc","msg":"aGk=","action":"reconnect"}"#,
            br#"{"id":"abc","msg":"aGk=","disconnect":null}"#,
            br#"{"id":"abc","msg":"aGk=","pid":-1}"#,
            br#"{"id":"abc","msg":"aGk=","pid":"42","action":7}"#,
        ];
        for line in lines {
            let frame = Frame::from_line(line).unwrap();
            assert_eq!(frame, Frame::command("abc", b"hi", false));
        }

        let frame = Frame::from_line(br#"{"id":"abc","action":"disconnect","pid":9}"#).unwrap();
        assert_eq!(frame, Frame::disconnected("abc", 9));
    }

    #[test]
    fn test_parse_rejects_malformed_lines() {
        for line in [&b""[..], b"\n", b"not json", b"[1,2]", b"{\"id\":", b"\xff\xfe"] {
            let err = Frame::from_line(line).unwrap_err();
            assert!(matches!(err, CodecError::InvalidJson(_)), "{line:?}");
            assert!(!err.details().is_empty());
        }
    }

    #[test]
    fn test_action_wire_names() {
        assert_eq!(serde_json::to_string(&Action::Connect).unwrap(), "\"connect\"");
        assert_eq!(
            serde_json::from_str::<Action>("\"disconnect\"").unwrap(),
            Action::Disconnect
        );
    }
}
