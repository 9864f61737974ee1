//! Wire format shared by the sync server and its clients.
//!
//! Every frame is a JSON text object with a `type` tag:
//!
//! ```text
//! {"type":"content","data":"<full file text>"}   server -> client
//! {"type":"save","data":"<full file text>"}      client -> server
//! ```
//!
//! A well-formed object with any other `type` decodes to [`Frame::Unrecognized`]; receivers
//! log and drop it. Anything that is not such an object is a decode error.

use serde::{Deserialize, Serialize};

use crate::error::SchemaflowError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SyncMessage {
    /// Snapshot of the file, sent by the server.
    Content { data: String },
    /// Proposed replacement of the file, sent by a client.
    Save { data: String },
}

impl SyncMessage {
    pub fn kind(&self) -> &'static str {
        match self {
            SyncMessage::Content { .. } => "content",
            SyncMessage::Save { .. } => "save",
        }
    }

    pub fn data(&self) -> &str {
        match self {
            SyncMessage::Content { data } | SyncMessage::Save { data } => data,
        }
    }
}

/// A decoded frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Message(SyncMessage),
    Unrecognized { kind: String },
}

#[derive(Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    kind: String,
}

pub fn encode(message: &SyncMessage) -> Result<String, SchemaflowError> {
    Ok(serde_json::to_string(message)?)
}

pub fn decode(text: &str) -> Result<Frame, SchemaflowError> {
    let envelope: Envelope = serde_json::from_str(text)?;
    match envelope.kind.as_str() {
        "content" | "save" => Ok(Frame::Message(serde_json::from_str(text)?)),
        _ => Ok(Frame::Unrecognized {
            kind: envelope.kind,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn encodes_wire_shape() {
        let text = encode(&SyncMessage::Content {
            data: "model A {}".to_string(),
        })
        .unwrap();
        assert_eq!(text, r#"{"type":"content","data":"model A {}"}"#);

        let text = encode(&SyncMessage::Save {
            data: String::new(),
        })
        .unwrap();
        assert_eq!(text, r#"{"type":"save","data":""}"#);
    }

    #[test]
    fn decodes_known_messages() {
        let frame = decode(r#"{"type":"save","data":"enum Role {\n}"}"#).unwrap();
        assert_eq!(
            frame,
            Frame::Message(SyncMessage::Save {
                data: "enum Role {\n}".to_string()
            })
        );
    }

    #[test]
    fn unknown_type_is_valid_framing() {
        let frame = decode(r#"{"type":"ping"}"#).unwrap();
        assert_eq!(
            frame,
            Frame::Unrecognized {
                kind: "ping".to_string()
            }
        );
    }

    #[test]
    fn malformed_frames_are_errors() {
        assert!(matches!(
            decode("not json"),
            Err(SchemaflowError::Serialization(_))
        ));
        assert!(decode(r#"{"data":"x"}"#).is_err());
        // Known type with a missing payload
        assert!(decode(r#"{"type":"save"}"#).is_err());
    }
}
