//! Wire protocol between the dashboard and the telemetry backend
//!
//! Every frame is a single JSON object with a `type` discriminator:
//!
//! ```text
//! Inbound:  {"type":"serial_data","data":{"timestamp":"...","data":"..."}}
//!           {"type":"chat_response","message":"..."}
//!           {"type":"serial_response","message":"..."}
//!           {"type":"error","message":"..."}
//!           {"type":"pong"}
//! Outbound: {"type":"serial_command","command":"..."}
//!           {"type":"chat","message":"..."}
//!           {"type":"ping"}
//! ```
//!
//! Decoding never fails. A payload that is not a structurally valid frame
//! comes back as [`Decoded::RawText`], which keeps the older plain-text wire
//! format working.

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// A decoded inbound frame.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundMessage {
    /// One line of diagnostic output read from the serial port by the backend
    SerialData {
        /// Timestamp string as reported by the backend
        timestamp: String,
        /// Raw text of the reading
        raw: String,
    },
    /// Assistant reply to a chat query
    ChatResponse {
        /// Reply text
        text: String,
    },
    /// Acknowledgement or output produced by a serial command
    SerialResponse {
        /// Response text
        text: String,
    },
    /// Error reported by the backend application
    ErrorNotice {
        /// Error description
        text: String,
    },
    /// Heartbeat acknowledgement
    Pong,
    /// Well-formed frame with a `type` this client does not recognize
    Unknown {
        /// The unrecognized `type` value
        raw_type: String,
    },
}

/// Outcome of decoding one inbound payload.
#[derive(Debug, Clone, PartialEq)]
pub enum Decoded {
    /// The payload was a structurally valid frame
    Message(InboundMessage),
    /// The payload was not a valid frame; carries it unchanged
    RawText(String),
}

/// A command sent to the backend. Sends are fire-and-forget.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundCommand {
    /// Write a command to the vehicle's serial interface
    SerialCommand {
        /// Command text, e.g. `010C`
        #[serde(rename = "command")]
        text: String,
    },
    /// Ask the backend's assistant a question
    #[serde(rename = "chat")]
    ChatMessage {
        /// Message text
        #[serde(rename = "message")]
        text: String,
    },
    /// Heartbeat
    Ping,
}

impl OutboundCommand {
    /// Build a serial command frame
    pub fn serial(text: impl Into<String>) -> Self {
        Self::SerialCommand { text: text.into() }
    }

    /// Build a chat message frame
    pub fn chat(text: impl Into<String>) -> Self {
        Self::ChatMessage { text: text.into() }
    }

    /// Serialize this command into a wire frame
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::ObdWatchError::Serialization`] if serialization fails.
    pub fn to_frame(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Short name used in log lines
    pub fn kind(&self) -> &'static str {
        match self {
            Self::SerialCommand { .. } => "serial_command",
            Self::ChatMessage { .. } => "chat",
            Self::Ping => "ping",
        }
    }
}

#[derive(Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    kind: String,
}

#[derive(Deserialize)]
struct SerialDataFrame {
    data: SerialDataBody,
}

#[derive(Deserialize)]
struct SerialDataBody {
    timestamp: String,
    data: String,
}

#[derive(Deserialize)]
struct MessageFrame {
    message: String,
}

/// Decode an inbound payload.
///
/// # Examples
///
/// ```
/// use obdwatch::session::protocol::{decode_frame, Decoded, InboundMessage};
///
/// let decoded = decode_frame(r#"{"type":"pong"}"#);
/// assert_eq!(decoded, Decoded::Message(InboundMessage::Pong));
///
/// let decoded = decode_frame("hello from an old backend");
/// assert_eq!(decoded, Decoded::RawText("hello from an old backend".to_string()));
/// ```
pub fn decode_frame(payload: &str) -> Decoded {
    let value: serde_json::Value = match serde_json::from_str(payload) {
        Ok(value) => value,
        Err(_) => return Decoded::RawText(payload.to_string()),
    };

    let envelope: Envelope = match Envelope::deserialize(&value) {
        Ok(envelope) => envelope,
        Err(_) => return Decoded::RawText(payload.to_string()),
    };

    let message = match envelope.kind.as_str() {
        "serial_data" => SerialDataFrame::deserialize(&value).map(|f| InboundMessage::SerialData {
            timestamp: f.data.timestamp,
            raw: f.data.data,
        }),
        "chat_response" => {
            MessageFrame::deserialize(&value).map(|f| InboundMessage::ChatResponse { text: f.message })
        }
        "serial_response" => MessageFrame::deserialize(&value)
            .map(|f| InboundMessage::SerialResponse { text: f.message }),
        "error" => {
            MessageFrame::deserialize(&value).map(|f| InboundMessage::ErrorNotice { text: f.message })
        }
        "pong" => Ok(InboundMessage::Pong),
        other => Ok(InboundMessage::Unknown {
            raw_type: other.to_string(),
        }),
    };

    match message {
        Ok(message) => Decoded::Message(message),
        Err(_) => Decoded::RawText(payload.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_serial_data() {
        let decoded = decode_frame(
            r#"{"type":"serial_data","data":{"timestamp":"2024-05-01T10:00:00","data":"41 0C 1A F8"}}"#,
        );
        assert_eq!(
            decoded,
            Decoded::Message(InboundMessage::SerialData {
                timestamp: "2024-05-01T10:00:00".to_string(),
                raw: "41 0C 1A F8".to_string(),
            })
        );
    }

    #[test]
    fn test_decode_message_variants() {
        assert_eq!(
            decode_frame(r#"{"type":"chat_response","message":"Check the O2 sensor"}"#),
            Decoded::Message(InboundMessage::ChatResponse {
                text: "Check the O2 sensor".to_string()
            })
        );
        assert_eq!(
            decode_frame(r#"{"type":"serial_response","message":"OK"}"#),
            Decoded::Message(InboundMessage::SerialResponse {
                text: "OK".to_string()
            })
        );
        assert_eq!(
            decode_frame(r#"{"type":"error","message":"Port busy"}"#),
            Decoded::Message(InboundMessage::ErrorNotice {
                text: "Port busy".to_string()
            })
        );
    }

    #[test]
    fn test_decode_unknown_type() {
        assert_eq!(
            decode_frame(r#"{"type":"frobnicate"}"#),
            Decoded::Message(InboundMessage::Unknown {
                raw_type: "frobnicate".to_string()
            })
        );
    }

    #[test]
    fn test_decode_plain_text_falls_back() {
        assert_eq!(
            decode_frame("not json at all"),
            Decoded::RawText("not json at all".to_string())
        );
    }

    #[test]
    fn test_decode_non_object_json_falls_back() {
        assert_eq!(decode_frame("42"), Decoded::RawText("42".to_string()));
        assert_eq!(
            decode_frame(r#""quoted""#),
            Decoded::RawText(r#""quoted""#.to_string())
        );
    }

    #[test]
    fn test_decode_missing_type_falls_back() {
        let payload = r#"{"message":"no discriminator"}"#;
        assert_eq!(decode_frame(payload), Decoded::RawText(payload.to_string()));
    }

    #[test]
    fn test_decode_known_type_with_missing_fields_falls_back() {
        let payload = r#"{"type":"serial_data","data":{"timestamp":"t"}}"#;
        assert_eq!(decode_frame(payload), Decoded::RawText(payload.to_string()));

        let payload = r#"{"type":"chat_response"}"#;
        assert_eq!(decode_frame(payload), Decoded::RawText(payload.to_string()));
    }

    #[test]
    fn test_decode_ignores_extra_fields() {
        assert_eq!(
            decode_frame(r#"{"type":"pong","server_time":123}"#),
            Decoded::Message(InboundMessage::Pong)
        );
    }

    #[test]
    fn test_outbound_frames() {
        assert_eq!(
            OutboundCommand::serial("ATZ").to_frame().unwrap(),
            r#"{"type":"serial_command","command":"ATZ"}"#
        );
        assert_eq!(
            OutboundCommand::chat("why is my RPM low?").to_frame().unwrap(),
            r#"{"type":"chat","message":"why is my RPM low?"}"#
        );
        assert_eq!(
            OutboundCommand::Ping.to_frame().unwrap(),
            r#"{"type":"ping"}"#
        );
    }

    #[test]
    fn test_outbound_kind() {
        assert_eq!(OutboundCommand::Ping.kind(), "ping");
        assert_eq!(OutboundCommand::chat("x").kind(), "chat");
        assert_eq!(OutboundCommand::serial("x").kind(), "serial_command");
    }
}
