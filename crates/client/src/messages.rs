//! Push channel message types and parser.
//!
//! The server sends either the raw text `ping` or a small JSON object
//! whose shape identifies its meaning. This module classifies inbound
//! text into a typed [`PushMessage`] and serializes the outbound
//! [`ControlMessage`] frames.

use genbridge_core::types::JobId;
use serde::{Deserialize, Serialize};

/// Raw keep-alive text sent by the server.
pub const PING: &str = "ping";
/// Raw reply to [`PING`].
pub const PONG: &str = "pong";

/// Message used when an error notice carries no text.
const DEFAULT_ERROR_MESSAGE: &str = "Image generation failed";

/// All recognised inbound push messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushMessage {
    /// Keep-alive; must be answered with [`PONG`].
    Ping,
    /// `{"imageUrl": ...}`: the job's result.
    Image { image_url: String },
    /// `{"status": "error", "message": ...}`: the job failed.
    Error { message: String },
    /// `{"status": "already_sent"}`: the result is only available on the
    /// pull channel.
    AlreadySent,
}

/// Union of every inbound JSON field; classified by [`parse_message`].
#[derive(Debug, Deserialize)]
struct RawPush {
    #[serde(rename = "imageUrl")]
    image_url: Option<String>,
    status: Option<String>,
    message: Option<String>,
}

/// Errors produced while decoding an inbound push frame.
#[derive(Debug, thiserror::Error)]
pub enum MessageError {
    #[error("Malformed JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unrecognised push message: {0}")]
    Unrecognised(String),
}

/// Parse an inbound text frame into a typed message.
///
/// Returns `Err` for malformed JSON, a blank `imageUrl`, or shapes that
/// match none of the known messages. Callers should log and keep the
/// session open.
pub fn parse_message(text: &str) -> Result<PushMessage, MessageError> {
    if text.trim() == PING {
        return Ok(PushMessage::Ping);
    }

    let raw: RawPush = serde_json::from_str(text)?;

    if let Some(image_url) = raw.image_url {
        if image_url.trim().is_empty() {
            return Err(MessageError::Unrecognised(text.to_string()));
        }
        return Ok(PushMessage::Image { image_url });
    }

    match raw.status.as_deref() {
        Some("error") => Ok(PushMessage::Error {
            message: raw
                .message
                .filter(|m| !m.is_empty())
                .unwrap_or_else(|| DEFAULT_ERROR_MESSAGE.to_string()),
        }),
        Some("already_sent") => Ok(PushMessage::AlreadySent),
        _ => Err(MessageError::Unrecognised(text.to_string())),
    }
}

/// Acknowledgment status reported back to the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AckStatus {
    /// An image was received.
    Received,
    /// An error notice was received.
    ErrorReceived,
}

/// Outbound control messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ControlMessage {
    /// Sent right after the handshake: the session can accept a result.
    Ready {
        #[serde(rename = "requestId")]
        request_id: JobId,
    },
    /// Confirms receipt of a result or error push.
    Acknowledgment {
        #[serde(rename = "requestId")]
        request_id: JobId,
        status: AckStatus,
    },
}

impl ControlMessage {
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).expect("ControlMessage is always serialisable")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(raw: &str) -> JobId {
        JobId::parse(raw).unwrap()
    }

    #[test]
    fn parse_raw_ping() {
        assert_eq!(parse_message("ping").unwrap(), PushMessage::Ping);
        assert_eq!(parse_message("ping\n").unwrap(), PushMessage::Ping);
    }

    #[test]
    fn parse_image_message() {
        let msg = parse_message(r#"{"imageUrl":"http://x/y.png"}"#).unwrap();
        assert_eq!(
            msg,
            PushMessage::Image {
                image_url: "http://x/y.png".into()
            }
        );
    }

    #[test]
    fn blank_image_url_is_unrecognised() {
        for text in [r#"{"imageUrl":""}"#, r#"{"imageUrl":"  "}"#] {
            let err = parse_message(text).unwrap_err();
            assert!(matches!(err, MessageError::Unrecognised(_)), "{text}");
        }
    }

    #[test]
    fn parse_error_message() {
        let msg = parse_message(r#"{"status":"error","message":"OOM"}"#).unwrap();
        assert_eq!(
            msg,
            PushMessage::Error {
                message: "OOM".into()
            }
        );
    }

    #[test]
    fn parse_error_without_text_uses_default() {
        let msg = parse_message(r#"{"status":"error"}"#).unwrap();
        assert_eq!(
            msg,
            PushMessage::Error {
                message: DEFAULT_ERROR_MESSAGE.into()
            }
        );
    }

    #[test]
    fn parse_already_sent_notice() {
        let msg = parse_message(r#"{"status":"already_sent"}"#).unwrap();
        assert_eq!(msg, PushMessage::AlreadySent);
    }

    #[test]
    fn unknown_status_is_unrecognised() {
        let err = parse_message(r#"{"status":"queued"}"#).unwrap_err();
        assert!(matches!(err, MessageError::Unrecognised(_)));
    }

    #[test]
    fn invalid_json_returns_error() {
        let err = parse_message("not json at all").unwrap_err();
        assert!(matches!(err, MessageError::Json(_)));
    }

    #[test]
    fn ready_serializes_with_request_id() {
        let json: serde_json::Value = serde_json::from_str(
            &ControlMessage::Ready {
                request_id: id("abc123"),
            }
            .to_json(),
        )
        .unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "type": "ready", "requestId": "abc123" })
        );
    }

    #[test]
    fn acknowledgment_serializes_status() {
        let json: serde_json::Value = serde_json::from_str(
            &ControlMessage::Acknowledgment {
                request_id: id("abc123"),
                status: AckStatus::ErrorReceived,
            }
            .to_json(),
        )
        .unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "type": "acknowledgment",
                "requestId": "abc123",
                "status": "error_received",
            })
        );
    }
}
