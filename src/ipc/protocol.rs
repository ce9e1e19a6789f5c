//! # Observer Protocol
//!
//! Message types exchanged with observers over the Unix socket.
//!
//! Uses length-prefixed JSON framing:
//! - 4 bytes: message length (big-endian u32)
//! - N bytes: JSON payload
//!
//! Server events are `{"type": ..., "payload": {...}}`; client commands are
//! flat objects tagged by `type`.

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::core::{SessionStatus, StanceTotals, TurnMessage, Winner};

/// Largest frame accepted in either direction
pub const MAX_FRAME_LEN: usize = 10 * 1024 * 1024;

// ============================================================================
// Server -> Observer Events
// ============================================================================

/// Events pushed to observers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum ObserverEvent {
    /// Combined progress snapshot, optionally carrying the turn that caused it
    DebateUpdate {
        session_id: String,
        status: SessionStatus,
        current_round: u32,
        current_turn: u32,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<TurnMessage>,
    },
    /// A turn was generated and stored
    NewMessage {
        session_id: String,
        round: u32,
        turn: u32,
        message: TurnMessage,
    },
    /// Session status changed
    SessionStatus {
        session_id: String,
        status: SessionStatus,
    },
    /// Judging finished
    DebateCompleted {
        session_id: String,
        winner: Winner,
        totals: StanceTotals,
        summary: String,
    },
    Error {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        session_id: Option<String>,
        error: String,
    },
    Subscribed {
        session_id: String,
    },
    Unsubscribed {
        session_id: String,
    },
    Pong {
        timestamp: i64,
    },
    /// Reply to a control command
    CommandResponse {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        request_id: Option<String>,
        success: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        data: Option<serde_json::Value>,
    },
}

impl ObserverEvent {
    pub fn error(session_id: Option<&str>, error: impl Into<String>) -> Self {
        ObserverEvent::Error {
            session_id: session_id.map(String::from),
            error: error.into(),
        }
    }
}

// ============================================================================
// Observer -> Server Commands
// ============================================================================

/// Commands sent by observers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ObserverCommand {
    Subscribe {
        session_id: String,
    },
    Unsubscribe {
        session_id: String,
    },
    Ping,
    StartSession {
        #[serde(default)]
        request_id: Option<String>,
        session_id: String,
    },
    PauseSession {
        #[serde(default)]
        request_id: Option<String>,
        session_id: String,
    },
    StopSession {
        #[serde(default)]
        request_id: Option<String>,
        session_id: String,
    },
    GetStatus {
        #[serde(default)]
        request_id: Option<String>,
        session_id: String,
    },
}

// ============================================================================
// Framing - Length-prefixed JSON messages
// ============================================================================

/// Prefix an already-serialized JSON payload with its length
pub fn frame(json: &[u8]) -> Result<Vec<u8>> {
    if json.len() > MAX_FRAME_LEN {
        return Err(anyhow!("Message too large: {} bytes", json.len()));
    }
    let len = json.len() as u32;
    let mut buf = Vec::with_capacity(4 + json.len());
    buf.extend_from_slice(&len.to_be_bytes());
    buf.extend_from_slice(json);
    Ok(buf)
}

/// Encode a message with length prefix
pub fn encode_message<T: Serialize>(msg: &T) -> Result<Vec<u8>> {
    frame(&serde_json::to_vec(msg)?)
}

/// Read one frame body. `Ok(None)` means the peer closed cleanly between frames.
pub async fn read_frame<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Option<Vec<u8>>> {
    let mut len_buf = [0u8; 4];
    match reader.read_exact(&mut len_buf).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }
    let len = u32::from_be_bytes(len_buf) as usize;

    if len > MAX_FRAME_LEN {
        return Err(anyhow!("Message too large: {} bytes", len));
    }

    let mut buf = vec![0u8; len];
    reader.read_exact(&mut buf).await?;
    Ok(Some(buf))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_event_wire_shape() {
        let event = ObserverEvent::SessionStatus {
            session_id: "s1".into(),
            status: SessionStatus::Paused,
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(
            value,
            json!({"type": "session_status", "payload": {"session_id": "s1", "status": "paused"}})
        );

        let pong = serde_json::to_value(ObserverEvent::Pong { timestamp: 7 }).unwrap();
        assert_eq!(pong["type"], "pong");
    }

    #[test]
    fn test_progress_event_omits_missing_message() {
        let event = ObserverEvent::DebateUpdate {
            session_id: "s1".into(),
            status: SessionStatus::Running,
            current_round: 2,
            current_turn: 1,
            message: None,
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "debate_update");
        assert_eq!(value["payload"]["current_round"], 2);
        assert!(value["payload"].get("message").is_none());
    }

    #[test]
    fn test_command_parsing() {
        let cmd: ObserverCommand =
            serde_json::from_str(r#"{"type":"subscribe","session_id":"abc"}"#).unwrap();
        assert_eq!(cmd, ObserverCommand::Subscribe { session_id: "abc".into() });

        let cmd: ObserverCommand = serde_json::from_str(r#"{"type":"ping"}"#).unwrap();
        assert_eq!(cmd, ObserverCommand::Ping);

        let cmd: ObserverCommand =
            serde_json::from_str(r#"{"type":"stop_session","session_id":"abc","request_id":"r1"}"#)
                .unwrap();
        assert_eq!(
            cmd,
            ObserverCommand::StopSession {
                request_id: Some("r1".into()),
                session_id: "abc".into()
            }
        );

        assert!(serde_json::from_str::<ObserverCommand>(r#"{"type":"dance"}"#).is_err());
        assert!(serde_json::from_str::<ObserverCommand>(r#"{"type":"subscribe"}"#).is_err());
    }

    #[tokio::test]
    async fn test_framing() {
        let event = ObserverEvent::Subscribed { session_id: "s".into() };
        let mut encoded = encode_message(&event).unwrap();
        let len = u32::from_be_bytes([encoded[0], encoded[1], encoded[2], encoded[3]]) as usize;
        assert_eq!(len, encoded.len() - 4);

        // Two frames back to back, then a clean end of stream
        encoded.extend(encode_message(&ObserverEvent::Pong { timestamp: 1 }).unwrap());
        let mut reader: &[u8] = &encoded;
        let first = read_frame(&mut reader).await.unwrap().unwrap();
        assert_eq!(serde_json::from_slice::<ObserverEvent>(&first).unwrap(), event);
        assert!(read_frame(&mut reader).await.unwrap().is_some());
        assert!(read_frame(&mut reader).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_oversized_frame_rejected() {
        let mut bytes = ((MAX_FRAME_LEN + 1) as u32).to_be_bytes().to_vec();
        bytes.extend_from_slice(b"{}");
        let mut reader: &[u8] = &bytes;
        assert!(read_frame(&mut reader).await.is_err());
    }
}
