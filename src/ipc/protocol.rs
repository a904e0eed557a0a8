//! IPC message protocol definitions
//!
//! All messages are JSON-encoded, prefixed with a 4-byte little-endian length.

use serde::{Deserialize, Serialize};

use crate::events::SessionEvent;
use crate::recorder::SessionState;

/// Externally visible phase of the recorder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Events are being captured and recorded
    Recording,
    /// The session has ended
    Stopped,
}

impl Default for Phase {
    fn default() -> Self {
        Self::Recording
    }
}

/// Requests from clients to the daemon
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Request {
    /// Request current recorder status
    GetStatus,

    /// Ping to check connectivity
    Ping,

    /// Upgrade the connection to a session event notification stream
    Subscribe,
}

/// Responses from daemon to clients
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    /// Current recorder status
    Status(RecorderStatus),

    /// Pong response to ping
    Pong,

    /// Subscription confirmed
    Subscribed,

    /// Error response
    Error { code: String, message: String },
}

/// Push notification from daemon to subscribed clients
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Notification {
    /// A session event occurred
    Event {
        /// The session event being pushed
        event: SessionEvent,
    },
}

/// Full recorder status snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecorderStatus {
    /// Daemon version
    pub version: String,

    /// Current phase
    pub phase: Phase,

    /// Whether the event tap is delivering events
    pub tap_active: bool,

    /// Records accumulated so far
    pub events_recorded: u64,

    /// Releases seen without a matching press
    pub unmatched_releases: u64,

    /// Uptime in seconds
    pub uptime_secs: u64,
}

impl Default for RecorderStatus {
    fn default() -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            phase: Phase::default(),
            tap_active: false,
            events_recorded: 0,
            unmatched_releases: 0,
            uptime_secs: 0,
        }
    }
}

/// Convert internal SessionState to IPC Phase
impl From<SessionState> for Phase {
    fn from(state: SessionState) -> Self {
        match state {
            SessionState::Recording => Phase::Recording,
            SessionState::Stopped => Phase::Stopped,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_serialization() {
        let req = Request::Subscribe;
        let json = serde_json::to_string(&req).unwrap();
        assert!(json.contains("subscribe"));
    }

    #[test]
    fn test_request_deserialization() {
        let json = r#"{"type":"get_status"}"#;
        let req: Request = serde_json::from_str(json).unwrap();
        assert!(matches!(req, Request::GetStatus));
    }

    #[test]
    fn test_response_serialization() {
        let resp = Response::Status(RecorderStatus::default());
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains("status"));
        assert!(json.contains("recording"));
    }

    #[test]
    fn test_notification_serialization() {
        let note = Notification::Event {
            event: SessionEvent::RecordingStarted,
        };
        let json = serde_json::to_string(&note).unwrap();
        assert!(json.contains(r#""type":"event""#));
        assert!(json.contains("recording_started"));
    }

    #[test]
    fn test_phase_from_session_state() {
        assert_eq!(Phase::from(SessionState::Recording), Phase::Recording);
        assert_eq!(Phase::from(SessionState::Stopped), Phase::Stopped);
    }
}
