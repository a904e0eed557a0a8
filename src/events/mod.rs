//! Event records and session lifecycle events
//!
//! `EventRecord` is the externally observable unit of a recording: one
//! press or release, stamped with elapsed seconds since recording start.
//! `SessionEvent` is the broadcast side-channel for observers (IPC
//! subscribers, the status tracker).

use serde::{Deserialize, Serialize};

/// Kind of a recorded keyboard event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// A key went down
    KeyboardKeyPress,
    /// A key came back up
    KeyboardKeyRelease,
}

/// One recorded keyboard event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    /// What happened
    pub kind: EventKind,
    /// Key identifier, e.g. "q", "esc", "space"
    pub key: String,
    /// Elapsed seconds since recording start
    pub time: f64,
}

impl EventRecord {
    /// Build a press record
    pub fn press(key: impl Into<String>, time: f64) -> Self {
        Self {
            kind: EventKind::KeyboardKeyPress,
            key: key.into(),
            time,
        }
    }

    /// Build a release record
    pub fn release(key: impl Into<String>, time: f64) -> Self {
        Self {
            kind: EventKind::KeyboardKeyRelease,
            key: key.into(),
            time,
        }
    }
}

impl std::fmt::Display for EventRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match self.kind {
            EventKind::KeyboardKeyPress => "press",
            EventKind::KeyboardKeyRelease => "release",
        };
        write!(f, "{} {} @ {:.3}s", kind, self.key, self.time)
    }
}

/// Events emitted by the recording session for observers
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    /// Recording session started, clock at zero
    RecordingStarted,

    /// A record was appended to the session sequence
    EventRecorded {
        /// Copy of the appended record
        record: EventRecord,
    },

    /// A release arrived for a key that was not marked held
    UnmatchedRelease {
        /// Key identifier of the stray release
        key: String,
    },

    /// Recording stopped (exit combination or input source gone)
    RecordingStopped {
        /// Total records accumulated
        event_count: usize,
        /// Releases that had no matching press
        unmatched_releases: u64,
        /// Session duration in milliseconds
        duration_ms: u64,
    },
}

impl std::fmt::Display for SessionEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionEvent::RecordingStarted => write!(f, "RECORDING_STARTED"),
            SessionEvent::EventRecorded { record } => {
                write!(f, "EVENT_RECORDED ({})", record)
            }
            SessionEvent::UnmatchedRelease { key } => {
                write!(f, "UNMATCHED_RELEASE ({})", key)
            }
            SessionEvent::RecordingStopped {
                event_count,
                unmatched_releases,
                duration_ms,
            } => write!(
                f,
                "RECORDING_STOPPED ({} events, {} unmatched, {}ms)",
                event_count, unmatched_releases, duration_ms
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_serialization() {
        let record = EventRecord::press("q", 1.25);
        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains("keyboard_key_press"));
        assert!(json.contains("\"q\""));
        assert!(json.contains("1.25"));
    }

    #[test]
    fn test_record_deserialization() {
        let json = r#"{"kind":"keyboard_key_release","key":"esc","time":2.5}"#;
        let record: EventRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.kind, EventKind::KeyboardKeyRelease);
        assert_eq!(record.key, "esc");
    }

    #[test]
    fn test_session_event_serialization() {
        let event = SessionEvent::RecordingStopped {
            event_count: 4,
            unmatched_releases: 1,
            duration_ms: 1500,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("recording_stopped"));
        assert!(json.contains("1500"));
    }

    #[test]
    fn test_session_event_deserialization() {
        let json = r#"{"type":"recording_started"}"#;
        let event: SessionEvent = serde_json::from_str(json).unwrap();
        assert!(matches!(event, SessionEvent::RecordingStarted));
    }
}
