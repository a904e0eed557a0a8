//! Recording session implementation
//!
//! Consumes capture events, appends timestamped records to the
//! session-owned sequence, and stops once the exit combination is held.

use std::time::Instant;

use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

use crate::capture::{CaptureEvent, ExitCombo, HeldKeys};
use crate::events::{EventRecord, SessionEvent};

/// The two phases of a recording session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Capture events are being accumulated
    Recording,
    /// The session has ended; the record sequence has been handed out
    Stopped,
}

impl Default for SessionState {
    fn default() -> Self {
        Self::Recording
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionState::Recording => write!(f, "Recording"),
            SessionState::Stopped => write!(f, "Stopped"),
        }
    }
}

/// Whether the session keeps consuming events after a press
enum PressOutcome {
    Continue,
    ExitComboHeld,
}

/// A single keyboard recording session.
///
/// Owns the record sequence exclusively; `run` transfers it to the caller
/// exactly once, when recording ends.
pub struct RecordingSession {
    /// Accumulated records, append-only, in arrival order
    events: Vec<EventRecord>,
    /// Keys currently held down
    held: HeldKeys,
    /// Combination that terminates recording
    exit_combo: ExitCombo,
    /// Recording start, the zero point for record times
    started_at: Instant,
    /// Releases that arrived without a matching press
    unmatched_releases: u64,
    /// Channel for emitting session events
    event_tx: broadcast::Sender<SessionEvent>,
}

impl RecordingSession {
    /// Create a new session; the clock starts now
    pub fn new(event_tx: broadcast::Sender<SessionEvent>, exit_combo: ExitCombo) -> Self {
        Self {
            events: Vec::new(),
            held: HeldKeys::new(),
            exit_combo,
            started_at: Instant::now(),
            unmatched_releases: 0,
            event_tx,
        }
    }

    /// Number of records accumulated so far
    pub fn event_count(&self) -> usize {
        self.events.len()
    }

    /// Releases seen without a matching press so far
    pub fn unmatched_releases(&self) -> u64 {
        self.unmatched_releases
    }

    /// Elapsed seconds since recording start
    fn elapsed(&self) -> f64 {
        self.started_at.elapsed().as_secs_f64()
    }

    /// Run the session, consuming capture events until the exit
    /// combination is held or the input source goes away.
    ///
    /// Returns the full record sequence.
    pub async fn run(mut self, mut capture_rx: mpsc::Receiver<CaptureEvent>) -> Vec<EventRecord> {
        info!(exit_combo = %self.exit_combo, "recording session started");
        self.emit(SessionEvent::RecordingStarted);

        while let Some(event) = capture_rx.recv().await {
            match event {
                CaptureEvent::KeyPressed(key) => {
                    if matches!(self.handle_press(&key), PressOutcome::ExitComboHeld) {
                        info!(exit_combo = %self.exit_combo, "exit combination held, stopping");
                        break;
                    }
                }
                CaptureEvent::KeyReleased(key) => {
                    self.handle_release(&key);
                }
                CaptureEvent::TapDisabled => {
                    warn!("event tap disabled, events may be missed");
                }
            }
        }

        let duration_ms = self.started_at.elapsed().as_millis() as u64;
        info!(
            events = self.events.len(),
            unmatched_releases = self.unmatched_releases,
            duration_ms,
            "recording session finished"
        );
        self.emit(SessionEvent::RecordingStopped {
            event_count: self.events.len(),
            unmatched_releases: self.unmatched_releases,
            duration_ms,
        });

        self.events
    }

    /// Handle a key press: record it, mark it held, test the exit combo.
    ///
    /// The presses completing the combination are recorded before the
    /// session reports it, so they appear in the returned sequence.
    fn handle_press(&mut self, key: &str) -> PressOutcome {
        let record = EventRecord::press(key, self.elapsed());
        debug!(%record, "press");
        self.append(record);

        if !self.held.press(key) {
            debug!(key, "press for a key already marked held");
        }

        if self.exit_combo.is_satisfied(&self.held) {
            PressOutcome::ExitComboHeld
        } else {
            PressOutcome::Continue
        }
    }

    /// Handle a key release: record it and clear its held marker.
    ///
    /// A release with no matching press is an inconsistency in the input
    /// stream (e.g. the key was down before recording started). It is
    /// still recorded, but reported instead of failing.
    fn handle_release(&mut self, key: &str) {
        let record = EventRecord::release(key, self.elapsed());
        debug!(%record, "release");
        self.append(record);

        if !self.held.release(key) {
            warn!(key, "release without a matching press");
            self.unmatched_releases += 1;
            self.emit(SessionEvent::UnmatchedRelease {
                key: key.to_string(),
            });
        }
    }

    /// Append a record and notify observers
    fn append(&mut self, record: EventRecord) {
        self.emit(SessionEvent::EventRecorded {
            record: record.clone(),
        });
        self.events.push(record);
    }

    /// Broadcast a session event; observers may come and go
    fn emit(&self, event: SessionEvent) {
        let _ = self.event_tx.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventKind;

    fn create_session() -> (RecordingSession, broadcast::Receiver<SessionEvent>) {
        let (tx, rx) = broadcast::channel(64);
        (RecordingSession::new(tx, ExitCombo::default()), rx)
    }

    #[test]
    fn test_press_appends_record_and_holds_key() {
        let (mut session, _rx) = create_session();

        assert!(matches!(
            session.handle_press("a"),
            PressOutcome::Continue
        ));

        assert_eq!(session.event_count(), 1);
        assert!(session.held.is_held("a"));
    }

    #[test]
    fn test_release_after_press_clears_held() {
        let (mut session, _rx) = create_session();

        session.handle_press("a");
        session.handle_release("a");

        assert_eq!(session.event_count(), 2);
        assert!(!session.held.is_held("a"));
        assert_eq!(session.unmatched_releases(), 0);
    }

    #[test]
    fn test_unmatched_release_is_reported_not_fatal() {
        let (mut session, mut rx) = create_session();

        session.handle_release("x");

        // The release is still recorded
        assert_eq!(session.event_count(), 1);
        assert_eq!(session.unmatched_releases(), 1);

        // EventRecorded first, then the inconsistency report
        let first = rx.try_recv().unwrap();
        assert!(matches!(first, SessionEvent::EventRecorded { .. }));
        let second = rx.try_recv().unwrap();
        assert!(matches!(second, SessionEvent::UnmatchedRelease { key } if key == "x"));
    }

    #[test]
    fn test_record_times_non_decreasing() {
        let (mut session, _rx) = create_session();

        session.handle_press("a");
        session.handle_release("a");
        session.handle_press("b");

        let times: Vec<f64> = session.events.iter().map(|r| r.time).collect();
        assert!(times.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn test_exit_combo_requires_both_keys() {
        let (mut session, _rx) = create_session();

        assert!(matches!(
            session.handle_press("q"),
            PressOutcome::Continue
        ));
        session.handle_release("q");

        // q no longer held: esc alone must not stop the session
        assert!(matches!(
            session.handle_press("esc"),
            PressOutcome::Continue
        ));

        // q again while esc is still held: combination satisfied
        assert!(matches!(
            session.handle_press("q"),
            PressOutcome::ExitComboHeld
        ));
    }

    #[tokio::test]
    async fn test_run_stops_on_exit_combo() {
        let (session, _rx) = create_session();
        let (capture_tx, capture_rx) = mpsc::channel(16);

        capture_tx
            .send(CaptureEvent::KeyPressed("q".to_string()))
            .await
            .unwrap();
        capture_tx
            .send(CaptureEvent::KeyPressed("esc".to_string()))
            .await
            .unwrap();

        // Sender stays alive: run must return because of the combination
        let events = session.run(capture_rx).await;

        assert_eq!(events.len(), 2);
        assert_eq!(events[0].kind, EventKind::KeyboardKeyPress);
        assert_eq!(events[0].key, "q");
        assert_eq!(events[1].key, "esc");
        drop(capture_tx);
    }

    #[tokio::test]
    async fn test_run_returns_when_source_closes() {
        let (session, _rx) = create_session();
        let (capture_tx, capture_rx) = mpsc::channel(16);

        capture_tx
            .send(CaptureEvent::KeyPressed("a".to_string()))
            .await
            .unwrap();
        capture_tx
            .send(CaptureEvent::KeyReleased("a".to_string()))
            .await
            .unwrap();
        drop(capture_tx);

        let events = session.run(capture_rx).await;

        assert_eq!(events.len(), 2);
        assert_eq!(events[1].kind, EventKind::KeyboardKeyRelease);
    }

    #[tokio::test]
    async fn test_run_emits_stopped_event() {
        let (session, mut rx) = create_session();
        let (capture_tx, capture_rx) = mpsc::channel(16);
        drop(capture_tx);

        let events = session.run(capture_rx).await;
        assert!(events.is_empty());

        let mut saw_stopped = false;
        while let Ok(event) = rx.try_recv() {
            if let SessionEvent::RecordingStopped { event_count, .. } = event {
                assert_eq!(event_count, 0);
                saw_stopped = true;
            }
        }
        assert!(saw_stopped);
    }
}
