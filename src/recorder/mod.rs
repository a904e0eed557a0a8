//! Recorder module for accumulating keyboard event records
//!
//! A recording session owns the append-only record sequence, tracks which
//! keys are held, and terminates when the exit combination is held.

mod session;

pub use session::{RecordingSession, SessionState};
