//! Capture module for global keyboard event listening
//!
//! Uses a macOS CGEventTap to observe KeyDown/KeyUp and modifier flag
//! changes system-wide, naming each key and forwarding press/release
//! events to the recording session.

mod keys;
mod listener;
mod source;

pub use keys::{key_name, ComboParseError, ExitCombo, HeldKeys, Modifiers};
pub use listener::{CaptureError, CaptureEvent, KeyListener};
pub use source::InputSource;
