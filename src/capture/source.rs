//! Input source capability
//!
//! The recorder does not talk to the platform hook directly. It consumes
//! `CaptureEvent`s from a channel that an `InputSource` fills; the source
//! is registered with its output channel at construction and started and
//! stopped explicitly. This keeps the listener state owned by the caller
//! instead of living in a global.

use super::listener::CaptureError;

/// Something that can deliver capture events into its registered channel
pub trait InputSource {
    /// Start delivering events. Fails if already running or if the
    /// platform hook cannot be installed.
    fn start(&self) -> Result<(), CaptureError>;

    /// Stop delivering events. Idempotent.
    fn stop(&self);

    /// Check whether the source is currently delivering events
    fn is_running(&self) -> bool;
}
