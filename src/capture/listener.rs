//! Global key event listener using macOS CGEventTap
//!
//! Monitors system-wide KeyDown/KeyUp events plus modifier flag changes
//! and forwards them as named press/release events. Runs on a dedicated
//! thread with its own CFRunLoop.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use core_foundation::runloop::{kCFRunLoopCommonModes, kCFRunLoopDefaultMode, CFRunLoop};
use core_graphics::event::{
    CGEvent, CGEventFlags, CGEventTap, CGEventTapLocation, CGEventTapOptions,
    CGEventTapPlacement, CGEventType, EventField,
};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use super::keys::{key_name, Modifiers};
use super::source::InputSource;

/// Events sent from the listener thread to the recording session
#[derive(Debug, Clone)]
pub enum CaptureEvent {
    /// A key went down (autorepeats already filtered out)
    KeyPressed(String),
    /// A key came back up
    KeyReleased(String),
    /// Event tap was disabled by macOS; events may have been missed
    TapDisabled,
}

/// Raw material from the tap callback, decoded on the listener thread
enum TapEvent {
    Key {
        code: i64,
        pressed: bool,
        repeat: bool,
    },
    Flags(CGEventFlags),
    Disabled,
}

/// Global key listener that forwards press/release events
pub struct KeyListener {
    event_tx: mpsc::Sender<CaptureEvent>,
    running: Arc<AtomicBool>,
}

impl KeyListener {
    /// Create a new listener registered with its output channel
    pub fn new(event_tx: mpsc::Sender<CaptureEvent>) -> Self {
        Self {
            event_tx,
            running: Arc::new(AtomicBool::new(false)),
        }
    }
}

impl InputSource for KeyListener {
    /// Start the listener.
    ///
    /// Spawns a dedicated thread that runs a CFRunLoop to receive
    /// CGEventTap callbacks. The listener runs until `stop()` is called
    /// or the program exits.
    fn start(&self) -> Result<(), CaptureError> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(CaptureError::AlreadyRunning);
        }

        let event_tx = self.event_tx.clone();
        let running = Arc::clone(&self.running);

        thread::Builder::new()
            .name("key-listener".to_string())
            .spawn(move || {
                info!("key listener thread started");

                if let Err(e) = run_event_loop(event_tx, running.clone()) {
                    error!(?e, "key listener error");
                }

                running.store(false, Ordering::SeqCst);
                info!("key listener thread stopped");
            })
            .map_err(|e| CaptureError::ThreadSpawn(e.to_string()))?;

        Ok(())
    }

    /// Stop the listener; the CFRunLoop poll exits on the next iteration
    fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    /// Check if the listener is currently running
    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

/// Errors that can occur in the key listener
#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    #[error("key listener is already running")]
    AlreadyRunning,

    #[error("failed to create event tap - check Accessibility permissions")]
    EventTapCreation,

    #[error("failed to spawn listener thread: {0}")]
    ThreadSpawn(String),
}

/// Run the CFRunLoop with the event tap
fn run_event_loop(
    event_tx: mpsc::Sender<CaptureEvent>,
    running: Arc<AtomicBool>,
) -> Result<(), CaptureError> {
    // Modifier keys arrive as FlagsChanged, not KeyDown/KeyUp; track the
    // previous snapshot to turn flag words into press/release transitions.
    let mut last_modifiers = Modifiers::default();

    // Channel to move raw events out of the tap callback
    let (callback_tx, callback_rx) = std::sync::mpsc::channel::<TapEvent>();

    // CGEventTap callback - must be fast and non-blocking
    let callback = move |_proxy: core_graphics::event::CGEventTapProxy,
                         event_type: CGEventType,
                         event: &CGEvent|
                         -> Option<CGEvent> {
        match event_type {
            CGEventType::KeyDown | CGEventType::KeyUp => {
                let code = event.get_integer_value_field(EventField::KEYBOARD_EVENT_KEYCODE);
                let repeat =
                    event.get_integer_value_field(EventField::KEYBOARD_EVENT_AUTOREPEAT) != 0;
                let _ = callback_tx.send(TapEvent::Key {
                    code,
                    pressed: matches!(event_type, CGEventType::KeyDown),
                    repeat,
                });
            }
            CGEventType::FlagsChanged => {
                let _ = callback_tx.send(TapEvent::Flags(event.get_flags()));
            }
            CGEventType::TapDisabledByTimeout | CGEventType::TapDisabledByUserInput => {
                warn!("event tap disabled, will re-enable");
                let _ = callback_tx.send(TapEvent::Disabled);
            }
            _ => {}
        }
        Some(event.clone())
    };

    // Create the event tap
    let tap = CGEventTap::new(
        CGEventTapLocation::Session,
        CGEventTapPlacement::HeadInsertEventTap,
        CGEventTapOptions::ListenOnly,
        vec![
            CGEventType::KeyDown,
            CGEventType::KeyUp,
            CGEventType::FlagsChanged,
        ],
        callback,
    )
    .map_err(|_| {
        error!("failed to create event tap - is Accessibility permission granted?");
        CaptureError::EventTapCreation
    })?;

    // Enable the tap
    tap.enable();

    // Create a run loop source and add it to the current run loop
    let run_loop_source = tap
        .mach_port
        .create_runloop_source(0)
        .map_err(|_| CaptureError::EventTapCreation)?;
    let run_loop = CFRunLoop::get_current();

    unsafe {
        run_loop.add_source(&run_loop_source, kCFRunLoopCommonModes);
    }

    info!("event tap created and enabled");

    // Process events in a loop
    while running.load(Ordering::SeqCst) {
        // Run the loop for a short interval, then check for new events
        unsafe {
            CFRunLoop::run_in_mode(
                kCFRunLoopDefaultMode,
                std::time::Duration::from_millis(100),
                true,
            );
        }

        // Decode and forward any events from the callback
        while let Ok(tap_event) = callback_rx.try_recv() {
            let outgoing = match tap_event {
                TapEvent::Key { repeat: true, .. } => {
                    // Autorepeat KeyDown for a key already held: not a
                    // new physical press, skip it
                    continue;
                }
                TapEvent::Key { code, pressed, .. } => {
                    let key = key_name(code);
                    debug!(key = %key, pressed, "key event");
                    if pressed {
                        vec![CaptureEvent::KeyPressed(key)]
                    } else {
                        vec![CaptureEvent::KeyReleased(key)]
                    }
                }
                TapEvent::Flags(event_flags) => {
                    let next = Modifiers::from_flags(event_flags);
                    let changes = last_modifiers.diff(&next);
                    last_modifiers = next;
                    changes
                        .into_iter()
                        .map(|(key, pressed)| {
                            debug!(key, pressed, "modifier event");
                            if pressed {
                                CaptureEvent::KeyPressed(key.to_string())
                            } else {
                                CaptureEvent::KeyReleased(key.to_string())
                            }
                        })
                        .collect()
                }
                TapEvent::Disabled => vec![CaptureEvent::TapDisabled],
            };

            for event in outgoing {
                // blocking_send since we're not in an async context
                if event_tx.blocking_send(event).is_err() {
                    warn!("failed to send capture event - channel closed?");
                    return Ok(());
                }
            }
        }
    }

    // Tap is cleaned up when it goes out of scope

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_listener_creation() {
        let (tx, _rx) = mpsc::channel(32);
        let listener = KeyListener::new(tx);
        assert!(!listener.is_running());
    }
}
