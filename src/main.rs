//! keytrace-daemon: Background daemon that records global keyboard events
//!
//! The daemon attaches to the session event tap and records every key
//! press and release, stamped with elapsed seconds since recording start:
//! - Global key capture via CGEventTap
//! - In-memory recording session with exit-combination detection
//! - IPC server for status queries and live session event notifications
//!
//! Recording runs until the exit combination (default "q" + "esc", both
//! held) is seen or a shutdown signal arrives; the recorded sequence is
//! then emitted as JSON on stdout.

mod capture;
mod config;
mod events;
mod ipc;
mod lifecycle;
mod recorder;

use anyhow::Result;
use tokio::sync::{broadcast, mpsc};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::capture::{InputSource, KeyListener};
use crate::config::Config;
use crate::events::SessionEvent;
use crate::ipc::Server;
use crate::lifecycle::ShutdownSignal;
use crate::recorder::{RecordingSession, SessionState};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging; stdout is reserved for the recorded sequence
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "keytrace-daemon starting"
    );

    // Load configuration
    let config = Config::load()?;
    config.ensure_dirs()?;
    info!(?config.socket_path, exit_combo = %config.exit_combo, "configuration loaded");

    // Create shutdown signal handler
    let shutdown = ShutdownSignal::new();

    // Create channels for inter-component communication
    // Key listener -> recording session
    let (capture_tx, capture_rx) = mpsc::channel(256);
    // Recording session -> IPC server (for broadcasting session events)
    let (event_tx, _event_rx) = broadcast::channel::<SessionEvent>(256);

    // Create the recording session; its clock starts here
    let session = RecordingSession::new(event_tx.clone(), config.exit_combo.clone());

    // Create and start the key listener (runs on dedicated thread)
    let listener = KeyListener::new(capture_tx);
    let tap_active = match listener.start() {
        Ok(()) => {
            info!("key listener started");
            true
        }
        Err(e) => {
            error!(?e, "failed to start key listener");
            warn!("continuing without key capture - check Accessibility permissions");
            false
        }
    };

    // Create IPC server; subscribed clients get session events pushed
    let server = Server::new(&config.socket_path, event_tx.clone())?;
    server.set_tap_active(tap_active).await;

    // Subscribe to session events for status counter updates
    let mut status_event_rx = event_tx.subscribe();
    let server_for_events = &server;

    info!("daemon initialized, recording");

    // Main event loop
    tokio::select! {
        // Run the recording session until the exit combination is held
        records = session.run(capture_rx) => {
            info!(events = records.len(), "recording complete");
            match serde_json::to_string_pretty(&records) {
                Ok(json) => println!("{}", json),
                Err(e) => error!(?e, "failed to serialize records"),
            }
        }

        // Run the IPC server (accepts client connections)
        result = server.run() => {
            if let Err(e) = result {
                error!(?e, "IPC server error");
            }
        }

        // Mirror session events into the IPC status snapshot
        _ = async {
            let mut events_recorded: u64 = 0;
            let mut unmatched_releases: u64 = 0;

            loop {
                match status_event_rx.recv().await {
                    Ok(event) => {
                        match event {
                            SessionEvent::RecordingStarted => {
                                server_for_events.set_state(SessionState::Recording).await;
                            }
                            SessionEvent::EventRecorded { .. } => {
                                events_recorded += 1;
                                server_for_events
                                    .set_counts(events_recorded, unmatched_releases)
                                    .await;
                            }
                            SessionEvent::UnmatchedRelease { .. } => {
                                unmatched_releases += 1;
                                server_for_events
                                    .set_counts(events_recorded, unmatched_releases)
                                    .await;
                            }
                            SessionEvent::RecordingStopped {
                                event_count,
                                unmatched_releases: unmatched,
                                ..
                            } => {
                                server_for_events
                                    .set_counts(event_count as u64, unmatched)
                                    .await;
                                server_for_events.set_state(SessionState::Stopped).await;
                            }
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!(skipped = n, "status event receiver lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        break;
                    }
                }
            }
        } => {
            info!("status event handler exited");
        }

        // Wait for shutdown signal
        signal = shutdown.wait() => {
            info!(signal, "shutdown signal received");
        }
    }

    // Cleanup
    info!("shutting down...");

    listener.stop();
    server.shutdown().await;

    info!("keytrace-daemon stopped");

    Ok(())
}
