//! Unix domain socket server for IPC
//!
//! Provides request-response communication and push notifications for
//! session events to subscribed clients. The server never owns the record
//! sequence; it tracks counters fed from the session event stream.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, error, info, warn};

use crate::events::SessionEvent;
use crate::recorder::SessionState;

use super::protocol::{Notification, RecorderStatus, Request, Response};

/// IPC Server handling client connections
pub struct Server {
    socket_path: PathBuf,
    listener: Option<UnixListener>,
    state: Arc<RwLock<ServerState>>,
    shutdown_tx: broadcast::Sender<()>,
    /// Session events fanned out to subscribed clients
    event_tx: broadcast::Sender<SessionEvent>,
}

/// Shared server state
struct ServerState {
    status: RecorderStatus,
    start_time: std::time::Instant,
}

impl Server {
    /// Create a new IPC server; `event_tx` is the session event channel
    /// that subscribed clients receive notifications from.
    pub fn new(socket_path: &Path, event_tx: broadcast::Sender<SessionEvent>) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = socket_path.parent() {
            std::fs::create_dir_all(parent).context("failed to create socket directory")?;
        }

        // Remove stale socket if it exists
        if socket_path.exists() {
            std::fs::remove_file(socket_path).context("failed to remove stale socket")?;
        }

        let listener = UnixListener::bind(socket_path).context("failed to bind Unix socket")?;

        // Set socket permissions to owner-only (0600)
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(socket_path, std::fs::Permissions::from_mode(0o600))?;
        }

        let (shutdown_tx, _) = broadcast::channel(1);

        let state = Arc::new(RwLock::new(ServerState {
            status: RecorderStatus::default(),
            start_time: std::time::Instant::now(),
        }));

        info!(?socket_path, "IPC server listening");

        Ok(Self {
            socket_path: socket_path.to_owned(),
            listener: Some(listener),
            state,
            shutdown_tx,
            event_tx,
        })
    }

    /// Update the recorder phase in server state
    pub async fn set_state(&self, session_state: SessionState) {
        let mut server_state = self.state.write().await;
        let old_phase = server_state.status.phase;
        server_state.status.phase = session_state.into();

        if old_phase != server_state.status.phase {
            info!(
                from = ?old_phase,
                to = ?server_state.status.phase,
                "IPC server: phase updated"
            );
        }
    }

    /// Record whether the event tap is delivering events
    pub async fn set_tap_active(&self, active: bool) {
        self.state.write().await.status.tap_active = active;
    }

    /// Update the record counters shown in status
    pub async fn set_counts(&self, events_recorded: u64, unmatched_releases: u64) {
        let mut server_state = self.state.write().await;
        server_state.status.events_recorded = events_recorded;
        server_state.status.unmatched_releases = unmatched_releases;
    }

    /// Run the server, accepting connections
    pub async fn run(&self) -> Result<()> {
        let listener = self.listener.as_ref().context("server not initialized")?;

        loop {
            match listener.accept().await {
                Ok((stream, _addr)) => {
                    debug!("client connected");
                    let state = Arc::clone(&self.state);
                    let event_rx = self.event_tx.subscribe();
                    let mut shutdown_rx = self.shutdown_tx.subscribe();

                    tokio::spawn(async move {
                        tokio::select! {
                            result = Self::handle_client(stream, state, event_rx) => {
                                if let Err(e) = result {
                                    warn!(?e, "client handler error");
                                }
                            }
                            _ = shutdown_rx.recv() => {
                                debug!("client handler shutting down");
                            }
                        }
                    });
                }
                Err(e) => {
                    error!(?e, "accept error");
                }
            }
        }
    }

    /// Handle a single client connection.
    ///
    /// The connection starts in request-response mode. A `Subscribe`
    /// request upgrades it to a push stream: from then on the server
    /// sends session event notifications until the session channel closes
    /// or the client goes away.
    async fn handle_client(
        mut stream: UnixStream,
        state: Arc<RwLock<ServerState>>,
        mut event_rx: broadcast::Receiver<SessionEvent>,
    ) -> Result<()> {
        let mut len_buf = [0u8; 4];

        // Request-response mode
        loop {
            match stream.read_exact(&mut len_buf).await {
                Ok(_) => {}
                Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                    debug!("client disconnected");
                    return Ok(());
                }
                Err(e) => return Err(e.into()),
            }

            let len = u32::from_le_bytes(len_buf) as usize;
            if len > 1024 * 1024 {
                warn!(len, "message too large, disconnecting");
                return Ok(());
            }

            // Read message body
            let mut msg_buf = vec![0u8; len];
            stream.read_exact(&mut msg_buf).await?;

            // Parse request
            let request: Request =
                serde_json::from_slice(&msg_buf).context("failed to parse request")?;

            debug!(?request, "received request");

            // Process request
            let (response, subscribe) = Self::process_request(request, &state).await;

            // Send response
            Self::send_message(&mut stream, &response).await?;

            if subscribe {
                debug!("client subscribed to notifications");
                break;
            }
        }

        // Push mode: stream session events until one side goes away
        loop {
            match event_rx.recv().await {
                Ok(event) => {
                    Self::send_message(&mut stream, &Notification::Event { event }).await?;
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(skipped = n, "client event receiver lagged");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!("session event channel closed, ending subscription");
                    return Ok(());
                }
            }
        }
    }

    /// Send a length-prefixed JSON message
    async fn send_message<T: serde::Serialize>(stream: &mut UnixStream, msg: &T) -> Result<()> {
        let msg_bytes = serde_json::to_vec(msg)?;
        let msg_len = (msg_bytes.len() as u32).to_le_bytes();

        stream.write_all(&msg_len).await?;
        stream.write_all(&msg_bytes).await?;

        Ok(())
    }

    /// Process a request and return a response
    /// Returns (Response, should_subscribe)
    async fn process_request(
        request: Request,
        state: &Arc<RwLock<ServerState>>,
    ) -> (Response, bool) {
        match request {
            Request::Ping => (Response::Pong, false),

            Request::GetStatus => {
                let mut state = state.write().await;
                state.status.uptime_secs = state.start_time.elapsed().as_secs();
                (Response::Status(state.status.clone()), false)
            }

            Request::Subscribe => (Response::Subscribed, true),
        }
    }

    /// Gracefully shutdown the server
    pub async fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());

        // Remove socket file
        if self.socket_path.exists() {
            if let Err(e) = std::fs::remove_file(&self.socket_path) {
                warn!(?e, "failed to remove socket file");
            }
        }

        info!("IPC server shutdown complete");
    }
}
