//! IPC module for daemon-client communication

mod protocol;
mod server;

pub use protocol::{Notification, Phase, RecorderStatus, Request, Response};
pub use server::Server;
