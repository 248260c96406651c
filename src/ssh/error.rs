// ABOUTME: Tunnel-specific error types.
// ABOUTME: Covers agent, host key, transport, channel, and HTTP exchange failures.

use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("SSH agent not available: {0}")]
    AuthUnavailable(String),

    #[error("authentication failed for user {user}: no agent key was accepted")]
    AuthenticationFailed { user: String },

    #[error("host key for {host}:{port} rejected by host trust policy")]
    HostKeyRejected { host: String, port: u16 },

    #[error("connection failed: {0}")]
    Transport(String),

    #[error("failed to open keep-alive session: {0}")]
    KeepAlive(String),

    #[error("failed to open channel to 127.0.0.1:{port} on remote: {reason}")]
    ChannelOpen { port: u16, reason: String },

    #[error("tunnel is closed")]
    Closed,

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("HTTP request failed: {0}")]
    Http(#[from] hyper_util::client::legacy::Error),

    #[error("failed to read response body: {0}")]
    Body(#[from] hyper::Error),

    #[error("request timed out after {0:?}")]
    Timeout(Duration),
}

impl Error {
    /// True for failures of the SSH transport itself: dial, keep-alive session, or channel open.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Error::Transport(_) | Error::KeepAlive(_) | Error::ChannelOpen { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
