// ABOUTME: SSH tunnel for HTTP requests to a loopback-only service on a remote host.
// ABOUTME: Agent authentication, known_hosts verification, and per-connection channels.

mod agent;
mod client;
mod config;
mod dial;
mod error;
mod host_trust;

pub use agent::AgentCredential;
pub use client::{Response, TunnelClient, TunnelHandle, TunnelHandler};
pub use config::{
    Environment, SYSTEM_KNOWN_HOSTS, TrustMode, TunnelConfig, current_login_name,
    standard_known_hosts,
};
pub use dial::{ChannelDialer, LOOPBACK, TunnelStream};
pub use error::{Error, Result};
pub use host_trust::{EMPTY_SOURCE, HostTrust, KnownHosts};

