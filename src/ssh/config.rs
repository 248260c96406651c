// ABOUTME: Tunnel configuration and the process environment it is built from.
// ABOUTME: The environment is read once here; nothing else in the crate touches it.

use nix::unistd::{Uid, User};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// System-wide known_hosts file, consulted after the user's own.
pub const SYSTEM_KNOWN_HOSTS: &str = "/etc/ssh/ssh_known_hosts";

/// Values sourced from the process environment at the program boundary.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Environment {
    /// Path of the SSH agent socket (`SSH_AUTH_SOCK`).
    pub agent_socket: Option<PathBuf>,
    /// User home directory (`HOME`).
    pub home: Option<PathBuf>,
    /// Local login name: `USER`, else the passwd entry of the current uid.
    pub user: Option<String>,
}

impl Environment {
    /// Capture `SSH_AUTH_SOCK`, `HOME` and the login name. Empty values count as unset.
    pub fn from_process() -> Self {
        Self {
            agent_socket: non_empty_var("SSH_AUTH_SOCK"),
            home: non_empty_var("HOME"),
            user: non_empty_var("USER")
                .and_then(|user| user.into_os_string().into_string().ok())
                .or_else(current_login_name),
        }
    }
}

/// Login name of the current uid. Works where `USER` is not exported (cron, containers).
pub fn current_login_name() -> Option<String> {
    match User::from_uid(Uid::current()) {
        Ok(Some(user)) => Some(user.name),
        Ok(None) => None,
        Err(e) => {
            tracing::debug!("looking up current user: {}", e);
            None
        }
    }
}

fn non_empty_var(name: &str) -> Option<PathBuf> {
    std::env::var_os(name)
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
}

/// Conventional known_hosts candidates, user file first.
pub fn standard_known_hosts(home: Option<&Path>) -> Vec<PathBuf> {
    let mut paths = Vec::with_capacity(2);
    if let Some(home) = home {
        paths.push(home.join(".ssh").join("known_hosts"));
    }
    paths.push(PathBuf::from(SYSTEM_KNOWN_HOSTS));
    paths
}

/// How the remote host key is checked. Exactly one mode applies per connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrustMode {
    /// Verify against known_hosts records from these candidate files, in order.
    /// Candidates that do not exist when the connection starts are skipped.
    KnownHosts(Vec<PathBuf>),
    /// Accept any host key. Insecure; must be chosen explicitly.
    InsecureAcceptAny,
}

impl Default for TrustMode {
    fn default() -> Self {
        TrustMode::KnownHosts(standard_known_hosts(None))
    }
}

/// Configuration for opening a tunnel.
#[derive(Debug, Clone)]
pub struct TunnelConfig {
    /// Remote host to connect to.
    pub host: String,
    /// SSH port (default: 22).
    pub port: u16,
    /// Username for authentication.
    pub user: String,
    /// Loopback port on the remote host where the HTTP service listens (default: 8080).
    pub target_port: u16,
    /// SSH agent socket. If None, authentication is unavailable.
    pub agent_socket: Option<PathBuf>,
    /// Host key verification mode.
    pub host_trust: TrustMode,
    /// Bound on a whole HTTP exchange, dial included. None means unbounded (default: 60s).
    pub request_timeout: Option<Duration>,
    /// SSH keepalive interval for the transport (default: 30s).
    pub keepalive_interval: Option<Duration>,
}

impl TunnelConfig {
    pub fn new(host: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: 22,
            user: user.into(),
            target_port: 8080,
            agent_socket: None,
            host_trust: TrustMode::default(),
            request_timeout: Some(Duration::from_secs(60)),
            keepalive_interval: Some(Duration::from_secs(30)),
        }
    }

    /// Take the agent socket from a captured environment. The default known_hosts
    /// candidates gain the user's file; an explicitly chosen trust mode is kept.
    pub fn with_environment(mut self, env: &Environment) -> Self {
        self.agent_socket = env.agent_socket.clone();
        if self.host_trust == TrustMode::default() {
            self.host_trust = TrustMode::KnownHosts(standard_known_hosts(env.home.as_deref()));
        }
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn target_port(mut self, port: u16) -> Self {
        self.target_port = port;
        self
    }

    pub fn agent_socket(mut self, path: impl Into<PathBuf>) -> Self {
        self.agent_socket = Some(path.into());
        self
    }

    pub fn known_hosts<I, P>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.host_trust = TrustMode::KnownHosts(paths.into_iter().map(Into::into).collect());
        self
    }

    pub fn insecure_accept_any_host(mut self) -> Self {
        self.host_trust = TrustMode::InsecureAcceptAny;
        self
    }

    pub fn request_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn keepalive_interval(mut self, interval: Option<Duration>) -> Self {
        self.keepalive_interval = interval;
        self
    }
}
