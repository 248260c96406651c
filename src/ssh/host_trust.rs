// ABOUTME: Host trust policy for remote SSH host keys.
// ABOUTME: Verifies against known_hosts records, or explicitly accepts any key.

use super::config::TrustMode;
use russh::keys::known_hosts::check_known_hosts_path;
use russh::keys::ssh_key;
use std::path::{Path, PathBuf};

/// Source substituted when no known_hosts candidate exists. Holds no records.
pub const EMPTY_SOURCE: &str = "/dev/null";

/// Decides whether a presented host key is acceptable.
///
/// Built once per connection attempt and never changed afterwards.
#[derive(Debug, Clone)]
pub enum HostTrust {
    KnownHosts(KnownHosts),
    AcceptAny,
}

impl HostTrust {
    pub fn from_mode(mode: &TrustMode) -> Self {
        match mode {
            TrustMode::KnownHosts(candidates) => {
                HostTrust::KnownHosts(KnownHosts::from_candidates(candidates))
            }
            TrustMode::InsecureAcceptAny => HostTrust::AcceptAny,
        }
    }

    pub fn is_insecure(&self) -> bool {
        matches!(self, HostTrust::AcceptAny)
    }

    pub fn verify(&self, host: &str, port: u16, key: &ssh_key::PublicKey) -> bool {
        match self {
            HostTrust::KnownHosts(known_hosts) => known_hosts.verify(host, port, key),
            HostTrust::AcceptAny => {
                tracing::warn!(
                    "accepting host key for {}:{} without verification",
                    host,
                    port
                );
                true
            }
        }
    }
}

/// Known_hosts files that existed when the policy was built.
#[derive(Debug, Clone)]
pub struct KnownHosts {
    paths: Vec<PathBuf>,
}

impl KnownHosts {
    /// Keep the candidates that exist on disk, in order. With none left, fall back to
    /// [`EMPTY_SOURCE`] so every host is treated as unknown.
    pub fn from_candidates<P: AsRef<Path>>(candidates: &[P]) -> Self {
        let mut paths: Vec<PathBuf> = candidates
            .iter()
            .map(|p| p.as_ref())
            .filter(|p| p.exists())
            .map(Path::to_path_buf)
            .collect();

        if paths.is_empty() {
            tracing::debug!("no known_hosts files found, no host will be trusted");
            paths.push(PathBuf::from(EMPTY_SOURCE));
        }

        Self { paths }
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    /// Accept the key if any file has a matching record for `host:port`.
    /// A record for the host with a different key rejects outright.
    pub fn verify(&self, host: &str, port: u16, key: &ssh_key::PublicKey) -> bool {
        for path in &self.paths {
            match check_known_hosts_path(host, port, key, path) {
                Ok(true) => return true,
                Ok(false) => {}
                Err(russh::keys::Error::KeyChanged { line }) => {
                    tracing::warn!(
                        "host key for {}:{} does not match {}:{}",
                        host,
                        port,
                        path.display(),
                        line
                    );
                    return false;
                }
                Err(e) => {
                    tracing::debug!("skipping known_hosts file {}: {}", path.display(), e);
                }
            }
        }
        false
    }
}
