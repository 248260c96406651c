// ABOUTME: In-process SSH server and private ssh-agent for tunnel tests.
// ABOUTME: The server forwards direct-tcpip channels to the requested local address.

use super::backend::Backend;
use super::fixture;
use parking_lot::Mutex;
use remotehttp::ssh::TunnelConfig;
use russh::Channel;
use russh::keys::agent::client::AgentClient;
use russh::keys::{PrivateKey, PublicKey, load_secret_key};
use russh::server::{Auth, Msg, Server as _, Session};
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tempfile::TempDir;
use tokio::net::{TcpListener, TcpStream, UnixStream};
use tokio::process::Child;
use tokio::task::JoinHandle;

pub const TEST_USER: &str = "testuser";

pub fn load_key(name: &str) -> PrivateKey {
    load_secret_key(fixture(name), None).expect("fixture key should load")
}

/// `<algorithm> <base64>` of a fixture public key, without the comment.
pub fn public_key_line(name: &str) -> String {
    let contents = std::fs::read_to_string(fixture(&format!("{}.pub", name)))
        .expect("fixture public key should be readable");
    contents
        .split_whitespace()
        .take(2)
        .collect::<Vec<_>>()
        .join(" ")
}

/// A private ssh-agent holding the fixture client key.
pub struct TestAgent {
    pub socket: PathBuf,
    _child: Child,
    _dir: TempDir,
}

impl TestAgent {
    /// Start `ssh-agent` in the foreground on a temporary socket.
    /// Returns None when ssh-agent is not installed or fails to start.
    pub async fn start() -> Option<Self> {
        let dir = TempDir::new().ok()?;
        let socket = dir.path().join("agent.sock");
        let child = tokio::process::Command::new("ssh-agent")
            .arg("-D")
            .arg("-a")
            .arg(&socket)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .ok()?;

        let mut stream = None;
        for _ in 0..100 {
            if let Ok(s) = UnixStream::connect(&socket).await {
                stream = Some(s);
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }

        let mut agent = AgentClient::connect(stream?);
        agent
            .add_identity(&load_key("client_key"), &[])
            .await
            .ok()?;

        Some(Self {
            socket,
            _child: child,
            _dir: dir,
        })
    }
}

/// Counters shared between the server and the test.
#[derive(Default)]
pub struct ServerStats {
    /// Accepted TCP connections.
    pub connections: AtomicUsize,
    /// Session channels opened.
    pub sessions: AtomicUsize,
    /// Every direct-tcpip target requested, in order.
    pub dials: Mutex<Vec<(String, u32)>>,
}

#[derive(Clone)]
struct TestServer {
    allowed_key: PublicKey,
    stats: Arc<ServerStats>,
}

impl russh::server::Server for TestServer {
    type Handler = Self;

    fn new_client(&mut self, _: Option<std::net::SocketAddr>) -> Self::Handler {
        self.stats.connections.fetch_add(1, Ordering::SeqCst);
        self.clone()
    }
}

impl russh::server::Handler for TestServer {
    type Error = russh::Error;

    async fn auth_publickey(&mut self, _user: &str, key: &PublicKey) -> Result<Auth, Self::Error> {
        if key.key_data() == self.allowed_key.key_data() {
            Ok(Auth::Accept)
        } else {
            Ok(Auth::reject())
        }
    }

    async fn channel_open_session(
        &mut self,
        _channel: Channel<Msg>,
        _session: &mut Session,
    ) -> Result<bool, Self::Error> {
        self.stats.sessions.fetch_add(1, Ordering::SeqCst);
        Ok(true)
    }

    async fn channel_open_direct_tcpip(
        &mut self,
        channel: Channel<Msg>,
        host_to_connect: &str,
        port_to_connect: u32,
        _originator_address: &str,
        _originator_port: u32,
        _session: &mut Session,
    ) -> Result<bool, Self::Error> {
        self.stats
            .dials
            .lock()
            .push((host_to_connect.to_string(), port_to_connect));

        let Ok(mut upstream) =
            TcpStream::connect(format!("{}:{}", host_to_connect, port_to_connect)).await
        else {
            return Ok(false);
        };

        tokio::spawn(async move {
            let mut stream = Box::pin(channel.into_stream());
            let _ = tokio::io::copy_bidirectional(&mut stream, &mut upstream).await;
        });
        Ok(true)
    }
}

/// Running SSH server on 127.0.0.1.
pub struct SshServer {
    pub port: u16,
    pub stats: Arc<ServerStats>,
    task: JoinHandle<()>,
}

impl Drop for SshServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

impl SshServer {
    /// Start a server using the fixture host key, accepting only `allowed_key`.
    pub async fn start(allowed_key: PublicKey) -> Option<Self> {
        let server_config = Arc::new(russh::server::Config {
            auth_rejection_time: Duration::from_millis(0),
            auth_rejection_time_initial: Some(Duration::from_millis(0)),
            inactivity_timeout: Some(Duration::from_secs(30)),
            keys: vec![load_key("host_key")],
            ..Default::default()
        });

        let listener = TcpListener::bind(("127.0.0.1", 0)).await.ok()?;
        let port = listener.local_addr().ok()?.port();
        let stats = Arc::new(ServerStats::default());

        let mut server = TestServer {
            allowed_key,
            stats: Arc::clone(&stats),
        };
        let task = tokio::spawn(async move {
            let _ = server.run_on_socket(server_config, &listener).await;
        });

        Some(Self { port, stats, task })
    }

    pub fn dials(&self) -> Vec<(String, u32)> {
        self.stats.dials.lock().clone()
    }

    pub fn sessions(&self) -> usize {
        self.stats.sessions.load(Ordering::SeqCst)
    }

    pub fn connections(&self) -> usize {
        self.stats.connections.load(Ordering::SeqCst)
    }
}

/// Agent, SSH server, backend, and a known_hosts file trusting the server.
pub struct Harness {
    pub agent: TestAgent,
    pub server: SshServer,
    pub backend: Backend,
    pub known_hosts: PathBuf,
    _dir: TempDir,
}

impl Harness {
    /// Start everything with the server accepting the agent's key.
    pub async fn start() -> Option<Self> {
        let allowed = load_key("client_key").public_key().clone();
        Self::start_accepting(allowed).await
    }

    pub async fn start_accepting(allowed_key: PublicKey) -> Option<Self> {
        let agent = TestAgent::start().await?;
        let server = SshServer::start(allowed_key).await?;
        let backend = Backend::start().await?;

        let dir = TempDir::new().ok()?;
        let known_hosts = dir.path().join("known_hosts");
        write_known_hosts(&known_hosts, server.port, "host_key");

        Some(Self {
            agent,
            server,
            backend,
            known_hosts,
            _dir: dir,
        })
    }

    /// Tunnel config for this harness: agent auth, strict known_hosts, tunnel to the backend.
    pub fn config(&self) -> TunnelConfig {
        TunnelConfig::new("127.0.0.1", TEST_USER)
            .port(self.server.port)
            .target_port(self.backend.port)
            .agent_socket(&self.agent.socket)
            .known_hosts([&self.known_hosts])
            .request_timeout(Some(Duration::from_secs(10)))
    }
}

/// Write a known_hosts file with one record for `127.0.0.1:port`.
pub fn write_known_hosts(path: &std::path::Path, port: u16, key_name: &str) {
    let line = format!("[127.0.0.1]:{} {}\n", port, public_key_line(key_name));
    std::fs::write(path, line).expect("known_hosts should be writable");
}
