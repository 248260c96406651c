// ABOUTME: Tunnel connection management using russh and hyper-util.
// ABOUTME: Connects, authenticates, keeps the transport alive, and tears it down.

use super::agent::AgentCredential;
use super::config::TunnelConfig;
use super::dial::ChannelDialer;
use super::error::{Error, Result};
use super::host_trust::HostTrust;
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::header::CONTENT_TYPE;
use hyper::{HeaderMap, Request, StatusCode};
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use russh::client::{self, Config, Handle, Msg};
use russh::keys::ssh_key;
use russh::{Channel, Disconnect};
use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// HTTP client whose connections are channels inside the tunnel.
pub type TunnelClient = Client<ChannelDialer, Full<Bytes>>;

/// SSH client handler for russh.
pub struct TunnelHandler {
    host: String,
    port: u16,
    trust: HostTrust,
    /// Set when the host key is refused, so the connect error can be classified.
    rejected: Arc<AtomicBool>,
}

impl TunnelHandler {
    fn new(host: String, port: u16, trust: HostTrust, rejected: Arc<AtomicBool>) -> Self {
        Self {
            host,
            port,
            trust,
            rejected,
        }
    }
}

impl client::Handler for TunnelHandler {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        server_public_key: &ssh_key::PublicKey,
    ) -> std::result::Result<bool, Self::Error> {
        let accepted = self.trust.verify(&self.host, self.port, server_public_key);
        if !accepted {
            self.rejected.store(true, Ordering::SeqCst);
        }
        Ok(accepted)
    }
}

/// Response from the tunneled service, returned as received.
#[derive(Debug, Clone)]
pub struct Response {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl Response {
    /// Body decoded as UTF-8, with invalid sequences replaced.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Media type of the body without parameters, if exactly one Content-Type header is present.
    pub fn content_type(&self) -> Option<&str> {
        let mut values = self.headers.get_all(CONTENT_TYPE).iter();
        let value = values.next()?;
        if values.next().is_some() {
            return None;
        }
        let value = value.to_str().ok()?;
        Some(value.split(';').next().unwrap_or(value).trim())
    }
}

/// An open tunnel to an HTTP service on the remote host's loopback interface.
///
/// Owns the SSH transport, one keep-alive session, and the HTTP client that dials
/// through the transport. [`close`](Self::close) releases them in that reverse order.
pub struct TunnelHandle {
    host: String,
    target_port: u16,
    request_timeout: Option<Duration>,
    http: Option<TunnelClient>,
    keepalive: Option<Channel<Msg>>,
    transport: Option<Arc<Handle<TunnelHandler>>>,
}

impl std::fmt::Debug for TunnelHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TunnelHandle")
            .field("host", &self.host)
            .field("target_port", &self.target_port)
            .field("request_timeout", &self.request_timeout)
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl TunnelHandle {
    /// Connect to the remote host and prepare an HTTP client that tunnels to the target port.
    ///
    /// Single attempt: failures are returned without retry, and nothing is left open.
    pub async fn connect(config: &TunnelConfig) -> Result<Self> {
        let trust = HostTrust::from_mode(&config.host_trust);
        if trust.is_insecure() {
            tracing::warn!(
                "host key verification disabled for {}:{}",
                config.host,
                config.port
            );
        }

        let credential = AgentCredential::connect(config.agent_socket.as_deref()).await?;

        let russh_config = Config {
            inactivity_timeout: None,
            keepalive_interval: config.keepalive_interval,
            ..Default::default()
        };

        let rejected = Arc::new(AtomicBool::new(false));
        let handler = TunnelHandler::new(
            config.host.clone(),
            config.port,
            trust,
            Arc::clone(&rejected),
        );

        tracing::debug!("connecting to {}:{}", config.host, config.port);
        let mut session = client::connect(
            Arc::new(russh_config),
            (config.host.as_str(), config.port),
            handler,
        )
        .await
        .map_err(|e| {
            connect_error(e, &config.host, config.port, rejected.load(Ordering::SeqCst))
        })?;

        if let Err(e) = credential.authenticate(&mut session, &config.user).await {
            disconnect(&session).await;
            return Err(e);
        }

        // Some servers drop a transport with no open channel, so hold a session for its lifetime.
        let keepalive = match session.channel_open_session().await {
            Ok(channel) => channel,
            Err(e) => {
                disconnect(&session).await;
                return Err(Error::KeepAlive(e.to_string()));
            }
        };

        let transport = Arc::new(session);
        let dialer = ChannelDialer::new(Arc::clone(&transport), config.target_port);
        let http: TunnelClient = Client::builder(TokioExecutor::new()).build(dialer);

        tracing::debug!(
            "tunnel to {}:{} via {} ready",
            super::dial::LOOPBACK,
            config.target_port,
            config.host
        );

        Ok(Self {
            host: config.host.clone(),
            target_port: config.target_port,
            request_timeout: config.request_timeout,
            http: Some(http),
            keepalive: Some(keepalive),
            transport: Some(transport),
        })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn target_port(&self) -> u16 {
        self.target_port
    }

    pub fn is_closed(&self) -> bool {
        self.http.is_none()
    }

    /// The tunneled HTTP client, or None after [`close`](Self::close).
    pub fn http(&self) -> Option<&TunnelClient> {
        self.http.as_ref()
    }

    /// A dialer bound to this tunnel's transport, or None after [`close`](Self::close).
    pub fn dialer(&self) -> Option<ChannelDialer> {
        let transport = self.transport.as_ref()?;
        Some(ChannelDialer::new(Arc::clone(transport), self.target_port))
    }

    /// Send a GET request. Only the path and query of `url` reach the service.
    pub async fn get(&self, url: &str) -> Result<Response> {
        let request = Request::get(url)
            .body(Full::new(Bytes::new()))
            .map_err(|e| Error::InvalidRequest(format!("{}: {}", url, e)))?;
        self.send(request).await
    }

    /// Send a request through the tunnel and collect the full response.
    ///
    /// The status code is not interpreted; a 4xx or 5xx response is a successful result.
    pub async fn send(&self, request: Request<Full<Bytes>>) -> Result<Response> {
        let http = self.http.as_ref().ok_or(Error::Closed)?;

        match self.request_timeout {
            Some(timeout) => tokio::time::timeout(timeout, exchange(http, request))
                .await
                .map_err(|_| Error::Timeout(timeout))?,
            None => exchange(http, request).await,
        }
    }

    /// Release the HTTP client, then the keep-alive session, then the transport.
    ///
    /// Idempotent; errors while closing are logged and otherwise ignored.
    pub async fn close(&mut self) {
        self.http = None;

        if let Some(keepalive) = self.keepalive.take() {
            if let Err(e) = keepalive.close().await {
                tracing::debug!("closing keep-alive session: {}", e);
            }
        }

        if let Some(transport) = self.transport.take() {
            disconnect(&transport).await;
        }
    }
}

/// Classify a failed transport dial. A host key refused by the handler wins over
/// whatever error russh surfaced for it.
fn connect_error(e: russh::Error, host: &str, port: u16, key_rejected: bool) -> Error {
    match e {
        _ if key_rejected => Error::HostKeyRejected {
            host: host.to_string(),
            port,
        },
        russh::Error::UnknownKey => Error::HostKeyRejected {
            host: host.to_string(),
            port,
        },
        russh::Error::IO(ref cause) if cause.kind() == io::ErrorKind::ConnectionRefused => {
            Error::Transport(format!("connection refused to {}:{}", host, port))
        }
        e => Error::Transport(format!("{}:{}: {}", host, port, e)),
    }
}

async fn exchange(http: &TunnelClient, request: Request<Full<Bytes>>) -> Result<Response> {
    tracing::debug!("{} {}", request.method(), request.uri());
    let response = http.request(request).await?;
    let (parts, body) = response.into_parts();
    let body = body.collect().await?.to_bytes();

    Ok(Response {
        status: parts.status,
        headers: parts.headers,
        body,
    })
}

async fn disconnect(transport: &Handle<TunnelHandler>) {
    if let Err(e) = transport
        .disconnect(Disconnect::ByApplication, "", "en")
        .await
    {
        tracing::debug!("disconnecting transport: {}", e);
    }
}
