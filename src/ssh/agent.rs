// ABOUTME: Credential resolution through a running SSH agent.
// ABOUTME: Agent keys are the only supported authentication method.

use super::client::TunnelHandler;
use super::error::{Error, Result};
use russh::client::Handle;
use russh::keys::agent::client::AgentClient;
use std::path::Path;
use tokio::net::UnixStream;

/// Signing capability backed by an SSH agent connection.
pub struct AgentCredential {
    agent: AgentClient<UnixStream>,
}

impl std::fmt::Debug for AgentCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentCredential")
            .field("agent", &"<AgentClient>")
            .finish()
    }
}

impl AgentCredential {
    /// Connect to the agent listening on `socket`.
    pub async fn connect(socket: Option<&Path>) -> Result<Self> {
        let socket = socket.ok_or_else(|| {
            Error::AuthUnavailable("no agent socket configured (SSH_AUTH_SOCK unset)".to_string())
        })?;

        let stream = UnixStream::connect(socket).await.map_err(|e| {
            Error::AuthUnavailable(format!(
                "connecting to agent at {}: {}",
                socket.display(),
                e
            ))
        })?;

        tracing::debug!("connected to SSH agent at {}", socket.display());
        Ok(Self {
            agent: AgentClient::connect(stream),
        })
    }

    /// Offer each agent identity in turn until the server accepts one.
    ///
    /// Consumes the credential; the agent connection is not needed once the
    /// transport is authenticated.
    pub(crate) async fn authenticate(
        mut self,
        session: &mut Handle<TunnelHandler>,
        user: &str,
    ) -> Result<()> {
        let keys = self
            .agent
            .request_identities()
            .await
            .map_err(|e| Error::AuthUnavailable(format!("failed to list agent keys: {}", e)))?;

        if keys.is_empty() {
            return Err(Error::AuthUnavailable("no keys in SSH agent".to_string()));
        }

        for key in &keys {
            match session
                .authenticate_publickey_with(user, key.clone(), None, &mut self.agent)
                .await
            {
                Ok(result) if result.success() => {
                    tracing::debug!("authenticated as {} with {}", user, key.algorithm());
                    return Ok(());
                }
                Ok(_) => continue,
                Err(e) => {
                    tracing::debug!("agent key rejected: {}", e);
                    continue;
                }
            }
        }

        Err(Error::AuthenticationFailed {
            user: user.to_string(),
        })
    }
}
