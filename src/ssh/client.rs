//! SSH client sessions using russh
//!
//! A session is established over any byte stream: a TCP socket for a direct
//! hop, or a direct-tcpip channel for a hop behind a bastion. Either way the
//! host key goes through the resolved [`HostKeyPolicy`] and authentication
//! uses exactly one private key.

use std::sync::Arc;
use std::time::Duration;

use russh::client::{self, Handle};
use russh::keys::key::PrivateKeyWithHashAlg;
use russh::keys::PublicKey;
use russh::Disconnect;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tracing::{debug, info};

use super::config::ConnectionTarget;
use super::error::SshError;
use super::keys::{KeyAlgorithm, PrivateKeyMaterial};
use super::policy::HostKeyPolicy;

/// Client handler for russh callbacks
///
/// Only host key verification is handled; verification sessions never
/// accept server-initiated channels.
pub struct ClientHandler {
    host: String,
    port: u16,
    policy: HostKeyPolicy,
}

impl ClientHandler {
    pub fn new(host: String, port: u16, policy: HostKeyPolicy) -> Self {
        Self { host, port, policy }
    }
}

impl client::Handler for ClientHandler {
    type Error = SshError;

    async fn check_server_key(
        &mut self,
        server_public_key: &PublicKey,
    ) -> Result<bool, Self::Error> {
        self.policy
            .check(&self.host, self.port, server_public_key)
            .map(|()| true)
    }
}

/// An authenticated SSH session that is closed when it goes away.
///
/// Prefer [`SessionGuard::close`], which sends a proper disconnect. Dropping
/// an open guard still tears the connection down, just without the goodbye.
pub struct SessionGuard {
    handle: Option<Handle<ClientHandler>>,
    target: ConnectionTarget,
}

impl SessionGuard {
    fn new(handle: Handle<ClientHandler>, target: ConnectionTarget) -> Self {
        Self {
            handle: Some(handle),
            target,
        }
    }

    pub fn target(&self) -> &ConnectionTarget {
        &self.target
    }

    pub fn is_closed(&self) -> bool {
        self.handle.is_none()
    }

    pub(crate) fn handle(&self) -> Result<&Handle<ClientHandler>, SshError> {
        self.handle
            .as_ref()
            .ok_or_else(|| SshError::ChannelError(format!("session to {} is closed", self.target)))
    }

    /// Disconnect. Safe to call more than once.
    pub async fn close(&mut self) {
        if let Some(handle) = self.handle.take() {
            debug!("Closing SSH session to {}", self.target);
            if let Err(e) = handle
                .disconnect(Disconnect::ByApplication, "", "en")
                .await
            {
                debug!("Disconnect from {} failed: {}", self.target, e);
            }
        }
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        if self.handle.is_some() {
            debug!("Dropping open SSH session to {}", self.target);
        }
    }
}

fn client_config(timeout: Duration) -> client::Config {
    client::Config {
        inactivity_timeout: Some(timeout),
        ..Default::default()
    }
}

/// Handshake and authenticate over an already-open stream.
///
/// `timeout` bounds the handshake and authentication together.
pub async fn establish_session<S>(
    stream: S,
    target: &ConnectionTarget,
    key: &PrivateKeyMaterial,
    policy: &HostKeyPolicy,
    timeout: Duration,
) -> Result<SessionGuard, SshError>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let config = Arc::new(client_config(timeout));
    let handler = ClientHandler::new(target.host.clone(), target.port, policy.clone());

    let handshake = async {
        let mut handle = client::connect_stream(config, stream, handler).await?;
        debug!("SSH handshake with {} completed", target);

        if let Err(e) = authenticate(&mut handle, &target.username, key).await {
            let _ = handle
                .disconnect(Disconnect::ByApplication, "", "en")
                .await;
            return Err(e);
        }
        Ok::<_, SshError>(handle)
    };

    let handle = tokio::time::timeout(timeout, handshake)
        .await
        .map_err(|_| {
            SshError::Timeout(format!(
                "SSH handshake with {} timed out after {}s",
                target,
                timeout.as_secs()
            ))
        })??;

    info!("Authenticated to {}", target);
    Ok(SessionGuard::new(handle, target.clone()))
}

/// Open a TCP connection to `target` and establish a session over it.
pub async fn connect_direct(
    target: &ConnectionTarget,
    key: &PrivateKeyMaterial,
    policy: &HostKeyPolicy,
    timeout: Duration,
) -> Result<SessionGuard, SshError> {
    let addr = format!("{}:{}", target.host, target.port);
    info!("Connecting to SSH server at {}", addr);

    let stream = tokio::time::timeout(
        timeout,
        TcpStream::connect((target.host.as_str(), target.port)),
    )
    .await
    .map_err(|_| SshError::Timeout(format!("Connection to {} timed out", addr)))?
    .map_err(|e| SshError::ConnectionFailed(format!("Failed to connect to {}: {}", addr, e)))?;

    establish_session(stream, target, key, policy, timeout).await
}

async fn authenticate(
    handle: &mut Handle<ClientHandler>,
    username: &str,
    key: &PrivateKeyMaterial,
) -> Result<(), SshError> {
    // rsa-sha2-* when the server advertises it, ssh-rsa otherwise
    let hash_alg = match key.algorithm() {
        KeyAlgorithm::Rsa => handle.best_supported_rsa_hash().await?.flatten(),
        _ => None,
    };

    let key_with_hash = PrivateKeyWithHashAlg::new(key.key(), hash_alg);
    let authenticated = handle
        .authenticate_publickey(username, key_with_hash)
        .await
        .map_err(|e| SshError::AuthenticationFailed(e.to_string()))?;

    if !authenticated.success() {
        return Err(SshError::AuthenticationFailed(format!(
            "{} key rejected for user {}",
            key.algorithm(),
            username
        )));
    }
    Ok(())
}
