//! Host key fetch
//!
//! Trust-on-first-use capture of a server's host key, used to build a
//! known_hosts line when the operator supplied none.
//!
//! # Flow
//! 1. Start an SSH handshake to host:port
//! 2. Capture the host key in `check_server_key`
//! 3. Abort the handshake; no authentication is attempted
//! 4. Format `<host-pattern> <key-algorithm> <base64-key>`

use std::sync::Arc;
use std::time::Duration;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use russh::client::{self, Config};
use russh::keys::{PublicKey, PublicKeyBase64};
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::error::SshError;
use super::known_hosts::KnownHostsStore;

/// Handler that captures the host key and aborts the connection
struct PreflightHandler {
    host: String,
    port: u16,
    captured: Arc<Mutex<Option<PublicKey>>>,
}

impl client::Handler for PreflightHandler {
    type Error = SshError;

    async fn check_server_key(
        &mut self,
        server_public_key: &PublicKey,
    ) -> Result<bool, Self::Error> {
        info!(
            "Preflight: captured {} host key for {}:{} ({})",
            server_public_key.algorithm().as_str(),
            self.host,
            self.port,
            KnownHostsStore::fingerprint(server_public_key)
        );
        *self.captured.lock().await = Some(server_public_key.clone());

        // Abort: only the key was wanted
        Err(SshError::ConnectionFailed("Preflight check complete".to_string()))
    }
}

/// Format a known_hosts line for `key` as presented by host:port.
///
/// The host field is lowercased, as OpenSSH writes it; lookups in
/// [`KnownHostsStore`] are case-insensitive either way.
pub fn known_hosts_line(host: &str, port: u16, key: &PublicKey) -> String {
    format!(
        "{} {} {}",
        KnownHostsStore::host_pattern(host, port),
        key.algorithm().as_str(),
        BASE64.encode(key.public_key_bytes())
    )
}

/// Learn the host key of host:port without authenticating.
pub async fn fetch_host_key(
    host: &str,
    port: u16,
    timeout_secs: u64,
) -> Result<PublicKey, SshError> {
    debug!("Starting preflight check for {}:{}", host, port);

    let captured = Arc::new(Mutex::new(None));
    let handler = PreflightHandler {
        host: host.to_string(),
        port,
        captured: captured.clone(),
    };

    let ssh_config = Config {
        inactivity_timeout: Some(Duration::from_secs(timeout_secs)),
        ..Default::default()
    };

    // Expected to fail once the key has been captured
    let connect_result = tokio::time::timeout(
        Duration::from_secs(timeout_secs),
        client::connect(Arc::new(ssh_config), (host, port), handler),
    )
    .await;

    if let Some(key) = captured.lock().await.take() {
        return Ok(key);
    }

    match connect_result {
        Ok(Ok(_)) => Err(SshError::ProtocolError(
            "handshake completed without presenting a host key".to_string(),
        )),
        Ok(Err(e)) => Err(e),
        Err(_) => Err(SshError::Timeout(format!(
            "Host key fetch from {}:{} timed out after {}s",
            host, port, timeout_secs
        ))),
    }
}

/// Fetch the host key of host:port as a known_hosts line.
pub async fn fetch_known_hosts_line(
    host: &str,
    port: u16,
    timeout_secs: u64,
) -> Result<String, SshError> {
    let key = fetch_host_key(host, port, timeout_secs).await?;
    Ok(known_hosts_line(host, port, &key))
}
