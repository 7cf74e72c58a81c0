//! SSH reachability verification
//!
//! Confirms the deployment target accepts the operator's key, directly or
//! through a bastion, before any deployment secret is published.
//!
//! # Flow
//! 1. Load the private key (no network I/O on failure)
//! 2. Resolve the host key policy (no network I/O on failure)
//! 3. Direct: authenticate to the target
//! 4. Bastion: authenticate to the jump host, tunnel, authenticate to the target
//!
//! There are no retries. Every session opened along the way is closed before
//! returning.

use std::time::Duration;

use serde::Serialize;
use tracing::{info, warn};

use super::client::connect_direct;
use super::config::VerifyRequest;
use super::error::VerifyError;
use super::keys::load_key_file;
use super::policy::HostKeyPolicy;
use super::proxy::connect_via_jump;

/// Outcome of one reachability check
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VerificationResult {
    pub success: bool,
    pub messages: Vec<String>,
}

impl VerificationResult {
    pub fn passed() -> Self {
        Self {
            success: true,
            messages: Vec::new(),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            messages: vec![message.into()],
        }
    }
}

impl From<Result<(), VerifyError>> for VerificationResult {
    fn from(result: Result<(), VerifyError>) -> Self {
        match result {
            Ok(()) => Self::passed(),
            Err(e) => Self::failed(e.to_string()),
        }
    }
}

/// Run one reachability check and report it as a [`VerificationResult`].
///
/// Never fails; every error becomes a message.
pub async fn verify(request: &VerifyRequest) -> VerificationResult {
    check(request).await.into()
}

/// Run one reachability check, keeping the typed error.
pub async fn check(request: &VerifyRequest) -> Result<(), VerifyError> {
    let key = load_key_file(&request.key_path)?;
    let jump = request.jump_target();
    let policy = HostKeyPolicy::resolve(request.known_hosts_path.as_deref(), jump.is_some())?;
    let timeout = Duration::from_secs(request.timeout_secs);
    let target = request.primary_target();

    info!(
        "Verifying SSH access to {} with {} key ({:?})",
        target,
        key.algorithm(),
        policy.policy()
    );

    match jump {
        None => {
            let mut session = connect_direct(&target, &key, &policy, timeout)
                .await
                .map_err(|source| {
                    warn!("SSH verification of {} failed: {}", target, source);
                    VerifyError::ConnectionFailed {
                        target: target.to_string(),
                        source,
                    }
                })?;
            session.close().await;
        }
        Some(jump) => {
            let connection = connect_via_jump(&jump, &target, &key, &policy, timeout)
                .await
                .inspect_err(|e| warn!("SSH verification of {} failed: {}", target, e))?;
            connection.close().await;
        }
    }

    info!("SSH access to {} verified", target);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;

    #[test]
    fn test_result_constructors() {
        let passed = VerificationResult::passed();
        assert!(passed.success);
        assert!(passed.messages.is_empty());

        let failed = VerificationResult::failed("nope");
        assert!(!failed.success);
        assert_eq!(failed.messages, vec!["nope".to_string()]);
    }

    #[tokio::test]
    async fn test_missing_key_fails_before_network() {
        let temp = tempfile::tempdir().unwrap();
        let request = VerifyRequest::new("127.0.0.1", "deploy", temp.path().join("id_missing"))
            .port(1);

        let err = check(&request).await.unwrap_err();
        assert!(matches!(err, VerifyError::KeyFileNotFound { .. }));

        let result = verify(&request).await;
        assert!(!result.success);
        assert_eq!(result.messages.len(), 1);
        assert!(result.messages[0].contains("Could not find SSH key file"));
    }

    #[tokio::test]
    async fn test_bastion_without_known_hosts_never_connects() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.set_nonblocking(true).unwrap();
        let port = listener.local_addr().unwrap().port();

        let key_path = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/keys/id_ed25519");
        let request = VerifyRequest::new("127.0.0.1", "deploy", key_path)
            .port(port)
            .jump_host("127.0.0.1")
            .jump_port(port);

        let err = check(&request).await.unwrap_err();
        assert!(matches!(err, VerifyError::MissingKnownHosts));
        assert!(listener.accept().is_err());
    }

    #[tokio::test]
    async fn test_invalid_key_fails_before_policy() {
        let temp = tempfile::tempdir().unwrap();
        let key_path = temp.path().join("id_bogus");
        std::fs::write(&key_path, "not a key").unwrap();

        let request = VerifyRequest::new("127.0.0.1", "deploy", &key_path)
            .jump_host("bastion.invalid");

        let err = check(&request).await.unwrap_err();
        assert!(matches!(err, VerifyError::InvalidKeyFormat { .. }));
    }

    #[tokio::test]
    async fn test_refused_connection_is_primary_failure() {
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };

        let key_path = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/keys/id_ed25519");
        let request = VerifyRequest::new("127.0.0.1", "deploy", key_path)
            .port(port)
            .timeout_secs(5);

        let result = verify(&request).await;
        assert!(!result.success);
        assert!(result.messages[0].starts_with("SSH connection to deploy@127.0.0.1"));
        assert!(!result.messages[0].to_lowercase().contains("jump"));
    }
}
