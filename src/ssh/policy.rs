//! Host key trust policy
//!
//! Picks how unknown host keys are treated for one check:
//!
//! | known_hosts | bastion | policy              |
//! |-------------|---------|---------------------|
//! | present     | any     | `RejectUnknown`     |
//! | absent      | no      | `AutoAcceptUnknown` |
//! | absent      | yes     | refused             |
//!
//! A bastion hop never runs with `AutoAcceptUnknown`: the final host would be
//! authenticated through a machine whose identity was never checked.

use std::path::Path;
use std::sync::Arc;

use russh::keys::PublicKey;
use tracing::{info, warn};

use super::error::{SshError, VerifyError};
use super::known_hosts::{HostKeyVerification, KnownHostsStore};

/// How unknown host keys are treated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrustPolicy {
    /// Only keys present in the loaded known_hosts are accepted
    RejectUnknown,
    /// Unknown keys are accepted (trust on first use)
    AutoAcceptUnknown,
}

/// A resolved policy plus the trusted key set it checks against
#[derive(Debug, Clone)]
pub struct HostKeyPolicy {
    policy: TrustPolicy,
    trusted: Arc<KnownHostsStore>,
}

impl HostKeyPolicy {
    /// Select the policy for one check.
    ///
    /// The known_hosts file is opened before anything else so a missing
    /// file is reported as such, even with a bastion configured.
    pub fn resolve(
        known_hosts_path: Option<&Path>,
        bastion_configured: bool,
    ) -> Result<Self, VerifyError> {
        match known_hosts_path {
            Some(path) => {
                let trusted = KnownHostsStore::from_file(path).map_err(|source| {
                    VerifyError::KnownHostsNotFound {
                        path: path.to_path_buf(),
                        source,
                    }
                })?;
                Ok(Self {
                    policy: TrustPolicy::RejectUnknown,
                    trusted: Arc::new(trusted),
                })
            }
            None if bastion_configured => Err(VerifyError::MissingKnownHosts),
            None => Ok(Self::auto_accept()),
        }
    }

    /// Trust-on-first-use policy with an empty trusted set
    pub fn auto_accept() -> Self {
        Self {
            policy: TrustPolicy::AutoAcceptUnknown,
            trusted: Arc::new(KnownHostsStore::default()),
        }
    }

    pub fn strict(trusted: KnownHostsStore) -> Self {
        Self {
            policy: TrustPolicy::RejectUnknown,
            trusted: Arc::new(trusted),
        }
    }

    pub fn policy(&self) -> TrustPolicy {
        self.policy
    }

    /// Decide whether the key presented by host:port is acceptable.
    ///
    /// A key that differs from a recorded key of the same type is rejected
    /// under either policy.
    pub fn check(&self, host: &str, port: u16, key: &PublicKey) -> Result<(), SshError> {
        match self.trusted.verify(host, port, key) {
            HostKeyVerification::Verified => {
                info!("Host key verified for {}:{}", host, port);
                Ok(())
            }
            HostKeyVerification::Unknown { fingerprint } => match self.policy {
                TrustPolicy::AutoAcceptUnknown => {
                    info!(
                        "Accepting unknown host key for {}:{} (fingerprint: {})",
                        host, port, fingerprint
                    );
                    Ok(())
                }
                TrustPolicy::RejectUnknown => {
                    warn!(
                        "Unknown host key for {}:{} (fingerprint: {}), rejecting",
                        host, port, fingerprint
                    );
                    Err(SshError::HostKeyRejected(format!(
                        "{}:{} is not in known_hosts (fingerprint: {})",
                        host, port, fingerprint
                    )))
                }
            },
            HostKeyVerification::Changed {
                expected_fingerprint,
                actual_fingerprint,
            } => {
                warn!(
                    "HOST KEY CHANGED for {}:{}! Expected {}, got {}",
                    host, port, expected_fingerprint, actual_fingerprint
                );
                Err(SshError::HostKeyRejected(format!(
                    "key for {}:{} has changed (expected {}, got {})",
                    host, port, expected_fingerprint, actual_fingerprint
                )))
            }
        }
    }
}
