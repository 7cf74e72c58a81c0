//! SSH Configuration

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// A host to authenticate against
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionTarget {
    pub host: String,
    pub port: u16,
    pub username: String,
}

impl ConnectionTarget {
    pub fn new(host: impl Into<String>, port: u16, username: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port,
            username: username.into(),
        }
    }
}

impl fmt::Display for ConnectionTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}:{}", self.username, self.host, self.port)
    }
}

/// Parameters for one reachability check
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyRequest {
    /// Deployment target host
    pub host: String,

    /// SSH port (default: 22)
    #[serde(default = "default_port")]
    pub port: u16,

    /// Username on the deployment target
    pub user: String,

    /// Private key used for every hop
    pub key_path: PathBuf,

    /// Optional bastion host
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jump_host: Option<String>,

    /// Bastion username, falls back to `user`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jump_user: Option<String>,

    /// Bastion port (default: 22)
    #[serde(default = "default_port")]
    pub jump_port: u16,

    /// Trusted host keys. Required when `jump_host` is set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub known_hosts_path: Option<PathBuf>,

    /// Per-hop connect and handshake timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

impl VerifyRequest {
    pub fn new(host: impl Into<String>, user: impl Into<String>, key_path: impl Into<PathBuf>) -> Self {
        Self {
            host: host.into(),
            port: default_port(),
            user: user.into(),
            key_path: key_path.into(),
            jump_host: None,
            jump_user: None,
            jump_port: default_port(),
            known_hosts_path: None,
            timeout_secs: default_timeout(),
        }
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn jump_host(mut self, host: impl Into<String>) -> Self {
        self.jump_host = Some(host.into());
        self
    }

    pub fn jump_user(mut self, user: impl Into<String>) -> Self {
        self.jump_user = Some(user.into());
        self
    }

    pub fn jump_port(mut self, port: u16) -> Self {
        self.jump_port = port;
        self
    }

    pub fn known_hosts(mut self, path: impl Into<PathBuf>) -> Self {
        self.known_hosts_path = Some(path.into());
        self
    }

    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    /// The deployment target
    pub fn primary_target(&self) -> ConnectionTarget {
        ConnectionTarget::new(&self.host, self.port, &self.user)
    }

    /// The bastion, if one is configured
    pub fn jump_target(&self) -> Option<ConnectionTarget> {
        self.jump_host.as_ref().map(|host| {
            let username = self.jump_user.as_deref().unwrap_or(&self.user);
            ConnectionTarget::new(host, self.jump_port, username)
        })
    }
}

/// Per-hop timeout used when a request does not set one
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

fn default_port() -> u16 {
    22
}

fn default_timeout() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_jump_target_inherits_user() {
        let request = VerifyRequest::new("app.internal", "deploy", "/keys/id_ed25519")
            .jump_host("bastion.example.com");

        let jump = request.jump_target().unwrap();
        assert_eq!(jump.username, "deploy");
        assert_eq!(jump.port, 22);
        assert_eq!(jump.host, "bastion.example.com");
    }

    #[test]
    fn test_jump_target_own_user_and_port() {
        let request = VerifyRequest::new("app.internal", "deploy", "/keys/id_ed25519")
            .jump_host("bastion.example.com")
            .jump_user("ops")
            .jump_port(2222);

        let jump = request.jump_target().unwrap();
        assert_eq!(jump.to_string(), "ops@bastion.example.com:2222");
    }

    #[test]
    fn test_no_jump_target() {
        let request = VerifyRequest::new("app.internal", "deploy", "/keys/id_ed25519");
        assert!(request.jump_target().is_none());
    }

    #[test]
    fn test_deserialize_defaults() {
        let request: VerifyRequest = serde_json::from_str(
            r#"{"host": "app.internal", "user": "deploy", "key_path": "/keys/id_rsa"}"#,
        )
        .unwrap();

        assert_eq!(request.port, 22);
        assert_eq!(request.jump_port, 22);
        assert_eq!(request.timeout_secs, 30);
        assert!(request.jump_host.is_none());
        assert!(request.known_hosts_path.is_none());
    }
}
