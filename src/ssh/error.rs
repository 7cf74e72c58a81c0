//! SSH Error types

use std::path::PathBuf;

use thiserror::Error;

/// Transport-level failures for a single SSH hop
#[derive(Error, Debug)]
pub enum SshError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Host key rejected: {0}")]
    HostKeyRejected(String),

    #[error("Channel error: {0}")]
    ChannelError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("SSH protocol error: {0}")]
    ProtocolError(String),

    #[error("Key error: {0}")]
    KeyError(String),

    #[error("Timeout: {0}")]
    Timeout(String),
}

impl From<russh::Error> for SshError {
    fn from(err: russh::Error) -> Self {
        SshError::ProtocolError(err.to_string())
    }
}

impl From<russh::keys::Error> for SshError {
    fn from(err: russh::keys::Error) -> Self {
        SshError::KeyError(err.to_string())
    }
}

/// Why a reachability check failed.
///
/// Exactly one variant is produced per failed check. The three connection
/// variants are kept apart so an operator can tell which hop broke.
#[derive(Error, Debug)]
pub enum VerifyError {
    #[error("Could not find SSH key file {}: {source}", path.display())]
    KeyFileNotFound {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid SSH key format in {}", path.display())]
    InvalidKeyFormat { path: PathBuf },

    #[error("Specified known hosts file not found: {}", path.display())]
    KnownHostsNotFound {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Known hosts file required for jump host configuration")]
    MissingKnownHosts,

    #[error("SSH connection to {target} failed: {source}")]
    ConnectionFailed {
        target: String,
        #[source]
        source: SshError,
    },

    #[error("SSH connection to jump host {jump} failed: {source}")]
    JumpConnectionFailed {
        jump: String,
        #[source]
        source: SshError,
    },

    #[error("Reached jump host {jump}, but primary host {target} authentication failed: {source}")]
    TunneledConnectionFailed {
        jump: String,
        target: String,
        #[source]
        source: SshError,
    },

    #[error("Jump host {jump} could not open a tunnel to {target}: {source}")]
    TunnelOpenFailed {
        jump: String,
        target: String,
        #[source]
        source: SshError,
    },
}
