//! Jump host (ProxyJump) connections
//!
//! ```text
//! Client --SSH--> [Jump] --direct-tcpip--> [Target]
//! ```
//!
//! 1. Connect and authenticate to the jump host over TCP
//! 2. Ask it for a direct-tcpip channel to the target
//! 3. Wrap the channel as a `ChannelStream`
//! 4. Run the target's handshake and authentication over that stream
//!
//! Each step fails with its own error so the caller can tell which hop broke.

use std::time::Duration;

use tracing::{info, warn};

use super::client::{connect_direct, establish_session, SessionGuard};
use super::config::ConnectionTarget;
use super::error::{SshError, VerifyError};
use super::keys::PrivateKeyMaterial;
use super::policy::HostKeyPolicy;

/// Byte stream carried by a direct-tcpip channel
pub type TunnelStream = russh::ChannelStream<russh::client::Msg>;

/// Originator reported in direct-tcpip requests
const ORIGINATOR_ADDRESS: &str = "0.0.0.0";
const ORIGINATOR_PORT: u32 = 0;

/// Ask `jump` to open a TCP tunnel to `host:port`.
pub async fn open_tunnel(
    jump: &SessionGuard,
    host: &str,
    port: u16,
) -> Result<TunnelStream, SshError> {
    info!(
        "Opening tunnel through {} to {}:{}",
        jump.target(),
        host,
        port
    );

    let channel = jump
        .handle()?
        .channel_open_direct_tcpip(host, port as u32, ORIGINATOR_ADDRESS, ORIGINATOR_PORT)
        .await
        .map_err(|e| {
            SshError::ChannelError(format!("Failed to open tunnel to {}:{}: {}", host, port, e))
        })?;

    Ok(channel.into_stream())
}

/// Sessions to a target reached through one jump host
///
/// Fields drop in declaration order, so the target session always goes away
/// before the jump session that carries it.
pub struct ProxyConnection {
    pub target: SessionGuard,
    pub jump: SessionGuard,
}

impl ProxyConnection {
    /// Close the target session, then the jump session.
    pub async fn close(mut self) {
        self.target.close().await;
        self.jump.close().await;
    }
}

/// Authenticate to `target` through `jump`, using `key` on both hops.
///
/// Both hops are checked against the same host key policy.
pub async fn connect_via_jump(
    jump: &ConnectionTarget,
    target: &ConnectionTarget,
    key: &PrivateKeyMaterial,
    policy: &HostKeyPolicy,
    timeout: Duration,
) -> Result<ProxyConnection, VerifyError> {
    info!("Connecting to {} via jump host {}", target, jump);

    let mut jump_session = connect_direct(jump, key, policy, timeout)
        .await
        .map_err(|source| VerifyError::JumpConnectionFailed {
            jump: jump.to_string(),
            source,
        })?;

    let stream = match open_tunnel(&jump_session, &target.host, target.port).await {
        Ok(stream) => stream,
        Err(source) => {
            warn!("Jump host {} refused tunnel to {}", jump, target);
            jump_session.close().await;
            return Err(VerifyError::TunnelOpenFailed {
                jump: jump.to_string(),
                target: target.to_string(),
                source,
            });
        }
    };

    match establish_session(stream, target, key, policy, timeout).await {
        Ok(target_session) => {
            info!("Target {} reached through {}", target, jump);
            Ok(ProxyConnection {
                target: target_session,
                jump: jump_session,
            })
        }
        Err(source) => {
            jump_session.close().await;
            Err(VerifyError::TunneledConnectionFailed {
                jump: jump.to_string(),
                target: target.to_string(),
                source,
            })
        }
    }
}
