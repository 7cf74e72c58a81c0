//! SSH module - reachability verification for deployment targets
//!
//! This module provides the SSH functionality using the russh library.
//!
//! # Features
//! - Private key loading with algorithm detection
//! - Host key verification against an operator-supplied known_hosts file
//! - ProxyJump (jump host) support over direct-tcpip tunnels
//! - Deploy keypair generation
//! - Host key fetch (trust on first use)

mod client;
mod config;
mod error;
pub mod keygen;
pub mod keys;
pub mod known_hosts;
mod policy;
pub mod preflight;
mod proxy;
mod verify;

pub use client::{connect_direct, establish_session, ClientHandler, SessionGuard};
pub use config::{ConnectionTarget, VerifyRequest, DEFAULT_TIMEOUT_SECS};
pub use error::{SshError, VerifyError};
pub use keygen::{generate_rsa_keypair, generate_rsa_keypair_with_bits, DeployKeypair};
pub use keys::{detect_key, load_key_file, KeyAlgorithm, KeyParser, PrivateKeyMaterial};
pub use known_hosts::{HostKeyVerification, KnownHostsStore};
pub use policy::{HostKeyPolicy, TrustPolicy};
pub use preflight::{fetch_host_key, fetch_known_hosts_line, known_hosts_line};
pub use proxy::{connect_via_jump, open_tunnel, ProxyConnection, TunnelStream};
pub use verify::{check, verify, VerificationResult};
