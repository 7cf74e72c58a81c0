//! In-process SSH servers for integration tests
#![allow(dead_code)]

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use russh::keys::{Algorithm, PrivateKey, PublicKey};
use russh::server::{Auth, Msg, Server as _, Session};
use russh::Channel;
use shipcheck_lib::ssh::{known_hosts_line, load_key_file};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

pub const FIXTURES: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/keys");

pub fn fixture(name: &str) -> PathBuf {
    Path::new(FIXTURES).join(name)
}

/// Public half of a fixture private key
pub fn fixture_public_key(name: &str) -> PublicKey {
    load_key_file(&fixture(name)).unwrap().public_key().clone()
}

pub fn random_public_key() -> PublicKey {
    let mut rng = russh::keys::ssh_key::rand_core::OsRng;
    PrivateKey::random(&mut rng, Algorithm::Ed25519)
        .unwrap()
        .public_key()
        .clone()
}

/// How a server answers direct-tcpip requests
#[derive(Clone, Copy, PartialEq, Eq)]
pub enum Tunnels {
    Refuse,
    Relay,
}

#[derive(Clone)]
struct TestServer {
    allowed_key: PublicKey,
    tunnels: Tunnels,
    connections: Arc<AtomicUsize>,
    originators: Arc<Mutex<Vec<String>>>,
}

impl russh::server::Server for TestServer {
    type Handler = Self;

    fn new_client(&mut self, _: Option<std::net::SocketAddr>) -> Self::Handler {
        self.connections.fetch_add(1, Ordering::SeqCst);
        self.clone()
    }
}

impl russh::server::Handler for TestServer {
    type Error = russh::Error;

    fn auth_publickey(
        &mut self,
        _user: &str,
        key: &PublicKey,
    ) -> impl Future<Output = Result<Auth, Self::Error>> + Send {
        let accepted = key.key_data() == self.allowed_key.key_data();
        async move {
            if accepted {
                Ok(Auth::Accept)
            } else {
                Ok(Auth::reject())
            }
        }
    }

    fn channel_open_session(
        &mut self,
        _channel: Channel<Msg>,
        _session: &mut Session,
    ) -> impl Future<Output = Result<bool, Self::Error>> + Send {
        async { Ok(true) }
    }

    fn channel_open_direct_tcpip(
        &mut self,
        channel: Channel<Msg>,
        host_to_connect: &str,
        port_to_connect: u32,
        originator_address: &str,
        originator_port: u32,
        _session: &mut Session,
    ) -> impl Future<Output = Result<bool, Self::Error>> + Send {
        self.originators
            .lock()
            .unwrap()
            .push(format!("{}:{}", originator_address, originator_port));

        let relay = self.tunnels == Tunnels::Relay;
        let upstream_addr = format!("{}:{}", host_to_connect, port_to_connect);
        async move {
            if !relay {
                return Ok(false);
            }
            tokio::spawn(async move {
                if let Ok(mut upstream) = TcpStream::connect(upstream_addr).await {
                    let mut stream = channel.into_stream();
                    let _ = tokio::io::copy_bidirectional(&mut stream, &mut upstream).await;
                }
            });
            Ok(true)
        }
    }
}

/// A server listening on 127.0.0.1, stopped on drop
pub struct RunningServer {
    pub port: u16,
    pub host_key: PublicKey,
    connections: Arc<AtomicUsize>,
    originators: Arc<Mutex<Vec<String>>>,
    task: JoinHandle<()>,
}

impl RunningServer {
    /// Connections accepted so far
    pub fn connection_count(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }

    /// Originators of direct-tcpip requests, as `addr:port`
    pub fn originators(&self) -> Vec<String> {
        self.originators.lock().unwrap().clone()
    }

    pub fn known_hosts_line(&self) -> String {
        known_hosts_line("127.0.0.1", self.port, &self.host_key)
    }
}

impl Drop for RunningServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Start a server that accepts only `allowed_key`.
pub async fn start_server(allowed_key: PublicKey, tunnels: Tunnels) -> RunningServer {
    let mut rng = russh::keys::ssh_key::rand_core::OsRng;
    let host_key = PrivateKey::random(&mut rng, Algorithm::Ed25519).unwrap();
    let host_public = host_key.public_key().clone();

    let config = Arc::new(russh::server::Config {
        auth_rejection_time: Duration::from_millis(0),
        auth_rejection_time_initial: Some(Duration::from_millis(0)),
        inactivity_timeout: Some(Duration::from_secs(5)),
        keys: vec![host_key],
        ..Default::default()
    });

    let listener = TcpListener::bind(("127.0.0.1", 0)).await.unwrap();
    let port = listener.local_addr().unwrap().port();

    let connections = Arc::new(AtomicUsize::new(0));
    let originators = Arc::new(Mutex::new(Vec::new()));
    let mut server = TestServer {
        allowed_key,
        tunnels,
        connections: connections.clone(),
        originators: originators.clone(),
    };
    let task = tokio::spawn(async move {
        let _ = server.run_on_socket(config, &listener).await;
    });

    RunningServer {
        port,
        host_key: host_public,
        connections,
        originators,
        task,
    }
}

/// Write a known_hosts file trusting `servers`.
pub fn write_known_hosts(dir: &Path, servers: &[&RunningServer]) -> PathBuf {
    let path = dir.join("known_hosts");
    let contents: String = servers
        .iter()
        .map(|server| format!("{}\n", server.known_hosts_line()))
        .collect();
    std::fs::write(&path, contents).unwrap();
    path
}
