//! Known hosts parsing for SSH host key verification
//!
//! Only the operator-supplied file is consulted. The store is read-only:
//! nothing learned during a check is written back.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::Path;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use russh::keys::{PublicKey, PublicKeyBase64};
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

/// Result of host key verification
#[derive(Debug, Clone, PartialEq)]
pub enum HostKeyVerification {
    /// Key matches known_hosts entry
    Verified,
    /// Host not in known_hosts, or known only under other key types
    Unknown { fingerprint: String },
    /// Key changed from known_hosts entry (potential MITM)
    Changed {
        expected_fingerprint: String,
        actual_fingerprint: String,
    },
}

/// Entry in known_hosts: (key_type, base64_key)
#[derive(Clone, Debug)]
struct HostKeyEntry {
    key_type: String,
    key_data: String,
}

/// Trusted host keys loaded from a known_hosts file
#[derive(Debug, Default)]
pub struct KnownHostsStore {
    /// host pattern -> keys (a host may have one key per type)
    hosts: HashMap<String, Vec<HostKeyEntry>>,
}

impl KnownHostsStore {
    /// Load a known_hosts file. The file must exist.
    pub fn from_file(path: &Path) -> io::Result<Self> {
        let content = fs::read_to_string(path)?;
        let store = Self::parse(&content);
        info!(
            "Loaded {} trusted hosts from {}",
            store.hosts.len(),
            path.display()
        );
        Ok(store)
    }

    /// Parse known_hosts content.
    ///
    /// Lines are `hostname[,alias...] keytype base64key [comment]`. Comments,
    /// blank lines, marker lines (`@cert-authority`, `@revoked`) and hashed
    /// hostnames are skipped.
    pub fn parse(content: &str) -> Self {
        let mut hosts: HashMap<String, Vec<HostKeyEntry>> = HashMap::new();

        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with('@') {
                continue;
            }

            let parts: Vec<&str> = line.split_whitespace().collect();
            if parts.len() < 3 {
                debug!("Skipping malformed known_hosts line: {}", line);
                continue;
            }

            let entry = HostKeyEntry {
                key_type: parts[1].to_string(),
                key_data: parts[2].to_string(),
            };

            for hostname in parts[0].split(',') {
                if hostname.starts_with('|') {
                    continue;
                }
                hosts
                    .entry(Self::normalize_pattern(hostname))
                    .or_default()
                    .push(entry.clone());
            }
        }

        Self { hosts }
    }

    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }

    /// Normalize a known_hosts host field: `[host]:22` and `host` are the same
    fn normalize_pattern(pattern: &str) -> String {
        if let Some(rest) = pattern.strip_prefix('[') {
            if let Some((host, port)) = rest.split_once("]:") {
                if let Ok(port) = port.parse::<u16>() {
                    return Self::host_pattern(host, port);
                }
            }
            return rest.trim_end_matches(']').to_lowercase();
        }
        pattern.to_lowercase()
    }

    /// known_hosts host field for host:port
    pub fn host_pattern(host: &str, port: u16) -> String {
        let host = host.to_lowercase();
        if port == 22 {
            host
        } else {
            format!("[{}]:{}", host, port)
        }
    }

    /// Compute SHA256 fingerprint of public key
    pub fn fingerprint(key: &PublicKey) -> String {
        Self::fingerprint_bytes(&key.public_key_bytes())
    }

    fn fingerprint_bytes(bytes: &[u8]) -> String {
        let hash = Sha256::digest(bytes);
        format!("SHA256:{}", BASE64.encode(hash).trim_end_matches('='))
    }

    /// Compute fingerprint from stored base64 key
    fn compute_fingerprint_from_b64(stored_b64: &str) -> String {
        match BASE64.decode(stored_b64) {
            Ok(bytes) => Self::fingerprint_bytes(&bytes),
            Err(_) => "unknown".to_string(),
        }
    }

    /// Verify a host's public key
    pub fn verify(&self, host: &str, port: u16, key: &PublicKey) -> HostKeyVerification {
        let lookup_key = Self::host_pattern(host, port);
        let actual_key_type = key.algorithm().as_str().to_string();
        let actual_key_b64 = BASE64.encode(key.public_key_bytes());
        let fingerprint = Self::fingerprint(key);

        let Some(entries) = self.hosts.get(&lookup_key) else {
            debug!("Unknown host: {}", lookup_key);
            return HostKeyVerification::Unknown { fingerprint };
        };

        for entry in entries.iter().filter(|e| e.key_type == actual_key_type) {
            if entry.key_data == actual_key_b64 {
                debug!(
                    "Host key verified for {} (type: {})",
                    lookup_key, actual_key_type
                );
                return HostKeyVerification::Verified;
            }
        }

        if let Some(entry) = entries.iter().find(|e| e.key_type == actual_key_type) {
            let expected_fingerprint = Self::compute_fingerprint_from_b64(&entry.key_data);
            warn!(
                "HOST KEY CHANGED for {} (type: {})! Expected {}, got {}",
                lookup_key, actual_key_type, expected_fingerprint, fingerprint
            );
            return HostKeyVerification::Changed {
                expected_fingerprint,
                actual_fingerprint: fingerprint,
            };
        }

        debug!(
            "Host {} known but no {} key stored",
            lookup_key, actual_key_type
        );
        HostKeyVerification::Unknown { fingerprint }
    }
}
