//! Private key loading with algorithm detection
//!
//! Key files carry no reliable algorithm label, so the loader tries a fixed,
//! ordered list of parsers and keeps the first one that accepts the input:
//!
//! ```text
//! ed25519 -> rsa -> ecdsa -> dsa
//! ```
//!
//! Supported encodings are unencrypted OpenSSH, PKCS#1 RSA, SEC1 EC,
//! traditional DSA and PKCS#8 PEM.

use std::fmt;
use std::fs;
use std::io::{self, Read, Seek};
use std::path::Path;
use std::sync::Arc;

use russh::keys::ssh_encoding::{Decode as _, Encode as _};
use russh::keys::ssh_key::private::{DsaKeypair, KeypairData};
use russh::keys::ssh_key::Mpint;
use russh::keys::{Algorithm, HashAlg, PrivateKey, PublicKey};
use rsa::pkcs8::der::asn1::UintRef;
use rsa::pkcs8::der::{pem, Decode as _};
use rsa::pkcs8::{ObjectIdentifier, PrivateKeyInfo};
use rsa::BigUint;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::error::VerifyError;

/// Signature algorithm family of a private key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyAlgorithm {
    Ed25519,
    Rsa,
    Ecdsa,
    Dsa,
}

impl KeyAlgorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ed25519 => "ed25519",
            Self::Rsa => "rsa",
            Self::Ecdsa => "ecdsa",
            Self::Dsa => "dsa",
        }
    }

    fn matches(&self, algorithm: &Algorithm) -> bool {
        matches!(
            (self, algorithm),
            (Self::Ed25519, Algorithm::Ed25519)
                | (Self::Rsa, Algorithm::Rsa { .. })
                | (Self::Ecdsa, Algorithm::Ecdsa { .. })
                | (Self::Dsa, Algorithm::Dsa)
        )
    }
}

impl fmt::Display for KeyAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A decoded private key and the algorithm it was recognised as
#[derive(Clone)]
pub struct PrivateKeyMaterial {
    key: Arc<PrivateKey>,
    algorithm: KeyAlgorithm,
}

impl PrivateKeyMaterial {
    pub fn new(key: PrivateKey, algorithm: KeyAlgorithm) -> Self {
        Self {
            key: Arc::new(key),
            algorithm,
        }
    }

    pub fn algorithm(&self) -> KeyAlgorithm {
        self.algorithm
    }

    /// Shared handle for handing to russh authentication
    pub fn key(&self) -> Arc<PrivateKey> {
        self.key.clone()
    }

    pub fn public_key(&self) -> &PublicKey {
        self.key.public_key()
    }

    pub fn fingerprint(&self) -> String {
        self.public_key().fingerprint(HashAlg::Sha256).to_string()
    }
}

// Never print key bytes.
impl fmt::Debug for PrivateKeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrivateKeyMaterial")
            .field("algorithm", &self.algorithm)
            .field("fingerprint", &self.fingerprint())
            .finish_non_exhaustive()
    }
}

/// One candidate in the ordered trial.
///
/// The file is decoded once; each parser then decides whether the decoded
/// key belongs to it.
pub trait KeyParser: Sync {
    fn algorithm(&self) -> KeyAlgorithm;

    fn accepts(&self, key: &PrivateKey) -> bool;
}

/// Accepts keys whose decoded algorithm is its own
struct AlgorithmParser(KeyAlgorithm);

impl KeyParser for AlgorithmParser {
    fn algorithm(&self) -> KeyAlgorithm {
        self.0
    }

    fn accepts(&self, key: &PrivateKey) -> bool {
        self.0.matches(&key.algorithm())
    }
}

static ED25519: AlgorithmParser = AlgorithmParser(KeyAlgorithm::Ed25519);
static RSA: AlgorithmParser = AlgorithmParser(KeyAlgorithm::Rsa);
static ECDSA: AlgorithmParser = AlgorithmParser(KeyAlgorithm::Ecdsa);
static DSA: AlgorithmParser = AlgorithmParser(KeyAlgorithm::Dsa);

/// Parsers in trial order. The order decides which algorithm wins on input
/// more than one parser accepts.
pub static KEY_PARSERS: &[&dyn KeyParser] = &[&ED25519, &RSA, &ECDSA, &DSA];

/// id-dsa (RFC 3279)
const DSA_OID: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10040.4.1");

fn decode(bytes: &[u8]) -> Option<PrivateKey> {
    let text = std::str::from_utf8(bytes).ok()?;
    russh::keys::decode_secret_key(text, None)
        .ok()
        .or_else(|| PrivateKey::from_openssh(text).ok())
        .or_else(|| decode_dsa_pem(bytes))
        .filter(|key| !key.is_encrypted())
}

/// DSA in traditional (`DSA PRIVATE KEY`) or PKCS#8 PEM.
fn decode_dsa_pem(bytes: &[u8]) -> Option<PrivateKey> {
    let (label, der) = pem::decode_vec(bytes).ok()?;
    match label {
        "DSA PRIVATE KEY" => {
            // SEQUENCE { version, p, q, g, y, x }
            let fields = Vec::<UintRef<'_>>::from_der(&der).ok()?;
            let [_version, p, q, g, y, x] = fields.as_slice() else {
                return None;
            };
            dsa_private_key(p.as_bytes(), q.as_bytes(), g.as_bytes(), y.as_bytes(), x.as_bytes())
        }
        "PRIVATE KEY" => {
            let info = PrivateKeyInfo::from_der(&der).ok()?;
            if info.algorithm.oid != DSA_OID {
                return None;
            }
            // Dss-Parms ::= SEQUENCE { p, q, g }
            let params = info
                .algorithm
                .parameters?
                .decode_as::<Vec<UintRef<'_>>>()
                .ok()?;
            let [p, q, g] = params.as_slice() else {
                return None;
            };
            let x = UintRef::from_der(info.private_key).ok()?;

            let y = BigUint::from_bytes_be(g.as_bytes()).modpow(
                &BigUint::from_bytes_be(x.as_bytes()),
                &BigUint::from_bytes_be(p.as_bytes()),
            );
            dsa_private_key(
                p.as_bytes(),
                q.as_bytes(),
                g.as_bytes(),
                &y.to_bytes_be(),
                x.as_bytes(),
            )
        }
        _ => None,
    }
}

fn dsa_private_key(p: &[u8], q: &[u8], g: &[u8], y: &[u8], x: &[u8]) -> Option<PrivateKey> {
    // Same layout as the OpenSSH private section: p, q, g, y, x
    let mut wire = Vec::new();
    for part in [p, q, g, y, x] {
        Mpint::from_positive_bytes(part).ok()?.encode(&mut wire).ok()?;
    }
    let keypair = DsaKeypair::decode(&mut wire.as_slice()).ok()?;
    PrivateKey::new(KeypairData::Dsa(keypair), "").ok()
}

fn detect_bytes(parsers: &[&dyn KeyParser], bytes: &[u8]) -> Option<PrivateKeyMaterial> {
    let key = decode(bytes)?;
    let parser = parsers.iter().find(|parser| parser.accepts(&key))?;
    debug!("Private key recognised as {}", parser.algorithm());
    Some(PrivateKeyMaterial::new(key, parser.algorithm()))
}

/// Detect and decode a private key from the start of `source`.
///
/// Returns `Ok(None)` when no parser recognises the content; I/O failures
/// are returned as errors.
pub fn detect_key<R: Read + Seek>(source: &mut R) -> io::Result<Option<PrivateKeyMaterial>> {
    source.rewind()?;
    let mut bytes = Vec::new();
    source.read_to_end(&mut bytes)?;
    Ok(detect_bytes(KEY_PARSERS, &bytes))
}

/// Load the private key at `path`.
///
/// Any failure to read the file is `KeyFileNotFound`; readable content no
/// parser accepts is `InvalidKeyFormat`.
pub fn load_key_file(path: &Path) -> Result<PrivateKeyMaterial, VerifyError> {
    let bytes = fs::read(path).map_err(|source| VerifyError::KeyFileNotFound {
        path: path.to_path_buf(),
        source,
    })?;

    match detect_bytes(KEY_PARSERS, &bytes) {
        Some(material) => {
            debug!(
                "Loaded {} key from {} ({})",
                material.algorithm(),
                path.display(),
                material.fingerprint()
            );
            Ok(material)
        }
        None => Err(VerifyError::InvalidKeyFormat {
            path: path.to_path_buf(),
        }),
    }
}
