//! Deploy keypair generation
//!
//! Produces the keypair the deployment pipeline installs on the target: a
//! PKCS#8 PEM private key and an OpenSSH `authorized_keys` public line.

use rsa::pkcs8::{EncodePrivateKey, LineEnding};
use rsa::traits::PublicKeyParts;
use rsa::RsaPrivateKey;
use russh::keys::ssh_key::public::{KeyData, RsaPublicKey};
use russh::keys::ssh_key::{Mpint, PublicKey};
use tracing::info;

use super::error::SshError;

/// Modulus size for deploy keys
pub const DEPLOY_KEY_BITS: usize = 4096;

const DEPLOY_KEY_COMMENT: &str = "shipcheck-deploy";

/// A freshly generated keypair, never written to disk by this module
pub struct DeployKeypair {
    /// Unencrypted PKCS#8 PEM (`BEGIN PRIVATE KEY`)
    pub private_key_pem: String,
    /// `ssh-rsa AAAA... comment`
    pub public_key_openssh: String,
}

impl std::fmt::Debug for DeployKeypair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeployKeypair")
            .field("public_key_openssh", &self.public_key_openssh)
            .finish_non_exhaustive()
    }
}

/// Generate a 4096-bit RSA deploy keypair.
pub fn generate_rsa_keypair() -> Result<DeployKeypair, SshError> {
    generate_rsa_keypair_with_bits(DEPLOY_KEY_BITS)
}

pub fn generate_rsa_keypair_with_bits(bits: usize) -> Result<DeployKeypair, SshError> {
    let mut rng = rand::rngs::OsRng;
    let private_key = RsaPrivateKey::new(&mut rng, bits)
        .map_err(|e| SshError::KeyError(format!("RSA key generation failed: {}", e)))?;

    let private_key_pem = private_key
        .to_pkcs8_pem(LineEnding::LF)
        .map_err(|e| SshError::KeyError(format!("PKCS#8 encoding failed: {}", e)))?
        .to_string();

    let public_key_openssh = openssh_public_key(&private_key)?;

    info!("Generated {}-bit RSA deploy keypair", bits);
    Ok(DeployKeypair {
        private_key_pem,
        public_key_openssh,
    })
}

fn openssh_public_key(private_key: &RsaPrivateKey) -> Result<String, SshError> {
    let mpint = |bytes: Vec<u8>| {
        Mpint::from_positive_bytes(&bytes).map_err(|e| SshError::KeyError(e.to_string()))
    };

    let key_data = KeyData::Rsa(RsaPublicKey {
        e: mpint(private_key.e().to_bytes_be())?,
        n: mpint(private_key.n().to_bytes_be())?,
    });

    PublicKey::new(key_data, DEPLOY_KEY_COMMENT)
        .to_openssh()
        .map_err(|e| SshError::KeyError(e.to_string()))
}
