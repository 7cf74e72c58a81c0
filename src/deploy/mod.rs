//! Deployment bootstrap
//!
//! Everything a project needs published once its target is verified:
//! the secret set, the deploy key registration and the Ansible vault.

pub mod secrets;
pub mod vault;

pub use secrets::{
    register_deploy_key, DeployKeyRecord, DeploymentSecrets, MemorySecretStore, SecretStore,
    SecretsError,
};
pub use vault::{generate_secure_password, AnsibleVault, VaultError, VaultPassword};
