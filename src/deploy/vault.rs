//! Ansible Vault helpers
//!
//! - Random vault passwords
//! - Password file handling (mode 0600 on Unix)
//! - `ansible-vault encrypt_string` wrapper

use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use rand::distributions::Alphanumeric;
use rand::Rng;
use tokio::fs;
use tokio::process::Command;
use tracing::{debug, info};

/// Default length of generated passwords
pub const DEFAULT_PASSWORD_LENGTH: usize = 24;

/// Vault errors
#[derive(Debug, thiserror::Error)]
pub enum VaultError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Vault password file is empty: {}", .0.display())]
    EmptyPassword(PathBuf),

    #[error("Could not run {program}: {source}")]
    Unavailable {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} exited with {status}: {stderr}")]
    CommandFailed {
        program: String,
        status: std::process::ExitStatus,
        stderr: String,
    },

    #[error("UTF-8 decode error: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

/// Generate an alphanumeric password from the OS random source.
pub fn generate_secure_password(length: usize) -> String {
    rand::rngs::OsRng
        .sample_iter(&Alphanumeric)
        .take(length)
        .map(char::from)
        .collect()
}

/// A vault password and the file it lives in
pub struct VaultPassword {
    password: String,
    path: PathBuf,
}

impl VaultPassword {
    /// Generate a new password and write it to `path`.
    pub async fn create(path: impl Into<PathBuf>) -> Result<Self, VaultError> {
        let path = path.into();
        let password = generate_secure_password(DEFAULT_PASSWORD_LENGTH);

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&path, format!("{}\n", password)).await?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&path, std::fs::Permissions::from_mode(0o600)).await?;
        }

        info!("Vault password written to {}", path.display());
        Ok(Self { password, path })
    }

    /// Read the password from the first line of `path`.
    pub async fn load(path: impl Into<PathBuf>) -> Result<Self, VaultError> {
        let path = path.into();
        let contents = fs::read_to_string(&path).await?;
        let password = contents.lines().next().unwrap_or_default().to_string();
        if password.is_empty() {
            return Err(VaultError::EmptyPassword(path));
        }
        Ok(Self { password, path })
    }

    pub fn password(&self) -> &str {
        &self.password
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl fmt::Debug for VaultPassword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VaultPassword")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

/// Runs the `ansible-vault` CLI
#[derive(Debug, Clone)]
pub struct AnsibleVault {
    program: String,
}

impl Default for AnsibleVault {
    fn default() -> Self {
        Self::new()
    }
}

impl AnsibleVault {
    pub fn new() -> Self {
        Self::with_program("ansible-vault")
    }

    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Encrypt `value` as a YAML variable called `name`; returns stdout.
    pub async fn encrypt_string(
        &self,
        password: &VaultPassword,
        name: &str,
        value: &str,
    ) -> Result<String, VaultError> {
        debug!("Encrypting vault variable {}", name);

        let output = Command::new(&self.program)
            .arg("encrypt_string")
            .arg(value)
            .arg("--name")
            .arg(name)
            .arg("--vault-password-file")
            .arg(password.path())
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|source| VaultError::Unavailable {
                program: self.program.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(VaultError::CommandFailed {
                program: self.program.clone(),
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(String::from_utf8(output.stdout)?)
    }

    /// Encrypt one variable and write it as the whole vault file.
    pub async fn write_vault_file(
        &self,
        vault_file: &Path,
        password: &VaultPassword,
        name: &str,
        value: &str,
    ) -> Result<(), VaultError> {
        let encrypted = self.encrypt_string(password, name, value).await?;
        if let Some(parent) = vault_file.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(vault_file, encrypted).await?;
        info!("Vault file written to {}", vault_file.display());
        Ok(())
    }
}
