//! Profile Storage
//!
//! Handles reading/writing the project profile on disk.
//! Profile location: ~/.shipcheck/profile.json

use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

use super::types::{ProjectProfile, PROFILE_VERSION};

/// Profile storage errors
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Failed to determine config directory")]
    NoConfigDir,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Profile version {found} is newer than supported {supported}")]
    VersionTooNew { found: u32, supported: u32 },
}

/// Get the shipcheck configuration directory
pub fn config_dir() -> Result<PathBuf, StorageError> {
    dirs::home_dir()
        .map(|home| home.join(".shipcheck"))
        .ok_or(StorageError::NoConfigDir)
}

/// Get the default profile file path
pub fn profile_file() -> Result<PathBuf, StorageError> {
    Ok(config_dir()?.join("profile.json"))
}

/// Profile storage manager
pub struct ProfileStorage {
    path: PathBuf,
}

impl ProfileStorage {
    /// Create a new storage manager with default path
    pub fn new() -> Result<Self, StorageError> {
        Ok(Self {
            path: profile_file()?,
        })
    }

    /// Create storage manager with custom path
    pub fn with_path(path: PathBuf) -> Self {
        Self { path }
    }

    async fn ensure_dir(&self) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await?;
        }
        Ok(())
    }

    /// Load the profile from disk.
    ///
    /// Returns `Ok(None)` if the file does not exist.
    pub async fn load(&self) -> Result<Option<ProjectProfile>, StorageError> {
        let contents = match fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StorageError::Io(e)),
        };

        let profile: ProjectProfile = serde_json::from_str(&contents)?;
        if profile.version > PROFILE_VERSION {
            return Err(StorageError::VersionTooNew {
                found: profile.version,
                supported: PROFILE_VERSION,
            });
        }
        tracing::debug!("Loaded profile {} from {:?}", profile.project_name, self.path);
        Ok(Some(profile))
    }

    /// Save the profile to disk
    pub async fn save(&self, profile: &ProjectProfile) -> Result<(), StorageError> {
        self.ensure_dir().await?;

        // Write to temp file first, then rename (atomic write)
        let temp_path = self.path.with_extension("json.tmp");
        let json = serde_json::to_string_pretty(profile)?;

        let mut file = fs::File::create(&temp_path).await?;
        file.write_all(json.as_bytes()).await?;
        file.sync_all().await?;

        fs::rename(&temp_path, &self.path).await?;

        Ok(())
    }

    /// Get profile file path
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ssh::VerifyRequest;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_load_nonexistent() {
        let temp = tempdir().unwrap();
        let storage = ProfileStorage::with_path(temp.path().join("profile.json"));

        assert!(storage.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_save_and_load() {
        let temp = tempdir().unwrap();
        let storage = ProfileStorage::with_path(temp.path().join("nested").join("profile.json"));

        let mut profile = ProjectProfile::new(
            "blog",
            VerifyRequest::new("app.example.com", "deploy", "/keys/id_ed25519")
                .jump_host("bastion.example.com")
                .known_hosts("/keys/known_hosts"),
        );
        profile.domain = "blog.example.com".to_string();

        storage.save(&profile).await.unwrap();
        assert!(!storage.path().with_extension("json.tmp").exists());

        let loaded = storage.load().await.unwrap().unwrap();
        assert_eq!(loaded.domain, "blog.example.com");
        assert_eq!(loaded.ssh.jump_host.as_deref(), Some("bastion.example.com"));
    }

    #[tokio::test]
    async fn test_rejects_newer_version() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("profile.json");
        tokio::fs::write(
            &path,
            r#"{"version": 99, "project_name": "blog",
                "ssh": {"host": "h", "user": "u", "key_path": "/k"}}"#,
        )
        .await
        .unwrap();

        let err = ProfileStorage::with_path(path).load().await.unwrap_err();
        assert!(matches!(
            err,
            StorageError::VersionTooNew {
                found: 99,
                supported: PROFILE_VERSION
            }
        ));
    }

    #[tokio::test]
    async fn test_corrupt_profile_is_json_error() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("profile.json");
        tokio::fs::write(&path, "{ not json").await.unwrap();

        let err = ProfileStorage::with_path(path).load().await.unwrap_err();
        assert!(matches!(err, StorageError::Json(_)));
    }
}
