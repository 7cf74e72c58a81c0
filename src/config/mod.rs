//! Configuration Management Module
//!
//! Handles persistent storage of the project profile.

pub mod storage;
pub mod types;

pub use storage::{config_dir, profile_file, ProfileStorage, StorageError};
pub use types::{ProjectProfile, PROFILE_VERSION};
