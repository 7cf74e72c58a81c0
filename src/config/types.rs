//! Profile types

use serde::{Deserialize, Serialize};

use crate::ssh::VerifyRequest;

/// Current profile format version
pub const PROFILE_VERSION: u32 = 1;

/// Everything needed to verify and publish a project's deployment target
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectProfile {
    /// Profile format version
    #[serde(default = "default_version")]
    pub version: u32,

    pub project_name: String,

    /// Site domain, published as `WEB_DOMAIN`
    #[serde(default)]
    pub domain: String,

    #[serde(default)]
    pub author: String,

    /// Administrator email, published as `EMAIL_ADDRESS`
    #[serde(default)]
    pub email: String,

    /// Deployment target and bastion
    pub ssh: VerifyRequest,
}

fn default_version() -> u32 {
    PROFILE_VERSION
}

impl ProjectProfile {
    pub fn new(project_name: impl Into<String>, ssh: VerifyRequest) -> Self {
        Self {
            version: PROFILE_VERSION,
            project_name: project_name.into(),
            domain: String::new(),
            author: String::new(),
            email: String::new(),
            ssh,
        }
    }

    /// Required fields that are empty, one message each.
    pub fn missing_fields(&self) -> Vec<String> {
        let required = [
            ("project_name", self.project_name.is_empty()),
            ("ssh.host", self.ssh.host.is_empty()),
            ("ssh.user", self.ssh.user.is_empty()),
            ("ssh.key_path", self.ssh.key_path.as_os_str().is_empty()),
        ];

        required
            .into_iter()
            .filter(|(_, missing)| *missing)
            .map(|(field, _)| format!("{} required, but not provided", field))
            .collect()
    }
}
