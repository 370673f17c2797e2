//! Launcher trust configuration
//!
//! Values come from the environment with sensible defaults; the CLI layers
//! its flags on top through the `with_*` builders.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Name of the per-user trust store directory.
pub const CONFIG_DIR_NAME: &str = ".repoconfig";

/// Where trust anchors live and which programs and remote to use.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrustConfig {
    /// Trust store root (holds `keyring-version` and `gnupg/`)
    pub config_dir: PathBuf,
    /// Remote whose tracking refs back branch names
    pub remote: String,
    /// git executable
    pub git_program: String,
    /// gpg executable used to import trust anchors
    pub gpg_program: String,
    /// ASCII-armored public keys imported during keyring setup
    pub maintainer_keys: Option<PathBuf>,
}

impl Default for TrustConfig {
    fn default() -> Self {
        let base = std::env::var_os("REPO_CONFIG_DIR")
            .or_else(|| std::env::var_os("HOME"))
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."));

        TrustConfig {
            config_dir: base.join(CONFIG_DIR_NAME),
            remote: std::env::var("REPO_TRUST_REMOTE").unwrap_or_else(|_| "origin".to_string()),
            git_program: std::env::var("REPO_TRUST_GIT").unwrap_or_else(|_| "git".to_string()),
            gpg_program: std::env::var("REPO_TRUST_GPG").unwrap_or_else(|_| "gpg".to_string()),
            maintainer_keys: std::env::var_os("REPO_TRUST_KEYS").map(PathBuf::from),
        }
    }
}

impl TrustConfig {
    /// Create a new config from environment variables
    pub fn from_env() -> Self {
        Self::default()
    }

    /// Use `<base>/.repoconfig` as the trust store.
    pub fn with_config_dir(mut self, base: &Path) -> Self {
        self.config_dir = base.join(CONFIG_DIR_NAME);
        self
    }

    pub fn with_remote(mut self, remote: &str) -> Self {
        self.remote = remote.to_string();
        self
    }

    pub fn with_maintainer_keys(mut self, keys: &Path) -> Self {
        self.maintainer_keys = Some(keys.to_path_buf());
        self
    }

    /// GnuPG home holding imported trust anchors.
    pub fn gnupg_dir(&self) -> PathBuf {
        self.config_dir.join("gnupg")
    }
}
