//! Trust-anchor keyring lifecycle.
//!
//! The keyring is a GnuPG home under the trust store plus a
//! `keyring-version` marker. Whenever the required keyset version moves
//! forward the marker falls behind and setup runs again. Setup is not
//! transactional: a half-finished run leaves the marker stale, so the next
//! run simply repeats it.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use tracing::{debug, info, warn};

use crate::config::TrustConfig;
use crate::exec::{CommandExecutor, Invocation};
use crate::Result;

/// Keyset version the current launcher requires.
pub const KEYRING_VERSION: &[u32] = &[2, 3];

/// Marker file name inside the trust store.
pub const KEYRING_VERSION_FILE: &str = "keyring-version";

/// Dotted-integer keyset version, compared component by component.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct KeyringVersion(Vec<u32>);

impl KeyringVersion {
    pub fn new(parts: &[u32]) -> Self {
        KeyringVersion(parts.to_vec())
    }

    pub fn current() -> Self {
        Self::new(KEYRING_VERSION)
    }
}

impl FromStr for KeyringVersion {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        s.trim()
            .split('.')
            .map(str::parse)
            .collect::<std::result::Result<Vec<u32>, _>>()
            .map(KeyringVersion)
    }
}

impl fmt::Display for KeyringVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(u32::to_string).collect();
        write!(f, "{}", parts.join("."))
    }
}

/// Installs and tracks the launcher's release-signing keys.
pub struct KeyringManager<'a> {
    exec: &'a dyn CommandExecutor,
    root: PathBuf,
    gpg_program: String,
    maintainer_keys: Option<PathBuf>,
    required: KeyringVersion,
}

impl<'a> KeyringManager<'a> {
    pub fn new(exec: &'a dyn CommandExecutor, config: &TrustConfig) -> Self {
        KeyringManager {
            exec,
            root: config.config_dir.clone(),
            gpg_program: config.gpg_program.clone(),
            maintainer_keys: config.maintainer_keys.clone(),
            required: KeyringVersion::current(),
        }
    }

    /// Override the required keyset version.
    pub fn with_required(mut self, required: KeyringVersion) -> Self {
        self.required = required;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn required(&self) -> &KeyringVersion {
        &self.required
    }

    pub fn gnupg_dir(&self) -> PathBuf {
        self.root.join("gnupg")
    }

    fn marker_path(&self) -> PathBuf {
        self.root.join(KEYRING_VERSION_FILE)
    }

    /// Version recorded by the last successful setup, if readable.
    pub fn installed_version(&self) -> Option<KeyringVersion> {
        let text = std::fs::read_to_string(self.marker_path()).ok()?;
        if text.trim().is_empty() {
            return None;
        }
        text.parse().ok()
    }

    /// Whether trust anchors must be (re)installed before verification.
    pub fn needs_setup(&self) -> bool {
        if !self.root.is_dir() {
            return true;
        }
        match self.installed_version() {
            Some(installed) => installed < self.required,
            None => true,
        }
    }

    /// Import the maintainer keys and record the required version, or the
    /// installed one if that is newer.
    ///
    /// Returns `Ok(false)` when keys cannot be installed on this machine (no
    /// key bundle configured, or gpg not installed).
    pub fn setup(&self, quiet: bool) -> Result<bool> {
        let Some(keys_path) = &self.maintainer_keys else {
            if !quiet {
                warn!("no release signing keys configured; set REPO_TRUST_KEYS");
            }
            return Ok(false);
        };
        let keys = std::fs::read_to_string(keys_path)?;

        let gnupg = self.gnupg_dir();
        std::fs::create_dir_all(&self.root)?;
        create_private_dir(&gnupg)?;

        if !quiet {
            info!(
                version = %self.required,
                "Updating release signing keys to keyset ver {}", self.required
            );
        }

        // gpg is chatty; keep its output captured so a failure carries it.
        let import = Invocation::new(self.gpg_program.as_str())
            .arg("--homedir")
            .arg(gnupg.to_string_lossy())
            .arg("--import")
            .current_dir(&gnupg)
            .stdin(keys);
        match self.exec.run(&import) {
            Ok(_) => {}
            Err(err) if err.is_missing_program() => {
                if !quiet {
                    warn!("gpg (GnuPG) is not available; installing it is strongly encouraged");
                }
                return Ok(false);
            }
            Err(err) => return Err(err),
        }

        // Never move the marker backwards past a newer installed keyset.
        let recorded = match self.installed_version() {
            Some(installed) if installed > self.required => installed,
            _ => self.required.clone(),
        };
        std::fs::write(self.marker_path(), format!("{recorded}\n"))?;
        debug!(root = %self.root.display(), version = %recorded, "keyring marker written");
        Ok(true)
    }
}

#[cfg(unix)]
fn create_private_dir(dir: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::DirBuilderExt;

    if dir.is_dir() {
        return Ok(());
    }
    std::fs::DirBuilder::new().recursive(true).mode(0o700).create(dir)
}

#[cfg(not(unix))]
fn create_private_dir(dir: &Path) -> std::io::Result<()> {
    std::fs::create_dir_all(dir)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TrustError;
    use crate::fakes::ScriptedExecutor;
    use tempfile::TempDir;

    fn config_in(dir: &TempDir) -> TrustConfig {
        let mut cfg = TrustConfig::default();
        cfg.config_dir = dir.path().to_path_buf();
        cfg.maintainer_keys = None;
        cfg
    }

    fn write_keys(dir: &TempDir) -> PathBuf {
        let path = dir.path().join("maintainers.asc");
        std::fs::write(&path, "-----BEGIN PGP PUBLIC KEY BLOCK-----\n").unwrap();
        path
    }

    fn write_marker(dir: &TempDir, contents: &str) {
        std::fs::write(dir.path().join(KEYRING_VERSION_FILE), contents).unwrap();
    }

    #[test]
    fn test_missing_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let mut cfg = config_in(&tmp);
        cfg.config_dir = tmp.path().join("foo");
        let exec = ScriptedExecutor::new();
        assert!(KeyringManager::new(&exec, &cfg).needs_setup());
    }

    #[test]
    fn test_missing_keyring() {
        let tmp = tempfile::tempdir().unwrap();
        let exec = ScriptedExecutor::new();
        assert!(KeyringManager::new(&exec, &config_in(&tmp)).needs_setup());
    }

    #[test]
    fn test_empty_keyring() {
        let tmp = tempfile::tempdir().unwrap();
        write_marker(&tmp, "");
        let exec = ScriptedExecutor::new();
        assert!(KeyringManager::new(&exec, &config_in(&tmp)).needs_setup());
    }

    #[test]
    fn test_garbage_keyring() {
        let tmp = tempfile::tempdir().unwrap();
        write_marker(&tmp, "not-a-version\n");
        let exec = ScriptedExecutor::new();
        assert!(KeyringManager::new(&exec, &config_in(&tmp)).needs_setup());
    }

    #[test]
    fn test_old_keyring() {
        let tmp = tempfile::tempdir().unwrap();
        write_marker(&tmp, "1.0\n");
        let exec = ScriptedExecutor::new();
        assert!(KeyringManager::new(&exec, &config_in(&tmp)).needs_setup());
    }

    #[test]
    fn test_new_keyring() {
        let tmp = tempfile::tempdir().unwrap();
        write_marker(&tmp, "1000.0\n");
        let exec = ScriptedExecutor::new();
        assert!(!KeyringManager::new(&exec, &config_in(&tmp)).needs_setup());
    }

    #[test]
    fn test_exactly_current_keyring() {
        let tmp = tempfile::tempdir().unwrap();
        write_marker(&tmp, &format!("{}\n", KeyringVersion::current()));
        let exec = ScriptedExecutor::new();
        assert!(!KeyringManager::new(&exec, &config_in(&tmp)).needs_setup());
    }

    #[test]
    fn test_version_ordering_is_numeric() {
        let v = |s: &str| s.parse::<KeyringVersion>().unwrap();
        assert!(v("1.0") < v("2.3"));
        assert!(v("2.3") < v("2.10"));
        assert!(v("2.3") < v("2.3.1"));
        assert!(v("2.3") < v("1000.0"));
        assert_eq!(v(" 2.3\n").to_string(), "2.3");
    }

    #[test]
    fn test_full() {
        let tmp = tempfile::tempdir().unwrap();
        let keys = write_keys(&tmp);
        let mut cfg = config_in(&tmp);
        cfg.config_dir = tmp.path().join("store");
        cfg.maintainer_keys = Some(keys);

        let exec = ScriptedExecutor::new().ok("");
        let keyring = KeyringManager::new(&exec, &cfg);
        assert!(keyring.needs_setup());
        assert!(keyring.setup(true).unwrap());

        let data = std::fs::read_to_string(cfg.config_dir.join(KEYRING_VERSION_FILE)).unwrap();
        assert_eq!(KeyringVersion::current().to_string(), data.trim());
        assert!(!keyring.needs_setup());
        assert!(keyring.gnupg_dir().is_dir());

        let import = &exec.invocations()[0];
        assert_eq!(import.program, "gpg");
        assert_eq!(import.args.last().map(String::as_str), Some("--import"));
        assert!(import.input.as_deref().unwrap().contains("PGP PUBLIC KEY"));
    }

    #[test]
    fn test_marker_matches_required_version_exactly() {
        let tmp = tempfile::tempdir().unwrap();
        let mut cfg = config_in(&tmp);
        cfg.maintainer_keys = Some(write_keys(&tmp));

        let exec = ScriptedExecutor::new().ok("");
        let keyring =
            KeyringManager::new(&exec, &cfg).with_required(KeyringVersion::new(&[1000, 0]));
        assert!(keyring.setup(true).unwrap());
        let data = std::fs::read_to_string(tmp.path().join(KEYRING_VERSION_FILE)).unwrap();
        assert_eq!(data.trim(), "1000.0");
    }

    #[test]
    fn test_setup_is_rerunnable() {
        let tmp = tempfile::tempdir().unwrap();
        let mut cfg = config_in(&tmp);
        cfg.maintainer_keys = Some(write_keys(&tmp));

        let exec = ScriptedExecutor::new().ok("").ok("");
        let keyring = KeyringManager::new(&exec, &cfg);
        assert!(keyring.setup(true).unwrap());
        assert!(keyring.setup(true).unwrap());
        assert_eq!(keyring.installed_version(), Some(KeyringVersion::current()));
    }

    #[test]
    fn test_setup_never_lowers_newer_marker() {
        let tmp = tempfile::tempdir().unwrap();
        write_marker(&tmp, "1000.0\n");
        let mut cfg = config_in(&tmp);
        cfg.maintainer_keys = Some(write_keys(&tmp));

        let exec = ScriptedExecutor::new().ok("");
        let keyring = KeyringManager::new(&exec, &cfg);
        assert!(keyring.setup(true).unwrap());

        let data = std::fs::read_to_string(tmp.path().join(KEYRING_VERSION_FILE)).unwrap();
        assert_eq!(data.trim(), "1000.0");
        assert!(!keyring.needs_setup());
    }

    #[test]
    fn test_missing_gpg_returns_false() {
        let tmp = tempfile::tempdir().unwrap();
        let mut cfg = config_in(&tmp);
        cfg.maintainer_keys = Some(write_keys(&tmp));

        let exec = ScriptedExecutor::new().spawn_error(std::io::ErrorKind::NotFound);
        let keyring = KeyringManager::new(&exec, &cfg);
        assert!(!keyring.setup(true).unwrap());
        assert!(keyring.needs_setup());
    }

    #[test]
    fn test_no_keys_configured_returns_false() {
        let tmp = tempfile::tempdir().unwrap();
        let exec = ScriptedExecutor::new();
        let keyring = KeyringManager::new(&exec, &config_in(&tmp));
        assert!(!keyring.setup(true).unwrap());
        assert!(exec.invocations().is_empty());
    }

    #[test]
    fn test_import_failure_propagates_without_marker() {
        let tmp = tempfile::tempdir().unwrap();
        let mut cfg = config_in(&tmp);
        cfg.maintainer_keys = Some(write_keys(&tmp));

        let exec = ScriptedExecutor::new().fail(2, "gpg: no valid OpenPGP data found.");
        let keyring = KeyringManager::new(&exec, &cfg);
        let err = keyring.setup(true).unwrap_err();
        assert!(matches!(err, TrustError::CommandFailure { .. }));
        assert!(keyring.installed_version().is_none());
    }
}
