//! Git version gate.
//!
//! The launcher relies on git features that only exist from a certain
//! release onward, so the engine's self-reported version is checked once at
//! startup before anything else runs.

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::TrustError;
use crate::git::Git;
use crate::Result;

/// Oldest git that can run the launcher at all.
pub const MIN_GIT_VERSION_HARD: (u32, u32, u32) = (1, 7, 2);

/// Oldest git we do not warn about.
pub const MIN_GIT_VERSION_SOFT: (u32, u32, u32) = (2, 9, 1);

/// A parsed git version. Ordering uses only the numeric triple.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineVersion {
    pub major: u32,
    pub minor: u32,
    pub micro: u32,
    /// Version text as reported, minus the `git version ` prefix.
    pub full: String,
}

impl EngineVersion {
    pub fn new(major: u32, minor: u32, micro: u32, full: impl Into<String>) -> Self {
        EngineVersion {
            major,
            minor,
            micro,
            full: full.into(),
        }
    }

    pub fn triple(&self) -> (u32, u32, u32) {
        (self.major, self.minor, self.micro)
    }
}

impl PartialEq for EngineVersion {
    fn eq(&self, other: &Self) -> bool {
        self.triple() == other.triple()
    }
}

impl Eq for EngineVersion {}

impl PartialOrd for EngineVersion {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for EngineVersion {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.triple().cmp(&other.triple())
    }
}

impl fmt::Display for EngineVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.full)
    }
}

fn version_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^(?:git version )?((\d+)\.(\d+)\.(\d+).*)$")
            .expect("version pattern is valid")
    })
}

/// Parse `git --version` output (or a bare version string).
///
/// Returns `None` when the text does not start with a numeric
/// `major.minor.micro` triple.
pub fn parse_version(text: &str) -> Option<EngineVersion> {
    let caps = version_pattern().captures(text.trim())?;
    let number = |i: usize| caps.get(i)?.as_str().parse::<u32>().ok();
    Some(EngineVersion::new(
        number(2)?,
        number(3)?,
        number(4)?,
        caps.get(1)?.as_str(),
    ))
}

fn render(version: (u32, u32, u32)) -> String {
    format!("{}.{}.{}", version.0, version.1, version.2)
}

/// Enforce the hard minimum on an already-parsed version.
pub fn enforce_minimum(version: Option<EngineVersion>) -> Result<EngineVersion> {
    let minimum = render(MIN_GIT_VERSION_HARD);
    let version = version.ok_or_else(|| TrustError::ToolVersionUnsupported {
        found: "unknown".to_string(),
        minimum: minimum.clone(),
    })?;

    if version.triple() < MIN_GIT_VERSION_HARD {
        return Err(TrustError::ToolVersionUnsupported {
            found: version.full,
            minimum,
        });
    }
    if version.triple() < MIN_GIT_VERSION_SOFT {
        warn!(
            version = %version,
            recommended = %render(MIN_GIT_VERSION_SOFT),
            "git is older than recommended; please upgrade"
        );
    }
    Ok(version)
}

/// Ask git for its version and refuse to continue if it is too old.
pub fn check_minimum_version(git: &Git<'_>) -> Result<EngineVersion> {
    let reported = git.version_string()?;
    let version = enforce_minimum(parse_version(&reported))?;
    debug!(version = %version, "git version accepted");
    Ok(version)
}
