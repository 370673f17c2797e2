//! Signed-tag verification.
//!
//! A commit is trusted when the nearest annotated tag in its history carries
//! a valid signature. Commits past the tag (hotfixes on a release branch)
//! fall back to that signed release instead of failing outright.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;
use tracing::{info, warn};

use crate::error::TrustError;
use crate::git::Git;
use crate::Result;

fn describe_suffix() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^(.*)-[0-9]+-g[0-9a-f]+$").expect("describe pattern is valid")
    })
}

/// Split `git describe` output into the base tag and whether the commit is
/// ahead of it.
pub fn parse_describe(described: &str) -> (&str, bool) {
    match describe_suffix().captures(described).and_then(|c| c.get(1)) {
        Some(tag) => (tag.as_str(), true),
        None => (described, false),
    }
}

/// Checks commits against the release signing keys in a GnuPG home.
pub struct SignatureVerifier {
    gnupg_home: PathBuf,
}

impl SignatureVerifier {
    pub fn new(gnupg_home: impl Into<PathBuf>) -> Self {
        SignatureVerifier {
            gnupg_home: gnupg_home.into(),
        }
    }

    /// Verify `commit` descends from a signed tag and return `<tag>^0`.
    ///
    /// `remote_ref` only names the revision in diagnostics.
    pub fn verify(
        &self,
        git: &Git<'_>,
        repo: &Path,
        remote_ref: Option<&str>,
        commit: &str,
        quiet: bool,
    ) -> Result<String> {
        let subject = remote_ref.unwrap_or(commit);
        let trust_failure = |reason: &str, source: Option<TrustError>| {
            TrustError::TrustVerificationFailed {
                subject: subject.to_string(),
                reason: reason.to_string(),
                source: source.map(Box::new),
            }
        };

        let described = git
            .describe(repo, commit)
            .map_err(|e| trust_failure("no annotated tag reachable", Some(e)))?;
        if described.is_empty() {
            return Err(trust_failure("describe produced no tag", None));
        }

        let (tag, ahead) = parse_describe(&described);
        if ahead && !quiet {
            warn!(
                "'{}' is not signed; falling back to signed release '{}'",
                subject, tag
            );
        }

        git.verify_tag(repo, tag, &self.gnupg_home)
            .map_err(|e| trust_failure("tag signature did not verify", Some(e)))?;

        info!(tag = %tag, commit = %commit, "signed release verified");
        Ok(format!("{tag}^0"))
    }
}
