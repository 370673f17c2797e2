//! Revision resolution.
//!
//! A user-supplied revision may be an explicit ref, a short branch name, a
//! tag name, or a (possibly abbreviated) commit id. Each interpretation is a
//! [`ResolutionStrategy`]; [`RevisionResolver`] tries them in a fixed order
//! and the first that produces a commit wins.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::TrustError;
use crate::git::Git;
use crate::Result;

/// Shortest commit-id prefix accepted.
pub const MIN_COMMIT_PREFIX: usize = 4;

/// A revision pinned to an exact commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedRevision {
    /// Fully-qualified ref (`refs/heads/x`, `refs/tags/x`); `None` for a bare commit.
    pub remote_ref: Option<String>,
    /// Full commit id present in the local object store.
    pub commit: String,
}

impl ResolvedRevision {
    pub fn new(remote_ref: Option<String>, commit: String) -> Self {
        ResolvedRevision { remote_ref, commit }
    }

    /// The ref if there is one, otherwise the commit id.
    pub fn display_ref(&self) -> &str {
        self.remote_ref.as_deref().unwrap_or(&self.commit)
    }
}

/// What strategies can ask of the repository.
pub struct ResolveContext<'a> {
    pub git: &'a Git<'a>,
    pub repo: &'a Path,
    pub remote: &'a str,
}

impl ResolveContext<'_> {
    /// Commit behind the exact ref `refname`, if that ref exists.
    fn commit_of_ref(&self, refname: &str) -> Result<Option<String>> {
        if !self.git.ref_exists(self.repo, refname)? {
            return Ok(None);
        }
        self.git.resolve_commit(self.repo, refname)
    }
}

/// One way of interpreting a revision specifier.
pub trait ResolutionStrategy {
    fn name(&self) -> &'static str;

    /// `Ok(None)` hands the spec to the next strategy; an error ends
    /// resolution immediately.
    fn attempt(&self, ctx: &ResolveContext<'_>, spec: &str) -> Result<Option<ResolvedRevision>>;
}

/// `refs/heads/*` or `refs/tags/*`; never falls through.
pub struct ExplicitRef;

impl ResolutionStrategy for ExplicitRef {
    fn name(&self) -> &'static str {
        "explicit-ref"
    }

    fn attempt(&self, ctx: &ResolveContext<'_>, spec: &str) -> Result<Option<ResolvedRevision>> {
        let lookup = if let Some(branch) = spec.strip_prefix("refs/heads/") {
            format!("refs/remotes/{}/{branch}", ctx.remote)
        } else if spec.starts_with("refs/tags/") {
            spec.to_string()
        } else {
            return Ok(None);
        };

        match ctx.commit_of_ref(&lookup)? {
            Some(commit) => Ok(Some(ResolvedRevision::new(Some(spec.to_string()), commit))),
            None => Err(TrustError::RevisionNotFound {
                spec: spec.to_string(),
            }),
        }
    }
}

/// Short branch name backed by a remote-tracking branch.
pub struct BranchName;

impl ResolutionStrategy for BranchName {
    fn name(&self) -> &'static str {
        "branch"
    }

    fn attempt(&self, ctx: &ResolveContext<'_>, spec: &str) -> Result<Option<ResolvedRevision>> {
        let tracking = format!("refs/remotes/{}/{spec}", ctx.remote);
        Ok(ctx
            .commit_of_ref(&tracking)?
            .map(|commit| ResolvedRevision::new(Some(format!("refs/heads/{spec}")), commit)))
    }
}

/// Short tag name.
pub struct TagName;

impl ResolutionStrategy for TagName {
    fn name(&self) -> &'static str {
        "tag"
    }

    fn attempt(&self, ctx: &ResolveContext<'_>, spec: &str) -> Result<Option<ResolvedRevision>> {
        let tag = format!("refs/tags/{spec}");
        Ok(ctx
            .commit_of_ref(&tag)?
            .map(|commit| ResolvedRevision::new(Some(tag), commit)))
    }
}

/// Full or abbreviated commit id that names exactly one commit.
pub struct CommitId;

impl ResolutionStrategy for CommitId {
    fn name(&self) -> &'static str {
        "commit"
    }

    fn attempt(&self, ctx: &ResolveContext<'_>, spec: &str) -> Result<Option<ResolvedRevision>> {
        if !looks_like_commit_prefix(spec) {
            return Ok(None);
        }
        // Objects of every type count, so a prefix shared by a blob and a
        // commit is ambiguous rather than quietly picking the commit.
        let prefix = spec.to_ascii_lowercase();
        let candidates = ctx.git.disambiguate(ctx.repo, &prefix)?;
        let [id] = candidates.as_slice() else {
            return Ok(None);
        };
        // The single match must itself be a commit, not a tag or tree.
        Ok(ctx
            .git
            .resolve_commit(ctx.repo, id)?
            .filter(|commit| commit == id)
            .map(|commit| ResolvedRevision::new(None, commit)))
    }
}

fn looks_like_commit_prefix(spec: &str) -> bool {
    (MIN_COMMIT_PREFIX..=64).contains(&spec.len()) && spec.bytes().all(|b| b.is_ascii_hexdigit())
}

/// Ordered list of strategies; earlier entries take precedence.
pub struct RevisionResolver {
    strategies: Vec<Box<dyn ResolutionStrategy>>,
    remote: String,
}

impl RevisionResolver {
    /// Explicit ref, then branch, then tag, then commit id.
    pub fn new(remote: &str) -> Self {
        Self::with_strategies(
            remote,
            vec![
                Box::new(ExplicitRef),
                Box::new(BranchName),
                Box::new(TagName),
                Box::new(CommitId),
            ],
        )
    }

    pub fn with_strategies(remote: &str, strategies: Vec<Box<dyn ResolutionStrategy>>) -> Self {
        RevisionResolver {
            strategies,
            remote: remote.to_string(),
        }
    }

    pub fn strategy_names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    /// Resolve `spec` in `repo` to a ref and a full commit id.
    pub fn resolve(&self, git: &Git<'_>, repo: &Path, spec: &str) -> Result<ResolvedRevision> {
        let ctx = ResolveContext {
            git,
            repo,
            remote: &self.remote,
        };
        for strategy in &self.strategies {
            if let Some(resolved) = strategy.attempt(&ctx, spec)? {
                info!(
                    spec = %spec,
                    strategy = strategy.name(),
                    commit = %resolved.commit,
                    "resolved revision"
                );
                return Ok(resolved);
            }
            debug!(spec = %spec, strategy = strategy.name(), "no match");
        }
        Err(TrustError::RevisionNotFound {
            spec: spec.to_string(),
        })
    }
}
