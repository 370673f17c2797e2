//! Typed git invocations used by resolution and verification.

use std::path::Path;

use crate::error::TrustError;
use crate::exec::{CommandExecutor, CommandResult, Invocation};
use crate::Result;

/// Thin wrapper that runs the git program through a [`CommandExecutor`].
pub struct Git<'a> {
    exec: &'a dyn CommandExecutor,
    program: String,
}

impl<'a> Git<'a> {
    pub fn new(exec: &'a dyn CommandExecutor) -> Self {
        Self::with_program(exec, "git")
    }

    pub fn with_program(exec: &'a dyn CommandExecutor, program: impl Into<String>) -> Self {
        Git {
            exec,
            program: program.into(),
        }
    }

    /// Base invocation of git with `args`, optionally inside `cwd`.
    pub fn invocation(&self, cwd: Option<&Path>, args: &[&str]) -> Invocation {
        let inv = Invocation::new(self.program.as_str()).args(args.iter().copied());
        match cwd {
            Some(dir) => inv.current_dir(dir),
            None => inv,
        }
    }

    pub fn run(&self, cwd: Option<&Path>, args: &[&str], check: bool) -> Result<CommandResult> {
        self.exec.run(&self.invocation(cwd, args).check(check))
    }

    pub fn run_invocation(&self, invocation: &Invocation) -> Result<CommandResult> {
        self.exec.run(invocation)
    }

    /// Raw `git --version` output.
    pub fn version_string(&self) -> Result<String> {
        Ok(self.run(None, &["--version"], true)?.stdout)
    }

    /// Resolve `rev` to the full id of the commit it names.
    ///
    /// Returns `None` when git cannot resolve it (unknown, ambiguous, or not
    /// a commit).
    pub fn resolve_commit(&self, repo: &Path, rev: &str) -> Result<Option<String>> {
        let peeled = format!("{rev}^{{commit}}");
        let ret = self.run(
            Some(repo),
            &["rev-parse", "--verify", "--quiet", &peeled],
            false,
        )?;
        if !ret.success() {
            return Ok(None);
        }

        let id = ret.stdout.trim();
        if !is_full_object_id(id) {
            return Err(TrustError::UnexpectedOutput {
                command: format!("git rev-parse {peeled}"),
                output: ret.stdout.clone(),
            });
        }
        Ok(Some(id.to_string()))
    }

    /// Whether `refname` exists verbatim as a ref; revision syntax such as
    /// `stable~1` never matches.
    pub fn ref_exists(&self, repo: &Path, refname: &str) -> Result<bool> {
        let ret = self.run(
            Some(repo),
            &["show-ref", "--verify", "--quiet", refname],
            false,
        )?;
        Ok(ret.success())
    }

    /// Every object id starting with `prefix`, of any object type.
    pub fn disambiguate(&self, repo: &Path, prefix: &str) -> Result<Vec<String>> {
        let flag = format!("--disambiguate={prefix}");
        let ret = self.run(Some(repo), &["rev-parse", &flag], false)?;
        if !ret.success() {
            return Ok(Vec::new());
        }

        let ids: Vec<String> = ret.stdout.split_whitespace().map(str::to_string).collect();
        if let Some(bad) = ids.iter().find(|id| !is_full_object_id(id)) {
            return Err(TrustError::UnexpectedOutput {
                command: format!("git rev-parse {flag}"),
                output: bad.clone(),
            });
        }
        Ok(ids)
    }

    /// Name `commit` relative to the nearest reachable annotated tag.
    pub fn describe(&self, repo: &Path, commit: &str) -> Result<String> {
        let ret = self.run(Some(repo), &["describe", commit], true)?;
        Ok(ret.stdout.trim().to_string())
    }

    /// Check the signature of tag object `tag` against the keys in `gnupg_home`.
    pub fn verify_tag(&self, repo: &Path, tag: &str, gnupg_home: &Path) -> Result<CommandResult> {
        let inv = self
            .invocation(Some(repo), &["tag", "-v", tag])
            .env("GNUPGHOME", gnupg_home.to_string_lossy());
        self.exec.run(&inv)
    }
}

/// Whether `id` is a complete lowercase SHA-1 or SHA-256 object id.
pub fn is_full_object_id(id: &str) -> bool {
    matches!(id.len(), 40 | 64) && id.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}
