//! Trust policy: resolve a revision and, unless opted out, prove it is
//! anchored to a signed release.

use std::path::Path;

use tracing::{debug, info};

use crate::config::TrustConfig;
use crate::error::TrustError;
use crate::exec::CommandExecutor;
use crate::git::Git;
use crate::keyring::KeyringManager;
use crate::resolve::{ResolvedRevision, RevisionResolver};
use crate::verify::SignatureVerifier;
use crate::Result;

pub struct TrustPolicy<'a> {
    git: Git<'a>,
    keyring: KeyringManager<'a>,
    resolver: RevisionResolver,
    verifier: SignatureVerifier,
}

impl<'a> TrustPolicy<'a> {
    pub fn new(exec: &'a dyn CommandExecutor, config: &TrustConfig) -> Self {
        TrustPolicy {
            git: Git::with_program(exec, config.git_program.as_str()),
            keyring: KeyringManager::new(exec, config),
            resolver: RevisionResolver::new(&config.remote),
            verifier: SignatureVerifier::new(config.gnupg_dir()),
        }
    }

    pub fn git(&self) -> &Git<'a> {
        &self.git
    }

    pub fn keyring(&self) -> &KeyringManager<'a> {
        &self.keyring
    }

    pub fn resolver(&self) -> &RevisionResolver {
        &self.resolver
    }

    /// Whether verification should run, installing trust anchors if needed.
    ///
    /// Always `false` when verification was not requested; otherwise the
    /// outcome of keyring setup when the keyring is stale.
    pub fn check_verify(&self, requested: bool, quiet: bool) -> Result<bool> {
        if !requested {
            debug!("revision verification disabled by caller");
            return Ok(false);
        }
        if !self.keyring.needs_setup() {
            return Ok(true);
        }
        self.keyring
            .setup(quiet)
            .map_err(|e| TrustError::KeyringSetupFailed {
                reason: "could not install release signing keys".to_string(),
                source: Some(Box::new(e)),
            })
    }

    /// Resolve `spec` in `repo`, verifying it against signed releases when
    /// `verify` is set.
    ///
    /// With verification the returned commit is the signed release's commit,
    /// not the resolver's first answer.
    pub fn check_revision(
        &self,
        repo: &Path,
        spec: &str,
        verify: bool,
        quiet: bool,
    ) -> Result<ResolvedRevision> {
        if !verify {
            return self.resolver.resolve(&self.git, repo, spec);
        }

        if !self.check_verify(true, quiet)? {
            return Err(TrustError::KeyringSetupFailed {
                reason: format!(
                    "release signing keys are not installed in {}",
                    self.keyring.root().display()
                ),
                source: None,
            });
        }

        let resolved = self.resolver.resolve(&self.git, repo, spec)?;
        let signed = self.verifier.verify(
            &self.git,
            repo,
            resolved.remote_ref.as_deref(),
            &resolved.commit,
            quiet,
        )?;
        let commit = self
            .git
            .resolve_commit(repo, &signed)?
            .ok_or_else(|| TrustError::RevisionNotFound {
                spec: signed.clone(),
            })?;

        info!(spec = %spec, signed = %signed, commit = %commit, "revision verified");
        Ok(ResolvedRevision::new(resolved.remote_ref, commit))
    }
}
