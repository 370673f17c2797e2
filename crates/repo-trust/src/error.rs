//! Error types for repo-trust

use thiserror::Error;

use crate::exec::CommandResult;

/// Errors that can occur while resolving or verifying a launcher revision.
///
/// None of these are retried internally; they propagate to the outermost
/// caller which reports them and exits non-zero.
#[derive(Error, Debug)]
pub enum TrustError {
    /// The version-control engine is too old, or its version is unparseable.
    #[error("unsupported git version {found}; {minimum} or newer is required")]
    ToolVersionUnsupported { found: String, minimum: String },

    /// An external command exited non-zero while `check` was requested.
    #[error("command failed ({command}) with exit status {}: {}", .result.status, .result.stderr.trim())]
    CommandFailure {
        command: String,
        result: CommandResult,
    },

    /// No interpretation of the revision specifier matched.
    #[error("unable to resolve revision {spec}")]
    RevisionNotFound { spec: String },

    /// Describe or signature checking did not establish a signed ancestor.
    #[error("signature verification failed for {subject}: {reason}")]
    TrustVerificationFailed {
        subject: String,
        reason: String,
        #[source]
        source: Option<Box<TrustError>>,
    },

    /// Trust anchors could not be installed.
    #[error("keyring setup failed: {reason}")]
    KeyringSetupFailed {
        reason: String,
        #[source]
        source: Option<Box<TrustError>>,
    },

    /// The program could not be started at all.
    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// A tool produced output without the expected structure.
    #[error("unexpected output from {command}: {output:?}")]
    UnexpectedOutput { command: String, output: String },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl TrustError {
    /// Whether this error means the program itself is not installed.
    pub fn is_missing_program(&self) -> bool {
        matches!(
            self,
            TrustError::Spawn { source, .. } if source.kind() == std::io::ErrorKind::NotFound
        )
    }
}
