//! repo-trust: revision resolution and release verification for the repo
//! launcher.
//!
//! Given a revision of the launcher's control repository (branch, tag or
//! commit, possibly abbreviated) this crate pins it to an exact commit and,
//! unless the caller opts out, proves that commit is anchored to a tag signed
//! by the release keys.
//!
//! ## Flow
//!
//! 1. [`version::check_minimum_version`] gates everything on a usable git.
//! 2. [`policy::TrustPolicy::check_revision`] resolves the revision with
//!    [`resolve::RevisionResolver`], makes sure the [`keyring::KeyringManager`]
//!    is current, and checks signatures with [`verify::SignatureVerifier`].
//!
//! All external work goes through [`exec::CommandExecutor`], tagged with a
//! [`trace::TraceSession`].

pub mod config;
pub mod error;
pub mod exec;
pub mod fakes;
pub mod git;
pub mod keyring;
pub mod policy;
pub mod resolve;
pub mod telemetry;
pub mod trace;
pub mod verify;
pub mod version;

pub use config::TrustConfig;
pub use error::TrustError;
pub use exec::{CommandExecutor, CommandResult, Invocation, ProcessRunner};
pub use git::Git;
pub use keyring::{KeyringManager, KeyringVersion, KEYRING_VERSION};
pub use policy::TrustPolicy;
pub use resolve::{ResolutionStrategy, ResolvedRevision, RevisionResolver};
pub use telemetry::init_tracing;
pub use trace::{TraceSession, TRACE_PARENT_SID};
pub use verify::SignatureVerifier;
pub use version::{check_minimum_version, parse_version, EngineVersion};

/// Result type for repo-trust operations
pub type Result<T> = std::result::Result<T, TrustError>;
