//! repo-trust - launcher revision checks
//!
//! The `repo-trust` command exposes the launcher's trust core.
//!
//! ## Commands
//!
//! - `version`: Check the installed git is new enough
//! - `resolve`: Pin a revision to an exact commit
//! - `check`: Resolve and verify a revision against signed releases
//! - `keyring`: Inspect or install release signing keys
//! - `trace-id`: Print this process's git trace2 session id

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::{info, Level};

use repo_trust::{
    check_minimum_version, CommandExecutor, EngineVersion, KeyringVersion, ProcessRunner,
    ResolvedRevision, TraceSession, TrustConfig, TrustPolicy,
};

#[derive(Parser)]
#[command(name = "repo-trust")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Resolve and verify repo launcher revisions", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines and results
    #[arg(long, global = true)]
    json: bool,

    /// Suppress warnings and progress notices
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Base directory holding `.repoconfig` (default: $REPO_CONFIG_DIR or $HOME)
    #[arg(long, global = true)]
    config_dir: Option<PathBuf>,

    /// Remote whose tracking branches back branch names
    #[arg(long, global = true)]
    remote: Option<String>,

    /// ASCII-armored release signing keys to import
    #[arg(long, global = true, env = "REPO_TRUST_KEYS")]
    keys: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check that git meets the minimum supported version
    Version,

    /// Resolve a branch, tag or commit to an exact commit
    Resolve {
        /// Path to the control repository checkout
        repo: PathBuf,

        /// Revision: branch, tag, refs/heads/*, refs/tags/*, or commit id
        spec: String,
    },

    /// Resolve a revision and verify it descends from a signed release
    Check {
        /// Path to the control repository checkout
        repo: PathBuf,

        /// Revision: branch, tag, refs/heads/*, refs/tags/*, or commit id
        spec: String,

        /// Do not verify the revision against release signing keys
        #[arg(long)]
        no_repo_verify: bool,
    },

    /// Release signing keyring operations
    Keyring {
        #[command(subcommand)]
        action: KeyringAction,
    },

    /// Print the git trace2 session id used for child processes
    TraceId,
}

#[derive(Subcommand)]
enum KeyringAction {
    /// Show installed and required keyset versions
    Status,

    /// Install or upgrade the release signing keys
    Setup {
        /// Re-import even when the keyring is current
        #[arg(long)]
        force: bool,
    },
}

#[derive(Serialize)]
struct KeyringStatus {
    root: PathBuf,
    installed: Option<String>,
    required: String,
    needs_setup: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else if cli.quiet {
        Level::ERROR
    } else {
        Level::INFO
    };
    repo_trust::init_tracing(cli.json, level);

    let config = build_config(&cli);
    let runner = ProcessRunner::new(TraceSession::new());

    match cli.command {
        Commands::Version => {
            let version = cmd_version(&runner, &config)?;
            emit(cli.json, &version, |v| println!("git {}", v.full))
        }
        Commands::Resolve { ref repo, ref spec } => {
            cmd_version(&runner, &config)?;
            let resolved = cmd_check(&runner, &config, repo, spec, false, cli.quiet)?;
            emit(cli.json, &resolved, print_revision)
        }
        Commands::Check {
            ref repo,
            ref spec,
            no_repo_verify,
        } => {
            cmd_version(&runner, &config)?;
            let resolved = cmd_check(&runner, &config, repo, spec, !no_repo_verify, cli.quiet)?;
            emit(cli.json, &resolved, print_revision)
        }
        Commands::Keyring { ref action } => match action {
            KeyringAction::Status => {
                let status = cmd_keyring_status(&runner, &config);
                emit(cli.json, &status, |s| {
                    println!("root:      {}", s.root.display());
                    println!("installed: {}", s.installed.as_deref().unwrap_or("none"));
                    println!("required:  {}", s.required);
                    println!("current:   {}", !s.needs_setup);
                })
            }
            KeyringAction::Setup { force } => {
                cmd_keyring_setup(&runner, &config, *force, cli.quiet)
            }
        },
        Commands::TraceId => {
            println!("{}", runner.session());
            Ok(())
        }
    }
}

fn build_config(cli: &Cli) -> TrustConfig {
    let mut config = TrustConfig::from_env();
    if let Some(dir) = &cli.config_dir {
        config = config.with_config_dir(dir);
    }
    if let Some(remote) = &cli.remote {
        config = config.with_remote(remote);
    }
    if let Some(keys) = &cli.keys {
        config = config.with_maintainer_keys(keys);
    }
    config
}

fn emit<T: Serialize>(json: bool, value: &T, human: impl FnOnce(&T)) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(value)?);
    } else {
        human(value);
    }
    Ok(())
}

fn print_revision(resolved: &ResolvedRevision) {
    println!("{} {}", resolved.commit, resolved.display_ref());
}

fn cmd_version(exec: &dyn CommandExecutor, config: &TrustConfig) -> Result<EngineVersion> {
    let policy = TrustPolicy::new(exec, config);
    check_minimum_version(policy.git()).context("git version check failed")
}

fn cmd_check(
    exec: &dyn CommandExecutor,
    config: &TrustConfig,
    repo: &Path,
    spec: &str,
    verify: bool,
    quiet: bool,
) -> Result<ResolvedRevision> {
    let policy = TrustPolicy::new(exec, config);
    let resolved = policy
        .check_revision(repo, spec, verify, quiet)
        .with_context(|| format!("Failed to check revision {spec} in {}", repo.display()))?;
    info!(verified = verify, "revision {} -> {}", spec, resolved.commit);
    Ok(resolved)
}

fn cmd_keyring_status(exec: &dyn CommandExecutor, config: &TrustConfig) -> KeyringStatus {
    let policy = TrustPolicy::new(exec, config);
    let keyring = policy.keyring();
    KeyringStatus {
        root: keyring.root().to_path_buf(),
        installed: keyring.installed_version().map(|v| v.to_string()),
        required: keyring.required().to_string(),
        needs_setup: keyring.needs_setup(),
    }
}

fn cmd_keyring_setup(
    exec: &dyn CommandExecutor,
    config: &TrustConfig,
    force: bool,
    quiet: bool,
) -> Result<()> {
    let policy = TrustPolicy::new(exec, config);
    let keyring = policy.keyring();
    if !force && !keyring.needs_setup() {
        println!("Keyring is current (keyset ver {})", KeyringVersion::current());
        return Ok(());
    }
    if !keyring.setup(quiet).context("Failed to install release signing keys")? {
        anyhow::bail!(
            "release signing keys could not be installed in {}",
            keyring.root().display()
        );
    }
    let installed = keyring
        .installed_version()
        .unwrap_or_else(|| keyring.required().clone());
    println!("Installed keyset ver {installed}");
    Ok(())
}
