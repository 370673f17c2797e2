//! External process execution.
//!
//! Everything this crate learns about the repository or the keyring comes
//! from a child process. [`CommandExecutor`] is the seam: production code
//! uses [`ProcessRunner`], tests substitute [`crate::fakes::ScriptedExecutor`].

use std::collections::BTreeMap;
use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Stdio};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::TrustError;
use crate::trace::{TraceSession, TRACE_PARENT_SID};
use crate::Result;

/// Outcome of one external command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandResult {
    /// Exit code (-1 when the child was killed by a signal).
    pub status: i32,

    /// Captured stdout (empty when output was not captured).
    pub stdout: String,

    /// Captured stderr (empty when output was not captured).
    pub stderr: String,
}

impl CommandResult {
    pub fn new(status: i32, stdout: &str, stderr: &str) -> Self {
        CommandResult {
            status,
            stdout: stdout.to_string(),
            stderr: stderr.to_string(),
        }
    }

    /// Whether the command exited with status 0.
    pub fn success(&self) -> bool {
        self.status == 0
    }
}

/// A fully described command to run.
///
/// Defaults: output captured, non-zero exit converted into
/// [`TrustError::CommandFailure`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
    pub env: BTreeMap<String, String>,
    pub input: Option<String>,
    pub capture_output: bool,
    pub check: bool,
}

impl Invocation {
    pub fn new(program: impl Into<String>) -> Self {
        Invocation {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
            env: BTreeMap::new(),
            input: None,
            capture_output: true,
            check: true,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Feed `input` to the child's stdin.
    pub fn stdin(mut self, input: impl Into<String>) -> Self {
        self.input = Some(input.into());
        self
    }

    pub fn capture_output(mut self, capture: bool) -> Self {
        self.capture_output = capture;
        self
    }

    pub fn check(mut self, check: bool) -> Self {
        self.check = check;
        self
    }

    /// Render as a shell-ish command line for diagnostics.
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Capability to run external commands.
pub trait CommandExecutor {
    /// Spawn the command once and wait for it. Must not interpret the exit
    /// status; only a failure to start the program is an error here.
    fn spawn(&self, invocation: &Invocation) -> Result<CommandResult>;

    /// Run the command, honoring [`Invocation::check`].
    fn run(&self, invocation: &Invocation) -> Result<CommandResult> {
        let result = self.spawn(invocation)?;
        if invocation.check && !result.success() {
            return Err(TrustError::CommandFailure {
                command: invocation.command_line(),
                result,
            });
        }
        Ok(result)
    }
}

/// Runs commands as real child processes, tagged with a trace session.
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    session: TraceSession,
}

impl ProcessRunner {
    pub fn new(session: TraceSession) -> Self {
        ProcessRunner { session }
    }

    pub fn session(&self) -> &TraceSession {
        &self.session
    }

    /// Environment overrides for the child, including the trace parent id.
    fn child_env(&self, invocation: &Invocation) -> BTreeMap<String, String> {
        let mut env = invocation.env.clone();
        if !env.contains_key(TRACE_PARENT_SID) {
            if let Ok(inherited) = std::env::var(TRACE_PARENT_SID) {
                env.insert(TRACE_PARENT_SID.to_string(), inherited);
            }
        }
        self.session.ensure_session_id(&mut env);
        env
    }
}

impl Default for ProcessRunner {
    fn default() -> Self {
        Self::new(TraceSession::new())
    }
}

impl CommandExecutor for ProcessRunner {
    fn spawn(&self, invocation: &Invocation) -> Result<CommandResult> {
        debug!(
            program = %invocation.program,
            args = ?invocation.args,
            trace_sid = %self.session,
            "running command"
        );

        let spawn_err = |source| TrustError::Spawn {
            program: invocation.program.clone(),
            source,
        };

        let mut cmd = Command::new(&invocation.program);
        cmd.args(&invocation.args).envs(self.child_env(invocation));
        if let Some(dir) = &invocation.cwd {
            cmd.current_dir(dir);
        }
        if invocation.input.is_some() {
            cmd.stdin(Stdio::piped());
        }
        if invocation.capture_output {
            cmd.stdout(Stdio::piped()).stderr(Stdio::piped());
        } else {
            cmd.stdout(Stdio::inherit()).stderr(Stdio::inherit());
        }

        let mut child = cmd.spawn().map_err(spawn_err)?;
        let stdin = child.stdin.take();

        // Feed stdin on its own thread while the child's output is drained,
        // so neither side can block on a full pipe. The child is always
        // reaped before a write error is reported.
        let (written, output) = std::thread::scope(|scope| {
            let writer = stdin
                .zip(invocation.input.as_deref())
                .map(|(mut pipe, input)| scope.spawn(move || pipe.write_all(input.as_bytes())));
            let output = child.wait_with_output();
            let written = match writer {
                Some(handle) => handle.join().unwrap_or_else(|_| {
                    Err(std::io::Error::new(
                        std::io::ErrorKind::Other,
                        "stdin writer panicked",
                    ))
                }),
                None => Ok(()),
            };
            (written, output)
        });
        let output = output?;
        match written {
            // The child exited without reading everything; its status says why.
            Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe => {}
            other => other?,
        }

        Ok(CommandResult {
            status: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        })
    }
}
