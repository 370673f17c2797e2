//! Scripted command executor (testing only)
//!
//! Provides `ScriptedExecutor`, which answers each spawn with the next canned
//! response and records what was asked of it, so resolution, verification
//! and keyring logic can be exercised without real git or gpg.

use std::collections::VecDeque;
use std::sync::Mutex;

use crate::error::TrustError;
use crate::exec::{CommandExecutor, CommandResult, Invocation};
use crate::Result;

#[derive(Debug)]
enum Response {
    Output(CommandResult),
    SpawnError(std::io::ErrorKind),
}

/// Executor that replays responses in FIFO order.
#[derive(Debug, Default)]
pub struct ScriptedExecutor {
    responses: Mutex<VecDeque<Response>>,
    invocations: Mutex<Vec<Invocation>>,
}

impl ScriptedExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a completed command with the given status and output.
    pub fn respond(self, status: i32, stdout: &str, stderr: &str) -> Self {
        self.responses
            .lock()
            .unwrap()
            .push_back(Response::Output(CommandResult::new(status, stdout, stderr)));
        self
    }

    /// Queue a successful command printing `stdout`.
    pub fn ok(self, stdout: &str) -> Self {
        self.respond(0, stdout, "")
    }

    /// Queue a failed command printing `stderr`.
    pub fn fail(self, status: i32, stderr: &str) -> Self {
        self.respond(status, "", stderr)
    }

    /// Queue a failure to start the program.
    pub fn spawn_error(self, kind: std::io::ErrorKind) -> Self {
        self.responses
            .lock()
            .unwrap()
            .push_back(Response::SpawnError(kind));
        self
    }

    /// Every invocation seen so far, in order.
    pub fn invocations(&self) -> Vec<Invocation> {
        self.invocations.lock().unwrap().clone()
    }

    /// Number of queued responses not yet consumed.
    pub fn remaining(&self) -> usize {
        self.responses.lock().unwrap().len()
    }
}

impl CommandExecutor for ScriptedExecutor {
    fn spawn(&self, invocation: &Invocation) -> Result<CommandResult> {
        self.invocations.lock().unwrap().push(invocation.clone());
        let next = self.responses.lock().unwrap().pop_front();
        match next {
            Some(Response::Output(result)) => Ok(result),
            Some(Response::SpawnError(kind)) => Err(TrustError::Spawn {
                program: invocation.program.clone(),
                source: std::io::Error::from(kind),
            }),
            None => Err(TrustError::Spawn {
                program: invocation.program.clone(),
                source: std::io::Error::new(
                    std::io::ErrorKind::Other,
                    format!("no scripted response for `{}`", invocation.command_line()),
                ),
            }),
        }
    }
}
