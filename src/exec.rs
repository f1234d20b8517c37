//! Process execution for hook commands.
//!
//! Hooks are free-form command lines, so they are handed to the platform
//! shell (`sh -c` on Unix, `cmd /C` on Windows). The [`Executor`] trait lets
//! the deploy engine be tested without spawning processes.
use anyhow::{Context, Result};
use std::path::Path;
use std::process::{Command, Output};

/// Captured output of a finished hook.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecResult {
    /// Standard output, lossily decoded.
    pub stdout: String,
    /// Standard error, lossily decoded.
    pub stderr: String,
    /// Whether the shell exited with status zero.
    pub success: bool,
    /// Exit code; `None` when killed by a signal.
    pub code: Option<i32>,
}

impl From<Output> for ExecResult {
    fn from(output: Output) -> Self {
        Self {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            success: output.status.success(),
            code: output.status.code(),
        }
    }
}

/// Runs shell command lines.
#[cfg_attr(test, mockall::automock)]
pub trait Executor: Send + Sync + std::fmt::Debug {
    /// Run `command` through the platform shell inside `dir`.
    ///
    /// A non-zero exit is reported through [`ExecResult::success`], not as
    /// an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the shell cannot be spawned.
    fn run_shell(&self, dir: &Path, command: &str, env: &[(String, String)]) -> Result<ExecResult>;
}

/// Production [`Executor`] backed by [`std::process::Command`].
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemExecutor;

impl Executor for SystemExecutor {
    fn run_shell(&self, dir: &Path, command: &str, env: &[(String, String)]) -> Result<ExecResult> {
        let mut cmd = shell_command(command);
        cmd.current_dir(dir);
        for (k, v) in env {
            cmd.env(k, v);
        }
        cmd.output()
            .map(ExecResult::from)
            .with_context(|| format!("cannot spawn shell for hook `{command}`"))
    }
}

/// Build a [`Command`] that hands `line` to the platform shell.
#[must_use]
pub fn shell_command(line: &str) -> Command {
    #[cfg(windows)]
    {
        let mut cmd = Command::new("cmd");
        cmd.args(["/C", line]);
        cmd
    }
    #[cfg(not(windows))]
    {
        let mut cmd = Command::new("sh");
        cmd.args(["-c", line]);
        cmd
    }
}
