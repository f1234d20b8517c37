//! Pre- and post-deployment hooks.
//!
//! Hooks are shell command lines run sequentially through an [`Executor`].
//! They receive the `PUNKTF_CURRENT_*` variables describing the run and use
//! the source root as working directory.
use std::fmt;
use std::path::Path;

use crate::config::ResolvedProfile;
use crate::error::DeployError;
use crate::exec::Executor;
use crate::logging::Log;

/// When a hook runs relative to item deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookStage {
    /// Before any item is written.
    Pre,
    /// After all items were processed.
    Post,
}

impl fmt::Display for HookStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Pre => "pre",
            Self::Post => "post",
        })
    }
}

/// Variables describing the current run, exported to hooks and templates.
#[must_use]
pub fn run_environment(source_root: &Path, profile: &ResolvedProfile) -> Vec<(String, String)> {
    let mut env = vec![(
        "PUNKTF_CURRENT_SOURCE".to_string(),
        source_root.display().to_string(),
    )];
    if let Some(target) = &profile.target {
        env.push((
            "PUNKTF_CURRENT_TARGET".to_string(),
            target.display().to_string(),
        ));
    }
    env.push(("PUNKTF_CURRENT_PROFILE".to_string(), profile.name.clone()));
    env
}

/// Runs the hooks of one stage.
#[derive(Clone, Copy)]
pub struct HookRunner<'a> {
    /// Spawns the shell.
    pub executor: &'a dyn Executor,
    /// Receives progress output.
    pub log: &'a dyn Log,
    /// Working directory for every hook.
    pub dir: &'a Path,
    /// Extra environment variables.
    pub env: &'a [(String, String)],
}

impl fmt::Debug for HookRunner<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookRunner")
            .field("executor", &self.executor)
            .field("log", &"<dyn Log>")
            .field("dir", &self.dir)
            .field("env", &self.env)
            .finish()
    }
}

impl HookRunner<'_> {
    /// Run `hooks` in order, stopping at the first failure.
    ///
    /// # Errors
    ///
    /// Returns [`DeployError::HookExecution`] if a hook cannot be spawned or
    /// exits non-zero.
    pub fn run(&self, stage: HookStage, hooks: &[String]) -> Result<(), DeployError> {
        for command in hooks {
            self.log.info(&format!("running {stage} hook: {command}"));
            let result = self
                .executor
                .run_shell(self.dir, command, self.env)
                .map_err(|e| DeployError::HookExecution {
                    stage,
                    command: command.clone(),
                    code: None,
                    stderr: format!("{e:#}"),
                })?;

            for line in result.stdout.lines() {
                self.log.debug(&format!("  {line}"));
            }
            if !result.success {
                return Err(DeployError::HookExecution {
                    stage,
                    command: command.clone(),
                    code: result.code,
                    stderr: result.stderr.trim().to_string(),
                });
            }
        }
        Ok(())
    }

    /// Log the hooks that a real run would execute.
    pub fn preview(&self, stage: HookStage, hooks: &[String]) {
        for command in hooks {
            self.log.dry_run(&format!("would run {stage} hook: {command}"));
        }
    }
}
