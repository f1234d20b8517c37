//! Domain-specific error types for the deployment engine.
//!
//! Internal modules return typed errors (e.g., [`ProfileError`],
//! [`TemplateError`]) while command handlers at the CLI boundary convert them
//! to [`anyhow::Error`] via the standard `?` operator.
//!
//! # Error hierarchy
//!
//! ```text
//! PunktfError
//! ├── Profile(ProfileError)  : source root, document schema, inheritance
//! ├── Template(TemplateError): directive syntax, unresolved variables
//! └── Deploy(DeployError)    : planner invariants, hooks, filesystem I/O
//! ```

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::deploy::hooks::HookStage;

/// Top-level error type for the deployment engine.
#[derive(Error, Debug)]
pub enum PunktfError {
    /// Profile loading or resolution failed.
    #[error("Profile error: {0}")]
    Profile(#[from] ProfileError),

    /// A template could not be rendered.
    #[error("Template error: {0}")]
    Template(#[from] TemplateError),

    /// Planning or execution of the deployment failed.
    #[error("Deployment error: {0}")]
    Deploy(#[from] DeployError),
}

/// Errors that arise from the source tree and profile resolution.
#[derive(Error, Debug)]
pub enum ProfileError {
    /// No profile document with the requested name exists.
    #[error("profile '{name}' not found in {}", dir.display())]
    NotFound {
        /// Requested profile name.
        name: String,
        /// Directory that was searched.
        dir: PathBuf,
    },

    /// The `extends` chain loops back on itself.
    #[error("cyclic profile inheritance: {}", cycle.join(" -> "))]
    CyclicInheritance {
        /// Profile names along the cycle, starting and ending with the same name.
        cycle: Vec<String>,
    },

    /// A profile document is malformed.
    #[error("invalid profile '{profile}' at `{field}`: {message}")]
    Schema {
        /// Name of the offending profile.
        profile: String,
        /// Field path inside the document (e.g. `items[2].target`).
        field: String,
        /// Human-readable description of the problem.
        message: String,
    },

    /// The source root is missing or lacks the expected layout.
    #[error("invalid source directory {}: {reason}", path.display())]
    InvalidSource {
        /// Source root that was inspected.
        path: PathBuf,
        /// Why it was rejected.
        reason: String,
    },

    /// A profile document could not be read.
    #[error("IO error reading profile {}: {source}", path.display())]
    Io {
        /// Path to the document.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
}

/// Errors that arise while rendering templates.
#[derive(Error, Debug)]
pub enum TemplateError {
    /// One or more variable references had no value under their selector.
    #[error("unresolved variable(s) {} in {}", names.join(", "), origin(file.as_deref()))]
    UnresolvedVariable {
        /// Template file, if known.
        file: Option<PathBuf>,
        /// Referenced names (with their prefixes) in order of first use.
        names: Vec<String>,
    },

    /// A directive is malformed.
    #[error("syntax error in {} at byte {offset}: {message}", origin(file.as_deref()))]
    Syntax {
        /// Template file, if known.
        file: Option<PathBuf>,
        /// Byte offset of the offending directive.
        offset: usize,
        /// Human-readable description of the problem.
        message: String,
    },
}

impl TemplateError {
    /// Attach the originating file to the error.
    #[must_use]
    pub fn in_file(self, path: &Path) -> Self {
        match self {
            Self::UnresolvedVariable { names, .. } => Self::UnresolvedVariable {
                file: Some(path.to_path_buf()),
                names,
            },
            Self::Syntax {
                offset, message, ..
            } => Self::Syntax {
                file: Some(path.to_path_buf()),
                offset,
                message,
            },
        }
    }
}

fn origin(file: Option<&Path>) -> String {
    file.map_or_else(|| "<template>".to_string(), |p| p.display().to_string())
}

/// Errors that arise during planning and execution.
#[derive(Error, Debug)]
pub enum DeployError {
    /// Two entries map to the same output path after resolution.
    #[error("merge conflict at {}: '{first}' and '{second}' target the same path", path.display())]
    MergeConflict {
        /// Conflicting output path.
        path: PathBuf,
        /// Item path of the first claimant.
        first: String,
        /// Item path of the second claimant.
        second: String,
    },

    /// A hook exited non-zero or could not be spawned.
    #[error("{stage} hook `{command}` failed (exit {}): {stderr}", code.map_or_else(|| "none".to_string(), |c| c.to_string()))]
    HookExecution {
        /// Stage the hook belongs to.
        stage: HookStage,
        /// Command line as written in the profile.
        command: String,
        /// Exit code, if the process terminated normally.
        code: Option<i32>,
        /// Captured standard error output.
        stderr: String,
    },

    /// A filesystem operation failed.
    #[error("IO error at {}: {source}", path.display())]
    Io {
        /// Path the operation was applied to.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The run was cancelled before all items were processed.
    #[error("deployment interrupted")]
    Interrupted,
}
