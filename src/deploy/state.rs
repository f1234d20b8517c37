//! Classification of what already lives at an output path.
use std::path::Path;

use super::manifest::{Manifest, digest};
use crate::operations::FileSystemOps;

/// State of an output path before the run touches it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExistingState {
    /// Nothing exists at the path.
    Absent,
    /// Something exists that this tool did not write, or that was modified
    /// since it was written.
    Foreign,
    /// An unmodified file written by a previous run.
    Deployed {
        /// Priority the file was written with.
        priority: i64,
    },
}

/// Inspect `path` against the filesystem and the manifest.
///
/// A tracked file only counts as deployed while its content still matches
/// the recorded digest; any read failure makes it foreign.
#[must_use]
pub fn inspect(path: &Path, fs: &dyn FileSystemOps, manifest: &Manifest) -> ExistingState {
    if !fs.exists(path) {
        return ExistingState::Absent;
    }
    let Some(entry) = manifest.get(path) else {
        return ExistingState::Foreign;
    };
    match fs.read(path) {
        Ok(content) if digest(&content) == entry.digest => ExistingState::Deployed {
            priority: entry.priority,
        },
        Ok(_) => {
            tracing::debug!("{} changed since it was deployed", path.display());
            ExistingState::Foreign
        }
        Err(e) => {
            tracing::debug!("cannot read {}: {e}", path.display());
            ExistingState::Foreign
        }
    }
}
