//! Lookup of profile documents by name.
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use super::document::{Encoding, Profile};
use crate::error::ProfileError;

/// Source of profile documents.
///
/// The resolver only needs "give me the profile called `name`", so tests can
/// supply profiles from memory instead of the `profiles/` directory.
pub trait ProfileLoader {
    /// Load and validate the profile called `name`.
    ///
    /// # Errors
    ///
    /// Returns [`ProfileError::NotFound`] if no such profile exists, or a
    /// schema/IO error if the document is unusable.
    fn load(&self, name: &str) -> Result<Profile, ProfileError>;
}

/// Loads `profiles/<name>.{json,yaml,yml,pfp}` from disk.
#[derive(Debug, Clone)]
pub struct FsProfileLoader {
    dir: PathBuf,
}

impl FsProfileLoader {
    /// Create a loader reading from `dir`.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Directory profiles are read from.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Find the single document for `name`.
    fn locate(&self, name: &str) -> Result<(PathBuf, Encoding), ProfileError> {
        let not_found = || ProfileError::NotFound {
            name: name.to_string(),
            dir: self.dir.clone(),
        };

        if name.is_empty() || name.contains(['/', '\\']) || name == "." || name == ".." {
            return Err(not_found());
        }

        let entries = std::fs::read_dir(&self.dir).map_err(|source| ProfileError::Io {
            path: self.dir.clone(),
            source,
        })?;

        let mut matches: Vec<(PathBuf, Encoding)> = entries
            .filter_map(Result::ok)
            .map(|e| e.path())
            .filter(|p| p.is_file())
            .filter(|p| p.file_stem().and_then(|s| s.to_str()) == Some(name))
            .filter_map(|p| {
                let encoding = p
                    .extension()
                    .and_then(|e| e.to_str())
                    .and_then(Encoding::from_extension)?;
                Some((p, encoding))
            })
            .collect();
        matches.sort_by(|a, b| a.0.cmp(&b.0));

        match matches.len() {
            0 => Err(not_found()),
            1 => Ok(matches.remove(0)),
            _ => Err(ProfileError::Schema {
                profile: name.to_string(),
                field: "<file>".to_string(),
                message: format!(
                    "ambiguous profile, found {}",
                    matches
                        .iter()
                        .filter_map(|(p, _)| p.file_name().map(|f| f.to_string_lossy().to_string()))
                        .collect::<Vec<_>>()
                        .join(", ")
                ),
            }),
        }
    }
}

impl ProfileLoader for FsProfileLoader {
    fn load(&self, name: &str) -> Result<Profile, ProfileError> {
        let (path, encoding) = self.locate(name)?;
        tracing::debug!("loading profile {name} from {}", path.display());
        let content = std::fs::read_to_string(&path).map_err(|source| ProfileError::Io {
            path: path.clone(),
            source,
        })?;
        Profile::parse(name, &content, encoding)
    }
}

impl ProfileLoader for HashMap<String, Profile> {
    fn load(&self, name: &str) -> Result<Profile, ProfileError> {
        let profile = self.get(name).cloned().ok_or_else(|| ProfileError::NotFound {
            name: name.to_string(),
            dir: PathBuf::from("<memory>"),
        })?;
        profile.validate(name)?;
        Ok(profile)
    }
}
