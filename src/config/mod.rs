//! Source tree layout and profile configuration.
pub mod document;
pub mod loader;
pub mod profiles;

pub use document::{Encoding, Item, MergeMode, Profile, Target, Variable};
pub use loader::{FsProfileLoader, ProfileLoader};
pub use profiles::{ResolvedItem, ResolvedProfile, TargetOverrides, resolve, resolve_with};

use std::path::{Path, PathBuf};

use crate::error::ProfileError;

/// Name of the directory holding profile documents.
pub const PROFILES_DIR: &str = "profiles";

/// Name of the directory holding deployable files.
pub const ITEMS_DIR: &str = "items";

/// A validated source root containing `profiles/` and `items/`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PunktfSource {
    /// Canonical source root.
    pub root: PathBuf,
    /// `<root>/profiles`
    pub profiles: PathBuf,
    /// `<root>/items`
    pub items: PathBuf,
}

impl PunktfSource {
    /// Validate `root` and build the source layout.
    ///
    /// # Errors
    ///
    /// Returns [`ProfileError::InvalidSource`] if the root or one of its
    /// required subdirectories does not exist.
    pub fn from_root(root: &Path) -> Result<Self, ProfileError> {
        let root = dunce::canonicalize(root).map_err(|e| ProfileError::InvalidSource {
            path: root.to_path_buf(),
            reason: e.to_string(),
        })?;
        if !root.is_dir() {
            return Err(ProfileError::InvalidSource {
                path: root,
                reason: "not a directory".to_string(),
            });
        }

        let profiles = root.join(PROFILES_DIR);
        let items = root.join(ITEMS_DIR);
        for (dir, name) in [(&profiles, PROFILES_DIR), (&items, ITEMS_DIR)] {
            if !dir.is_dir() {
                return Err(ProfileError::InvalidSource {
                    path: root.clone(),
                    reason: format!("missing `{name}` directory"),
                });
            }
        }

        Ok(Self {
            root,
            profiles,
            items,
        })
    }

    /// Locate the source root.
    ///
    /// An explicit path (the `--source` flag, which already includes
    /// `PUNKTF_SOURCE`) wins; otherwise the current directory is used.
    ///
    /// # Errors
    ///
    /// Returns [`ProfileError::InvalidSource`] if the chosen directory is not
    /// a valid source root.
    pub fn discover(explicit: Option<&Path>) -> Result<Self, ProfileError> {
        match explicit {
            Some(path) => Self::from_root(path),
            None => {
                let cwd = std::env::current_dir().map_err(|e| ProfileError::InvalidSource {
                    path: PathBuf::from("."),
                    reason: e.to_string(),
                })?;
                Self::from_root(&cwd)
            }
        }
    }

    /// Loader for the profiles of this source.
    #[must_use]
    pub fn loader(&self) -> FsProfileLoader {
        FsProfileLoader::new(&self.profiles)
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn from_root_accepts_valid_layout() {
        let tmp = tempfile::tempdir().unwrap();
        fs::create_dir(tmp.path().join("profiles")).unwrap();
        fs::create_dir(tmp.path().join("items")).unwrap();
        let source = PunktfSource::from_root(tmp.path()).unwrap();
        assert_eq!(source.root, dunce::canonicalize(tmp.path()).unwrap());
        assert!(source.profiles.ends_with("profiles"));
        assert!(source.items.ends_with("items"));
        assert_eq!(source.loader().dir(), source.profiles);
    }

    #[test]
    fn from_root_requires_profiles_dir() {
        let tmp = tempfile::tempdir().unwrap();
        fs::create_dir(tmp.path().join("items")).unwrap();
        let err = PunktfSource::from_root(tmp.path()).unwrap_err();
        assert!(err.to_string().contains("missing `profiles` directory"));
    }

    #[test]
    fn from_root_rejects_missing_root() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(matches!(
            PunktfSource::from_root(&tmp.path().join("nope")),
            Err(ProfileError::InvalidSource { .. })
        ));
    }

    #[test]
    fn discover_prefers_explicit_path() {
        let tmp = tempfile::tempdir().unwrap();
        fs::create_dir(tmp.path().join("profiles")).unwrap();
        fs::create_dir(tmp.path().join("items")).unwrap();
        let source = PunktfSource::discover(Some(tmp.path())).unwrap();
        assert_eq!(source.root, dunce::canonicalize(tmp.path()).unwrap());
    }
}
