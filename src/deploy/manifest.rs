//! Durable record of files written by previous runs.
//!
//! The manifest maps output paths to the item that produced them together
//! with a SHA-256 digest of the written bytes. It is rewritten after every
//! successful write through a temporary file that is renamed into place, so
//! an interrupted run never leaves a truncated manifest behind.
use std::collections::BTreeMap;
use std::io::Write as _;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest as _, Sha256};

use crate::error::DeployError;
use crate::operations::FileSystemOps;

/// Current on-disk format version.
const MANIFEST_VERSION: u32 = 1;

/// One file recorded in the manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    /// Profile whose item produced the file.
    pub profile: String,
    /// Item path relative to the `items/` directory.
    pub item: PathBuf,
    /// Priority the file was deployed with.
    pub priority: i64,
    /// Hex-encoded SHA-256 of the written bytes.
    pub digest: String,
    /// When the file was written.
    pub deployed_at: DateTime<Utc>,
}

/// Output path to entry mapping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    version: u32,
    #[serde(default)]
    entries: BTreeMap<PathBuf, ManifestEntry>,
}

impl Default for Manifest {
    fn default() -> Self {
        Self {
            version: MANIFEST_VERSION,
            entries: BTreeMap::new(),
        }
    }
}

impl Manifest {
    /// Entry for `path`, if tracked.
    #[must_use]
    pub fn get(&self, path: &Path) -> Option<&ManifestEntry> {
        self.entries.get(path)
    }

    /// Track `path`, replacing any previous entry.
    pub fn record(&mut self, path: PathBuf, entry: ManifestEntry) {
        self.entries.insert(path, entry);
    }

    /// Number of tracked files.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if nothing is tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Forget entries whose file no longer exists.
    pub fn prune_missing(&mut self, fs: &dyn FileSystemOps) -> usize {
        let before = self.entries.len();
        self.entries.retain(|path, _| fs.is_file(path));
        before - self.entries.len()
    }
}

/// Hex-encoded SHA-256 of `content`.
#[must_use]
pub fn digest(content: &[u8]) -> String {
    format!("{:x}", Sha256::digest(content))
}

/// A manifest bound to its file.
#[derive(Debug, Clone)]
pub struct ManifestStore {
    path: PathBuf,
    manifest: Manifest,
}

impl ManifestStore {
    /// Load the manifest at `path`; a missing file yields an empty manifest.
    ///
    /// # Errors
    ///
    /// Returns [`DeployError::Io`] if the file exists but cannot be read or
    /// decoded.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, DeployError> {
        let path = path.into();
        let manifest = match std::fs::read_to_string(&path) {
            Ok(content) => serde_json::from_str(&content).map_err(|e| DeployError::Io {
                path: path.clone(),
                source: std::io::Error::new(std::io::ErrorKind::InvalidData, e),
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Manifest::default(),
            Err(source) => return Err(DeployError::Io { path, source }),
        };
        Ok(Self { path, manifest })
    }

    /// Default location: `$XDG_STATE_HOME/punktf/manifest.json`.
    ///
    /// Falls back to the platform state (or local data) directory.
    #[must_use]
    pub fn default_path() -> Option<PathBuf> {
        std::env::var_os("XDG_STATE_HOME")
            .filter(|v| !v.is_empty())
            .map(PathBuf::from)
            .or_else(dirs::state_dir)
            .or_else(dirs::data_local_dir)
            .map(|dir| dir.join("punktf").join("manifest.json"))
    }

    /// File backing this store.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The loaded manifest.
    #[must_use]
    pub const fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    /// Mutable access to the loaded manifest.
    pub const fn manifest_mut(&mut self) -> &mut Manifest {
        &mut self.manifest
    }

    /// Write the manifest atomically (temporary file, then rename).
    ///
    /// # Errors
    ///
    /// Returns [`DeployError::Io`] if the directory cannot be created or the
    /// file cannot be written or renamed.
    pub fn save(&self) -> Result<(), DeployError> {
        let io_err = |source| DeployError::Io {
            path: self.path.clone(),
            source,
        };
        let dir = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(dir).map_err(io_err)?;

        let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(io_err)?;
        let json = serde_json::to_vec_pretty(&self.manifest)
            .map_err(|e| io_err(std::io::Error::new(std::io::ErrorKind::InvalidData, e)))?;
        tmp.write_all(&json).map_err(io_err)?;
        tmp.as_file().sync_all().map_err(io_err)?;
        tmp.persist(&self.path).map_err(|e| io_err(e.error))?;
        Ok(())
    }
}
