//! Filesystem operation abstractions for dependency injection.
//!
//! Provides the [`FileSystemOps`] trait so that the deploy engine can be
//! unit-tested without touching the real filesystem.  Production code uses
//! [`SystemFileSystemOps`]; tests use `MockFileSystemOps`.

use std::io;
use std::path::{Path, PathBuf};

/// Abstraction over the filesystem calls made while deploying.
///
/// Implement this trait to swap in a mock during unit tests, keeping
/// planning and execution logic independent of real I/O.  The production
/// implementation is [`SystemFileSystemOps`].
pub trait FileSystemOps: Send + Sync + std::fmt::Debug {
    /// Returns `true` if `path` exists on the filesystem.
    fn exists(&self, path: &Path) -> bool;

    /// Returns `true` if `path` is a regular file.
    fn is_file(&self, path: &Path) -> bool;

    /// Returns `true` if `path` is a directory.
    fn is_dir(&self, path: &Path) -> bool;

    /// Returns `true` if `path` itself is a symbolic link.
    fn is_symlink(&self, path: &Path) -> bool;

    /// Returns the immediate child paths inside `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if `path` cannot be opened or read as a directory.
    fn read_dir(&self, path: &Path) -> io::Result<Vec<PathBuf>>;

    /// Read the whole file at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read.
    fn read(&self, path: &Path) -> io::Result<Vec<u8>>;

    /// Replace the contents of `path`, creating the file if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    fn write(&self, path: &Path, content: &[u8]) -> io::Result<()>;

    /// Create `path` and all missing parents.
    ///
    /// # Errors
    ///
    /// Returns an error if a directory cannot be created.
    fn create_dir_all(&self, path: &Path) -> io::Result<()>;

    /// Permission bits of `path` (Unix mode; emulated on Windows).
    ///
    /// # Errors
    ///
    /// Returns an error if the metadata cannot be read.
    fn mode(&self, path: &Path) -> io::Result<u32>;

    /// Apply permission bits to `path`.
    ///
    /// On Windows only the owner-write bit is honoured (read-only flag).
    ///
    /// # Errors
    ///
    /// Returns an error if the permissions cannot be changed.
    fn set_mode(&self, path: &Path, mode: u32) -> io::Result<()>;
}

/// Production [`FileSystemOps`] implementation that delegates to [`std::fs`].
#[derive(Debug, Default)]
pub struct SystemFileSystemOps;

impl FileSystemOps for SystemFileSystemOps {
    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn is_file(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn is_dir(&self, path: &Path) -> bool {
        path.is_dir()
    }

    fn is_symlink(&self, path: &Path) -> bool {
        path.is_symlink()
    }

    fn read_dir(&self, path: &Path) -> io::Result<Vec<PathBuf>> {
        std::fs::read_dir(path)?
            .map(|e| e.map(|entry| entry.path()))
            .collect()
    }

    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        std::fs::read(path)
    }

    fn write(&self, path: &Path, content: &[u8]) -> io::Result<()> {
        std::fs::write(path, content)
    }

    fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        std::fs::create_dir_all(path)
    }

    #[cfg(unix)]
    fn mode(&self, path: &Path) -> io::Result<u32> {
        use std::os::unix::fs::PermissionsExt as _;
        Ok(std::fs::metadata(path)?.permissions().mode() & 0o7777)
    }

    #[cfg(not(unix))]
    fn mode(&self, path: &Path) -> io::Result<u32> {
        let readonly = std::fs::metadata(path)?.permissions().readonly();
        Ok(if readonly { 0o444 } else { 0o644 })
    }

    #[cfg(unix)]
    fn set_mode(&self, path: &Path, mode: u32) -> io::Result<()> {
        use std::os::unix::fs::PermissionsExt as _;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode))
    }

    #[cfg(not(unix))]
    fn set_mode(&self, path: &Path, mode: u32) -> io::Result<()> {
        let mut perms = std::fs::metadata(path)?.permissions();
        perms.set_readonly(mode & 0o200 == 0);
        std::fs::set_permissions(path, perms)
    }
}

/// In-memory [`FileSystemOps`] for unit tests.
///
/// Pre-configure files and directories with the builder-style methods, then
/// pass `Arc::new(mock)` to the code under test. Writes are recorded and
/// visible to later reads.
///
/// # Example
///
/// ```ignore
/// use punktf::operations::MockFileSystemOps;
///
/// let fs = MockFileSystemOps::new()
///     .with_file("/src/items/.vimrc", "set nu\n")
///     .with_dir("/home/u");
/// ```
#[cfg(test)]
#[derive(Debug, Default)]
pub struct MockFileSystemOps {
    state: std::sync::Mutex<MockState>,
}

#[cfg(test)]
#[derive(Debug, Default)]
struct MockState {
    files: std::collections::BTreeMap<PathBuf, (Vec<u8>, u32)>,
    dirs: std::collections::BTreeSet<PathBuf>,
    unreadable: std::collections::BTreeSet<PathBuf>,
    symlinks: std::collections::BTreeSet<PathBuf>,
    writes: Vec<PathBuf>,
}

#[cfg(test)]
#[allow(clippy::expect_used)]
impl MockFileSystemOps {
    /// Create an empty mock with nothing configured.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockState> {
        self.state.lock().expect("mock state poisoned")
    }

    /// Add a regular file with mode `0644` (parents become directories).
    #[must_use]
    pub fn with_file(self, path: impl Into<PathBuf>, content: impl AsRef<[u8]>) -> Self {
        self.with_file_mode(path, content, 0o644)
    }

    /// Add a regular file with explicit permission bits.
    #[must_use]
    pub fn with_file_mode(
        self,
        path: impl Into<PathBuf>,
        content: impl AsRef<[u8]>,
        mode: u32,
    ) -> Self {
        let path = path.into();
        {
            let mut state = self.lock();
            add_parents(&mut state.dirs, &path);
            state.files.insert(path, (content.as_ref().to_vec(), mode));
        }
        self
    }

    /// Add a directory (and its parents).
    #[must_use]
    pub fn with_dir(self, path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        {
            let mut state = self.lock();
            add_parents(&mut state.dirs, &path);
            state.dirs.insert(path);
        }
        self
    }

    /// Add a symbolic link at `path` that resolves to a directory.
    #[must_use]
    pub fn with_dir_symlink(self, path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        {
            let mut state = self.lock();
            add_parents(&mut state.dirs, &path);
            state.dirs.insert(path.clone());
            state.symlinks.insert(path);
        }
        self
    }

    /// Make reads of `path` fail with `PermissionDenied`.
    #[must_use]
    pub fn with_unreadable(self, path: impl Into<PathBuf>) -> Self {
        self.lock().unreadable.insert(path.into());
        self
    }

    /// Current content of `path`, if it is a file.
    pub fn content(&self, path: &Path) -> Option<Vec<u8>> {
        self.lock().files.get(path).map(|(c, _)| c.clone())
    }

    /// Current permission bits of `path`, if it is a file.
    pub fn file_mode(&self, path: &Path) -> Option<u32> {
        self.lock().files.get(path).map(|(_, m)| *m)
    }

    /// Paths passed to [`FileSystemOps::write`], in call order.
    pub fn writes(&self) -> Vec<PathBuf> {
        self.lock().writes.clone()
    }
}

#[cfg(test)]
fn add_parents(dirs: &mut std::collections::BTreeSet<PathBuf>, path: &Path) {
    for ancestor in path.ancestors().skip(1) {
        if ancestor.as_os_str().is_empty() {
            break;
        }
        dirs.insert(ancestor.to_path_buf());
    }
}

#[cfg(test)]
impl FileSystemOps for MockFileSystemOps {
    fn exists(&self, path: &Path) -> bool {
        let state = self.lock();
        state.files.contains_key(path) || state.dirs.contains(path)
    }

    fn is_file(&self, path: &Path) -> bool {
        self.lock().files.contains_key(path)
    }

    fn is_dir(&self, path: &Path) -> bool {
        self.lock().dirs.contains(path)
    }

    fn is_symlink(&self, path: &Path) -> bool {
        self.lock().symlinks.contains(path)
    }

    fn read_dir(&self, path: &Path) -> io::Result<Vec<PathBuf>> {
        let state = self.lock();
        if !state.dirs.contains(path) {
            return Err(io::Error::from(io::ErrorKind::NotFound));
        }
        let children = state
            .files
            .keys()
            .chain(state.dirs.iter())
            .filter(|p| p.parent() == Some(path))
            .cloned()
            .collect();
        Ok(children)
    }

    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        let state = self.lock();
        if state.unreadable.contains(path) {
            return Err(io::Error::from(io::ErrorKind::PermissionDenied));
        }
        state
            .files
            .get(path)
            .map(|(c, _)| c.clone())
            .ok_or_else(|| io::Error::from(io::ErrorKind::NotFound))
    }

    fn write(&self, path: &Path, content: &[u8]) -> io::Result<()> {
        let mut state = self.lock();
        if state.dirs.contains(path) {
            return Err(io::Error::other("is a directory"));
        }
        if let Some(parent) = path.parent()
            && !state.dirs.contains(parent)
        {
            return Err(io::Error::from(io::ErrorKind::NotFound));
        }
        let mode = state.files.get(path).map_or(0o644, |(_, m)| *m);
        state.files.insert(path.to_path_buf(), (content.to_vec(), mode));
        state.writes.push(path.to_path_buf());
        Ok(())
    }

    fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        let mut state = self.lock();
        if state.files.contains_key(path) {
            return Err(io::Error::from(io::ErrorKind::AlreadyExists));
        }
        add_parents(&mut state.dirs, path);
        state.dirs.insert(path.to_path_buf());
        Ok(())
    }

    fn mode(&self, path: &Path) -> io::Result<u32> {
        self.lock()
            .files
            .get(path)
            .map(|(_, m)| *m)
            .ok_or_else(|| io::Error::from(io::ErrorKind::NotFound))
    }

    fn set_mode(&self, path: &Path, mode: u32) -> io::Result<()> {
        self.lock()
            .files
            .get_mut(path)
            .map(|entry| entry.1 = mode)
            .ok_or_else(|| io::Error::from(io::ErrorKind::NotFound))
    }
}
