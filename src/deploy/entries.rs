//! Expansion of resolved items into per-file deploy entries.
//!
//! A file item yields one entry. A directory item yields one entry per
//! contained file, recursively, each inheriting the directory item's merge
//! mode, priority and template flag. An explicit item whose output lies
//! inside a deployed directory replaces the file the directory would have
//! produced there.
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::config::{MergeMode, ResolvedItem};
use crate::error::DeployError;
use crate::operations::FileSystemOps;

/// How an entry came to exist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryOrigin {
    /// Declared directly in a profile.
    Item,
    /// Found inside a directory item.
    Child {
        /// Output path of the directory item.
        parent: PathBuf,
    },
}

/// One file to deploy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployEntry<'a> {
    /// Item the settings come from.
    pub item: &'a ResolvedItem,
    /// Absolute source file.
    pub source: PathBuf,
    /// Absolute output file.
    pub output: PathBuf,
    /// Explicit item or directory child.
    pub origin: EntryOrigin,
}

impl DeployEntry<'_> {
    /// Merge mode in effect.
    #[must_use]
    pub const fn merge(&self) -> MergeMode {
        self.item.item.merge
    }

    /// Priority in effect.
    #[must_use]
    pub const fn priority(&self) -> i64 {
        self.item.item.priority
    }

    /// Whether the content is rendered as a template.
    #[must_use]
    pub const fn is_template(&self) -> bool {
        self.item.item.template
    }

    /// Item path as written in the profile, for messages.
    #[must_use]
    pub fn label(&self) -> String {
        self.item.item.path.display().to_string()
    }
}

/// Expand every item of `items` into file entries sorted by output path.
///
/// # Errors
///
/// Returns [`DeployError::MergeConflict`] if two explicit items share an
/// output path, and [`DeployError::Io`] if a directory item cannot be
/// listed.
pub fn expand<'a>(
    items: &'a [ResolvedItem],
    items_dir: &Path,
    fs: &dyn FileSystemOps,
) -> Result<Vec<DeployEntry<'a>>, DeployError> {
    let mut entries: BTreeMap<PathBuf, DeployEntry<'a>> = BTreeMap::new();

    for resolved in items {
        let source = items_dir.join(&resolved.item.path);
        if fs.is_dir(&source) {
            let mut files = Vec::new();
            walk(&source, fs, &mut files)?;
            for file in files {
                let Ok(relative) = file.strip_prefix(&source) else {
                    continue;
                };
                let child = DeployEntry {
                    item: resolved,
                    output: resolved.output.join(relative),
                    source: file.clone(),
                    origin: EntryOrigin::Child {
                        parent: resolved.output.clone(),
                    },
                };
                match entries.get(&child.output) {
                    Some(existing) if existing.origin == EntryOrigin::Item => {}
                    _ => {
                        entries.insert(child.output.clone(), child);
                    }
                }
            }
        } else {
            let entry = DeployEntry {
                item: resolved,
                source,
                output: resolved.output.clone(),
                origin: EntryOrigin::Item,
            };
            if let Some(existing) = entries.get(&entry.output)
                && existing.origin == EntryOrigin::Item
            {
                return Err(DeployError::MergeConflict {
                    first: existing.label(),
                    second: entry.label(),
                    path: entry.output,
                });
            }
            entries.insert(entry.output.clone(), entry);
        }
    }

    Ok(entries.into_values().collect())
}

/// Collect the files below `dir`. Symlinked directories are not entered.
fn walk(dir: &Path, fs: &dyn FileSystemOps, out: &mut Vec<PathBuf>) -> Result<(), DeployError> {
    let mut children = fs.read_dir(dir).map_err(|source| DeployError::Io {
        path: dir.to_path_buf(),
        source,
    })?;
    children.sort();
    for child in children {
        if !fs.is_dir(&child) {
            out.push(child);
        } else if !fs.is_symlink(&child) {
            walk(&child, fs, out)?;
        }
    }
    Ok(())
}

#[cfg(test)]
#[allow(
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::indexing_slicing,
    clippy::panic
)]
mod tests {
    use super::*;
    use crate::config::Item;
    use crate::operations::MockFileSystemOps;

    fn resolved(path: &str, output: &str) -> ResolvedItem {
        ResolvedItem {
            item: Item::new(path),
            output: PathBuf::from(output),
            profile: "base".into(),
        }
    }

    fn outputs(entries: &[DeployEntry<'_>]) -> Vec<String> {
        entries
            .iter()
            .map(|e| e.output.display().to_string())
            .collect()
    }

    #[test]
    fn file_item_yields_single_entry() {
        let fs = MockFileSystemOps::new().with_file("/src/items/.vimrc", "x");
        let items = vec![resolved(".vimrc", "/home/u/.vimrc")];
        let entries = expand(&items, Path::new("/src/items"), &fs).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].source, PathBuf::from("/src/items/.vimrc"));
        assert_eq!(entries[0].origin, EntryOrigin::Item);
    }

    #[test]
    fn missing_source_still_yields_entry() {
        let fs = MockFileSystemOps::new().with_dir("/src/items");
        let items = vec![resolved("ghost", "/home/u/ghost")];
        let entries = expand(&items, Path::new("/src/items"), &fs).unwrap();
        assert_eq!(outputs(&entries), vec!["/home/u/ghost"]);
    }

    #[test]
    fn directory_item_expands_recursively() {
        let fs = MockFileSystemOps::new()
            .with_file("/src/items/nvim/init.lua", "a")
            .with_file("/src/items/nvim/lua/plugins.lua", "b");
        let items = vec![resolved("nvim", "/home/u/.config/nvim")];
        let entries = expand(&items, Path::new("/src/items"), &fs).unwrap();
        assert_eq!(
            outputs(&entries),
            vec![
                "/home/u/.config/nvim/init.lua",
                "/home/u/.config/nvim/lua/plugins.lua"
            ]
        );
        assert_eq!(
            entries[1].origin,
            EntryOrigin::Child {
                parent: PathBuf::from("/home/u/.config/nvim")
            }
        );
    }

    #[test]
    fn explicit_item_overrides_directory_child() {
        let fs = MockFileSystemOps::new()
            .with_file("/src/items/nvim/init.lua", "dir")
            .with_file("/src/items/init-work.lua", "explicit");
        let mut explicit = resolved("init-work.lua", "/home/u/.config/nvim/init.lua");
        explicit.item.priority = 7;
        // Order must not matter: explicit first, then directory.
        let items = vec![explicit, resolved("nvim", "/home/u/.config/nvim")];
        let entries = expand(&items, Path::new("/src/items"), &fs).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].origin, EntryOrigin::Item);
        assert_eq!(entries[0].priority(), 7);
    }

    #[test]
    fn later_directory_wins_for_child_collisions() {
        let fs = MockFileSystemOps::new()
            .with_file("/src/items/a/rc", "a")
            .with_file("/src/items/b/rc", "b");
        let items = vec![resolved("a", "/home/u"), resolved("b", "/home/u")];
        let entries = expand(&items, Path::new("/src/items"), &fs).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].source, PathBuf::from("/src/items/b/rc"));
    }

    #[test]
    fn duplicate_explicit_outputs_conflict() {
        let fs = MockFileSystemOps::new()
            .with_file("/src/items/one", "1")
            .with_file("/src/items/two", "2");
        let items = vec![
            resolved("one", "/home/u/.rc"),
            resolved("two", "/home/u/.rc"),
        ];
        let err = expand(&items, Path::new("/src/items"), &fs).unwrap_err();
        let DeployError::MergeConflict {
            path,
            first,
            second,
        } = &err
        else {
            panic!("expected a merge conflict, got {err:?}");
        };
        assert_eq!(path, Path::new("/home/u/.rc"));
        assert_eq!((first.as_str(), second.as_str()), ("one", "two"));
    }

    #[test]
    fn symlinked_directories_are_not_entered() {
        let fs = MockFileSystemOps::new()
            .with_file("/src/items/cfg/rc", "x")
            .with_dir_symlink("/src/items/cfg/self");
        let items = vec![resolved("cfg", "/home/u/.cfg")];
        let entries = expand(&items, Path::new("/src/items"), &fs).unwrap();
        assert_eq!(outputs(&entries), vec!["/home/u/.cfg/rc"]);
    }

    #[cfg(unix)]
    #[test]
    fn symlink_loop_inside_directory_item_terminates() {
        let tmp = tempfile::tempdir().unwrap();
        let items_dir = tmp.path().join("items");
        let cfg = items_dir.join("cfg");
        std::fs::create_dir_all(cfg.join("sub")).unwrap();
        std::fs::write(cfg.join("sub").join("rc"), "x").unwrap();
        std::os::unix::fs::symlink(&cfg, cfg.join("sub").join("back")).unwrap();

        let items = vec![resolved("cfg", "/home/u/.cfg")];
        let entries =
            expand(&items, &items_dir, &crate::operations::SystemFileSystemOps).unwrap();
        assert_eq!(outputs(&entries), vec!["/home/u/.cfg/sub/rc"]);
    }

    #[test]
    fn entries_are_sorted_by_output() {
        let fs = MockFileSystemOps::new()
            .with_file("/src/items/z", "z")
            .with_file("/src/items/a", "a");
        let items = vec![resolved("z", "/home/u/z"), resolved("a", "/home/u/a")];
        let entries = expand(&items, Path::new("/src/items"), &fs).unwrap();
        assert_eq!(outputs(&entries), vec!["/home/u/a", "/home/u/z"]);
    }
}
