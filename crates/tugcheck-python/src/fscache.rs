//! Filesystem access for source discovery.
//!
//! Discovery asks the same questions about the same directories many times
//! (every file in a package crawls up through the same `__init__` checks), so
//! the default implementation memoizes `stat` results and directory listings
//! for the lifetime of the cache. A cache is meant to live for one build; it
//! is never invalidated.
//!
//! The [`FileSystem`] trait is the seam: tests and embedders can substitute an
//! in-memory tree.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::identity::normpath;

/// File name that marks a directory as a regular package.
pub const INIT_SOURCE: &str = "__init__.py";

/// Filesystem queries needed by module discovery.
pub trait FileSystem: Send + Sync {
    /// True if `path` exists and is a regular file.
    fn is_file(&self, path: &Path) -> bool;

    /// True if `path` exists and is a directory.
    fn is_dir(&self, path: &Path) -> bool;

    /// True if `path` exists at all.
    fn exists(&self, path: &Path) -> bool;

    /// Entry names of a directory, in no particular order.
    fn list_dir(&self, path: &Path) -> io::Result<Vec<String>>;

    /// Contents of a file as UTF-8 text.
    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        fs::read_to_string(path)
    }

    /// True if `path` is an `__init__.py` that would sit directly inside a
    /// directory below one of the configured namespace-package roots.
    ///
    /// Such a directory counts as a package even though the file does not
    /// exist, and [`FileSystem::read_to_string`] reads it as empty. A package
    /// root itself is never a package.
    fn init_under_package_root(&self, path: &Path) -> bool;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EntryKind {
    File,
    Dir,
    Other,
}

/// Memoizing [`FileSystem`] over `std::fs`.
#[derive(Debug, Default)]
pub struct FileSystemCache {
    /// Namespace-package roots, normalized and absolute.
    package_roots: Vec<PathBuf>,
    /// Working directory that relative roots and queries are anchored to.
    cwd: PathBuf,
    /// `None` records a failed stat.
    stat_cache: RwLock<HashMap<PathBuf, Option<EntryKind>>>,
    listing_cache: RwLock<HashMap<PathBuf, Vec<String>>>,
}

impl FileSystemCache {
    /// Create an empty cache with no namespace-package roots.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a cache that treats directories below `roots` as packages.
    ///
    /// Relative roots are taken against the current working directory.
    pub fn with_package_roots<I, P>(roots: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let cwd = std::env::current_dir().unwrap_or_default();
        let package_roots = roots
            .into_iter()
            .map(|root| absolute_in(&cwd, root.as_ref()))
            .collect();
        FileSystemCache {
            package_roots,
            cwd,
            ..Self::default()
        }
    }

    /// Configured namespace-package roots.
    pub fn package_roots(&self) -> &[PathBuf] {
        &self.package_roots
    }

    fn stats(&self) -> RwLockReadGuard<'_, HashMap<PathBuf, Option<EntryKind>>> {
        self.stat_cache.read().unwrap_or_else(|p| p.into_inner())
    }

    fn stats_mut(&self) -> RwLockWriteGuard<'_, HashMap<PathBuf, Option<EntryKind>>> {
        self.stat_cache.write().unwrap_or_else(|p| p.into_inner())
    }

    fn kind(&self, path: &Path) -> Option<EntryKind> {
        if let Some(kind) = self.stats().get(path) {
            return *kind;
        }

        let kind = fs::metadata(path).ok().map(|meta| {
            if meta.is_file() {
                EntryKind::File
            } else if meta.is_dir() {
                EntryKind::Dir
            } else {
                EntryKind::Other
            }
        });
        self.stats_mut().insert(path.to_path_buf(), kind);
        kind
    }

}

fn absolute_in(cwd: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        normpath(path)
    } else {
        normpath(&cwd.join(path))
    }
}

impl FileSystem for FileSystemCache {
    fn is_file(&self, path: &Path) -> bool {
        self.kind(path) == Some(EntryKind::File)
    }

    fn is_dir(&self, path: &Path) -> bool {
        self.kind(path) == Some(EntryKind::Dir)
    }

    fn exists(&self, path: &Path) -> bool {
        self.kind(path).is_some()
    }

    fn list_dir(&self, path: &Path) -> io::Result<Vec<String>> {
        {
            let listings = self.listing_cache.read().unwrap_or_else(|p| p.into_inner());
            if let Some(names) = listings.get(path) {
                return Ok(names.clone());
            }
        }

        let mut names = Vec::new();
        for entry in fs::read_dir(path)? {
            let entry = entry?;
            match entry.file_name().into_string() {
                Ok(name) => names.push(name),
                Err(name) => {
                    tracing::warn!(
                        "Skipping non UTF-8 entry {:?} in {}",
                        name,
                        path.display()
                    );
                }
            }
        }

        self.listing_cache
            .write()
            .unwrap_or_else(|p| p.into_inner())
            .insert(path.to_path_buf(), names.clone());
        Ok(names)
    }

    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        if !self.is_file(path) && self.init_under_package_root(path) {
            return Ok(String::new());
        }
        fs::read_to_string(path)
    }

    fn init_under_package_root(&self, path: &Path) -> bool {
        if self.package_roots.is_empty() {
            return false;
        }
        if path.file_name().and_then(|n| n.to_str()) != Some(INIT_SOURCE) {
            return false;
        }
        let Some(dir) = path.parent() else {
            return false;
        };
        let dir = if dir.as_os_str().is_empty() {
            Path::new(".")
        } else {
            dir
        };
        if !self.is_dir(dir) {
            return false;
        }
        let dir = absolute_in(&self.cwd, dir);

        let mut ok = false;
        for root in &self.package_roots {
            if dir == *root {
                return false;
            }
            if dir.starts_with(root) {
                ok = true;
            }
        }
        ok
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use tempfile::TempDir;

    #[test]
    fn stat_queries_reflect_the_filesystem() {
        let dir = TempDir::new().unwrap();
        File::create(dir.path().join("a.py")).unwrap();
        fs::create_dir(dir.path().join("pkg")).unwrap();

        let cache = FileSystemCache::new();
        assert!(cache.is_file(&dir.path().join("a.py")));
        assert!(!cache.is_dir(&dir.path().join("a.py")));
        assert!(cache.is_dir(&dir.path().join("pkg")));
        assert!(cache.exists(&dir.path().join("pkg")));
        assert!(!cache.exists(&dir.path().join("missing.py")));
    }

    #[test]
    fn results_are_memoized() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("a.py");
        File::create(&file).unwrap();

        let cache = FileSystemCache::new();
        assert!(cache.is_file(&file));
        fs::remove_file(&file).unwrap();
        assert!(cache.is_file(&file));
    }

    #[test]
    fn list_dir_returns_entry_names() {
        let dir = TempDir::new().unwrap();
        File::create(dir.path().join("a.py")).unwrap();
        File::create(dir.path().join("b.pyi")).unwrap();
        fs::create_dir(dir.path().join("pkg")).unwrap();

        let cache = FileSystemCache::new();
        let mut names = cache.list_dir(dir.path()).unwrap();
        names.sort();
        assert_eq!(names, vec!["a.py", "b.pyi", "pkg"]);
    }

    #[test]
    fn list_dir_on_missing_directory_is_an_error() {
        let dir = TempDir::new().unwrap();
        let cache = FileSystemCache::new();
        assert!(cache.list_dir(&dir.path().join("nope")).is_err());
    }

    #[test]
    fn no_package_roots_means_no_namespace_packages() {
        let dir = TempDir::new().unwrap();
        let cache = FileSystemCache::new();
        assert!(!cache.init_under_package_root(&dir.path().join(INIT_SOURCE)));
    }

    #[test]
    fn directories_below_a_package_root_are_packages() {
        // cargo runs tests from the package directory, which has a src/ dir
        let cwd = std::env::current_dir().unwrap();
        let cache = FileSystemCache::with_package_roots(["."]);
        assert!(cache.init_under_package_root(&cwd.join("src").join(INIT_SOURCE)));
        assert!(cache.init_under_package_root(Path::new("src/__init__.py")));
        assert!(!cache.init_under_package_root(&cwd.join(INIT_SOURCE)));
        assert!(!cache.init_under_package_root(&cwd.join("src").join("__init__.pyi")));
    }

    #[test]
    fn package_roots_are_normalized() {
        let cwd = std::env::current_dir().unwrap();
        let cache = FileSystemCache::with_package_roots(["src/./lib/", "a/../b", "/opt/x/../y"]);
        assert_eq!(
            cache.package_roots(),
            &[cwd.join("src/lib"), cwd.join("b"), PathBuf::from("/opt/y")]
        );
    }

    #[test]
    fn absolute_package_root_matches_absolute_and_relative_queries() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("ns");
        fs::create_dir_all(root.join("pkg/sub")).unwrap();

        let cache = FileSystemCache::with_package_roots([&root]);
        assert!(cache.init_under_package_root(&root.join("pkg").join(INIT_SOURCE)));
        assert!(cache.init_under_package_root(&root.join("pkg/sub").join(INIT_SOURCE)));
        assert!(!cache.init_under_package_root(&root.join(INIT_SOURCE)));
        assert!(!cache.init_under_package_root(&tmp.path().join(INIT_SOURCE)));

        let cwd = std::env::current_dir().unwrap();
        let cache = FileSystemCache::with_package_roots([cwd]);
        assert!(cache.init_under_package_root(Path::new("src/__init__.py")));
    }

    #[test]
    fn missing_init_below_a_package_root_reads_as_empty() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("ns");
        fs::create_dir_all(root.join("pkg")).unwrap();
        fs::write(root.join("pkg/a.py"), "x = 1\n").unwrap();

        let cache = FileSystemCache::with_package_roots([&root]);
        assert_eq!(cache.read_to_string(&root.join("pkg").join(INIT_SOURCE)).unwrap(), "");
        assert_eq!(cache.read_to_string(&root.join("pkg/a.py")).unwrap(), "x = 1\n");
        assert!(cache.read_to_string(&root.join(INIT_SOURCE)).is_err());
        assert!(FileSystemCache::new()
            .read_to_string(&root.join("pkg").join(INIT_SOURCE))
            .is_err());
    }
}
