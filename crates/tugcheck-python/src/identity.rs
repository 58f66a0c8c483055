//! Module identity resolution.
//!
//! A file's dotted module id is derived from the filesystem layout: starting
//! at the file's directory, walk upward for as long as each directory is a
//! package (contains `__init__.pyi` or `__init__.py`, or sits below a
//! namespace-package root). The first directory that is not a package is the
//! *base directory*; the module id is the chain of package names below it
//! followed by the file's own name.
//!
//! ```text
//! proj/pkg/__init__.py
//! proj/pkg/sub/__init__.py
//! proj/pkg/sub/mod.py      -> ("pkg.sub.mod", "proj")
//! ```
//!
//! Results per directory are memoized in a [`PackageCache`] owned by one
//! discovery run.

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};

use crate::fscache::FileSystem;
use crate::sources::SourceListError;
use crate::validation::{is_identifier, module_join};

/// Stub extension. Listed first: stubs win over sources.
pub const STUB_EXTENSION: &str = ".pyi";

/// Source extension.
pub const SOURCE_EXTENSION: &str = ".py";

/// Recognized Python extensions, in preference order.
pub const PY_EXTENSIONS: [&str; 2] = [STUB_EXTENSION, SOURCE_EXTENSION];

/// Base name of the file that marks a package.
pub const INIT_BASE: &str = "__init__";

/// Memo of `directory -> (module prefix, base directory)`.
///
/// Valid for one discovery run only: nothing invalidates an entry when the
/// filesystem changes.
#[derive(Debug, Clone, Default)]
pub struct PackageCache {
    entries: HashMap<PathBuf, (String, PathBuf)>,
}

impl PackageCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached resolution for `dir`.
    pub fn get(&self, dir: &Path) -> Option<&(String, PathBuf)> {
        self.entries.get(dir)
    }

    /// Number of resolved directories.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if nothing has been resolved yet.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn insert(&mut self, dir: PathBuf, resolved: (String, PathBuf)) {
        self.entries.insert(dir, resolved);
    }
}

/// Resolves files and directories to module ids.
pub struct ModuleIdentityResolver<'fs> {
    fs: &'fs dyn FileSystem,
    cache: PackageCache,
}

impl<'fs> ModuleIdentityResolver<'fs> {
    /// Create a resolver that owns `cache` for the rest of the run.
    pub fn new(fs: &'fs dyn FileSystem, cache: PackageCache) -> Self {
        ModuleIdentityResolver { fs, cache }
    }

    /// The filesystem this resolver queries.
    pub fn fs(&self) -> &'fs dyn FileSystem {
        self.fs
    }

    /// The memo built so far.
    pub fn cache(&self) -> &PackageCache {
        &self.cache
    }

    /// Return the package marker of `dir`, if it is a package.
    ///
    /// `__init__.pyi` is preferred over `__init__.py`. A directory below a
    /// namespace-package root reports the (possibly absent) `__init__.py`.
    pub fn init_file(&self, dir: &Path) -> Option<PathBuf> {
        for ext in PY_EXTENSIONS {
            let candidate = dir.join(format!("{}{}", INIT_BASE, ext));
            if self.fs.is_file(&candidate) {
                return Some(candidate);
            }
            if ext == SOURCE_EXTENSION && self.fs.init_under_package_root(&candidate) {
                return Some(candidate);
            }
        }
        None
    }

    /// Given a directory, return its module prefix and base directory.
    ///
    /// A directory that is empty, has no package marker, or has no final
    /// name component (`.`, `/`) resolves to `("", dir)` (`"."` for the empty
    /// path). Otherwise its name must be an identifier and the result is the
    /// parent's prefix joined with that name.
    pub fn crawl_up_dir(&mut self, dir: &Path) -> Result<(String, PathBuf), SourceListError> {
        if let Some(resolved) = self.cache.get(dir) {
            return Ok(resolved.clone());
        }

        let name = dir.file_name();
        let resolved = match name {
            Some(name) if !dir.as_os_str().is_empty() && self.init_file(dir).is_some() => {
                let name = name.to_string_lossy();
                if !is_identifier(&name) {
                    return Err(SourceListError::InvalidPackageName {
                        name: name.into_owned(),
                        path: dir.to_path_buf(),
                    });
                }
                let parent = dir.parent().unwrap_or(Path::new(""));
                let (prefix, base_dir) = self.crawl_up_dir(parent)?;
                (module_join(&prefix, &name), base_dir)
            }
            _ => {
                let base_dir = if dir.as_os_str().is_empty() {
                    PathBuf::from(".")
                } else {
                    dir.to_path_buf()
                };
                (String::new(), base_dir)
            }
        };

        tracing::trace!(
            dir = %dir.display(),
            prefix = %resolved.0,
            base_dir = %resolved.1.display(),
            "resolved package directory"
        );
        self.cache.insert(dir.to_path_buf(), resolved.clone());
        Ok(resolved)
    }

    /// Given a `.py`/`.pyi` path, return its module id and base directory.
    pub fn crawl_up(&mut self, path: &Path) -> Result<(String, PathBuf), SourceListError> {
        let dir = path.parent().unwrap_or(Path::new(""));
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let module = strip_py(&file_name).unwrap_or(&file_name);

        let (prefix, base_dir) = self.crawl_up_dir(dir)?;
        if module == INIT_BASE || module.is_empty() {
            Ok((prefix, base_dir))
        } else {
            Ok((module_join(&prefix, module), base_dir))
        }
    }
}

/// Strip a trailing `.py` or `.pyi` suffix.
///
/// Returns `None` if there is no such suffix.
pub fn strip_py(name: &str) -> Option<&str> {
    PY_EXTENSIONS
        .into_iter()
        .find_map(|ext| name.strip_suffix(ext))
}

/// Lexically normalize a path: drop `.` components and redundant
/// separators, fold `name/..` pairs. The empty path becomes `.`.
pub fn normpath(path: &Path) -> PathBuf {
    let mut parts: Vec<Component<'_>> = Vec::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match parts.last() {
                Some(Component::Normal(_)) => {
                    parts.pop();
                }
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => parts.push(component),
            },
            other => parts.push(other),
        }
    }
    if parts.is_empty() {
        PathBuf::from(".")
    } else {
        parts.iter().collect()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fscache::FileSystemCache;
    use std::fs::{self, File};
    use tempfile::TempDir;

    fn touch(path: &Path) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        File::create(path).unwrap();
    }

    mod helpers {
        use super::*;

        #[test]
        fn strip_py_handles_both_extensions() {
            assert_eq!(strip_py("a.py"), Some("a"));
            assert_eq!(strip_py("a.pyi"), Some("a"));
            assert_eq!(strip_py("a.txt"), None);
            assert_eq!(strip_py("a"), None);
        }

        #[test]
        fn normpath_is_lexical() {
            assert_eq!(normpath(Path::new("")), PathBuf::from("."));
            assert_eq!(normpath(Path::new("./a.py")), PathBuf::from("a.py"));
            assert_eq!(normpath(Path::new("a//b/./c")), PathBuf::from("a/b/c"));
            assert_eq!(normpath(Path::new("a/b/../c")), PathBuf::from("a/c"));
            assert_eq!(normpath(Path::new("../a")), PathBuf::from("../a"));
            assert_eq!(normpath(Path::new("/../a")), PathBuf::from("/a"));
            assert_eq!(normpath(Path::new("pkg/")), PathBuf::from("pkg"));
        }
    }

    mod crawl {
        use super::*;

        #[test]
        fn file_outside_any_package() {
            let dir = TempDir::new().unwrap();
            touch(&dir.path().join("a.py"));

            let fs = FileSystemCache::new();
            let mut resolver = ModuleIdentityResolver::new(&fs, PackageCache::new());
            let (module, base_dir) = resolver.crawl_up(&dir.path().join("a.py")).unwrap();
            assert_eq!(module, "a");
            assert_eq!(base_dir, dir.path());
        }

        #[test]
        fn nested_packages_join_names() {
            let dir = TempDir::new().unwrap();
            touch(&dir.path().join("pkg/__init__.py"));
            touch(&dir.path().join("pkg/sub/__init__.pyi"));
            touch(&dir.path().join("pkg/sub/mod.py"));

            let fs = FileSystemCache::new();
            let mut resolver = ModuleIdentityResolver::new(&fs, PackageCache::new());
            let (module, base_dir) = resolver
                .crawl_up(&dir.path().join("pkg/sub/mod.py"))
                .unwrap();
            assert_eq!(module, "pkg.sub.mod");
            assert_eq!(base_dir, dir.path());
        }

        #[test]
        fn init_file_names_the_package() {
            let dir = TempDir::new().unwrap();
            touch(&dir.path().join("pkg/__init__.py"));

            let fs = FileSystemCache::new();
            let mut resolver = ModuleIdentityResolver::new(&fs, PackageCache::new());
            let (module, _) = resolver
                .crawl_up(&dir.path().join("pkg/__init__.py"))
                .unwrap();
            assert_eq!(module, "pkg");
        }

        #[test]
        fn chain_stops_at_first_non_package() {
            let dir = TempDir::new().unwrap();
            touch(&dir.path().join("outer/__init__.py"));
            touch(&dir.path().join("outer/plain/pkg/__init__.py"));
            touch(&dir.path().join("outer/plain/pkg/m.py"));

            let fs = FileSystemCache::new();
            let mut resolver = ModuleIdentityResolver::new(&fs, PackageCache::new());
            let (module, base_dir) = resolver
                .crawl_up(&dir.path().join("outer/plain/pkg/m.py"))
                .unwrap();
            assert_eq!(module, "pkg.m");
            assert_eq!(base_dir, dir.path().join("outer/plain"));
        }

        #[test]
        fn stub_marker_is_preferred() {
            let dir = TempDir::new().unwrap();
            touch(&dir.path().join("pkg/__init__.py"));
            touch(&dir.path().join("pkg/__init__.pyi"));

            let fs = FileSystemCache::new();
            let resolver = ModuleIdentityResolver::new(&fs, PackageCache::new());
            assert_eq!(
                resolver.init_file(&dir.path().join("pkg")),
                Some(dir.path().join("pkg/__init__.pyi"))
            );
        }

        #[test]
        fn invalid_package_name_is_fatal() {
            let dir = TempDir::new().unwrap();
            touch(&dir.path().join("my-pkg/__init__.py"));
            touch(&dir.path().join("my-pkg/a.py"));

            let fs = FileSystemCache::new();
            let mut resolver = ModuleIdentityResolver::new(&fs, PackageCache::new());
            let err = resolver
                .crawl_up(&dir.path().join("my-pkg/a.py"))
                .unwrap_err();
            assert_eq!(err.to_string(), "my-pkg is not a valid Python package name");
        }

        #[test]
        fn invalid_name_without_marker_is_not_checked() {
            let dir = TempDir::new().unwrap();
            touch(&dir.path().join("my-dir/a.py"));

            let fs = FileSystemCache::new();
            let mut resolver = ModuleIdentityResolver::new(&fs, PackageCache::new());
            let (module, _) = resolver.crawl_up(&dir.path().join("my-dir/a.py")).unwrap();
            assert_eq!(module, "a");
        }

        #[test]
        fn empty_directory_resolves_to_current_dir() {
            let fs = FileSystemCache::new();
            let mut resolver = ModuleIdentityResolver::new(&fs, PackageCache::new());
            let (prefix, base_dir) = resolver.crawl_up_dir(Path::new("")).unwrap();
            assert_eq!(prefix, "");
            assert_eq!(base_dir, PathBuf::from("."));
        }

        #[test]
        fn results_are_cached_per_directory() {
            let dir = TempDir::new().unwrap();
            touch(&dir.path().join("pkg/__init__.py"));
            touch(&dir.path().join("pkg/a.py"));
            touch(&dir.path().join("pkg/b.py"));

            let fs = FileSystemCache::new();
            let mut resolver = ModuleIdentityResolver::new(&fs, PackageCache::new());
            resolver.crawl_up(&dir.path().join("pkg/a.py")).unwrap();
            let after_first = resolver.cache().len();
            resolver.crawl_up(&dir.path().join("pkg/b.py")).unwrap();
            assert_eq!(resolver.cache().len(), after_first);
            assert_eq!(
                resolver.cache().get(&dir.path().join("pkg")),
                Some(&("pkg".to_string(), dir.path().to_path_buf()))
            );
        }
    }
}
