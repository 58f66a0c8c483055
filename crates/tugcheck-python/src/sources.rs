//! Source discovery: turn command-line files and directories into build sources.
//!
//! Two entry points:
//!
//! - [`create_source_list`] handles the explicit argument list. Files keep
//!   the path exactly as given; directories are expanded.
//! - [`SourceFinder::expand_dir`] walks a directory tree, emitting one
//!   [`BuildSource`] per module in a deterministic order.
//!
//! When stub merging is enabled, a `.py` file with a sibling `.pyi` becomes a
//! single build source carrying the stub; the stub is not emitted on its own.
//! With merging disabled, `a.pyi` shadows `a.py` in directory mode.

use std::collections::HashSet;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::fscache::FileSystem;
use crate::identity::{
    normpath, ModuleIdentityResolver, PackageCache, INIT_BASE, PY_EXTENSIONS, SOURCE_EXTENSION,
    STUB_EXTENSION,
};

// ============================================================================
// Error Types
// ============================================================================

/// Errors that abort source discovery.
#[derive(Debug, Error)]
pub enum SourceListError {
    /// A package directory's name is not a Python identifier.
    #[error("{name} is not a valid Python package name")]
    InvalidPackageName { name: String, path: PathBuf },

    /// A directory argument contained nothing to check.
    #[error("There are no .py[i] files in directory '{path}'")]
    EmptyDirectory { path: String },

    /// A directory could not be listed.
    #[error("cannot read directory {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl SourceListError {
    /// The path the error is about.
    pub fn path(&self) -> String {
        match self {
            SourceListError::InvalidPackageName { path, .. } => path.display().to_string(),
            SourceListError::EmptyDirectory { path } => path.clone(),
            SourceListError::Io { path, .. } => path.display().to_string(),
        }
    }
}

// ============================================================================
// Build Sources
// ============================================================================

/// A stub file paired with a source file.
///
/// Has no stub of its own: pairing is exactly one level deep.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StubSource {
    pub path: PathBuf,
    pub module: String,
    pub base_dir: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

/// One file to analyze.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildSource {
    /// File path; kept as given on the command line for explicit files.
    pub path: PathBuf,
    /// Dotted module id. `None` for scripts when `scripts_are_modules` is off.
    pub module: Option<String>,
    /// Directory the module id resolves against. `None` for scripts.
    pub base_dir: Option<PathBuf>,
    /// In-memory contents, when not read from `path`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Stub whose declarations are merged into this source.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stub: Option<StubSource>,
}

impl BuildSource {
    /// A module file resolved against `base_dir`.
    pub fn module(
        path: impl Into<PathBuf>,
        module: impl Into<String>,
        base_dir: impl Into<PathBuf>,
    ) -> Self {
        BuildSource {
            path: path.into(),
            module: Some(module.into()),
            base_dir: Some(base_dir.into()),
            text: None,
            stub: None,
        }
    }

    /// A file with no recognized extension.
    pub fn script(path: impl Into<PathBuf>, module: Option<String>) -> Self {
        BuildSource {
            path: path.into(),
            module,
            base_dir: None,
            text: None,
            stub: None,
        }
    }

    /// Attach a stub sharing this source's module id and base directory.
    ///
    /// Returns the source unchanged if it has no module id.
    pub fn with_stub(mut self, stub_path: impl Into<PathBuf>) -> Self {
        if let (Some(module), Some(base_dir)) = (&self.module, &self.base_dir) {
            self.stub = Some(StubSource {
                path: stub_path.into(),
                module: module.clone(),
                base_dir: base_dir.clone(),
                text: None,
            });
        }
        self
    }

    /// Supply in-memory contents for the primary file.
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }
}

// ============================================================================
// Options
// ============================================================================

/// Discovery switches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FinderOptions {
    /// Pair `a.py` with a sibling `a.pyi`.
    pub merge_stub_into_src: bool,
    /// Name scripts after their file name instead of leaving them anonymous.
    pub scripts_are_modules: bool,
    /// Accept directory arguments that expand to nothing.
    pub allow_empty_dir: bool,
}

// ============================================================================
// Directory Expansion
// ============================================================================

/// Walks directories, resolving module ids through a per-run [`PackageCache`].
pub struct SourceFinder<'fs> {
    resolver: ModuleIdentityResolver<'fs>,
    merge_stub_into_src: bool,
}

impl<'fs> SourceFinder<'fs> {
    /// Create a finder with a fresh package cache.
    pub fn new(fs: &'fs dyn FileSystem, merge_stub_into_src: bool) -> Self {
        SourceFinder {
            resolver: ModuleIdentityResolver::new(fs, PackageCache::new()),
            merge_stub_into_src,
        }
    }

    /// Resolve a `.py`/`.pyi` path to `(module, base_dir)`.
    pub fn crawl_up(&mut self, path: &Path) -> Result<(String, PathBuf), SourceListError> {
        self.resolver.crawl_up(path)
    }

    /// Resolve a directory to `(module prefix, base_dir)`.
    pub fn crawl_up_dir(&mut self, dir: &Path) -> Result<(String, PathBuf), SourceListError> {
        self.resolver.crawl_up_dir(dir)
    }

    /// Expand `dir` into build sources.
    ///
    /// `prefix` is empty for a top-level argument and `"<parent module>."`
    /// when recursing. A sub-directory without a package marker contributes
    /// nothing. Entries are visited sorted by `(base name, extension rank)`
    /// so `a` < `a.pyi` < `a.py`, and the first file for a base name wins.
    pub fn expand_dir(
        &mut self,
        dir: &Path,
        prefix: &str,
    ) -> Result<Vec<BuildSource>, SourceListError> {
        let init = self.resolver.init_file(dir);
        if !prefix.is_empty() && init.is_none() {
            return Ok(Vec::new());
        }

        let (top_module, base_dir) = self.resolver.crawl_up_dir(dir)?;
        let mut prefix = prefix.to_string();
        let mut sources = Vec::new();
        if let Some(init) = init {
            if prefix.is_empty() && !top_module.is_empty() {
                prefix = format!("{}.", top_module);
            }
            if !prefix.is_empty() {
                sources.push(BuildSource::module(
                    init,
                    prefix.trim_end_matches('.'),
                    &base_dir,
                ));
            }
        }

        let mut names = self
            .resolver
            .fs()
            .list_dir(dir)
            .map_err(|source| SourceListError::Io {
                path: dir.to_path_buf(),
                source,
            })?;
        names.sort_by_cached_key(|name| sort_key(name));

        let mut seen: HashSet<String> = HashSet::new();
        let mut names = names.into_iter().peekable();
        while let Some(name) = names.next() {
            if is_skipped_name(&name) {
                continue;
            }
            let path = dir.join(&name);

            if self.resolver.fs().is_dir(&path) {
                let sub_sources = self.expand_dir(&path, &format!("{}{}.", prefix, name))?;
                if !sub_sources.is_empty() {
                    seen.insert(name);
                    sources.extend(sub_sources);
                }
                continue;
            }

            let (base, suffix) = split_ext(&name);
            if base == INIT_BASE {
                continue;
            }
            if seen.contains(base) || base.contains('.') || !PY_EXTENSIONS.contains(&suffix) {
                continue;
            }
            seen.insert(base.to_string());

            let module = format!("{}{}", prefix, base);
            let paired_source = if self.merge_stub_into_src && suffix == STUB_EXTENSION {
                names.next_if(|next| split_ext(next) == (base, SOURCE_EXTENSION))
            } else {
                None
            };

            let source = match paired_source {
                Some(source_name) => {
                    tracing::debug!(module = %module, "pairing {} with stub {}", source_name, name);
                    BuildSource::module(dir.join(source_name), module, &base_dir).with_stub(path)
                }
                None => BuildSource::module(path, module, &base_dir),
            };
            sources.push(source);
        }

        Ok(sources)
    }
}

// ============================================================================
// Explicit Arguments
// ============================================================================

/// Build the list of sources from command-line files and directories.
///
/// Non-stub arguments are processed before stub arguments so that a stub
/// given alongside its source is attached to it rather than emitted alone.
/// Fails on the first invalid package name or empty directory; no partial
/// list is returned.
pub fn create_source_list<S: AsRef<str>>(
    files: &[S],
    options: &FinderOptions,
    fs: &dyn FileSystem,
) -> Result<Vec<BuildSource>, SourceListError> {
    let mut finder = SourceFinder::new(fs, options.merge_stub_into_src);
    let mut targets = Vec::new();
    let mut found: HashSet<String> = HashSet::new();

    let (stubs, others): (Vec<&str>, Vec<&str>) = files
        .iter()
        .map(|f| f.as_ref())
        .partition(|f| f.ends_with(STUB_EXTENSION));

    for file in others.into_iter().chain(stubs) {
        if found.contains(file) {
            continue;
        }
        found.insert(file.to_string());

        let (base, ext) = split_ext(file);
        if PY_EXTENSIONS.contains(&ext) {
            let (module, base_dir) = finder.crawl_up(&normpath(Path::new(file)))?;
            let mut source = BuildSource::module(file, module, base_dir);
            if options.merge_stub_into_src && ext == SOURCE_EXTENSION {
                let stub_file = format!("{}{}", base, STUB_EXTENSION);
                if fs.exists(Path::new(&stub_file)) {
                    source = source.with_stub(&stub_file);
                    found.insert(stub_file);
                }
            }
            targets.push(source);
        } else if fs.is_dir(Path::new(file)) {
            let sub_targets = finder.expand_dir(&normpath(Path::new(file)), "")?;
            if sub_targets.is_empty() && !options.allow_empty_dir {
                return Err(SourceListError::EmptyDirectory {
                    path: file.to_string(),
                });
            }
            targets.extend(sub_targets);
        } else {
            let module = if options.scripts_are_modules {
                Path::new(file)
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
            } else {
                None
            };
            targets.push(BuildSource::script(file, module));
        }
    }

    tracing::debug!(
        "discovered {} build sources ({} with stubs)",
        targets.len(),
        targets.iter().filter(|t| t.stub.is_some()).count()
    );
    Ok(targets)
}

// ============================================================================
// Helpers
// ============================================================================

/// Split a file name into base and extension the way Python's `splitext`
/// does: the extension starts at the last dot of the final component, and
/// leading dots belong to the base.
pub fn split_ext(name: &str) -> (&str, &str) {
    let file_start = name.rfind('/').map_or(0, |i| i + 1);
    let file = &name[file_start..];
    let leading_dots = file.len() - file.trim_start_matches('.').len();
    match file[leading_dots..].rfind('.') {
        Some(i) => name.split_at(file_start + leading_dots + i),
        None => (name, ""),
    }
}

/// Sort key for directory listings: `(base, rank)` with rank `-1` for no or
/// an unrecognized extension, then in [`PY_EXTENSIONS`] order.
fn sort_key(name: &str) -> (String, i32) {
    let (base, suffix) = split_ext(name);
    let rank = PY_EXTENSIONS
        .iter()
        .position(|ext| *ext == suffix)
        .map_or(-1, |i| i as i32);
    (base.to_string(), rank)
}

/// Names never considered during directory expansion.
fn is_skipped_name(name: &str) -> bool {
    name == "__pycache__"
        || name == "py.typed"
        || name.starts_with('.')
        || name.ends_with('~')
        || name.ends_with(".pyc")
        || name.ends_with(".pyo")
}

// ============================================================================
// Tests
// ============================================================================
