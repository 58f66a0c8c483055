//! From build sources to merged module trees.
//!
//! Parsing is not done here: callers supply a [`ModuleParser`]. The pipeline
//! reads each unit through the same [`FileSystem`] that discovered it, hands
//! the text to the parser, and when the unit carries a stub parses that too
//! and merges it into the source tree. Merge diagnostics go to the caller's
//! sink; the pipeline only fails on I/O, parse or internal merge errors.

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tugcheck_core::diagnostics::DiagnosticSink;

use crate::fscache::FileSystem;
use crate::merge::{merge_stub_into_source, MergeError, MergeOrigin, MergeSummary};
use crate::sources::BuildSource;
use crate::tree::ModuleTree;

/// Module id given to scripts that have none.
pub const MAIN_MODULE: &str = "__main__";

/// Why a parser rejected a file.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("line {line}: {message}")]
pub struct ParseFailure {
    pub line: u32,
    pub message: String,
}

impl ParseFailure {
    pub fn new(line: u32, message: impl Into<String>) -> Self {
        ParseFailure {
            line,
            message: message.into(),
        }
    }
}

/// Turns file contents into a [`ModuleTree`].
pub trait ModuleParser: Send + Sync {
    fn parse(&self, path: &Path, module: &str, text: &str) -> Result<ModuleTree, ParseFailure>;
}

/// Errors that stop loading.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("cannot read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cannot parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: ParseFailure,
    },

    #[error("cannot merge {} into {}: {source}", stub.display(), path.display())]
    Merge {
        path: PathBuf,
        stub: PathBuf,
        #[source]
        source: MergeError,
    },
}

/// A parsed unit.
#[derive(Debug, Clone)]
pub struct LoadedModule {
    pub module: String,
    pub path: PathBuf,
    pub tree: ModuleTree,
    /// Stub merged into `tree`, with what the merge did.
    pub merged_stub: Option<(PathBuf, MergeSummary)>,
}

/// Parse every unit and merge paired stubs, in unit order.
pub fn load_modules(
    units: &[BuildSource],
    fs: &dyn FileSystem,
    parser: &dyn ModuleParser,
    sink: &dyn DiagnosticSink,
) -> Result<Vec<LoadedModule>, PipelineError> {
    units
        .iter()
        .map(|unit| load_module(unit, fs, parser, sink))
        .collect()
}

/// Parse one unit, merging its stub if it has one.
pub fn load_module(
    unit: &BuildSource,
    fs: &dyn FileSystem,
    parser: &dyn ModuleParser,
    sink: &dyn DiagnosticSink,
) -> Result<LoadedModule, PipelineError> {
    let module = unit.module.as_deref().unwrap_or(MAIN_MODULE);
    let mut tree = parse_file(fs, parser, &unit.path, module, unit.text.as_deref())?;

    let merged_stub = match &unit.stub {
        Some(stub) => {
            let stub_text = stub.text.as_deref();
            let stub_tree = parse_file(fs, parser, &stub.path, &stub.module, stub_text)?;
            let origin = MergeOrigin::new(unit.path.display().to_string(), module);
            let summary =
                merge_stub_into_source(&mut tree, &stub_tree, sink, &origin).map_err(|source| {
                    PipelineError::Merge {
                        path: unit.path.clone(),
                        stub: stub.path.clone(),
                        source,
                    }
                })?;
            Some((stub.path.clone(), summary))
        }
        None => None,
    };

    tracing::debug!(
        module,
        path = %unit.path.display(),
        nodes = tree.len(),
        merged = merged_stub.is_some(),
        "loaded module"
    );

    Ok(LoadedModule {
        module: module.to_string(),
        path: unit.path.clone(),
        tree,
        merged_stub,
    })
}

fn parse_file(
    fs: &dyn FileSystem,
    parser: &dyn ModuleParser,
    path: &Path,
    module: &str,
    text: Option<&str>,
) -> Result<ModuleTree, PipelineError> {
    let read;
    let text = match text {
        Some(text) => text,
        None => {
            read = fs.read_to_string(path).map_err(|source| PipelineError::Read {
                path: path.to_path_buf(),
                source,
            })?;
            read.as_str()
        }
    };
    parser
        .parse(path, module, text)
        .map_err(|source| PipelineError::Parse {
            path: path.to_path_buf(),
            source,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fscache::{FileSystemCache, INIT_SOURCE};
    use crate::tree::{ClassDef, FuncDef, Node, Position, Scope};
    use std::fs::File;
    use std::io::Write;
    use tempfile::TempDir;
    use tugcheck_core::diagnostics::Diagnostics;

    /// One definition per line: `def name arg...` or `class Name`.
    struct LineParser;

    impl ModuleParser for LineParser {
        fn parse(
            &self,
            _path: &Path,
            _module: &str,
            text: &str,
        ) -> Result<ModuleTree, ParseFailure> {
            let mut tree = ModuleTree::new();
            for (index, line) in text.lines().enumerate() {
                let pos = Position::new(index as u32 + 1, 0);
                let words: Vec<&str> = line.split_whitespace().collect();
                match words.as_slice() {
                    [] => {}
                    ["def", name, args @ ..] => {
                        let func = FuncDef::new(*name, args.iter().copied(), pos);
                        tree.add_statement(Scope::Module, Node::Func(func));
                    }
                    ["class", name] => {
                        tree.add_statement(Scope::Module, Node::Class(ClassDef::new(*name, pos)));
                    }
                    _ => {
                        let message = format!("unexpected {:?}", line);
                        return Err(ParseFailure::new(pos.line, message));
                    }
                }
            }
            Ok(tree)
        }
    }

    fn write(dir: &TempDir, name: &str, text: &str) -> PathBuf {
        let path = dir.path().join(name);
        let mut file = File::create(&path).unwrap();
        file.write_all(text.as_bytes()).unwrap();
        path
    }

    #[test]
    fn units_load_in_order() {
        let dir = TempDir::new().unwrap();
        let a = write(&dir, "a.py", "def f x\n");
        let b = write(&dir, "b.py", "class B\n");
        let units = vec![
            BuildSource::module(&b, "b", dir.path()),
            BuildSource::module(&a, "a", dir.path()),
        ];

        let sink = Diagnostics::new();
        let loaded = load_modules(&units, &FileSystemCache::new(), &LineParser, &sink).unwrap();
        let modules: Vec<&str> = loaded.iter().map(|m| m.module.as_str()).collect();
        assert_eq!(modules, vec!["b", "a"]);
        assert!(loaded[1].tree.lookup("f").is_some());
        assert!(loaded.iter().all(|m| m.merged_stub.is_none()));
    }

    #[test]
    fn paired_stub_is_merged_and_diagnostics_name_the_source() {
        let dir = TempDir::new().unwrap();
        let src = write(&dir, "a.py", "def f x\n");
        let stub = write(&dir, "a.pyi", "class Proto\n\ndef f y\n");
        let units = vec![BuildSource::module(&src, "a", dir.path()).with_stub(&stub)];

        let sink = Diagnostics::new();
        let loaded = load_modules(&units, &FileSystemCache::new(), &LineParser, &sink).unwrap();
        let module = &loaded[0];
        let (merged, summary) = module.merged_stub.as_ref().unwrap();
        assert_eq!(merged, &stub);
        assert_eq!(summary.statements_promoted, 1);
        assert!(module.tree.stub_merged);
        assert!(module.tree.lookup("Proto").is_some());

        let diagnostics = sink.snapshot();
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].file, src.display().to_string());
        assert_eq!(diagnostics[0].module, "a");
        assert!(diagnostics[0].message.starts_with("argument conflict"));
    }

    #[test]
    fn in_memory_text_is_not_read_from_disk() {
        let unit = BuildSource::script("does/not/exist.py", None).with_text("def main\n");
        let sink = Diagnostics::new();
        let loaded = load_module(&unit, &FileSystemCache::new(), &LineParser, &sink).unwrap();
        assert_eq!(loaded.module, MAIN_MODULE);
        assert!(loaded.tree.lookup("main").is_some());
    }

    #[test]
    fn unreadable_file_is_a_read_error() {
        let dir = TempDir::new().unwrap();
        let unit = BuildSource::module(dir.path().join("gone.py"), "gone", dir.path());
        let sink = Diagnostics::new();
        let err = load_module(&unit, &FileSystemCache::new(), &LineParser, &sink).unwrap_err();
        assert!(matches!(err, PipelineError::Read { .. }));
    }

    #[test]
    fn parse_failure_names_the_file() {
        let dir = TempDir::new().unwrap();
        let src = write(&dir, "a.py", "def f\n???\n");
        let unit = BuildSource::module(&src, "a", dir.path());
        let sink = Diagnostics::new();
        let err = load_module(&unit, &FileSystemCache::new(), &LineParser, &sink).unwrap_err();
        match err {
            PipelineError::Parse { path, source } => {
                assert_eq!(path, src);
                assert_eq!(source.line, 2);
            }
            other => panic!("expected parse error, got {}", other),
        }
    }

    #[test]
    fn missing_init_below_a_package_root_loads_as_an_empty_module() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("ns");
        std::fs::create_dir_all(root.join("pkg")).unwrap();
        let init = root.join("pkg").join(INIT_SOURCE);
        let unit = BuildSource::module(&init, "pkg", &root);
        let sink = Diagnostics::new();

        let fs = FileSystemCache::with_package_roots([&root]);
        let loaded = load_module(&unit, &fs, &LineParser, &sink).unwrap();
        assert_eq!(loaded.module, "pkg");
        assert!(loaded.tree.is_empty());

        let err = load_module(&unit, &FileSystemCache::new(), &LineParser, &sink).unwrap_err();
        assert!(matches!(err, PipelineError::Read { .. }));
    }
}
