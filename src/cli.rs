//! CLI command implementations.
//!
//! Thin glue between the argument parser in `main.rs` and the library:
//! option resolution against the project configuration, source discovery,
//! and rendering of the result.

use std::path::PathBuf;

use tugcheck_core::config::Config;
use tugcheck_core::error::TugcheckError;
use tugcheck_core::output::{SourceInfo, SourcesResponse, StubInfo};
use tugcheck_python::{create_source_list, BuildSource, FileSystemCache, FinderOptions};

/// Command-line switches for `sources`, before config is applied.
#[derive(Debug, Clone, Default)]
pub struct SourcesFlags {
    pub merge_stubs: bool,
    pub scripts_are_modules: bool,
    pub allow_empty_dir: bool,
    pub package_roots: Vec<PathBuf>,
}

/// Discovery settings after combining flags with the configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedSources {
    pub options: FinderOptions,
    pub package_roots: Vec<PathBuf>,
}

/// Combine flags with the `[sources]` configuration.
///
/// A switch is on if either side turns it on. Package roots given on the
/// command line replace the configured ones.
pub fn resolve_sources_options(flags: &SourcesFlags, config: &Config) -> ResolvedSources {
    let sources = &config.sources;
    let package_roots = if flags.package_roots.is_empty() {
        sources.package_roots.clone()
    } else {
        flags.package_roots.clone()
    };
    ResolvedSources {
        options: FinderOptions {
            merge_stub_into_src: flags.merge_stubs || sources.merge_stub_into_src,
            scripts_are_modules: flags.scripts_are_modules || sources.scripts_are_modules,
            allow_empty_dir: flags.allow_empty_dir || sources.allow_empty_dir,
        },
        package_roots,
    }
}

/// Run discovery over `paths`.
pub fn run_sources(
    paths: &[String],
    resolved: &ResolvedSources,
) -> Result<Vec<BuildSource>, TugcheckError> {
    let fs = FileSystemCache::with_package_roots(&resolved.package_roots);
    let sources = create_source_list(paths, &resolved.options, &fs)?;
    tracing::info!(
        paths = paths.len(),
        sources = sources.len(),
        merge_stubs = resolved.options.merge_stub_into_src,
        "discovered build sources"
    );
    Ok(sources)
}

/// Output form of a build source.
pub fn source_info(source: &BuildSource) -> SourceInfo {
    SourceInfo {
        path: source.path.display().to_string(),
        module: source.module.clone(),
        base_dir: source
            .base_dir
            .as_ref()
            .map(|dir| dir.display().to_string()),
        stub: source.stub.as_ref().map(|stub| StubInfo {
            path: stub.path.display().to_string(),
            module: stub.module.clone(),
        }),
    }
}

/// JSON response for a discovery run.
pub fn sources_response(sources: &[BuildSource]) -> SourcesResponse {
    SourcesResponse::new(sources.iter().map(source_info).collect())
}

/// One line per source: `module path [stub]`, with `-` for a missing module.
pub fn render_sources_text(sources: &[SourceInfo]) -> String {
    let mut out = String::new();
    for source in sources {
        out.push_str(source.module.as_deref().unwrap_or("-"));
        out.push(' ');
        out.push_str(&source.path);
        if let Some(stub) = &source.stub {
            out.push(' ');
            out.push_str(&stub.path);
        }
        out.push('\n');
    }
    out
}
