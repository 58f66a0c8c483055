//! Binary entry point for the tugcheck CLI.
//!
//! ## Usage
//!
//! ```bash
//! # List the build sources for a package directory
//! tugcheck sources src/mypkg
//!
//! # Pair .py files with their .pyi stubs
//! tugcheck sources --merge-stubs src/mypkg
//!
//! # Human-readable output
//! tugcheck sources --format text a.py b.py
//! ```

use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};

use tugcheck::cli::{
    render_sources_text, resolve_sources_options, run_sources, sources_response, SourcesFlags,
};
use tugcheck_core::config::{find_project_root_from, Config};
use tugcheck_core::error::{OutputErrorCode, TugcheckError};
use tugcheck_core::output::{emit_response, ErrorResponse};

// ============================================================================
// CLI Structure
// ============================================================================

/// Python source discovery and stub merging.
///
/// Maps files and directories to build sources with dotted module ids.
/// JSON output by default.
#[derive(Parser, Debug)]
#[command(
    name = "tugcheck",
    version,
    about = "Python source discovery and stub merging"
)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,
    #[command(subcommand)]
    command: Command,
}

/// Global arguments shared by all subcommands.
#[derive(Parser, Debug)]
struct GlobalArgs {
    /// Project root holding `.tugcheck/config.toml` (default: search upward from cwd).
    #[arg(long, global = true)]
    project: Option<PathBuf>,

    /// Log level for tracing output.
    #[arg(long, global = true, value_enum, default_value = "warn")]
    log_level: LogLevel,
}

/// Log level for tracing output.
#[derive(Clone, Copy, Debug, ValueEnum)]
enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    fn to_tracing_level(self) -> tracing::Level {
        match self {
            LogLevel::Trace => tracing::Level::TRACE,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Error => tracing::Level::ERROR,
        }
    }
}

/// Output format for the sources command.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
enum SourcesFormat {
    /// Full JSON response (default).
    #[default]
    Json,
    /// One line per source: module, path, stub.
    Text,
}

/// CLI subcommands.
#[derive(Subcommand, Debug)]
enum Command {
    /// List the build sources for files and directories.
    Sources {
        /// Files and directories to check.
        #[arg(required = true)]
        paths: Vec<String>,
        /// Pair each `.py` with a sibling `.pyi` and merge the stub into it.
        #[arg(long)]
        merge_stubs: bool,
        /// Derive module names for files without a Python extension.
        #[arg(long)]
        scripts_are_modules: bool,
        /// Accept directories that contain no Python files.
        #[arg(long)]
        allow_empty_dir: bool,
        /// Namespace package root (repeatable).
        #[arg(long = "package-root")]
        package_roots: Vec<PathBuf>,
        /// Output format.
        #[arg(long, value_enum, default_value = "json")]
        format: SourcesFormat,
    },
}

// ============================================================================
// Main
// ============================================================================

fn main() -> ExitCode {
    let cli = Cli::parse();

    init_tracing(cli.global.log_level);

    match execute(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let error_code = OutputErrorCode::from(&err);
            let response = ErrorResponse::from_error(&err);

            // Errors go to stdout as JSON, like successful responses
            let _ = emit_response(&response, &mut io::stdout());
            let _ = io::stdout().flush();

            ExitCode::from(error_code.code())
        }
    }
}

/// Initialize tracing subscriber.
fn init_tracing(level: LogLevel) {
    use tracing_subscriber::fmt::format::FmtSpan;
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.to_tracing_level().to_string()));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_span_events(FmtSpan::CLOSE)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

/// Execute the CLI command.
fn execute(cli: Cli) -> Result<(), TugcheckError> {
    match cli.command {
        Command::Sources {
            paths,
            merge_stubs,
            scripts_are_modules,
            allow_empty_dir,
            package_roots,
            format,
        } => {
            let flags = SourcesFlags {
                merge_stubs,
                scripts_are_modules,
                allow_empty_dir,
                package_roots,
            };
            execute_sources(&cli.global, &paths, &flags, format)
        }
    }
}

/// Load the project configuration, or defaults when there is none.
fn load_config(global: &GlobalArgs) -> Result<Config, TugcheckError> {
    let root = match &global.project {
        Some(root) => Some(root.clone()),
        None => {
            let cwd = std::env::current_dir()
                .map_err(|e| TugcheckError::internal(format!("cannot read cwd: {}", e)))?;
            find_project_root_from(&cwd)
        }
    };
    match root {
        Some(root) => Config::load_from_project(&root),
        None => Ok(Config::default()),
    }
}

fn execute_sources(
    global: &GlobalArgs,
    paths: &[String],
    flags: &SourcesFlags,
    format: SourcesFormat,
) -> Result<(), TugcheckError> {
    let config = load_config(global)?;
    let resolved = resolve_sources_options(flags, &config);
    let sources = run_sources(paths, &resolved)?;
    let response = sources_response(&sources);

    let mut stdout = io::stdout();
    let written = match format {
        SourcesFormat::Json => emit_response(&response, &mut stdout),
        SourcesFormat::Text => stdout.write_all(render_sources_text(&response.sources).as_bytes()),
    };
    written.map_err(|e| TugcheckError::internal(format!("failed to write output: {}", e)))?;
    Ok(())
}
