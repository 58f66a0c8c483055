//! Configuration handling for tugcheck.
//!
//! Configuration lives in `.tugcheck/config.toml` at the project root. The
//! project root is found by searching upward from the working directory.
//! Every key is optional; command-line flags override file values.
//!
//! ```toml
//! [sources]
//! merge_stub_into_src = true
//! scripts_are_modules = false
//! allow_empty_dir = false
//! package_roots = ["src"]
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::TugcheckError;

/// Directory holding the project configuration.
pub const CONFIG_DIR: &str = ".tugcheck";

/// Configuration file name inside [`CONFIG_DIR`].
pub const CONFIG_FILE: &str = "config.toml";

/// tugcheck configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Source discovery settings
    #[serde(default)]
    pub sources: SourcesConfig,
}

/// Source discovery settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourcesConfig {
    /// Pair `.py` files with a sibling `.pyi` stub and merge the stub into the source
    #[serde(default)]
    pub merge_stub_into_src: bool,

    /// Give files without a Python extension a module name derived from the file name
    #[serde(default)]
    pub scripts_are_modules: bool,

    /// Accept directory arguments that contain no Python files
    #[serde(default)]
    pub allow_empty_dir: bool,

    /// Namespace package roots: directories below these count as packages
    /// even without an `__init__.py`. Relative entries in a project config
    /// are relative to the project root.
    #[serde(default)]
    pub package_roots: Vec<PathBuf>,
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, TugcheckError> {
        let content = fs::read_to_string(path).map_err(|e| TugcheckError::Config {
            message: format!("failed to read config file {}: {}", path.display(), e),
        })?;
        Self::parse(&content).map_err(|e| TugcheckError::Config {
            message: format!("failed to parse config file {}: {}", path.display(), e),
        })
    }

    /// Parse configuration from TOML text
    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Load configuration from `.tugcheck/config.toml` in the given project root,
    /// falling back to defaults when the file does not exist
    ///
    /// Relative package roots are joined onto `project_root`.
    pub fn load_from_project(project_root: &Path) -> Result<Self, TugcheckError> {
        let config_path = project_root.join(CONFIG_DIR).join(CONFIG_FILE);
        if !config_path.exists() {
            return Ok(Config::default());
        }
        tracing::debug!("Loading configuration from {}", config_path.display());
        let mut config = Self::load(&config_path)?;
        for root in &mut config.sources.package_roots {
            if root.is_relative() {
                *root = project_root.join(&*root);
            }
        }
        Ok(config)
    }
}

/// Find the project root starting from a specific directory
///
/// Walks upward looking for a `.tugcheck/` directory and stops at the
/// filesystem root. Returns `None` when no directory on the way has one.
pub fn find_project_root_from(start: &Path) -> Option<PathBuf> {
    let mut current = Some(start);
    while let Some(dir) = current {
        if dir.join(CONFIG_DIR).is_dir() {
            return Some(dir.to_path_buf());
        }
        current = dir.parent();
    }
    None
}

// ============================================================================
// Tests
// ============================================================================
