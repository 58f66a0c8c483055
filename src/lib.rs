//! tugcheck: Python source discovery and stub/source merging.
//!
//! The front end of a static type checker: turns the files and directories
//! named on a command line into build units with dotted module ids, pairs
//! each `.py` with its `.pyi` stub, and merges parsed stub trees into source
//! trees.

// Core infrastructure - re-exported from tugcheck-core
pub use tugcheck_core::config;
pub use tugcheck_core::diagnostics;
pub use tugcheck_core::error;
pub use tugcheck_core::output;
pub use tugcheck_core::types;

// Language support
pub use tugcheck_python as python;

// Front door
pub mod cli;

// Error bridges (Python-side errors -> TugcheckError) live in tugcheck-python.
