//! Error types and error code constants for tugcheck.
//!
//! This module provides a unified error type (`TugcheckError`) that bridges
//! domain-specific errors from different subsystems (source discovery,
//! merging, configuration) into a common format suitable for JSON output.
//!
//! ## Error Code Mapping
//!
//! - `2`: Invalid arguments (bad source list, bad configuration)
//! - `3`: Resolution errors (file not found, file could not be parsed)
//! - `10`: Internal errors (bugs, unexpected state)
//!
//! ## Design
//!
//! - **Unified type**: `TugcheckError` is the single error type for CLI output
//! - **Bridging**: `impl From<X> for TugcheckError` bridges domain errors
//! - **Code mapping**: `OutputErrorCode` provides stable integer codes for JSON

use std::fmt;

use thiserror::Error;

pub use crate::types::Location;

// ============================================================================
// Output Error Codes
// ============================================================================

/// Error codes for JSON output.
///
/// These codes map to CLI exit codes and appear in JSON error responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum OutputErrorCode {
    /// Invalid arguments from caller (bad source list, bad config).
    InvalidArguments = 2,
    /// Resolution errors (file not found, unparsable file).
    ResolutionError = 3,
    /// Internal errors (bugs, unexpected state).
    InternalError = 10,
}

impl OutputErrorCode {
    /// Get the numeric code value.
    pub fn code(&self) -> u8 {
        *self as u8
    }
}

impl fmt::Display for OutputErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

// ============================================================================
// Unified Error Type
// ============================================================================

/// Unified error type for CLI output.
///
/// This is the canonical error type that all subsystem errors are converted to
/// before being rendered as JSON output.
#[derive(Debug, Error)]
pub enum TugcheckError {
    /// The list of files and directories to check cannot be turned into build sources.
    #[error("invalid source list: {message}")]
    InvalidSourceList {
        message: String,
        path: Option<String>,
    },

    /// File not found.
    #[error("file not found: {path}")]
    FileNotFound { path: String },

    /// A file could not be parsed into a module tree.
    #[error("failed to parse {file}: {message}")]
    ParseFailed { file: String, message: String },

    /// Configuration could not be read or parsed.
    #[error("configuration error: {message}")]
    Config { message: String },

    /// Internal error (bug or unexpected state).
    #[error("internal error: {message}")]
    InternalError { message: String },
}

// ============================================================================
// Error Code Mapping
// ============================================================================

impl From<&TugcheckError> for OutputErrorCode {
    fn from(err: &TugcheckError) -> Self {
        match err {
            TugcheckError::InvalidSourceList { .. } => OutputErrorCode::InvalidArguments,
            TugcheckError::Config { .. } => OutputErrorCode::InvalidArguments,
            TugcheckError::FileNotFound { .. } => OutputErrorCode::ResolutionError,
            TugcheckError::ParseFailed { .. } => OutputErrorCode::ResolutionError,
            TugcheckError::InternalError { .. } => OutputErrorCode::InternalError,
        }
    }
}

impl From<TugcheckError> for OutputErrorCode {
    fn from(err: TugcheckError) -> Self {
        OutputErrorCode::from(&err)
    }
}

// ============================================================================
// Convenience Constructors
// ============================================================================

impl TugcheckError {
    /// Create a file not found error.
    pub fn file_not_found(path: impl Into<String>) -> Self {
        TugcheckError::FileNotFound { path: path.into() }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        TugcheckError::InternalError {
            message: message.into(),
        }
    }

    /// Get the error code for this error.
    pub fn error_code(&self) -> OutputErrorCode {
        OutputErrorCode::from(self)
    }
}

// ============================================================================
// Tests
// ============================================================================
