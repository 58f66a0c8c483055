//! JSON output types and serialization for CLI responses.
//!
//! These types form the contract for tools consuming `tugcheck` output.
//!
//! ## Design Principles
//!
//! 1. **Structured JSON:** All structured CLI output is valid JSON
//! 2. **Status first:** Every response has `status` as first field
//! 3. **Deterministic:** Same input -> same output (field order, array ordering)
//! 4. **Nullable vs absent:** Explicit `null` for "no value"; absent field means "not applicable"
//! 5. **Versioned:** Schema version in response enables forward compatibility

use std::io::{self, Write};

use serde::{Deserialize, Serialize};

use crate::error::{OutputErrorCode, TugcheckError};

pub use crate::types::Location;

/// Current schema version for all responses.
pub const SCHEMA_VERSION: &str = "1";

// ============================================================================
// Source Listing Types
// ============================================================================

/// A stub file paired with a source file.
///
/// Named `StubInfo` to distinguish it from the discovery-side type; this is
/// an information carrier for serialization only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StubInfo {
    /// Path of the `.pyi` file.
    pub path: String,
    /// Module id of the stub (always the same as the paired source).
    pub module: String,
}

/// One discovered build source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceInfo {
    /// Path of the primary file.
    pub path: String,
    /// Dotted module id, `null` for scripts without a derived module name.
    pub module: Option<String>,
    /// Directory against which the module id resolves, `null` for scripts.
    pub base_dir: Option<String>,
    /// Stub merged into this source, absent when unpaired.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stub: Option<StubInfo>,
}

/// Response for the `sources` command.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourcesResponse {
    /// Status: "ok".
    pub status: String,
    /// Schema version for compatibility.
    pub schema_version: String,
    /// Number of build sources.
    pub count: usize,
    /// Number of sources that carry a paired stub.
    pub paired: usize,
    /// Build sources in discovery order.
    pub sources: Vec<SourceInfo>,
}

impl SourcesResponse {
    /// Create a new sources response.
    pub fn new(sources: Vec<SourceInfo>) -> Self {
        let paired = sources.iter().filter(|s| s.stub.is_some()).count();
        SourcesResponse {
            status: "ok".to_string(),
            schema_version: SCHEMA_VERSION.to_string(),
            count: sources.len(),
            paired,
            sources,
        }
    }
}

// ============================================================================
// Error Types
// ============================================================================

/// Error information for error responses.
///
/// - `code`: Numeric error code (required)
/// - `message`: Human-readable message (required)
/// - `details`: Error-specific structured data (optional)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorInfo {
    /// Numeric error code.
    pub code: u8,
    /// Human-readable message.
    pub message: String,
    /// Error-specific structured data.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ErrorInfo {
    /// Create from a TugcheckError.
    pub fn from_error(err: &TugcheckError) -> Self {
        let code = OutputErrorCode::from(err).code();
        let message = err.to_string();

        let details = match err {
            TugcheckError::InvalidSourceList {
                path: Some(path), ..
            } => Some(serde_json::json!({ "path": path })),
            TugcheckError::FileNotFound { path } => Some(serde_json::json!({ "path": path })),
            TugcheckError::ParseFailed { file, .. } => Some(serde_json::json!({ "file": file })),
            _ => None,
        };

        ErrorInfo {
            code,
            message,
            details,
        }
    }
}

/// Response emitted when a command fails.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Status: "error".
    pub status: String,
    /// Schema version for compatibility.
    pub schema_version: String,
    /// The error.
    pub error: ErrorInfo,
}

impl ErrorResponse {
    /// Create an error response from a TugcheckError.
    pub fn from_error(err: &TugcheckError) -> Self {
        ErrorResponse {
            status: "error".to_string(),
            schema_version: SCHEMA_VERSION.to_string(),
            error: ErrorInfo::from_error(err),
        }
    }
}

// ============================================================================
// Emission
// ============================================================================

/// Emit a response as pretty-printed JSON to a writer.
pub fn emit_response<T: Serialize>(response: &T, writer: &mut impl Write) -> io::Result<()> {
    let json = serde_json::to_string_pretty(response)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    writeln!(writer, "{}", json)
}

// ============================================================================
// Tests
// ============================================================================
