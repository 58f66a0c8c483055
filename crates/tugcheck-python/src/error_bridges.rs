//! Error bridge implementations for Python-side errors.
//!
//! This module provides `impl From<X> for TugcheckError` conversions from the
//! discovery, merge and pipeline error types to the unified `TugcheckError`.
//!
//! These bridges live in `tugcheck-python` rather than `tugcheck-core` because
//! they depend on `tugcheck-python` types that are not part of core; the root
//! crate cannot host them under the orphan rule.

use std::io;

use tugcheck_core::error::TugcheckError;
use crate::{MergeError, PipelineError, SourceListError};

// ============================================================================
// Bridge: SourceListError -> TugcheckError
// ============================================================================

impl From<SourceListError> for TugcheckError {
    fn from(err: SourceListError) -> Self {
        match &err {
            SourceListError::Io { path, source } if source.kind() == io::ErrorKind::NotFound => {
                TugcheckError::file_not_found(path.display().to_string())
            }
            SourceListError::InvalidPackageName { .. }
            | SourceListError::EmptyDirectory { .. }
            | SourceListError::Io { .. } => TugcheckError::InvalidSourceList {
                message: err.to_string(),
                path: Some(err.path()),
            },
        }
    }
}

// ============================================================================
// Bridge: MergeError -> TugcheckError
// ============================================================================

impl From<MergeError> for TugcheckError {
    fn from(err: MergeError) -> Self {
        TugcheckError::internal(err.to_string())
    }
}

// ============================================================================
// Bridge: PipelineError -> TugcheckError
// ============================================================================

impl From<PipelineError> for TugcheckError {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::Read { path, source } => {
                if source.kind() == io::ErrorKind::NotFound {
                    TugcheckError::file_not_found(path.display().to_string())
                } else {
                    TugcheckError::internal(format!("cannot read {}: {}", path.display(), source))
                }
            }
            PipelineError::Parse { path, source } => TugcheckError::ParseFailed {
                file: path.display().to_string(),
                message: source.to_string(),
            },
            PipelineError::Merge { source, .. } => TugcheckError::from(source),
        }
    }
}
