//! Core infrastructure for tugcheck.
//!
//! This crate provides language-agnostic infrastructure:
//! - Diagnostics and the shared, append-only diagnostic sink
//! - Error types and error codes
//! - JSON output types for CLI responses
//! - Project configuration loading

pub mod config;
pub mod diagnostics;
pub mod error;
pub mod output;
pub mod types;
