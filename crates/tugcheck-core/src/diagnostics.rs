//! Diagnostics produced while discovering and merging modules.
//!
//! Diagnostics are append-only. Producers never abort because of a
//! diagnostic; they report it and continue, so one pass surfaces every
//! issue. Whether reported diagnostics fail a build is up to the caller.
//!
//! The [`DiagnosticSink`] trait takes `&self` so a single sink can be
//! shared by merges running on different threads. [`Diagnostics`] is the
//! standard in-memory collector.

use std::fmt;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use crate::types::Location;

// ============================================================================
// Diagnostic
// ============================================================================

/// Severity of a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
        }
    }
}

/// A single reported issue, attributed to a file and module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// File the diagnostic is reported against.
    pub file: String,
    /// Dotted module id the file belongs to.
    pub module: String,
    /// Line number (1-indexed, `0` when no position is known).
    pub line: u32,
    /// Column number (`0` when no position is known).
    pub column: u32,
    pub severity: Severity,
    pub message: String,
}

impl Diagnostic {
    /// Create an error diagnostic.
    pub fn error(
        file: impl Into<String>,
        module: impl Into<String>,
        line: u32,
        column: u32,
        message: impl Into<String>,
    ) -> Self {
        Diagnostic {
            file: file.into(),
            module: module.into(),
            line,
            column,
            severity: Severity::Error,
            message: message.into(),
        }
    }

    /// Location of this diagnostic.
    pub fn location(&self) -> Location {
        Location::new(self.file.clone(), self.line, self.column)
    }
}

impl fmt::Display for Diagnostic {
    /// Renders as `file:line:col: severity: message`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}: {}: {}",
            self.file, self.line, self.column, self.severity, self.message
        )
    }
}

// ============================================================================
// Sinks
// ============================================================================

/// Destination for diagnostics.
///
/// Implementations must tolerate concurrent `report` calls. No ordering is
/// promised between reports coming from different threads.
pub trait DiagnosticSink: Send + Sync {
    /// Append one diagnostic.
    fn report(&self, diagnostic: Diagnostic);
}

/// In-memory, thread-safe diagnostic collector.
#[derive(Debug, Default)]
pub struct Diagnostics {
    entries: Mutex<Vec<Diagnostic>>,
}

impl Diagnostics {
    /// Create an empty collector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of diagnostics reported so far.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// True if nothing has been reported.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Copy of everything reported so far, in report order.
    pub fn snapshot(&self) -> Vec<Diagnostic> {
        self.lock().clone()
    }

    /// Messages reported so far, in report order.
    pub fn messages(&self) -> Vec<String> {
        self.lock().iter().map(|d| d.message.clone()).collect()
    }

    /// Consume the collector and return the diagnostics sorted by location.
    pub fn into_sorted(self) -> Vec<Diagnostic> {
        let mut entries = self
            .entries
            .into_inner()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        entries.sort_by(|a, b| {
            a.location()
                .cmp(&b.location())
                .then_with(|| a.message.cmp(&b.message))
        });
        entries
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Diagnostic>> {
        // A panicking reporter cannot leave a half-pushed entry behind.
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl DiagnosticSink for Diagnostics {
    fn report(&self, diagnostic: Diagnostic) {
        tracing::trace!(%diagnostic, "diagnostic reported");
        self.lock().push(diagnostic);
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn display_uses_compiler_style() {
        let diag = Diagnostic::error("pkg/a.py", "pkg.a", 3, 5, "something broke");
        assert_eq!(diag.to_string(), "pkg/a.py:3:5: error: something broke");
    }

    #[test]
    fn collector_keeps_report_order() {
        let sink = Diagnostics::new();
        sink.report(Diagnostic::error("a.py", "a", 9, 0, "second"));
        sink.report(Diagnostic::error("a.py", "a", 1, 0, "first"));

        assert_eq!(sink.len(), 2);
        assert_eq!(sink.messages(), vec!["second", "first"]);
    }

    #[test]
    fn into_sorted_orders_by_location() {
        let sink = Diagnostics::new();
        sink.report(Diagnostic::error("b.py", "b", 1, 0, "b1"));
        sink.report(Diagnostic::error("a.py", "a", 9, 0, "a9"));
        sink.report(Diagnostic::error("a.py", "a", 1, 0, "a1"));

        let messages: Vec<String> = sink.into_sorted().into_iter().map(|d| d.message).collect();
        assert_eq!(messages, vec!["a1", "a9", "b1"]);
    }

    #[test]
    fn concurrent_reports_are_all_kept() {
        let sink = Arc::new(Diagnostics::new());
        let handles: Vec<_> = (0..4)
            .map(|worker| {
                let sink = Arc::clone(&sink);
                thread::spawn(move || {
                    for i in 0..25 {
                        sink.report(Diagnostic::error(
                            format!("m{}.py", worker),
                            format!("m{}", worker),
                            i,
                            0,
                            "conflict",
                        ));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(sink.len(), 100);
    }

    #[test]
    fn severity_serializes_lowercase() {
        let diag = Diagnostic::error("a.py", "a", 1, 1, "x");
        let json = serde_json::to_value(&diag).unwrap();
        assert_eq!(json["severity"], "error");
    }
}
