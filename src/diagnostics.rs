//! Diagnostics Log - Append-Only Event History
//!
//! Every validation and export outcome the user should see lands here.
//! The log is a history, not a current-state cache: entries are never
//! mutated or removed, and views are newest-first.

use std::fmt;

use chrono::Local;
use serde::{Deserialize, Serialize};

/// Locale-style wall clock time, e.g. `3:07:42 PM`.
const TIMESTAMP_FORMAT: &str = "%-I:%M:%S %p";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Info,
    Success,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Error => "error",
            Severity::Info => "info",
            Severity::Success => "success",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One timestamped, severity-tagged log entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
    pub timestamp: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.timestamp, self.message)
    }
}

/// Session-lifetime diagnostics history.
///
/// Entries are stored oldest-first so `append` is an amortized O(1) push;
/// every read view walks them in reverse to present newest-first order.
#[derive(Debug, Clone, Default)]
pub struct DiagnosticsLog {
    entries: Vec<Diagnostic>,
}

impl DiagnosticsLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a new entry stamped with the current local time.
    pub fn append(&mut self, severity: Severity, message: impl Into<String>) -> &Diagnostic {
        let timestamp = Local::now().format(TIMESTAMP_FORMAT).to_string();
        self.push(Diagnostic {
            severity,
            message: message.into(),
            timestamp,
        })
    }

    fn push(&mut self, diagnostic: Diagnostic) -> &Diagnostic {
        tracing::debug!(severity = %diagnostic.severity, message = %diagnostic.message, "diagnostic appended");
        self.entries.push(diagnostic);
        &self.entries[self.entries.len() - 1]
    }

    /// All entries, newest first.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &Diagnostic> + '_ {
        self.entries.iter().rev()
    }

    pub fn query_by_severity(&self, severity: Severity) -> Vec<&Diagnostic> {
        self.iter().filter(|d| d.severity == severity).collect()
    }

    /// Error-only view.
    pub fn problems(&self) -> Vec<&Diagnostic> {
        self.query_by_severity(Severity::Error)
    }

    /// Unfiltered view.
    pub fn terminal(&self) -> Vec<&Diagnostic> {
        self.iter().collect()
    }

    pub fn latest(&self) -> Option<&Diagnostic> {
        self.entries.last()
    }

    pub fn count(&self, severity: Severity) -> usize {
        self.entries.iter().filter(|d| d.severity == severity).count()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
