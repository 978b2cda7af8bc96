//! Error handling for paperdown conversions
//!
//! This module provides the fatal error type, the result alias used by every
//! conversion pass, and the diagnostic type the CLI prints.

use std::fmt;

use thiserror::Error;

use super::files::FileResolveError;

/// Fatal conversion error. Any of these aborts the run without output.
#[derive(Debug, Error)]
pub enum ConversionError {
    /// A declaration that must appear exactly once is absent
    #[error("no \\{command} declaration found; input does not look like a LaTeX paper")]
    MissingDeclaration { command: &'static str },
    /// A declaration that must appear exactly once appears several times
    #[error("found {count} \\{command} declarations, expected exactly one")]
    DuplicateDeclaration { command: &'static str, count: usize },
    /// A referenced bibliography file could not be read
    #[error("cannot read bibliography '{name}': {source}")]
    Bibliography {
        name: String,
        #[source]
        source: FileResolveError,
    },
    /// IO error (for file operations)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ConversionError {
    pub fn missing(command: &'static str) -> Self {
        ConversionError::MissingDeclaration { command }
    }

    pub fn duplicate(command: &'static str, count: usize) -> Self {
        ConversionError::DuplicateDeclaration { command, count }
    }
}

/// Result type for conversion operations
pub type ConversionResult<T> = Result<T, ConversionError>;

// =============================================================================
// CLI Diagnostic System
// =============================================================================

/// Severity level for CLI diagnostics (determines coloring and strict mode).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticSeverity {
    /// Content that renders visibly broken, e.g. a dangling link
    Error,
    /// Suspicious input that was converted anyway
    Warning,
    /// Informational, e.g. an environment turned into an inert marker
    Info,
}

/// Diagnostic type for CLI output.
#[derive(Debug, Clone)]
pub struct CliDiagnostic {
    /// Severity level (for coloring and strict mode)
    pub severity: DiagnosticSeverity,
    /// Warning kind as string (e.g., "undefined reference")
    pub kind: String,
    /// Human-readable message
    pub message: String,
    /// Location context (e.g., "\\ref{fig:a}", "line 10")
    pub location: Option<String>,
}

impl CliDiagnostic {
    /// Create a new diagnostic.
    pub fn new(
        severity: DiagnosticSeverity,
        kind: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            severity,
            kind: kind.into(),
            message: message.into(),
            location: None,
        }
    }

    /// Add location context.
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    /// Get ANSI color code for this diagnostic's severity.
    pub fn color_code(&self) -> &'static str {
        match self.severity {
            DiagnosticSeverity::Error => "\x1b[31m",   // red
            DiagnosticSeverity::Warning => "\x1b[33m", // yellow
            DiagnosticSeverity::Info => "\x1b[36m",    // cyan
        }
    }
}

impl fmt::Display for CliDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(ref loc) = self.location {
            write!(f, "[{}] {}: {}", self.kind, loc, self.message)
        } else {
            write!(f, "[{}] {}", self.kind, self.message)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_declaration_display() {
        let err = ConversionError::missing("documentclass");
        let msg = err.to_string();
        assert!(msg.contains("\\documentclass"));
        assert!(msg.contains("no "));
    }

    #[test]
    fn test_duplicate_declaration_display() {
        let err = ConversionError::duplicate("title", 2);
        assert_eq!(
            err.to_string(),
            "found 2 \\title declarations, expected exactly one"
        );
    }

    #[test]
    fn test_bibliography_error_keeps_source() {
        let err = ConversionError::Bibliography {
            name: "refs".to_string(),
            source: FileResolveError::NotFound {
                name: "refs.bib".to_string(),
            },
        };
        assert!(err.to_string().contains("refs"));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_cli_diagnostic_display() {
        let diag = CliDiagnostic::new(DiagnosticSeverity::Warning, "undefined reference", "x")
            .with_location("\\ref{x}");
        assert_eq!(diag.to_string(), "[undefined reference] \\ref{x}: x");
        assert_eq!(diag.color_code(), "\x1b[33m");
    }
}
