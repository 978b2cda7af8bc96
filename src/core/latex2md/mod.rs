//! LaTeX to Markdown converter
//!
//! This module implements the paper-to-Markdown converter as a fixed pipeline
//! of rewriting passes over a [`Document`](paperdown_ir::Document). Passes
//! store every piece of final markup as a typed atom, so later passes never
//! reinterpret what earlier ones produced; the normalizer renders the atoms
//! at the very end.

pub mod bibliography;
pub mod context;
mod environment;
mod header;
mod labels;
mod markup;
mod normalize;
mod pipeline;
mod preprocess;
mod scanner;
mod table;
mod utils;

use serde::Serialize;

pub use bibliography::{parse_bibtex, BibDatabase, BibEntry};
pub use context::{DocumentMeta, L2MOptions, MarkdownConverter, PassContext};

use crate::utils::error::ConversionResult as Result;
use crate::utils::files::FileResolver;

// =============================================================================
// Warning System
// =============================================================================

/// Kind of warning generated during conversion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum WarningKind {
    /// A label was declared more than once; the first declaration is kept
    DuplicateLabel,
    /// A reference names a label that is never declared
    UndefinedReference,
    /// A citation names a key missing from every bibliography file
    MissingCitation,
    /// A bibliography file declares the same key twice
    DuplicateBibKey,
    /// A bibliography line could not be attributed to a record
    BibParse,
    /// More than one reference-list insertion point
    ExtraBibliography,
    /// Environment without a dedicated transform, kept as an inert marker
    UnknownEnvironment,
    /// `\begin` without `\end` or the other way round
    UnbalancedEnvironment,
    /// A command argument opened but never closed
    UnterminatedArgument,
    /// Reserved private-use characters were removed from the input
    ReservedCharacter,
}

impl std::fmt::Display for WarningKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WarningKind::DuplicateLabel => write!(f, "duplicate label"),
            WarningKind::UndefinedReference => write!(f, "undefined reference"),
            WarningKind::MissingCitation => write!(f, "missing citation"),
            WarningKind::DuplicateBibKey => write!(f, "duplicate bibliography key"),
            WarningKind::BibParse => write!(f, "bibliography parse"),
            WarningKind::ExtraBibliography => write!(f, "extra bibliography"),
            WarningKind::UnknownEnvironment => write!(f, "unknown environment"),
            WarningKind::UnbalancedEnvironment => write!(f, "unbalanced environment"),
            WarningKind::UnterminatedArgument => write!(f, "unterminated argument"),
            WarningKind::ReservedCharacter => write!(f, "reserved character"),
        }
    }
}

/// A recoverable problem found during conversion
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConversionWarning {
    /// The kind of warning
    pub kind: WarningKind,
    /// Human-readable message
    pub message: String,
    /// Location context (e.g., "\\ref{fig:a}" or "refs.bib")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

impl ConversionWarning {
    /// Create a new warning
    pub fn new(kind: WarningKind, message: impl Into<String>) -> Self {
        ConversionWarning {
            kind,
            message: message.into(),
            location: None,
        }
    }

    /// Add location context to the warning
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn duplicate_label(name: &str) -> Self {
        ConversionWarning::new(
            WarningKind::DuplicateLabel,
            format!("label '{}' declared again; references use the first declaration", name),
        )
        .with_location(format!("\\label{{{}}}", name))
    }

    pub fn undefined_reference(command: &str, name: &str) -> Self {
        ConversionWarning::new(
            WarningKind::UndefinedReference,
            format!("no label '{}'; the link will dangle", name),
        )
        .with_location(format!("\\{}{{{}}}", command, name))
    }

    pub fn missing_citation(key: &str) -> Self {
        ConversionWarning::new(
            WarningKind::MissingCitation,
            format!("no bibliography entry for '{}'", key),
        )
        .with_location(key.to_string())
    }

    pub fn unterminated(command: &str, count: usize) -> Self {
        ConversionWarning::new(
            WarningKind::UnterminatedArgument,
            format!("{} argument(s) never closed; command kept as written", count),
        )
        .with_location(format!("\\{}", command))
    }
}

impl std::fmt::Display for ConversionWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(ref loc) = self.location {
            write!(f, "[{}] {}: {}", self.kind, loc, self.message)
        } else {
            write!(f, "[{}] {}", self.kind, self.message)
        }
    }
}

impl From<ConversionWarning> for crate::utils::error::CliDiagnostic {
    fn from(warning: ConversionWarning) -> Self {
        use crate::utils::error::{CliDiagnostic, DiagnosticSeverity};

        let severity = match warning.kind {
            WarningKind::UndefinedReference | WarningKind::MissingCitation => {
                DiagnosticSeverity::Error
            }
            WarningKind::DuplicateLabel
            | WarningKind::DuplicateBibKey
            | WarningKind::BibParse
            | WarningKind::ExtraBibliography
            | WarningKind::UnbalancedEnvironment
            | WarningKind::UnterminatedArgument
            | WarningKind::ReservedCharacter => DiagnosticSeverity::Warning,
            WarningKind::UnknownEnvironment => DiagnosticSeverity::Info,
        };

        let mut diag = CliDiagnostic::new(severity, warning.kind.to_string(), warning.message);
        if let Some(loc) = warning.location {
            diag = diag.with_location(loc);
        }
        diag
    }
}

/// Converted document with diagnostics
#[derive(Debug, Clone, Serialize)]
pub struct ConversionOutput {
    /// The converted Markdown
    #[serde(skip)]
    pub content: String,
    /// Warnings generated during conversion
    pub warnings: Vec<ConversionWarning>,
    /// Declarations and header fields found in the input
    pub metadata: DocumentMeta,
}

impl ConversionOutput {
    /// Check if there are any warnings
    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    /// Warnings that are not purely informational
    pub fn actionable_warnings(&self) -> impl Iterator<Item = &ConversionWarning> {
        self.warnings
            .iter()
            .filter(|w| w.kind != WarningKind::UnknownEnvironment)
    }

    /// Get warnings as formatted strings
    pub fn format_warnings(&self) -> Vec<String> {
        self.warnings.iter().map(|w| w.to_string()).collect()
    }
}

/// Convert a LaTeX paper to Markdown with default options.
///
/// Bibliography files named by the document are read through `resolver`.
///
/// # Example
///
/// ```
/// use paperdown::core::latex2md::latex_to_markdown;
/// use paperdown::utils::NoopFileResolver;
///
/// let input = "\\documentclass{article}\n\\title{Hello}\n\\begin{document}\nHi.\n\\end{document}\n";
/// let result = latex_to_markdown(input, &NoopFileResolver).unwrap();
/// assert!(result.content.contains("# Hello"));
/// ```
pub fn latex_to_markdown(input: &str, resolver: &dyn FileResolver) -> Result<ConversionOutput> {
    MarkdownConverter::new(resolver).convert(input)
}

/// Convert a LaTeX paper to Markdown with explicit options.
pub fn latex_to_markdown_with_options(
    input: &str,
    resolver: &dyn FileResolver,
    options: L2MOptions,
) -> Result<ConversionOutput> {
    MarkdownConverter::with_options(resolver, options).convert(input)
}
