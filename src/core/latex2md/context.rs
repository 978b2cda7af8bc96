//! Conversion options, per-run state and the converter driver type.

use chrono::NaiveDate;
use paperdown_ir::Document;
use serde::{Deserialize, Serialize};

use super::{pipeline, ConversionOutput, ConversionWarning};
use crate::utils::error::ConversionResult;
use crate::utils::files::FileResolver;

/// Conversion options for LaTeX to Markdown
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct L2MOptions {
    /// Append the provenance footer
    /// Default: true
    pub footer: bool,

    /// Longest bibliography field value shown in the reference list, in
    /// characters; longer values are cut and end in `...`
    /// Default: 60
    pub bib_field_max_len: usize,

    /// Date substituted for `\today`; the conversion date when unset
    pub today: Option<NaiveDate>,

    /// Replace environments without a dedicated transform by inert comments.
    /// When false they are left in the output as written.
    /// Default: true
    pub strip_unknown_environments: bool,

    /// Treat recoverable warnings as failures at the front end
    /// Default: false
    pub strict: bool,
}

impl Default for L2MOptions {
    fn default() -> Self {
        Self {
            footer: true,
            bib_field_max_len: 60,
            today: None,
            strip_unknown_environments: true,
            strict: false,
        }
    }
}

impl L2MOptions {
    /// Create new options with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Options producing byte-identical output across runs
    pub fn reproducible(today: NaiveDate) -> Self {
        Self {
            today: Some(today),
            ..Self::default()
        }
    }

    /// Options for embedding the output in another page (no footer)
    pub fn fragment() -> Self {
        Self {
            footer: false,
            ..Self::default()
        }
    }

    /// Create strict mode options (warnings fail the run at the front end)
    pub fn strict() -> Self {
        Self {
            strict: true,
            ..Self::default()
        }
    }

    /// Date used for `\today`.
    pub fn today(&self) -> NaiveDate {
        self.today
            .unwrap_or_else(|| chrono::Local::now().date_naive())
    }
}

/// Declarations and header fields collected from the input.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DocumentMeta {
    pub document_class: Option<String>,
    pub class_options: Vec<String>,
    pub packages: Vec<String>,
    pub macros: Vec<String>,
    pub title: Option<String>,
    pub authors: Option<String>,
    pub date: Option<String>,
    pub labels: Vec<String>,
    pub bibliography_files: Vec<String>,
    pub cited_keys: Vec<String>,
}

/// State shared by the passes of one conversion run.
pub struct PassContext<'a> {
    pub options: &'a L2MOptions,
    pub resolver: &'a dyn FileResolver,
    pub meta: DocumentMeta,
    warnings: Vec<ConversionWarning>,
}

impl<'a> PassContext<'a> {
    pub fn new(options: &'a L2MOptions, resolver: &'a dyn FileResolver) -> Self {
        Self {
            options,
            resolver,
            meta: DocumentMeta::default(),
            warnings: Vec::new(),
        }
    }

    /// Record a recoverable warning.
    pub fn warn(&mut self, warning: ConversionWarning) {
        log::warn!("{}", warning);
        self.warnings.push(warning);
    }

    pub fn warnings(&self) -> &[ConversionWarning] {
        &self.warnings
    }

    pub fn into_parts(self) -> (DocumentMeta, Vec<ConversionWarning>) {
        (self.meta, self.warnings)
    }
}

/// LaTeX to Markdown converter
pub struct MarkdownConverter<'a> {
    options: L2MOptions,
    resolver: &'a dyn FileResolver,
}

impl<'a> MarkdownConverter<'a> {
    pub fn new(resolver: &'a dyn FileResolver) -> Self {
        Self::with_options(resolver, L2MOptions::default())
    }

    pub fn with_options(resolver: &'a dyn FileResolver, options: L2MOptions) -> Self {
        Self { options, resolver }
    }

    /// Run every pass over `input`. Fatal errors abort without output.
    pub fn convert(&self, input: &str) -> ConversionResult<ConversionOutput> {
        let mut ctx = PassContext::new(&self.options, self.resolver);
        let doc = pipeline::run(Document::new(input), &mut ctx)?;
        let (metadata, warnings) = ctx.into_parts();
        let (content, _) = doc.into_parts();
        Ok(ConversionOutput {
            content,
            warnings,
            metadata,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn options_deserialize_with_defaults() {
        let options: L2MOptions = serde_json::from_str(r#"{"footer": false}"#).unwrap();
        assert!(!options.footer);
        assert_eq!(options.bib_field_max_len, 60);
        assert!(options.strip_unknown_environments);
    }

    #[test]
    fn fixed_date_is_used() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        assert_eq!(L2MOptions::reproducible(date).today(), date);
    }

    #[test]
    fn context_collects_warnings() {
        let options = L2MOptions::default();
        let resolver = crate::utils::files::NoopFileResolver;
        let mut ctx = PassContext::new(&options, &resolver);
        ctx.warn(ConversionWarning::missing_citation("k"));
        assert_eq!(ctx.warnings().len(), 1);
    }
}
