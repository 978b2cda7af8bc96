//! WASM bindings for paperdown
//!
//! This module provides JavaScript-accessible functions for LaTeX to Markdown
//! conversion. Bibliography files are passed in as an object mapping file
//! names (`"refs.bib"`) to their contents.

#[cfg(feature = "wasm")]
use wasm_bindgen::prelude::*;

#[cfg(feature = "wasm")]
use serde::{Deserialize, Serialize};

#[cfg(feature = "wasm")]
use std::collections::HashMap;

#[cfg(feature = "wasm")]
use crate::{L2MOptions, MemoryFileResolver};

/// Safely serialize a value to JsValue, returning an error object on failure.
#[cfg(feature = "wasm")]
fn to_js_value<T: Serialize>(value: &T) -> JsValue {
    serde_wasm_bindgen::to_value(value).unwrap_or_else(|e| {
        let error_obj = ConvertResult::failure(format!("Serialization error: {}", e));
        serde_wasm_bindgen::to_value(&error_obj).unwrap_or(JsValue::NULL)
    })
}

/// Conversion result with additional metadata
#[cfg(feature = "wasm")]
#[derive(Serialize, Deserialize)]
pub struct ConvertResult {
    /// The converted output
    pub output: String,
    /// Whether the conversion was successful
    pub success: bool,
    /// Error message if conversion failed
    pub error: Option<String>,
    /// Warnings during conversion, formatted as `[kind] location: message`
    pub warnings: Vec<String>,
}

#[cfg(feature = "wasm")]
impl ConvertResult {
    fn failure(error: String) -> Self {
        Self {
            output: String::new(),
            success: false,
            error: Some(error),
            warnings: vec![],
        }
    }
}

/// Initialize panic hook for better error messages in browser console
#[cfg(feature = "wasm")]
#[wasm_bindgen(start)]
pub fn init() {
    console_error_panic_hook::set_once();
}

/// Convert a LaTeX paper to Markdown
///
/// # Arguments
/// * `input` - Full LaTeX document
/// * `bib_files` - Object mapping bibliography file names to contents
///   (`undefined` when the document cites nothing)
/// * `options` - `L2MOptions` fields; missing fields take their defaults
///
/// # Returns
/// `{ output, success, error, warnings }`
#[cfg(feature = "wasm")]
#[wasm_bindgen(js_name = "latexToMarkdown")]
pub fn latex_to_markdown_wasm(input: &str, bib_files: JsValue, options: JsValue) -> JsValue {
    let options: L2MOptions = if options.is_undefined() || options.is_null() {
        L2MOptions::default()
    } else {
        match serde_wasm_bindgen::from_value(options) {
            Ok(options) => options,
            Err(e) => return to_js_value(&ConvertResult::failure(format!("Invalid options: {}", e))),
        }
    };

    let files: HashMap<String, String> = if bib_files.is_undefined() || bib_files.is_null() {
        HashMap::new()
    } else {
        match serde_wasm_bindgen::from_value(bib_files) {
            Ok(files) => files,
            Err(e) => {
                return to_js_value(&ConvertResult::failure(format!(
                    "Invalid bibliography files: {}",
                    e
                )))
            }
        }
    };
    let mut resolver = MemoryFileResolver::new();
    for (name, content) in files {
        resolver.insert(name, content);
    }

    let result = match crate::latex_to_markdown_with_options(input, &resolver, options) {
        Ok(output) => ConvertResult {
            warnings: output.format_warnings(),
            output: output.content,
            success: true,
            error: None,
        },
        Err(e) => ConvertResult::failure(e.to_string()),
    };

    to_js_value(&result)
}

/// Parsed bibliography with parse diagnostics (exposed to WASM)
#[cfg(feature = "wasm")]
#[derive(Serialize)]
struct BibResult {
    entries: crate::BibDatabase,
    warnings: Vec<String>,
}

/// Parse a BibTeX file into `{ entries, warnings }`
#[cfg(feature = "wasm")]
#[wasm_bindgen(js_name = "parseBibtex")]
pub fn parse_bibtex_wasm(input: &str) -> JsValue {
    let (entries, warnings) = crate::parse_bibtex(input);
    to_js_value(&BibResult {
        entries,
        warnings: warnings.iter().map(|w| w.to_string()).collect(),
    })
}

/// Get version information
#[cfg(feature = "wasm")]
#[wasm_bindgen(js_name = "getVersion")]
pub fn get_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}
