//! # paperdown
//!
//! Converts a single LaTeX paper into a Markdown/HTML-fragment document for
//! static-site publishing. Headings, cross-references, citations, tables,
//! lists, emphasis, math spans and images are kept; the source is never
//! interpreted as a macro language.
//!
//! ```
//! use paperdown::{latex_to_markdown_with_options, L2MOptions, MemoryFileResolver};
//!
//! let input = "\\documentclass{article}\n\\title{Notes}\n\\begin{document}\nSee \\cite{k}.\n\\bibliography{refs}\n\\end{document}\n";
//! let resolver = MemoryFileResolver::new().with_file("refs.bib", "@misc{k,\n  title = {A Note},\n}\n");
//! let output = latex_to_markdown_with_options(input, &resolver, L2MOptions::fragment()).unwrap();
//! assert!(output.content.contains("(cites: [k](#k))"));
//! assert!(output.content.contains("* <a id=\"k\">**k**</a>:"));
//! ```

pub mod core;
pub mod data;
pub mod utils;

#[cfg(feature = "wasm")]
pub mod wasm;

pub use crate::core::latex2md::{
    latex_to_markdown, latex_to_markdown_with_options, parse_bibtex, BibDatabase, BibEntry,
    ConversionOutput, ConversionWarning, DocumentMeta, L2MOptions, MarkdownConverter,
    WarningKind,
};
#[cfg(not(target_arch = "wasm32"))]
pub use crate::utils::StdFileResolver;
pub use crate::utils::{
    ConversionError, ConversionResult, FileResolver, MemoryFileResolver, NoopFileResolver,
};
