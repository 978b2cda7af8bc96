//! Utility modules
//!
//! This module contains utilities and helpers:
//! - Error types and result types
//! - File resolution for documents that reference external files

pub mod error;
pub mod files;

// Re-export commonly used items
pub use error::{CliDiagnostic, ConversionError, ConversionResult, DiagnosticSeverity};
pub use files::{FileResolveError, FileResolver, MemoryFileResolver, NoopFileResolver};

#[cfg(not(target_arch = "wasm32"))]
pub use files::StdFileResolver;
