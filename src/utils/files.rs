//! File resolution for documents that pull in external files.
//!
//! The converter never touches the filesystem itself; bibliography files are
//! read through a [`FileResolver`] supplied by the caller.

use std::collections::HashMap;
#[cfg(not(target_arch = "wasm32"))]
use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum FileResolveError {
    #[error("file '{name}' not found")]
    NotFound { name: String },
    #[error("failed to read '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Source of external files referenced by name from within a document.
pub trait FileResolver {
    /// Read the file called `name` (relative names are resolved by the implementation).
    fn read_to_string(&self, name: &str) -> Result<String, FileResolveError>;
}

/// Resolves names relative to a base directory on disk.
#[cfg(not(target_arch = "wasm32"))]
#[derive(Debug, Clone)]
pub struct StdFileResolver {
    base: PathBuf,
}

#[cfg(not(target_arch = "wasm32"))]
impl StdFileResolver {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    /// Resolver rooted at the directory containing `file`.
    pub fn for_input_file(file: &Path) -> Self {
        let base = file
            .canonicalize()
            .ok()
            .and_then(|p| p.parent().map(Path::to_path_buf))
            .or_else(|| file.parent().map(Path::to_path_buf))
            .unwrap_or_else(|| PathBuf::from("."));
        Self { base }
    }

    pub fn base(&self) -> &Path {
        &self.base
    }
}

#[cfg(not(target_arch = "wasm32"))]
impl FileResolver for StdFileResolver {
    fn read_to_string(&self, name: &str) -> Result<String, FileResolveError> {
        let path = self.base.join(name);
        log::debug!("reading {}", path.display());
        std::fs::read_to_string(&path).map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                FileResolveError::NotFound {
                    name: path.display().to_string(),
                }
            } else {
                FileResolveError::Io {
                    path: path.display().to_string(),
                    source,
                }
            }
        })
    }
}

/// In-memory files, keyed by the exact name the converter asks for.
#[derive(Debug, Clone, Default)]
pub struct MemoryFileResolver {
    files: HashMap<String, String>,
}

impl MemoryFileResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, content: impl Into<String>) {
        self.files.insert(name.into(), content.into());
    }

    pub fn with_file(mut self, name: impl Into<String>, content: impl Into<String>) -> Self {
        self.insert(name, content);
        self
    }
}

impl FileResolver for MemoryFileResolver {
    fn read_to_string(&self, name: &str) -> Result<String, FileResolveError> {
        self.files
            .get(name)
            .cloned()
            .ok_or_else(|| FileResolveError::NotFound {
                name: name.to_string(),
            })
    }
}

/// Resolver for documents without external files; every lookup fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopFileResolver;

impl FileResolver for NoopFileResolver {
    fn read_to_string(&self, name: &str) -> Result<String, FileResolveError> {
        Err(FileResolveError::NotFound {
            name: name.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_resolver_returns_inserted_files() {
        let resolver = MemoryFileResolver::new().with_file("refs.bib", "@article{a,\n}");
        assert!(resolver.read_to_string("refs.bib").unwrap().starts_with("@article"));
        assert!(matches!(
            resolver.read_to_string("other.bib"),
            Err(FileResolveError::NotFound { .. })
        ));
    }

    #[test]
    fn noop_resolver_never_finds_anything() {
        assert!(NoopFileResolver.read_to_string("x.bib").is_err());
    }

    #[cfg(not(target_arch = "wasm32"))]
    #[test]
    fn std_resolver_reads_relative_to_base() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("refs.bib"), "@misc{k,\n}\n").unwrap();
        let resolver = StdFileResolver::new(dir.path());
        assert_eq!(resolver.read_to_string("refs.bib").unwrap(), "@misc{k,\n}\n");
        assert!(matches!(
            resolver.read_to_string("missing.bib"),
            Err(FileResolveError::NotFound { .. })
        ));
    }

    #[cfg(not(target_arch = "wasm32"))]
    #[test]
    fn std_resolver_for_input_file_uses_parent_directory() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("paper.tex");
        std::fs::write(&input, "x").unwrap();
        std::fs::write(dir.path().join("refs.bib"), "data").unwrap();
        let resolver = StdFileResolver::for_input_file(&input);
        assert_eq!(resolver.read_to_string("refs.bib").unwrap(), "data");
    }
}
