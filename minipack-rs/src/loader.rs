//! Source loaders used by the graph builder.
//!
//! A loader turns a module identifier into its source text. The file system loader
//! is used for real builds; the in-memory loader serves a fixed map of sources and
//! is handy for embedding and for tests.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::error::{BundleError, BundleResult};
use crate::resolver::ModuleId;

/// Supplies the source text of a module.
pub trait SourceLoader {
    fn load(&self, id: &ModuleId) -> BundleResult<String>;
}

/// Loads modules from files below a project root.
#[derive(Debug, Clone)]
pub struct FsLoader {
    root: PathBuf,
}

impl FsLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl SourceLoader for FsLoader {
    fn load(&self, id: &ModuleId) -> BundleResult<String> {
        let path = id.to_path(&self.root);
        // read_to_string opens, drains and closes the file before returning
        fs::read_to_string(&path).map_err(|source| BundleError::MissingModule {
            id: id.clone(),
            importer: None,
            source,
        })
    }
}

/// Serves module sources from a map keyed by identifier.
#[derive(Debug, Clone, Default)]
pub struct MemoryLoader {
    sources: HashMap<String, String>,
}

impl MemoryLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a module. The path is canonicalized the same way import targets are.
    pub fn with_module(mut self, path: &str, source: impl Into<String>) -> Self {
        self.insert(path, source);
        self
    }

    pub fn insert(&mut self, path: &str, source: impl Into<String>) {
        let id = ModuleId::normalize(path);
        self.sources.insert(id.as_str().to_string(), source.into());
    }
}

impl SourceLoader for MemoryLoader {
    fn load(&self, id: &ModuleId) -> BundleResult<String> {
        self.sources
            .get(id.as_str())
            .cloned()
            .ok_or_else(|| BundleError::MissingModule {
                id: id.clone(),
                importer: None,
                source: io::Error::new(
                    io::ErrorKind::NotFound,
                    format!("Module not found in source map: {}", id),
                ),
            })
    }
}

impl<L: SourceLoader + ?Sized> SourceLoader for &L {
    fn load(&self, id: &ModuleId) -> BundleResult<String> {
        (**self).load(id)
    }
}
