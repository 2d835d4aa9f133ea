//! The build driver: configuration in, bundle file out.

use std::fs;
use std::path::{Path, PathBuf};

use log::info;

use crate::config::{config_root, BuildConfig};
use crate::emit::{emit, BundleEmit, BundleOptions};
use crate::error::{BundleError, BundleResult};
use crate::graph::{GraphBuilder, ModuleTable};
use crate::loader::{FsLoader, SourceLoader};
use crate::resolver::ModuleId;
use crate::transform::{SourceTransform, SwcTransform};

/// Builds one configured bundle.
///
/// The default instance reads sources from disk below `root` and compiles them
/// with [`SwcTransform`]; [`Compiler::with_parts`] swaps either piece.
pub struct Compiler<T = SwcTransform, L = FsLoader> {
    config: BuildConfig,
    root: PathBuf,
    builder: GraphBuilder<T, L>,
}

impl Compiler {
    pub fn new(config: BuildConfig, root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let loader = FsLoader::new(root.clone());
        Self::with_parts(config, root, SwcTransform::new(), loader)
    }

    /// Reads a configuration file and roots the build at its directory.
    pub fn from_config_file(path: &Path) -> BundleResult<Self> {
        let config = BuildConfig::from_file(path)?;
        Ok(Self::new(config, config_root(path)))
    }
}

impl<T: SourceTransform, L: SourceLoader> Compiler<T, L> {
    pub fn with_parts(config: BuildConfig, root: impl Into<PathBuf>, transform: T, loader: L) -> Self {
        Self {
            config,
            root: root.into(),
            builder: GraphBuilder::new(transform, loader),
        }
    }

    pub fn config(&self) -> &BuildConfig {
        &self.config
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn entry(&self) -> ModuleId {
        ModuleId::normalize(&self.config.entry)
    }

    pub fn output_file(&self) -> PathBuf {
        self.config.output_file(&self.root)
    }

    /// Compiles every module reachable from the entry.
    pub fn build(&self) -> BundleResult<ModuleTable> {
        self.builder.build(&self.entry())
    }

    /// Builds and emits the bundle without writing it.
    pub fn bundle(&self) -> BundleResult<BundleEmit> {
        let entry = self.entry();
        let table = self.builder.build(&entry)?;
        let options = BundleOptions::from(&self.config.runtime);

        // without the cache a cycle would re-enter its modules forever
        if !options.cache {
            if let Some(cycle) = table.find_cycle(&entry) {
                return Err(BundleError::ImportCycle { cycle });
            }
        }

        emit(&table, &entry, options)
    }

    /// Builds the bundle and writes it, returning the path of the written file.
    ///
    /// Nothing is written unless the whole build succeeded.
    pub fn run(&self) -> BundleResult<PathBuf> {
        let bundle = self.bundle()?;

        let output_dir = self.root.join(&self.config.output.path);
        fs::create_dir_all(&output_dir).map_err(|source| BundleError::Io {
            path: output_dir.clone(),
            source,
        })?;

        let output_file = self.output_file();
        fs::write(&output_file, bundle.code.as_bytes()).map_err(|source| BundleError::Io {
            path: output_file.clone(),
            source,
        })?;

        info!("Wrote {} ({} bytes)", output_file.display(), bundle.code.len());
        Ok(output_file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::MemoryLoader;

    fn compiler(loader: MemoryLoader, cache: bool) -> Compiler<SwcTransform, MemoryLoader> {
        let mut config = BuildConfig::new("src/index.js", "dist", "bundle.js");
        config.runtime.cache = cache;
        Compiler::with_parts(config, "/project", SwcTransform::new(), loader)
    }

    fn cyclic() -> MemoryLoader {
        MemoryLoader::new()
            .with_module("./src/index.js", "import { b } from './b.js';\nexport const a = 'a';")
            .with_module("./src/b.js", "import { a } from './index.js';\nexport const b = 'b';")
    }

    #[test]
    fn test_entry_is_canonical() {
        let compiler = compiler(MemoryLoader::new(), true);
        assert_eq!(compiler.entry().as_str(), "./src/index.js");
        assert_eq!(compiler.output_file(), PathBuf::from("/project/dist/bundle.js"));
    }

    #[test]
    fn test_cycle_bundles_with_cache() {
        let bundle = compiler(cyclic(), true).bundle().unwrap();
        assert!(bundle.code.contains("\"./src/b.js\": {"));
    }

    #[test]
    fn test_cycle_rejected_without_cache() {
        let err = compiler(cyclic(), false).bundle().unwrap_err();
        match err {
            BundleError::ImportCycle { cycle } => {
                let cycle: Vec<&str> = cycle.iter().map(ModuleId::as_str).collect();
                assert_eq!(cycle, vec!["./src/index.js", "./src/b.js", "./src/index.js"]);
            }
            other => panic!("Expected ImportCycle, got {other:?}"),
        }
    }

    #[test]
    fn test_missing_entry() {
        let err = compiler(MemoryLoader::new(), true).build().unwrap_err();
        assert!(matches!(err, BundleError::MissingModule { importer: None, .. }));
    }
}
