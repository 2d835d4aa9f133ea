//! Build configuration (`minipack.config.json`).

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::emit::BundleOptions;
use crate::error::{BundleError, BundleResult};

/// File name the CLI looks for when no configuration path is given.
pub const DEFAULT_CONFIG_FILE: &str = "minipack.config.json";

/// What to bundle and where to write it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildConfig {
    /// Entry module, relative to the project root.
    pub entry: String,

    pub output: OutputConfig,

    #[serde(default)]
    pub runtime: RuntimeConfig,
}

/// Location of the bundle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Output directory, relative to the project root. Created when missing.
    pub path: PathBuf,

    pub filename: String,
}

/// Options for the emitted module runtime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Run each module body at most once and share its exports between importers.
    #[serde(default = "default_cache")]
    pub cache: bool,
}

fn default_cache() -> bool {
    true
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            cache: default_cache(),
        }
    }
}

impl From<&RuntimeConfig> for BundleOptions {
    fn from(runtime: &RuntimeConfig) -> Self {
        BundleOptions {
            cache: runtime.cache,
        }
    }
}

impl BuildConfig {
    pub fn new(entry: impl Into<String>, path: impl Into<PathBuf>, filename: impl Into<String>) -> Self {
        Self {
            entry: entry.into(),
            output: OutputConfig {
                path: path.into(),
                filename: filename.into(),
            },
            runtime: RuntimeConfig::default(),
        }
    }

    /// Reads and validates a configuration file.
    pub fn from_file(path: &Path) -> BundleResult<Self> {
        let content = fs::read_to_string(path).map_err(|err| BundleError::Config {
            path: path.to_path_buf(),
            message: err.to_string(),
        })?;
        Self::from_json(&content, path)
    }

    /// Parses and validates configuration text. `origin` names it in errors.
    pub fn from_json(content: &str, origin: &Path) -> BundleResult<Self> {
        let config: BuildConfig =
            serde_json::from_str(content).map_err(|err| BundleError::Config {
                path: origin.to_path_buf(),
                message: err.to_string(),
            })?;
        config.validate(origin)?;
        Ok(config)
    }

    fn validate(&self, origin: &Path) -> BundleResult<()> {
        let invalid = |message: &str| BundleError::Config {
            path: origin.to_path_buf(),
            message: message.to_string(),
        };

        if self.entry.trim().is_empty() {
            return Err(invalid("`entry` cannot be empty"));
        }
        if self.output.filename.is_empty() {
            return Err(invalid("`output.filename` cannot be empty"));
        }
        if self.output.filename.contains(['/', '\\']) {
            return Err(invalid("`output.filename` must be a file name, not a path"));
        }
        Ok(())
    }

    /// Where the bundle is written, given the project root.
    pub fn output_file(&self, root: &Path) -> PathBuf {
        root.join(&self.output.path).join(&self.output.filename)
    }
}

/// Project root for a configuration file: the directory that contains it.
pub fn config_root(config_path: &Path) -> PathBuf {
    match config_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_parse_full_config() {
        let config = BuildConfig::from_json(
            r#"{
                "entry": "./src/index.js",
                "output": { "path": "dist", "filename": "bundle.js" },
                "runtime": { "cache": false }
            }"#,
            Path::new("minipack.config.json"),
        )
        .unwrap();

        assert_eq!(config.entry, "./src/index.js");
        assert_eq!(config.output.path, PathBuf::from("dist"));
        assert_eq!(config.output.filename, "bundle.js");
        assert!(!config.runtime.cache);
    }

    #[test]
    fn test_runtime_defaults_to_cache() {
        let config = BuildConfig::from_json(
            r#"{"entry": "./a.js", "output": {"path": "out", "filename": "b.js"}}"#,
            Path::new("c.json"),
        )
        .unwrap();
        assert!(config.runtime.cache);

        let config = BuildConfig::from_json(
            r#"{"entry": "./a.js", "output": {"path": "out", "filename": "b.js"}, "runtime": {}}"#,
            Path::new("c.json"),
        )
        .unwrap();
        assert_eq!(BundleOptions::from(&config.runtime), BundleOptions { cache: true });
    }

    #[rstest]
    #[case::not_json("entry: ./a.js")]
    #[case::missing_output(r#"{"entry": "./a.js"}"#)]
    #[case::empty_entry(r#"{"entry": " ", "output": {"path": "out", "filename": "b.js"}}"#)]
    #[case::empty_filename(r#"{"entry": "./a.js", "output": {"path": "out", "filename": ""}}"#)]
    #[case::nested_filename(r#"{"entry": "./a.js", "output": {"path": "out", "filename": "x/b.js"}}"#)]
    fn test_invalid_config(#[case] content: &str) {
        let err = BuildConfig::from_json(content, Path::new("bad.json")).unwrap_err();
        match err {
            BundleError::Config { path, .. } => assert_eq!(path, PathBuf::from("bad.json")),
            other => panic!("Expected Config error, got {other:?}"),
        }
    }

    #[test]
    fn test_missing_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(DEFAULT_CONFIG_FILE);
        let err = BuildConfig::from_file(&path).unwrap_err();
        assert!(matches!(err, BundleError::Config { .. }));
    }

    #[test]
    fn test_output_file_and_root() {
        let config = BuildConfig::new("./src/index.js", "dist", "bundle.js");
        assert_eq!(
            config.output_file(Path::new("/project")),
            PathBuf::from("/project/dist/bundle.js")
        );
        assert_eq!(config_root(Path::new("/project/minipack.config.json")), PathBuf::from("/project"));
        assert_eq!(config_root(Path::new("minipack.config.json")), PathBuf::from("."));
    }
}
