//! Error types for minipack-rs.

use std::path::PathBuf;

use thiserror::Error;

use crate::resolver::ModuleId;

/// Result type alias using BundleError.
pub type BundleResult<T> = Result<T, BundleError>;

/// Errors that abort a build. None of them leave a partial output file behind.
#[derive(Debug, Error)]
pub enum BundleError {
    /// The build configuration could not be read or parsed.
    #[error("Invalid configuration {path}: {message}")]
    Config { path: PathBuf, message: String },

    /// A resolved module identifier does not correspond to a readable file.
    #[error("Cannot load module `{id}`{}: {source}", importer_suffix(.importer))]
    MissingModule {
        id: ModuleId,
        importer: Option<ModuleId>,
        #[source]
        source: std::io::Error,
    },

    /// The module source is not valid syntax.
    #[error("Failed to parse `{id}`: {message}")]
    Parse { id: ModuleId, message: String },

    /// The module uses a construct the target runtime cannot express.
    #[error("Failed to transform `{id}`: {message}")]
    Transform { id: ModuleId, message: String },

    /// The graph contains an import cycle and the runtime was asked not to memoize.
    #[error("Import cycle cannot run without the module cache: {}", format_cycle(.cycle))]
    ImportCycle { cycle: Vec<ModuleId> },

    /// Writing the bundle failed.
    #[error("Failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A module table value could not be serialized into the bundle.
    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl BundleError {
    /// Attaches the importing module to a load failure raised without one.
    pub(crate) fn imported_by(self, by: &ModuleId) -> Self {
        match self {
            BundleError::MissingModule {
                id,
                importer: None,
                source,
            } => BundleError::MissingModule {
                id,
                importer: Some(by.clone()),
                source,
            },
            other => other,
        }
    }
}

fn importer_suffix(importer: &Option<ModuleId>) -> String {
    importer
        .as_ref()
        .map(|importer| format!(" (imported by `{importer}`)"))
        .unwrap_or_default()
}

fn format_cycle(cycle: &[ModuleId]) -> String {
    cycle
        .iter()
        .map(ModuleId::as_str)
        .collect::<Vec<_>>()
        .join(" -> ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_missing_module_names_importer() {
        let err = BundleError::MissingModule {
            id: ModuleId::normalize("./src/missing.js"),
            importer: None,
            source: io::Error::new(io::ErrorKind::NotFound, "not found"),
        }
        .imported_by(&ModuleId::normalize("./src/index.js"));

        let message = err.to_string();
        assert!(message.contains("`./src/missing.js`"));
        assert!(message.contains("imported by `./src/index.js`"));
    }

    #[test]
    fn test_cycle_message_lists_path() {
        let err = BundleError::ImportCycle {
            cycle: vec![
                ModuleId::normalize("./a.js"),
                ModuleId::normalize("./b.js"),
                ModuleId::normalize("./a.js"),
            ],
        };
        assert_eq!(
            err.to_string(),
            "Import cycle cannot run without the module cache: ./a.js -> ./b.js -> ./a.js"
        );
    }
}
