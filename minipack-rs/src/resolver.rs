//! Module identifiers and specifier resolution.
//!
//! A [`ModuleId`] is a `/`-separated path relative to the project root. Every
//! identifier is canonical: `.` and `..` segments are collapsed and empty segments
//! dropped, so two spellings of one file always produce the same key.

use std::borrow::Borrow;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Canonical identifier of one source file in the build.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModuleId(String);

impl ModuleId {
    /// Canonicalizes an arbitrary path into an identifier.
    ///
    /// Paths inside the root get a `./` prefix, paths climbing above it keep their
    /// leading `../` segments and rooted paths stay rooted.
    pub fn normalize(path: &str) -> Self {
        let path = path.replace('\\', "/");
        let rooted = path.starts_with('/');

        let mut segments: Vec<&str> = Vec::new();
        for segment in path.split('/') {
            match segment {
                "" | "." => {}
                ".." => match segments.last() {
                    Some(&last) if last != ".." => {
                        segments.pop();
                    }
                    // `/..` is `/`
                    _ if rooted => {}
                    _ => segments.push(".."),
                },
                other => segments.push(other),
            }
        }

        let joined = segments.join("/");
        if rooted {
            ModuleId(format!("/{joined}"))
        } else if segments.first() == Some(&"..") {
            ModuleId(joined)
        } else {
            ModuleId(format!("./{joined}"))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Directory part of the identifier, without a trailing separator.
    pub fn dirname(&self) -> &str {
        match self.0.rfind('/') {
            Some(0) => "/",
            Some(idx) => &self.0[..idx],
            None => ".",
        }
    }

    /// File extension, if the last segment has one.
    pub fn extension(&self) -> Option<&str> {
        let file_name = self.0.rsplit('/').next()?;
        match file_name.rfind('.') {
            Some(0) | None => None,
            Some(idx) => Some(&file_name[idx + 1..]),
        }
    }

    /// Location of the module's source file below `root`.
    pub fn to_path(&self, root: &Path) -> PathBuf {
        if self.0.starts_with('/') {
            PathBuf::from(&self.0)
        } else {
            root.join(&self.0)
        }
    }
}

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for ModuleId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for ModuleId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Resolves an import specifier written in `importer` to the identifier of its target.
///
/// Relative specifiers are joined onto the importer's directory; rooted ones are
/// only canonicalized. Resolution never touches the file system, a target that
/// does not exist is reported when the graph builder tries to load it.
pub fn resolve(specifier: &str, importer: &ModuleId) -> ModuleId {
    if specifier.starts_with('/') {
        return ModuleId::normalize(specifier);
    }
    ModuleId::normalize(&format!("{}/{}", importer.dirname(), specifier))
}
