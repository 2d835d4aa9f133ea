//! Bundle emission.
//!
//! Turns a finished [`ModuleTable`] into one self-contained script: a wrapper
//! function that receives every module as a `factory` function and reimplements
//! `require` on top of the per-module import tables.

use std::io;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::{BundleError, BundleResult};
use crate::graph::ModuleTable;
use crate::resolver::ModuleId;
use crate::transform::text::js_string;

/// Knobs for the emitted runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BundleOptions {
    /// Keep one `module` record per identifier so each body runs at most once.
    pub cache: bool,
}

impl Default for BundleOptions {
    fn default() -> Self {
        Self { cache: true }
    }
}

/// Result of emitting a bundle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleEmit {
    pub code: String,
}

const RUNTIME_HEAD: &str = r#"(function (graph) {
"#;

const RUNTIME_CACHE: &str = r#"  var cache = {};
"#;

const RUNTIME_REQUIRE_OPEN: &str = r#"  function require(id) {
"#;

const RUNTIME_CACHE_LOOKUP: &str = r#"    if (Object.prototype.hasOwnProperty.call(cache, id)) {
      return cache[id].exports;
    }
"#;

const RUNTIME_RECORD: &str = r#"    var record = graph[id];
    if (!record) {
      throw new Error("Cannot find module '" + id + "'");
    }
    var module = { exports: {} };
"#;

const RUNTIME_CACHE_STORE: &str = r#"    cache[id] = module;
"#;

const RUNTIME_REQUIRE_CLOSE: &str = r#"    function localRequire(specifier) {
      if (!Object.prototype.hasOwnProperty.call(record.dependencies, specifier)) {
        throw new Error("Cannot resolve '" + specifier + "' from '" + id + "'");
      }
      return require(record.dependencies[specifier]);
    }
    record.factory.call(module.exports, localRequire, module, module.exports);
    return module.exports;
  }
"#;

/// Emits the bundle for `table`, starting at `entry`.
pub fn emit(table: &ModuleTable, entry: &ModuleId, options: BundleOptions) -> BundleResult<BundleEmit> {
    if !table.contains(entry.as_str()) {
        return Err(BundleError::MissingModule {
            id: entry.clone(),
            importer: None,
            source: io::Error::new(io::ErrorKind::NotFound, "entry is not in the module table"),
        });
    }

    let mut code = String::new();
    code.push_str(RUNTIME_HEAD);
    if options.cache {
        code.push_str(RUNTIME_CACHE);
    }
    code.push_str(RUNTIME_REQUIRE_OPEN);
    if options.cache {
        code.push_str(RUNTIME_CACHE_LOOKUP);
    }
    code.push_str(RUNTIME_RECORD);
    if options.cache {
        code.push_str(RUNTIME_CACHE_STORE);
    }
    code.push_str(RUNTIME_REQUIRE_CLOSE);
    code.push_str(&format!("  return require({});\n", js_string(entry.as_str())));
    code.push_str("})({\n");

    let count = table.len();
    for (index, (id, record)) in table.iter().enumerate() {
        let dependencies = serde_json::to_string(&record.imports)?;
        code.push_str(&format!(
            "{}: {{\n  dependencies: {},\n  factory: function (require, module, exports) {{\n{}\n  }}\n}}",
            js_string(id.as_str()),
            dependencies,
            record.body.trim_end(),
        ));
        code.push_str(if index + 1 < count { ",\n" } else { "\n" });
    }
    code.push_str("});\n");

    debug!("Emitted bundle of {} bytes for {} modules", code.len(), count);
    Ok(BundleEmit { code })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::CompiledModule;
    use crate::transform::ImportTable;

    fn table() -> ModuleTable {
        let mut imports = ImportTable::new();
        imports.insert("./b.js", ModuleId::normalize("./src/b.js"));
        [
            CompiledModule {
                id: ModuleId::normalize("./src/index.js"),
                imports,
                body: "\"use strict\";\nrequire(\"./b.js\");\n".to_string(),
            },
            CompiledModule {
                id: ModuleId::normalize("./src/b.js"),
                imports: ImportTable::new(),
                body: "exports.b = 1;".to_string(),
            },
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn test_emit_shape() {
        let entry = ModuleId::normalize("./src/index.js");
        let code = emit(&table(), &entry, BundleOptions::default()).unwrap().code;

        assert!(code.starts_with("(function (graph) {\n"));
        assert!(code.contains("return require(\"./src/index.js\");"));
        assert!(code.contains(
            "\"./src/index.js\": {\n  dependencies: {\"./b.js\":\"./src/b.js\"},\n  factory: function (require, module, exports) {\n"
        ));
        assert!(code.contains("\"./src/b.js\": {\n  dependencies: {},"));
        assert!(code.ends_with("});\n"));
        assert!(!code.contains("eval("));
    }

    #[test]
    fn test_cache_is_optional() {
        let entry = ModuleId::normalize("./src/index.js");
        let cached = emit(&table(), &entry, BundleOptions { cache: true }).unwrap().code;
        let uncached = emit(&table(), &entry, BundleOptions { cache: false }).unwrap().code;

        assert!(cached.contains("var cache = {};"));
        assert!(cached.contains("cache[id] = module;"));
        assert!(!uncached.contains("cache"));
    }

    #[test]
    fn test_emit_is_deterministic() {
        let entry = ModuleId::normalize("./src/index.js");
        let first = emit(&table(), &entry, BundleOptions::default()).unwrap();
        let second = emit(&table(), &entry, BundleOptions::default()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_entry_must_be_in_table() {
        let entry = ModuleId::normalize("./src/other.js");
        let err = emit(&table(), &entry, BundleOptions::default()).unwrap_err();
        assert!(matches!(err, BundleError::MissingModule { ref id, .. } if id.as_str() == "./src/other.js"));
    }
}
