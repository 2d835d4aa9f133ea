//! Source transformation for minipack.
//!
//! The graph builder needs three things from a module's source: a syntax tree, the
//! list of statically imported specifiers, and a body the runtime loader can run as
//! a factory function. [`SourceTransform`] is that seam; [`SwcTransform`] is the
//! implementation used for real builds.
//!
//! # Architecture
//!
//! - `transpile`: parsing with the swc parser (TypeScript/JSX go through deno_ast first)
//! - `lower`: rewrites ES module declarations into `require`/`exports` form
//! - `text`: helpers for source text and JavaScript literals

mod lower;
mod transpile;
pub(crate) mod text;

use std::collections::BTreeMap;

use serde::Serialize;

use crate::error::BundleResult;
use crate::resolver::{resolve, ModuleId};

pub use transpile::{SwcTransform, SyntaxTree};

/// Per-module map from the specifier text written in the source to the resolved
/// identifier of the target.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ImportTable(BTreeMap<String, ModuleId>);

impl ImportTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a specifier. Identical specifier text always resolves identically
    /// within one module, so a repeated insert is a no-op in practice.
    pub fn insert(&mut self, specifier: impl Into<String>, target: ModuleId) {
        self.0.insert(specifier.into(), target);
    }

    pub fn get(&self, specifier: &str) -> Option<&ModuleId> {
        self.0.get(specifier)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ModuleId)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Resolved identifiers, one per specifier.
    pub fn targets(&self) -> impl Iterator<Item = &ModuleId> {
        self.0.values()
    }
}

/// The capabilities the graph builder needs from a source-to-target compiler.
pub trait SourceTransform {
    type Tree;

    /// Parses a module's source. `id` names the module in diagnostics and selects
    /// the syntax from its extension.
    fn parse(&self, id: &ModuleId, source: &str) -> BundleResult<Self::Tree>;

    /// Statically declared import specifiers, in source order.
    fn import_specifiers(&self, tree: &Self::Tree) -> Vec<String>;

    /// Lowers the tree to a body for a `function (require, module, exports)` factory.
    fn lower(&self, id: &ModuleId, tree: &Self::Tree) -> BundleResult<String>;

    /// Builds the module's import table by resolving every specifier against `id`.
    fn collect_imports(&self, tree: &Self::Tree, id: &ModuleId) -> ImportTable {
        let mut imports = ImportTable::new();
        for specifier in self.import_specifiers(tree) {
            let target = resolve(&specifier, id);
            imports.insert(specifier, target);
        }
        imports
    }
}

impl<T: SourceTransform + ?Sized> SourceTransform for &T {
    type Tree = T::Tree;

    fn parse(&self, id: &ModuleId, source: &str) -> BundleResult<Self::Tree> {
        (**self).parse(id, source)
    }

    fn import_specifiers(&self, tree: &Self::Tree) -> Vec<String> {
        (**self).import_specifiers(tree)
    }

    fn lower(&self, id: &ModuleId, tree: &Self::Tree) -> BundleResult<String> {
        (**self).lower(id, tree)
    }

    fn collect_imports(&self, tree: &Self::Tree, id: &ModuleId) -> ImportTable {
        (**self).collect_imports(tree, id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collect_imports_resolves_against_importer() {
        let transform = SwcTransform::new();
        let id = ModuleId::normalize("./src/index.js");
        let tree = transform
            .parse(
                &id,
                "import a from './a.js';\nimport { b } from '../lib/b.js';\nimport './a.js';\n",
            )
            .unwrap();

        let imports = transform.collect_imports(&tree, &id);
        assert_eq!(imports.len(), 2);
        assert_eq!(imports.get("./a.js").unwrap().as_str(), "./src/a.js");
        assert_eq!(imports.get("../lib/b.js").unwrap().as_str(), "./lib/b.js");
    }

    #[test]
    fn test_import_table_serializes_as_object() {
        let mut imports = ImportTable::new();
        imports.insert("./b.js", ModuleId::normalize("./src/b.js"));
        imports.insert("./a.js", ModuleId::normalize("./src/a.js"));
        assert_eq!(
            serde_json::to_string(&imports).unwrap(),
            r#"{"./a.js":"./src/a.js","./b.js":"./src/b.js"}"#
        );
    }
}
