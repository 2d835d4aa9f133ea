//! Lowering of ES module declarations to the runtime's `require`/`exports` form.
//!
//! The lowered body is laid out in evaluation order:
//!
//! 1. `"use strict"` and the `__esModule` marker
//! 2. getters for every local export, so exported bindings stay live and are
//!    visible to importers that re-enter this module through a cycle
//! 3. one `require` per import declaration, hoisted like ES imports are
//! 4. `export *` forwarding
//! 5. the remaining statements, with `export default <expr>` assignments in place
//!
//! Imported bindings are copied out of the dependency's exports when its
//! `require` returns.

use std::collections::HashMap;

use deno_ast::swc::ast::{
    ClassDecl, Decl, DefaultDecl, ExportSpecifier, FnDecl, ImportSpecifier, ModuleDecl,
    ModuleExportName, ModuleItem, ObjectPatProp, Pat, Stmt,
};
use deno_ast::swc::common::{Span, Spanned};

use super::text::js_string;
use super::transpile::{str_value, SyntaxTree};
use crate::error::{BundleError, BundleResult};
use crate::resolver::ModuleId;

const IMPORT_PREFIX: &str = "__minipack_import_";

pub(super) struct Lowering<'a> {
    id: &'a ModuleId,
    tree: &'a SyntaxTree,
    /// `(key literal, getter expression)` for each export binding.
    exports: Vec<(String, String)>,
    requires: Vec<String>,
    /// Binding holding each specifier's exports, so a source is required once.
    bindings: HashMap<String, String>,
    /// Index into `requires` of a side-effect-only `require` per specifier.
    bare_requires: HashMap<String, usize>,
    star_exports: Vec<String>,
    statements: Vec<String>,
    /// Plain items waiting to be printed as one run.
    pending: Vec<ModuleItem>,
    next_import: usize,
    is_esm: bool,
}

impl<'a> Lowering<'a> {
    pub(super) fn new(id: &'a ModuleId, tree: &'a SyntaxTree) -> Self {
        Self {
            id,
            tree,
            exports: Vec::new(),
            requires: Vec::new(),
            bindings: HashMap::new(),
            bare_requires: HashMap::new(),
            star_exports: Vec::new(),
            statements: Vec::new(),
            pending: Vec::new(),
            next_import: 0,
            is_esm: false,
        }
    }

    pub(super) fn item(&mut self, item: &ModuleItem) -> BundleResult<()> {
        let decl = match item {
            ModuleItem::Stmt(_) => {
                self.pending.push(item.clone());
                return Ok(());
            }
            ModuleItem::ModuleDecl(decl) => decl,
        };

        match decl {
            ModuleDecl::Import(import) => {
                let specifier = str_value(&import.src);
                if import.specifiers.is_empty() {
                    if !self.bindings.contains_key(&specifier)
                        && !self.bare_requires.contains_key(&specifier)
                    {
                        self.bare_requires
                            .insert(specifier.clone(), self.requires.len());
                        self.requires
                            .push(format!("require({});", js_string(&specifier)));
                    }
                    return Ok(());
                }

                let binding = self.require_binding(&specifier);
                for spec in &import.specifiers {
                    let (local, value) = match spec {
                        ImportSpecifier::Default(default) => {
                            (default.local.sym.to_string(), interop_default(&binding))
                        }
                        ImportSpecifier::Namespace(namespace) => {
                            (namespace.local.sym.to_string(), binding.clone())
                        }
                        ImportSpecifier::Named(named) => {
                            let local = named.local.sym.to_string();
                            let imported = match &named.imported {
                                Some(name) => self.export_name(name)?,
                                None => local.clone(),
                            };
                            (local, member(&binding, &imported))
                        }
                    };
                    self.requires.push(format!("var {local} = {value};"));
                }
            }
            ModuleDecl::ExportDecl(export) => {
                self.is_esm = true;
                for name in declared_names(&export.decl) {
                    self.export_binding(&name, name.clone());
                }
                self.pending
                    .push(ModuleItem::Stmt(Stmt::Decl(export.decl.clone())));
            }
            ModuleDecl::ExportNamed(named) => {
                self.is_esm = true;
                match &named.src {
                    Some(src) => {
                        let specifier = str_value(src);
                        let binding = self.require_binding(&specifier);
                        for spec in &named.specifiers {
                            self.reexport(spec, &binding)?;
                        }
                    }
                    None => {
                        for spec in &named.specifiers {
                            self.local_export(spec)?;
                        }
                    }
                }
            }
            ModuleDecl::ExportDefaultDecl(export) => {
                self.is_esm = true;
                match &export.decl {
                    DefaultDecl::Fn(function) => match &function.ident {
                        Some(ident) => {
                            self.export_binding("default", ident.sym.to_string());
                            self.pending
                                .push(ModuleItem::Stmt(Stmt::Decl(Decl::Fn(FnDecl {
                                    ident: ident.clone(),
                                    declare: false,
                                    function: function.function.clone(),
                                }))));
                        }
                        None => self.assign_default(export.decl.span())?,
                    },
                    DefaultDecl::Class(class) => match &class.ident {
                        Some(ident) => {
                            self.export_binding("default", ident.sym.to_string());
                            self.pending
                                .push(ModuleItem::Stmt(Stmt::Decl(Decl::Class(ClassDecl {
                                    ident: ident.clone(),
                                    declare: false,
                                    class: class.class.clone(),
                                }))));
                        }
                        None => self.assign_default(export.decl.span())?,
                    },
                    // interfaces only exist for the type checker
                    DefaultDecl::TsInterfaceDecl(_) => {}
                }
            }
            ModuleDecl::ExportDefaultExpr(export) => {
                self.is_esm = true;
                self.assign_default(export.expr.span())?;
            }
            ModuleDecl::ExportAll(export) => {
                self.is_esm = true;
                let specifier = str_value(&export.src);
                let binding = self.require_binding(&specifier);
                self.star_exports.push(forward_all(&binding));
            }
            _ => {
                let text = self.tree.snippet(self.id, decl.span())?;
                return Err(BundleError::Transform {
                    id: self.id.clone(),
                    message: format!(
                        "Unsupported module declaration: {}",
                        text.lines().next().unwrap_or_default()
                    ),
                });
            }
        }
        Ok(())
    }

    pub(super) fn finish(mut self) -> BundleResult<String> {
        self.flush()?;

        let mut body = String::from("\"use strict\";\n");
        if self.is_esm {
            body.push_str("Object.defineProperty(exports, \"__esModule\", { value: true });\n");
        }
        for (key, value) in &self.exports {
            body.push_str(&format!(
                "Object.defineProperty(exports, {key}, {{ enumerable: true, get: function () {{ return {value}; }} }});\n"
            ));
        }
        for line in self
            .requires
            .iter()
            .chain(&self.star_exports)
            .chain(&self.statements)
        {
            body.push_str(line);
            if !line.ends_with('\n') {
                body.push('\n');
            }
        }
        Ok(body)
    }

    /// Returns the variable holding `specifier`'s exports, hoisting its `require`
    /// the first time the specifier is seen.
    fn require_binding(&mut self, specifier: &str) -> String {
        if let Some(binding) = self.bindings.get(specifier) {
            return binding.clone();
        }

        let binding = format!("{IMPORT_PREFIX}{}", self.next_import);
        self.next_import += 1;
        let line = format!("var {binding} = require({});", js_string(specifier));
        // an earlier `import "x"` keeps its place and gains the binding
        match self.bare_requires.remove(specifier) {
            Some(index) => self.requires[index] = line,
            None => self.requires.push(line),
        }
        self.bindings.insert(specifier.to_string(), binding.clone());
        binding
    }

    fn export_binding(&mut self, exported: &str, value: String) {
        self.exports.push((js_string(exported), value));
    }

    fn export_name(&self, name: &ModuleExportName) -> BundleResult<String> {
        match name {
            ModuleExportName::Ident(ident) => Ok(ident.sym.to_string()),
            ModuleExportName::Str(lit) => Ok(str_value(lit)),
        }
    }

    /// `export { a as b } from "./x"` and friends.
    fn reexport(&mut self, spec: &ExportSpecifier, binding: &str) -> BundleResult<()> {
        match spec {
            ExportSpecifier::Namespace(namespace) => {
                let exported = self.export_name(&namespace.name)?;
                self.export_binding(&exported, binding.to_string());
            }
            ExportSpecifier::Default(default) => {
                self.export_binding(&default.exported.sym.to_string(), interop_default(binding));
            }
            ExportSpecifier::Named(named) => {
                let orig = self.export_name(&named.orig)?;
                let exported = match &named.exported {
                    Some(name) => self.export_name(name)?,
                    None => orig.clone(),
                };
                self.export_binding(&exported, member(binding, &orig));
            }
        }
        Ok(())
    }

    /// `export { a as b }` of a binding declared in this module.
    fn local_export(&mut self, spec: &ExportSpecifier) -> BundleResult<()> {
        let ExportSpecifier::Named(named) = spec else {
            return Err(self.unsupported(spec.span()));
        };
        let local = match &named.orig {
            ModuleExportName::Ident(ident) => ident.sym.to_string(),
            other => return Err(self.unsupported(other.span())),
        };
        let exported = match &named.exported {
            Some(name) => self.export_name(name)?,
            None => local.clone(),
        };
        self.export_binding(&exported, local);
        Ok(())
    }

    fn assign_default(&mut self, span: Span) -> BundleResult<()> {
        let expr = self.tree.snippet(self.id, span)?;
        self.flush()?;
        self.statements
            .push(format!("exports.default = ({});", expr.trim()));
        Ok(())
    }

    fn flush(&mut self) -> BundleResult<()> {
        if self.pending.is_empty() {
            return Ok(());
        }
        let items = std::mem::take(&mut self.pending);
        let code = self.tree.print(self.id, items)?;
        self.statements.push(code);
        Ok(())
    }

    fn unsupported(&self, span: Span) -> BundleError {
        let text = self.tree.snippet(self.id, span).unwrap_or_default();
        BundleError::Transform {
            id: self.id.clone(),
            message: format!("Unsupported export specifier: {}", text),
        }
    }
}

/// The default export of a required module, falling back to the whole exports
/// object for modules that were not lowered from ES syntax.
fn interop_default(binding: &str) -> String {
    format!("({binding} && {binding}.__esModule ? {binding}.default : {binding})")
}

fn member(binding: &str, name: &str) -> String {
    if name == "default" {
        interop_default(binding)
    } else {
        format!("{binding}[{}]", js_string(name))
    }
}

fn forward_all(binding: &str) -> String {
    format!(
        "Object.keys({binding}).forEach(function (key) {{\n\
         \x20 if (key === \"default\" || key === \"__esModule\" || Object.prototype.hasOwnProperty.call(exports, key)) return;\n\
         \x20 Object.defineProperty(exports, key, {{ enumerable: true, get: function () {{ return {binding}[key]; }} }});\n\
         }});"
    )
}

/// Names bound by an exported declaration.
fn declared_names(decl: &Decl) -> Vec<String> {
    let mut names = Vec::new();
    match decl {
        Decl::Fn(function) => names.push(function.ident.sym.to_string()),
        Decl::Class(class) => names.push(class.ident.sym.to_string()),
        Decl::Var(var) => {
            for declarator in &var.decls {
                pattern_names(&declarator.name, &mut names);
            }
        }
        _ => {}
    }
    names
}

fn pattern_names(pat: &Pat, names: &mut Vec<String>) {
    match pat {
        Pat::Ident(binding) => names.push(binding.id.sym.to_string()),
        Pat::Array(array) => {
            for elem in array.elems.iter().flatten() {
                pattern_names(elem, names);
            }
        }
        Pat::Object(object) => {
            for prop in &object.props {
                match prop {
                    ObjectPatProp::KeyValue(kv) => pattern_names(&kv.value, names),
                    ObjectPatProp::Assign(assign) => names.push(assign.key.id.sym.to_string()),
                    ObjectPatProp::Rest(rest) => pattern_names(&rest.arg, names),
                }
            }
        }
        Pat::Rest(rest) => pattern_names(&rest.arg, names),
        Pat::Assign(assign) => pattern_names(&assign.left, names),
        _ => {}
    }
}
