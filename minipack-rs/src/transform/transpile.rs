//! Parsing and code generation with swc.
//!
//! JavaScript modules are parsed directly with the swc parser. TypeScript and JSX
//! modules are first transpiled to plain JavaScript with deno_ast, JSON modules are
//! wrapped into an ES module, and the result is parsed the same way.

use deno_ast::swc::ast::{EsVersion, Module, ModuleDecl, ModuleItem, NamedExport, Str};
use deno_ast::swc::codegen::text_writer::JsWriter;
use deno_ast::swc::codegen::{Config as CodegenConfig, Emitter};
use deno_ast::swc::common::sync::Lrc;
use deno_ast::swc::common::{FileName, SourceMap, SourceMapper, Span, Spanned};
use deno_ast::swc::parser::error::Error as SwcParseError;
use deno_ast::swc::parser::lexer::Lexer;
use deno_ast::swc::parser::{EsSyntax, Parser, StringInput, Syntax};
use deno_ast::{
    EmitOptions, MediaType, ModuleSpecifier, ParseParams, SourceMapOption,
    TranspileModuleOptions, TranspileOptions,
};
use log::debug;

use super::lower::Lowering;
use super::text::{strip_bom, transform_json_source};
use super::SourceTransform;
use crate::error::{BundleError, BundleResult};
use crate::resolver::ModuleId;

/// How a module's source has to be prepared before the ES parser sees it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SourceKind {
    JavaScript,
    Json,
    /// Needs deno_ast transpilation with the given media type.
    Transpiled(MediaType),
}

impl SourceKind {
    fn of(id: &ModuleId) -> Self {
        match id.extension() {
            Some("json") => SourceKind::Json,
            Some("ts") => SourceKind::Transpiled(MediaType::TypeScript),
            Some("mts") => SourceKind::Transpiled(MediaType::Mts),
            Some("cts") => SourceKind::Transpiled(MediaType::Cts),
            Some("tsx") => SourceKind::Transpiled(MediaType::Tsx),
            Some("jsx") => SourceKind::Transpiled(MediaType::Jsx),
            _ => SourceKind::JavaScript,
        }
    }
}

/// A parsed module together with the source map its spans point into.
pub struct SyntaxTree {
    pub(super) source_map: Lrc<SourceMap>,
    pub(super) module: Module,
    specifiers: Vec<String>,
}

impl SyntaxTree {
    /// Source text covered by `span`.
    pub(super) fn snippet(&self, id: &ModuleId, span: Span) -> BundleResult<String> {
        self.source_map
            .span_to_snippet(span)
            .map_err(|err| BundleError::Transform {
                id: id.clone(),
                message: format!("Unable to read source text: {:?}", err),
            })
    }

    /// Generates JavaScript for a run of module items.
    pub(super) fn print(&self, id: &ModuleId, items: Vec<ModuleItem>) -> BundleResult<String> {
        let module = Module {
            span: self.module.span,
            body: items,
            shebang: None,
        };

        let mut buf = Vec::new();
        {
            let cfg = CodegenConfig::default()
                .with_minify(false)
                .with_target(EsVersion::Es2020)
                .with_omit_last_semi(false);

            let mut emitter = Emitter {
                cfg,
                cm: self.source_map.clone(),
                comments: None,
                wr: Box::new(JsWriter::new(self.source_map.clone(), "\n", &mut buf, None)),
            };

            emitter
                .emit_module(&module)
                .map_err(|err| BundleError::Transform {
                    id: id.clone(),
                    message: format!("Unable to emit code: {}", err),
                })?;
        }

        String::from_utf8(buf).map_err(|err| BundleError::Transform {
            id: id.clone(),
            message: format!("Emitted code is an invalid string: {}", err),
        })
    }
}

/// The production source transform: swc parsing, deno_ast transpilation and an
/// ES module to `require`/`exports` lowering pass.
#[derive(Default)]
pub struct SwcTransform {
    transpile_options: TranspileOptions,
}

impl SwcTransform {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_transpile_options(transpile_options: TranspileOptions) -> Self {
        Self { transpile_options }
    }

    /// Strips TypeScript syntax and JSX, leaving an ES module.
    fn transpile(&self, id: &ModuleId, source: String, media_type: MediaType) -> BundleResult<String> {
        let specifier = module_specifier(id)?;
        let parsed = deno_ast::parse_module(ParseParams {
            specifier,
            text: source.into(),
            media_type,
            capture_tokens: false,
            scope_analysis: false,
            maybe_syntax: None,
        })
        .map_err(|err| BundleError::Parse {
            id: id.clone(),
            message: err.to_string(),
        })?;

        let emitted = parsed
            .transpile(
                &self.transpile_options,
                &TranspileModuleOptions::default(),
                &EmitOptions {
                    source_map: SourceMapOption::None,
                    ..Default::default()
                },
            )
            .map_err(|err| BundleError::Transform {
                id: id.clone(),
                message: err.to_string(),
            })?
            .into_source();

        Ok(emitted.text)
    }
}

impl SourceTransform for SwcTransform {
    type Tree = SyntaxTree;

    fn parse(&self, id: &ModuleId, source: &str) -> BundleResult<SyntaxTree> {
        let source = strip_bom(source);
        let source = match SourceKind::of(id) {
            SourceKind::JavaScript => source.to_string(),
            SourceKind::Json => transform_json_source(source),
            SourceKind::Transpiled(media_type) => {
                debug!("Transpiling {} as {:?}", id, media_type);
                self.transpile(id, source.to_string(), media_type)?
            }
        };
        parse_es_module(id, source)
    }

    fn import_specifiers(&self, tree: &SyntaxTree) -> Vec<String> {
        tree.specifiers.clone()
    }

    fn lower(&self, id: &ModuleId, tree: &SyntaxTree) -> BundleResult<String> {
        let mut lowering = Lowering::new(id, tree);
        for item in &tree.module.body {
            lowering.item(item)?;
        }
        lowering.finish()
    }
}

fn module_specifier(id: &ModuleId) -> BundleResult<ModuleSpecifier> {
    let path = id.as_str().trim_start_matches("./").trim_start_matches('/');
    ModuleSpecifier::parse(&format!("file:///{path}")).map_err(|err| BundleError::Parse {
        id: id.clone(),
        message: format!("Invalid module path: {}", err),
    })
}

fn parse_es_module(id: &ModuleId, source: String) -> BundleResult<SyntaxTree> {
    let source_map: Lrc<SourceMap> = Default::default();
    let source_file = source_map.new_source_file(FileName::Custom(id.to_string()).into(), source);

    let input = StringInput::from(&*source_file);
    let lexer = Lexer::new(
        Syntax::Es(EsSyntax::default()),
        EsVersion::EsNext,
        input,
        None,
    );
    let mut parser = Parser::new_from(lexer);

    let module = parser
        .parse_module()
        .map_err(|err| parse_error(id, &source_map, err))?;
    if let Some(err) = parser.take_errors().into_iter().next() {
        return Err(parse_error(id, &source_map, err));
    }

    let mut tree = SyntaxTree {
        source_map,
        module,
        specifiers: Vec::new(),
    };
    tree.specifiers = static_specifiers(&tree);
    Ok(tree)
}

/// Specifiers of `import` and `export ... from` declarations, in source order.
fn static_specifiers(tree: &SyntaxTree) -> Vec<String> {
    tree.module
        .body
        .iter()
        .filter_map(|item| match item {
            ModuleItem::ModuleDecl(ModuleDecl::Import(import)) => Some(&*import.src),
            ModuleItem::ModuleDecl(ModuleDecl::ExportNamed(NamedExport {
                src: Some(src), ..
            })) => Some(&**src),
            ModuleItem::ModuleDecl(ModuleDecl::ExportAll(export)) => Some(&*export.src),
            _ => None,
        })
        .map(str_value)
        .collect()
}

/// The decoded value of a string literal. Lone surrogates are replaced.
pub(super) fn str_value(lit: &Str) -> String {
    lit.value.to_atom_lossy().as_str().to_string()
}

fn parse_error(id: &ModuleId, source_map: &SourceMap, err: SwcParseError) -> BundleError {
    let loc = source_map.lookup_char_pos(err.span().lo);
    BundleError::Parse {
        id: id.clone(),
        message: format!(
            "{} at {}:{}",
            err.kind().msg(),
            loc.line,
            loc.col_display + 1
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(path: &str, source: &str) -> BundleResult<SyntaxTree> {
        SwcTransform::new().parse(&ModuleId::normalize(path), source)
    }

    #[test]
    fn test_source_kind_from_extension() {
        assert_eq!(SourceKind::of(&ModuleId::normalize("a.js")), SourceKind::JavaScript);
        assert_eq!(SourceKind::of(&ModuleId::normalize("a.mjs")), SourceKind::JavaScript);
        assert_eq!(SourceKind::of(&ModuleId::normalize("a")), SourceKind::JavaScript);
        assert_eq!(SourceKind::of(&ModuleId::normalize("a.json")), SourceKind::Json);
        assert_eq!(
            SourceKind::of(&ModuleId::normalize("a.tsx")),
            SourceKind::Transpiled(MediaType::Tsx)
        );
    }

    #[test]
    fn test_specifiers_in_source_order() {
        let tree = parse(
            "./index.js",
            r#"
import "./side-effect.js";
import def, { named } from './b.js';
export { c } from "./c.js";
export * from './d.js';
const x = 1;
"#,
        )
        .unwrap();

        assert_eq!(
            SwcTransform::new().import_specifiers(&tree),
            vec!["./side-effect.js", "./b.js", "./c.js", "./d.js"]
        );
    }

    #[test]
    fn test_specifier_escapes_are_decoded() {
        let tree = parse(
            "./index.js",
            "import { b } from './\\u0062.js';\nexport * from \"./c\\x2ejs\";\n",
        )
        .unwrap();
        assert_eq!(
            SwcTransform::new().import_specifiers(&tree),
            vec!["./b.js", "./c.js"]
        );
    }

    #[test]
    fn test_dynamic_imports_are_not_collected() {
        let tree = parse(
            "./index.js",
            "const lazy = () => import('./lazy.js');\nconst cjs = require('./cjs.js');\n",
        )
        .unwrap();
        assert!(SwcTransform::new().import_specifiers(&tree).is_empty());
    }

    #[test]
    fn test_parse_error_reports_location() {
        let err = parse("./broken.js", "const a = ;\n").err().unwrap();
        match err {
            BundleError::Parse { id, message } => {
                assert_eq!(id.as_str(), "./broken.js");
                assert!(message.contains("1:"), "unexpected message: {message}");
            }
            other => panic!("Expected Parse error, got {other:?}"),
        }
    }

    #[test]
    fn test_json_module_becomes_default_export() {
        let transform = SwcTransform::new();
        let id = ModuleId::normalize("./data.json");
        let tree = transform.parse(&id, "{\"answer\": 42}").unwrap();
        let body = transform.lower(&id, &tree).unwrap();
        assert!(body.contains("exports.default = (JSON.parse("));
    }

    #[test]
    fn test_typescript_is_transpiled() {
        let transform = SwcTransform::new();
        let id = ModuleId::normalize("./src/math.ts");
        let tree = transform
            .parse(
                &id,
                "import type { Shape } from './shape.ts';\nimport { scale } from './scale.ts';\nexport function area(r: number): number { return scale(r * r); }\n",
            )
            .unwrap();

        // the type-only import disappears together with the annotations
        assert_eq!(transform.import_specifiers(&tree), vec!["./scale.ts"]);
        let body = transform.lower(&id, &tree).unwrap();
        assert!(body.contains("function area(r)"));
        assert!(!body.contains(": number"));
    }

    #[test]
    fn test_print_regenerates_statements() {
        let tree = parse("./a.js", "let   a =  1 ;\nfunction f ( ) { return a }").unwrap();
        let code = tree
            .print(&ModuleId::normalize("./a.js"), tree.module.body.clone())
            .unwrap();
        assert!(code.contains("let a = 1;"));
        assert!(code.contains("function f() {"));
    }
}
