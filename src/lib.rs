//! sclc - a compiler from SCL, a small imperative language, to
//! stage-runtime project JSON.
//!
//! `compile` wires the whole pipeline together: lex, preprocess,
//! parse, optionally optimize, lower. Each stage is also exposed as
//! its own module for callers that want to stop partway (dump tokens,
//! dump the AST, etc. — see `main.rs`'s `--tokens`/`--ast` modes).

pub mod ast;
pub mod error;
pub mod id;
pub mod lexer;
pub mod lowerer;
pub mod optimizer;
pub mod parser;
pub mod preprocessor;
pub mod scope;
pub mod stage;
pub mod token;

use std::path::Path;

use serde_json::Value;

use error::Result;

/// Compiles `source` end to end, producing a full project JSON.
///
/// `source_dir`/`header_root` are forwarded to the preprocessor for
/// resolving `#include`. `optimize` threads the CLI's global
/// `--nooptimize` switch: when false, the constant-folding pass is
/// skipped entirely and the parser's raw desugaring is lowered as-is.
/// `template` overrides the bundled minimal project skeleton with a
/// caller-supplied one (e.g. a real asset-bearing project fetched by
/// an external packaging step); `None` falls back to
/// `stage::fresh_project()`.
pub fn compile(source: &str, source_dir: &Path, header_root: &Path, optimize: bool, template: Option<Value>) -> Result<Value> {
    let ast = parse_to_ast(source, source_dir, header_root)?;
    let ast = if optimize { optimizer::optimize(ast) } else { ast };
    lowerer::lower_with_template(ast, template)
}

/// Runs the pipeline through the Parser only, for callers that want
/// the raw (or optimized) AST without lowering it.
pub fn parse_to_ast(source: &str, source_dir: &Path, header_root: &Path) -> Result<ast::Node> {
    let tokens = lexer::tokenize(source)?;
    let tokens = preprocessor::preprocess(tokens, source_dir, header_root)?;
    parser::parse(tokens)
}
