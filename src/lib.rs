//! # Treaty Component Compiler
//!
//! Compiles `.treaty` single-file components into standalone Angular Ivy
//! component modules.
//!
//! ## Pipeline
//!
//! 1. **Lexer** splits the document into script, markup, style, interpolation
//!    and directive tokens. Malformed regions degrade to best-effort tokens plus
//!    diagnostics; lexing never fails.
//! 2. **Parser** lifts tokens into a flat, source-ordered AST.
//! 3. **Markup analysis** merges markup fragments into one template, rewrites
//!    imported component tags to selectors and expands `{...obj}` spreads.
//! 4. **Metadata extraction** reads `input()`, `output()` and query calls from
//!    the script's top-level declarations.
//! 5. **Host** parses the template and compiles metadata into a definition
//!    expression (see [`host::HostCompiler`]).
//! 6. **Printer** renders the output AST as JavaScript.
//! 7. **Assembly** wraps everything into the final module text.
//!
//! ## Invariants
//!
//! - A compile is a pure function of `(source, source_id, options)` given the
//!   same host.
//! - Only host failures abort a compile; everything else is reported as a
//!   warning on [`CompileResult`].
//! - The exposed-name list is exactly the script's top-level bindings, in
//!   declaration order.

#[cfg(feature = "napi")]
use napi_derive::napi;

pub mod assemble;
pub mod batch;
pub mod cache;
pub mod casing;
pub mod compile;
pub mod error;
pub mod host;
pub mod lexer;
pub mod markup;
pub mod metadata;
pub mod output_ast;
pub mod parser;
pub mod printer;
pub mod script;
pub mod token;

#[cfg(test)]
mod pipeline_tests;
#[cfg(test)]
mod printer_tests;

pub use batch::{compile_all, discover_documents, BatchOutcome, BatchSummary};
pub use cache::IncrementalCache;
pub use compile::{compile_document, compile_file, CompileOptions, CompileResult};
pub use error::{CompileError, HostError, PrintError};
pub use host::{HostCompiler, HostHandle, PartialDeclarationHost};
pub use lexer::{tokenize, LexDiagnostic, Lexer};
pub use parser::{parse, Ast, AstNode, NodeKind};
pub use printer::Printer;
pub use token::{Token, TokenKind};

#[cfg(feature = "napi")]
pub use compile::compile_treaty_native;

/// Compile every document under `root` and return a JSON summary.
#[cfg(feature = "napi")]
#[napi]
pub fn compile_directory_native(
    root: String,
    options_json: Option<String>,
) -> napi::Result<serde_json::Value> {
    let options = CompileOptions::from_json(options_json.as_deref().unwrap_or_default())
        .map_err(|e| napi::Error::from_reason(e.to_string()))?;
    let host = options.host_handle();
    let paths = discover_documents(std::path::Path::new(&root), &options.extension);
    let outcomes = compile_all(&paths, &host, &options);
    serde_json::to_value(BatchSummary::from_outcomes(&outcomes))
        .map_err(|e| napi::Error::from_reason(e.to_string()))
}
