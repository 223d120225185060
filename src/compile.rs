//! Document compile pipeline.
//!
//! Lexer → Parser → {markup analysis, metadata extraction} → host (template
//! parse, metadata compile) → Printer → module assembly.
//!
//! Each compile is pure over its input apart from the host handle, which is
//! shared by reference and initialises its host once.

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, instrument, warn};

use crate::assemble::{assemble, ModuleParts};
use crate::casing::{to_camel_case, SelectorVariants};
use crate::error::CompileError;
use crate::host::{ConstantPool, HostHandle};
use crate::lexer::Lexer;
use crate::markup;
use crate::metadata::{self, ComponentMetadata};
use crate::output_ast::{literal_arr, variable, Expression, LiteralMapEntry};
use crate::parser::{parse, NodeKind};
use crate::printer::Printer;
use crate::script::ScriptModule;

#[cfg(feature = "napi")]
use napi_derive::napi;

// ═══════════════════════════════════════════════════════════════════════════════
// OPTIONS AND RESULT
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CompileOptions {
    /// Module the runtime namespace import points at.
    pub runtime_module: String,
    pub runtime_alias: String,
    /// Version stamped into partial declarations.
    pub angular_version: String,
    /// Document file extension, without the dot.
    pub extension: String,
    pub cache_dir: Option<String>,
}

impl Default for CompileOptions {
    fn default() -> Self {
        CompileOptions {
            runtime_module: "@angular/core".to_string(),
            runtime_alias: "i0".to_string(),
            angular_version: "17.0.0".to_string(),
            extension: "treaty".to_string(),
            cache_dir: None,
        }
    }
}

impl CompileOptions {
    /// Parse camelCase JSON; missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, CompileError> {
        if json.trim().is_empty() {
            return Ok(CompileOptions::default());
        }
        Ok(serde_json::from_str(json)?)
    }

    /// Host handle matching these options.
    pub fn host_handle(&self) -> HostHandle {
        HostHandle::partial_declaration(&self.runtime_module, &self.angular_version)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompileResult {
    pub code: String,
    pub component_name: String,
    /// Imported components used as tags.
    pub dependencies: Vec<String>,
    /// Non-fatal degradations: lexer diagnostics, unresolved spreads,
    /// skipped metadata.
    pub warnings: Vec<String>,
}

// ═══════════════════════════════════════════════════════════════════════════════
// PIPELINE
// ═══════════════════════════════════════════════════════════════════════════════

/// Base name of a document id: directories, query suffix and extension removed.
pub fn document_stem<'a>(source_id: &'a str, extension: &str) -> &'a str {
    let path = source_id.split('?').next().unwrap_or(source_id);
    let file_name = Path::new(path)
        .file_name()
        .and_then(|f| f.to_str())
        .unwrap_or(path);
    let suffix = format!(".{}", extension);
    let stem = file_name.strip_suffix(suffix.as_str()).unwrap_or_else(|| {
        Path::new(file_name)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(file_name)
    });
    if stem.is_empty() {
        "component"
    } else {
        stem
    }
}

/// Compile one document into a component module.
#[instrument(level = "debug", skip(source, host, options), fields(len = source.len()))]
pub fn compile_document(
    source: &str,
    source_id: &str,
    host: &HostHandle,
    options: &CompileOptions,
) -> Result<CompileResult, CompileError> {
    let mut warnings: Vec<String> = Vec::new();

    // 1. Segment
    let lexed = Lexer::new(source).tokenize();
    warnings.extend(lexed.diagnostics.iter().map(|d| d.to_string()));
    let ast = parse(lexed.tokens);
    debug!(nodes = ast.nodes.len(), "document segmented");

    // 2. Inspect script and markup
    let script = ScriptModule::analyze(&ast.script_text());
    if !script.parsed {
        warn!(source_id, "script did not parse; names discovered lexically");
        warnings.push("script did not parse; top-level names were discovered lexically".to_string());
    }
    let markup = markup::analyze(&ast, source, &script);
    warnings.extend(markup.warnings.iter().cloned());
    let extracted = metadata::extract(&script.declarations);
    warnings.extend(extracted.warnings.iter().cloned());

    let styles: Vec<String> = ast
        .of_kind(NodeKind::Style)
        .map(|node| node.value.replace(|c: char| matches!(c, '\n' | '\r' | '\t'), ""))
        .collect();

    // 3. Host compile
    let stem = document_stem(source_id, &options.extension);
    let component_name = to_camel_case(stem);
    let selector = SelectorVariants::from_name(stem);

    let host_compiler = host.get().map_err(|e| CompileError::host(source_id, e))?;
    let template = host_compiler
        .parse_template(&markup.template, source_id)
        .map_err(|e| CompileError::host(source_id, e))?;
    let component = ComponentMetadata::new(
        component_name.clone(),
        &selector,
        &extracted,
        styles,
        markup.dependencies.clone(),
        template,
    );
    let mut pool = ConstantPool::starting_at(extracted.queries.len());
    let mut definition = host_compiler
        .compile_component_from_metadata(&component, &mut pool)
        .map_err(|e| CompileError::host(source_id, e))?;
    append_dependencies(&mut definition.expression, &markup.dependencies);

    // 4. Print and assemble
    let mut printer = Printer::new(options.runtime_alias.as_str());
    let definition_text = printer.print_expression(&definition.expression)?;
    let mut hoisted = pool.into_statements();
    hoisted.extend(definition.statements);
    let pool_text = printer.print_statements(&hoisted)?;

    let code = assemble(&ModuleParts {
        imports: &script.import_statements,
        runtime_module: &options.runtime_module,
        runtime_alias: &options.runtime_alias,
        query_constants: &extracted.query_constants(),
        pool_statements: &pool_text,
        component_name: &component_name,
        body: &script.body,
        exposed_names: &script.top_level_names,
        definition: &definition_text,
    });

    debug!(
        component = %component_name,
        dependencies = markup.dependencies.len(),
        warnings = warnings.len(),
        "document compiled"
    );

    Ok(CompileResult {
        code,
        component_name,
        dependencies: markup.dependencies,
        warnings,
    })
}

/// Add `dependencies: [A, B]` to the definition call's config map unless the
/// host already provided it. Bare types suit full `ɵɵdefineComponent`
/// definitions; partial-declaration hosts emit their own record list.
pub fn append_dependencies(definition: &mut Expression, dependencies: &[String]) {
    let Expression::InvokeFunction(call) = definition else {
        debug!("definition is not a call; dependencies not appended");
        return;
    };
    let Some(Expression::LiteralMap(config)) = call.args.first_mut() else {
        debug!("definition has no config map; dependencies not appended");
        return;
    };
    if config.has_key("dependencies") {
        return;
    }
    config.entries.push(LiteralMapEntry {
        key: "dependencies".to_string(),
        value: literal_arr(dependencies.iter().map(variable).collect()),
        quoted: false,
    });
}

/// Read and compile a document from disk.
pub fn compile_file(
    path: &Path,
    host: &HostHandle,
    options: &CompileOptions,
) -> Result<CompileResult, CompileError> {
    let source = std::fs::read_to_string(path).map_err(|source| CompileError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let source_id = path.to_string_lossy();
    compile_document(&source, &source_id, host, options)
}

// ═══════════════════════════════════════════════════════════════════════════════
// NAPI EXPORTS
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(feature = "napi")]
#[napi]
pub fn compile_treaty_native(
    source: String,
    source_id: String,
    options_json: Option<String>,
) -> napi::Result<serde_json::Value> {
    let options = CompileOptions::from_json(options_json.as_deref().unwrap_or_default())
        .map_err(|e| napi::Error::from_reason(e.to_string()))?;
    let host = options.host_handle();
    let result = compile_document(&source, &source_id, &host, &options)
        .map_err(|e| napi::Error::from_reason(e.to_string()))?;
    serde_json::to_value(result).map_err(|e| napi::Error::from_reason(e.to_string()))
}
