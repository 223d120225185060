//! Host compiler boundary.
//!
//! The host framework owns template parsing and the metadata-to-definition
//! compile. This module fixes that boundary as the [`HostCompiler`] trait and
//! ships one implementation, [`PartialDeclarationHost`], which validates the
//! template with `html5ever` and emits a partial component declaration.
//!
//! The host is reached through a [`HostHandle`]: the caller creates it, it
//! builds its host at most once on first use, and it can be shared by
//! reference across threads.

use html5ever::parse_document;
use html5ever::tendril::TendrilSink;
use markup5ever_rcdom::{Handle, NodeData, RcDom};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use tracing::debug;

use crate::casing::{to_hyphen_case, SelectorVariants};
use crate::error::HostError;
use crate::metadata::{ComponentMetadata, QueryBinding};
use crate::output_ast::*;

// ═══════════════════════════════════════════════════════════════════════════════
// TEMPLATE AST
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateAttribute {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum TemplateNode {
    Element {
        tag: String,
        attributes: Vec<TemplateAttribute>,
        children: Vec<TemplateNode>,
    },
    Text {
        value: String,
    },
    Interpolation {
        expression: String,
    },
}

/// A parsed template, as the host sees it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateAst {
    pub source_id: String,
    /// The template text the nodes were parsed from.
    pub source: String,
    pub nodes: Vec<TemplateNode>,
}

// ═══════════════════════════════════════════════════════════════════════════════
// CONSTANT POOL
// ═══════════════════════════════════════════════════════════════════════════════

/// Hoisted module-level constants produced while compiling a definition.
#[derive(Debug, Clone, Default)]
pub struct ConstantPool {
    statements: Vec<Statement>,
    next_index: usize,
    literals: HashMap<String, String>,
}

impl ConstantPool {
    /// Pool whose names continue after `start_index` already-used `_c{n}` names.
    pub fn starting_at(start_index: usize) -> Self {
        ConstantPool {
            next_index: start_index,
            ..Default::default()
        }
    }

    pub fn unique_name(&mut self) -> String {
        let name = format!("_c{}", self.next_index);
        self.next_index += 1;
        name
    }

    /// Hoist `literal` into a `const` and return a reference to it. Equal
    /// literals share one constant.
    pub fn get_const_literal(&mut self, literal: Expression) -> Expression {
        let key = serde_json::to_string(&literal).ok();
        if let Some(name) = key.as_ref().and_then(|k| self.literals.get(k)) {
            return variable(name.clone());
        }
        let name = self.unique_name();
        self.statements.push(literal.to_declare_const(name.clone()));
        if let Some(key) = key {
            self.literals.insert(key, name.clone());
        }
        variable(name)
    }

    pub fn statements(&self) -> &[Statement] {
        &self.statements
    }

    pub fn into_statements(self) -> Vec<Statement> {
        self.statements
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// HOST TRAIT AND HANDLE
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq)]
pub struct CompiledDefinition {
    /// The component definition call, e.g. `i0.ɵɵngDeclareComponent({...})`.
    pub expression: Expression,
    /// Extra statements the host wants emitted at module level.
    pub statements: Vec<Statement>,
}

pub trait HostCompiler: Send + Sync {
    fn parse_template(&self, text: &str, source_id: &str) -> Result<TemplateAst, HostError>;

    fn compile_component_from_metadata(
        &self,
        metadata: &ComponentMetadata,
        pool: &mut ConstantPool,
    ) -> Result<CompiledDefinition, HostError>;
}

type HostFactory = Box<dyn Fn() -> Result<Box<dyn HostCompiler>, HostError> + Send + Sync>;

pub struct HostHandle {
    factory: HostFactory,
    host: OnceCell<Box<dyn HostCompiler>>,
}

impl HostHandle {
    pub fn new<F>(factory: F) -> Self
    where
        F: Fn() -> Result<Box<dyn HostCompiler>, HostError> + Send + Sync + 'static,
    {
        HostHandle {
            factory: Box::new(factory),
            host: OnceCell::new(),
        }
    }

    /// Handle around an already-built host.
    pub fn from_host<H: HostCompiler + 'static>(host: H) -> Self {
        HostHandle {
            factory: Box::new(|| -> Result<Box<dyn HostCompiler>, HostError> {
                Err(HostError::Init("host was supplied prebuilt".into()))
            }),
            host: OnceCell::with_value(Box::new(host)),
        }
    }

    pub fn with_default() -> Self {
        Self::partial_declaration("@angular/core", "17.0.0")
    }

    pub fn partial_declaration(runtime_module: &str, version: &str) -> Self {
        let runtime_module = runtime_module.to_string();
        let version = version.to_string();
        HostHandle::new(move || {
            Ok(Box::new(PartialDeclarationHost::new(&runtime_module, &version)) as Box<dyn HostCompiler>)
        })
    }

    pub fn get(&self) -> Result<&dyn HostCompiler, HostError> {
        let host = self.host.get_or_try_init(|| {
            debug!("initialising host compiler");
            (self.factory)()
        })?;
        Ok(host.as_ref())
    }

    pub fn is_initialized(&self) -> bool {
        self.host.get().is_some()
    }
}

impl fmt::Debug for HostHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostHandle")
            .field("initialized", &self.is_initialized())
            .finish()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// PARTIAL DECLARATION HOST
// ═══════════════════════════════════════════════════════════════════════════════

/// Emits `ɵɵngDeclareComponent` partial declarations.
#[derive(Debug, Clone)]
pub struct PartialDeclarationHost {
    runtime_module: String,
    version: String,
}

impl Default for PartialDeclarationHost {
    fn default() -> Self {
        PartialDeclarationHost::new("@angular/core", "17.0.0")
    }
}

impl PartialDeclarationHost {
    pub fn new(runtime_module: &str, version: &str) -> Self {
        PartialDeclarationHost {
            runtime_module: runtime_module.to_string(),
            version: version.to_string(),
        }
    }

    fn runtime(&self, name: &str) -> Expression {
        import_expr(Some(&self.runtime_module), Some(name))
    }

    fn inputs(metadata: &ComponentMetadata) -> Expression {
        literal_map(
            metadata
                .inputs
                .iter()
                .map(|input| {
                    let transform = match &input.transform {
                        Some(transform) => Expression::WrappedNode(WrappedNodeExpr {
                            node: transform.clone(),
                        }),
                        None => null_expr(),
                    };
                    (
                        input.property_name.clone(),
                        literal_map(vec![
                            ("classPropertyName", literal_str(&input.property_name)),
                            ("publicName", literal_str(&input.property_name)),
                            ("isSignal", literal_bool(input.is_signal)),
                            ("isRequired", literal_bool(input.required)),
                            ("transformFunction", transform),
                        ]),
                    )
                })
                .collect(),
        )
    }

    fn outputs(metadata: &ComponentMetadata) -> Expression {
        literal_map(
            metadata
                .outputs
                .iter()
                .map(|o| (o.property_name.clone(), literal_str(o.public_name())))
                .collect(),
        )
    }

    /// Partial declarations list dependencies as `{kind, type, selector}`
    /// records; the linker rejects bare types.
    fn dependencies(metadata: &ComponentMetadata) -> Expression {
        literal_arr(
            metadata
                .dependencies
                .iter()
                .map(|name| {
                    let selector = SelectorVariants::from_name(&to_hyphen_case(name)).selector();
                    literal_map(vec![
                        ("kind", literal_str("component")),
                        ("type", variable(name)),
                        ("selector", literal_str(selector)),
                    ])
                })
                .collect(),
        )
    }

    fn query(query: &QueryBinding) -> Expression {
        let mut entries = vec![("propertyName", literal_str(&query.property_name))];
        if query.first {
            entries.push(("first", literal_bool(true)));
        }
        entries.push(("predicate", variable(&query.constant_name)));
        if query.descendants {
            entries.push(("descendants", literal_bool(true)));
        }
        if query.is_static {
            entries.push(("static", literal_bool(true)));
        }
        if !query.emit_distinct_changes_only {
            entries.push(("emitDistinctChangesOnly", literal_bool(false)));
        }
        entries.push(("isSignal", literal_bool(true)));
        literal_map(entries)
    }
}

impl HostCompiler for PartialDeclarationHost {
    fn parse_template(&self, text: &str, source_id: &str) -> Result<TemplateAst, HostError> {
        let dom = parse_document(RcDom::default(), Default::default())
            .from_utf8()
            .read_from(&mut text.as_bytes())
            .map_err(|e| HostError::Template {
                source_id: source_id.to_string(),
                message: format!("failed to parse HTML: {}", e),
            })?;

        let mut nodes = Vec::new();
        collect_body_content(&dom.document, &mut nodes);

        check_block_balance(&nodes).map_err(|message| HostError::Template {
            source_id: source_id.to_string(),
            message,
        })?;

        Ok(TemplateAst {
            source_id: source_id.to_string(),
            source: text.to_string(),
            nodes,
        })
    }

    fn compile_component_from_metadata(
        &self,
        metadata: &ComponentMetadata,
        pool: &mut ConstantPool,
    ) -> Result<CompiledDefinition, HostError> {
        if !is_valid_identifier(&metadata.name) {
            return Err(HostError::Metadata(format!(
                "`{}` is not a valid component class name",
                metadata.name
            )));
        }

        // Signal inputs and signal queries both need the 17.1 linker.
        let uses_signals =
            metadata.inputs.iter().any(|i| i.is_signal) || !metadata.queries.is_empty();
        let min_version = if uses_signals { "17.1.0" } else { "14.0.0" };

        let mut entries: Vec<(&str, Expression)> = vec![
            ("minVersion", literal_str(min_version)),
            ("version", literal_str(&self.version)),
            ("type", variable(&metadata.name)),
            ("isStandalone", literal_bool(true)),
            ("selector", literal_str(&metadata.selector)),
        ];
        if !metadata.inputs.is_empty() {
            entries.push(("inputs", Self::inputs(metadata)));
        }
        if !metadata.outputs.is_empty() {
            entries.push(("outputs", Self::outputs(metadata)));
        }

        let content: Vec<Expression> = metadata
            .queries
            .iter()
            .filter(|q| !q.is_view_query)
            .map(Self::query)
            .collect();
        if !content.is_empty() {
            entries.push(("queries", literal_arr(content)));
        }
        let view: Vec<Expression> = metadata
            .queries
            .iter()
            .filter(|q| q.is_view_query)
            .map(Self::query)
            .collect();
        if !view.is_empty() {
            entries.push(("viewQueries", literal_arr(view)));
        }

        entries.push(("ngImport", import_expr(Some(&self.runtime_module), None)));
        entries.push(("template", literal_str(&metadata.template.source)));
        entries.push(("isInline", literal_bool(true)));
        if !metadata.styles.is_empty() {
            let styles = literal_arr(metadata.styles.iter().map(literal_str).collect());
            entries.push(("styles", pool.get_const_literal(styles)));
        }
        if !metadata.dependencies.is_empty() {
            entries.push(("dependencies", Self::dependencies(metadata)));
        }

        let expression = self
            .runtime("ɵɵngDeclareComponent")
            .call_fn(vec![literal_map(entries)]);
        Ok(CompiledDefinition {
            expression,
            statements: Vec::new(),
        })
    }
}

fn is_valid_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_alphabetic() || c == '_' || c == '$')
        && chars.all(|c| c.is_alphanumeric() || c == '_' || c == '$')
}

// ═══════════════════════════════════════════════════════════════════════════════
// DOM WALK
// ═══════════════════════════════════════════════════════════════════════════════

/// Flatten the `html`/`head`/`body` wrappers html5ever adds around fragments.
fn collect_body_content(handle: &Handle, nodes: &mut Vec<TemplateNode>) {
    match &handle.data {
        NodeData::Document => {
            for child in handle.children.borrow().iter() {
                collect_body_content(child, nodes);
            }
        }
        NodeData::Element { name, .. } => {
            let tag = name.local.to_string();
            if tag == "html" || tag == "head" || tag == "body" {
                for child in handle.children.borrow().iter() {
                    collect_body_content(child, nodes);
                }
            } else {
                nodes.extend(convert_node(handle));
            }
        }
        NodeData::Text { .. } => nodes.extend(convert_node(handle)),
        _ => {}
    }
}

fn convert_node(handle: &Handle) -> Vec<TemplateNode> {
    match &handle.data {
        NodeData::Element { name, attrs, .. } => {
            let attributes = attrs
                .borrow()
                .iter()
                .map(|attr| TemplateAttribute {
                    name: attr.name.local.to_string(),
                    value: attr.value.to_string(),
                })
                .collect();
            let mut children = Vec::new();
            for child in handle.children.borrow().iter() {
                children.extend(convert_node(child));
            }
            vec![TemplateNode::Element {
                tag: name.local.to_string(),
                attributes,
                children,
            }]
        }
        NodeData::Text { contents } => split_interpolations(&contents.borrow()),
        NodeData::Document
        | NodeData::Doctype { .. }
        | NodeData::Comment { .. }
        | NodeData::ProcessingInstruction { .. } => vec![],
    }
}

/// Split text into literal runs and `{{ }}` interpolations.
fn split_interpolations(text: &str) -> Vec<TemplateNode> {
    let mut nodes = Vec::new();
    let mut rest = text;
    while let Some(open) = rest.find("{{") {
        let Some(close) = rest[open + 2..].find("}}") else {
            break;
        };
        push_text(&mut nodes, &rest[..open]);
        nodes.push(TemplateNode::Interpolation {
            expression: rest[open + 2..open + 2 + close].trim().to_string(),
        });
        rest = &rest[open + 2 + close + 2..];
    }
    push_text(&mut nodes, rest);
    nodes
}

fn push_text(nodes: &mut Vec<TemplateNode>, text: &str) {
    if !text.trim().is_empty() {
        nodes.push(TemplateNode::Text {
            value: text.to_string(),
        });
    }
}

/// Directive blocks (`@if (..) {` ... `}`) live in text; their braces must
/// balance across the whole template.
fn check_block_balance(nodes: &[TemplateNode]) -> Result<(), String> {
    fn walk(nodes: &[TemplateNode], depth: &mut i64) -> Result<(), String> {
        for node in nodes {
            match node {
                TemplateNode::Text { value } => {
                    for ch in value.chars() {
                        match ch {
                            '{' => *depth += 1,
                            '}' => {
                                *depth -= 1;
                                if *depth < 0 {
                                    return Err("unexpected '}' closes no block".to_string());
                                }
                            }
                            _ => {}
                        }
                    }
                }
                TemplateNode::Element { children, .. } => walk(children, depth)?,
                TemplateNode::Interpolation { .. } => {}
            }
        }
        Ok(())
    }

    let mut depth = 0;
    walk(nodes, &mut depth)?;
    if depth > 0 {
        return Err(format!("{} block(s) are never closed", depth));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{extract, ExtractedMetadata};
    use crate::printer::Printer;
    use crate::script::ScriptModule;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn metadata_for(script: &str, template: TemplateAst) -> ComponentMetadata {
        let extracted: ExtractedMetadata = extract(&ScriptModule::analyze(script).declarations);
        ComponentMetadata::new(
            "myPost",
            &SelectorVariants::from_name("my-post"),
            &extracted,
            vec!["h1 {color: red;}".to_string()],
            Vec::new(),
            template,
        )
    }

    #[test]
    fn test_parse_template_flattens_wrappers() {
        let host = PartialDeclarationHost::default();
        let ast = host
            .parse_template("<h1 class=\"t\">Hi {{ name }}!</h1>", "a.treaty")
            .unwrap();
        assert_eq!(
            ast.nodes,
            vec![TemplateNode::Element {
                tag: "h1".into(),
                attributes: vec![TemplateAttribute {
                    name: "class".into(),
                    value: "t".into(),
                }],
                children: vec![
                    TemplateNode::Text { value: "Hi ".into() },
                    TemplateNode::Interpolation {
                        expression: "name".into(),
                    },
                    TemplateNode::Text { value: "!".into() },
                ],
            }]
        );
    }

    #[test]
    fn test_parse_template_rejects_unbalanced_blocks() {
        let host = PartialDeclarationHost::default();
        assert!(host
            .parse_template("@if (a) {<p>x</p>} @else {<p>y</p>}", "ok.treaty")
            .is_ok());
        let err = host
            .parse_template("@if (a) {<p>x</p>", "bad.treaty")
            .unwrap_err();
        assert!(matches!(err, HostError::Template { ref source_id, .. } if source_id == "bad.treaty"));
    }

    #[test]
    fn test_partial_declaration_shape() {
        let host = PartialDeclarationHost::default();
        let template = host.parse_template("<p>{{ greeting() }}</p>", "my-post.treaty").unwrap();
        let metadata = metadata_for(
            "const greeting = input();\nconst save = output();\nconst box = viewChild('box');\n",
            template,
        );
        let mut pool = ConstantPool::starting_at(1);
        let compiled = host.compile_component_from_metadata(&metadata, &mut pool).unwrap();

        let mut printer = Printer::default();
        let text = printer.print_expression(&compiled.expression).unwrap();
        assert!(text.starts_with("i0.ɵɵngDeclareComponent({minVersion: '17.1.0', version: '17.0.0', type: myPost"));
        assert!(text.contains("selector: 'my-post, myPost, MyPost'"));
        assert!(text.contains("inputs: {greeting: {classPropertyName: 'greeting', publicName: 'greeting', isSignal: true, isRequired: false, transformFunction: null}}"));
        assert!(text.contains("outputs: {save: 'save'}"));
        assert!(text.contains("viewQueries: [{propertyName: 'box', first: true, predicate: _c0, descendants: true, isSignal: true}]"));
        assert!(text.contains("ngImport: i0"));
        assert!(text.contains("styles: _c1"));

        let pooled = printer.print_statements(pool.statements()).unwrap();
        assert_eq!(pooled, "const _c1 = ['h1 {color: red;}'];");
    }

    #[test]
    fn test_dependencies_use_declaration_records() {
        let host = PartialDeclarationHost::default();
        let mut metadata = metadata_for("", TemplateAst::default());
        metadata.dependencies = vec!["MyWidget".into()];
        let compiled = host
            .compile_component_from_metadata(&metadata, &mut ConstantPool::default())
            .unwrap();
        let text = Printer::default().print_expression(&compiled.expression).unwrap();
        assert!(text.contains(
            "dependencies: [{kind: 'component', type: MyWidget, selector: 'my-widget, myWidget, MyWidget'}]"
        ));
        assert!(text.starts_with("i0.ɵɵngDeclareComponent({minVersion: '14.0.0'"));
    }

    #[test]
    fn test_signal_queries_raise_min_version() {
        let host = PartialDeclarationHost::default();
        let metadata = metadata_for("const box = viewChild('box');\n", TemplateAst::default());
        let compiled = host
            .compile_component_from_metadata(&metadata, &mut ConstantPool::default())
            .unwrap();
        let text = Printer::default().print_expression(&compiled.expression).unwrap();
        assert!(text.starts_with("i0.ɵɵngDeclareComponent({minVersion: '17.1.0'"));
    }

    #[test]
    fn test_invalid_name_is_metadata_error() {
        let host = PartialDeclarationHost::default();
        let mut metadata = metadata_for("", TemplateAst::default());
        metadata.name = "my-post".into();
        let err = host
            .compile_component_from_metadata(&metadata, &mut ConstantPool::default())
            .unwrap_err();
        assert!(matches!(err, HostError::Metadata(_)));
    }

    #[test]
    fn test_constant_pool_dedupes_literals() {
        let mut pool = ConstantPool::starting_at(2);
        let a = pool.get_const_literal(literal_arr(vec![literal_str("x")]));
        let b = pool.get_const_literal(literal_arr(vec![literal_str("x")]));
        let c = pool.get_const_literal(literal_arr(vec![literal_str("y")]));
        assert_eq!(a, variable("_c2"));
        assert_eq!(b, variable("_c2"));
        assert_eq!(c, variable("_c3"));
        assert_eq!(pool.into_statements().len(), 2);
    }

    #[test]
    fn test_handle_initialises_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let handle = HostHandle::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(PartialDeclarationHost::default()) as Box<dyn HostCompiler>)
        });
        assert!(!handle.is_initialized());
        handle.get().unwrap();
        handle.get().unwrap();
        assert!(handle.is_initialized());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_failed_init_is_reported() {
        let handle = HostHandle::new(|| Err(HostError::Init("no runtime".into())));
        assert!(matches!(handle.get(), Err(HostError::Init(_))));
        assert!(!handle.is_initialized());
    }
}
