//! Script inspection.
//!
//! One pass over the document's script text feeds every later stage: the import
//! list, the import-free body, the names the body exposes to the template, the
//! factory-call declarations that carry component metadata, and the key sets
//! used to expand `{...spread}` placeholders.
//!
//! ## Ground truth
//!
//! The `oxc` syntax tree is authoritative. Only when the script fails to parse
//! does the regex fallback run. The fallback's name shapes are purely lexical
//! and can over-collect names declared inside nested scopes.

use lazy_static::lazy_static;
use oxc_allocator::Allocator;
use oxc_ast::ast::{
    Argument, BindingPattern, Declaration, Expression, Function, ImportDeclarationSpecifier,
    ObjectExpression, ObjectPropertyKind, PropertyKey, Statement, VariableDeclaration,
};
use oxc_parser::Parser;
use oxc_span::{GetSpan, SourceType};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

lazy_static! {
    static ref IMPORT_RE: Regex = Regex::new(
        r#"(?m)^[ \t]*import\s+(type\s+)?(?:([\w$*{},\s]+?)\s+from\s+)?['"]([^'"]+)['"][ \t]*;?"#
    )
    .unwrap();
    static ref LET_RE: Regex = Regex::new(r"\blet\s+([A-Za-z_$][\w$]*)").unwrap();
    static ref CONST_RE: Regex = Regex::new(r"\bconst\s+([A-Za-z_$][\w$]*)").unwrap();
    static ref VAR_RE: Regex = Regex::new(r"\bvar\s+([A-Za-z_$][\w$]*)").unwrap();
    static ref FUNCTION_RE: Regex = Regex::new(r"\bfunction\s+([A-Za-z_$][\w$]*)").unwrap();
    static ref ARROW_RE: Regex =
        Regex::new(r"\bconst\s+([A-Za-z_$][\w$]*)\s*=\s*(?:async\s*)?\([^)]*\)\s*=>").unwrap();
    static ref FACTORY_DECL_RE: Regex = Regex::new(
        r"(?m)^[ \t]*(?:export\s+)?(?:const|let|var)\s+([A-Za-z_$][\w$]*)\s*(?::[^=\n]+)?=\s*([A-Za-z_$][\w$]*(?:\.[A-Za-z_$][\w$]*)?)\s*(?:<[^>\n]*>)?\s*\("
    )
    .unwrap();
    static ref EXPORT_PREFIX_RE: Regex = Regex::new(r"(?m)^([ \t]*)export\s+(?:default\s+)?").unwrap();
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportBinding {
    pub local_name: String,
    pub source_path: String,
    /// `import type { X }` or `import { type X }`.
    pub is_type_only: bool,
}

/// A top-level `name = callee(firstArg, ...)` declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeclaredCall {
    pub name: String,
    /// `input`, `input.required`, `viewChild`, ...
    pub callee: String,
    /// Verbatim source of the first argument.
    pub first_argument: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScriptModule {
    pub imports: Vec<ImportBinding>,
    /// Module-level statements hoisted out of the body, verbatim.
    pub import_statements: Vec<String>,
    /// Script with imports removed and `export` prefixes stripped.
    pub body: String,
    pub top_level_names: Vec<String>,
    pub declarations: Vec<DeclaredCall>,
    /// Known object key sets by binding name, for spread expansion.
    pub shapes: HashMap<String, Vec<String>>,
    /// False when the regex fallback produced this module.
    pub parsed: bool,
}

impl ScriptModule {
    pub fn analyze(script: &str) -> Self {
        let allocator = Allocator::default();
        let source_type = SourceType::default()
            .with_module(true)
            .with_typescript(true);
        let ret = Parser::new(&allocator, script, source_type).parse();

        if !ret.errors.is_empty() || ret.panicked {
            debug!(
                errors = ret.errors.len(),
                "script did not parse, using lexical fallback"
            );
            return Self::analyze_lexically(script);
        }

        let mut module = ScriptModule {
            parsed: true,
            ..Default::default()
        };
        let mut cuts: Vec<(u32, u32)> = Vec::new();
        let mut factories: HashMap<String, Vec<String>> = HashMap::new();
        let mut pending_calls: Vec<(String, String)> = Vec::new();

        for stmt in &ret.program.body {
            match stmt {
                Statement::ImportDeclaration(import_decl) => {
                    let span = import_decl.span;
                    module.import_statements.push(slice(script, span.start, span.end));
                    cuts.push((span.start, span.end));
                    let source_path = import_decl.source.value.to_string();
                    let declaration_is_type = import_decl.import_kind.is_type();
                    if let Some(specifiers) = &import_decl.specifiers {
                        for specifier in specifiers {
                            let (local, is_type_only) = match specifier {
                                ImportDeclarationSpecifier::ImportSpecifier(s) => {
                                    (&s.local, declaration_is_type || s.import_kind.is_type())
                                }
                                ImportDeclarationSpecifier::ImportDefaultSpecifier(s) => {
                                    (&s.local, declaration_is_type)
                                }
                                ImportDeclarationSpecifier::ImportNamespaceSpecifier(s) => {
                                    (&s.local, declaration_is_type)
                                }
                            };
                            module.imports.push(ImportBinding {
                                local_name: local.name.to_string(),
                                source_path: source_path.clone(),
                                is_type_only,
                            });
                        }
                    }
                }
                Statement::ExportAllDeclaration(export) => {
                    module
                        .import_statements
                        .push(slice(script, export.span.start, export.span.end));
                    cuts.push((export.span.start, export.span.end));
                }
                Statement::ExportNamedDeclaration(export) => match &export.declaration {
                    Some(declaration) => {
                        cuts.push((export.span.start, declaration.span().start));
                        module.collect_declaration(
                            declaration,
                            script,
                            &mut factories,
                            &mut pending_calls,
                        );
                    }
                    None => {
                        if export.source.is_some() {
                            module
                                .import_statements
                                .push(slice(script, export.span.start, export.span.end));
                        }
                        cuts.push((export.span.start, export.span.end));
                    }
                },
                Statement::ExportDefaultDeclaration(export) => {
                    cuts.push((export.span.start, export.declaration.span().start));
                }
                Statement::VariableDeclaration(var_decl) => {
                    module.collect_variables(var_decl, script, &mut factories, &mut pending_calls);
                }
                Statement::FunctionDeclaration(func) => {
                    module.collect_function(func, &mut factories);
                }
                Statement::ClassDeclaration(class) => {
                    if let Some(id) = &class.id {
                        module.push_name(id.name.as_str());
                    }
                }
                _ => {}
            }
        }

        // Factories may be declared after the bindings that call them.
        for (binding, factory) in pending_calls {
            if let Some(keys) = factories.get(&factory) {
                module.shapes.entry(binding).or_insert_with(|| keys.clone());
            }
        }
        for (name, keys) in factories {
            module.shapes.entry(name).or_insert(keys);
        }

        module.body = remove_ranges(script, cuts);
        module
    }

    fn collect_declaration(
        &mut self,
        declaration: &Declaration,
        script: &str,
        factories: &mut HashMap<String, Vec<String>>,
        pending_calls: &mut Vec<(String, String)>,
    ) {
        match declaration {
            Declaration::VariableDeclaration(var_decl) => {
                self.collect_variables(var_decl, script, factories, pending_calls)
            }
            Declaration::FunctionDeclaration(func) => self.collect_function(func, factories),
            Declaration::ClassDeclaration(class) => {
                if let Some(id) = &class.id {
                    self.push_name(id.name.as_str());
                }
            }
            _ => {}
        }
    }

    fn collect_variables(
        &mut self,
        var_decl: &VariableDeclaration,
        script: &str,
        factories: &mut HashMap<String, Vec<String>>,
        pending_calls: &mut Vec<(String, String)>,
    ) {
        for decl in &var_decl.declarations {
            let mut names = Vec::new();
            collect_binding_pattern(&decl.id, &mut names);
            for name in &names {
                self.push_name(name);
            }

            let (BindingPattern::BindingIdentifier(id), Some(init)) = (&decl.id, &decl.init) else {
                continue;
            };
            let name = id.name.to_string();
            match unwrap_expression(init) {
                Expression::ObjectExpression(obj) => {
                    self.shapes.insert(name, object_keys(obj));
                }
                Expression::CallExpression(call) => {
                    if let Some(callee) = callee_path(&call.callee) {
                        if !callee.contains('.') {
                            pending_calls.push((name.clone(), callee.clone()));
                        }
                        let first_argument = call
                            .arguments
                            .first()
                            .map(|arg| argument_text(arg, script));
                        self.declarations.push(DeclaredCall {
                            name,
                            callee,
                            first_argument,
                        });
                    }
                }
                Expression::ArrowFunctionExpression(arrow) => {
                    let returned = if arrow.expression {
                        match arrow.body.statements.first() {
                            Some(Statement::ExpressionStatement(expr_stmt)) => {
                                returned_object_keys_of_expr(&expr_stmt.expression)
                            }
                            _ => None,
                        }
                    } else {
                        returned_object_keys(&arrow.body.statements)
                    };
                    if let Some(keys) = returned {
                        factories.insert(name, keys);
                    }
                }
                Expression::FunctionExpression(func) => {
                    if let Some(keys) = function_returned_keys(func) {
                        factories.insert(name, keys);
                    }
                }
                _ => {}
            }
        }
    }

    fn collect_function(&mut self, func: &Function, factories: &mut HashMap<String, Vec<String>>) {
        let Some(id) = &func.id else {
            return;
        };
        self.push_name(id.name.as_str());
        if let Some(keys) = function_returned_keys(func) {
            factories.insert(id.name.to_string(), keys);
        }
    }

    fn push_name(&mut self, name: &str) {
        if !self.top_level_names.iter().any(|n| n == name) {
            self.top_level_names.push(name.to_string());
        }
    }

    /// Regex rendition used when the script is not parseable.
    pub fn analyze_lexically(script: &str) -> Self {
        let mut module = ScriptModule::default();

        for caps in IMPORT_RE.captures_iter(script) {
            let statement = caps.get(0).map(|m| m.as_str().trim()).unwrap_or_default();
            module.import_statements.push(statement.to_string());
            let is_type = caps.get(1).is_some();
            let source_path = caps.get(3).map(|m| m.as_str()).unwrap_or_default();
            if let Some(clause) = caps.get(2) {
                for (local_name, is_type_only) in parse_import_clause(clause.as_str()) {
                    module.imports.push(ImportBinding {
                        local_name,
                        source_path: source_path.to_string(),
                        is_type_only: is_type || is_type_only,
                    });
                }
            }
        }
        let without_imports = IMPORT_RE.replace_all(script, "");
        module.body = EXPORT_PREFIX_RE
            .replace_all(&without_imports, "$1")
            .trim()
            .to_string();

        let mut names: Vec<String> = Vec::new();
        for re in [&*LET_RE, &*CONST_RE, &*VAR_RE, &*FUNCTION_RE, &*ARROW_RE] {
            names.extend(
                re.captures_iter(&module.body)
                    .filter_map(|caps| caps.get(1))
                    .map(|name| name.as_str().to_string()),
            );
        }
        for name in &names {
            module.push_name(name);
        }

        for caps in FACTORY_DECL_RE.captures_iter(&module.body) {
            let (Some(name), Some(callee), Some(whole)) = (caps.get(1), caps.get(2), caps.get(0))
            else {
                continue;
            };
            module.declarations.push(DeclaredCall {
                name: name.as_str().to_string(),
                callee: callee.as_str().to_string(),
                first_argument: first_argument_after(&module.body[whole.end()..]),
            });
        }

        module
    }

    pub fn value_imports(&self) -> impl Iterator<Item = &ImportBinding> {
        self.imports.iter().filter(|i| !i.is_type_only)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// AST HELPERS
// ═══════════════════════════════════════════════════════════════════════════════

fn collect_binding_pattern(pattern: &BindingPattern, names: &mut Vec<String>) {
    match pattern {
        BindingPattern::BindingIdentifier(id) => {
            names.push(id.name.to_string());
        }
        BindingPattern::ObjectPattern(obj) => {
            for prop in &obj.properties {
                collect_binding_pattern(&prop.value, names);
            }
            if let Some(rest) = &obj.rest {
                collect_binding_pattern(&rest.argument, names);
            }
        }
        BindingPattern::ArrayPattern(arr) => {
            for pattern in arr.elements.iter().flatten() {
                collect_binding_pattern(pattern, names);
            }
            if let Some(rest) = &arr.rest {
                collect_binding_pattern(&rest.argument, names);
            }
        }
        BindingPattern::AssignmentPattern(assign) => {
            collect_binding_pattern(&assign.left, names);
        }
    }
}

/// Look through parentheses and TypeScript-only wrappers.
fn unwrap_expression<'b, 'a>(expr: &'b Expression<'a>) -> &'b Expression<'a> {
    match expr {
        Expression::ParenthesizedExpression(paren) => unwrap_expression(&paren.expression),
        Expression::TSAsExpression(as_expr) => unwrap_expression(&as_expr.expression),
        Expression::TSSatisfiesExpression(sat) => unwrap_expression(&sat.expression),
        Expression::TSNonNullExpression(non_null) => unwrap_expression(&non_null.expression),
        _ => expr,
    }
}

/// `input`, `input.required`; anything deeper is not a factory callee.
fn callee_path(callee: &Expression) -> Option<String> {
    match unwrap_expression(callee) {
        Expression::Identifier(id) => Some(id.name.to_string()),
        Expression::StaticMemberExpression(member) => match &member.object {
            Expression::Identifier(object) => {
                Some(format!("{}.{}", object.name, member.property.name))
            }
            _ => None,
        },
        _ => None,
    }
}

fn object_keys(obj: &ObjectExpression) -> Vec<String> {
    let mut keys = Vec::new();
    for prop in &obj.properties {
        let ObjectPropertyKind::ObjectProperty(p) = prop else {
            continue;
        };
        if p.computed {
            continue;
        }
        let key = match &p.key {
            PropertyKey::StaticIdentifier(id) => id.name.to_string(),
            PropertyKey::StringLiteral(s) => s.value.to_string(),
            _ => continue,
        };
        if !keys.contains(&key) {
            keys.push(key);
        }
    }
    keys
}

fn returned_object_keys_of_expr(expr: &Expression) -> Option<Vec<String>> {
    match unwrap_expression(expr) {
        Expression::ObjectExpression(obj) => Some(object_keys(obj)),
        _ => None,
    }
}

/// Keys of the first top-level `return { ... }` in a function body.
fn returned_object_keys(statements: &[Statement]) -> Option<Vec<String>> {
    statements.iter().find_map(|stmt| match stmt {
        Statement::ReturnStatement(ret) => ret.argument.as_ref().and_then(returned_object_keys_of_expr),
        _ => None,
    })
}

fn function_returned_keys(func: &Function) -> Option<Vec<String>> {
    func.body
        .as_ref()
        .and_then(|body| returned_object_keys(&body.statements))
}

fn argument_text(arg: &Argument, script: &str) -> String {
    let span = arg.span();
    slice(script, span.start, span.end)
}

fn slice(script: &str, start: u32, end: u32) -> String {
    script
        .get(start as usize..end as usize)
        .unwrap_or_default()
        .to_string()
}

fn remove_ranges(script: &str, mut cuts: Vec<(u32, u32)>) -> String {
    cuts.sort_by(|a, b| b.0.cmp(&a.0));
    let mut result = script.to_string();
    for (start, end) in cuts {
        let (start, end) = (start as usize, end as usize);
        if start <= end && end <= result.len() {
            result.replace_range(start..end, "");
        }
    }
    result.trim().to_string()
}

// ═══════════════════════════════════════════════════════════════════════════════
// LEXICAL FALLBACK HELPERS
// ═══════════════════════════════════════════════════════════════════════════════

/// `Default, { A, B as C, type D }` or `* as NS`. Returns (local name, type-only).
fn parse_import_clause(clause: &str) -> Vec<(String, bool)> {
    let mut bindings = Vec::new();
    let (named, rest) = match (clause.find('{'), clause.rfind('}')) {
        (Some(open), Some(close)) if open < close => (
            Some(&clause[open + 1..close]),
            format!("{}{}", &clause[..open], &clause[close + 1..]),
        ),
        _ => (None, clause.to_string()),
    };

    for part in rest.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let local = match part.strip_prefix('*') {
            Some(ns) => ns.trim().trim_start_matches("as").trim(),
            None => part,
        };
        if !local.is_empty() {
            bindings.push((local.to_string(), false));
        }
    }

    if let Some(named) = named {
        for spec in named.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            let (spec, is_type) = match spec.strip_prefix("type ") {
                Some(stripped) => (stripped.trim(), true),
                None => (spec, false),
            };
            let local = spec.rsplit(" as ").next().unwrap_or(spec).trim();
            bindings.push((local.to_string(), is_type));
        }
    }
    bindings
}

/// Text of the first call argument, given the text right after the `(`.
fn first_argument_after(rest: &str) -> Option<String> {
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut escaped = false;
    for (i, ch) in rest.char_indices() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == q {
                quote = None;
            }
            continue;
        }
        match ch {
            '\'' | '"' | '`' => quote = Some(ch),
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' if depth > 0 => depth -= 1,
            ')' | ',' if depth == 0 => {
                let arg = rest[..i].trim();
                return (!arg.is_empty()).then(|| arg.to_string());
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_imports_are_hoisted_and_classified() {
        let src = "import Card from './card';\nimport { type Item, format as fmt } from './util';\nimport type { Props } from './types';\nconst x = 1;\n";
        let module = ScriptModule::analyze(src);
        assert!(module.parsed);
        assert_eq!(module.import_statements.len(), 3);
        assert_eq!(module.body, "const x = 1;");
        let locals: Vec<_> = module
            .imports
            .iter()
            .map(|i| (i.local_name.as_str(), i.is_type_only))
            .collect();
        assert_eq!(
            locals,
            vec![("Card", false), ("Item", true), ("fmt", false), ("Props", true)]
        );
        assert_eq!(module.imports[0].source_path, "./card");
    }

    #[test]
    fn test_top_level_names_include_destructuring() {
        let src = "const { a, b: [c, ...d] } = obj;\nlet e = 1, f;\nfunction g() { const nested = 1; }\nexport const h = 2;\n";
        let module = ScriptModule::analyze(src);
        assert_eq!(module.top_level_names, vec!["a", "c", "d", "e", "f", "g", "h"]);
        assert!(module.body.starts_with("const { a"));
        assert!(module.body.contains("\nconst h = 2;"));
        assert!(!module.body.contains("export"));
    }

    #[test]
    fn test_declared_calls_keep_first_argument_verbatim() {
        let src = "const name = input.required<string>();\nconst items = viewChildren('item', { read: ElementRef });\nconst plain = 3;\n";
        let module = ScriptModule::analyze(src);
        assert_eq!(
            module.declarations,
            vec![
                DeclaredCall {
                    name: "name".into(),
                    callee: "input.required".into(),
                    first_argument: None,
                },
                DeclaredCall {
                    name: "items".into(),
                    callee: "viewChildren".into(),
                    first_argument: Some("'item'".into()),
                },
            ]
        );
    }

    #[test]
    fn test_shapes_from_literals_and_factories() {
        let src = "const person = createPerson();\nconst point = ({ x: 1, 'y': 2 });\nfunction createPerson() {\n  const n = 1;\n  return { name: signal('a'), age: signal(n) };\n}\nconst makeUser = () => ({ id: 1 });\n";
        let module = ScriptModule::analyze(src);
        assert_eq!(module.shapes["person"], vec!["name", "age"]);
        assert_eq!(module.shapes["point"], vec!["x", "y"]);
        assert_eq!(module.shapes["createPerson"], vec!["name", "age"]);
        assert_eq!(module.shapes["makeUser"], vec!["id"]);
    }

    #[test]
    fn test_lexical_fallback_on_parse_error() {
        let src = "import Card from './card';\nconst a = input(;\nconst b = output();\nfunction f() { let inner = 1; }\n";
        let module = ScriptModule::analyze(src);
        assert!(!module.parsed);
        assert_eq!(module.imports.len(), 1);
        assert_eq!(module.imports[0].local_name, "Card");
        assert!(!module.body.contains("import"));
        assert!(module.top_level_names.contains(&"inner".to_string()));
        assert!(module
            .declarations
            .iter()
            .any(|d| d.name == "b" && d.callee == "output"));
    }

    #[test]
    fn test_parse_import_clause() {
        assert_eq!(
            parse_import_clause("Def, { A, B as C, type D }"),
            vec![
                ("Def".to_string(), false),
                ("A".to_string(), false),
                ("C".to_string(), false),
                ("D".to_string(), true),
            ]
        );
        assert_eq!(parse_import_clause("* as NS"), vec![("NS".to_string(), false)]);
    }

    #[test]
    fn test_first_argument_after() {
        assert_eq!(first_argument_after("'a,b', 2)"), Some("'a,b'".to_string()));
        assert_eq!(first_argument_after("fn(1, 2))"), Some("fn(1, 2)".to_string()));
        assert_eq!(first_argument_after(")"), None);
    }
}
