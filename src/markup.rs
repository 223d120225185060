//! Template assembly from markup-kind nodes.
//!
//! Three passes over the markup side of a document:
//!
//! 1. **Merge** Markup, ControlFlow and top-level interpolation nodes into one
//!    template string, keeping the whitespace that separated adjacent nodes.
//! 2. **Custom tags**: every capitalized value import used as `<Name ...>` is
//!    rewritten to its hyphen-case tag and recorded as a dependency.
//! 3. **Spreads**: `{...identifier}` placeholders become explicit property
//!    bindings, one per key of the identifier's object shape.

use lazy_static::lazy_static;
use regex::{Captures, Regex};
use std::collections::HashMap;
use tracing::{debug, warn};

use crate::casing::to_hyphen_case;
use crate::parser::{Ast, NodeKind};
use crate::script::{ImportBinding, ScriptModule};

lazy_static! {
    static ref SPREAD_RE: Regex = Regex::new(r"\{\s*\.\.\.\s*([A-Za-z_$][\w$]*)\s*\}").unwrap();
}

/// Resolves the key set of an object-valued binding.
pub trait KeyResolver {
    fn resolve_keys(&self, identifier: &str) -> Option<Vec<String>>;
}

impl KeyResolver for ScriptModule {
    fn resolve_keys(&self, identifier: &str) -> Option<Vec<String>> {
        self.shapes.get(identifier).cloned()
    }
}

impl KeyResolver for HashMap<String, Vec<String>> {
    fn resolve_keys(&self, identifier: &str) -> Option<Vec<String>> {
        self.get(identifier).cloned()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MarkupAnalysis {
    pub template: String,
    /// Imported component names used as tags, first-use order.
    pub dependencies: Vec<String>,
    pub warnings: Vec<String>,
}

/// Concatenate the template side of the document.
pub fn merge_fragments(ast: &Ast, source: &str) -> String {
    let mut template = String::new();
    let mut previous_end: Option<usize> = None;

    for node in &ast.nodes {
        if !node.kind.is_markup_kind() {
            previous_end = None;
            continue;
        }
        if let Some(end) = previous_end {
            if let Some(gap) = source.get(end..node.start) {
                if gap.chars().all(char::is_whitespace) {
                    template.push_str(gap);
                }
            }
        }
        match node.kind {
            NodeKind::TemplateExpression => {
                template.push_str("{{ ");
                template.push_str(&node.value);
                template.push_str(" }}");
            }
            _ => template.push_str(&node.value),
        }
        previous_end = Some(node.end);
    }
    template
}

/// Rewrite custom-tag usages of imported components.
pub fn rewrite_custom_tags(template: &str, imports: &[ImportBinding]) -> (String, Vec<String>) {
    let mut rewritten = template.to_string();
    let mut dependencies: Vec<String> = Vec::new();

    for import in imports {
        let name = import.local_name.as_str();
        if import.is_type_only || !name.starts_with(|c: char| c.is_ascii_uppercase()) {
            continue;
        }
        let escaped = regex::escape(name);
        let (Ok(open_re), Ok(close_re)) = (
            Regex::new(&format!(r"<{}([\s/>])", escaped)),
            Regex::new(&format!(r"</{}\s*>", escaped)),
        ) else {
            continue;
        };
        if !open_re.is_match(&rewritten) {
            continue;
        }

        let tag = to_hyphen_case(name);
        rewritten = open_re
            .replace_all(&rewritten, |caps: &Captures| format!("<{}{}", tag, &caps[1]))
            .into_owned();
        rewritten = close_re
            .replace_all(&rewritten, format!("</{}>", tag).as_str())
            .into_owned();

        if !dependencies.iter().any(|d| d == name) {
            debug!(component = name, tag = %tag, "custom tag rewritten");
            dependencies.push(name.to_string());
        }
    }
    (rewritten, dependencies)
}

/// Expand `{...identifier}` placeholders into `[key]="identifier.key()"`.
/// Unresolvable identifiers are left as written.
pub fn expand_spreads(template: &str, resolver: &dyn KeyResolver) -> (String, Vec<String>) {
    let mut resolved: HashMap<String, Option<String>> = HashMap::new();
    let mut warnings = Vec::new();

    for caps in SPREAD_RE.captures_iter(template) {
        let identifier = caps[1].to_string();
        if resolved.contains_key(&identifier) {
            continue;
        }
        let bindings = resolver.resolve_keys(&identifier).map(|keys| {
            keys.iter()
                .map(|key| format!("[{}]=\"{}.{}()\"", key, identifier, key))
                .collect::<Vec<_>>()
                .join(" ")
        });
        if bindings.is_none() {
            warn!(identifier = %identifier, "spread target has no known object shape");
            warnings.push(format!(
                "could not resolve keys for spread `{{...{}}}`; left unexpanded",
                identifier
            ));
        }
        resolved.insert(identifier, bindings);
    }

    let expanded = SPREAD_RE.replace_all(template, |caps: &Captures| {
        match resolved.get(&caps[1]) {
            Some(Some(bindings)) => bindings.clone(),
            _ => caps[0].to_string(),
        }
    });
    (expanded.into_owned(), warnings)
}

/// Run all three passes.
pub fn analyze(ast: &Ast, source: &str, script: &ScriptModule) -> MarkupAnalysis {
    let merged = merge_fragments(ast, source);
    let (tagged, dependencies) = rewrite_custom_tags(&merged, &script.imports);
    let (template, warnings) = expand_spreads(&tagged, script);
    MarkupAnalysis {
        template,
        dependencies,
        warnings,
    }
}
