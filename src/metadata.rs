//! Component metadata from top-level factory declarations.
//!
//! Recognized shapes (optionally `export`-prefixed, top level only):
//!
//! | declaration                        | produces                   |
//! |------------------------------------|----------------------------|
//! | `x = input(...)`                   | optional signal input      |
//! | `x = input.required(...)`          | required signal input      |
//! | `x = output(...)`                  | output `x → x`             |
//! | `x = viewChild(p)` / `.required`   | single view query          |
//! | `x = viewChildren(p)`              | multi view query           |
//! | `x = contentChild(p)` / `.required`| single content query       |
//! | `x = contentChildren(p)`           | multi content query        |
//!
//! Every query gets a hoisted constant `_c{n}` holding its predicate.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::warn;

use crate::casing::SelectorVariants;
use crate::host::TemplateAst;
use crate::script::DeclaredCall;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InputBinding {
    pub property_name: String,
    pub required: bool,
    pub is_signal: bool,
    pub transform: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputBinding {
    pub property_name: String,
}

impl OutputBinding {
    /// Outputs are published under their own name.
    pub fn public_name(&self) -> &str {
        &self.property_name
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryBinding {
    pub property_name: String,
    /// Verbatim predicate source.
    pub predicate: String,
    pub is_view_query: bool,
    pub multi: bool,
    pub constant_name: String,
    pub first: bool,
    pub descendants: bool,
    pub is_static: bool,
    pub emit_distinct_changes_only: bool,
}

impl QueryBinding {
    /// `const _c0 = [<predicate>];`
    pub fn constant_declaration(&self) -> String {
        format!("const {} = [{}];", self.constant_name, self.predicate)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedMetadata {
    pub inputs: Vec<InputBinding>,
    pub outputs: Vec<OutputBinding>,
    pub queries: Vec<QueryBinding>,
    pub warnings: Vec<String>,
}

impl ExtractedMetadata {
    pub fn query_constants(&self) -> Vec<String> {
        self.queries.iter().map(QueryBinding::constant_declaration).collect()
    }

    pub fn view_queries(&self) -> impl Iterator<Item = &QueryBinding> {
        self.queries.iter().filter(|q| q.is_view_query)
    }

    pub fn content_queries(&self) -> impl Iterator<Item = &QueryBinding> {
        self.queries.iter().filter(|q| !q.is_view_query)
    }
}

/// Everything the host needs to compile one component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentMetadata {
    pub name: String,
    pub selector: String,
    pub inputs: Vec<InputBinding>,
    pub outputs: Vec<OutputBinding>,
    pub queries: Vec<QueryBinding>,
    pub styles: Vec<String>,
    pub dependencies: Vec<String>,
    pub template: TemplateAst,
}

impl ComponentMetadata {
    pub fn new(
        name: impl Into<String>,
        selector: &SelectorVariants,
        extracted: &ExtractedMetadata,
        styles: Vec<String>,
        dependencies: Vec<String>,
        template: TemplateAst,
    ) -> Self {
        ComponentMetadata {
            name: name.into(),
            selector: selector.selector(),
            inputs: extracted.inputs.clone(),
            outputs: extracted.outputs.clone(),
            queries: extracted.queries.clone(),
            styles,
            dependencies,
            template,
        }
    }
}

enum Factory {
    Input { required: bool },
    Output,
    Query { is_view_query: bool, multi: bool },
}

fn classify(callee: &str) -> Option<Factory> {
    let factory = match callee {
        "input" => Factory::Input { required: false },
        "input.required" => Factory::Input { required: true },
        "output" => Factory::Output,
        "viewChild" | "viewChild.required" => Factory::Query {
            is_view_query: true,
            multi: false,
        },
        "viewChildren" => Factory::Query {
            is_view_query: true,
            multi: true,
        },
        "contentChild" | "contentChild.required" => Factory::Query {
            is_view_query: false,
            multi: false,
        },
        "contentChildren" => Factory::Query {
            is_view_query: false,
            multi: true,
        },
        _ => return None,
    };
    Some(factory)
}

pub fn extract(declarations: &[DeclaredCall]) -> ExtractedMetadata {
    let mut out = ExtractedMetadata::default();
    let mut seen: HashSet<&str> = HashSet::new();

    for decl in declarations {
        let Some(factory) = classify(&decl.callee) else {
            continue;
        };
        // a query without a predicate is not a query
        if matches!(factory, Factory::Query { .. }) && decl.first_argument.is_none() {
            continue;
        }
        if !seen.insert(decl.name.as_str()) {
            warn!(property = %decl.name, "duplicate component property skipped");
            out.warnings
                .push(format!("duplicate property `{}` skipped", decl.name));
            continue;
        }
        match factory {
            Factory::Input { required } => out.inputs.push(InputBinding {
                property_name: decl.name.clone(),
                required,
                is_signal: true,
                transform: None,
            }),
            Factory::Output => out.outputs.push(OutputBinding {
                property_name: decl.name.clone(),
            }),
            Factory::Query {
                is_view_query,
                multi,
            } => {
                let predicate = decl.first_argument.clone().unwrap_or_default();
                let constant_name = format!("_c{}", out.queries.len());
                out.queries.push(QueryBinding {
                    property_name: decl.name.clone(),
                    predicate,
                    is_view_query,
                    multi,
                    constant_name,
                    first: !multi,
                    descendants: true,
                    is_static: false,
                    emit_distinct_changes_only: true,
                });
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::ScriptModule;

    fn extract_from(src: &str) -> ExtractedMetadata {
        extract(&ScriptModule::analyze(src).declarations)
    }

    #[test]
    fn test_inputs_and_outputs() {
        let meta = extract_from("const greeting = input();\nconst save = output();\n");
        assert_eq!(
            meta.inputs,
            vec![InputBinding {
                property_name: "greeting".into(),
                required: false,
                is_signal: true,
                transform: None,
            }]
        );
        assert_eq!(meta.outputs.len(), 1);
        assert_eq!(meta.outputs[0].public_name(), "save");
    }

    #[test]
    fn test_required_and_exported_inputs() {
        let meta = extract_from("export const id = input.required<number>();\nlet label = input('x');\n");
        let flags: Vec<_> = meta
            .inputs
            .iter()
            .map(|i| (i.property_name.as_str(), i.required))
            .collect();
        assert_eq!(flags, vec![("id", true), ("label", false)]);
    }

    #[test]
    fn test_queries_get_constants_in_order() {
        let meta = extract_from(
            "const header = viewChild('header');\nconst rows = contentChildren(Row);\nconst none = viewChild();\n",
        );
        assert_eq!(meta.queries.len(), 2);
        assert_eq!(meta.queries[0].constant_name, "_c0");
        assert!(meta.queries[0].first && meta.queries[0].is_view_query);
        assert_eq!(meta.queries[1].constant_name, "_c1");
        assert!(!meta.queries[1].first && meta.queries[1].multi);
        assert_eq!(
            meta.query_constants(),
            vec!["const _c0 = ['header'];", "const _c1 = [Row];"]
        );
        assert_eq!(meta.view_queries().count(), 1);
        assert_eq!(meta.content_queries().count(), 1);
    }

    #[test]
    fn test_nested_declarations_are_ignored() {
        let meta = extract_from("function f() {\n  const inner = input();\n}\nconst outer = input();\n");
        assert_eq!(meta.inputs.len(), 1);
        assert_eq!(meta.inputs[0].property_name, "outer");
    }

    #[test]
    fn test_duplicate_names_are_skipped() {
        let decls = vec![
            DeclaredCall {
                name: "a".into(),
                callee: "input".into(),
                first_argument: None,
            },
            DeclaredCall {
                name: "a".into(),
                callee: "output".into(),
                first_argument: None,
            },
        ];
        let meta = extract(&decls);
        assert_eq!(meta.inputs.len(), 1);
        assert!(meta.outputs.is_empty());
        assert_eq!(meta.warnings.len(), 1);
    }

    #[test]
    fn test_predicate_less_query_does_not_reserve_name() {
        let decls = vec![
            DeclaredCall {
                name: "panel".into(),
                callee: "viewChild".into(),
                first_argument: None,
            },
            DeclaredCall {
                name: "panel".into(),
                callee: "viewChild".into(),
                first_argument: Some("'panel'".into()),
            },
        ];
        let meta = extract(&decls);
        assert!(meta.warnings.is_empty(), "{:?}", meta.warnings);
        assert_eq!(meta.queries.len(), 1);
        assert_eq!(meta.queries[0].predicate, "'panel'");
        assert_eq!(meta.queries[0].constant_name, "_c0");
    }
}
