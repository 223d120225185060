//! End-to-end compiles through the default host.

use crate::compile::{compile_document, CompileOptions, CompileResult};
use crate::error::{CompileError, HostError};
use crate::host::{
    CompiledDefinition, ConstantPool, HostCompiler, HostHandle, PartialDeclarationHost,
    TemplateAst,
};
use crate::metadata::ComponentMetadata;

fn compile(source: &str, source_id: &str) -> CompileResult {
    let host = HostHandle::with_default();
    compile_document(source, source_id, &host, &CompileOptions::default()).unwrap()
}

#[test]
fn test_inputs_outputs_and_module_layout() {
    let src = "const greeting = input();\nconst save = output();\n<p>{{ greeting() }}</p>\n";
    let result = compile(src, "src/app/my-post.treaty");

    assert_eq!(result.component_name, "myPost");
    assert!(result.dependencies.is_empty());
    assert!(result.warnings.is_empty(), "{:?}", result.warnings);

    let code = &result.code;
    assert!(code.starts_with("import * as i0 from \"@angular/core\";\nfunction myPost() {\n"));
    assert!(code.contains("const greeting = input();\nconst save = output();\nreturn { greeting, save };\n}\n"));
    assert!(code.contains(
        "myPost.ɵfac = function myPost_Factory(t) { return (t || myPost)(); };\n"
    ));
    assert!(code.contains("myPost.ɵcmp = i0.ɵɵngDeclareComponent({minVersion: '17.1.0'"));
    assert!(code.contains("selector: 'my-post, myPost, MyPost'"));
    assert!(code.contains(
        "inputs: {greeting: {classPropertyName: 'greeting', publicName: 'greeting', isSignal: true, isRequired: false, transformFunction: null}}"
    ));
    assert!(code.contains("outputs: {save: 'save'}"));
    assert!(code.contains("template: '<p>{{ greeting() }}</p>'"));
    assert!(code.contains("dependencies: []"));
    assert!(code.ends_with("});\nexport default myPost;\n"));
}

#[test]
fn test_imported_component_tags_become_dependencies() {
    let src = "import MyWidget from './my-widget';\nimport { helper } from './util';\n<section><MyWidget>hi</MyWidget><MyWidget>again</MyWidget></section>\n";
    let result = compile(src, "card-list.treaty");

    assert_eq!(result.dependencies, vec!["MyWidget"]);
    let code = &result.code;
    assert!(code.starts_with(
        "import MyWidget from './my-widget';\nimport { helper } from './util';\nimport * as i0 from \"@angular/core\";\n"
    ));
    assert!(code.contains("<my-widget>hi</my-widget><my-widget>again</my-widget>"));
    assert!(!code.contains("<MyWidget"));
    assert!(code.contains(
        "isInline: true, dependencies: [{kind: 'component', type: MyWidget, selector: 'my-widget, myWidget, MyWidget'}]})"
    ));
    assert_eq!(code.matches("dependencies:").count(), 1);
    assert!(code.contains("return {};"));
}

#[test]
fn test_spread_expands_factory_keys() {
    let src = "const person = createPerson();\nfunction createPerson() {\n  return { name: signal('Ada'), age: signal(36) };\n}\n<profile-card {...person}></profile-card>\n";
    let result = compile(src, "profile.treaty");

    assert!(result.warnings.is_empty(), "{:?}", result.warnings);
    assert!(result.code.contains(
        "<profile-card [name]=\"person.name()\" [age]=\"person.age()\"></profile-card>"
    ));
    assert!(result.code.contains("return { person, createPerson };"));
}

#[test]
fn test_unresolved_spread_is_a_warning() {
    let result = compile("<x-card {...missing}></x-card>\n", "card.treaty");
    assert!(result.code.contains("{...missing}"));
    assert_eq!(
        result.warnings,
        vec!["could not resolve keys for spread `{...missing}`; left unexpanded"]
    );
}

#[test]
fn test_queries_and_styles_are_hoisted() {
    let src = "const header = viewChild('header');\n<h1 #header>Title</h1>\n<style> h1 { color: red; } </style>\n";
    let result = compile(src, "page-header.treaty");
    let code = &result.code;

    assert!(code.starts_with(
        "import * as i0 from \"@angular/core\";\nconst _c0 = ['header'];\nconst _c1 = [' h1 { color: red; } '];\nfunction pageHeader() {\n"
    ));
    assert!(code.contains("minVersion: '17.1.0'"));
    assert!(code.contains(
        "viewQueries: [{propertyName: 'header', first: true, predicate: _c0, descendants: true, isSignal: true}]"
    ));
    assert!(code.contains("styles: _c1"));
    assert!(code.contains("template: '<h1 #header>Title</h1>'"));
}

#[test]
fn test_control_flow_reaches_template() {
    let src = "const show = input(false);\n@if (show()) {<p>yes</p>} @else {<p>no</p>}\n";
    let result = compile(src, "toggle.treaty");
    assert!(result
        .code
        .contains("template: '@if (show()) {<p>yes</p>} @else {<p>no</p>}'"));
}

#[test]
fn test_else_if_with_wide_gap_stays_in_template() {
    let src = "const a = input(false);\nconst b = input(false);\n@if (a()) {<p>x</p>} @else  if (b()) {<p>y</p>}\n";
    let result = compile(src, "branch.treaty");
    assert!(result
        .code
        .contains("template: '@if (a()) {<p>x</p>} @else if (b()) {<p>y</p>}'"));
    assert!(result.code.contains("const b = input(false);\nreturn { a, b };"));
}

#[test]
fn test_close_tag_with_trailing_space_is_rewritten() {
    let src = "import Badge from './badge';\n<Badge>new</Badge >\n";
    let result = compile(src, "label.treaty");
    assert!(result.code.contains("template: '<badge>new</badge>'"));
    assert_eq!(result.dependencies, vec!["Badge"]);
}

#[test]
fn test_unbalanced_block_fails_in_host() {
    let host = HostHandle::with_default();
    let err = compile_document(
        "@if (open) {<p>x</p>\n",
        "bad.treaty",
        &host,
        &CompileOptions::default(),
    )
    .unwrap_err();
    match err {
        CompileError::Host { source_id, source } => {
            assert_eq!(source_id, "bad.treaty");
            assert!(matches!(source, HostError::Template { .. }));
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

struct RejectingHost;

impl HostCompiler for RejectingHost {
    fn parse_template(&self, text: &str, source_id: &str) -> Result<TemplateAst, HostError> {
        PartialDeclarationHost::default().parse_template(text, source_id)
    }

    fn compile_component_from_metadata(
        &self,
        _metadata: &ComponentMetadata,
        _pool: &mut ConstantPool,
    ) -> Result<CompiledDefinition, HostError> {
        Err(HostError::Metadata("rejected by host".into()))
    }
}

#[test]
fn test_host_errors_propagate_unchanged() {
    let host = HostHandle::from_host(RejectingHost);
    let err = compile_document("<p>x</p>", "x.treaty", &host, &CompileOptions::default())
        .unwrap_err();
    assert!(matches!(
        err,
        CompileError::Host { source: HostError::Metadata(ref m), .. } if m == "rejected by host"
    ));

    let broken = HostHandle::new(|| Err(HostError::Init("runtime missing".into())));
    let err = compile_document("<p>x</p>", "x.treaty", &broken, &CompileOptions::default())
        .unwrap_err();
    assert!(matches!(
        err,
        CompileError::Host { source: HostError::Init(_), .. }
    ));
}

#[test]
fn test_malformed_script_degrades_with_warnings() {
    let result = compile("const s = 'oops\n<div></div>", "broken.treaty");
    assert!(result.warnings.iter().any(|w| w.contains("(at byte")));
    assert!(result.warnings.iter().any(|w| w.contains("lexically")));
    assert!(result.code.contains("function broken() {"));
}

#[test]
fn test_runtime_alias_and_repeatability() {
    let options = CompileOptions {
        runtime_alias: "core".into(),
        ..CompileOptions::default()
    };
    let host = options.host_handle();
    let src = "let n = 0;\n<p>{{ n }}</p>\n";

    let first = compile_document(src, "counter.treaty", &host, &options).unwrap();
    let second = compile_document(src, "counter.treaty", &host, &options).unwrap();
    assert_eq!(first, second);
    assert!(first.code.contains("import * as core from \"@angular/core\";"));
    assert!(first.code.contains("counter.ɵcmp = core.ɵɵngDeclareComponent({"));
    assert!(first.code.contains("ngImport: core"));
    assert!(host.is_initialized());
}
