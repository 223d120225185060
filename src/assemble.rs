//! Generated module layout.
//!
//! ```text
//! <verbatim imports>
//! import * as i0 from "@angular/core";
//! <query constants>
//! <constant pool statements>
//! function name() {
//! <script body>
//! return { a, b };
//! }
//! name.ɵfac = function name_Factory(t) { return (t || name)(); };
//! name.ɵcmp = <definition>;
//! export default name;
//! ```

#[derive(Debug, Clone, Default)]
pub struct ModuleParts<'a> {
    pub imports: &'a [String],
    pub runtime_module: &'a str,
    pub runtime_alias: &'a str,
    pub query_constants: &'a [String],
    /// Printed constant-pool statements, one per line.
    pub pool_statements: &'a str,
    pub component_name: &'a str,
    pub body: &'a str,
    pub exposed_names: &'a [String],
    /// Printed definition expression.
    pub definition: &'a str,
}

pub fn assemble(parts: &ModuleParts<'_>) -> String {
    let name = parts.component_name;
    let mut lines: Vec<String> = Vec::new();

    lines.extend(parts.imports.iter().cloned());
    lines.push(format!(
        "import * as {} from \"{}\";",
        parts.runtime_alias, parts.runtime_module
    ));
    lines.extend(parts.query_constants.iter().cloned());
    if !parts.pool_statements.is_empty() {
        lines.push(parts.pool_statements.to_string());
    }

    lines.push(format!("function {}() {{", name));
    if !parts.body.trim().is_empty() {
        lines.push(parts.body.trim_end().to_string());
    }
    if parts.exposed_names.is_empty() {
        lines.push("return {};".to_string());
    } else {
        lines.push(format!("return {{ {} }};", parts.exposed_names.join(", ")));
    }
    lines.push("}".to_string());

    lines.push(format!(
        "{0}.ɵfac = function {0}_Factory(t) {{ return (t || {0})(); }};",
        name
    ));
    lines.push(format!("{}.ɵcmp = {};", name, parts.definition));
    lines.push(format!("export default {};", name));

    let mut module = lines.join("\n");
    module.push('\n');
    module
}
