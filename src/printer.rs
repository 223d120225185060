//! Output tree → JavaScript source text.
//!
//! Parenthesization rules:
//! - binary expressions are always parenthesized;
//! - write expressions are parenthesized unless they stand as a statement;
//! - conditionals, functions and arrows are parenthesized as operands,
//!   receivers and callees, and conditionals also as a conditional's condition;
//! - arrow bodies that are object literals, and expression statements that
//!   would start with `{` or `function`, are parenthesized.

use crate::error::PrintError;
use crate::output_ast::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PrintContext {
    pub is_statement: bool,
}

impl PrintContext {
    pub fn expression() -> Self {
        PrintContext {
            is_statement: false,
        }
    }

    pub fn statement() -> Self {
        PrintContext { is_statement: true }
    }

    pub fn with_expression_mode(self) -> Self {
        if self.is_statement {
            PrintContext::expression()
        } else {
            self
        }
    }

    pub fn with_statement_mode(self) -> Self {
        if self.is_statement {
            self
        } else {
            PrintContext::statement()
        }
    }
}

pub struct Printer {
    runtime_alias: String,
}

impl Default for Printer {
    fn default() -> Self {
        Printer::new("i0")
    }
}

impl Printer {
    pub fn new(runtime_alias: impl Into<String>) -> Self {
        Printer {
            runtime_alias: runtime_alias.into(),
        }
    }

    pub fn print_expression(&mut self, expr: &Expression) -> Result<String, PrintError> {
        expr.visit_expression(self, &PrintContext::expression())
    }

    pub fn print_statement(&mut self, stmt: &Statement) -> Result<String, PrintError> {
        stmt.visit_statement(self, &PrintContext::statement())
    }

    pub fn print_statements(&mut self, statements: &[Statement]) -> Result<String, PrintError> {
        let printed = statements
            .iter()
            .map(|stmt| self.print_statement(stmt))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(printed.join("\n"))
    }

    fn expr(&mut self, expr: &Expression, context: &PrintContext) -> Result<String, PrintError> {
        expr.visit_expression(self, &context.with_expression_mode())
    }

    /// Receiver of a property/key access, callee, or `new` target.
    fn receiver(&mut self, expr: &Expression, context: &PrintContext) -> Result<String, PrintError> {
        let text = self.expr(expr, context)?;
        let wrap = match expr {
            Expression::Conditional(_)
            | Expression::Function(_)
            | Expression::ArrowFunction(_)
            | Expression::UnaryOperator(_)
            | Expression::Not(_)
            | Expression::Typeof(_) => true,
            Expression::Literal(lit) => matches!(lit.value, LiteralValue::Number(_)),
            _ => false,
        };
        Ok(parenthesize_if(wrap, text))
    }

    /// Operand of a unary, `!`, `typeof` or binary operator.
    fn operand(&mut self, expr: &Expression, context: &PrintContext) -> Result<String, PrintError> {
        let text = self.expr(expr, context)?;
        let wrap = match expr {
            Expression::Conditional(_)
            | Expression::Function(_)
            | Expression::ArrowFunction(_)
            | Expression::UnaryOperator(_) => true,
            Expression::Literal(lit) => {
                matches!(lit.value, LiteralValue::Number(n) if n.is_sign_negative())
            }
            _ => false,
        };
        Ok(parenthesize_if(wrap, text))
    }

    fn args(&mut self, args: &[Expression], context: &PrintContext) -> Result<String, PrintError> {
        let printed = args
            .iter()
            .map(|arg| self.expr(arg, context))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(printed.join(", "))
    }

    fn block(&mut self, statements: &[Statement]) -> Result<String, PrintError> {
        if statements.is_empty() {
            return Ok("{}".to_string());
        }
        Ok(format!("{{\n{}\n}}", self.print_statements(statements)?))
    }
}

fn parenthesize_if(wrap: bool, text: String) -> String {
    if wrap {
        format!("({})", text)
    } else {
        text
    }
}

fn params(params: &[FnParam]) -> String {
    params
        .iter()
        .map(|p| p.name.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Single-quoted JavaScript string literal.
pub fn quote_string(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('\'');
    for ch in value.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\u{2028}' => out.push_str("\\u2028"),
            '\u{2029}' => out.push_str("\\u2029"),
            _ => out.push(ch),
        }
    }
    out.push('\'');
    out
}

fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        let text = if n > 0.0 { "Infinity" } else { "-Infinity" };
        text.to_string()
    } else {
        format!("{}", n)
    }
}

fn is_identifier(key: &str) -> bool {
    let mut chars = key.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' || c == '$' => {}
        _ => return false,
    }
    chars.all(|c| c.is_alphanumeric() || c == '_' || c == '$')
}

impl ExpressionVisitor for Printer {
    type Context = PrintContext;
    type Output = String;
    type Error = PrintError;

    fn visit_read_var_expr(&mut self, expr: &ReadVarExpr, _context: &PrintContext) -> Result<String, PrintError> {
        Ok(expr.name.clone())
    }

    fn visit_write_var_expr(&mut self, expr: &WriteVarExpr, context: &PrintContext) -> Result<String, PrintError> {
        let assignment = format!("{} = {}", expr.name, self.expr(&expr.value, context)?);
        Ok(parenthesize_if(!context.is_statement, assignment))
    }

    fn visit_read_prop_expr(&mut self, expr: &ReadPropExpr, context: &PrintContext) -> Result<String, PrintError> {
        Ok(format!("{}.{}", self.receiver(&expr.receiver, context)?, expr.name))
    }

    fn visit_write_prop_expr(&mut self, expr: &WritePropExpr, context: &PrintContext) -> Result<String, PrintError> {
        let assignment = format!(
            "{}.{} = {}",
            self.receiver(&expr.receiver, context)?,
            expr.name,
            self.expr(&expr.value, context)?
        );
        Ok(parenthesize_if(!context.is_statement, assignment))
    }

    fn visit_read_key_expr(&mut self, expr: &ReadKeyExpr, context: &PrintContext) -> Result<String, PrintError> {
        Ok(format!(
            "{}[{}]",
            self.receiver(&expr.receiver, context)?,
            self.expr(&expr.index, context)?
        ))
    }

    fn visit_write_key_expr(&mut self, expr: &WriteKeyExpr, context: &PrintContext) -> Result<String, PrintError> {
        let assignment = format!(
            "{}[{}] = {}",
            self.receiver(&expr.receiver, context)?,
            self.expr(&expr.index, context)?,
            self.expr(&expr.value, context)?
        );
        Ok(parenthesize_if(!context.is_statement, assignment))
    }

    fn visit_invoke_function_expr(&mut self, expr: &InvokeFunctionExpr, context: &PrintContext) -> Result<String, PrintError> {
        Ok(format!(
            "{}({})",
            self.receiver(&expr.callee, context)?,
            self.args(&expr.args, context)?
        ))
    }

    fn visit_instantiate_expr(&mut self, expr: &InstantiateExpr, context: &PrintContext) -> Result<String, PrintError> {
        let ctor = self.expr(&expr.class_expr, context)?;
        let simple = matches!(
            *expr.class_expr,
            Expression::ReadVar(_)
                | Expression::ReadProp(_)
                | Expression::External(_)
                | Expression::WrappedNode(_)
        );
        Ok(format!(
            "new {}({})",
            parenthesize_if(!simple, ctor),
            self.args(&expr.args, context)?
        ))
    }

    fn visit_literal_expr(&mut self, expr: &LiteralExpr, _context: &PrintContext) -> Result<String, PrintError> {
        Ok(match &expr.value {
            LiteralValue::String(s) => quote_string(s),
            LiteralValue::Number(n) => format_number(*n),
            LiteralValue::Boolean(b) => b.to_string(),
            LiteralValue::Null => "null".to_string(),
            LiteralValue::Undefined => "undefined".to_string(),
        })
    }

    fn visit_literal_array_expr(&mut self, expr: &LiteralArrayExpr, context: &PrintContext) -> Result<String, PrintError> {
        Ok(format!("[{}]", self.args(&expr.entries, context)?))
    }

    fn visit_literal_map_expr(&mut self, expr: &LiteralMapExpr, context: &PrintContext) -> Result<String, PrintError> {
        let mut properties = Vec::with_capacity(expr.entries.len());
        for entry in &expr.entries {
            let key = if entry.quoted || !is_identifier(&entry.key) {
                quote_string(&entry.key)
            } else {
                entry.key.clone()
            };
            properties.push(format!("{}: {}", key, self.expr(&entry.value, context)?));
        }
        Ok(format!("{{{}}}", properties.join(", ")))
    }

    fn visit_conditional_expr(&mut self, expr: &ConditionalExpr, context: &PrintContext) -> Result<String, PrintError> {
        let condition = self.operand(&expr.condition, context)?;
        let true_case = self.expr(&expr.true_case, context)?;
        let false_case = match &expr.false_case {
            Some(false_case) => self.expr(false_case, context)?,
            None => "null".to_string(),
        };
        Ok(format!("{} ? {} : {}", condition, true_case, false_case))
    }

    fn visit_unary_operator_expr(&mut self, expr: &UnaryOperatorExpr, context: &PrintContext) -> Result<String, PrintError> {
        Ok(format!(
            "{}{}",
            expr.operator.token(),
            self.operand(&expr.expr, context)?
        ))
    }

    fn visit_binary_operator_expr(&mut self, expr: &BinaryOperatorExpr, context: &PrintContext) -> Result<String, PrintError> {
        let mut lhs = self.operand(&expr.lhs, context)?;
        // `**` rejects a unary expression as its left operand.
        if expr.operator == BinaryOperator::Exponentiation
            && matches!(*expr.lhs, Expression::Not(_) | Expression::Typeof(_))
        {
            lhs = format!("({})", lhs);
        }
        Ok(format!(
            "({} {} {})",
            lhs,
            expr.operator.token(),
            self.operand(&expr.rhs, context)?
        ))
    }

    fn visit_not_expr(&mut self, expr: &NotExpr, context: &PrintContext) -> Result<String, PrintError> {
        Ok(format!("!{}", self.operand(&expr.condition, context)?))
    }

    fn visit_typeof_expr(&mut self, expr: &TypeofExpr, context: &PrintContext) -> Result<String, PrintError> {
        Ok(format!("typeof {}", self.operand(&expr.expr, context)?))
    }

    fn visit_dynamic_import_expr(&mut self, expr: &DynamicImportExpr, _context: &PrintContext) -> Result<String, PrintError> {
        Ok(format!("import({})", quote_string(&expr.url)))
    }

    fn visit_external_expr(&mut self, expr: &ExternalExpr, _context: &PrintContext) -> Result<String, PrintError> {
        match (&expr.value.name, &expr.value.module_name) {
            (None, None) => Err(PrintError::InvalidExternalReference),
            (None, Some(_)) => Ok(self.runtime_alias.clone()),
            (Some(name), Some(_)) => Ok(format!("{}.{}", self.runtime_alias, name)),
            (Some(name), None) => Ok(name.clone()),
        }
    }

    fn visit_function_expr(&mut self, expr: &FunctionExpr, _context: &PrintContext) -> Result<String, PrintError> {
        Ok(format!(
            "function {}({}) {}",
            expr.name.as_deref().unwrap_or_default(),
            params(&expr.params),
            self.block(&expr.statements)?
        ))
    }

    fn visit_arrow_function_expr(&mut self, expr: &ArrowFunctionExpr, context: &PrintContext) -> Result<String, PrintError> {
        let body = match &expr.body {
            ArrowFunctionBody::Statements(statements) => self.block(statements)?,
            ArrowFunctionBody::Expression(body) => {
                let text = self.expr(body, context)?;
                parenthesize_if(matches!(**body, Expression::LiteralMap(_)), text)
            }
        };
        Ok(format!("({}) => {}", params(&expr.params), body))
    }

    fn visit_wrapped_node_expr(&mut self, expr: &WrappedNodeExpr, _context: &PrintContext) -> Result<String, PrintError> {
        Ok(expr.node.clone())
    }
}

impl StatementVisitor for Printer {
    type Context = PrintContext;
    type Output = String;
    type Error = PrintError;

    fn visit_declare_var_stmt(&mut self, stmt: &DeclareVarStmt, context: &PrintContext) -> Result<String, PrintError> {
        let keyword = if stmt.is_final { "const" } else { "let" };
        match &stmt.value {
            Some(value) => Ok(format!(
                "{} {} = {};",
                keyword,
                stmt.name,
                self.expr(value, context)?
            )),
            None => Ok(format!("{} {};", keyword, stmt.name)),
        }
    }

    fn visit_declare_function_stmt(&mut self, stmt: &DeclareFunctionStmt, _context: &PrintContext) -> Result<String, PrintError> {
        Ok(format!(
            "function {}({}) {}",
            stmt.name,
            params(&stmt.params),
            self.block(&stmt.statements)?
        ))
    }

    fn visit_expression_stmt(&mut self, stmt: &ExpressionStatement, context: &PrintContext) -> Result<String, PrintError> {
        let text = stmt
            .expr
            .visit_expression(self, &context.with_statement_mode())?;
        let ambiguous = text.starts_with('{')
            || text.starts_with("function ")
            || text.starts_with("function(");
        Ok(format!("{};", parenthesize_if(ambiguous, text)))
    }

    fn visit_return_stmt(&mut self, stmt: &ReturnStatement, context: &PrintContext) -> Result<String, PrintError> {
        Ok(format!("return {};", self.expr(&stmt.value, context)?))
    }

    fn visit_if_stmt(&mut self, stmt: &IfStmt, context: &PrintContext) -> Result<String, PrintError> {
        let mut text = format!(
            "if ({}) {}",
            self.expr(&stmt.condition, context)?,
            self.block(&stmt.true_case)?
        );
        if !stmt.false_case.is_empty() {
            text.push_str(" else ");
            text.push_str(&self.block(&stmt.false_case)?);
        }
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn print(expr: &Expression) -> String {
        Printer::default().print_expression(expr).unwrap()
    }

    #[test]
    fn test_external_references() {
        assert_eq!(print(&import_expr(Some("@angular/core"), None)), "i0");
        assert_eq!(
            print(&import_expr(Some("@angular/core"), Some("ɵɵdefineComponent"))),
            "i0.ɵɵdefineComponent"
        );
        assert_eq!(print(&import_expr(None, Some("Local"))), "Local");
        assert_eq!(
            Printer::default().print_expression(&import_expr(None, None)),
            Err(PrintError::InvalidExternalReference)
        );
        let mut custom = Printer::new("core");
        assert_eq!(
            custom
                .print_expression(&import_expr(Some("@angular/core"), Some("x")))
                .unwrap(),
            "core.x"
        );
    }

    #[test]
    fn test_string_escaping() {
        assert_eq!(print(&literal_str("it's\n\\")), r"'it\'s\n\\'");
    }

    #[test]
    fn test_numbers() {
        assert_eq!(print(&literal_num(3.0)), "3");
        assert_eq!(print(&literal_num(0.25)), "0.25");
        assert_eq!(print(&literal_num(f64::INFINITY)), "Infinity");
    }

    #[test]
    fn test_write_parenthesized_only_in_expression_position() {
        let write = Expression::WriteVar(WriteVarExpr {
            name: "a".into(),
            value: Box::new(literal_num(1.0)),
        });
        assert_eq!(print(&write), "(a = 1)");
        let mut printer = Printer::default();
        assert_eq!(printer.print_statement(&write.to_stmt()).unwrap(), "a = 1;");
    }

    #[test]
    fn test_binary_and_conditional() {
        let expr = variable("a")
            .binary(BinaryOperator::Plus, variable("b"))
            .binary(BinaryOperator::Multiply, literal_num(2.0));
        assert_eq!(print(&expr), "((a + b) * 2)");

        let nested = variable("x")
            .conditional(variable("y"), Some(variable("z")))
            .conditional(literal_num(1.0), Some(literal_num(2.0)));
        assert_eq!(print(&nested), "(x ? y : z) ? 1 : 2");
    }

    #[test]
    fn test_literal_map_keys() {
        let map = Expression::LiteralMap(LiteralMapExpr {
            entries: vec![
                LiteralMapEntry {
                    key: "plain".into(),
                    value: literal_bool(true),
                    quoted: false,
                },
                LiteralMapEntry {
                    key: "needs-quotes".into(),
                    value: null_expr(),
                    quoted: false,
                },
                LiteralMapEntry {
                    key: "q".into(),
                    value: literal(LiteralValue::Undefined),
                    quoted: true,
                },
            ],
        });
        assert_eq!(
            print(&map),
            "{plain: true, 'needs-quotes': null, 'q': undefined}"
        );
    }

    #[test]
    fn test_arrow_object_body_and_statement_wrapping() {
        let arrow = arrow_fn(
            &["t"],
            ArrowFunctionBody::Expression(Box::new(literal_map(vec![("a", variable("t"))]))),
        );
        assert_eq!(print(&arrow), "(t) => ({a: t})");

        let mut printer = Printer::default();
        let stmt = literal_map(vec![("a", literal_num(1.0))]).to_stmt();
        assert_eq!(printer.print_statement(&stmt).unwrap(), "({a: 1});");
    }

    #[test]
    fn test_statements() {
        let mut printer = Printer::default();
        let stmt = Statement::If(IfStmt {
            condition: variable("rf").binary(BinaryOperator::BitwiseAnd, literal_num(1.0)),
            true_case: vec![variable("go").call_fn(vec![]).to_stmt()],
            false_case: vec![Statement::Return(ReturnStatement { value: null_expr() })],
        });
        assert_eq!(
            printer.print_statement(&stmt).unwrap(),
            "if ((rf & 1)) {\ngo();\n} else {\nreturn null;\n}"
        );
        assert_eq!(
            printer
                .print_statement(&literal_arr(vec![]).to_declare_const("_c0"))
                .unwrap(),
            "const _c0 = [];"
        );
    }
}
