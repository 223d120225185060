//! Printer output checked against a real JavaScript parser.
//!
//! Each case prints a hand-built tree, then parses both the printed text and a
//! hand-written equivalent with `oxc` and compares the regenerated code. Equal
//! output means the two parse to the same tree, so operator grouping and
//! statement boundaries survived printing.

use oxc_allocator::Allocator;
use oxc_codegen::Codegen;
use oxc_parser::{ParseOptions, Parser};
use oxc_span::SourceType;

use crate::output_ast::*;
use crate::printer::Printer;

fn normalize(js: &str) -> String {
    let allocator = Allocator::default();
    let source_type = SourceType::default().with_module(true);
    let ret = Parser::new(&allocator, js, source_type)
        .with_options(ParseOptions {
            preserve_parens: false,
            allow_return_outside_function: true,
            ..ParseOptions::default()
        })
        .parse();
    assert!(
        ret.errors.is_empty() && !ret.panicked,
        "printed code did not parse: {}\n{:?}",
        js,
        ret.errors
    );
    Codegen::new().build(&ret.program).code
}

fn assert_expression(expr: Expression, expected: &str) {
    let printed = Printer::default().print_expression(&expr).unwrap();
    assert_eq!(
        normalize(&format!("x = {};", printed)),
        normalize(&format!("x = {};", expected)),
        "printed: {}",
        printed
    );
}

fn assert_statements(statements: Vec<Statement>, expected: &str) {
    let printed = Printer::default().print_statements(&statements).unwrap();
    assert_eq!(normalize(&printed), normalize(expected), "printed: {}", printed);
}

fn bin(lhs: Expression, op: BinaryOperator, rhs: Expression) -> Expression {
    lhs.binary(op, rhs)
}

#[test]
fn test_binary_grouping_survives() {
    use BinaryOperator::*;
    let (a, b, c) = (variable("a"), variable("b"), variable("c"));
    assert_expression(
        bin(bin(a.clone(), Plus, b.clone()), Multiply, c.clone()),
        "(a + b) * c",
    );
    assert_expression(
        bin(a.clone(), Minus, bin(b.clone(), Minus, c.clone())),
        "a - (b - c)",
    );
    assert_expression(
        bin(bin(a.clone(), Or, b.clone()), NullishCoalesce, c.clone()),
        "(a || b) ?? c",
    );
    assert_expression(
        bin(bin(a, Exponentiation, b), Identical, c),
        "a ** b === c",
    );
}

#[test]
fn test_unary_left_operand_of_exponentiation() {
    let negated = variable("a").not().binary(BinaryOperator::Exponentiation, variable("b"));
    assert_eq!(Printer::default().print_expression(&negated).unwrap(), "((!a) ** b)");
    assert_expression(negated, "(!a) ** b");

    let type_of = Expression::Typeof(TypeofExpr {
        expr: Box::new(variable("a")),
    })
    .binary(BinaryOperator::Exponentiation, literal_num(2.0));
    assert_expression(type_of, "(typeof a) ** 2");

    let right = variable("b").binary(BinaryOperator::Exponentiation, variable("a").not());
    assert_expression(right, "b ** !a");
}

#[test]
fn test_nested_conditional_in_condition() {
    let inner = variable("a").conditional(variable("b"), Some(variable("c")));
    assert_expression(
        inner.conditional(variable("d"), Some(variable("e"))),
        "(a ? b : c) ? d : e",
    );
}

#[test]
fn test_unary_not_and_typeof_operands() {
    let negated = Expression::UnaryOperator(UnaryOperatorExpr {
        operator: UnaryOperator::Minus,
        expr: Box::new(literal_num(-1.0)),
    });
    assert_expression(negated, "-(-1)");

    let check = Expression::Typeof(TypeofExpr {
        expr: Box::new(variable("a").prop("b")),
    })
    .binary(BinaryOperator::Identical, literal_str("string"))
    .not();
    assert_expression(check, "!(typeof a.b === 'string')");
}

#[test]
fn test_writes_are_grouped_inside_expressions() {
    let write = Expression::WriteVar(WriteVarExpr {
        name: "count".into(),
        value: Box::new(variable("count").binary(BinaryOperator::Plus, literal_num(1.0))),
    });
    assert_expression(variable("log").call_fn(vec![write.clone()]), "log(count = count + 1)");
    assert_statements(vec![write.to_stmt()], "count = count + 1;");

    let key_write = Expression::WriteKey(WriteKeyExpr {
        receiver: Box::new(variable("cache")),
        index: Box::new(literal_str("k")),
        value: Box::new(null_expr()),
    });
    assert_expression(key_write.prop("length"), "(cache['k'] = null).length");
}

#[test]
fn test_functions_as_callees_and_bodies() {
    let iife = arrow_fn(&[], ArrowFunctionBody::Expression(Box::new(literal_num(1.0)))).call_fn(vec![]);
    assert_expression(iife, "(() => 1)()");

    let object_body = arrow_fn(
        &["v"],
        ArrowFunctionBody::Expression(Box::new(literal_map(vec![("v", variable("v"))]))),
    );
    assert_expression(object_body, "(v) => ({v: v})");

    let factory = fn_expr(
        &["t"],
        vec![Statement::Return(ReturnStatement {
            value: variable("t").binary(BinaryOperator::Or, variable("Cmp")).call_fn(vec![]),
        })],
        Some("Cmp_Factory"),
    );
    assert_statements(
        vec![factory.to_stmt()],
        "(function Cmp_Factory(t) { return (t || Cmp)(); });",
    );
}

#[test]
fn test_instantiate_and_external_references() {
    let created = import_expr(Some("@angular/core"), Some("EventEmitter")).instantiate(vec![literal_bool(true)]);
    assert_expression(created, "new i0.EventEmitter(true)");

    let computed_ctor = variable("registry")
        .call_fn(vec![literal_str("Row")])
        .instantiate(vec![]);
    assert_expression(computed_ctor, "new (registry('Row'))()");

    assert_expression(
        Expression::DynamicImport(DynamicImportExpr {
            url: "./lazy.js".into(),
        })
        .prop("then")
        .call_fn(vec![variable("load")]),
        "import('./lazy.js').then(load)",
    );
}

#[test]
fn test_literal_map_keys_and_numbers() {
    let map = literal_map(vec![
        ("plain", literal_num(1.5)),
        ("needs-quotes", literal_arr(vec![literal_num(2.0), literal(LiteralValue::Undefined)])),
    ]);
    assert_expression(map, "{plain: 1.5, 'needs-quotes': [2, undefined]}");
    assert_expression(literal_num(3.0).prop("toFixed").call_fn(vec![]), "(3).toFixed()");
}

#[test]
fn test_if_and_declarations() {
    let stmt = Statement::If(IfStmt {
        condition: variable("ready").not(),
        true_case: vec![Statement::Return(ReturnStatement { value: null_expr() })],
        false_case: vec![variable("start").call_fn(vec![]).to_stmt()],
    });
    assert_statements(
        vec![
            literal_arr(vec![literal_str("a")]).to_declare_const("_c0"),
            Statement::DeclareVar(DeclareVarStmt {
                name: "n".into(),
                value: None,
                is_final: false,
            }),
            stmt,
        ],
        "const _c0 = ['a'];\nlet n;\nif (!ready) { return null; } else { start(); }",
    );
}
