//! Output expression and statement tree.
//!
//! This is the node-kind set a host compiler hands back for a component
//! definition. Both enums are closed; every consumer dispatches through
//! [`Expression::visit_expression`] / [`Statement::visit_statement`], which match
//! exhaustively, so adding a node kind is a compile error until every visitor
//! handles it.

use serde::{Deserialize, Serialize};

use crate::error::PrintError;

// ═══════════════════════════════════════════════════════════════════════════════
// OPERATORS
// ═══════════════════════════════════════════════════════════════════════════════

/// Binary operators, numbered the way the host runtime numbers them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinaryOperator {
    Equals,
    NotEquals,
    Identical,
    NotIdentical,
    Minus,
    Plus,
    Divide,
    Multiply,
    Modulo,
    And,
    Or,
    BitwiseOr,
    BitwiseAnd,
    Lower,
    LowerEquals,
    Bigger,
    BiggerEquals,
    NullishCoalesce,
    Exponentiation,
    In,
}

impl BinaryOperator {
    pub fn from_code(code: u8) -> Result<Self, PrintError> {
        use BinaryOperator::*;
        let op = match code {
            0 => Equals,
            1 => NotEquals,
            2 => Identical,
            3 => NotIdentical,
            4 => Minus,
            5 => Plus,
            6 => Divide,
            7 => Multiply,
            8 => Modulo,
            9 => And,
            10 => Or,
            11 => BitwiseOr,
            12 => BitwiseAnd,
            13 => Lower,
            14 => LowerEquals,
            15 => Bigger,
            16 => BiggerEquals,
            17 => NullishCoalesce,
            18 => Exponentiation,
            19 => In,
            other => return Err(PrintError::UnmappedBinaryOperator(other)),
        };
        Ok(op)
    }

    pub fn token(self) -> &'static str {
        use BinaryOperator::*;
        match self {
            Equals => "==",
            NotEquals => "!=",
            Identical => "===",
            NotIdentical => "!==",
            Minus => "-",
            Plus => "+",
            Divide => "/",
            Multiply => "*",
            Modulo => "%",
            And => "&&",
            Or => "||",
            BitwiseOr => "|",
            BitwiseAnd => "&",
            Lower => "<",
            LowerEquals => "<=",
            Bigger => ">",
            BiggerEquals => ">=",
            NullishCoalesce => "??",
            Exponentiation => "**",
            In => "in",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnaryOperator {
    Minus,
    Plus,
}

impl UnaryOperator {
    pub fn from_code(code: u8) -> Result<Self, PrintError> {
        match code {
            0 => Ok(UnaryOperator::Minus),
            1 => Ok(UnaryOperator::Plus),
            other => Err(PrintError::UnmappedUnaryOperator(other)),
        }
    }

    pub fn token(self) -> &'static str {
        match self {
            UnaryOperator::Minus => "-",
            UnaryOperator::Plus => "+",
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// EXPRESSIONS
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "camelCase")]
pub enum LiteralValue {
    String(String),
    Number(f64),
    Boolean(bool),
    Null,
    Undefined,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadVarExpr {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WriteVarExpr {
    pub name: String,
    pub value: Box<Expression>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadPropExpr {
    pub receiver: Box<Expression>,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WritePropExpr {
    pub receiver: Box<Expression>,
    pub name: String,
    pub value: Box<Expression>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadKeyExpr {
    pub receiver: Box<Expression>,
    pub index: Box<Expression>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WriteKeyExpr {
    pub receiver: Box<Expression>,
    pub index: Box<Expression>,
    pub value: Box<Expression>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvokeFunctionExpr {
    pub callee: Box<Expression>,
    pub args: Vec<Expression>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstantiateExpr {
    pub class_expr: Box<Expression>,
    pub args: Vec<Expression>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiteralExpr {
    pub value: LiteralValue,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiteralArrayExpr {
    pub entries: Vec<Expression>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiteralMapEntry {
    pub key: String,
    pub value: Expression,
    pub quoted: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiteralMapExpr {
    pub entries: Vec<LiteralMapEntry>,
}

impl LiteralMapExpr {
    pub fn has_key(&self, key: &str) -> bool {
        self.entries.iter().any(|e| e.key == key)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionalExpr {
    pub condition: Box<Expression>,
    pub true_case: Box<Expression>,
    pub false_case: Option<Box<Expression>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnaryOperatorExpr {
    pub operator: UnaryOperator,
    pub expr: Box<Expression>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BinaryOperatorExpr {
    pub operator: BinaryOperator,
    pub lhs: Box<Expression>,
    pub rhs: Box<Expression>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotExpr {
    pub condition: Box<Expression>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeofExpr {
    pub expr: Box<Expression>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DynamicImportExpr {
    pub url: String,
}

/// A symbol from an external module. With a module it is reached through the
/// runtime alias; with only a module it is the alias itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalReference {
    pub module_name: Option<String>,
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExternalExpr {
    pub value: ExternalReference,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FnParam {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionExpr {
    pub name: Option<String>,
    pub params: Vec<FnParam>,
    pub statements: Vec<Statement>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "camelCase")]
pub enum ArrowFunctionBody {
    Expression(Box<Expression>),
    Statements(Vec<Statement>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArrowFunctionExpr {
    pub params: Vec<FnParam>,
    pub body: ArrowFunctionBody,
}

/// Source text carried through untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WrappedNodeExpr {
    pub node: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum Expression {
    ReadVar(ReadVarExpr),
    WriteVar(WriteVarExpr),
    ReadProp(ReadPropExpr),
    WriteProp(WritePropExpr),
    ReadKey(ReadKeyExpr),
    WriteKey(WriteKeyExpr),
    InvokeFunction(InvokeFunctionExpr),
    Instantiate(InstantiateExpr),
    Literal(LiteralExpr),
    LiteralArray(LiteralArrayExpr),
    LiteralMap(LiteralMapExpr),
    Conditional(ConditionalExpr),
    UnaryOperator(UnaryOperatorExpr),
    BinaryOp(BinaryOperatorExpr),
    Not(NotExpr),
    Typeof(TypeofExpr),
    DynamicImport(DynamicImportExpr),
    External(ExternalExpr),
    Function(FunctionExpr),
    ArrowFunction(ArrowFunctionExpr),
    WrappedNode(WrappedNodeExpr),
}

// Builders in the spirit of the host's `o.variable(...)` helpers.

pub fn variable(name: impl Into<String>) -> Expression {
    Expression::ReadVar(ReadVarExpr { name: name.into() })
}

pub fn literal(value: LiteralValue) -> Expression {
    Expression::Literal(LiteralExpr { value })
}

pub fn literal_str(value: impl Into<String>) -> Expression {
    literal(LiteralValue::String(value.into()))
}

pub fn literal_bool(value: bool) -> Expression {
    literal(LiteralValue::Boolean(value))
}

pub fn literal_num(value: f64) -> Expression {
    literal(LiteralValue::Number(value))
}

pub fn null_expr() -> Expression {
    literal(LiteralValue::Null)
}

pub fn literal_arr(entries: Vec<Expression>) -> Expression {
    Expression::LiteralArray(LiteralArrayExpr { entries })
}

/// Map with unquoted keys, in the given order.
pub fn literal_map<K: Into<String>>(entries: Vec<(K, Expression)>) -> Expression {
    Expression::LiteralMap(LiteralMapExpr {
        entries: entries
            .into_iter()
            .map(|(key, value)| LiteralMapEntry {
                key: key.into(),
                value,
                quoted: false,
            })
            .collect(),
    })
}

pub fn import_expr(module_name: Option<&str>, name: Option<&str>) -> Expression {
    Expression::External(ExternalExpr {
        value: ExternalReference {
            module_name: module_name.map(str::to_string),
            name: name.map(str::to_string),
        },
    })
}

pub fn fn_expr(params: &[&str], statements: Vec<Statement>, name: Option<&str>) -> Expression {
    Expression::Function(FunctionExpr {
        name: name.map(str::to_string),
        params: params
            .iter()
            .map(|p| FnParam {
                name: p.to_string(),
            })
            .collect(),
        statements,
    })
}

pub fn arrow_fn(params: &[&str], body: ArrowFunctionBody) -> Expression {
    Expression::ArrowFunction(ArrowFunctionExpr {
        params: params
            .iter()
            .map(|p| FnParam {
                name: p.to_string(),
            })
            .collect(),
        body,
    })
}

impl Expression {
    pub fn prop(self, name: impl Into<String>) -> Expression {
        Expression::ReadProp(ReadPropExpr {
            receiver: Box::new(self),
            name: name.into(),
        })
    }

    pub fn key(self, index: Expression) -> Expression {
        Expression::ReadKey(ReadKeyExpr {
            receiver: Box::new(self),
            index: Box::new(index),
        })
    }

    pub fn call_fn(self, args: Vec<Expression>) -> Expression {
        Expression::InvokeFunction(InvokeFunctionExpr {
            callee: Box::new(self),
            args,
        })
    }

    pub fn instantiate(self, args: Vec<Expression>) -> Expression {
        Expression::Instantiate(InstantiateExpr {
            class_expr: Box::new(self),
            args,
        })
    }

    pub fn binary(self, operator: BinaryOperator, rhs: Expression) -> Expression {
        Expression::BinaryOp(BinaryOperatorExpr {
            operator,
            lhs: Box::new(self),
            rhs: Box::new(rhs),
        })
    }

    pub fn conditional(self, true_case: Expression, false_case: Option<Expression>) -> Expression {
        Expression::Conditional(ConditionalExpr {
            condition: Box::new(self),
            true_case: Box::new(true_case),
            false_case: false_case.map(Box::new),
        })
    }

    pub fn not(self) -> Expression {
        Expression::Not(NotExpr {
            condition: Box::new(self),
        })
    }

    pub fn to_stmt(self) -> Statement {
        Statement::Expression(ExpressionStatement { expr: self })
    }

    pub fn to_declare_const(self, name: impl Into<String>) -> Statement {
        Statement::DeclareVar(DeclareVarStmt {
            name: name.into(),
            value: Some(self),
            is_final: true,
        })
    }

    pub fn visit_expression<V: ExpressionVisitor + ?Sized>(
        &self,
        visitor: &mut V,
        context: &V::Context,
    ) -> Result<V::Output, V::Error> {
        match self {
            Expression::ReadVar(e) => visitor.visit_read_var_expr(e, context),
            Expression::WriteVar(e) => visitor.visit_write_var_expr(e, context),
            Expression::ReadProp(e) => visitor.visit_read_prop_expr(e, context),
            Expression::WriteProp(e) => visitor.visit_write_prop_expr(e, context),
            Expression::ReadKey(e) => visitor.visit_read_key_expr(e, context),
            Expression::WriteKey(e) => visitor.visit_write_key_expr(e, context),
            Expression::InvokeFunction(e) => visitor.visit_invoke_function_expr(e, context),
            Expression::Instantiate(e) => visitor.visit_instantiate_expr(e, context),
            Expression::Literal(e) => visitor.visit_literal_expr(e, context),
            Expression::LiteralArray(e) => visitor.visit_literal_array_expr(e, context),
            Expression::LiteralMap(e) => visitor.visit_literal_map_expr(e, context),
            Expression::Conditional(e) => visitor.visit_conditional_expr(e, context),
            Expression::UnaryOperator(e) => visitor.visit_unary_operator_expr(e, context),
            Expression::BinaryOp(e) => visitor.visit_binary_operator_expr(e, context),
            Expression::Not(e) => visitor.visit_not_expr(e, context),
            Expression::Typeof(e) => visitor.visit_typeof_expr(e, context),
            Expression::DynamicImport(e) => visitor.visit_dynamic_import_expr(e, context),
            Expression::External(e) => visitor.visit_external_expr(e, context),
            Expression::Function(e) => visitor.visit_function_expr(e, context),
            Expression::ArrowFunction(e) => visitor.visit_arrow_function_expr(e, context),
            Expression::WrappedNode(e) => visitor.visit_wrapped_node_expr(e, context),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// STATEMENTS
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeclareVarStmt {
    pub name: String,
    pub value: Option<Expression>,
    /// `const` when set, `let` otherwise.
    pub is_final: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeclareFunctionStmt {
    pub name: String,
    pub params: Vec<FnParam>,
    pub statements: Vec<Statement>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpressionStatement {
    pub expr: Expression,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReturnStatement {
    pub value: Expression,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IfStmt {
    pub condition: Expression,
    pub true_case: Vec<Statement>,
    pub false_case: Vec<Statement>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum Statement {
    DeclareVar(DeclareVarStmt),
    DeclareFunction(DeclareFunctionStmt),
    Expression(ExpressionStatement),
    Return(ReturnStatement),
    If(IfStmt),
}

impl Statement {
    pub fn visit_statement<V: StatementVisitor + ?Sized>(
        &self,
        visitor: &mut V,
        context: &V::Context,
    ) -> Result<V::Output, V::Error> {
        match self {
            Statement::DeclareVar(s) => visitor.visit_declare_var_stmt(s, context),
            Statement::DeclareFunction(s) => visitor.visit_declare_function_stmt(s, context),
            Statement::Expression(s) => visitor.visit_expression_stmt(s, context),
            Statement::Return(s) => visitor.visit_return_stmt(s, context),
            Statement::If(s) => visitor.visit_if_stmt(s, context),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// VISITORS
// ═══════════════════════════════════════════════════════════════════════════════

pub trait ExpressionVisitor {
    type Context;
    type Output;
    type Error;

    fn visit_read_var_expr(&mut self, expr: &ReadVarExpr, context: &Self::Context) -> Result<Self::Output, Self::Error>;
    fn visit_write_var_expr(&mut self, expr: &WriteVarExpr, context: &Self::Context) -> Result<Self::Output, Self::Error>;
    fn visit_read_prop_expr(&mut self, expr: &ReadPropExpr, context: &Self::Context) -> Result<Self::Output, Self::Error>;
    fn visit_write_prop_expr(&mut self, expr: &WritePropExpr, context: &Self::Context) -> Result<Self::Output, Self::Error>;
    fn visit_read_key_expr(&mut self, expr: &ReadKeyExpr, context: &Self::Context) -> Result<Self::Output, Self::Error>;
    fn visit_write_key_expr(&mut self, expr: &WriteKeyExpr, context: &Self::Context) -> Result<Self::Output, Self::Error>;
    fn visit_invoke_function_expr(&mut self, expr: &InvokeFunctionExpr, context: &Self::Context) -> Result<Self::Output, Self::Error>;
    fn visit_instantiate_expr(&mut self, expr: &InstantiateExpr, context: &Self::Context) -> Result<Self::Output, Self::Error>;
    fn visit_literal_expr(&mut self, expr: &LiteralExpr, context: &Self::Context) -> Result<Self::Output, Self::Error>;
    fn visit_literal_array_expr(&mut self, expr: &LiteralArrayExpr, context: &Self::Context) -> Result<Self::Output, Self::Error>;
    fn visit_literal_map_expr(&mut self, expr: &LiteralMapExpr, context: &Self::Context) -> Result<Self::Output, Self::Error>;
    fn visit_conditional_expr(&mut self, expr: &ConditionalExpr, context: &Self::Context) -> Result<Self::Output, Self::Error>;
    fn visit_unary_operator_expr(&mut self, expr: &UnaryOperatorExpr, context: &Self::Context) -> Result<Self::Output, Self::Error>;
    fn visit_binary_operator_expr(&mut self, expr: &BinaryOperatorExpr, context: &Self::Context) -> Result<Self::Output, Self::Error>;
    fn visit_not_expr(&mut self, expr: &NotExpr, context: &Self::Context) -> Result<Self::Output, Self::Error>;
    fn visit_typeof_expr(&mut self, expr: &TypeofExpr, context: &Self::Context) -> Result<Self::Output, Self::Error>;
    fn visit_dynamic_import_expr(&mut self, expr: &DynamicImportExpr, context: &Self::Context) -> Result<Self::Output, Self::Error>;
    fn visit_external_expr(&mut self, expr: &ExternalExpr, context: &Self::Context) -> Result<Self::Output, Self::Error>;
    fn visit_function_expr(&mut self, expr: &FunctionExpr, context: &Self::Context) -> Result<Self::Output, Self::Error>;
    fn visit_arrow_function_expr(&mut self, expr: &ArrowFunctionExpr, context: &Self::Context) -> Result<Self::Output, Self::Error>;
    fn visit_wrapped_node_expr(&mut self, expr: &WrappedNodeExpr, context: &Self::Context) -> Result<Self::Output, Self::Error>;
}

pub trait StatementVisitor {
    type Context;
    type Output;
    type Error;

    fn visit_declare_var_stmt(&mut self, stmt: &DeclareVarStmt, context: &Self::Context) -> Result<Self::Output, Self::Error>;
    fn visit_declare_function_stmt(&mut self, stmt: &DeclareFunctionStmt, context: &Self::Context) -> Result<Self::Output, Self::Error>;
    fn visit_expression_stmt(&mut self, stmt: &ExpressionStatement, context: &Self::Context) -> Result<Self::Output, Self::Error>;
    fn visit_return_stmt(&mut self, stmt: &ReturnStatement, context: &Self::Context) -> Result<Self::Output, Self::Error>;
    fn visit_if_stmt(&mut self, stmt: &IfStmt, context: &Self::Context) -> Result<Self::Output, Self::Error>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operator_codes() {
        assert_eq!(BinaryOperator::from_code(2).unwrap(), BinaryOperator::Identical);
        assert_eq!(BinaryOperator::from_code(17).unwrap().token(), "??");
        assert!(matches!(
            BinaryOperator::from_code(42),
            Err(PrintError::UnmappedBinaryOperator(42))
        ));
        assert_eq!(UnaryOperator::from_code(0).unwrap(), UnaryOperator::Minus);
        assert!(UnaryOperator::from_code(9).is_err());
    }

    #[test]
    fn test_tree_survives_json() {
        let expr = variable("a")
            .prop("b")
            .call_fn(vec![literal_str("x"), literal_num(1.5)])
            .conditional(null_expr(), None);
        let json = serde_json::to_string(&expr).unwrap();
        let back: Expression = serde_json::from_str(&json).unwrap();
        assert_eq!(back, expr);
    }
}
