//! Token stream to flat AST.
//!
//! The parser keeps one node per token and never merges. Directive tokens are
//! re-synthesized into literal directive text (`@if (cond) {`, `@else {`, `}`)
//! so every markup-kind node can be concatenated verbatim downstream.

use serde::{Deserialize, Serialize};

use crate::token::{ControlFlowKind, Token, TokenKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NodeKind {
    Script,
    Markup,
    Style,
    TemplateExpression,
    /// Control-flow and defer directives, already rendered as literal text.
    ControlFlow,
}

impl NodeKind {
    /// Nodes that belong to the template string.
    pub fn is_markup_kind(self) -> bool {
        matches!(
            self,
            NodeKind::Markup | NodeKind::ControlFlow | NodeKind::TemplateExpression
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AstNode {
    pub kind: NodeKind,
    pub value: String,
    pub start: usize,
    pub end: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ast {
    pub nodes: Vec<AstNode>,
}

impl Ast {
    pub fn of_kind(&self, kind: NodeKind) -> impl Iterator<Item = &AstNode> {
        self.nodes.iter().filter(move |n| n.kind == kind)
    }

    /// Script payloads in source order, one segment per line.
    pub fn script_text(&self) -> String {
        let mut text = String::new();
        for node in self.of_kind(NodeKind::Script) {
            text.push_str(&node.value);
            if !node.value.ends_with('\n') {
                text.push('\n');
            }
        }
        text
    }
}

pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Parser { tokens, pos: 0 }
    }

    pub fn parse(mut self) -> Ast {
        let mut nodes = Vec::with_capacity(self.tokens.len());
        while let Some(token) = self.advance() {
            nodes.push(parse_node(token));
        }
        Ast { nodes }
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos)?;
        if token.is_eof() {
            return None;
        }
        self.pos += 1;
        Some(token.clone())
    }
}

fn parse_node(token: Token) -> AstNode {
    let (kind, value) = match token.kind {
        TokenKind::Script => (NodeKind::Script, token.payload),
        TokenKind::Markup => (NodeKind::Markup, token.payload),
        TokenKind::Style => (NodeKind::Style, token.payload),
        TokenKind::TemplateExpression => (NodeKind::TemplateExpression, token.payload),
        TokenKind::ControlFlow(ControlFlowKind::BlockClose) => {
            (NodeKind::ControlFlow, "}".to_string())
        }
        TokenKind::ControlFlow(kind) => (
            NodeKind::ControlFlow,
            synthesize_directive(kind.directive(), &token.payload),
        ),
        TokenKind::Defer(kind) => (
            NodeKind::ControlFlow,
            synthesize_directive(kind.directive(), &token.payload),
        ),
        // advance() stops at the sentinel
        TokenKind::Eof => (NodeKind::Script, String::new()),
    };
    AstNode {
        kind,
        value,
        start: token.start,
        end: token.end,
    }
}

fn synthesize_directive(directive: &str, header: &str) -> String {
    format!("{} {}", directive, header).trim().to_string()
}

pub fn parse(tokens: Vec<Token>) -> Ast {
    Parser::new(tokens).parse()
}
