//! Token definitions for the `.treaty` region lexer.
//!
//! A token classifies one contiguous region of the document. Spans are byte
//! offsets into the original source and always cover the region's delimiters
//! (`<style>`, `{{ }}`, directive headers); payloads carry the region content.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Token {
    pub kind: TokenKind,
    pub payload: String,
    pub start: usize,
    pub end: usize,
}

impl Token {
    pub fn new(kind: TokenKind, payload: impl Into<String>, start: usize, end: usize) -> Self {
        Token {
            kind,
            payload: payload.into(),
            start,
            end,
        }
    }

    pub fn eof(at: usize) -> Self {
        Token::new(TokenKind::Eof, String::new(), at, at)
    }

    pub fn is_eof(&self) -> bool {
        self.kind == TokenKind::Eof
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "variant", rename_all = "camelCase")]
pub enum TokenKind {
    Script,
    Markup,
    Style,
    TemplateExpression,
    ControlFlow(ControlFlowKind),
    Defer(DeferKind),
    Eof,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ControlFlowKind {
    If,
    ElseIf,
    Else,
    For,
    Empty,
    Switch,
    Case,
    Default,
    /// The `}` that closes a directive block.
    BlockClose,
}

impl ControlFlowKind {
    pub fn directive(self) -> &'static str {
        match self {
            ControlFlowKind::If => "@if",
            ControlFlowKind::ElseIf => "@else if",
            ControlFlowKind::Else => "@else",
            ControlFlowKind::For => "@for",
            ControlFlowKind::Empty => "@empty",
            ControlFlowKind::Switch => "@switch",
            ControlFlowKind::Case => "@case",
            ControlFlowKind::Default => "@default",
            ControlFlowKind::BlockClose => "}",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DeferKind {
    Defer,
    Placeholder,
    Loading,
    Error,
}

impl DeferKind {
    pub fn directive(self) -> &'static str {
        match self {
            DeferKind::Defer => "@defer",
            DeferKind::Placeholder => "@placeholder",
            DeferKind::Loading => "@loading",
            DeferKind::Error => "@error",
        }
    }
}

/// Keyword table for `@` directives, ordered longest first so that the first
/// hit is the longest prefix (`else if` before `else`).
pub const DIRECTIVE_KEYWORDS: &[(&str, TokenKind)] = &[
    ("placeholder", TokenKind::Defer(DeferKind::Placeholder)),
    ("default", TokenKind::ControlFlow(ControlFlowKind::Default)),
    ("else if", TokenKind::ControlFlow(ControlFlowKind::ElseIf)),
    ("loading", TokenKind::Defer(DeferKind::Loading)),
    ("switch", TokenKind::ControlFlow(ControlFlowKind::Switch)),
    ("defer", TokenKind::Defer(DeferKind::Defer)),
    ("empty", TokenKind::ControlFlow(ControlFlowKind::Empty)),
    ("error", TokenKind::Defer(DeferKind::Error)),
    ("case", TokenKind::ControlFlow(ControlFlowKind::Case)),
    ("else", TokenKind::ControlFlow(ControlFlowKind::Else)),
    ("for", TokenKind::ControlFlow(ControlFlowKind::For)),
    ("if", TokenKind::ControlFlow(ControlFlowKind::If)),
];

/// Match a directive keyword at the start of `rest` (the text right after `@`).
/// Returns the keyword length and its token kind.
/// A space inside a keyword matches any non-empty run of ASCII whitespace.
pub fn match_directive(rest: &[u8]) -> Option<(usize, TokenKind)> {
    DIRECTIVE_KEYWORDS
        .iter()
        .find_map(|(keyword, kind)| match_keyword(rest, keyword).map(|len| (len, *kind)))
}

fn match_keyword(rest: &[u8], keyword: &str) -> Option<usize> {
    let mut pos = 0;
    for (i, word) in keyword.split(' ').enumerate() {
        if i > 0 {
            let gap = rest[pos..].iter().take_while(|b| b.is_ascii_whitespace()).count();
            if gap == 0 {
                return None;
            }
            pos += gap;
        }
        if !rest[pos..].starts_with(word.as_bytes()) {
            return None;
        }
        pos += word.len();
    }
    let boundary = rest
        .get(pos)
        .map_or(true, |b| !(b.is_ascii_alphanumeric() || *b == b'_' || *b == b'$'));
    boundary.then_some(pos)
}
