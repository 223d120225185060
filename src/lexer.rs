//! Region lexer for `.treaty` documents.
//!
//! The lexer is an explicit finite-state machine. `Default` is the floor of an
//! array-backed state stack; entering a region pushes its state and finishing
//! the region pops it, so the outer state resumes exactly where it left off.
//!
//! ## Degradation
//!
//! Malformed input never raises. An unmatched quote, tag, brace or marker makes
//! the current region run to end-of-input; the accumulated text is returned as a
//! best-effort token and a [`LexDiagnostic`] is recorded.

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::warn;

use crate::token::{match_directive, ControlFlowKind, Token, TokenKind};

/// HTML elements that never take a closing tag.
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

fn is_void_element(name: &str) -> bool {
    VOID_ELEMENTS.iter().any(|v| v.eq_ignore_ascii_case(name))
}

fn is_tag_name_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.' | b':')
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LexerState {
    Default,
    Script,
    Markup,
    Style,
    TemplateExpression,
    ControlFlow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LexDiagnosticKind {
    UnterminatedString,
    UnterminatedComment,
    UnterminatedTag,
    UnclosedElement,
    UnterminatedStyle,
    UnterminatedInterpolation,
    UnbalancedParens,
    UnclosedBlock,
}

/// A best-effort degradation recorded while lexing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LexDiagnostic {
    pub kind: LexDiagnosticKind,
    /// Byte offset where the unterminated construct starts.
    pub offset: usize,
    pub message: String,
}

impl fmt::Display for LexDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (at byte {})", self.message, self.offset)
    }
}

#[derive(Debug, Clone, Default)]
pub struct LexOutput {
    pub tokens: Vec<Token>,
    pub diagnostics: Vec<LexDiagnostic>,
}

pub struct Lexer<'a> {
    input: &'a str,
    bytes: &'a [u8],
    pos: usize,
    stack: Vec<LexerState>,
    /// Number of directive blocks (`@if (..) {`) currently open.
    block_depth: usize,
    diagnostics: Vec<LexDiagnostic>,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Lexer {
            input,
            bytes: input.as_bytes(),
            pos: 0,
            stack: vec![LexerState::Default],
            block_depth: 0,
            diagnostics: Vec::new(),
        }
    }

    pub fn state(&self) -> LexerState {
        self.stack.last().copied().unwrap_or(LexerState::Default)
    }

    pub fn state_stack(&self) -> &[LexerState] {
        &self.stack
    }

    /// True when only the `Default` floor remains on the stack.
    pub fn is_at_rest(&self) -> bool {
        self.stack.as_slice() == [LexerState::Default]
    }

    pub fn diagnostics(&self) -> &[LexDiagnostic] {
        &self.diagnostics
    }

    /// Lex the whole document. The last token is always the EOF sentinel.
    pub fn tokenize(mut self) -> LexOutput {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token();
            let done = token.is_eof();
            tokens.push(token);
            if done {
                break;
            }
        }
        LexOutput {
            tokens,
            diagnostics: self.diagnostics,
        }
    }

    pub fn next_token(&mut self) -> Token {
        loop {
            match self.state() {
                LexerState::Default => {
                    self.skip_whitespace();
                    if self.at_end() {
                        if self.block_depth > 0 {
                            let depth = self.block_depth;
                            self.block_depth = 0;
                            self.diagnose(
                                LexDiagnosticKind::UnclosedBlock,
                                self.input.len(),
                                format!("{} directive block(s) left open", depth),
                            );
                        }
                        return Token::eof(self.input.len());
                    }
                    let next = self.dispatch_default();
                    self.push_state(next);
                }
                LexerState::Script => return self.lex_script(),
                LexerState::Markup => return self.lex_markup(),
                LexerState::Style => return self.lex_style(),
                LexerState::TemplateExpression => return self.lex_template_expression(),
                LexerState::ControlFlow => {
                    if let Some(token) = self.lex_control_flow() {
                        return token;
                    }
                    // Not a directive: rescan the same position as script.
                    self.replace_state(LexerState::Script);
                }
            }
        }
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // STATE TRANSITIONS
    // ═══════════════════════════════════════════════════════════════════════════

    fn dispatch_default(&self) -> LexerState {
        let b = self.bytes[self.pos];
        if self.at_style_opener() {
            LexerState::Style
        } else if b == b'<' {
            LexerState::Markup
        } else if self.starts_with("{{") {
            LexerState::TemplateExpression
        } else if b == b'@' || (b == b'}' && self.block_depth > 0) {
            LexerState::ControlFlow
        } else if self.block_depth > 0 {
            LexerState::Markup
        } else {
            LexerState::Script
        }
    }

    fn push_state(&mut self, state: LexerState) {
        self.stack.push(state);
    }

    fn pop_state(&mut self) {
        if self.stack.len() > 1 {
            self.stack.pop();
        }
    }

    fn replace_state(&mut self, state: LexerState) {
        self.pop_state();
        self.push_state(state);
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // REGIONS
    // ═══════════════════════════════════════════════════════════════════════════

    fn lex_script(&mut self) -> Token {
        let start = self.pos;
        while !self.at_end() {
            let b = self.bytes[self.pos];
            match b {
                b'\'' | b'"' => self.consume_string(b),
                b'`' => self.consume_template_literal(),
                b'/' if self.peek_at(1) == Some(b'/') => self.consume_line_comment(),
                b'/' if self.peek_at(1) == Some(b'*') => self.consume_block_comment(),
                b'\n' | b';' => {
                    self.pos += 1;
                    break;
                }
                b'\r' => {
                    self.pos += 1;
                    if self.peek() == Some(b'\n') {
                        self.pos += 1;
                    }
                    break;
                }
                _ if self.pos > start && self.at_script_boundary() => break,
                _ => self.pos += 1,
            }
        }
        self.pop_state();
        self.token(TokenKind::Script, start)
    }

    fn lex_markup(&mut self) -> Token {
        let start = self.pos;
        if self.at_tag_start() || self.starts_with("</") || self.starts_with("<!--") {
            self.scan_element_tree();
        } else {
            self.scan_text_run();
        }
        self.pop_state();
        self.token(TokenKind::Markup, start)
    }

    fn lex_style(&mut self) -> Token {
        let start = self.pos;
        self.pos += "<style".len();
        self.consume_tag_attributes(start);
        let content_start = self.pos;
        let mut content_end = None;
        while !self.at_end() {
            if self.starts_with_ignore_case("</style") {
                content_end = Some(self.pos);
                self.skip_past(b'>');
                break;
            }
            if self.starts_with("/*") {
                self.consume_block_comment();
            } else {
                self.pos += 1;
            }
        }
        let content_end = match content_end {
            Some(end) => end,
            None => {
                self.diagnose(
                    LexDiagnosticKind::UnterminatedStyle,
                    start,
                    "style block is missing </style>".to_string(),
                );
                self.input.len()
            }
        };
        self.pop_state();
        Token::new(
            TokenKind::Style,
            &self.input[content_start..content_end],
            start,
            self.pos,
        )
    }

    fn lex_template_expression(&mut self) -> Token {
        let start = self.pos;
        self.pos += 2;
        let inner_start = self.pos;
        let inner_end = self.scan_interpolation_body(start);
        self.pop_state();
        Token::new(
            TokenKind::TemplateExpression,
            self.input[inner_start..inner_end].trim(),
            start,
            self.pos,
        )
    }

    fn lex_control_flow(&mut self) -> Option<Token> {
        let start = self.pos;
        if self.bytes[start] == b'}' {
            self.pos += 1;
            self.block_depth = self.block_depth.saturating_sub(1);
            self.pop_state();
            return Some(Token::new(
                TokenKind::ControlFlow(ControlFlowKind::BlockClose),
                "}",
                start,
                self.pos,
            ));
        }

        let (keyword_len, kind) = match_directive(&self.bytes[start + 1..])?;
        self.pos = start + 1 + keyword_len;
        let header_start = self.pos;
        let mut header_end = self.pos;

        self.skip_whitespace();
        if self.peek() == Some(b'(') {
            self.consume_parens();
            header_end = self.pos;
            self.skip_whitespace();
        }
        if self.peek() == Some(b'{') {
            self.pos += 1;
            header_end = self.pos;
            self.block_depth += 1;
        }
        self.pos = header_end;
        self.pop_state();

        Some(Token::new(
            kind,
            self.input[header_start..header_end].trim(),
            start,
            header_end,
        ))
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // MARKUP SCANNING
    // ═══════════════════════════════════════════════════════════════════════════

    fn scan_element_tree(&mut self) {
        let mut open_tags: Vec<String> = Vec::new();
        loop {
            if self.at_end() {
                if let Some(open) = open_tags.last() {
                    let message = format!("element <{}> is never closed", open);
                    self.diagnose(LexDiagnosticKind::UnclosedElement, self.input.len(), message);
                }
                break;
            }
            if self.starts_with("<!--") {
                self.consume_html_comment();
                if open_tags.is_empty() {
                    break;
                }
                continue;
            }
            if self.starts_with("</") {
                self.pos += 2;
                let name = self.consume_tag_name();
                self.skip_past(b'>');
                if let Some(idx) = open_tags
                    .iter()
                    .rposition(|open| open.eq_ignore_ascii_case(&name))
                {
                    open_tags.truncate(idx);
                }
                if open_tags.is_empty() {
                    break;
                }
                continue;
            }
            if self.at_tag_start() {
                let tag_start = self.pos;
                self.pos += 1;
                let name = self.consume_tag_name();
                let self_closing = self.consume_tag_attributes(tag_start);
                if !self_closing && !is_void_element(&name) {
                    open_tags.push(name);
                }
                if open_tags.is_empty() {
                    break;
                }
                continue;
            }
            if self.starts_with("{{") {
                if open_tags.is_empty() {
                    break;
                }
                let open = self.pos;
                self.pos += 2;
                self.scan_interpolation_body(open);
                continue;
            }
            self.pos += 1;
        }
    }

    /// Plain text inside a directive block, or a stray `<` at the top level.
    fn scan_text_run(&mut self) {
        self.pos += 1;
        while !self.at_end() {
            let b = self.bytes[self.pos];
            let stop = b == b'<'
                || self.starts_with("{{")
                || (b == b'@' && match_directive(&self.bytes[self.pos + 1..]).is_some())
                || (b == b'}' && self.block_depth > 0)
                || (b == b'\n' && self.block_depth == 0);
            if stop {
                break;
            }
            self.pos += 1;
        }
    }

    /// Consume attributes up to and including `>`. Returns true for `/>`.
    fn consume_tag_attributes(&mut self, tag_start: usize) -> bool {
        while !self.at_end() {
            match self.bytes[self.pos] {
                b'>' => {
                    self.pos += 1;
                    return false;
                }
                b'/' if self.peek_at(1) == Some(b'>') => {
                    self.pos += 2;
                    return true;
                }
                quote @ (b'"' | b'\'') => {
                    self.pos += 1;
                    while !self.at_end() && self.bytes[self.pos] != quote {
                        self.pos += 1;
                    }
                    self.advance_by(1);
                }
                _ => self.pos += 1,
            }
        }
        self.diagnose(
            LexDiagnosticKind::UnterminatedTag,
            tag_start,
            "tag is missing its closing '>'".to_string(),
        );
        false
    }

    fn consume_tag_name(&mut self) -> String {
        let start = self.pos;
        while !self.at_end() && is_tag_name_byte(self.bytes[self.pos]) {
            self.pos += 1;
        }
        self.input[start..self.pos].to_string()
    }

    fn consume_html_comment(&mut self) {
        let start = self.pos;
        self.pos += 4;
        match self.input[self.pos..].find("-->") {
            Some(rel) => self.pos += rel + 3,
            None => {
                self.pos = self.input.len();
                self.diagnose(
                    LexDiagnosticKind::UnterminatedComment,
                    start,
                    "HTML comment is missing '-->'".to_string(),
                );
            }
        }
    }

    /// Scan from just after `{{` to just past the matching `}}`.
    /// Returns the end offset of the expression body.
    fn scan_interpolation_body(&mut self, open: usize) -> usize {
        let mut depth = 0usize;
        while !self.at_end() {
            match self.bytes[self.pos] {
                b'\'' | b'"' => self.consume_string(self.bytes[self.pos]),
                b'`' => self.consume_template_literal(),
                b'{' => {
                    depth += 1;
                    self.pos += 1;
                }
                b'}' if depth == 0 && self.peek_at(1) == Some(b'}') => {
                    let end = self.pos;
                    self.pos += 2;
                    return end;
                }
                b'}' => {
                    depth = depth.saturating_sub(1);
                    self.pos += 1;
                }
                _ => self.pos += 1,
            }
        }
        self.diagnose(
            LexDiagnosticKind::UnterminatedInterpolation,
            open,
            "interpolation is missing '}}'".to_string(),
        );
        self.input.len()
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // ATOMIC SCRIPT CONSTRUCTS
    // ═══════════════════════════════════════════════════════════════════════════

    fn consume_string(&mut self, quote: u8) {
        let start = self.pos;
        self.pos += 1;
        while !self.at_end() {
            match self.bytes[self.pos] {
                b'\\' => self.advance_by(2),
                b if b == quote => {
                    self.pos += 1;
                    return;
                }
                _ => self.pos += 1,
            }
        }
        self.diagnose(
            LexDiagnosticKind::UnterminatedString,
            start,
            "string literal is never closed".to_string(),
        );
    }

    fn consume_template_literal(&mut self) {
        let start = self.pos;
        self.pos += 1;
        while !self.at_end() {
            match self.bytes[self.pos] {
                b'\\' => self.advance_by(2),
                b'`' => {
                    self.pos += 1;
                    return;
                }
                b'$' if self.peek_at(1) == Some(b'{') => {
                    self.pos += 2;
                    self.consume_substitution();
                }
                _ => self.pos += 1,
            }
        }
        self.diagnose(
            LexDiagnosticKind::UnterminatedString,
            start,
            "template literal is never closed".to_string(),
        );
    }

    /// Body of a `${ ... }` substitution, up to and including its `}`.
    fn consume_substitution(&mut self) {
        let mut depth = 1usize;
        while !self.at_end() {
            match self.bytes[self.pos] {
                b'\'' | b'"' => self.consume_string(self.bytes[self.pos]),
                b'`' => self.consume_template_literal(),
                b'{' => {
                    depth += 1;
                    self.pos += 1;
                }
                b'}' => {
                    depth -= 1;
                    self.pos += 1;
                    if depth == 0 {
                        return;
                    }
                }
                _ => self.pos += 1,
            }
        }
    }

    fn consume_line_comment(&mut self) {
        while !self.at_end() && self.bytes[self.pos] != b'\n' {
            self.pos += 1;
        }
    }

    fn consume_block_comment(&mut self) {
        let start = self.pos;
        self.pos += 2;
        match self.input[self.pos..].find("*/") {
            Some(rel) => self.pos += rel + 2,
            None => {
                self.pos = self.input.len();
                self.diagnose(
                    LexDiagnosticKind::UnterminatedComment,
                    start,
                    "block comment is missing '*/'".to_string(),
                );
            }
        }
    }

    fn consume_parens(&mut self) {
        let start = self.pos;
        let mut depth = 0usize;
        while !self.at_end() {
            match self.bytes[self.pos] {
                b'\'' | b'"' => self.consume_string(self.bytes[self.pos]),
                b'`' => self.consume_template_literal(),
                b'(' => {
                    depth += 1;
                    self.pos += 1;
                }
                b')' => {
                    depth -= 1;
                    self.pos += 1;
                    if depth == 0 {
                        return;
                    }
                }
                _ => self.pos += 1,
            }
        }
        self.diagnose(
            LexDiagnosticKind::UnbalancedParens,
            start,
            "directive parameters are missing ')'".to_string(),
        );
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // CURSOR HELPERS
    // ═══════════════════════════════════════════════════════════════════════════

    fn token(&self, kind: TokenKind, start: usize) -> Token {
        Token::new(kind, &self.input[start..self.pos], start, self.pos)
    }

    fn diagnose(&mut self, kind: LexDiagnosticKind, offset: usize, message: String) {
        warn!(offset, kind = ?kind, "{}", message);
        self.diagnostics.push(LexDiagnostic {
            kind,
            offset,
            message,
        });
    }

    fn at_end(&self) -> bool {
        self.pos >= self.bytes.len()
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.bytes.get(self.pos + offset).copied()
    }

    fn advance_by(&mut self, n: usize) {
        self.pos = (self.pos + n).min(self.bytes.len());
    }

    fn starts_with(&self, s: &str) -> bool {
        self.bytes[self.pos..].starts_with(s.as_bytes())
    }

    fn starts_with_ignore_case(&self, s: &str) -> bool {
        let rest = &self.bytes[self.pos..];
        rest.len() >= s.len() && rest[..s.len()].eq_ignore_ascii_case(s.as_bytes())
    }

    fn skip_whitespace(&mut self) {
        while !self.at_end() && self.bytes[self.pos].is_ascii_whitespace() {
            self.pos += 1;
        }
    }

    fn skip_past(&mut self, target: u8) {
        while !self.at_end() && self.bytes[self.pos] != target {
            self.pos += 1;
        }
        self.advance_by(1);
    }

    fn at_tag_start(&self) -> bool {
        self.peek() == Some(b'<') && self.peek_at(1).map_or(false, |b| b.is_ascii_alphabetic())
    }

    /// `<style` followed by `>` or whitespace.
    fn at_style_opener(&self) -> bool {
        self.starts_with_ignore_case("<style")
            && self
                .peek_at("<style".len())
                .map_or(false, |b| b == b'>' || b.is_ascii_whitespace())
    }

    fn at_script_boundary(&self) -> bool {
        let b = self.bytes[self.pos];
        self.starts_with("</")
            || self.starts_with("<!--")
            || self.at_style_opener()
            || self.starts_with("{{")
            || (b == b'@' && match_directive(&self.bytes[self.pos + 1..]).is_some())
    }
}

/// Lex a complete document.
pub fn tokenize(input: &str) -> LexOutput {
    Lexer::new(input).tokenize()
}
