//! Lexical analyzer for keel source text.
//!
//! Converts source text into a sequence of [`Token`]s, skipping whitespace
//! and `//` line comments. Errors are reported to the [`DiagnosticSink`] and
//! produce [`TokenKind::Error`] tokens so the parser can keep going.

use crate::errors::{INVALID_TOKEN, MALFORMED_LITERAL};
use crate::token::{lookup_keyword, Token, TokenKind};
use keel_diagnostics::{Diagnostic, DiagnosticSink};
use keel_source::{FileId, Span};

/// Lexes `source` into tokens.
///
/// The returned vector always ends with a [`TokenKind::Eof`] token.
pub fn lex(source: &str, file: FileId, sink: &DiagnosticSink) -> Vec<Token> {
    let mut lexer = Lexer {
        source: source.as_bytes(),
        pos: 0,
        file,
        sink,
    };
    lexer.lex_all()
}

struct Lexer<'a> {
    source: &'a [u8],
    pos: usize,
    file: FileId,
    sink: &'a DiagnosticSink,
}

impl Lexer<'_> {
    fn lex_all(&mut self) -> Vec<Token> {
        let mut tokens = Vec::new();
        loop {
            self.skip_whitespace_and_comments();
            if self.pos >= self.source.len() {
                tokens.push(Token {
                    kind: TokenKind::Eof,
                    span: Span::new(self.file, self.pos as u32, self.pos as u32),
                });
                break;
            }
            tokens.push(self.next_token());
        }
        tokens
    }

    fn peek(&self) -> u8 {
        self.peek_at(0)
    }

    fn peek_at(&self, offset: usize) -> u8 {
        self.source.get(self.pos + offset).copied().unwrap_or(0)
    }

    fn span_from(&self, start: usize) -> Span {
        Span::new(self.file, start as u32, self.pos as u32)
    }

    fn token(&self, kind: TokenKind, start: usize) -> Token {
        Token {
            kind,
            span: self.span_from(start),
        }
    }

    fn skip_whitespace_and_comments(&mut self) {
        loop {
            while self.pos < self.source.len() && self.source[self.pos].is_ascii_whitespace() {
                self.pos += 1;
            }
            if self.peek() == b'/' && self.peek_at(1) == b'/' {
                while self.pos < self.source.len() && self.source[self.pos] != b'\n' {
                    self.pos += 1;
                }
                continue;
            }
            break;
        }
    }

    fn next_token(&mut self) -> Token {
        let start = self.pos;
        let b = self.peek();

        if is_ident_start(b) {
            while is_ident_char(self.peek()) {
                self.pos += 1;
            }
            let text = std::str::from_utf8(&self.source[start..self.pos]).unwrap_or("");
            let kind = lookup_keyword(text).unwrap_or(TokenKind::Ident);
            return self.token(kind, start);
        }

        if b.is_ascii_digit() {
            while self.peek().is_ascii_digit() {
                self.pos += 1;
            }
            return self.token(TokenKind::IntLiteral, start);
        }

        if b == b'"' {
            return self.lex_string(start);
        }

        self.pos += 1;
        let kind = match b {
            b':' => TokenKind::Colon,
            b'+' => TokenKind::Plus,
            b'.' => TokenKind::Dot,
            b'(' => TokenKind::LParen,
            b')' => TokenKind::RParen,
            b'=' if self.peek() == b'=' => {
                self.pos += 1;
                TokenKind::EqEq
            }
            b'=' => TokenKind::Assign,
            _ => {
                // Keep spans on character boundaries.
                while self.pos < self.source.len() && (self.source[self.pos] & 0xC0) == 0x80 {
                    self.pos += 1;
                }
                let ch = String::from_utf8_lossy(&self.source[start..self.pos]).into_owned();
                self.sink.emit(Diagnostic::error(
                    INVALID_TOKEN,
                    format!("unexpected character {ch:?}"),
                    self.span_from(start),
                ));
                TokenKind::Error
            }
        };
        self.token(kind, start)
    }

    fn lex_string(&mut self, start: usize) -> Token {
        self.pos += 1;
        loop {
            if self.pos >= self.source.len() || self.peek() == b'\n' {
                self.sink.emit(Diagnostic::error(
                    MALFORMED_LITERAL,
                    "unterminated string literal",
                    self.span_from(start),
                ));
                return self.token(TokenKind::Error, start);
            }
            match self.peek() {
                b'"' => {
                    self.pos += 1;
                    return self.token(TokenKind::StringLiteral, start);
                }
                b'\\' => self.pos = (self.pos + 2).min(self.source.len()),
                _ => self.pos += 1,
            }
        }
    }
}

fn is_ident_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_'
}

fn is_ident_char(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

/// Decodes the body of a string literal token, quotes included.
///
/// Supports the escapes `\"`, `\\`, `\n` and `\t`; any other escaped
/// character stands for itself.
pub fn unescape(literal: &str) -> String {
    let body = literal
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(literal);
    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some(other) => out.push(other),
            None => {}
        }
    }
    out
}
