//! Recursive-descent parser for keel source files.
//!
//! The parser recovers from errors by skipping to the next token that can
//! start an item, so one malformed declaration does not hide problems in the
//! rest of the file. Every error is collected; the caller decides whether a
//! file with errors is usable.

use crate::ast::{BinaryOp, ConstDecl, Expr, Ident, Import, Item, SourceAst, TypeName};
use crate::errors::{MALFORMED_LITERAL, UNEXPECTED_TOKEN};
use crate::lexer::{lex, unescape};
use crate::token::{Token, TokenKind};
use keel_diagnostics::{Diagnostic, DiagnosticSink};
use keel_source::{SourceFile, Span};

/// Parses `file`, returning the syntax tree or every lexer and parser error.
pub fn parse_file(file: &SourceFile) -> Result<SourceAst, Vec<Diagnostic>> {
    let sink = DiagnosticSink::new();
    let tokens = lex(&file.content, file.id, &sink);
    let mut parser = SourceParser::new(tokens, &file.content, &sink);
    let ast = parser.parse_source_file();
    if sink.has_errors() {
        Err(sink.take_all())
    } else {
        Ok(ast)
    }
}

/// Parser state over a token stream.
pub(crate) struct SourceParser<'src> {
    tokens: Vec<Token>,
    pos: usize,
    source: &'src str,
    sink: &'src DiagnosticSink,
}

impl<'src> SourceParser<'src> {
    pub(crate) fn new(tokens: Vec<Token>, source: &'src str, sink: &'src DiagnosticSink) -> Self {
        Self {
            tokens,
            pos: 0,
            source,
            sink,
        }
    }

    // ========================================================================
    // Token access
    // ========================================================================

    fn current(&self) -> TokenKind {
        self.tokens[self.pos].kind
    }

    fn current_span(&self) -> Span {
        self.tokens[self.pos].span
    }

    fn current_text(&self) -> &'src str {
        let span = self.current_span();
        &self.source[span.start as usize..span.end as usize]
    }

    fn at(&self, kind: TokenKind) -> bool {
        self.current() == kind
    }

    fn at_eof(&self) -> bool {
        self.at(TokenKind::Eof)
    }

    fn advance(&mut self) {
        if !self.at_eof() {
            self.pos += 1;
        }
    }

    fn eat(&mut self, kind: TokenKind) -> bool {
        if self.at(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: TokenKind) -> bool {
        if self.eat(kind) {
            true
        } else {
            self.expected(kind.describe());
            false
        }
    }

    fn expect_ident(&mut self) -> Option<Ident> {
        if self.at(TokenKind::Ident) {
            let ident = Ident {
                name: self.current_text().to_string(),
                span: self.current_span(),
            };
            self.advance();
            Some(ident)
        } else {
            self.expected("identifier");
            None
        }
    }

    // ========================================================================
    // Error handling and recovery
    // ========================================================================

    fn expected(&self, what: &str) {
        // The lexer already reported invalid tokens.
        if self.at(TokenKind::Error) {
            return;
        }
        self.sink.emit(Diagnostic::error(
            UNEXPECTED_TOKEN,
            format!("expected {what}, found {}", self.current().describe()),
            self.current_span(),
        ));
    }

    fn at_item_start(&self) -> bool {
        matches!(
            self.current(),
            TokenKind::Import | TokenKind::Pub | TokenKind::Const
        )
    }

    fn recover_to_item(&mut self) {
        while !self.at_eof() && !self.at_item_start() {
            self.advance();
        }
    }

    // ========================================================================
    // Items
    // ========================================================================

    pub(crate) fn parse_source_file(&mut self) -> SourceAst {
        let mut items = Vec::new();
        while !self.at_eof() {
            let item = match self.current() {
                TokenKind::Import => self.parse_import().map(Item::Import),
                TokenKind::Pub | TokenKind::Const => self.parse_const().map(Item::Const),
                _ => {
                    self.expected("`import` or `const`");
                    self.advance();
                    None
                }
            };
            match item {
                Some(item) => items.push(item),
                None => self.recover_to_item(),
            }
        }
        SourceAst { items }
    }

    fn parse_import(&mut self) -> Option<Import> {
        self.expect(TokenKind::Import);
        if !self.at(TokenKind::StringLiteral) {
            self.expected("import path string");
            return None;
        }
        let span = self.current_span();
        let path = unescape(self.current_text());
        self.advance();
        if path.is_empty() {
            self.sink.emit(Diagnostic::error(
                MALFORMED_LITERAL,
                "import path cannot be empty",
                span,
            ));
        }
        Some(Import { path, span })
    }

    fn parse_const(&mut self) -> Option<ConstDecl> {
        let start = self.current_span();
        let is_pub = self.eat(TokenKind::Pub);
        if !self.expect(TokenKind::Const) {
            return None;
        }
        let name = self.expect_ident()?;
        if !self.expect(TokenKind::Colon) {
            return None;
        }
        let ty_span = self.current_span();
        let ty = match self.current() {
            TokenKind::Int => TypeName::Int,
            TokenKind::Bool => TypeName::Bool,
            TokenKind::Str => TypeName::Str,
            _ => {
                self.expected("type (`int`, `bool` or `str`)");
                return None;
            }
        };
        self.advance();
        if !self.expect(TokenKind::Assign) {
            return None;
        }
        let value = self.parse_expr();
        let span = start.cover(value.span());
        Some(ConstDecl {
            is_pub,
            name,
            ty,
            ty_span,
            value,
            span,
        })
    }

    // ========================================================================
    // Expressions
    // ========================================================================

    fn parse_expr(&mut self) -> Expr {
        let mut lhs = self.parse_term();
        loop {
            let op = match self.current() {
                TokenKind::Plus => BinaryOp::Add,
                TokenKind::EqEq => BinaryOp::Eq,
                _ => return lhs,
            };
            let op_span = self.current_span();
            self.advance();
            let rhs = self.parse_term();
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
                op_span,
            };
        }
    }

    fn parse_term(&mut self) -> Expr {
        let span = self.current_span();
        match self.current() {
            TokenKind::IntLiteral => {
                let text = self.current_text();
                self.advance();
                match text.parse::<i64>() {
                    Ok(value) => Expr::Int(value, span),
                    Err(_) => {
                        self.sink.emit(Diagnostic::error(
                            MALFORMED_LITERAL,
                            format!("integer literal `{text}` does not fit in 64 bits"),
                            span,
                        ));
                        Expr::Error(span)
                    }
                }
            }
            TokenKind::StringLiteral => {
                let value = unescape(self.current_text());
                self.advance();
                Expr::Str(value, span)
            }
            TokenKind::True | TokenKind::False => {
                let value = self.at(TokenKind::True);
                self.advance();
                Expr::Bool(value, span)
            }
            TokenKind::Ident => {
                let first = Ident {
                    name: self.current_text().to_string(),
                    span,
                };
                self.advance();
                if !self.eat(TokenKind::Dot) {
                    return Expr::Name(first);
                }
                match self.expect_ident() {
                    Some(member) => Expr::Member {
                        package: first,
                        member,
                    },
                    None => Expr::Error(span),
                }
            }
            TokenKind::LParen => {
                self.advance();
                let inner = self.parse_expr();
                self.expect(TokenKind::RParen);
                inner
            }
            _ => {
                self.expected("expression");
                if !self.at_item_start() {
                    self.advance();
                }
                Expr::Error(span)
            }
        }
    }
}
