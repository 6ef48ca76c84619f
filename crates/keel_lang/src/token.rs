//! Token kinds produced by the lexer.

use keel_source::Span;
use serde::{Deserialize, Serialize};

/// A token kind.
///
/// Literal values are not stored in the token; the parser reads them back
/// from the source text through the token's span.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub enum TokenKind {
    // === Keywords ===
    /// `import`
    Import,
    /// `pub`
    Pub,
    /// `const`
    Const,
    /// `true`
    True,
    /// `false`
    False,
    /// `int`
    Int,
    /// `bool`
    Bool,
    /// `str`
    Str,

    // === Literals and names ===
    /// An identifier.
    Ident,
    /// A decimal integer literal.
    IntLiteral,
    /// A double-quoted string literal, quotes included.
    StringLiteral,

    // === Punctuation ===
    /// `:`
    Colon,
    /// `=`
    Assign,
    /// `==`
    EqEq,
    /// `+`
    Plus,
    /// `.`
    Dot,
    /// `(`
    LParen,
    /// `)`
    RParen,

    /// A character the lexer could not classify.
    Error,
    /// End of input.
    Eof,
}

impl TokenKind {
    /// Returns a short description used in "expected X, found Y" messages.
    pub fn describe(self) -> &'static str {
        match self {
            TokenKind::Import => "`import`",
            TokenKind::Pub => "`pub`",
            TokenKind::Const => "`const`",
            TokenKind::True => "`true`",
            TokenKind::False => "`false`",
            TokenKind::Int => "`int`",
            TokenKind::Bool => "`bool`",
            TokenKind::Str => "`str`",
            TokenKind::Ident => "identifier",
            TokenKind::IntLiteral => "integer literal",
            TokenKind::StringLiteral => "string literal",
            TokenKind::Colon => "`:`",
            TokenKind::Assign => "`=`",
            TokenKind::EqEq => "`==`",
            TokenKind::Plus => "`+`",
            TokenKind::Dot => "`.`",
            TokenKind::LParen => "`(`",
            TokenKind::RParen => "`)`",
            TokenKind::Error => "invalid token",
            TokenKind::Eof => "end of file",
        }
    }
}

/// Returns the keyword for `text`, if it is one.
pub fn lookup_keyword(text: &str) -> Option<TokenKind> {
    match text {
        "import" => Some(TokenKind::Import),
        "pub" => Some(TokenKind::Pub),
        "const" => Some(TokenKind::Const),
        "true" => Some(TokenKind::True),
        "false" => Some(TokenKind::False),
        "int" => Some(TokenKind::Int),
        "bool" => Some(TokenKind::Bool),
        "str" => Some(TokenKind::Str),
        _ => None,
    }
}

/// A token with its location.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct Token {
    /// The token kind.
    pub kind: TokenKind,
    /// Where the token appears.
    pub span: Span,
}
