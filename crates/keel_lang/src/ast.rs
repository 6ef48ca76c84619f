//! Syntax tree of one keel source file.

use keel_source::Span;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A parsed source file.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SourceAst {
    /// Top-level items in source order.
    pub items: Vec<Item>,
}

impl SourceAst {
    /// Iterates over the file's imports.
    pub fn imports(&self) -> impl Iterator<Item = &Import> {
        self.items.iter().filter_map(|item| match item {
            Item::Import(import) => Some(import),
            Item::Const(_) => None,
        })
    }

    /// Iterates over the file's constant declarations.
    pub fn consts(&self) -> impl Iterator<Item = &ConstDecl> {
        self.items.iter().filter_map(|item| match item {
            Item::Const(decl) => Some(decl),
            Item::Import(_) => None,
        })
    }
}

/// A top-level item.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Item {
    /// `import "path"`
    Import(Import),
    /// `[pub] const NAME: type = expr`
    Const(ConstDecl),
}

/// An import declaration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Import {
    /// The unescaped import path.
    pub path: String,
    /// Span of the path literal.
    pub span: Span,
}

impl Import {
    /// The name the file uses to refer to the imported package: the last
    /// path segment.
    pub fn qualifier(&self) -> &str {
        self.path
            .rsplit('/')
            .find(|segment| !segment.is_empty())
            .unwrap_or(&self.path)
    }
}

/// An identifier with its location.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ident {
    /// The identifier text.
    pub name: String,
    /// Where it appears.
    pub span: Span,
}

/// A constant declaration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConstDecl {
    /// Whether the constant is visible to importers.
    pub is_pub: bool,
    /// The constant's name.
    pub name: Ident,
    /// The declared type.
    pub ty: TypeName,
    /// Span of the type annotation.
    pub ty_span: Span,
    /// The initializer.
    pub value: Expr,
    /// The whole declaration.
    pub span: Span,
}

/// A primitive type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TypeName {
    /// 64-bit signed integer.
    Int,
    /// Boolean.
    Bool,
    /// String.
    Str,
}

impl fmt::Display for TypeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TypeName::Int => "int",
            TypeName::Bool => "bool",
            TypeName::Str => "str",
        })
    }
}

/// A binary operator.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinaryOp {
    /// `+`: integer addition or string concatenation.
    Add,
    /// `==`
    Eq,
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BinaryOp::Add => "+",
            BinaryOp::Eq => "==",
        })
    }
}

/// An expression.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    /// An integer literal.
    Int(i64, Span),
    /// A string literal, unescaped.
    Str(String, Span),
    /// `true` or `false`.
    Bool(bool, Span),
    /// A reference to a constant of the same package.
    Name(Ident),
    /// `package.member`
    Member {
        /// The import qualifier.
        package: Ident,
        /// The referenced member.
        member: Ident,
    },
    /// `lhs op rhs`
    Binary {
        /// The operator.
        op: BinaryOp,
        /// Left operand.
        lhs: Box<Expr>,
        /// Right operand.
        rhs: Box<Expr>,
        /// Span of the operator token.
        op_span: Span,
    },
    /// A placeholder left where the parser recovered from an error.
    Error(Span),
}

impl Expr {
    /// Returns the span covering the whole expression.
    pub fn span(&self) -> Span {
        match self {
            Expr::Int(_, span) | Expr::Str(_, span) | Expr::Bool(_, span) | Expr::Error(span) => {
                *span
            }
            Expr::Name(ident) => ident.span,
            Expr::Member { package, member } => package.span.cover(member.span),
            Expr::Binary { lhs, rhs, .. } => lhs.span().cover(rhs.span()),
        }
    }
}
