//! The lowered form of a package.
//!
//! Each constant becomes one [`Global`]. Initializers that only involve
//! literals and local constants are folded to a [`Value`]; anything that
//! reads another package's constant stays an [`IrExpr`] with an
//! [`ExternRef`] naming the exact package version it was checked against.

use crate::analyzer::PackageInfo;
use crate::ast::{BinaryOp, TypeName};
use keel_common::ImportPath;
use keel_graph::PackageHandle;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A compile-time value.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Value {
    /// An integer.
    Int(i64),
    /// A boolean.
    Bool(bool),
    /// A string.
    Str(String),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(v) => write!(f, "{v}"),
            Value::Bool(v) => write!(f, "{v}"),
            Value::Str(v) => write!(f, "{v:?}"),
        }
    }
}

/// A constant defined by another package.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExternRef {
    /// The defining package version.
    pub handle: PackageHandle,
    /// The constant's name in that package.
    pub name: String,
}

/// An initializer that could not be folded.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum IrExpr {
    /// A literal.
    Const(Value),
    /// A constant of the same package.
    Global(String),
    /// A constant of another package.
    Load(ExternRef),
    /// A binary operation.
    Binary {
        /// The operator.
        op: BinaryOp,
        /// Left operand.
        lhs: Box<IrExpr>,
        /// Right operand.
        rhs: Box<IrExpr>,
    },
}

impl fmt::Display for IrExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IrExpr::Const(value) => write!(f, "{value}"),
            IrExpr::Global(name) => write!(f, "{name}"),
            IrExpr::Load(ext) => write!(f, "load {}.{}", ext.handle, ext.name),
            IrExpr::Binary { op, lhs, rhs } => write!(f, "({lhs} {op} {rhs})"),
        }
    }
}

/// How a global gets its value.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Init {
    /// Known at compile time.
    Value(Value),
    /// Computed at load time.
    Expr(IrExpr),
}

/// One package-level constant.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Global {
    /// The constant's name.
    pub name: String,
    /// Whether importers can see it.
    pub exported: bool,
    /// Its type.
    pub ty: TypeName,
    /// Its initializer.
    pub init: Init,
}

/// The IR of one package.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageIr {
    /// The package's canonical import path.
    pub package: ImportPath,
    /// Globals in declaration order.
    pub globals: Vec<Global>,
}

impl PackageIr {
    /// Looks up a global by name.
    pub fn global(&self, name: &str) -> Option<&Global> {
        self.globals.iter().find(|g| g.name == name)
    }

    /// Returns the handles of every package this IR loads from.
    pub fn extern_handles(&self) -> Vec<PackageHandle> {
        let mut handles = Vec::new();
        for global in &self.globals {
            if let Init::Expr(expr) = &global.init {
                collect_handles(expr, &mut handles);
            }
        }
        handles.sort();
        handles.dedup();
        handles
    }
}

fn collect_handles(expr: &IrExpr, out: &mut Vec<PackageHandle>) {
    match expr {
        IrExpr::Load(ext) => out.push(ext.handle),
        IrExpr::Binary { lhs, rhs, .. } => {
            collect_handles(lhs, out);
            collect_handles(rhs, out);
        }
        IrExpr::Const(_) | IrExpr::Global(_) => {}
    }
}

impl fmt::Display for PackageIr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "package {}", self.package)?;
        for global in &self.globals {
            let vis = if global.exported { "pub " } else { "" };
            match &global.init {
                Init::Value(value) => {
                    writeln!(f, "  {vis}global {}: {} = {value}", global.name, global.ty)?
                }
                Init::Expr(expr) => {
                    writeln!(f, "  {vis}global {}: {} = {expr}", global.name, global.ty)?
                }
            }
        }
        Ok(())
    }
}

/// Lowers an analyzed package.
pub fn lower(path: &ImportPath, info: &PackageInfo) -> PackageIr {
    let globals = info
        .consts
        .iter()
        .map(|c| Global {
            name: c.name.clone(),
            exported: c.exported,
            ty: c.ty,
            init: match &c.value {
                Some(value) => Init::Value(value.clone()),
                None => Init::Expr(c.init.clone()),
            },
        })
        .collect();
    PackageIr {
        package: path.clone(),
        globals,
    }
}
