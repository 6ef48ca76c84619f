//! Semantic analysis of keel packages.
//!
//! A package's constants share one scope across all of its files; import
//! qualifiers are scoped to the file that declares them. Each distinct import
//! path is resolved once per package through the graph's resolver, which may
//! compile the imported package on the way.

use crate::ast::{BinaryOp, ConstDecl, Expr, Import, TypeName};
use crate::errors::{
    CONSTANT_EVALUATION, DUPLICATE_NAME, TYPE_MISMATCH, UNEXPORTED_MEMBER, UNKNOWN_MEMBER,
    UNKNOWN_NAME, UNKNOWN_PACKAGE,
};
use crate::ir::{ExternRef, IrExpr, Value};
use crate::KeelLang;
use keel_common::ImportPath;
use keel_diagnostics::{Diagnostic, Label};
use keel_graph::{Analysis, ImportResolver, PackageHandle, ParsedFile};
use keel_source::Span;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::path::Path;
use tracing::trace;

/// The type of a package as seen by its importers.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageType {
    /// The canonical import path.
    pub path: ImportPath,
    /// The compiled version this type belongs to.
    pub handle: PackageHandle,
    /// Exported constants and their types.
    pub exports: BTreeMap<String, TypeName>,
    /// Names of constants that exist but are not exported.
    pub private: BTreeSet<String>,
}

/// What the IR builder needs to know about a package.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PackageInfo {
    /// Constants in declaration order.
    pub consts: Vec<CheckedConst>,
    /// Every package imported successfully, with the version used.
    pub imports: BTreeMap<ImportPath, PackageHandle>,
}

/// A type-checked constant.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CheckedConst {
    /// The constant's name.
    pub name: String,
    /// Whether it is `pub`.
    pub exported: bool,
    /// Its declared type.
    pub ty: TypeName,
    /// The initializer with every name resolved.
    pub init: IrExpr,
    /// The folded value, when the initializer does not load from another package.
    pub value: Option<Value>,
}

/// Returns the semantic type of the builtin sentinel package.
///
/// The sentinel exports nothing; importing it only records intent.
pub fn builtin_type(path: &ImportPath, handle: PackageHandle) -> PackageType {
    PackageType {
        path: path.clone(),
        handle,
        exports: BTreeMap::new(),
        private: BTreeSet::new(),
    }
}

/// Analyzes the files of package `path`.
pub fn analyze_package(
    path: &ImportPath,
    handle: PackageHandle,
    files: &[ParsedFile<KeelLang>],
    resolver: &mut dyn ImportResolver<KeelLang>,
) -> Analysis<KeelLang> {
    let mut checker = Checker::default();
    checker.declare(files);

    let mut resolved: HashMap<String, Option<PackageType>> = HashMap::new();
    let mut imports = BTreeMap::new();
    let mut checked = Vec::new();
    for file in files {
        let search_dir = file.source.path.parent().unwrap_or(Path::new("."));
        let mut scope: HashMap<String, (&Import, Option<PackageType>)> = HashMap::new();
        for import in file.ast.imports() {
            let package = resolved
                .entry(import.path.clone())
                .or_insert_with(|| {
                    match resolver.resolve(&ImportPath::new(&import.path), search_dir) {
                        Ok(dep) => {
                            trace!(import = %import.path, handle = %dep.handle, "resolved import");
                            Some(dep.semantic)
                        }
                        // The graph reports the failure; references to the
                        // package stay silent.
                        Err(_) => None,
                    }
                })
                .clone();
            if let Some(dep) = &package {
                imports.insert(dep.path.clone(), dep.handle);
            }
            checker.import(&mut scope, import, package);
        }
        let scope: HashMap<String, Option<PackageType>> = scope
            .into_iter()
            .map(|(name, (_, package))| (name, package))
            .collect();
        for decl in file.ast.consts() {
            if let Some(c) = checker.check_const(decl, &scope) {
                checked.push(c);
            }
        }
    }

    checker.fold_all(&mut checked);

    let mut exports = BTreeMap::new();
    let mut private = BTreeSet::new();
    for (name, decl) in &checker.decls {
        if decl.exported {
            exports.insert(name.clone(), decl.ty);
        } else {
            private.insert(name.clone());
        }
    }

    Analysis {
        semantic: PackageType {
            path: path.clone(),
            handle,
            exports,
            private,
        },
        info: PackageInfo {
            consts: checked,
            imports,
        },
        errors: checker.diagnostics,
    }
}

struct Declared {
    ty: TypeName,
    exported: bool,
    span: Span,
}

#[derive(Default)]
struct Checker {
    decls: BTreeMap<String, Declared>,
    diagnostics: Vec<Diagnostic>,
}

impl Checker {
    fn declare(&mut self, files: &[ParsedFile<KeelLang>]) {
        for decl in files.iter().flat_map(|f| f.ast.consts()) {
            let name = &decl.name;
            if let Some(first) = self.decls.get(&name.name) {
                self.diagnostics.push(
                    Diagnostic::error(
                        DUPLICATE_NAME,
                        format!("constant `{}` is declared more than once", name.name),
                        name.span,
                    )
                    .with_label(Label::secondary(first.span, "first declared here")),
                );
                continue;
            }
            self.decls.insert(
                name.name.clone(),
                Declared {
                    ty: decl.ty,
                    exported: decl.is_pub,
                    span: name.span,
                },
            );
        }
    }

    fn import<'a>(
        &mut self,
        scope: &mut HashMap<String, (&'a Import, Option<PackageType>)>,
        import: &'a Import,
        package: Option<PackageType>,
    ) {
        let qualifier = import.qualifier().to_string();
        if let Some((earlier, _)) = scope.get(&qualifier) {
            if earlier.path != import.path {
                self.diagnostics.push(
                    Diagnostic::error(
                        DUPLICATE_NAME,
                        format!("`{qualifier}` is imported more than once in this file"),
                        import.span,
                    )
                    .with_label(Label::secondary(earlier.span, "first imported here")),
                );
            }
            return;
        }
        scope.insert(qualifier, (import, package));
    }

    fn check_const(
        &mut self,
        decl: &ConstDecl,
        scope: &HashMap<String, Option<PackageType>>,
    ) -> Option<CheckedConst> {
        // Later duplicates were already reported.
        if self.decls.get(&decl.name.name).map(|d| d.span) != Some(decl.name.span) {
            return None;
        }
        let (init, ty) = self.check_expr(&decl.value, scope)?;
        if ty != decl.ty {
            self.diagnostics.push(
                Diagnostic::error(
                    TYPE_MISMATCH,
                    format!("mismatched types: expected `{}`, found `{ty}`", decl.ty),
                    decl.value.span(),
                )
                .with_label(Label::secondary(decl.ty_span, "declared type")),
            );
            return None;
        }
        Some(CheckedConst {
            name: decl.name.name.clone(),
            exported: decl.is_pub,
            ty,
            init,
            value: None,
        })
    }

    fn check_expr(
        &mut self,
        expr: &Expr,
        scope: &HashMap<String, Option<PackageType>>,
    ) -> Option<(IrExpr, TypeName)> {
        match expr {
            Expr::Int(v, _) => Some((IrExpr::Const(Value::Int(*v)), TypeName::Int)),
            Expr::Str(v, _) => Some((IrExpr::Const(Value::Str(v.clone())), TypeName::Str)),
            Expr::Bool(v, _) => Some((IrExpr::Const(Value::Bool(*v)), TypeName::Bool)),
            Expr::Name(ident) => match self.decls.get(&ident.name) {
                Some(decl) => Some((IrExpr::Global(ident.name.clone()), decl.ty)),
                None => {
                    self.diagnostics.push(Diagnostic::error(
                        UNKNOWN_NAME,
                        format!("cannot find constant `{}` in this package", ident.name),
                        ident.span,
                    ));
                    None
                }
            },
            Expr::Member { package, member } => {
                let Some(resolved) = scope.get(&package.name) else {
                    self.diagnostics.push(
                        Diagnostic::error(
                            UNKNOWN_PACKAGE,
                            format!("unknown package `{}`", package.name),
                            package.span,
                        )
                        .with_help("import the package before referring to its members"),
                    );
                    return None;
                };
                let dep = resolved.as_ref()?;
                if let Some(ty) = dep.exports.get(&member.name) {
                    let load = IrExpr::Load(ExternRef {
                        handle: dep.handle,
                        name: member.name.clone(),
                    });
                    return Some((load, *ty));
                }
                let (code, message) = if dep.private.contains(&member.name) {
                    (
                        UNEXPORTED_MEMBER,
                        format!("`{}` is private to package \"{}\"", member.name, dep.path),
                    )
                } else {
                    (
                        UNKNOWN_MEMBER,
                        format!("package \"{}\" has no member `{}`", dep.path, member.name),
                    )
                };
                self.diagnostics
                    .push(Diagnostic::error(code, message, member.span));
                None
            }
            Expr::Binary {
                op,
                lhs,
                rhs,
                op_span,
            } => {
                let lhs = self.check_expr(lhs, scope);
                let rhs = self.check_expr(rhs, scope);
                let ((lhs, lty), (rhs, rty)) = (lhs?, rhs?);
                let ty = match (op, lty, rty) {
                    (BinaryOp::Add, TypeName::Int, TypeName::Int) => TypeName::Int,
                    (BinaryOp::Add, TypeName::Str, TypeName::Str) => TypeName::Str,
                    (BinaryOp::Eq, l, r) if l == r => TypeName::Bool,
                    (BinaryOp::Add, l, r) => {
                        self.mismatch(format!("cannot add `{l}` and `{r}`"), *op_span);
                        return None;
                    }
                    (BinaryOp::Eq, l, r) => {
                        self.mismatch(format!("cannot compare `{l}` with `{r}`"), *op_span);
                        return None;
                    }
                };
                let expr = IrExpr::Binary {
                    op: *op,
                    lhs: Box::new(lhs),
                    rhs: Box::new(rhs),
                };
                Some((expr, ty))
            }
            Expr::Error(_) => None,
        }
    }

    fn mismatch(&mut self, message: String, span: Span) {
        self.diagnostics
            .push(Diagnostic::error(TYPE_MISMATCH, message, span));
    }

    // ========================================================================
    // Constant folding
    // ========================================================================

    fn fold_all(&mut self, consts: &mut [CheckedConst]) {
        let inits: HashMap<String, IrExpr> = consts
            .iter()
            .map(|c| (c.name.clone(), c.init.clone()))
            .collect();
        let mut folder = Folder {
            inits: &inits,
            memo: HashMap::new(),
            visiting: HashSet::new(),
            reported: HashSet::new(),
            decls: &self.decls,
            diagnostics: Vec::new(),
        };
        for c in consts.iter_mut() {
            c.value = folder.fold_global(&c.name);
        }
        self.diagnostics.append(&mut folder.diagnostics);
    }
}

struct Folder<'a> {
    inits: &'a HashMap<String, IrExpr>,
    memo: HashMap<String, Option<Value>>,
    visiting: HashSet<String>,
    reported: HashSet<String>,
    decls: &'a BTreeMap<String, Declared>,
    diagnostics: Vec<Diagnostic>,
}

impl Folder<'_> {
    fn fold_global(&mut self, name: &str) -> Option<Value> {
        if let Some(value) = self.memo.get(name) {
            return value.clone();
        }
        if !self.visiting.insert(name.to_string()) {
            self.error(name, format!("constant `{name}` depends on itself"));
            return None;
        }
        let value = match self.inits.get(name) {
            Some(init) => self.fold(name, init),
            None => None,
        };
        self.visiting.remove(name);
        self.memo.insert(name.to_string(), value.clone());
        value
    }

    fn fold(&mut self, owner: &str, expr: &IrExpr) -> Option<Value> {
        match expr {
            IrExpr::Const(value) => Some(value.clone()),
            IrExpr::Global(name) => self.fold_global(name),
            IrExpr::Load(_) => None,
            IrExpr::Binary { op, lhs, rhs } => {
                let lhs = self.fold(owner, lhs);
                let rhs = self.fold(owner, rhs);
                match (op, lhs?, rhs?) {
                    (BinaryOp::Add, Value::Int(l), Value::Int(r)) => match l.checked_add(r) {
                        Some(sum) => Some(Value::Int(sum)),
                        None => {
                            self.error(owner, format!("evaluating `{owner}` overflows `int`"));
                            None
                        }
                    },
                    (BinaryOp::Add, Value::Str(l), Value::Str(r)) => Some(Value::Str(l + &r)),
                    (BinaryOp::Eq, l, r) => Some(Value::Bool(l == r)),
                    _ => None,
                }
            }
        }
    }

    fn error(&mut self, name: &str, message: String) {
        if !self.reported.insert(name.to_string()) {
            return;
        }
        let span = self.decls.get(name).map_or(Span::DUMMY, |d| d.span);
        self.diagnostics
            .push(Diagnostic::error(CONSTANT_EVALUATION, message, span));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_file;
    use keel_graph::{GraphError, LocateError, ResolvedImport};
    use keel_source::{FileId, SourceFile};
    use std::path::PathBuf;
    use std::sync::Arc;

    #[derive(Default)]
    struct FakeResolver {
        packages: HashMap<String, PackageType>,
        calls: Vec<(String, PathBuf)>,
    }

    impl FakeResolver {
        fn with(mut self, path: &str, handle: u64, exports: &[(&str, TypeName)], private: &[&str]) -> Self {
            self.packages.insert(
                path.to_string(),
                PackageType {
                    path: ImportPath::new(path),
                    handle: PackageHandle::from_raw(handle),
                    exports: exports.iter().map(|(n, t)| (n.to_string(), *t)).collect(),
                    private: private.iter().map(|n| n.to_string()).collect(),
                },
            );
            self
        }
    }

    impl ImportResolver<KeelLang> for FakeResolver {
        fn resolve(
            &mut self,
            import_path: &ImportPath,
            search_dir: &Path,
        ) -> Result<ResolvedImport<KeelLang>, GraphError> {
            self.calls
                .push((import_path.to_string(), search_dir.to_path_buf()));
            match self.packages.get(import_path.as_str()) {
                Some(ty) => Ok(ResolvedImport {
                    path: ty.path.clone(),
                    handle: ty.handle,
                    semantic: ty.clone(),
                }),
                None => Err(GraphError::Locate(LocateError::NotFound {
                    path: import_path.clone(),
                    search_dir: search_dir.to_path_buf(),
                })),
            }
        }
    }

    fn files(sources: &[&str]) -> Vec<ParsedFile<KeelLang>> {
        sources
            .iter()
            .enumerate()
            .map(|(i, text)| {
                let source = Arc::new(SourceFile::new(
                    FileId::from_raw(i as u32),
                    PathBuf::from(format!("/ws/src/app/f{i}.kl")),
                    text.to_string(),
                ));
                let ast = parse_file(&source).unwrap();
                ParsedFile { source, ast }
            })
            .collect()
    }

    fn analyze(sources: &[&str], resolver: &mut FakeResolver) -> Analysis<KeelLang> {
        analyze_package(
            &ImportPath::new("app"),
            PackageHandle::from_raw(1),
            &files(sources),
            resolver,
        )
    }

    fn codes(analysis: &Analysis<KeelLang>) -> Vec<String> {
        analysis.errors.iter().map(|d| d.code.to_string()).collect()
    }

    fn value(analysis: &Analysis<KeelLang>, name: &str) -> Option<Value> {
        analysis
            .info
            .consts
            .iter()
            .find(|c| c.name == name)
            .and_then(|c| c.value.clone())
    }

    #[test]
    fn folds_local_constants_across_files() {
        let mut resolver = FakeResolver::default();
        let analysis = analyze(
            &[
                "pub const total: int = base + 2",
                "const base: int = 40\nconst same: bool = total == 42\npub const s: str = \"a\" + \"b\"",
            ],
            &mut resolver,
        );
        assert!(analysis.errors.is_empty(), "{:?}", analysis.errors);
        assert_eq!(value(&analysis, "total"), Some(Value::Int(42)));
        assert_eq!(value(&analysis, "same"), Some(Value::Bool(true)));
        assert_eq!(value(&analysis, "s"), Some(Value::Str("ab".to_string())));

        let semantic = &analysis.semantic;
        assert_eq!(semantic.handle, PackageHandle::from_raw(1));
        assert_eq!(
            semantic.exports.keys().collect::<Vec<_>>(),
            vec!["s", "total"]
        );
        assert!(semantic.private.contains("base"));
    }

    #[test]
    fn cross_package_reference_records_handle() {
        let mut resolver = FakeResolver::default().with("math", 9, &[("pi", TypeName::Int)], &[]);
        let analysis = analyze(
            &["import \"math\"\nconst tau: int = math.pi + math.pi"],
            &mut resolver,
        );
        assert!(analysis.errors.is_empty(), "{:?}", analysis.errors);
        let tau = &analysis.info.consts[0];
        assert_eq!(tau.value, None);
        assert!(tau.init.to_string().contains("load #9.pi"));
        assert_eq!(
            analysis.info.imports.get(&ImportPath::new("math")),
            Some(&PackageHandle::from_raw(9))
        );
    }

    #[test]
    fn each_import_is_resolved_once_per_package() {
        let mut resolver = FakeResolver::default().with("lib", 2, &[("x", TypeName::Int)], &[]);
        analyze(
            &[
                "import \"lib\"\nconst a: int = lib.x",
                "import \"lib\"\nconst b: int = lib.x",
            ],
            &mut resolver,
        );
        assert_eq!(
            resolver.calls,
            vec![("lib".to_string(), PathBuf::from("/ws/src/app"))]
        );
    }

    #[test]
    fn import_qualifiers_are_file_scoped() {
        let mut resolver = FakeResolver::default().with("lib", 2, &[("x", TypeName::Int)], &[]);
        let analysis = analyze(
            &["import \"lib\"\nconst a: int = lib.x", "const b: int = lib.x"],
            &mut resolver,
        );
        assert_eq!(codes(&analysis), vec!["E202"]);
    }

    #[test]
    fn reports_duplicates_and_unknown_names() {
        let mut resolver = FakeResolver::default();
        let analysis = analyze(
            &["const a: int = 1\nconst a: int = 2", "const b: int = missing"],
            &mut resolver,
        );
        assert_eq!(codes(&analysis), vec!["E200", "E201"]);
        assert_eq!(analysis.errors[0].labels.len(), 1);
    }

    #[test]
    fn reports_member_visibility() {
        let mut resolver =
            FakeResolver::default().with("lib", 2, &[("shown", TypeName::Int)], &["hidden"]);
        let analysis = analyze(
            &["import \"lib\"\nconst a: int = lib.hidden\nconst b: int = lib.nothing"],
            &mut resolver,
        );
        assert_eq!(codes(&analysis), vec!["E204", "E205"]);
    }

    #[test]
    fn reports_type_mismatches() {
        let mut resolver = FakeResolver::default();
        let analysis = analyze(
            &[
                "const a: int = 1 + \"x\"\nconst b: bool = 1 == true\nconst c: str = 1",
            ],
            &mut resolver,
        );
        assert_eq!(codes(&analysis), vec!["E203", "E203", "E203"]);
        assert!(analysis.errors[0].message.contains("cannot add `int` and `str`"));
        assert!(analysis.errors[2].message.contains("expected `str`, found `int`"));
    }

    #[test]
    fn unresolved_import_does_not_cascade() {
        let mut resolver = FakeResolver::default();
        let analysis = analyze(
            &["import \"gone\"\nconst a: int = gone.x + gone.y"],
            &mut resolver,
        );
        assert!(analysis.errors.is_empty());
        assert!(analysis.info.consts.is_empty());
        assert!(analysis.info.imports.is_empty());
    }

    #[test]
    fn self_reference_is_reported_once() {
        let mut resolver = FakeResolver::default();
        let analysis = analyze(
            &["const a: int = b + 1\nconst b: int = a\nconst c: int = a"],
            &mut resolver,
        );
        assert_eq!(codes(&analysis), vec!["E206"]);
        assert_eq!(value(&analysis, "c"), None);
    }

    #[test]
    fn overflow_is_reported() {
        let mut resolver = FakeResolver::default();
        let analysis = analyze(
            &["const a: int = 9223372036854775807 + 1"],
            &mut resolver,
        );
        assert_eq!(codes(&analysis), vec!["E206"]);
    }

    #[test]
    fn conflicting_qualifiers_are_reported() {
        let mut resolver = FakeResolver::default()
            .with("net/http", 2, &[], &[])
            .with("http", 3, &[], &[]);
        let analysis = analyze(&["import \"net/http\"\nimport \"http\""], &mut resolver);
        assert_eq!(codes(&analysis), vec!["E200"]);
    }
}
