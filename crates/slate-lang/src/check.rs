//! The Slate type checker.
//!
//! The checker turns a set of parsed files into a [`TypesPackage`]. Imports
//! are resolved through a single-method [`ImporterHook`], so the embedding
//! tool decides how packages are located, cached and rechecked. Diagnostics
//! go to a [`DiagnosticHandler`]; soft diagnostics (unused locals) never
//! prevent the package from being marked complete, hard diagnostics do.

use crate::ast::*;
use crate::diagnostics::{Diagnostic, DiagnosticHandler};
use crate::package::TypesPackage;
use crate::scope::{Object, ObjectKind, ObjectPos, Scope};
use crate::span::Span;
use crate::types::{NamedType, Signature, Sizes, StructType, Type};
use crate::universe::{self, EXTERN_PATH};
use rustc_hash::{FxHashMap, FxHashSet};
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

/// Resolves an import path to a checked package, relative to the directory
/// of the package currently being checked.
pub trait ImporterHook {
    fn import(&self, ipath: &str) -> Result<Arc<TypesPackage>, String>;
}

#[derive(Debug, Clone)]
pub struct CheckConfig {
    /// Skip function bodies; only signatures and package-level declarations
    /// are checked.
    pub ignore_func_bodies: bool,
    /// Skip the imported-and-not-used check.
    pub disable_unused_import_check: bool,
    /// Treat `import "extern"` as a synthesized package with an empty,
    /// trusting scope instead of resolving it through the hook.
    pub fake_extern: bool,
    pub sizes: Sizes,
}

impl Default for CheckConfig {
    fn default() -> Self {
        Self {
            ignore_func_bodies: false,
            disable_unused_import_check: false,
            fake_extern: true,
            sizes: Sizes::for_target("slc", std::env::consts::ARCH),
        }
    }
}

/// A failure that prevented the checker from producing a result at all.
/// Ordinary type errors are diagnostics, not `CheckError`s.
#[derive(Debug, Clone, Error)]
#[error("{}:{}:{}: {message}", path.display(), span.line, span.column)]
pub struct CheckError {
    pub message: String,
    pub path: PathBuf,
    pub span: Span,
}

impl From<Diagnostic> for CheckError {
    fn from(d: Diagnostic) -> Self {
        CheckError {
            message: d.message,
            path: d.path,
            span: d.span,
        }
    }
}

/// Optional type information recorded during a check.
///
/// Only the maps the caller allocated are filled. Node ids are offset per
/// file by the cumulative id count of the preceding files, in check order,
/// so one map can span a whole package.
#[derive(Debug, Default)]
pub struct TypesInfo {
    pub types: Option<FxHashMap<NodeId, Type>>,
    pub defs: Option<FxHashMap<NodeId, Object>>,
    pub uses: Option<FxHashMap<NodeId, Object>>,
    pub implicits: Option<FxHashMap<NodeId, Object>>,
    pub selections: Option<FxHashMap<NodeId, Selection>>,
    pub scopes: Option<FxHashMap<NodeId, Scope>>,
    pub init_order: Option<Vec<Initializer>>,
}

#[derive(Debug, Clone)]
pub struct Selection {
    pub recv: Type,
    pub field: String,
    pub ty: Type,
}

#[derive(Debug, Clone)]
pub struct Initializer {
    pub name: String,
    pub id: NodeId,
}

pub struct Checker<'a> {
    cfg: CheckConfig,
    handler: Arc<dyn DiagnosticHandler>,
    importer: &'a dyn ImporterHook,
}

impl<'a> Checker<'a> {
    pub fn new(
        cfg: CheckConfig,
        handler: Arc<dyn DiagnosticHandler>,
        importer: &'a dyn ImporterHook,
    ) -> Self {
        Self {
            cfg,
            handler,
            importer,
        }
    }

    /// Check `files` as the package `import_path`.
    ///
    /// Returns the package (possibly incomplete when hard diagnostics were
    /// reported) and, separately, any failure that aborted the check.
    pub fn check(
        &self,
        import_path: &str,
        files: &[Arc<SourceFile>],
        info: Option<&mut TypesInfo>,
    ) -> (Option<Arc<TypesPackage>>, Option<CheckError>) {
        let Some(first) = files.first() else {
            return (
                None,
                Some(CheckError {
                    message: format!("package {import_path} has no source files"),
                    path: PathBuf::new(),
                    span: Span::default(),
                }),
            );
        };
        let pkg_name = first.package_name.clone();
        for f in files {
            if f.package_name != pkg_name {
                return (
                    None,
                    Some(CheckError {
                        message: format!(
                            "found packages {} and {} in the same directory",
                            pkg_name, f.package_name
                        ),
                        path: f.path.clone(),
                        span: f.package_span,
                    }),
                );
            }
        }

        let mut chk = Check {
            cfg: &self.cfg,
            handler: &*self.handler,
            importer: self.importer,
            info,
            pkg_path: import_path.to_string(),
            files,
            offsets: id_offsets(files),
            file_imports: Vec::new(),
            scope: Scope::new(),
            named_done: FxHashMap::default(),
            named_in_progress: FxHashSet::default(),
            hard_count: 0,
        };
        let pkg = chk.run(pkg_name);
        (Some(pkg), None)
    }
}

fn id_offsets(files: &[Arc<SourceFile>]) -> Vec<NodeId> {
    let mut offsets = Vec::with_capacity(files.len());
    let mut total = 0;
    for f in files {
        offsets.push(total);
        total += f.next_id;
    }
    offsets
}

struct ImportedRef {
    pkg: Arc<TypesPackage>,
    span: Span,
    used: bool,
}

struct Local {
    ty: Type,
    span: Span,
    used: bool,
}

struct Check<'c> {
    cfg: &'c CheckConfig,
    handler: &'c dyn DiagnosticHandler,
    importer: &'c dyn ImporterHook,
    info: Option<&'c mut TypesInfo>,
    pkg_path: String,
    files: &'c [Arc<SourceFile>],
    offsets: Vec<NodeId>,
    /// Per-file import qualifier tables, indexed like `files`.
    file_imports: Vec<FxHashMap<String, ImportedRef>>,
    scope: Scope,
    named_done: FxHashMap<String, Type>,
    named_in_progress: FxHashSet<String>,
    hard_count: usize,
}

impl<'c> Check<'c> {
    fn run(&mut self, pkg_name: String) -> Arc<TypesPackage> {
        self.resolve_imports();
        self.declare_types();
        self.declare_values();
        if !self.cfg.ignore_func_bodies {
            self.check_bodies();
        }
        if !self.cfg.disable_unused_import_check {
            self.check_unused_imports();
        }
        let pkg = TypesPackage::new(self.pkg_path.clone(), pkg_name, self.scope.clone());
        if self.hard_count == 0 {
            pkg.mark_complete();
        }
        Arc::new(pkg)
    }

    // ---- diagnostics ----

    fn hard(&mut self, file: usize, span: Span, message: impl Into<String>) {
        self.hard_count += 1;
        self.handler.report(Diagnostic {
            message: message.into(),
            path: self.files[file].path.clone(),
            span,
            soft: false,
        });
    }

    fn soft(&mut self, file: usize, span: Span, message: impl Into<String>) {
        self.handler.report(Diagnostic {
            message: message.into(),
            path: self.files[file].path.clone(),
            span,
            soft: true,
        });
    }

    // ---- info recording ----

    fn key(&self, file: usize, id: NodeId) -> NodeId {
        self.offsets[file] + id
    }

    fn record_type(&mut self, file: usize, id: NodeId, ty: &Type) {
        let key = self.key(file, id);
        if let Some(info) = self.info.as_deref_mut() {
            if let Some(types) = info.types.as_mut() {
                types.insert(key, ty.clone());
            }
        }
    }

    fn record_def(&mut self, file: usize, id: NodeId, obj: &Object) {
        let key = self.key(file, id);
        if let Some(info) = self.info.as_deref_mut() {
            if let Some(defs) = info.defs.as_mut() {
                defs.insert(key, obj.clone());
            }
        }
    }

    fn record_use(&mut self, file: usize, id: NodeId, obj: &Object) {
        let key = self.key(file, id);
        if let Some(info) = self.info.as_deref_mut() {
            if let Some(uses) = info.uses.as_mut() {
                uses.insert(key, obj.clone());
            }
        }
    }

    fn record_implicit(&mut self, file: usize, id: NodeId, obj: Object) {
        let key = self.key(file, id);
        if let Some(info) = self.info.as_deref_mut() {
            if let Some(implicits) = info.implicits.as_mut() {
                implicits.insert(key, obj);
            }
        }
    }

    fn record_selection(&mut self, file: usize, id: NodeId, sel: Selection) {
        let key = self.key(file, id);
        if let Some(info) = self.info.as_deref_mut() {
            if let Some(selections) = info.selections.as_mut() {
                selections.insert(key, sel);
            }
        }
    }

    fn record_scope(&mut self, file: usize, id: NodeId, scope: Scope) {
        let key = self.key(file, id);
        if let Some(info) = self.info.as_deref_mut() {
            if let Some(scopes) = info.scopes.as_mut() {
                scopes.insert(key, scope);
            }
        }
    }

    fn record_init(&mut self, file: usize, id: NodeId, name: &str) {
        let key = self.key(file, id);
        if let Some(info) = self.info.as_deref_mut() {
            if let Some(order) = info.init_order.as_mut() {
                order.push(Initializer {
                    name: name.to_string(),
                    id: key,
                });
            }
        }
    }

    // ---- imports ----

    fn resolve_imports(&mut self) {
        for fi in 0..self.files.len() {
            let mut table = FxHashMap::default();
            let specs = self.files[fi].imports.clone();
            for spec in specs {
                let pkg = if spec.path == EXTERN_PATH && self.cfg.fake_extern {
                    Ok(Arc::new(TypesPackage::new_fake(EXTERN_PATH, EXTERN_PATH)))
                } else {
                    self.importer.import(&spec.path)
                };
                match pkg {
                    Ok(pkg) => {
                        let qualifier = pkg.name().to_string();
                        let obj = Object::new(&qualifier, ObjectKind::PkgName, Type::Unknown);
                        self.record_implicit(fi, spec.id, obj);
                        table.insert(
                            qualifier,
                            ImportedRef {
                                pkg,
                                span: spec.span,
                                used: false,
                            },
                        );
                    }
                    Err(message) => {
                        self.hard(fi, spec.span, format!("could not import {}: {message}", spec.path));
                    }
                }
            }
            self.file_imports.push(table);
        }
    }

    fn check_unused_imports(&mut self) {
        for fi in 0..self.files.len() {
            let mut unused: Vec<(String, Span)> = self.file_imports[fi]
                .iter()
                .filter(|(_, r)| !r.used && !r.pkg.is_fake())
                .map(|(_, r)| (r.pkg.import_path().to_string(), r.span))
                .collect();
            unused.sort_by_key(|(_, span)| span.start);
            for (path, span) in unused {
                self.hard(fi, span, format!("{path:?} imported and not used"));
            }
        }
    }

    // ---- declarations ----

    fn type_decls(&self) -> Vec<(usize, TypeDecl)> {
        let mut out = Vec::new();
        for (fi, f) in self.files.iter().enumerate() {
            for d in &f.decls {
                if let Decl::Type(td) = d {
                    out.push((fi, td.clone()));
                }
            }
        }
        out
    }

    fn declare_types(&mut self) {
        let decls = self.type_decls();
        for (fi, td) in &decls {
            if self.check_redeclared(*fi, &td.name, td.name_span) {
                continue;
            }
            let ty = self.named_type(&decls, &td.name);
            let obj = Object::new(&td.name, ObjectKind::TypeName, ty).at(ObjectPos {
                file: self.files[*fi].path.clone(),
                span: td.name_span,
            });
            self.record_def(*fi, td.id, &obj);
            self.scope.insert(obj);
        }
    }

    /// Resolve the named type `name`, memoized, recursing into other type
    /// declarations of this package. Reference cycles resolve the inner
    /// occurrence to a placeholder with an invalid underlying type.
    fn named_type(&mut self, decls: &[(usize, TypeDecl)], name: &str) -> Type {
        if let Some(done) = self.named_done.get(name) {
            return done.clone();
        }
        if !self.named_in_progress.insert(name.to_string()) {
            return Type::Named(Arc::new(NamedType {
                pkg_path: self.pkg_path.clone(),
                name: name.to_string(),
                underlying: Type::Invalid,
            }));
        }
        let Some((fi, td)) = decls.iter().find(|(_, td)| td.name == name) else {
            self.named_in_progress.remove(name);
            return Type::Invalid;
        };
        let underlying = match &td.kind {
            TypeDeclKind::Struct(fields) => {
                let mut resolved = Vec::with_capacity(fields.len());
                for field in fields {
                    let ty = self.resolve_type(decls, *fi, &field.ty);
                    resolved.push((field.name.clone(), ty));
                }
                Type::Struct(Arc::new(StructType { fields: resolved }))
            }
            TypeDeclKind::Alias(texpr) => self.resolve_type(decls, *fi, texpr),
        };
        let ty = Type::Named(Arc::new(NamedType {
            pkg_path: self.pkg_path.clone(),
            name: name.to_string(),
            underlying,
        }));
        self.named_in_progress.remove(name);
        self.named_done.insert(name.to_string(), ty.clone());
        ty
    }

    fn resolve_type(&mut self, decls: &[(usize, TypeDecl)], file: usize, texpr: &TypeExpr) -> Type {
        match texpr {
            TypeExpr::Name { id, name, span } => {
                if decls.iter().any(|(_, td)| &td.name == name) {
                    let ty = self.named_type(decls, name);
                    self.record_type(file, *id, &ty);
                    return ty;
                }
                match universe::universe().lookup(name) {
                    Some(obj) if obj.kind == ObjectKind::TypeName => {
                        let ty = obj.ty.clone();
                        self.record_type(file, *id, &ty);
                        ty
                    }
                    _ => {
                        self.hard(file, *span, format!("undeclared type name: {name}"));
                        Type::Invalid
                    }
                }
            }
            TypeExpr::Qualified {
                id,
                pkg,
                name,
                span,
            } => {
                let ty = self.qualified_member(file, pkg, name, *span, true);
                self.record_type(file, *id, &ty);
                ty
            }
            TypeExpr::Slice { id, elem, span: _ } => {
                let elem_ty = self.resolve_type(decls, file, elem);
                let ty = Type::Slice(Arc::new(elem_ty));
                self.record_type(file, *id, &ty);
                ty
            }
        }
    }

    /// Look up `pkg.name` through the file's import table, marking the
    /// import used. With `want_type` the member must be a type name.
    fn qualified_member(
        &mut self,
        file: usize,
        pkg: &str,
        name: &str,
        span: Span,
        want_type: bool,
    ) -> Type {
        let Some(imp) = self.file_imports[file].get_mut(pkg) else {
            self.hard(file, span, format!("undeclared name: {pkg}"));
            return Type::Invalid;
        };
        imp.used = true;
        let pkg_ref = imp.pkg.clone();
        if pkg_ref.is_fake() {
            return Type::Unknown;
        }
        match pkg_ref.scope().lookup(name) {
            Some(obj) if !obj.exported => {
                let msg = format!("{name} not exported by package {pkg}");
                self.hard(file, span, msg);
                Type::Invalid
            }
            Some(obj) if want_type && obj.kind != ObjectKind::TypeName => {
                self.hard(file, span, format!("{pkg}.{name} is not a type"));
                Type::Invalid
            }
            Some(obj) => obj.ty.clone(),
            None => {
                self.hard(file, span, format!("undefined: {pkg}.{name}"));
                Type::Invalid
            }
        }
    }

    fn check_redeclared(&mut self, file: usize, name: &str, span: Span) -> bool {
        if self.scope.contains(name) {
            self.hard(file, span, format!("{name} redeclared in this package"));
            true
        } else {
            false
        }
    }

    fn declare_values(&mut self) {
        let decls = self.type_decls();
        for fi in 0..self.files.len() {
            let file = self.files[fi].clone();
            for d in &file.decls {
                match d {
                    Decl::Type(_) => {}
                    Decl::Func(fd) => {
                        if self.check_redeclared(fi, &fd.name, fd.name_span) {
                            continue;
                        }
                        let sig = self.func_signature(&decls, fi, fd);
                        let obj = Object::new(&fd.name, ObjectKind::Func, Type::Func(sig))
                            .at(ObjectPos {
                                file: file.path.clone(),
                                span: fd.name_span,
                            });
                        self.record_def(fi, fd.id, &obj);
                        self.scope.insert(obj);
                    }
                    Decl::Var(vd) => {
                        if self.check_redeclared(fi, &vd.name, vd.name_span) {
                            continue;
                        }
                        let ty = self.var_type(&decls, fi, vd, None);
                        let obj = Object::new(&vd.name, ObjectKind::Var, ty).at(ObjectPos {
                            file: file.path.clone(),
                            span: vd.name_span,
                        });
                        self.record_def(fi, vd.id, &obj);
                        if vd.init.is_some() {
                            self.record_init(fi, vd.id, &vd.name);
                        }
                        self.scope.insert(obj);
                    }
                    Decl::Const(cd) => {
                        if self.check_redeclared(fi, &cd.name, cd.name_span) {
                            continue;
                        }
                        let mut locals = FxHashMap::default();
                        let ty = self.expr_type(fi, &mut locals, &cd.value);
                        let obj = Object::new(&cd.name, ObjectKind::Const, ty).at(ObjectPos {
                            file: file.path.clone(),
                            span: cd.name_span,
                        });
                        self.record_def(fi, cd.id, &obj);
                        self.scope.insert(obj);
                    }
                }
            }
        }
    }

    fn func_signature(
        &mut self,
        decls: &[(usize, TypeDecl)],
        file: usize,
        fd: &FuncDecl,
    ) -> Arc<Signature> {
        let mut params = Vec::with_capacity(fd.params.len());
        for p in &fd.params {
            let ty = self.resolve_type(decls, file, &p.ty);
            params.push((p.name.clone(), ty));
        }
        let result = match &fd.ret {
            Some(t) => self.resolve_type(decls, file, t),
            None => Type::Unit,
        };
        Arc::new(Signature { params, result })
    }

    /// The declared or inferred type of a var declaration; checks the
    /// initializer either way.
    fn var_type(
        &mut self,
        decls: &[(usize, TypeDecl)],
        file: usize,
        vd: &VarDecl,
        locals: Option<&mut FxHashMap<String, Local>>,
    ) -> Type {
        let mut empty = FxHashMap::default();
        let locals = locals.unwrap_or(&mut empty);
        let declared = vd.ty.as_ref().map(|t| self.resolve_type(decls, file, t));
        let inferred = vd.init.as_ref().map(|e| self.expr_type(file, locals, e));
        match (declared, inferred) {
            (Some(want), Some(got)) => {
                if !got.assignable_to(&want) {
                    let span = vd.init.as_ref().map(|e| e.span()).unwrap_or(vd.span);
                    self.hard(
                        file,
                        span,
                        format!("cannot use value of type {got} as {want} in assignment"),
                    );
                }
                want
            }
            (Some(want), None) => want,
            (None, Some(got)) => got,
            (None, None) => Type::Invalid,
        }
    }

    // ---- bodies ----

    fn check_bodies(&mut self) {
        let decls = self.type_decls();
        for fi in 0..self.files.len() {
            let file = self.files[fi].clone();
            for d in &file.decls {
                let Decl::Func(fd) = d else { continue };
                self.check_func_body(&decls, fi, fd);
            }
        }
    }

    fn check_func_body(&mut self, decls: &[(usize, TypeDecl)], file: usize, fd: &FuncDecl) {
        let sig = match self.scope.lookup(&fd.name).map(|o| o.ty.clone()) {
            Some(Type::Func(sig)) => sig,
            _ => self.func_signature(decls, file, fd),
        };
        let mut locals: FxHashMap<String, Local> = FxHashMap::default();
        for (p, (_, ty)) in fd.params.iter().zip(sig.params.iter()) {
            locals.insert(
                p.name.clone(),
                Local {
                    ty: ty.clone(),
                    span: p.span,
                    // Unused parameters are allowed.
                    used: true,
                },
            );
        }
        for stmt in &fd.body {
            match stmt {
                Stmt::Var(vd) => {
                    if locals.contains_key(&vd.name) {
                        self.hard(
                            file,
                            vd.name_span,
                            format!("{} redeclared in this block", vd.name),
                        );
                        continue;
                    }
                    let ty = self.var_type(decls, file, vd, Some(&mut locals));
                    let obj = Object::new(&vd.name, ObjectKind::Var, ty.clone());
                    self.record_def(file, vd.id, &obj);
                    locals.insert(
                        vd.name.clone(),
                        Local {
                            ty,
                            span: vd.name_span,
                            used: false,
                        },
                    );
                }
                Stmt::Return { value, span, .. } => {
                    match (value, &sig.result) {
                        (None, Type::Unit) => {}
                        (None, want) => {
                            let msg = format!("missing return value of type {want}");
                            self.hard(file, *span, msg);
                        }
                        (Some(v), want) => {
                            let got = self.expr_type(file, &mut locals, v);
                            if *want == Type::Unit {
                                self.hard(file, v.span(), "unexpected return value");
                            } else if !got.assignable_to(want) {
                                self.hard(
                                    file,
                                    v.span(),
                                    format!("cannot use value of type {got} as {want} in return"),
                                );
                            }
                        }
                    }
                }
                Stmt::Assign { target, value, .. } => {
                    let want = self.expr_type(file, &mut locals, target);
                    let got = self.expr_type(file, &mut locals, value);
                    if !got.assignable_to(&want) {
                        self.hard(
                            file,
                            value.span(),
                            format!("cannot use value of type {got} as {want} in assignment"),
                        );
                    }
                }
                Stmt::Expr(e) => {
                    self.expr_type(file, &mut locals, e);
                }
            }
        }
        let mut unused: Vec<(String, Span)> = locals
            .iter()
            .filter(|(_, l)| !l.used)
            .map(|(name, l)| (name.clone(), l.span))
            .collect();
        unused.sort_by_key(|(_, span)| span.start);
        for (name, span) in unused {
            self.soft(file, span, format!("{name} declared and not used"));
        }
        let mut scope_snapshot = Scope::new();
        for (name, l) in &locals {
            scope_snapshot.insert(Object::new(name, ObjectKind::Var, l.ty.clone()));
        }
        self.record_scope(file, fd.id, scope_snapshot);
    }

    // ---- expressions ----

    fn expr_type(
        &mut self,
        file: usize,
        locals: &mut FxHashMap<String, Local>,
        expr: &Expr,
    ) -> Type {
        let ty = match expr {
            Expr::IntLit { .. } => Type::Int,
            Expr::FloatLit { .. } => Type::Float,
            Expr::StrLit { .. } => Type::String_,
            Expr::Name { id, name, span } => self.name_type(file, locals, *id, name, *span),
            Expr::Selector {
                id,
                recv,
                name,
                span,
            } => self.selector_type(file, locals, *id, recv, name, *span),
            Expr::Call {
                callee, args, span, ..
            } => self.call_type(file, locals, callee, args, *span),
            Expr::Binary {
                op, lhs, rhs, span, ..
            } => {
                let lt = self.expr_type(file, locals, lhs);
                let rt = self.expr_type(file, locals, rhs);
                self.binary_type(file, *op, lt, rt, *span)
            }
        };
        self.record_type(file, expr.id(), &ty);
        ty
    }

    fn name_type(
        &mut self,
        file: usize,
        locals: &mut FxHashMap<String, Local>,
        id: NodeId,
        name: &str,
        span: Span,
    ) -> Type {
        if let Some(local) = locals.get_mut(name) {
            local.used = true;
            return local.ty.clone();
        }
        if let Some(obj) = self.scope.lookup(name).cloned() {
            self.record_use(file, id, &obj);
            return obj.ty;
        }
        if let Some(obj) = universe::universe().lookup(name).cloned() {
            self.record_use(file, id, &obj);
            return obj.ty;
        }
        self.hard(file, span, format!("undeclared name: {name}"));
        Type::Invalid
    }

    fn selector_type(
        &mut self,
        file: usize,
        locals: &mut FxHashMap<String, Local>,
        id: NodeId,
        recv: &Expr,
        name: &str,
        span: Span,
    ) -> Type {
        // A selector whose receiver names an import qualifier is a package
        // member reference, unless the qualifier is shadowed.
        if let Expr::Name { name: qual, .. } = recv {
            let shadowed = locals.contains_key(qual) || self.scope.contains(qual);
            if !shadowed && self.file_imports[file].contains_key(qual) {
                let qual = qual.clone();
                let ty = self.qualified_member(file, &qual, name, span, false);
                if let Some(imp) = self.file_imports[file].get(&qual) {
                    if let Some(obj) = imp.pkg.scope().lookup(name).cloned() {
                        self.record_use(file, id, &obj);
                    }
                }
                return ty;
            }
        }
        let recv_ty = self.expr_type(file, locals, recv);
        match recv_ty.underlying() {
            Type::Unknown => Type::Unknown,
            Type::Invalid => Type::Invalid,
            Type::Struct(st) => match st.fields.iter().find(|(fname, _)| fname == name) {
                Some((fname, fty)) => {
                    self.record_selection(
                        file,
                        id,
                        Selection {
                            recv: recv_ty.clone(),
                            field: fname.clone(),
                            ty: fty.clone(),
                        },
                    );
                    fty.clone()
                }
                None => {
                    self.hard(file, span, format!("type {recv_ty} has no field {name}"));
                    Type::Invalid
                }
            },
            other => {
                self.hard(file, span, format!("type {other} has no field {name}"));
                Type::Invalid
            }
        }
    }

    /// The object a call expression invokes, if it is a direct reference to
    /// a named function. Builtins found this way get lenient argument
    /// checking.
    fn callee_object(&self, file: usize, callee: &Expr) -> Option<Object> {
        match callee {
            Expr::Name { name, .. } => self
                .scope
                .lookup(name)
                .or_else(|| universe::universe().lookup(name))
                .cloned(),
            Expr::Selector { recv, name, .. } => {
                let Expr::Name { name: qual, .. } = &**recv else {
                    return None;
                };
                self.file_imports[file]
                    .get(qual)
                    .and_then(|imp| imp.pkg.scope().lookup(name).cloned())
            }
            _ => None,
        }
    }

    fn call_type(
        &mut self,
        file: usize,
        locals: &mut FxHashMap<String, Local>,
        callee: &Expr,
        args: &[Expr],
        span: Span,
    ) -> Type {
        let callee_obj = self.callee_object(file, callee);
        let callee_ty = self.expr_type(file, locals, callee);
        let arg_types: Vec<(Type, Span)> = args
            .iter()
            .map(|a| (self.expr_type(file, locals, a), a.span()))
            .collect();
        match callee_ty.underlying() {
            Type::Func(sig) => {
                let lenient = callee_obj.is_some_and(|o| o.kind == ObjectKind::Builtin);
                if !lenient {
                    if arg_types.len() != sig.params.len() {
                        self.hard(
                            file,
                            span,
                            format!(
                                "wrong number of arguments: want {}, got {}",
                                sig.params.len(),
                                arg_types.len()
                            ),
                        );
                    } else {
                        for ((got, aspan), (pname, want)) in arg_types.iter().zip(&sig.params) {
                            if !got.assignable_to(want) {
                                self.hard(
                                    file,
                                    *aspan,
                                    format!(
                                        "cannot use value of type {got} as {want} for parameter {pname}"
                                    ),
                                );
                            }
                        }
                    }
                }
                sig.result.clone()
            }
            Type::Unknown => Type::Unknown,
            Type::Invalid => Type::Invalid,
            other => {
                self.hard(file, span, format!("cannot call non-function (type {other})"));
                Type::Invalid
            }
        }
    }

    fn binary_type(&mut self, file: usize, op: BinOp, lt: Type, rt: Type, span: Span) -> Type {
        if matches!(lt, Type::Invalid) || matches!(rt, Type::Invalid) {
            return Type::Invalid;
        }
        if matches!(lt, Type::Unknown) || matches!(rt, Type::Unknown) {
            return if op.is_comparison() {
                Type::Bool
            } else {
                Type::Unknown
            };
        }
        if lt != rt {
            self.hard(
                file,
                span,
                format!("invalid operation {} (mismatched types {lt} and {rt})", op.symbol()),
            );
            return Type::Invalid;
        }
        if op.is_comparison() {
            return Type::Bool;
        }
        match (op, lt.underlying()) {
            (_, Type::Int) | (_, Type::Float) => lt,
            (BinOp::Add, Type::String_) => lt,
            _ => {
                self.hard(
                    file,
                    span,
                    format!("operator {} not defined on {lt}", op.symbol()),
                );
                Type::Invalid
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::CollectingDiagnosticHandler;
    use crate::parser::parse_file;
    use std::path::Path;

    struct NoImports;

    impl ImporterHook for NoImports {
        fn import(&self, ipath: &str) -> Result<Arc<TypesPackage>, String> {
            Err(format!("cannot find package {ipath:?}"))
        }
    }

    struct FixedImport(Arc<TypesPackage>);

    impl ImporterHook for FixedImport {
        fn import(&self, ipath: &str) -> Result<Arc<TypesPackage>, String> {
            if ipath == self.0.import_path() {
                Ok(self.0.clone())
            } else {
                Err(format!("cannot find package {ipath:?}"))
            }
        }
    }

    fn parse(name: &str, src: &str) -> Arc<SourceFile> {
        Arc::new(parse_file(Path::new(name), src).unwrap())
    }

    fn check_with(
        hook: &dyn ImporterHook,
        cfg: CheckConfig,
        files: &[Arc<SourceFile>],
    ) -> (Arc<TypesPackage>, Vec<Diagnostic>) {
        let handler = Arc::new(CollectingDiagnosticHandler::new());
        let checker = Checker::new(cfg, handler.clone(), hook);
        let (pkg, err) = checker.check("p", files, None);
        assert!(err.is_none(), "unexpected check error: {err:?}");
        (pkg.unwrap(), handler.take())
    }

    #[test]
    fn checks_exported_function() {
        let f = parse("a.sl", "package a\nfunc F(x int) int { return x + 1 }\n");
        let (pkg, diags) = check_with(&NoImports, CheckConfig::default(), &[f]);
        assert!(diags.is_empty(), "{diags:?}");
        assert!(pkg.complete());
        let obj = pkg.scope().lookup("F").unwrap();
        assert!(obj.exported);
        let Type::Func(sig) = &obj.ty else {
            panic!("F should be a func")
        };
        assert_eq!(sig.result, Type::Int);
    }

    #[test]
    fn reports_undeclared_name_as_hard() {
        let f = parse("a.sl", "package a\nfunc F() int { return missing }\n");
        let (pkg, diags) = check_with(&NoImports, CheckConfig::default(), &[f]);
        assert!(!pkg.complete());
        assert!(diags.iter().any(|d| !d.soft && d.message.contains("undeclared name: missing")));
    }

    #[test]
    fn unused_local_is_soft() {
        let f = parse("a.sl", "package a\nfunc F() { var x int\n }\n");
        let (pkg, diags) = check_with(&NoImports, CheckConfig::default(), &[f]);
        assert!(pkg.complete());
        assert_eq!(diags.len(), 1);
        assert!(diags[0].soft);
        assert!(diags[0].message.contains("x declared and not used"));
    }

    #[test]
    fn ignore_func_bodies_skips_body_errors() {
        let f = parse("a.sl", "package a\nfunc F() int { return missing }\n");
        let cfg = CheckConfig {
            ignore_func_bodies: true,
            ..CheckConfig::default()
        };
        let (pkg, diags) = check_with(&NoImports, cfg, &[f]);
        assert!(pkg.complete());
        assert!(diags.is_empty());
    }

    #[test]
    fn unused_import_is_hard_and_suppressable() {
        let dep = {
            let mut s = Scope::new();
            s.insert(Object::new("V", ObjectKind::Var, Type::Int));
            let p = TypesPackage::new("q", "q", s);
            p.mark_complete();
            Arc::new(p)
        };
        let f = parse("a.sl", "package a\nimport \"q\"\nfunc F() {}\n");
        let (_, diags) = check_with(
            &FixedImport(dep.clone()),
            CheckConfig::default(),
            &[f.clone()],
        );
        assert!(diags.iter().any(|d| !d.soft && d.message.contains("imported and not used")));

        let cfg = CheckConfig {
            disable_unused_import_check: true,
            ..CheckConfig::default()
        };
        let (pkg, diags) = check_with(&FixedImport(dep), cfg, &[f]);
        assert!(pkg.complete());
        assert!(diags.is_empty());
    }

    #[test]
    fn qualified_member_resolves_and_marks_used() {
        let dep = {
            let mut s = Scope::new();
            s.insert(Object::new("V", ObjectKind::Var, Type::Int));
            s.insert(Object::new("hidden", ObjectKind::Var, Type::Int));
            let p = TypesPackage::new("q", "q", s);
            p.mark_complete();
            Arc::new(p)
        };
        let f = parse("a.sl", "package a\nimport \"q\"\nfunc F() int { return q.V }\n");
        let (pkg, diags) = check_with(&FixedImport(dep.clone()), CheckConfig::default(), &[f]);
        assert!(diags.is_empty(), "{diags:?}");
        assert!(pkg.complete());

        let g = parse("a.sl", "package a\nimport \"q\"\nfunc F() int { return q.hidden }\n");
        let (_, diags) = check_with(&FixedImport(dep), CheckConfig::default(), &[g]);
        assert!(diags.iter().any(|d| d.message.contains("not exported")));
    }

    #[test]
    fn fake_extern_selector_is_trusting() {
        let f = parse(
            "a.sl",
            "package a\nimport \"extern\"\nfunc F() { extern.anything(1, 2) }\n",
        );
        let (pkg, diags) = check_with(&NoImports, CheckConfig::default(), &[f]);
        assert!(diags.is_empty(), "{diags:?}");
        assert!(pkg.complete());
    }

    #[test]
    fn struct_field_access() {
        let f = parse(
            "a.sl",
            "package a\ntype P struct { X int }\nfunc F(p P) int { return p.X }\nfunc G(p P) int { return p.Y }\n",
        );
        let (_, diags) = check_with(&NoImports, CheckConfig::default(), &[f]);
        assert_eq!(diags.len(), 1);
        assert!(diags[0].message.contains("no field Y"));
    }

    #[test]
    fn package_name_mismatch_is_check_error() {
        let a = parse("a.sl", "package a\n");
        let b = parse("b.sl", "package b\n");
        let handler = Arc::new(CollectingDiagnosticHandler::new());
        let checker = Checker::new(CheckConfig::default(), handler, &NoImports);
        let (pkg, err) = checker.check("p", &[a, b], None);
        assert!(pkg.is_none());
        assert!(err.unwrap().message.contains("found packages"));
    }

    #[test]
    fn types_info_collects_requested_maps() {
        let f = parse("a.sl", "package a\nvar X = 1\nfunc F() int { return X }\n");
        let handler = Arc::new(CollectingDiagnosticHandler::new());
        let checker = Checker::new(CheckConfig::default(), handler, &NoImports);
        let mut info = TypesInfo {
            types: Some(FxHashMap::default()),
            defs: Some(FxHashMap::default()),
            uses: Some(FxHashMap::default()),
            init_order: Some(Vec::new()),
            ..TypesInfo::default()
        };
        let (pkg, err) = checker.check("p", &[f], Some(&mut info));
        assert!(err.is_none());
        assert!(pkg.unwrap().complete());
        assert!(!info.types.as_ref().unwrap().is_empty());
        assert!(!info.defs.as_ref().unwrap().is_empty());
        assert!(info.uses.as_ref().unwrap().values().any(|o| o.name == "X"));
        assert_eq!(info.init_order.as_ref().unwrap().len(), 1);
        assert!(info.implicits.is_none());
    }
}
