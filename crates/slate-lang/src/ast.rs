//! Syntax tree for a single Slate source file.
//!
//! Every node that can appear in a `TypesInfo` map carries a `NodeId`
//! assigned by the parser; ids are unique within one file.

use crate::span::Span;
use std::path::PathBuf;

pub type NodeId = u32;

#[derive(Debug, Clone)]
pub struct SourceFile {
    pub path: PathBuf,
    pub package_name: String,
    pub package_span: Span,
    pub imports: Vec<ImportSpec>,
    pub decls: Vec<Decl>,
    /// Number of node ids allocated while parsing this file; consumers that
    /// merge per-file info maps use it as an offset base.
    pub next_id: NodeId,
}

/// One `import "path"` specifier. The span covers the quoted path string so
/// diagnostics can point at it.
#[derive(Debug, Clone)]
pub struct ImportSpec {
    pub id: NodeId,
    pub path: String,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub enum Decl {
    Func(FuncDecl),
    Type(TypeDecl),
    Var(VarDecl),
    Const(ConstDecl),
}

impl Decl {
    pub fn name(&self) -> &str {
        match self {
            Decl::Func(d) => &d.name,
            Decl::Type(d) => &d.name,
            Decl::Var(d) => &d.name,
            Decl::Const(d) => &d.name,
        }
    }

    pub fn name_span(&self) -> Span {
        match self {
            Decl::Func(d) => d.name_span,
            Decl::Type(d) => d.name_span,
            Decl::Var(d) => d.name_span,
            Decl::Const(d) => d.name_span,
        }
    }
}

#[derive(Debug, Clone)]
pub struct FuncDecl {
    pub id: NodeId,
    pub name: String,
    pub name_span: Span,
    pub params: Vec<Param>,
    pub ret: Option<TypeExpr>,
    pub body: Vec<Stmt>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct Param {
    pub id: NodeId,
    pub name: String,
    pub ty: TypeExpr,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct TypeDecl {
    pub id: NodeId,
    pub name: String,
    pub name_span: Span,
    pub kind: TypeDeclKind,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub enum TypeDeclKind {
    Struct(Vec<Field>),
    Alias(TypeExpr),
}

#[derive(Debug, Clone)]
pub struct Field {
    pub name: String,
    pub ty: TypeExpr,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct VarDecl {
    pub id: NodeId,
    pub name: String,
    pub name_span: Span,
    pub ty: Option<TypeExpr>,
    pub init: Option<Expr>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct ConstDecl {
    pub id: NodeId,
    pub name: String,
    pub name_span: Span,
    pub value: Expr,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub enum TypeExpr {
    /// `int`, `Point`
    Name { id: NodeId, name: String, span: Span },
    /// `geometry.Point`
    Qualified {
        id: NodeId,
        pkg: String,
        name: String,
        span: Span,
    },
    /// `[]T`
    Slice {
        id: NodeId,
        elem: Box<TypeExpr>,
        span: Span,
    },
}

impl TypeExpr {
    pub fn span(&self) -> Span {
        match self {
            TypeExpr::Name { span, .. }
            | TypeExpr::Qualified { span, .. }
            | TypeExpr::Slice { span, .. } => *span,
        }
    }
}

#[derive(Debug, Clone)]
pub enum Stmt {
    Var(VarDecl),
    Return {
        id: NodeId,
        value: Option<Expr>,
        span: Span,
    },
    Assign {
        id: NodeId,
        target: Expr,
        value: Expr,
        span: Span,
    },
    Expr(Expr),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl BinOp {
    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinOp::Eq | BinOp::Ne | BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge
        )
    }

    pub fn symbol(self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Eq => "==",
            BinOp::Ne => "!=",
            BinOp::Lt => "<",
            BinOp::Le => "<=",
            BinOp::Gt => ">",
            BinOp::Ge => ">=",
        }
    }
}

#[derive(Debug, Clone)]
pub enum Expr {
    IntLit {
        id: NodeId,
        value: i64,
        span: Span,
    },
    FloatLit {
        id: NodeId,
        value: f64,
        span: Span,
    },
    StrLit {
        id: NodeId,
        value: String,
        span: Span,
    },
    Name {
        id: NodeId,
        name: String,
        span: Span,
    },
    Selector {
        id: NodeId,
        recv: Box<Expr>,
        name: String,
        span: Span,
    },
    Call {
        id: NodeId,
        callee: Box<Expr>,
        args: Vec<Expr>,
        span: Span,
    },
    Binary {
        id: NodeId,
        op: BinOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
        span: Span,
    },
}

impl Expr {
    pub fn id(&self) -> NodeId {
        match self {
            Expr::IntLit { id, .. }
            | Expr::FloatLit { id, .. }
            | Expr::StrLit { id, .. }
            | Expr::Name { id, .. }
            | Expr::Selector { id, .. }
            | Expr::Call { id, .. }
            | Expr::Binary { id, .. } => *id,
        }
    }

    pub fn span(&self) -> Span {
        match self {
            Expr::IntLit { span, .. }
            | Expr::FloatLit { span, .. }
            | Expr::StrLit { span, .. }
            | Expr::Name { span, .. }
            | Expr::Selector { span, .. }
            | Expr::Call { span, .. }
            | Expr::Binary { span, .. } => *span,
        }
    }
}
