use crate::ast::*;
use crate::lexer::{tokenize, Token, TokenKind};
use crate::span::Span;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[error("{}:{}:{}: {message}", path.display(), span.line, span.column)]
pub struct ParseError {
    pub message: String,
    pub path: PathBuf,
    pub span: Span,
}

impl ParseError {
    pub fn new(message: impl Into<String>, path: PathBuf, span: Span) -> Self {
        Self {
            message: message.into(),
            path,
            span,
        }
    }
}

/// Parse one Slate source file.
pub fn parse_file(path: &Path, src: &str) -> Result<SourceFile, ParseError> {
    let tokens = tokenize(path, src)?;
    Parser::new(path, tokens).parse()
}

struct Parser<'a> {
    path: &'a Path,
    tokens: Vec<Token>,
    pos: usize,
    next_id: NodeId,
}

impl<'a> Parser<'a> {
    fn new(path: &'a Path, tokens: Vec<Token>) -> Self {
        Self {
            path,
            tokens,
            pos: 0,
            next_id: 0,
        }
    }

    fn parse(mut self) -> Result<SourceFile, ParseError> {
        let (package_name, package_span) = self.package_clause()?;
        let mut imports = Vec::new();
        while self.at(&TokenKind::Import) {
            self.import_decl(&mut imports)?;
        }
        let mut decls = Vec::new();
        while !self.at(&TokenKind::Eof) {
            decls.push(self.top_decl()?);
        }
        Ok(SourceFile {
            path: self.path.to_path_buf(),
            package_name,
            package_span,
            imports,
            decls,
            next_id: self.next_id,
        })
    }

    // ---- token plumbing ----

    fn fresh(&mut self) -> NodeId {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn at(&self, kind: &TokenKind) -> bool {
        &self.peek().kind == kind
    }

    fn bump(&mut self) -> Token {
        let tok = self.peek().clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        tok
    }

    fn expect(&mut self, kind: TokenKind) -> Result<Token, ParseError> {
        if self.at(&kind) {
            Ok(self.bump())
        } else {
            Err(self.error(format!(
                "expected {}, found {}",
                kind.describe(),
                self.peek().kind.describe()
            )))
        }
    }

    fn expect_ident(&mut self) -> Result<(String, Span), ParseError> {
        match self.peek().kind.clone() {
            TokenKind::Ident(name) => {
                let tok = self.bump();
                Ok((name, tok.span))
            }
            other => Err(self.error(format!("expected identifier, found {}", other.describe()))),
        }
    }

    fn error(&self, message: impl Into<String>) -> ParseError {
        ParseError::new(message, self.path.to_path_buf(), self.peek().span)
    }

    // ---- grammar ----

    fn package_clause(&mut self) -> Result<(String, Span), ParseError> {
        self.expect(TokenKind::Package)?;
        self.expect_ident()
    }

    fn import_decl(&mut self, out: &mut Vec<ImportSpec>) -> Result<(), ParseError> {
        self.expect(TokenKind::Import)?;
        if self.at(&TokenKind::LParen) {
            self.bump();
            while !self.at(&TokenKind::RParen) {
                out.push(self.import_spec()?);
            }
            self.bump();
            Ok(())
        } else {
            out.push(self.import_spec()?);
            Ok(())
        }
    }

    fn import_spec(&mut self) -> Result<ImportSpec, ParseError> {
        match self.peek().kind.clone() {
            TokenKind::Str(path) => {
                let tok = self.bump();
                if path.is_empty() {
                    return Err(ParseError::new(
                        "empty import path",
                        self.path.to_path_buf(),
                        tok.span,
                    ));
                }
                Ok(ImportSpec {
                    id: self.fresh(),
                    path,
                    span: tok.span,
                })
            }
            other => Err(self.error(format!(
                "expected import path string, found {}",
                other.describe()
            ))),
        }
    }

    fn top_decl(&mut self) -> Result<Decl, ParseError> {
        match self.peek().kind {
            TokenKind::Func => Ok(Decl::Func(self.func_decl()?)),
            TokenKind::Type => Ok(Decl::Type(self.type_decl()?)),
            TokenKind::Var => Ok(Decl::Var(self.var_decl()?)),
            TokenKind::Const => Ok(Decl::Const(self.const_decl()?)),
            TokenKind::Import => Err(self.error("import declarations must precede other declarations")),
            _ => Err(self.error(format!(
                "expected declaration, found {}",
                self.peek().kind.describe()
            ))),
        }
    }

    fn func_decl(&mut self) -> Result<FuncDecl, ParseError> {
        let start = self.expect(TokenKind::Func)?.span;
        let (name, name_span) = self.expect_ident()?;
        self.expect(TokenKind::LParen)?;
        let mut params = Vec::new();
        while !self.at(&TokenKind::RParen) {
            if !params.is_empty() {
                self.expect(TokenKind::Comma)?;
            }
            let (pname, pspan) = self.expect_ident()?;
            let ty = self.type_expr()?;
            params.push(Param {
                id: self.fresh(),
                name: pname,
                span: pspan.to(ty.span()),
                ty,
            });
        }
        self.expect(TokenKind::RParen)?;
        let ret = if self.at(&TokenKind::LBrace) {
            None
        } else {
            Some(self.type_expr()?)
        };
        self.expect(TokenKind::LBrace)?;
        let mut body = Vec::new();
        while !self.at(&TokenKind::RBrace) {
            body.push(self.stmt()?);
        }
        let end = self.expect(TokenKind::RBrace)?.span;
        Ok(FuncDecl {
            id: self.fresh(),
            name,
            name_span,
            params,
            ret,
            body,
            span: start.to(end),
        })
    }

    fn type_decl(&mut self) -> Result<TypeDecl, ParseError> {
        let start = self.expect(TokenKind::Type)?.span;
        let (name, name_span) = self.expect_ident()?;
        if self.at(&TokenKind::Struct) {
            self.bump();
            self.expect(TokenKind::LBrace)?;
            let mut fields = Vec::new();
            while !self.at(&TokenKind::RBrace) {
                let (fname, fspan) = self.expect_ident()?;
                let ty = self.type_expr()?;
                fields.push(Field {
                    name: fname,
                    span: fspan.to(ty.span()),
                    ty,
                });
            }
            let end = self.expect(TokenKind::RBrace)?.span;
            Ok(TypeDecl {
                id: self.fresh(),
                name,
                name_span,
                kind: TypeDeclKind::Struct(fields),
                span: start.to(end),
            })
        } else {
            let ty = self.type_expr()?;
            let span = start.to(ty.span());
            Ok(TypeDecl {
                id: self.fresh(),
                name,
                name_span,
                kind: TypeDeclKind::Alias(ty),
                span,
            })
        }
    }

    fn var_decl(&mut self) -> Result<VarDecl, ParseError> {
        let start = self.expect(TokenKind::Var)?.span;
        let (name, name_span) = self.expect_ident()?;
        let ty = if self.at(&TokenKind::Assign) {
            None
        } else {
            Some(self.type_expr()?)
        };
        let init = if self.at(&TokenKind::Assign) {
            self.bump();
            Some(self.expr()?)
        } else {
            None
        };
        if ty.is_none() && init.is_none() {
            return Err(self.error(format!("var {name} needs a type or an initializer")));
        }
        let end = init
            .as_ref()
            .map(|e| e.span())
            .or_else(|| ty.as_ref().map(|t| t.span()))
            .unwrap_or(name_span);
        Ok(VarDecl {
            id: self.fresh(),
            name,
            name_span,
            ty,
            init,
            span: start.to(end),
        })
    }

    fn const_decl(&mut self) -> Result<ConstDecl, ParseError> {
        let start = self.expect(TokenKind::Const)?.span;
        let (name, name_span) = self.expect_ident()?;
        self.expect(TokenKind::Assign)?;
        let value = self.expr()?;
        let span = start.to(value.span());
        Ok(ConstDecl {
            id: self.fresh(),
            name,
            name_span,
            value,
            span,
        })
    }

    fn type_expr(&mut self) -> Result<TypeExpr, ParseError> {
        if self.at(&TokenKind::LBracket) {
            let start = self.bump().span;
            self.expect(TokenKind::RBracket)?;
            let elem = self.type_expr()?;
            let span = start.to(elem.span());
            return Ok(TypeExpr::Slice {
                id: self.fresh(),
                elem: Box::new(elem),
                span,
            });
        }
        let (name, span) = self.expect_ident()?;
        if self.at(&TokenKind::Dot) {
            self.bump();
            let (member, mspan) = self.expect_ident()?;
            Ok(TypeExpr::Qualified {
                id: self.fresh(),
                pkg: name,
                name: member,
                span: span.to(mspan),
            })
        } else {
            Ok(TypeExpr::Name {
                id: self.fresh(),
                name,
                span,
            })
        }
    }

    fn stmt(&mut self) -> Result<Stmt, ParseError> {
        match self.peek().kind {
            TokenKind::Var => Ok(Stmt::Var(self.var_decl()?)),
            TokenKind::Return => {
                let start = self.bump().span;
                if self.at(&TokenKind::RBrace) {
                    Ok(Stmt::Return {
                        id: self.fresh(),
                        value: None,
                        span: start,
                    })
                } else {
                    let value = self.expr()?;
                    let span = start.to(value.span());
                    Ok(Stmt::Return {
                        id: self.fresh(),
                        value: Some(value),
                        span,
                    })
                }
            }
            _ => {
                let target = self.expr()?;
                if self.at(&TokenKind::Assign) {
                    self.bump();
                    let value = self.expr()?;
                    let span = target.span().to(value.span());
                    Ok(Stmt::Assign {
                        id: self.fresh(),
                        target,
                        value,
                        span,
                    })
                } else {
                    Ok(Stmt::Expr(target))
                }
            }
        }
    }

    fn expr(&mut self) -> Result<Expr, ParseError> {
        self.binary_expr(0)
    }

    fn binop(&self) -> Option<(BinOp, u8)> {
        let op = match self.peek().kind {
            TokenKind::EqEq => (BinOp::Eq, 1),
            TokenKind::NotEq => (BinOp::Ne, 1),
            TokenKind::Lt => (BinOp::Lt, 1),
            TokenKind::Le => (BinOp::Le, 1),
            TokenKind::Gt => (BinOp::Gt, 1),
            TokenKind::Ge => (BinOp::Ge, 1),
            TokenKind::Plus => (BinOp::Add, 2),
            TokenKind::Minus => (BinOp::Sub, 2),
            TokenKind::Star => (BinOp::Mul, 3),
            TokenKind::Slash => (BinOp::Div, 3),
            _ => return None,
        };
        Some(op)
    }

    fn binary_expr(&mut self, min_prec: u8) -> Result<Expr, ParseError> {
        let mut lhs = self.postfix_expr()?;
        while let Some((op, prec)) = self.binop() {
            if prec < min_prec {
                break;
            }
            self.bump();
            let rhs = self.binary_expr(prec + 1)?;
            let span = lhs.span().to(rhs.span());
            lhs = Expr::Binary {
                id: self.fresh(),
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
                span,
            };
        }
        Ok(lhs)
    }

    fn postfix_expr(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.primary_expr()?;
        loop {
            match self.peek().kind {
                TokenKind::Dot => {
                    self.bump();
                    let (name, nspan) = self.expect_ident()?;
                    let span = expr.span().to(nspan);
                    expr = Expr::Selector {
                        id: self.fresh(),
                        recv: Box::new(expr),
                        name,
                        span,
                    };
                }
                TokenKind::LParen => {
                    self.bump();
                    let mut args = Vec::new();
                    while !self.at(&TokenKind::RParen) {
                        if !args.is_empty() {
                            self.expect(TokenKind::Comma)?;
                        }
                        args.push(self.expr()?);
                    }
                    let end = self.expect(TokenKind::RParen)?.span;
                    let span = expr.span().to(end);
                    expr = Expr::Call {
                        id: self.fresh(),
                        callee: Box::new(expr),
                        args,
                        span,
                    };
                }
                _ => return Ok(expr),
            }
        }
    }

    fn primary_expr(&mut self) -> Result<Expr, ParseError> {
        match self.peek().kind.clone() {
            TokenKind::Int(value) => {
                let tok = self.bump();
                Ok(Expr::IntLit {
                    id: self.fresh(),
                    value,
                    span: tok.span,
                })
            }
            TokenKind::Float(value) => {
                let tok = self.bump();
                Ok(Expr::FloatLit {
                    id: self.fresh(),
                    value,
                    span: tok.span,
                })
            }
            TokenKind::Str(value) => {
                let tok = self.bump();
                Ok(Expr::StrLit {
                    id: self.fresh(),
                    value,
                    span: tok.span,
                })
            }
            TokenKind::Ident(name) => {
                let tok = self.bump();
                Ok(Expr::Name {
                    id: self.fresh(),
                    name,
                    span: tok.span,
                })
            }
            TokenKind::LParen => {
                self.bump();
                let inner = self.expr()?;
                self.expect(TokenKind::RParen)?;
                Ok(inner)
            }
            other => Err(self.error(format!("expected expression, found {}", other.describe()))),
        }
    }
}
