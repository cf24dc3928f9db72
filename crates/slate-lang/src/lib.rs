//! Slate language front end.
//!
//! A Slate package is a directory of `.sl` source files sharing a `package`
//! clause and importing other packages by path. This crate provides the
//! pieces an embedding tool needs to turn such a directory into a
//! type-checked package: the lexer and parser, the object/scope/type model,
//! a type checker with a pluggable importer hook, and a binary export-data
//! format for packages compiled out-of-process.

pub mod ast;
pub mod check;
pub mod diagnostics;
pub mod exportdata;
pub mod lexer;
pub mod package;
pub mod parser;
pub mod scope;
pub mod span;
pub mod types;
pub mod universe;

pub use ast::{NodeId, SourceFile};
pub use check::{CheckConfig, CheckError, Checker, ImporterHook, TypesInfo};
pub use diagnostics::{CollectingDiagnosticHandler, Diagnostic, DiagnosticHandler};
pub use package::TypesPackage;
pub use parser::{parse_file, ParseError};
pub use scope::{Object, ObjectKind, ObjectPos, Scope};
pub use span::Span;
pub use types::{Sizes, Type};
