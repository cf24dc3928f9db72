use crate::pkg::Package;
use crate::resolver::ResolveError;
use slate_lang::check::CheckError;
use slate_lang::parser::ParseError;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

/// Errors surfaced by the importer.
///
/// `Clone` is required: a `State` stores the error of its last check and
/// re-serves it to every requester until the state is invalidated.
#[derive(Debug, Clone, Error)]
pub enum ImportError {
    #[error("srcDir is not absolute: {}", .0.display())]
    NonAbsoluteSrcDir(PathBuf),

    #[error("unsupported import mode {0}")]
    UnsupportedMode(u32),

    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("no buildable Slate source files in {}", .0.display())]
    NoSourceFiles(PathBuf),

    #[error("import cycle: {chain}")]
    Cycle { chain: String },

    /// A dependency import failure annotated with the position of the
    /// offending import specifier, ready for an editor diagnostic. `row` and
    /// `col` are zero-based.
    #[error("{}:{row}:{col}: {message}", path.display())]
    Issue {
        path: PathBuf,
        row: u32,
        col: u32,
        message: String,
    },

    #[error(transparent)]
    Check(#[from] CheckError),

    #[error("cannot import package {ipath:?}: {message}")]
    Archive { ipath: String, message: String },

    /// The stored package exists but was never marked complete; the caller
    /// may treat this as a soft warning and still use the package.
    #[error("reimported partially imported package {ipath:?}")]
    IncompleteReimport { ipath: String, pkg: Arc<Package> },

    #[error("internal: package {0:?} has no stored result")]
    MissingResult(String),
}

pub type Result<T> = std::result::Result<T, ImportError>;
