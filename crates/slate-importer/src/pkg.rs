//! The importer's package value.

use rustc_hash::FxHashMap;
use slate_lang::ast::SourceFile;
use slate_lang::check::TypesInfo;
use slate_lang::package::TypesPackage;
use std::sync::Arc;

/// A completed check result. All fields except the underlying types package
/// are optional: archive-imported packages carry no type info, and
/// synthesized builtins carry neither files nor imports.
#[derive(Debug)]
pub struct Package {
    pub types: Arc<TypesPackage>,
    /// Parsed files by base name.
    pub files: Option<FxHashMap<String, Arc<SourceFile>>>,
    /// Type info, when the state key requested any.
    pub info: Option<TypesInfo>,
    /// Recursively imported direct dependencies by import path.
    pub imports: Option<FxHashMap<String, Arc<Package>>>,
}

impl Package {
    pub fn new(
        types: Arc<TypesPackage>,
        files: Option<FxHashMap<String, Arc<SourceFile>>>,
        info: Option<TypesInfo>,
        imports: Option<FxHashMap<String, Arc<Package>>>,
    ) -> Package {
        Package {
            types,
            files,
            info,
            imports,
        }
    }

    /// A package wrapping only a types package.
    pub fn from_types(types: Arc<TypesPackage>) -> Package {
        Package::new(types, None, None, None)
    }
}
