//! Synthesized builtin packages.
//!
//! Two singletons are eagerly available: the foreign-interface placeholder
//! (`extern`, an empty trusting package) and the `intrinsics` package owned
//! by the type system. Imports of either bypass resolution entirely.
//!
//! Two further packages are built lazily from the documentation sources
//! under the toolchain root: `builtin` and `intrinsics` doc packages whose
//! objects carry the declaration positions of their doc stubs, so editors
//! can jump to documentation.

use crate::ctx::Ctx;
use crate::pkg::Package;
use crate::vfs::clean;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use slate_lang::package::TypesPackage;
use slate_lang::parser::parse_file;
use slate_lang::scope::{Object, ObjectPos, Scope};
use slate_lang::universe::{self, EXTERN_PATH, INTRINSICS_PATH};
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};

static PKG_EXTERN: LazyLock<Arc<Package>> = LazyLock::new(|| {
    Arc::new(Package::from_types(Arc::new(TypesPackage::new_fake(
        EXTERN_PATH,
        EXTERN_PATH,
    ))))
});

static PKG_INTRINSICS: LazyLock<Arc<Package>> =
    LazyLock::new(|| Arc::new(Package::from_types(universe::intrinsics_package())));

/// The pre-built package for a synthesized import path, if `ipath` is one.
pub fn fake_package(ipath: &str) -> Option<Arc<Package>> {
    match ipath {
        EXTERN_PATH => Some(PKG_EXTERN.clone()),
        INTRINSICS_PATH => Some(PKG_INTRINSICS.clone()),
        _ => None,
    }
}

enum DocScope {
    Universe,
    Intrinsics,
}

impl DocScope {
    fn lookup(&self, name: &str) -> Option<Object> {
        match self {
            DocScope::Universe => universe::universe().lookup(name).cloned(),
            DocScope::Intrinsics => universe::intrinsics_package().scope().lookup(name).cloned(),
        }
    }
}

struct DocPkg {
    name: &'static str,
    ipath: &'static str,
    lib_dir: &'static str,
    scope: DocScope,
    loaded: Mutex<FxHashMap<PathBuf, Arc<Package>>>,
}

impl DocPkg {
    /// Parse the doc-stub sources under `<root>/lib/<lib_dir>` and build a
    /// package exposing the underlying scope with doc positions attached.
    /// Names without a doc stub are simply absent; parse failures are
    /// ignored, matching the best-effort nature of documentation loading.
    fn load(&self, ctx: &Ctx, root_dir: &Path) -> Arc<Package> {
        let root = clean(root_dir);
        let mut loaded = self.loaded.lock();
        if let Some(pkg) = loaded.get(&root) {
            return pkg.clone();
        }

        let dir = root.join("lib").join(self.lib_dir);
        let fs = ctx.vfs().fs();
        let mut scope = Scope::new();
        let mut files_map = FxHashMap::default();
        for path in fs.read_dir(&dir).unwrap_or_default() {
            let Some(base) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if !base.ends_with(crate::parse::SOURCE_EXT) {
                continue;
            }
            let Ok(bytes) = fs.read(&path) else { continue };
            let src = String::from_utf8_lossy(&bytes);
            let Ok(file) = parse_file(&path, &src) else {
                continue;
            };
            for decl in &file.decls {
                let Some(base_obj) = self.scope.lookup(decl.name()) else {
                    continue;
                };
                scope.insert(base_obj.at(ObjectPos {
                    file: path.clone(),
                    span: decl.name_span(),
                }));
            }
            files_map.insert(base.to_string(), Arc::new(file));
        }

        let types = TypesPackage::new(self.ipath, self.name, scope);
        types.mark_complete();
        let pkg = Arc::new(Package::new(
            Arc::new(types),
            Some(files_map),
            None,
            None,
        ));
        loaded.insert(root, pkg.clone());
        pkg
    }
}

static BUILTIN_DOCS: LazyLock<DocPkg> = LazyLock::new(|| DocPkg {
    name: "builtin",
    ipath: "builtin",
    lib_dir: "builtin",
    scope: DocScope::Universe,
    loaded: Mutex::new(FxHashMap::default()),
});

static INTRINSICS_DOCS: LazyLock<DocPkg> = LazyLock::new(|| DocPkg {
    name: INTRINSICS_PATH,
    ipath: INTRINSICS_PATH,
    lib_dir: INTRINSICS_PATH,
    scope: DocScope::Intrinsics,
    loaded: Mutex::new(FxHashMap::default()),
});

/// The `builtin` pseudo-package: the universe scope with doc positions.
pub fn pkg_builtin(ctx: &Ctx, root_dir: &Path) -> Arc<Package> {
    BUILTIN_DOCS.load(ctx, root_dir)
}

/// The `intrinsics` doc package: the intrinsics scope with doc positions.
pub fn pkg_intrinsics(ctx: &Ctx, root_dir: &Path) -> Arc<Package> {
    INTRINSICS_DOCS.load(ctx, root_dir)
}
