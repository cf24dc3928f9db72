//! Import path resolution.
//!
//! Maps an import path plus a source directory to a [`PkgPath`]: the
//! canonical import string, the package directory, and the enclosing module
//! if any. A module is declared by a `slate.mod` file whose first `module`
//! directive names the module's import-path prefix.
//!
//! Search order for absolute import paths: the standard library under
//! `<root>/lib`, the enclosing module, then each `SLATE_PATH` entry.
//! Package discovery requires the directory to exist in the (possibly
//! in-memory) file system; overlays supply file content, not structure.

use crate::config::BuildCtx;
use crate::ctx::Ctx;
use crate::vfs::{clean, to_slash};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

pub const MODULE_FILE: &str = "slate.mod";

#[derive(Debug, Clone, Error)]
pub enum ResolveError {
    #[error("cannot find package {ipath:?} in any of: {}", searched.join(", "))]
    NotFound { ipath: String, searched: Vec<String> },
}

/// A module: a directory tree whose packages share an import-path prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Module {
    pub root: PathBuf,
    pub path: String,
}

/// The resolved identity of a package.
#[derive(Debug, Clone)]
pub struct PkgPath {
    pub import_path: String,
    pub dir: PathBuf,
    pub module: Option<Arc<Module>>,
}

/// Walk up from `dir` looking for a `slate.mod` file.
pub fn find_module(ctx: &Ctx, dir: &Path) -> Option<Arc<Module>> {
    let fs = ctx.vfs().fs();
    let mut cur = clean(dir);
    loop {
        let mod_file = cur.join(MODULE_FILE);
        if let Ok(bytes) = fs.read(&mod_file) {
            let text = String::from_utf8_lossy(&bytes);
            for line in text.lines() {
                let line = line.trim();
                if let Some(rest) = line.strip_prefix("module ") {
                    return Some(Arc::new(Module {
                        root: cur,
                        path: rest.trim().to_string(),
                    }));
                }
            }
            return None;
        }
        if !cur.pop() {
            return None;
        }
    }
}

/// Resolve `ipath` relative to `src_dir` under the build configuration.
/// `module` is the module of the importing package, if known; otherwise it
/// is discovered from `src_dir`.
pub fn find_pkg(
    ctx: &Ctx,
    bld: &BuildCtx,
    module: Option<&Arc<Module>>,
    ipath: &str,
    src_dir: &Path,
) -> Result<PkgPath, ResolveError> {
    let fs = ctx.vfs().fs();

    if ipath.starts_with("./") || ipath.starts_with("../") {
        let dir = clean(&src_dir.join(ipath));
        if !fs.is_dir(&dir) {
            return Err(ResolveError::NotFound {
                ipath: ipath.to_string(),
                searched: vec![dir.display().to_string()],
            });
        }
        let module = module
            .cloned()
            .or_else(|| find_module(ctx, &dir));
        let import_path = module
            .as_ref()
            .and_then(|m| module_import_path(m, &dir))
            .unwrap_or_else(|| to_slash(&dir));
        return Ok(PkgPath {
            import_path,
            dir,
            module,
        });
    }

    let module = module.cloned().or_else(|| find_module(ctx, src_dir));
    let mut searched = Vec::new();

    // 1. The standard library.
    let std_dir = clean(&bld.root_dir.join("lib").join(ipath));
    if fs.is_dir(&std_dir) {
        return Ok(PkgPath {
            import_path: ipath.to_string(),
            dir: std_dir,
            module: None,
        });
    }
    searched.push(std_dir.display().to_string());

    // 2. The enclosing module.
    if let Some(m) = &module {
        if let Some(rest) = strip_module_prefix(ipath, &m.path) {
            let dir = clean(&m.root.join(rest));
            if fs.is_dir(&dir) {
                return Ok(PkgPath {
                    import_path: ipath.to_string(),
                    dir,
                    module: Some(m.clone()),
                });
            }
            searched.push(dir.display().to_string());
        }
    }

    // 3. The search path.
    for root in &bld.search_paths {
        let dir = clean(&root.join(ipath));
        if fs.is_dir(&dir) {
            let module = find_module(ctx, &dir);
            return Ok(PkgPath {
                import_path: ipath.to_string(),
                dir,
                module,
            });
        }
        searched.push(dir.display().to_string());
    }

    Err(ResolveError::NotFound {
        ipath: ipath.to_string(),
        searched,
    })
}

/// The import path of `dir` inside module `m`, if `dir` is under its root.
fn module_import_path(m: &Module, dir: &Path) -> Option<String> {
    let rel = dir.strip_prefix(&m.root).ok()?;
    if rel.as_os_str().is_empty() {
        return Some(m.path.clone());
    }
    Some(format!("{}/{}", m.path, to_slash(rel)))
}

/// `"m/sub"` relative to module path `"m"` is `"sub"`; the module path
/// itself maps to the module root.
fn strip_module_prefix<'a>(ipath: &'a str, module_path: &str) -> Option<&'a str> {
    if ipath == module_path {
        return Some("");
    }
    ipath
        .strip_prefix(module_path)
        .and_then(|rest| rest.strip_prefix('/'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vfs::MemFs;
    use rustc_hash::FxHashMap;

    fn test_ctx() -> (Arc<Ctx>, Arc<MemFs>, BuildCtx) {
        let fs = Arc::new(MemFs::new());
        let mut env = FxHashMap::default();
        env.insert("SLATE_ROOT".to_string(), "/slate".to_string());
        env.insert("SLATE_PATH".to_string(), "/deps".to_string());
        let ctx = Ctx::with_env(fs.clone(), env);
        let bld = BuildCtx::from_ctx(&ctx);
        (ctx, fs, bld)
    }

    #[test]
    fn resolves_std_lib_first() {
        let (ctx, fs, bld) = test_ctx();
        fs.insert("/slate/lib/fmt/fmt.sl", "package fmt");
        fs.insert("/deps/fmt/fmt.sl", "package fmt");

        let pp = find_pkg(&ctx, &bld, None, "fmt", Path::new("/work")).unwrap();
        assert_eq!(pp.dir, PathBuf::from("/slate/lib/fmt"));
        assert_eq!(pp.import_path, "fmt");
        assert!(pp.module.is_none());
    }

    #[test]
    fn resolves_module_relative_import() {
        let (ctx, fs, bld) = test_ctx();
        fs.insert("/work/slate.mod", "module example.com/app\n");
        fs.insert("/work/util/u.sl", "package util");

        let pp = find_pkg(
            &ctx,
            &bld,
            None,
            "example.com/app/util",
            Path::new("/work"),
        )
        .unwrap();
        assert_eq!(pp.dir, PathBuf::from("/work/util"));
        assert_eq!(pp.module.unwrap().path, "example.com/app");
    }

    #[test]
    fn resolves_search_path_and_dot_relative() {
        let (ctx, fs, bld) = test_ctx();
        fs.insert("/deps/extra/e.sl", "package extra");
        let pp = find_pkg(&ctx, &bld, None, "extra", Path::new("/work")).unwrap();
        assert_eq!(pp.dir, PathBuf::from("/deps/extra"));

        fs.insert("/work/sub/s.sl", "package sub");
        let pp = find_pkg(&ctx, &bld, None, "./sub", Path::new("/work")).unwrap();
        assert_eq!(pp.dir, PathBuf::from("/work/sub"));
        assert_eq!(pp.import_path, "/work/sub");
    }

    #[test]
    fn missing_package_reports_searched_dirs() {
        let (ctx, _fs, bld) = test_ctx();
        let err = find_pkg(&ctx, &bld, None, "nope", Path::new("/work")).unwrap_err();
        let ResolveError::NotFound { ipath, searched } = err;
        assert_eq!(ipath, "nope");
        assert!(searched.iter().any(|s| s.contains("/slate/lib/nope")));
        assert!(searched.iter().any(|s| s.contains("/deps/nope")));
    }
}
