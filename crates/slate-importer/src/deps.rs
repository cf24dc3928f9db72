//! Dependency fan-out: import a package's direct dependencies, concurrently
//! when it pays off.
//!
//! Failures are promoted to editor-ready issues when the offending import
//! specifier can be located in the importer's sources. The first failure
//! cancels the remaining work.

use crate::error::{ImportError, Result};
use crate::importer::Importer;
use crate::parse::BuildPackage;
use crate::pkg::Package;
use crate::state::State;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use slate_lang::ast::SourceFile;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use tracing::debug;

/// Upper bound on fan-out workers, independent of core count.
const MAX_IMPORT_WORKERS: usize = 16;

pub(crate) fn import_deps(
    kp: &Importer<'_>,
    ks: &State,
    bp: &BuildPackage,
    files_list: &[Arc<SourceFile>],
) -> Result<FxHashMap<String, Arc<Package>>> {
    let mut paths: Vec<String> = Vec::new();
    for p in &bp.imports {
        if !paths.contains(p) {
            paths.push(p.clone());
        }
    }
    if ks.key.tests {
        for p in &bp.test_imports {
            if !paths.contains(p) {
                paths.push(p.clone());
            }
        }
    }

    let do_import = |ipath: &str| -> Result<Arc<Package>> {
        kp.import_package(ipath, &bp.dir)
            .map_err(|err| annotate(err, ipath, files_list))
    };

    if kp.no_concurrency() || paths.len() < 2 {
        let mut imports = FxHashMap::default();
        for ipath in &paths {
            let pkg = do_import(ipath)?;
            imports.insert(ipath.clone(), pkg);
        }
        return Ok(imports);
    }

    let workers = thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
        .min(paths.len())
        .min(MAX_IMPORT_WORKERS);
    debug!(pkg = %bp.import_path, deps = paths.len(), workers, "importing dependencies");

    let next = AtomicUsize::new(0);
    let stop = AtomicBool::new(false);
    let first_err: Mutex<Option<ImportError>> = Mutex::new(None);
    let imports: Mutex<FxHashMap<String, Arc<Package>>> = Mutex::new(FxHashMap::default());

    thread::scope(|s| {
        for _ in 0..workers {
            s.spawn(|| loop {
                if stop.load(Ordering::Acquire) {
                    return;
                }
                let i = next.fetch_add(1, Ordering::Relaxed);
                if i >= paths.len() {
                    return;
                }
                match do_import(&paths[i]) {
                    Ok(pkg) => {
                        imports.lock().insert(paths[i].clone(), pkg);
                    }
                    Err(err) => {
                        let mut slot = first_err.lock();
                        if slot.is_none() {
                            *slot = Some(err);
                        }
                        stop.store(true, Ordering::Release);
                        return;
                    }
                }
            });
        }
    });

    match first_err.into_inner() {
        Some(err) => Err(err),
        None => Ok(imports.into_inner()),
    }
}

/// Attach the position of the import specifier naming `ipath`, if one of
/// the parsed files carries it; otherwise surface the error unchanged.
/// Positions are zero-based for editor consumption.
fn annotate(err: ImportError, ipath: &str, files_list: &[Arc<SourceFile>]) -> ImportError {
    for file in files_list {
        for spec in &file.imports {
            if spec.path == ipath {
                return ImportError::Issue {
                    path: file.path.clone(),
                    row: spec.span.line.saturating_sub(1),
                    col: spec.span.column.saturating_sub(1),
                    message: err.to_string(),
                };
            }
        }
    }
    err
}

#[cfg(test)]
mod tests {
    use super::*;
    use slate_lang::parser::parse_file;
    use std::path::Path;

    #[test]
    fn annotate_finds_the_import_spec() {
        let file = Arc::new(
            parse_file(
                Path::new("/p/a.sl"),
                "package p\nimport (\n\t\"x\"\n\t\"y\"\n)\n",
            )
            .unwrap(),
        );
        let err = annotate(
            ImportError::NoSourceFiles(Path::new("/y").to_path_buf()),
            "y",
            std::slice::from_ref(&file),
        );
        let ImportError::Issue { path, row, col, message } = err else {
            panic!("expected issue, got {err:?}")
        };
        assert_eq!(path, Path::new("/p/a.sl"));
        assert_eq!(row, 3);
        assert_eq!(col, 1);
        assert!(message.contains("no buildable Slate source files"));
    }

    #[test]
    fn annotate_passes_through_unknown_paths() {
        let file = Arc::new(parse_file(Path::new("/p/a.sl"), "package p\n").unwrap());
        let err = annotate(
            ImportError::NoSourceFiles(Path::new("/y").to_path_buf()),
            "y",
            &[file],
        );
        assert!(matches!(err, ImportError::NoSourceFiles(_)));
    }
}
