//! External-archive fallback for packages that reference the foreign
//! toolchain boundary.
//!
//! Such packages cannot be checked from source alone; instead the toolchain
//! is asked to materialize (or locate) a compiled export-data archive, and
//! the archive is read back with the already-imported dependencies in
//! scope. Results land in the completed-package cache, which is consulted
//! first on subsequent imports.

use crate::cache::{cache_key, CacheEntry};
use crate::ctx::{quote_cmd, Ctx, TaskGuard};
use crate::error::ImportError;
use crate::pkg::Package;
use crate::resolver::PkgPath;
use rustc_hash::FxHashMap;
use slate_lang::exportdata;
use slate_lang::package::TypesPackage;
use std::io::Read;
use std::path::Path;
use std::process::{Command, Stdio};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

const TOOL: &str = "slate";
const LIST_ARGS: &[&str] = &["list", "-e", "-export", "-f={{.Export}}"];

pub(crate) fn import_extern_pkg(
    ctx: &Ctx,
    pp: &PkgPath,
    imports: &FxHashMap<String, Arc<Package>>,
) -> Result<Arc<TypesPackage>, ImportError> {
    if let Some(entry) = ctx.cache().get(&pp.dir) {
        debug!(key = %entry.key, "extern import served from cache");
        return Ok(entry.pkg);
    }

    let dir_str = pp.dir.display().to_string();
    let mut args: Vec<&str> = LIST_ARGS.to_vec();
    args.push(&dir_str);
    let title = format!("slate-importer: import_extern_pkg({})", quote_cmd(TOOL, &args));
    let guard = ctx.begin(title);

    let archive_err = |message: String| ImportError::Archive {
        ipath: pp.import_path.clone(),
        message,
    };

    let archive_path = run_list(ctx, &guard, &pp.dir, &args).map_err(&archive_err)?;
    if archive_path.is_empty() {
        return Err(archive_err("toolchain reported no export data".to_string()));
    }

    let bytes = ctx
        .vfs()
        .fs()
        .read(Path::new(&archive_path))
        .map_err(|e| archive_err(format!("cannot open archive {archive_path}: {e}")))?;

    let mut types_imports = FxHashMap::default();
    for (ipath, pkg) in imports {
        types_imports.insert(ipath.clone(), pkg.types.clone());
    }
    let types = exportdata::read_package(&bytes, &types_imports, &pp.import_path)
        .map_err(|e| archive_err(format!("cannot read export data from {archive_path}: {e}")))?;

    ctx.cache().put(CacheEntry {
        key: cache_key(&pp.dir),
        pkg: types.clone(),
        dur: guard.elapsed(),
    });
    Ok(types)
}

/// Run the toolchain's list subcommand in `dir`, returning trimmed stdout.
/// The environment is the context's snapshot; the task guard's cancel flag
/// kills the child.
fn run_list(
    ctx: &Ctx,
    guard: &TaskGuard,
    dir: &Path,
    args: &[&str],
) -> Result<String, String> {
    let mut cmd = Command::new(TOOL);
    cmd.args(args)
        .current_dir(dir)
        .env_clear()
        .envs(ctx.environ())
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    let mut child = cmd
        .spawn()
        .map_err(|e| format!("failed to run {}: {e}", quote_cmd(TOOL, args)))?;

    let status = loop {
        if guard.cancelled() {
            let _ = child.kill();
        }
        match child.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) => std::thread::sleep(Duration::from_millis(5)),
            Err(e) => return Err(format!("failed to wait for {TOOL}: {e}")),
        }
    };

    let mut stdout = String::new();
    if let Some(mut pipe) = child.stdout.take() {
        let _ = pipe.read_to_string(&mut stdout);
    }
    if !status.success() {
        let mut stderr = String::new();
        if let Some(mut pipe) = child.stderr.take() {
            let _ = pipe.read_to_string(&mut stderr);
        }
        return Err(format!("{TOOL} {status}: {}", stderr.trim()));
    }
    Ok(stdout.trim().to_string())
}
