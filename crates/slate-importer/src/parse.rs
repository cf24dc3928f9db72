//! Overlay-aware directory scanning and parsing.
//!
//! Turns a package directory into build metadata plus parsed files. The
//! user's unsaved buffers shadow on-disk content: `pkg_src` (target package
//! only) wins over `src_map` (whole-workspace overlay) wins over the file
//! system. Overlay entries may also add files the directory does not have
//! on disk.
//!
//! File selection follows the build configuration: `*_test.sl` files are
//! included only when tests are requested, `_<os>`/`_<arch>` basename
//! suffixes must match the target platform, and a leading `//slate:build`
//! comment line restricts a file to builds carrying all listed tags.

use crate::config::BuildCtx;
use crate::ctx::Ctx;
use crate::error::{ImportError, Result};
use crate::resolver::PkgPath;
use crate::vfs::clean;
use rustc_hash::FxHashMap;
use slate_lang::ast::SourceFile;
use slate_lang::parser::parse_file;
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;

pub const SOURCE_EXT: &str = ".sl";
const TEST_SUFFIX: &str = "_test";

const KNOWN_OS: &[&str] = &["linux", "darwin", "windows", "freebsd", "js"];
const KNOWN_ARCH: &[&str] = &["amd64", "arm64", "x86", "arm", "wasm"];

/// Build metadata for one package directory.
#[derive(Debug, Clone)]
pub struct BuildPackage {
    pub dir: std::path::PathBuf,
    pub import_path: String,
    pub name: String,
    /// Included file basenames, sorted.
    pub files: Vec<String>,
    /// Import paths of non-test files, first-seen order, deduplicated.
    pub imports: Vec<String>,
    /// Additional import paths of test files.
    pub test_imports: Vec<String>,
    /// Files that reference the foreign toolchain boundary; their presence
    /// switches the package to the external-archive import path.
    pub extern_files: Vec<String>,
}

#[derive(Debug)]
pub struct ParsedDir {
    pub bp: BuildPackage,
    /// Basename -> parsed file.
    pub files_map: FxHashMap<String, Arc<SourceFile>>,
    /// Parsed files in basename order.
    pub files_list: Vec<Arc<SourceFile>>,
}

pub(crate) fn parse_dir(
    ctx: &Ctx,
    bld: &BuildCtx,
    pp: &PkgPath,
    src_map: &FxHashMap<String, Vec<u8>>,
    pkg_src: &FxHashMap<String, Vec<u8>>,
    include_tests: bool,
) -> Result<ParsedDir> {
    let dir = clean(&pp.dir);
    let fs = ctx.vfs().fs();

    // Overlay lookaside tables keyed by basename.
    let mut pkg_src_files: FxHashMap<String, &Vec<u8>> = FxHashMap::default();
    for (key, content) in pkg_src {
        let p = clean(Path::new(key));
        if p.parent() == Some(dir.as_path()) || !key.contains('/') {
            if let Some(base) = p.file_name().and_then(|n| n.to_str()) {
                pkg_src_files.insert(base.to_string(), content);
            }
        }
    }
    let mut src_map_files: FxHashMap<String, &Vec<u8>> = FxHashMap::default();
    for (key, content) in src_map {
        let p = clean(Path::new(key));
        if p.parent() == Some(dir.as_path()) {
            if let Some(base) = p.file_name().and_then(|n| n.to_str()) {
                src_map_files.insert(base.to_string(), content);
            }
        }
    }

    // Candidate basenames: directory listing plus overlay-only files.
    let mut names = BTreeSet::new();
    if let Ok(listing) = fs.read_dir(&dir) {
        for path in listing {
            if let Some(base) = path.file_name().and_then(|n| n.to_str()) {
                names.insert(base.to_string());
            }
        }
    }
    names.extend(pkg_src_files.keys().cloned());
    names.extend(src_map_files.keys().cloned());

    let mut bp = BuildPackage {
        dir: dir.clone(),
        import_path: pp.import_path.clone(),
        name: String::new(),
        files: Vec::new(),
        imports: Vec::new(),
        test_imports: Vec::new(),
        extern_files: Vec::new(),
    };
    let mut files_map = FxHashMap::default();
    let mut files_list = Vec::new();

    for name in names {
        let Some(stem) = name.strip_suffix(SOURCE_EXT) else {
            continue;
        };
        let is_test = stem.ends_with(TEST_SUFFIX);
        if is_test && !include_tests {
            continue;
        }
        let platform_stem = stem.strip_suffix(TEST_SUFFIX).unwrap_or(stem);
        if !platform_matches(platform_stem, bld) {
            continue;
        }

        let path = dir.join(&name);
        let content = match pkg_src_files
            .get(&name)
            .or_else(|| src_map_files.get(&name))
        {
            Some(overlay) => (*overlay).clone(),
            None => match fs.read(&path) {
                Ok(bytes) => bytes,
                // Listed a moment ago but unreadable now: skip.
                Err(_) => continue,
            },
        };
        let src = String::from_utf8_lossy(&content).into_owned();
        if !tags_match(&src, &bld.tags) {
            continue;
        }

        let file = Arc::new(parse_file(&path, &src)?);
        if bp.name.is_empty() {
            bp.name = file.package_name.clone();
        }
        let imports = if is_test {
            &mut bp.test_imports
        } else {
            &mut bp.imports
        };
        for spec in &file.imports {
            if !imports.contains(&spec.path) {
                imports.push(spec.path.clone());
            }
        }
        if file
            .imports
            .iter()
            .any(|s| s.path == slate_lang::universe::EXTERN_PATH)
        {
            bp.extern_files.push(name.clone());
        }
        bp.files.push(name.clone());
        files_map.insert(name, file.clone());
        files_list.push(file);
    }

    if files_list.is_empty() {
        return Err(ImportError::NoSourceFiles(dir));
    }

    Ok(ParsedDir {
        bp,
        files_map,
        files_list,
    })
}

/// Platform suffix filtering: a final `_<os>` or `_<arch>` segment of the
/// basename restricts the file to that platform.
fn platform_matches(stem: &str, bld: &BuildCtx) -> bool {
    let Some((_, last)) = stem.rsplit_once('_') else {
        return true;
    };
    if KNOWN_OS.contains(&last) {
        return last == bld.os;
    }
    if KNOWN_ARCH.contains(&last) {
        return last == bld.arch;
    }
    true
}

/// A leading `//slate:build tag...` line restricts a file to builds
/// carrying all listed tags. Only the comment block before the package
/// clause is considered.
fn tags_match(src: &str, tags: &[String]) -> bool {
    for line in src.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if let Some(rest) = line.strip_prefix("//slate:build") {
            return rest
                .split_whitespace()
                .all(|want| tags.iter().any(|have| have == want));
        }
        if !line.starts_with("//") {
            break;
        }
    }
    true
}
