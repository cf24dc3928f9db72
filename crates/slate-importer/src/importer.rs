//! The importer driver.
//!
//! An [`Importer`] answers "give me the fully type-checked package for this
//! import path, considering the user's unsaved edits". Results are memoized
//! per [`StateKey`] in the process-wide registry; repeated queries return
//! the cached package until the VFS invalidates it or the overlay changes.
//!
//! Each descent into a dependency works on a *branch*: a by-value copy of
//! the importer with a pointer to its parent. The parent chain doubles as
//! the import stack for cycle detection, which must run before the target
//! state's lock is taken - the lock is held across the entire check,
//! including recursive imports, and only the cycle check makes that
//! deadlock-free.

use crate::archive;
use crate::builtin;
use crate::config::{BuildCtx, Config};
use crate::ctx::Ctx;
use crate::deps;
use crate::error::{ImportError, Result};
use crate::hash::{src_map_hash, tags_str};
use crate::parse;
use crate::pkg::Package;
use crate::resolver::{self, Module, PkgPath};
use crate::state::{State, StateKey};
use crate::vfs::clean;
use rustc_hash::FxHashMap;
use slate_lang::check::{CheckConfig, Checker, ImporterHook};
use slate_lang::diagnostics::CollectingDiagnosticHandler;
use slate_lang::package::TypesPackage;
use slate_lang::types::Sizes;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

pub struct Importer<'a> {
    ctx: Arc<Ctx>,
    cfg: Config,
    bld: BuildCtx,
    /// The state being checked; `None` at the root of a call.
    ks: Option<Arc<State>>,
    /// The module of the package being checked, if any.
    module: Option<Arc<Module>>,
    /// Parent branch; the chain is the active import stack.
    par: Option<&'a Importer<'a>>,
    /// Sorted, space-joined effective build tags.
    tags: String,
    /// Overlay hash of this descent; empty for dependency branches.
    hash: String,
}

impl Importer<'static> {
    pub fn new(ctx: Arc<Ctx>, cfg: Config) -> Importer<'static> {
        let bld = BuildCtx::from_ctx(&ctx);
        let tags = tags_str(&bld.tags);
        let hash = src_map_hash(&cfg.src_map);
        Importer {
            ctx,
            cfg,
            bld,
            ks: None,
            module: None,
            par: None,
            tags,
            hash,
        }
    }
}

impl<'a> Importer<'a> {
    /// Import relative to the current directory. Equivalent to
    /// `import_from(ipath, ".", 0)`.
    pub fn import(&self, ipath: &str) -> Result<Arc<TypesPackage>> {
        self.import_from(ipath, Path::new("."), 0)
    }

    /// Import `ipath` relative to `src_dir`. Nonzero modes are unsupported.
    pub fn import_from(
        &self,
        ipath: &str,
        src_dir: &Path,
        mode: u32,
    ) -> Result<Arc<TypesPackage>> {
        if mode != 0 {
            return Err(ImportError::UnsupportedMode(mode));
        }
        Ok(self.import_package(ipath, src_dir)?.types.clone())
    }

    /// Import the package with import path `ipath` relative to `src_dir`.
    /// All `Package` fields except the underlying types package are
    /// optional.
    pub fn import_package(&self, ipath: &str, src_dir: &Path) -> Result<Arc<Package>> {
        if let Some(pkg) = builtin::fake_package(ipath) {
            return Ok(pkg);
        }
        let src_dir = self.absolute(src_dir)?;
        let pp = self.find_pkg(ipath, &src_dir)?;
        self.import_pkg(&pp)
    }

    pub fn ctx(&self) -> &Arc<Ctx> {
        &self.ctx
    }

    pub(crate) fn no_concurrency(&self) -> bool {
        self.cfg.no_concurrency
    }

    fn absolute(&self, src_dir: &Path) -> Result<PathBuf> {
        let abs = if src_dir.is_absolute() {
            src_dir.to_path_buf()
        } else {
            match std::env::current_dir() {
                Ok(cwd) => cwd.join(src_dir),
                Err(_) => src_dir.to_path_buf(),
            }
        };
        let abs = clean(&abs);
        if !abs.is_absolute() {
            return Err(ImportError::NonAbsoluteSrcDir(abs));
        }
        Ok(abs)
    }

    fn find_pkg(&self, ipath: &str, src_dir: &Path) -> Result<PkgPath> {
        debug!(ipath, src_dir = %src_dir.display(), "findPkg");
        Ok(resolver::find_pkg(
            &self.ctx,
            &self.bld,
            self.module.as_ref(),
            ipath,
            src_dir,
        )?)
    }

    fn state_key(&self, pp: &PkgPath) -> StateKey {
        StateKey {
            import_path: pp.import_path.clone(),
            dir: pp.dir.clone(),
            check_funcs: self.cfg.check_funcs,
            check_imports: self.cfg.check_imports,
            tests: self.cfg.tests,
            tags: self.tags.clone(),
            os: self.bld.os.clone(),
            arch: self.bld.arch.clone(),
            root_dir: self.bld.root_dir.clone(),
            search_path: self.bld.search_path_string(),
            no_hash: self.hash.is_empty(),
            types_info: self.cfg.types_info,
        }
    }

    fn state(&self, pp: &PkgPath) -> Arc<State> {
        self.ctx
            .registry()
            .obtain(self.ctx.vfs(), self.state_key(pp))
    }

    /// Reject an import that targets any state on the active import stack.
    /// Must run before taking the target's lock.
    fn detect_cycle(&self, pp: &PkgPath) -> Result<()> {
        let mut hit = false;
        let mut frame: Option<&Importer<'_>> = Some(self);
        while let Some(imp) = frame {
            if imp.ks.as_ref().is_some_and(|ks| ks.key.targets(pp)) {
                hit = true;
                break;
            }
            frame = imp.par;
        }
        if !hit {
            return Ok(());
        }
        let mut chain = vec![format!("{}({})", pp.import_path, pp.dir.display())];
        let mut frame: Option<&Importer<'_>> = Some(self);
        while let Some(imp) = frame {
            if let Some(ks) = &imp.ks {
                chain.push(format!(
                    "{}({})",
                    ks.key.import_path,
                    ks.key.dir.display()
                ));
                if ks.key.targets(pp) {
                    break;
                }
            }
            frame = imp.par;
        }
        Err(ImportError::Cycle {
            chain: chain.join(" <~ "),
        })
    }

    fn import_pkg(&self, pp: &PkgPath) -> Result<Arc<Package>> {
        debug!(ipath = %pp.import_path, "import");
        self.detect_cycle(pp)?;
        let ks = self.state(pp);
        let kx = self.branch(&ks, pp);

        let mut res = ks.lock_result();
        if ks.valid(&res, &self.hash) {
            debug!(ipath = %pp.import_path, "import served from state");
            return ks.result(&res);
        }
        // Sampled before checking, so an invalidation that lands while we
        // work strictly exceeds it and the result reads as stale.
        let chk_at = self.ctx.vfs().current_tick();
        let (pkg, err) = kx.check(&ks, pp, &self.cfg.package_src);
        res.pkg = pkg;
        res.err = err;
        res.hash = self.hash.clone();
        ks.set_checked_at(chk_at);
        ks.result(&res)
    }

    /// Snapshot a child importer for checking `pp` under state `ks`.
    ///
    /// Root-only configuration does not survive a branch: the target-package
    /// overlay, function-body and unused-import checks, test inclusion and
    /// the overlay hash apply to the root call, never to transitive
    /// dependencies. The branch adopts the resolved module, records the
    /// reverse-dependency edge, and forces js/wasm when descending into the
    /// foreign-syscall directory.
    fn branch<'s>(&'s self, ks: &Arc<State>, pp: &PkgPath) -> Importer<'s> {
        let mut kx = Importer {
            ctx: self.ctx.clone(),
            cfg: self.cfg.clone(),
            bld: self.bld.clone(),
            ks: Some(ks.clone()),
            module: pp.module.clone().or_else(|| self.module.clone()),
            par: Some(self),
            tags: self.tags.clone(),
            hash: String::new(),
        };
        if let Some(parent_ks) = &self.ks {
            ks.imported_by(parent_ks);
        }
        if !self.cfg.imports_types_info {
            kx.cfg.types_info = crate::config::TypesInfoMask::NONE;
        }
        kx.cfg.package_src = FxHashMap::default();
        kx.cfg.check_funcs = false;
        kx.cfg.check_imports = false;
        kx.cfg.tests = false;
        kx.setup_js(pp);
        kx
    }

    /// The foreign-syscall package only builds for the js/wasm pair.
    fn setup_js(&mut self, pp: &PkgPath) {
        let vfs = self.ctx.vfs();
        let nd = vfs.poke(&self.bld.root_dir.join("lib").join("sys").join("js"));
        if vfs.poke(&pp.dir) != nd {
            return;
        }
        self.bld.os = "js".to_string();
        self.bld.arch = "wasm".to_string();
    }

    /// Parse, import dependencies, then check (or read the extern archive).
    /// Called on the branched importer with the target state's lock held.
    fn check(
        &self,
        ks: &Arc<State>,
        pp: &PkgPath,
        pkg_src: &FxHashMap<String, Vec<u8>>,
    ) -> (Option<Arc<Package>>, Option<ImportError>) {
        let parsed = match parse::parse_dir(
            &self.ctx,
            &self.bld,
            pp,
            &self.cfg.src_map,
            pkg_src,
            ks.key.tests,
        ) {
            Ok(parsed) => parsed,
            Err(err) => return (None, Some(err)),
        };

        let imports = match deps::import_deps(self, ks, &parsed.bp, &parsed.files_list) {
            Ok(imports) => imports,
            Err(err) => return (None, Some(err)),
        };

        if !parsed.bp.extern_files.is_empty() {
            return match archive::import_extern_pkg(&self.ctx, pp, &imports) {
                Ok(types) => (
                    Some(Arc::new(Package::new(
                        types,
                        Some(parsed.files_map),
                        None,
                        Some(imports),
                    ))),
                    None,
                ),
                Err(err) => (None, Some(err)),
            };
        }

        debug!(ipath = %ks.key.import_path, "typecheck");
        let handler = Arc::new(CollectingDiagnosticHandler::new());
        let check_cfg = CheckConfig {
            ignore_func_bodies: !ks.key.check_funcs,
            disable_unused_import_check: !ks.key.check_imports,
            fake_extern: true,
            sizes: Sizes::for_target(&self.bld.compiler, &self.bld.arch),
        };
        let hook = DepHook {
            kp: self,
            dir: parsed.bp.dir.clone(),
        };
        let checker = Checker::new(check_cfg, handler.clone(), &hook);
        let mut info = if ks.key.types_info.is_empty() {
            None
        } else {
            Some(ks.key.types_info.new_info())
        };
        let (types, check_err) =
            checker.check(&parsed.bp.import_path, &parsed.files_list, info.as_mut());

        // The first hard diagnostic is the error, unless the checker itself
        // already failed.
        let err = check_err
            .or_else(|| handler.first_hard().map(Into::into))
            .map(ImportError::Check);
        match types {
            Some(types) => (
                Some(Arc::new(Package::new(
                    types,
                    Some(parsed.files_map),
                    info,
                    Some(imports),
                ))),
                err,
            ),
            None => (None, err),
        }
    }
}

/// The recursive importer hook handed to the checker: imports resolve
/// relative to the directory of the package being checked.
struct DepHook<'k, 'a> {
    kp: &'k Importer<'a>,
    dir: PathBuf,
}

impl ImporterHook for DepHook<'_, '_> {
    fn import(&self, ipath: &str) -> std::result::Result<Arc<TypesPackage>, String> {
        self.kp
            .import_package(ipath, &self.dir)
            .map(|pkg| pkg.types.clone())
            .map_err(|err| err.to_string())
    }
}
