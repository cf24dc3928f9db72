//! Per-call configuration and the build context.

use crate::ctx::Ctx;
use rustc_hash::FxHashMap;
use slate_lang::check::TypesInfo;
use std::ops::{BitOr, BitOrAssign};
use std::path::PathBuf;

/// Selects which [`TypesInfo`] maps to populate during a check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct TypesInfoMask(u32);

impl TypesInfoMask {
    pub const NONE: TypesInfoMask = TypesInfoMask(0);
    pub const TYPES: TypesInfoMask = TypesInfoMask(1 << 0);
    pub const DEFS: TypesInfoMask = TypesInfoMask(1 << 1);
    pub const USES: TypesInfoMask = TypesInfoMask(1 << 2);
    pub const IMPLICITS: TypesInfoMask = TypesInfoMask(1 << 3);
    pub const SELECTIONS: TypesInfoMask = TypesInfoMask(1 << 4);
    pub const SCOPES: TypesInfoMask = TypesInfoMask(1 << 5);
    pub const INIT_ORDER: TypesInfoMask = TypesInfoMask(1 << 6);
    pub const ALL: TypesInfoMask = TypesInfoMask(0x7f);

    pub fn contains(self, other: TypesInfoMask) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Allocate a fresh info container with exactly the requested sub-maps
    /// enabled.
    pub fn new_info(self) -> TypesInfo {
        let mut info = TypesInfo::default();
        if self.contains(Self::TYPES) {
            info.types = Some(FxHashMap::default());
        }
        if self.contains(Self::DEFS) {
            info.defs = Some(FxHashMap::default());
        }
        if self.contains(Self::USES) {
            info.uses = Some(FxHashMap::default());
        }
        if self.contains(Self::IMPLICITS) {
            info.implicits = Some(FxHashMap::default());
        }
        if self.contains(Self::SELECTIONS) {
            info.selections = Some(FxHashMap::default());
        }
        if self.contains(Self::SCOPES) {
            info.scopes = Some(FxHashMap::default());
        }
        if self.contains(Self::INIT_ORDER) {
            info.init_order = Some(Vec::new());
        }
        info
    }
}

impl BitOr for TypesInfoMask {
    type Output = TypesInfoMask;

    fn bitor(self, rhs: TypesInfoMask) -> TypesInfoMask {
        TypesInfoMask(self.0 | rhs.0)
    }
}

impl BitOrAssign for TypesInfoMask {
    fn bitor_assign(&mut self, rhs: TypesInfoMask) {
        self.0 |= rhs.0;
    }
}

/// Root-call configuration. Overlay sources and the various check toggles
/// apply only to the package named in the root call; branches created for
/// transitive dependencies strip them.
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Overlay source for the target package only. Keys are file basenames
    /// or absolute paths inside the target directory.
    pub package_src: FxHashMap<String, Vec<u8>>,

    /// Full overlay: the target package plus any edited dependencies. Keys
    /// are normalized absolute filenames.
    pub src_map: FxHashMap<String, Vec<u8>>,

    /// Check function bodies, not just signatures.
    pub check_funcs: bool,
    /// Report unused imports.
    pub check_imports: bool,
    /// Include test files and their imports.
    pub tests: bool,
    /// Force sequential dependency imports.
    pub no_concurrency: bool,

    /// Which type info to collect for the root package.
    pub types_info: TypesInfoMask,
    /// Whether `types_info` also applies to imported packages.
    pub imports_types_info: bool,
}

/// The effective build configuration: target platform, toolchain root and
/// package search path. Snapshotted per importer; branches may override the
/// platform pair (the foreign-syscall directory forces js/wasm).
#[derive(Debug, Clone)]
pub struct BuildCtx {
    pub os: String,
    pub arch: String,
    /// Toolchain root; the standard library lives under `<root>/lib`.
    pub root_dir: PathBuf,
    pub search_paths: Vec<PathBuf>,
    pub tags: Vec<String>,
    pub compiler: String,
}

/// Build tags every importer carries in addition to the user's.
const DEFAULT_TAGS: &[&str] = &["portable"];

impl BuildCtx {
    pub fn from_ctx(ctx: &Ctx) -> BuildCtx {
        let root_dir = ctx
            .env("SLATE_ROOT")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("/usr/local/slate"));
        let search_paths = ctx
            .env("SLATE_PATH")
            .map(|v| std::env::split_paths(v).collect())
            .unwrap_or_default();
        let os = ctx
            .env("SLATE_OS")
            .map(str::to_string)
            .unwrap_or_else(|| std::env::consts::OS.to_string());
        let arch = ctx
            .env("SLATE_ARCH")
            .map(str::to_string)
            .unwrap_or_else(|| std::env::consts::ARCH.to_string());
        let mut tags: Vec<String> = ctx
            .env("SLATE_TAGS")
            .map(|v| v.split_whitespace().map(str::to_string).collect())
            .unwrap_or_default();
        for t in DEFAULT_TAGS {
            if !tags.iter().any(|have| have == t) {
                tags.push(t.to_string());
            }
        }
        BuildCtx {
            os,
            arch,
            root_dir,
            search_paths,
            tags,
            compiler: "slc".to_string(),
        }
    }

    /// The search path joined with the platform list separator, for use in
    /// state keys.
    pub fn search_path_string(&self) -> String {
        let sep = if cfg!(windows) { ";" } else { ":" };
        self.search_paths
            .iter()
            .map(|p| p.to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join(sep)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mask_combines_and_tests_bits() {
        let m = TypesInfoMask::TYPES | TypesInfoMask::USES;
        assert!(m.contains(TypesInfoMask::TYPES));
        assert!(m.contains(TypesInfoMask::USES));
        assert!(!m.contains(TypesInfoMask::DEFS));
        assert!(TypesInfoMask::ALL.contains(m));
        assert!(TypesInfoMask::NONE.is_empty());
    }

    #[test]
    fn new_info_allocates_exactly_requested_maps() {
        let info = (TypesInfoMask::TYPES | TypesInfoMask::INIT_ORDER).new_info();
        assert!(info.types.is_some());
        assert!(info.init_order.is_some());
        assert!(info.defs.is_none());
        assert!(info.uses.is_none());
        assert!(info.implicits.is_none());
        assert!(info.selections.is_none());
        assert!(info.scopes.is_none());

        let all = TypesInfoMask::ALL.new_info();
        assert!(all.defs.is_some());
        assert!(all.scopes.is_some());
    }
}
