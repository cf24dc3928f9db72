//! In-memory workspace fixtures.
//!
//! A [`Workspace`] pins the build environment (root, search path, platform)
//! so tests behave identically on every host, and exposes the counting
//! in-memory file system for cache-behavior assertions.

use rustc_hash::FxHashMap;
use slate_importer::{Config, Ctx, Importer, MemFs};
use std::path::Path;
use std::sync::Arc;

/// Standard test environment: toolchain root `/slate`, search path `/deps`,
/// target linux/amd64.
pub struct Workspace {
    pub ctx: Arc<Ctx>,
    pub fs: Arc<MemFs>,
}

impl Workspace {
    pub fn new() -> Workspace {
        let fs = Arc::new(MemFs::new());
        let mut env = FxHashMap::default();
        env.insert("SLATE_ROOT".to_string(), "/slate".to_string());
        env.insert("SLATE_PATH".to_string(), "/deps".to_string());
        env.insert("SLATE_OS".to_string(), "linux".to_string());
        env.insert("SLATE_ARCH".to_string(), "amd64".to_string());
        let ctx = Ctx::with_env(fs.clone(), env);
        Workspace { ctx, fs }
    }

    /// Write a package into `/deps/<name>`, one `(basename, source)` pair
    /// per file.
    pub fn add_package(&self, name: &str, files: &[(&str, &str)]) {
        for (base, src) in files {
            self.fs.insert(format!("/deps/{name}/{base}"), src);
        }
    }

    /// Write a standard-library package into `<root>/lib/<name>`.
    pub fn add_std_package(&self, name: &str, files: &[(&str, &str)]) {
        for (base, src) in files {
            self.fs.insert(format!("/slate/lib/{name}/{base}"), src);
        }
    }

    /// The directory a [`Workspace::add_package`] package lives in.
    pub fn pkg_dir(&self, name: &str) -> String {
        format!("/deps/{name}")
    }

    pub fn importer(&self, cfg: Config) -> Importer<'static> {
        Importer::new(self.ctx.clone(), cfg)
    }

    /// Invalidate a package directory, as the editor's watcher would on a
    /// file change.
    pub fn invalidate_package(&self, name: &str) {
        self.ctx.vfs().invalidate(Path::new(&self.pkg_dir(name)));
    }
}

impl Default for Workspace {
    fn default() -> Self {
        Self::new()
    }
}

/// Build an overlay map from `(path, source)` pairs.
pub fn overlay(entries: &[(&str, &str)]) -> FxHashMap<String, Vec<u8>> {
    entries
        .iter()
        .map(|(k, v)| (k.to_string(), v.as_bytes().to_vec()))
        .collect()
}
