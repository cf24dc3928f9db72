//! The completed-package cache.
//!
//! A simple shared map from normalized directory path to a fully checked
//! package. Only complete packages are admitted; incomplete ones are
//! silently refused (with a debug log) so downstream consumers never see a
//! half-populated scope. Supports pattern-based bulk eviction for editor
//! "clear cache" commands.

use parking_lot::RwLock;
use regex::Regex;
use rustc_hash::FxHashMap;
use slate_lang::package::TypesPackage;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Normalized cache key for a package directory: cleaned and converted to
/// forward-slash form so equivalent spellings collide.
pub fn cache_key(dir: &Path) -> String {
    crate::vfs::to_slash(&crate::vfs::clean(dir))
}

#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub key: String,
    pub pkg: Arc<TypesPackage>,
    /// How long the check that produced this package took.
    pub dur: Duration,
}

#[derive(Default)]
pub struct CompletedCache {
    m: RwLock<FxHashMap<String, CacheEntry>>,
}

impl CompletedCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, dir: &Path) -> Option<CacheEntry> {
        self.m.read().get(&cache_key(dir)).cloned()
    }

    /// Admit `e`, unless its package is not complete.
    pub fn put(&self, e: CacheEntry) {
        if !e.pkg.complete() {
            debug!(key = %e.key, "cache.put: not storing, it's incomplete");
            return;
        }
        debug!(key = %e.key, dur = ?e.dur, "cache.put");
        self.m.write().insert(e.key.clone(), e);
    }

    pub fn del(&self, dir: &Path) {
        let key = cache_key(dir);
        let mut m = self.m.write();
        if m.remove(&key).is_some() {
            debug!(%key, "cache.del");
        }
    }

    /// Evict every entry whose key matches any of `pats`; returns the
    /// evicted entries.
    pub fn prune(&self, pats: &[Regex]) -> Vec<CacheEntry> {
        let mut evicted = Vec::new();
        let mut m = self.m.write();
        m.retain(|key, entry| {
            if pats.iter().any(|pat| pat.is_match(key)) {
                evicted.push(entry.clone());
                false
            } else {
                true
            }
        });
        drop(m);
        for e in &evicted {
            debug!(key = %e.key, "cache.prune");
        }
        evicted
    }

    pub fn entries(&self) -> Vec<CacheEntry> {
        self.m.read().values().cloned().collect()
    }

    pub fn for_each(&self, mut f: impl FnMut(&CacheEntry)) {
        for e in self.m.read().values() {
            f(e);
        }
    }

    pub fn len(&self) -> usize {
        self.m.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.m.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slate_lang::scope::Scope;

    fn complete_pkg(path: &str) -> Arc<TypesPackage> {
        let pkg = TypesPackage::new(path, path, Scope::new());
        pkg.mark_complete();
        Arc::new(pkg)
    }

    fn entry(dir: &str, pkg: Arc<TypesPackage>) -> CacheEntry {
        CacheEntry {
            key: cache_key(Path::new(dir)),
            pkg,
            dur: Duration::from_millis(1),
        }
    }

    #[test]
    fn get_put_del_round_trip() {
        let cache = CompletedCache::new();
        cache.put(entry("/tmp/x", complete_pkg("x")));
        assert!(cache.get(Path::new("/tmp/x")).is_some());
        // Equivalent spelling hits the same entry.
        assert!(cache.get(Path::new("/tmp/./x/")).is_some());
        cache.del(Path::new("/tmp/x"));
        assert!(cache.get(Path::new("/tmp/x")).is_none());
        // Deleting a missing key is a no-op.
        cache.del(Path::new("/tmp/x"));
    }

    #[test]
    fn incomplete_packages_are_refused() {
        let cache = CompletedCache::new();
        let pkg = Arc::new(TypesPackage::new("x", "x", Scope::new()));
        cache.put(entry("/tmp/x", pkg));
        assert!(cache.is_empty());
    }

    #[test]
    fn prune_evicts_matching_keys_and_returns_them() {
        let cache = CompletedCache::new();
        cache.put(entry("/tmp/x", complete_pkg("x")));
        cache.put(entry("/tmp/y", complete_pkg("y")));
        cache.put(entry("/home/z", complete_pkg("z")));

        let evicted = cache.prune(&[Regex::new(r"^/tmp/").unwrap()]);
        let mut keys: Vec<&str> = evicted.iter().map(|e| e.key.as_str()).collect();
        keys.sort_unstable();
        assert_eq!(keys, vec!["/tmp/x", "/tmp/y"]);
        assert_eq!(cache.len(), 1);
        assert!(cache.get(Path::new("/home/z")).is_some());
    }

    #[test]
    fn for_each_and_entries_see_everything() {
        let cache = CompletedCache::new();
        cache.put(entry("/a", complete_pkg("a")));
        cache.put(entry("/b", complete_pkg("b")));
        assert_eq!(cache.entries().len(), 2);
        let mut n = 0;
        cache.for_each(|_| n += 1);
        assert_eq!(n, 2);
    }
}
