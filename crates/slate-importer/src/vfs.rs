//! Virtual file system: a `FileSystem` abstraction, a monotonic tick
//! source, path identity, and per-directory invalidation callbacks.
//!
//! The tick counter timestamps checks and invalidations: a memo that was
//! checked at tick `C` and invalidated at tick `I` is stale iff `C <= I`.
//! Ticks only move through [`Vfs::invalidate`], so a check that samples the
//! current tick before it begins is strictly older than any invalidation
//! that lands afterwards.

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use std::collections::BTreeMap;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::debug;

pub type Tick = i64;

/// Logical path cleanup: resolves `.` and `..` components and collapses
/// separators without touching the file system.
pub fn clean(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for comp in path.components() {
        match comp {
            Component::CurDir => {}
            Component::ParentDir => {
                if matches!(out.components().next_back(), Some(Component::Normal(_))) {
                    out.pop();
                } else if !path.has_root() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    if out.as_os_str().is_empty() {
        out.push(".");
    }
    out
}

/// Forward-slash string form of a path, so equivalent spellings collide as
/// map keys on every platform.
pub fn to_slash(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

pub trait FileSystem: Send + Sync {
    fn read(&self, path: &Path) -> io::Result<Vec<u8>>;

    /// The files (not directories) directly inside `path`, sorted.
    fn read_dir(&self, path: &Path) -> io::Result<Vec<PathBuf>>;

    fn is_dir(&self, path: &Path) -> bool;
}

/// The real file system.
pub struct OsFs;

impl FileSystem for OsFs {
    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        std::fs::read(path)
    }

    fn read_dir(&self, path: &Path) -> io::Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        for entry in std::fs::read_dir(path)? {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                files.push(entry.path());
            }
        }
        files.sort();
        Ok(files)
    }

    fn is_dir(&self, path: &Path) -> bool {
        path.is_dir()
    }
}

/// An in-memory file system for tests. Reads are counted so callers can
/// assert how often sources were actually loaded.
#[derive(Default)]
pub struct MemFs {
    files: RwLock<BTreeMap<PathBuf, Vec<u8>>>,
    reads: AtomicUsize,
}

impl MemFs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, path: impl AsRef<Path>, content: impl AsRef<[u8]>) {
        self.files
            .write()
            .insert(clean(path.as_ref()), content.as_ref().to_vec());
    }

    pub fn remove(&self, path: impl AsRef<Path>) {
        self.files.write().remove(&clean(path.as_ref()));
    }

    /// Number of successful `read` calls since construction.
    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::Relaxed)
    }
}

impl FileSystem for MemFs {
    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        let files = self.files.read();
        match files.get(&clean(path)) {
            Some(content) => {
                self.reads.fetch_add(1, Ordering::Relaxed);
                Ok(content.clone())
            }
            None => Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("{}: no such file", path.display()),
            )),
        }
    }

    fn read_dir(&self, path: &Path) -> io::Result<Vec<PathBuf>> {
        let dir = clean(path);
        let files = self.files.read();
        let mut out: Vec<PathBuf> = files
            .keys()
            .filter(|p| p.parent() == Some(dir.as_path()))
            .cloned()
            .collect();
        out.sort();
        Ok(out)
    }

    fn is_dir(&self, path: &Path) -> bool {
        let dir = clean(path);
        self.files
            .read()
            .keys()
            .any(|p| p.ancestors().skip(1).any(|a| a == dir))
    }
}

/// Callback interface for objects memoized against a directory. The VFS
/// invokes it with the new tick whenever the directory is invalidated.
pub trait MemoEntry: Send + Sync {
    fn invalidate_memo(&self, tick: Tick);
}

pub struct Vfs {
    fs: Arc<dyn FileSystem>,
    tick: AtomicI64,
    memos: RwLock<FxHashMap<PathBuf, Vec<Arc<dyn MemoEntry>>>>,
}

impl Vfs {
    pub fn new(fs: Arc<dyn FileSystem>) -> Self {
        Self {
            fs,
            tick: AtomicI64::new(1),
            memos: RwLock::new(FxHashMap::default()),
        }
    }

    pub fn fs(&self) -> &Arc<dyn FileSystem> {
        &self.fs
    }

    /// The current invalidation tick. Sample it *before* starting work whose
    /// result will be memoized, so any invalidation that lands during the
    /// work strictly exceeds it.
    pub fn current_tick(&self) -> Tick {
        self.tick.load(Ordering::Acquire)
    }

    /// A normalized identity handle for `path`: two spellings of the same
    /// location poke equal.
    pub fn poke(&self, path: &Path) -> PathBuf {
        clean(path)
    }

    /// Register `memo` for invalidation callbacks when `dir` changes.
    pub fn register_memo(&self, dir: &Path, memo: Arc<dyn MemoEntry>) {
        self.memos.write().entry(clean(dir)).or_default().push(memo);
    }

    /// Record a change under `dir`: bump the tick and notify every memo
    /// registered for that directory. Returns the new tick.
    pub fn invalidate(&self, dir: &Path) -> Tick {
        let tick = self.tick.fetch_add(1, Ordering::AcqRel) + 1;
        let entries = {
            let memos = self.memos.read();
            memos.get(&clean(dir)).cloned().unwrap_or_default()
        };
        debug!(dir = %dir.display(), tick, memos = entries.len(), "vfs invalidate");
        for memo in entries {
            memo.invalidate_memo(tick);
        }
        tick
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[test]
    fn clean_resolves_dots() {
        assert_eq!(clean(Path::new("/a/b/../c/./d")), PathBuf::from("/a/c/d"));
        assert_eq!(clean(Path::new("a//b")), PathBuf::from("a/b"));
        assert_eq!(clean(Path::new("")), PathBuf::from("."));
    }

    #[test]
    fn poke_identity_collides_equivalent_spellings() {
        let vfs = Vfs::new(Arc::new(MemFs::new()));
        assert_eq!(
            vfs.poke(Path::new("/x/./y/")),
            vfs.poke(Path::new("/x/y"))
        );
    }

    #[test]
    fn mem_fs_lists_and_counts_reads() {
        let fs = MemFs::new();
        fs.insert("/p/a.sl", "package a");
        fs.insert("/p/b.sl", "package a");
        fs.insert("/p/sub/c.sl", "package c");

        let files = fs.read_dir(Path::new("/p")).unwrap();
        assert_eq!(
            files,
            vec![PathBuf::from("/p/a.sl"), PathBuf::from("/p/b.sl")]
        );
        assert!(fs.is_dir(Path::new("/p")));
        assert!(fs.is_dir(Path::new("/p/sub")));
        assert!(!fs.is_dir(Path::new("/q")));

        assert_eq!(fs.read_count(), 0);
        fs.read(Path::new("/p/a.sl")).unwrap();
        assert_eq!(fs.read_count(), 1);
        assert!(fs.read(Path::new("/p/missing.sl")).is_err());
        assert_eq!(fs.read_count(), 1);
    }

    struct Recorder(Mutex<Vec<Tick>>);

    impl MemoEntry for Recorder {
        fn invalidate_memo(&self, tick: Tick) {
            self.0.lock().push(tick);
        }
    }

    #[test]
    fn invalidate_bumps_tick_and_notifies_registered_memos() {
        let vfs = Vfs::new(Arc::new(MemFs::new()));
        let rec = Arc::new(Recorder(Mutex::new(Vec::new())));
        vfs.register_memo(Path::new("/p"), rec.clone());

        let t0 = vfs.current_tick();
        let t1 = vfs.invalidate(Path::new("/p/"));
        assert!(t1 > t0);
        assert_eq!(vfs.current_tick(), t1);
        assert_eq!(*rec.0.lock(), vec![t1]);

        // Unrelated directory: tick moves, no callback.
        let t2 = vfs.invalidate(Path::new("/q"));
        assert!(t2 > t1);
        assert_eq!(rec.0.lock().len(), 1);
    }
}
