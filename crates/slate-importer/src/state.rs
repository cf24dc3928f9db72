//! Per-package check state: the process-wide memo registry with
//! invalidation propagation.
//!
//! A [`State`] is the memo cell for one [`StateKey`] (one package under one
//! checking configuration). It lives for the lifetime of the process, may
//! be invalidated arbitrarily often, and serializes concurrent checks of
//! its key through its result lock.

use crate::config::TypesInfoMask;
use crate::error::ImportError;
use crate::pkg::Package;
use crate::resolver::PkgPath;
use crate::vfs::{MemoEntry, Tick, Vfs};
use parking_lot::{Mutex, MutexGuard};
use rustc_hash::FxHashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Identity of a checking configuration. Two requests with identical keys
/// must share a `State`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StateKey {
    pub import_path: String,
    pub dir: PathBuf,
    pub check_funcs: bool,
    pub check_imports: bool,
    pub tests: bool,
    /// Sorted, space-joined build tags.
    pub tags: String,
    pub os: String,
    pub arch: String,
    pub root_dir: PathBuf,
    /// List-separator-joined search path.
    pub search_path: String,
    /// True when no overlay is in effect; such states validate on ticks
    /// alone.
    pub no_hash: bool,
    pub types_info: TypesInfoMask,
}

impl StateKey {
    /// Whether this key refers to the package identified by `pp`, by import
    /// path or by directory.
    pub fn targets(&self, pp: &PkgPath) -> bool {
        self.import_path == pp.import_path || self.dir == pp.dir
    }
}

/// The stored result of the last check, guarded by the state's lock.
#[derive(Debug, Default)]
pub struct StateResult {
    pub pkg: Option<Arc<Package>>,
    pub err: Option<ImportError>,
    /// The overlay hash the result was produced under.
    pub hash: String,
}

pub struct State {
    pub key: StateKey,
    /// Tick at which `res` was produced. Sampled from the VFS *before* the
    /// check begins, so later invalidations strictly exceed it.
    chk_at: AtomicI64,
    /// Tick of the most recent invalidation.
    inv_at: AtomicI64,
    /// Reverse-dependency edges: states whose packages import this one.
    /// Append-only; stale entries are tolerated because every request
    /// re-validates (see `valid`).
    imported_by: Mutex<Vec<Arc<State>>>,
    /// Serialization point: held for the entire duration of check + store,
    /// so at most one thread computes this key's result at a time. Never
    /// held across invalidation propagation.
    res: Mutex<StateResult>,
}

impl State {
    fn new(key: StateKey) -> State {
        State {
            key,
            chk_at: AtomicI64::new(0),
            inv_at: AtomicI64::new(0),
            imported_by: Mutex::new(Vec::new()),
            res: Mutex::new(StateResult::default()),
        }
    }

    pub fn checked_at(&self) -> Tick {
        self.chk_at.load(Ordering::Acquire)
    }

    pub fn invalidated_at(&self) -> Tick {
        self.inv_at.load(Ordering::Acquire)
    }

    pub(crate) fn set_checked_at(&self, tick: Tick) {
        self.chk_at.store(tick, Ordering::Release);
    }

    pub(crate) fn lock_result(&self) -> MutexGuard<'_, StateResult> {
        self.res.lock()
    }

    /// A stored result is valid for a request bearing overlay hash `hash`
    /// iff the check is newer than the last invalidation and the overlay
    /// matches (or the key carries no overlay at all).
    pub fn valid(&self, res: &StateResult, hash: &str) -> bool {
        self.checked_at() > self.invalidated_at() && (self.key.no_hash || res.hash == hash)
    }

    /// Record that `parent`'s package imports this one. Duplicates are
    /// dropped; entries are never removed.
    pub fn imported_by(&self, parent: &Arc<State>) {
        let mut l = self.imported_by.lock();
        if l.iter().any(|q| Arc::ptr_eq(q, parent)) {
            return;
        }
        l.push(parent.clone());
    }

    /// Mark this state (and, transitively, everything that imports it)
    /// invalid as of `tick`.
    ///
    /// The early return when the tick did not advance makes the traversal
    /// idempotent, so it terminates even if the reverse-dependency graph
    /// has cycles. The result lock is never held here.
    pub fn invalidate(&self, tick: Tick) {
        if self.inv_at.fetch_max(tick, Ordering::AcqRel) >= tick {
            return;
        }
        let snapshot = self.imported_by.lock().clone();
        for p in snapshot {
            p.invalidate(tick);
        }
    }

    /// Result policy: an error wins; an incomplete package without an error
    /// is the partially-imported pathology; otherwise the package.
    pub(crate) fn result(&self, res: &StateResult) -> Result<Arc<Package>, ImportError> {
        if let Some(err) = &res.err {
            return Err(err.clone());
        }
        match &res.pkg {
            Some(pkg) if !pkg.types.complete() => Err(ImportError::IncompleteReimport {
                ipath: self.key.import_path.clone(),
                pkg: pkg.clone(),
            }),
            Some(pkg) => Ok(pkg.clone()),
            None => Err(ImportError::MissingResult(self.key.import_path.clone())),
        }
    }
}

impl MemoEntry for State {
    fn invalidate_memo(&self, tick: Tick) {
        debug!(key = %self.key.import_path, tick, "state invalidated");
        self.invalidate(tick);
    }
}

/// The process-wide `StateKey -> State` registry. `obtain` is an atomic
/// get-or-create; a freshly created state registers itself with the VFS for
/// invalidation callbacks on its directory.
pub struct StateRegistry {
    states: Mutex<FxHashMap<StateKey, Arc<State>>>,
}

impl StateRegistry {
    pub fn new() -> StateRegistry {
        StateRegistry {
            states: Mutex::new(FxHashMap::default()),
        }
    }

    pub fn obtain(&self, vfs: &Vfs, key: StateKey) -> Arc<State> {
        let mut states = self.states.lock();
        if let Some(s) = states.get(&key) {
            return s.clone();
        }
        let state = Arc::new(State::new(key.clone()));
        vfs.register_memo(&key.dir, state.clone());
        states.insert(key, state.clone());
        state
    }

    pub fn len(&self) -> usize {
        self.states.lock().len()
    }
}

impl Default for StateRegistry {
    fn default() -> Self {
        Self::new()
    }
}
