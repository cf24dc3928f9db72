//! The editor-process execution context.
//!
//! A [`Ctx`] is shared by every importer in the process: it owns the VFS,
//! an environment snapshot, the per-key state registry and the
//! completed-package cache. Tasks started through [`Ctx::begin`] get an
//! RAII guard carrying a cancel flag that subprocess runners poll.

use crate::cache::CompletedCache;
use crate::state::StateRegistry;
use crate::vfs::{FileSystem, Vfs};
use rustc_hash::FxHashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

pub struct Ctx {
    vfs: Arc<Vfs>,
    env: FxHashMap<String, String>,
    registry: StateRegistry,
    cache: CompletedCache,
}

impl Ctx {
    /// A context over `fs` with the process environment snapshotted now.
    pub fn new(fs: Arc<dyn FileSystem>) -> Arc<Ctx> {
        Self::with_env(fs, std::env::vars().collect())
    }

    /// A context with an explicit environment, for tests and embedders that
    /// manage their own.
    pub fn with_env(fs: Arc<dyn FileSystem>, env: FxHashMap<String, String>) -> Arc<Ctx> {
        Arc::new(Ctx {
            vfs: Arc::new(Vfs::new(fs)),
            env,
            registry: StateRegistry::new(),
            cache: CompletedCache::new(),
        })
    }

    pub fn vfs(&self) -> &Arc<Vfs> {
        &self.vfs
    }

    pub fn env(&self, key: &str) -> Option<&str> {
        self.env.get(key).map(String::as_str)
    }

    /// The full environment snapshot, for subprocess invocations.
    pub fn environ(&self) -> impl Iterator<Item = (&str, &str)> {
        self.env.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn registry(&self) -> &StateRegistry {
        &self.registry
    }

    pub fn cache(&self) -> &CompletedCache {
        &self.cache
    }

    /// Start a task. Dropping the guard ends it; external owners may cancel
    /// it through the shared flag.
    pub fn begin(&self, title: impl Into<String>) -> TaskGuard {
        let title = title.into();
        debug!(task = %title, "task start");
        TaskGuard {
            title,
            cancel: Arc::new(AtomicBool::new(false)),
            started: Instant::now(),
        }
    }
}

pub struct TaskGuard {
    title: String,
    cancel: Arc<AtomicBool>,
    started: Instant,
}

impl TaskGuard {
    pub fn title(&self) -> &str {
        &self.title
    }

    /// The shared cancel flag, for handing to an external task owner.
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        self.cancel.clone()
    }

    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::Release);
    }

    pub fn cancelled(&self) -> bool {
        self.cancel.load(Ordering::Acquire)
    }

    pub fn elapsed(&self) -> std::time::Duration {
        self.started.elapsed()
    }
}

impl Drop for TaskGuard {
    fn drop(&mut self) {
        debug!(task = %self.title, elapsed = ?self.started.elapsed(), "task done");
    }
}

/// Render a command line for task titles and error messages, quoting
/// arguments that contain whitespace.
pub fn quote_cmd(name: &str, args: &[&str]) -> String {
    let mut out = String::from(name);
    for arg in args {
        out.push(' ');
        if arg.chars().any(char::is_whitespace) {
            out.push('"');
            out.push_str(arg);
            out.push('"');
        } else {
            out.push_str(arg);
        }
    }
    out
}
