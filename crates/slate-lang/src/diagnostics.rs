//! Diagnostic reporting for the checker.

use crate::span::Span;
use parking_lot::Mutex;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub message: String,
    pub path: PathBuf,
    pub span: Span,
    /// Soft diagnostics (e.g. an unused local) do not prevent a package from
    /// being considered usable.
    pub soft: bool,
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}:{}:{}: {}",
            self.path.display(),
            self.span.line,
            self.span.column,
            self.message
        )
    }
}

pub trait DiagnosticHandler: Send + Sync {
    fn report(&self, diag: Diagnostic);
}

/// Collects every reported diagnostic, preserving order.
#[derive(Debug, Default)]
pub struct CollectingDiagnosticHandler {
    diags: Mutex<Vec<Diagnostic>>,
}

impl CollectingDiagnosticHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        self.diags.lock().clone()
    }

    pub fn take(&self) -> Vec<Diagnostic> {
        std::mem::take(&mut self.diags.lock())
    }

    /// The first non-soft diagnostic, if any.
    pub fn first_hard(&self) -> Option<Diagnostic> {
        self.diags.lock().iter().find(|d| !d.soft).cloned()
    }
}

impl DiagnosticHandler for CollectingDiagnosticHandler {
    fn report(&self, diag: Diagnostic) {
        self.diags.lock().push(diag);
    }
}
