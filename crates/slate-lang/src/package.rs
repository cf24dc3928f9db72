use crate::scope::Scope;
use std::sync::atomic::{AtomicBool, Ordering};

/// A type-system package: the exported (and, for the current package,
/// unexported) objects of one checked directory.
///
/// Completeness is monotonic: a package starts incomplete and is marked
/// complete exactly once, after its scope is fully populated. Consumers that
/// cache packages must only admit complete ones.
#[derive(Debug)]
pub struct TypesPackage {
    import_path: String,
    name: String,
    scope: Scope,
    complete: AtomicBool,
    fake: bool,
}

impl TypesPackage {
    pub fn new(import_path: impl Into<String>, name: impl Into<String>, scope: Scope) -> Self {
        Self {
            import_path: import_path.into(),
            name: name.into(),
            scope,
            complete: AtomicBool::new(false),
            fake: false,
        }
    }

    /// A synthesized package with an empty, trusting scope: any member
    /// selected from it has type `Unknown` and produces no error.
    pub fn new_fake(import_path: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            import_path: import_path.into(),
            name: name.into(),
            scope: Scope::new(),
            complete: AtomicBool::new(true),
            fake: true,
        }
    }

    pub fn import_path(&self) -> &str {
        &self.import_path
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    pub fn complete(&self) -> bool {
        self.complete.load(Ordering::Acquire)
    }

    pub fn mark_complete(&self) {
        self.complete.store(true, Ordering::Release);
    }

    pub fn is_fake(&self) -> bool {
        self.fake
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_incomplete_then_marks() {
        let pkg = TypesPackage::new("a/b", "b", Scope::new());
        assert!(!pkg.complete());
        pkg.mark_complete();
        assert!(pkg.complete());
    }

    #[test]
    fn fake_packages_are_complete_and_empty() {
        let pkg = TypesPackage::new_fake("extern", "extern");
        assert!(pkg.complete());
        assert!(pkg.is_fake());
        assert!(pkg.scope().is_empty());
    }
}
