//! The universe scope and the type-system-owned `intrinsics` package.

use crate::package::TypesPackage;
use crate::scope::{Object, ObjectKind, Scope};
use crate::types::{NamedType, Signature, Type};
use std::sync::{Arc, LazyLock};

/// Import path of the unsafe-primitives package.
pub const INTRINSICS_PATH: &str = "intrinsics";

/// Import path of the foreign-interface placeholder package.
pub const EXTERN_PATH: &str = "extern";

static UNIVERSE: LazyLock<Scope> = LazyLock::new(|| {
    let mut s = Scope::new();
    for (name, ty) in [
        ("int", Type::Int),
        ("float", Type::Float),
        ("bool", Type::Bool),
        ("string", Type::String_),
    ] {
        s.insert(Object::new(name, ObjectKind::TypeName, ty));
    }
    s.insert(Object::new("true", ObjectKind::Const, Type::Bool));
    s.insert(Object::new("false", ObjectKind::Const, Type::Bool));
    s.insert(builtin_func("len", Type::Int));
    s.insert(builtin_func("print", Type::Unit));
    s.insert(builtin_func("panic", Type::Unit));
    s
});

static INTRINSICS: LazyLock<Arc<TypesPackage>> = LazyLock::new(|| {
    let mut s = Scope::new();
    s.insert(Object::new(
        "Pointer",
        ObjectKind::TypeName,
        Type::Named(Arc::new(NamedType {
            pkg_path: INTRINSICS_PATH.to_string(),
            name: "Pointer".to_string(),
            underlying: Type::Int,
        })),
    ));
    s.insert(builtin_func("Sizeof", Type::Int));
    s.insert(builtin_func("Alignof", Type::Int));
    let pkg = TypesPackage::new(INTRINSICS_PATH, INTRINSICS_PATH, s);
    pkg.mark_complete();
    Arc::new(pkg)
});

fn builtin_func(name: &str, result: Type) -> Object {
    Object::new(
        name,
        ObjectKind::Builtin,
        Type::Func(Arc::new(Signature {
            params: vec![("v".to_string(), Type::Unknown)],
            result,
        })),
    )
}

/// The scope holding all predeclared objects.
pub fn universe() -> &'static Scope {
    &UNIVERSE
}

/// The `intrinsics` package. Owned by the type system; never produced by
/// checking source files.
pub fn intrinsics_package() -> Arc<TypesPackage> {
    INTRINSICS.clone()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn universe_has_predeclared_names() {
        for name in ["int", "string", "true", "len", "print"] {
            assert!(universe().contains(name), "universe should have {name}");
        }
    }

    #[test]
    fn intrinsics_is_complete_and_exported() {
        let pkg = intrinsics_package();
        assert!(pkg.complete());
        assert!(pkg.scope().lookup("Sizeof").unwrap().exported);
        assert!(pkg.scope().lookup("Pointer").is_some());
    }
}
