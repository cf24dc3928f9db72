//! The Slate type system's type representation.

use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub enum Type {
    Int,
    Float,
    Bool,
    String_,
    /// The type of expressions that produce no value.
    Unit,
    /// A declared type; identity is `(pkg_path, name)`.
    Named(Arc<NamedType>),
    Struct(Arc<StructType>),
    Func(Arc<Signature>),
    Slice(Arc<Type>),
    /// A type the checker could not or chose not to compute (e.g. members of
    /// the trusting `extern` package). Unknown is assignable everywhere.
    Unknown,
    Invalid,
}

#[derive(Debug)]
pub struct NamedType {
    pub pkg_path: String,
    pub name: String,
    pub underlying: Type,
}

#[derive(Debug, PartialEq)]
pub struct StructType {
    pub fields: Vec<(String, Type)>,
}

#[derive(Debug, PartialEq)]
pub struct Signature {
    pub params: Vec<(String, Type)>,
    pub result: Type,
}

impl PartialEq for NamedType {
    // Nominal identity: the underlying type does not participate.
    fn eq(&self, other: &Self) -> bool {
        self.pkg_path == other.pkg_path && self.name == other.name
    }
}

impl PartialEq for Type {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Type::Int, Type::Int)
            | (Type::Float, Type::Float)
            | (Type::Bool, Type::Bool)
            | (Type::String_, Type::String_)
            | (Type::Unit, Type::Unit)
            | (Type::Unknown, Type::Unknown)
            | (Type::Invalid, Type::Invalid) => true,
            (Type::Named(a), Type::Named(b)) => a == b,
            (Type::Struct(a), Type::Struct(b)) => a == b,
            (Type::Func(a), Type::Func(b)) => a == b,
            (Type::Slice(a), Type::Slice(b)) => a == b,
            _ => false,
        }
    }
}

impl Type {
    /// Whether a value of type `self` can be assigned where `want` is
    /// expected. `Unknown` trusts both directions; `Invalid` never matches
    /// (its error was already reported).
    pub fn assignable_to(&self, want: &Type) -> bool {
        if matches!(self, Type::Unknown) || matches!(want, Type::Unknown) {
            return true;
        }
        if matches!(self, Type::Invalid) || matches!(want, Type::Invalid) {
            return true;
        }
        self == want
    }

    /// Resolve through named types to the structural underlying type.
    pub fn underlying(&self) -> &Type {
        match self {
            Type::Named(n) => n.underlying.underlying(),
            other => other,
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Int => write!(f, "int"),
            Type::Float => write!(f, "float"),
            Type::Bool => write!(f, "bool"),
            Type::String_ => write!(f, "string"),
            Type::Unit => write!(f, "()"),
            Type::Named(n) if n.pkg_path.is_empty() => write!(f, "{}", n.name),
            Type::Named(n) => write!(f, "{}.{}", n.pkg_path, n.name),
            Type::Struct(s) => {
                write!(f, "struct{{")?;
                for (i, (name, ty)) in s.fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, "; ")?;
                    }
                    write!(f, "{name} {ty}")?;
                }
                write!(f, "}}")
            }
            Type::Func(sig) => {
                write!(f, "func(")?;
                for (i, (_, ty)) in sig.params.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{ty}")?;
                }
                write!(f, ")")?;
                if sig.result != Type::Unit {
                    write!(f, " {}", sig.result)?;
                }
                Ok(())
            }
            Type::Slice(elem) => write!(f, "[]{elem}"),
            Type::Unknown => write!(f, "<unknown>"),
            Type::Invalid => write!(f, "<invalid>"),
        }
    }
}

/// Target word size and alignment, selected from the compiler and
/// architecture pair of the active build configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sizes {
    pub word_size: u8,
    pub max_align: u8,
}

impl Sizes {
    pub fn for_target(compiler: &str, arch: &str) -> Sizes {
        // The reference compiler is the only one with its own tables.
        let _ = compiler;
        match arch {
            "x86" | "arm" | "wasm" => Sizes {
                word_size: 4,
                max_align: 4,
            },
            _ => Sizes {
                word_size: 8,
                max_align: 8,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn named_type_identity_ignores_underlying() {
        let a = Type::Named(Arc::new(NamedType {
            pkg_path: "p".into(),
            name: "T".into(),
            underlying: Type::Int,
        }));
        let b = Type::Named(Arc::new(NamedType {
            pkg_path: "p".into(),
            name: "T".into(),
            underlying: Type::Invalid,
        }));
        assert_eq!(a, b);
    }

    #[test]
    fn unknown_is_assignable_both_ways() {
        assert!(Type::Unknown.assignable_to(&Type::Int));
        assert!(Type::Int.assignable_to(&Type::Unknown));
        assert!(!Type::Int.assignable_to(&Type::String_));
    }

    #[test]
    fn sizes_follow_arch() {
        assert_eq!(Sizes::for_target("slc", "wasm").word_size, 4);
        assert_eq!(Sizes::for_target("slc", "amd64").word_size, 8);
    }
}
