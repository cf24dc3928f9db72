//! Binary export data for compiled packages.
//!
//! A package compiled out-of-process (the extern-archive path) is consumed
//! through this format: a magic header, a format version, then a bincode
//! encoding of the exported scope. The reader resolves references to other
//! packages against a map of already-imported packages, preferring the live
//! object over the inlined copy.

use crate::package::TypesPackage;
use crate::scope::{Object, ObjectKind, Scope};
use crate::types::{NamedType, Signature, StructType, Type};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

const MAGIC: &[u8; 4] = b"slxd";

/// Export data format version - increment when the encoding changes.
pub const EXPORT_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("not Slate export data (bad magic)")]
    BadMagic,

    #[error("export data version mismatch: expected {expected}, found {found}")]
    VersionMismatch { expected: u32, found: u32 },

    #[error("encoding error: {0}")]
    Encoding(#[from] bincode::Error),
}

#[derive(Debug, Serialize, Deserialize)]
struct ArchiveData {
    import_path: String,
    name: String,
    objects: Vec<ExportedObject>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ExportedObject {
    name: String,
    kind: ExportedKind,
    ty: ExportedType,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy)]
enum ExportedKind {
    Func,
    TypeName,
    Var,
    Const,
}

#[derive(Debug, Serialize, Deserialize)]
enum ExportedType {
    Int,
    Float,
    Bool,
    String,
    Unit,
    Unknown,
    Invalid,
    Slice(Box<ExportedType>),
    Named {
        pkg: String,
        name: String,
        underlying: Box<ExportedType>,
    },
    Struct {
        fields: Vec<(String, ExportedType)>,
    },
    Func {
        params: Vec<(String, ExportedType)>,
        result: Box<ExportedType>,
    },
}

/// Serialize the exported scope of `pkg`.
pub fn write_package(pkg: &TypesPackage) -> Result<Vec<u8>, ExportError> {
    let mut objects = Vec::new();
    for name in pkg.scope().names() {
        let obj = pkg.scope().lookup(name).expect("name from scope");
        if !obj.exported {
            continue;
        }
        let kind = match obj.kind {
            ObjectKind::Func | ObjectKind::Builtin => ExportedKind::Func,
            ObjectKind::TypeName => ExportedKind::TypeName,
            ObjectKind::Var => ExportedKind::Var,
            ObjectKind::Const => ExportedKind::Const,
            ObjectKind::PkgName => continue,
        };
        objects.push(ExportedObject {
            name: obj.name.clone(),
            kind,
            ty: encode_type(&obj.ty),
        });
    }
    let data = ArchiveData {
        import_path: pkg.import_path().to_string(),
        name: pkg.name().to_string(),
        objects,
    };
    let mut out = Vec::new();
    out.extend_from_slice(MAGIC);
    out.extend_from_slice(&EXPORT_VERSION.to_le_bytes());
    out.extend_from_slice(&bincode::serialize(&data)?);
    Ok(out)
}

/// Deserialize export data into a complete package.
///
/// `imports` maps import paths to already-imported packages; named types
/// belonging to them resolve to the live objects.
pub fn read_package(
    bytes: &[u8],
    imports: &FxHashMap<String, Arc<TypesPackage>>,
    ipath: &str,
) -> Result<Arc<TypesPackage>, ExportError> {
    if bytes.len() < 8 || &bytes[..4] != MAGIC {
        return Err(ExportError::BadMagic);
    }
    let found = u32::from_le_bytes(bytes[4..8].try_into().expect("4 bytes"));
    if found != EXPORT_VERSION {
        return Err(ExportError::VersionMismatch {
            expected: EXPORT_VERSION,
            found,
        });
    }
    let data: ArchiveData = bincode::deserialize(&bytes[8..])?;
    let mut scope = Scope::new();
    for eo in &data.objects {
        let kind = match eo.kind {
            ExportedKind::Func => ObjectKind::Func,
            ExportedKind::TypeName => ObjectKind::TypeName,
            ExportedKind::Var => ObjectKind::Var,
            ExportedKind::Const => ObjectKind::Const,
        };
        let ty = decode_type(&eo.ty, imports);
        scope.insert(Object::new(&eo.name, kind, ty));
    }
    // The resolved import path wins over whatever the archive recorded.
    let path = if ipath.is_empty() {
        data.import_path
    } else {
        ipath.to_string()
    };
    let pkg = TypesPackage::new(path, data.name, scope);
    pkg.mark_complete();
    Ok(Arc::new(pkg))
}

fn encode_type(ty: &Type) -> ExportedType {
    match ty {
        Type::Int => ExportedType::Int,
        Type::Float => ExportedType::Float,
        Type::Bool => ExportedType::Bool,
        Type::String_ => ExportedType::String,
        Type::Unit => ExportedType::Unit,
        Type::Unknown => ExportedType::Unknown,
        Type::Invalid => ExportedType::Invalid,
        Type::Slice(elem) => ExportedType::Slice(Box::new(encode_type(elem))),
        Type::Named(n) => ExportedType::Named {
            pkg: n.pkg_path.clone(),
            name: n.name.clone(),
            underlying: Box::new(encode_type(&n.underlying)),
        },
        Type::Struct(st) => ExportedType::Struct {
            fields: st
                .fields
                .iter()
                .map(|(name, ty)| (name.clone(), encode_type(ty)))
                .collect(),
        },
        Type::Func(sig) => ExportedType::Func {
            params: sig
                .params
                .iter()
                .map(|(name, ty)| (name.clone(), encode_type(ty)))
                .collect(),
            result: Box::new(encode_type(&sig.result)),
        },
    }
}

fn decode_type(ty: &ExportedType, imports: &FxHashMap<String, Arc<TypesPackage>>) -> Type {
    match ty {
        ExportedType::Int => Type::Int,
        ExportedType::Float => Type::Float,
        ExportedType::Bool => Type::Bool,
        ExportedType::String => Type::String_,
        ExportedType::Unit => Type::Unit,
        ExportedType::Unknown => Type::Unknown,
        ExportedType::Invalid => Type::Invalid,
        ExportedType::Slice(elem) => Type::Slice(Arc::new(decode_type(elem, imports))),
        ExportedType::Named {
            pkg,
            name,
            underlying,
        } => {
            if let Some(live) = imports
                .get(pkg)
                .and_then(|p| p.scope().lookup(name))
                .filter(|o| o.kind == ObjectKind::TypeName)
            {
                return live.ty.clone();
            }
            Type::Named(Arc::new(NamedType {
                pkg_path: pkg.clone(),
                name: name.clone(),
                underlying: decode_type(underlying, imports),
            }))
        }
        ExportedType::Struct { fields } => Type::Struct(Arc::new(StructType {
            fields: fields
                .iter()
                .map(|(name, ty)| (name.clone(), decode_type(ty, imports)))
                .collect(),
        })),
        ExportedType::Func { params, result } => Type::Func(Arc::new(Signature {
            params: params
                .iter()
                .map(|(name, ty)| (name.clone(), decode_type(ty, imports)))
                .collect(),
            result: decode_type(result, imports),
        })),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_package() -> TypesPackage {
        let mut scope = Scope::new();
        scope.insert(Object::new(
            "Origin",
            ObjectKind::Var,
            Type::Named(Arc::new(NamedType {
                pkg_path: "geo".to_string(),
                name: "Point".to_string(),
                underlying: Type::Struct(Arc::new(StructType {
                    fields: vec![("X".to_string(), Type::Int)],
                })),
            })),
        ));
        scope.insert(Object::new(
            "Scale",
            ObjectKind::Func,
            Type::Func(Arc::new(Signature {
                params: vec![("f".to_string(), Type::Float)],
                result: Type::Float,
            })),
        ));
        scope.insert(Object::new("hidden", ObjectKind::Var, Type::Int));
        let pkg = TypesPackage::new("geo", "geo", scope);
        pkg.mark_complete();
        pkg
    }

    #[test]
    fn round_trips_exported_objects_only() {
        let pkg = sample_package();
        let bytes = write_package(&pkg).unwrap();
        let back = read_package(&bytes, &FxHashMap::default(), "geo").unwrap();
        assert!(back.complete());
        assert!(back.scope().lookup("Origin").is_some());
        assert!(back.scope().lookup("Scale").is_some());
        assert!(back.scope().lookup("hidden").is_none());
    }

    #[test]
    fn rejects_bad_magic_and_version() {
        assert!(matches!(
            read_package(b"nope", &FxHashMap::default(), "geo"),
            Err(ExportError::BadMagic)
        ));
        let mut bytes = write_package(&sample_package()).unwrap();
        bytes[4..8].copy_from_slice(&99u32.to_le_bytes());
        assert!(matches!(
            read_package(&bytes, &FxHashMap::default(), "geo"),
            Err(ExportError::VersionMismatch { found: 99, .. })
        ));
    }

    #[test]
    fn prefers_live_objects_from_imports() {
        let live = {
            let mut s = Scope::new();
            s.insert(Object::new(
                "Point",
                ObjectKind::TypeName,
                Type::Named(Arc::new(NamedType {
                    pkg_path: "geo".to_string(),
                    name: "Point".to_string(),
                    underlying: Type::Int,
                })),
            ));
            let p = TypesPackage::new("geo", "geo", s);
            p.mark_complete();
            Arc::new(p)
        };
        let mut imports = FxHashMap::default();
        imports.insert("geo".to_string(), live);

        let bytes = write_package(&sample_package()).unwrap();
        let back = read_package(&bytes, &imports, "geo").unwrap();
        let Type::Named(n) = &back.scope().lookup("Origin").unwrap().ty else {
            panic!("Origin should have a named type")
        };
        // Underlying comes from the live import, not the inlined copy.
        assert_eq!(n.underlying, Type::Int);
    }
}
