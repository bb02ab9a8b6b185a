// SPDX-License-Identifier: BSD-3-Clause
use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};

use triomphe::Arc;

pub type TypeRef = Arc<Type>;

/// The subset of the LLVM 14 type system (typed pointers) that the analyses
/// inspect. Named structs are kept opaque: two named structs are the same
/// type iff their names are equal, which is also how the type keys of the
/// call-graph analysis compare them across modules.
#[derive(Clone, Debug, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", tag = "kind")]
pub enum Type {
    Void,
    Integer {
        bits: u32,
    },
    Float {
        bits: u32,
    },
    Pointer {
        pointee: TypeRef,
    },
    Array {
        element: TypeRef,
        len: u64,
    },
    Vector {
        element: TypeRef,
        len: u64,
    },
    Struct {
        fields: Vec<TypeRef>,
        #[serde(default)]
        packed: bool,
    },
    NamedStruct {
        name: String,
    },
    Function {
        ret: TypeRef,
        params: Vec<TypeRef>,
        #[serde(default)]
        var_arg: bool,
    },
    Label,
    Metadata,
    Other,
}

impl Type {
    pub fn void() -> TypeRef {
        Arc::new(Type::Void)
    }

    pub fn int(bits: u32) -> TypeRef {
        Arc::new(Type::Integer { bits })
    }

    pub fn ptr(pointee: TypeRef) -> TypeRef {
        Arc::new(Type::Pointer { pointee })
    }

    pub fn named(name: &str) -> TypeRef {
        Arc::new(Type::NamedStruct {
            name: name.to_string(),
        })
    }

    pub fn array(element: TypeRef, len: u64) -> TypeRef {
        Arc::new(Type::Array { element, len })
    }

    pub fn func(ret: TypeRef, params: Vec<TypeRef>, var_arg: bool) -> TypeRef {
        Arc::new(Type::Function {
            ret,
            params,
            var_arg,
        })
    }

    /// Structs, arrays and vectors.
    pub fn is_composite(&self) -> bool {
        matches!(
            self,
            Type::Struct { .. } | Type::NamedStruct { .. } | Type::Array { .. } | Type::Vector { .. }
        )
    }

    pub fn is_pointer(&self) -> bool {
        matches!(self, Type::Pointer { .. })
    }

    pub fn is_void(&self) -> bool {
        matches!(self, Type::Void)
    }

    pub fn pointee(&self) -> Option<&TypeRef> {
        match self {
            Type::Pointer { pointee } => Some(pointee),
            _ => None,
        }
    }

    pub fn int_bits(&self) -> Option<u32> {
        match self {
            Type::Integer { bits } => Some(*bits),
            _ => None,
        }
    }

    pub fn struct_name(&self) -> Option<&str> {
        match self {
            Type::NamedStruct { name } => Some(name),
            _ => None,
        }
    }

    /// Return type, parameter types and variadicity of a function type.
    pub fn signature(&self) -> Option<(&TypeRef, &[TypeRef], bool)> {
        match self {
            Type::Function {
                ret,
                params,
                var_arg,
            } => Some((ret, params, *var_arg)),
            _ => None,
        }
    }

    /// The printed type with all whitespace removed. Two types get the same
    /// key iff they print the same, so named structs from different modules
    /// share keys.
    pub fn key(&self) -> String {
        self.to_string().replace(' ', "")
    }
}

impl Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Void => write!(f, "void"),
            Type::Integer { bits } => write!(f, "i{}", bits),
            Type::Float { bits: 16 } => write!(f, "half"),
            Type::Float { bits: 32 } => write!(f, "float"),
            Type::Float { bits: 64 } => write!(f, "double"),
            Type::Float { bits: 80 } => write!(f, "x86_fp80"),
            Type::Float { bits } => write!(f, "fp{}", bits),
            Type::Pointer { pointee } => write!(f, "{}*", pointee),
            Type::Array { element, len } => write!(f, "[{} x {}]", len, element),
            Type::Vector { element, len } => write!(f, "<{} x {}>", len, element),
            Type::Struct { fields, packed } => {
                if *packed {
                    write!(f, "<")?;
                }
                write!(f, "{{ ")?;
                for (i, field) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", field)?;
                }
                write!(f, " }}")?;
                if *packed {
                    write!(f, ">")?;
                }
                Ok(())
            }
            Type::NamedStruct { name } => write!(f, "%{}", name),
            Type::Function {
                ret,
                params,
                var_arg,
            } => {
                write!(f, "{} (", ret)?;
                for (i, p) in params.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", p)?;
                }
                if *var_arg {
                    if !params.is_empty() {
                        write!(f, ", ")?;
                    }
                    write!(f, "...")?;
                }
                write!(f, ")")
            }
            Type::Label => write!(f, "label"),
            Type::Metadata => write!(f, "metadata"),
            Type::Other => write!(f, "opaque"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Type;

    #[test]
    fn prints_like_llvm() {
        let i8p = Type::ptr(Type::int(8));
        let f = Type::func(Type::int(32), vec![i8p.clone(), Type::int(64)], true);
        assert_eq!("i32 (i8*, i64, ...)", f.to_string());
        assert_eq!("i32(i8*,i64,...)", f.key());
        assert_eq!("%struct.ops*", Type::ptr(Type::named("struct.ops")).to_string());
        assert_eq!("[4 x i8*]", Type::array(i8p, 4).to_string());
    }

    #[test]
    fn composites() {
        assert!(Type::named("struct.s").is_composite());
        assert!(Type::array(Type::int(8), 2).is_composite());
        assert!(!Type::ptr(Type::named("struct.s")).is_composite());
        assert!(!Type::int(32).is_composite());
    }
}
