//! Named type registry: primitive tags, pointer tags, and struct layouts.
//!
//! Declared types travel through the compiler as tag strings (`int32`,
//! `float64`, `int32*`, `Point`) so primitives, pointers and struct names
//! fit one environment uniformly. The registry resolves a tag to its
//! concrete shape and lays out struct fields in declaration order with
//! natural alignment.

use cranelift_codegen::ir::types::{self, Type};
use rustc_hash::FxHashMap;

/// Resolved form of a declared type tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeDesc {
    Scalar(Type),
    /// Pointer to the base tag (one `*` stripped).
    Pointer(String),
    Struct(String),
    Void,
}

#[derive(Debug, Clone)]
pub struct Field {
    pub name: String,
    pub ty: String,
    pub offset: u32,
}

#[derive(Debug, Clone)]
pub struct StructDef {
    pub name: String,
    pub fields: Vec<Field>,
    pub size: u32,
    pub align: u32,
}

impl StructDef {
    /// Dense declaration-order index of `name`.
    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }
}

#[derive(Debug, Default)]
pub struct TypeRegistry {
    structs: FxHashMap<String, StructDef>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Primitive scalar for a tag, if it names one.
    pub fn scalar(tag: &str) -> Option<Type> {
        match tag {
            "int8" => Some(types::I8),
            "int16" => Some(types::I16),
            "int32" => Some(types::I32),
            "int64" => Some(types::I64),
            "float32" => Some(types::F32),
            "float64" => Some(types::F64),
            _ => None,
        }
    }

    /// Resolve a declared type tag; `None` for an unknown name.
    pub fn resolve(&self, tag: &str) -> Option<TypeDesc> {
        if let Some(base) = tag.strip_suffix('*') {
            return Some(TypeDesc::Pointer(base.to_string()));
        }
        if tag == "void" {
            return Some(TypeDesc::Void);
        }
        if let Some(ty) = Self::scalar(tag) {
            return Some(TypeDesc::Scalar(ty));
        }
        self.structs.get(tag).map(|s| TypeDesc::Struct(s.name.clone()))
    }

    pub fn struct_def(&self, name: &str) -> Option<&StructDef> {
        self.structs.get(name)
    }

    /// Register a struct. Fields lay out in declaration order, each aligned
    /// to its own size; the struct size rounds up to the widest field.
    /// Field types must be scalars or pointers.
    pub fn define_struct(
        &mut self,
        name: &str,
        fields: &[(String, String)],
        ptr_size: u32,
    ) -> Result<(), String> {
        if Self::scalar(name).is_some() || name == "void" {
            return Err(format!("'{}' is a reserved type name", name));
        }
        if self.structs.contains_key(name) {
            return Err(format!("struct '{}' is already defined", name));
        }
        let mut offset = 0u32;
        let mut align = 1u32;
        let mut laid = Vec::with_capacity(fields.len());
        for (fname, ftag) in fields {
            let size = match self.resolve(ftag) {
                Some(TypeDesc::Scalar(ty)) => ty.bytes(),
                Some(TypeDesc::Pointer(_)) => ptr_size,
                _ => {
                    return Err(format!(
                        "unsupported type '{}' for field '{}'",
                        ftag, fname
                    ))
                }
            };
            offset = align_to(offset, size);
            align = align.max(size);
            laid.push(Field {
                name: fname.clone(),
                ty: ftag.clone(),
                offset,
            });
            offset += size;
        }
        self.structs.insert(
            name.to_string(),
            StructDef {
                name: name.to_string(),
                fields: laid,
                size: align_to(offset, align),
                align,
            },
        );
        Ok(())
    }
}

fn align_to(offset: u32, align: u32) -> u32 {
    (offset + align - 1) & !(align - 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(n, t)| (n.to_string(), t.to_string()))
            .collect()
    }

    #[test]
    fn resolves_primitives_and_pointers() {
        let reg = TypeRegistry::new();
        assert_eq!(reg.resolve("int32"), Some(TypeDesc::Scalar(types::I32)));
        assert_eq!(reg.resolve("float64"), Some(TypeDesc::Scalar(types::F64)));
        assert_eq!(reg.resolve("void"), Some(TypeDesc::Void));
        assert_eq!(
            reg.resolve("int32*"),
            Some(TypeDesc::Pointer("int32".to_string()))
        );
        assert_eq!(reg.resolve("NoSuch"), None);
    }

    #[test]
    fn lays_out_fields_with_natural_alignment() {
        let mut reg = TypeRegistry::new();
        reg.define_struct("Mixed", &fields(&[("a", "int8"), ("b", "int32"), ("c", "int8")]), 8)
            .unwrap();
        let def = reg.struct_def("Mixed").unwrap();
        assert_eq!(def.fields[0].offset, 0);
        assert_eq!(def.fields[1].offset, 4);
        assert_eq!(def.fields[2].offset, 8);
        assert_eq!(def.size, 12);
        assert_eq!(def.align, 4);
    }

    #[test]
    fn field_indices_follow_declaration_order() {
        let mut reg = TypeRegistry::new();
        reg.define_struct("Point", &fields(&[("x", "int32"), ("y", "int32")]), 8)
            .unwrap();
        let def = reg.struct_def("Point").unwrap();
        assert_eq!(def.field_index("x"), Some(0));
        assert_eq!(def.field_index("y"), Some(1));
        assert_eq!(def.field_index("z"), None);
    }

    #[test]
    fn redefinition_is_an_error() {
        let mut reg = TypeRegistry::new();
        reg.define_struct("P", &fields(&[("x", "int32")]), 8).unwrap();
        assert!(reg.define_struct("P", &fields(&[("x", "int32")]), 8).is_err());
    }

    #[test]
    fn primitive_names_are_reserved() {
        let mut reg = TypeRegistry::new();
        assert!(reg.define_struct("int32", &[], 8).is_err());
    }

    #[test]
    fn struct_typed_fields_are_rejected() {
        let mut reg = TypeRegistry::new();
        reg.define_struct("P", &fields(&[("x", "int32")]), 8).unwrap();
        assert!(reg.define_struct("Q", &fields(&[("p", "P")]), 8).is_err());
    }
}
