//! Guest (WebAssembly GC) type model
//!
//! The guest type grammar is closed: numeric value types, packed field
//! storage, and references to a small set of heap types. Everything the
//! compiler inspects is expressed with these types and matched exhaustively.

use serde::{Deserialize, Serialize};

use crate::CommonHeapTypes;

/// Index into the module's type section
pub type TypeIndex = u32;

/// A value type as it appears in a function signature or a struct/array field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum GuestRefType {
    I32,
    I64,
    F32,
    F64,
    V128,
    /// Packed 8-bit storage, only valid inside struct and array fields
    I8,
    /// Packed 16-bit storage, only valid inside struct and array fields
    I16,
    Ref(RefType),
}

/// A reference type: nullability plus the referenced heap type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RefType {
    pub nullable: bool,
    pub heap: HeapType,
}

/// The heap type a reference points to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HeapType {
    /// A type defined in the module's type section
    Concrete(TypeIndex),
    Extern,
    NoExtern,
    Func,
    NoFunc,
    Any,
    Eq,
    I31,
    Struct,
    Array,
    None,
    /// Heap types outside the GC proposal (exceptions, continuations, shared)
    Other,
}

impl GuestRefType {
    pub const EXTERNREF: GuestRefType = GuestRefType::Ref(RefType {
        nullable: true,
        heap: HeapType::Extern,
    });

    /// Non-nullable or nullable reference to a concrete type
    pub fn concrete(index: TypeIndex, nullable: bool) -> Self {
        GuestRefType::Ref(RefType {
            nullable,
            heap: HeapType::Concrete(index),
        })
    }

    pub fn as_ref_type(&self) -> Option<RefType> {
        match self {
            GuestRefType::Ref(r) => Some(*r),
            _ => None,
        }
    }

    /// The concrete type index if this references a module-defined type
    pub fn concrete_index(&self) -> Option<TypeIndex> {
        match self {
            GuestRefType::Ref(RefType {
                heap: HeapType::Concrete(idx),
                ..
            }) => Some(*idx),
            _ => None,
        }
    }

    /// True for any reference to the extern heap type, regardless of nullability
    pub fn is_extern(&self) -> bool {
        matches!(
            self,
            GuestRefType::Ref(RefType {
                heap: HeapType::Extern,
                ..
            })
        )
    }

    pub fn is_integer(&self) -> bool {
        matches!(self, GuestRefType::I32 | GuestRefType::I64)
    }

    /// Render the type for diagnostics, naming well-known heap types
    pub fn repr(&self, heap_types: &CommonHeapTypes) -> String {
        match self {
            GuestRefType::I32 => "i32".to_string(),
            GuestRefType::I64 => "i64".to_string(),
            GuestRefType::F32 => "f32".to_string(),
            GuestRefType::F64 => "f64".to_string(),
            GuestRefType::V128 => "v128".to_string(),
            GuestRefType::I8 => "i8".to_string(),
            GuestRefType::I16 => "i16".to_string(),
            GuestRefType::Ref(r) => r.repr(heap_types),
        }
    }
}

impl RefType {
    fn repr(&self, heap_types: &CommonHeapTypes) -> String {
        let heap = match self.heap {
            HeapType::Concrete(idx) => match heap_types.name_of(idx) {
                Some(name) => return name.to_string() + if self.nullable { "?" } else { "" },
                None => format!("${}", idx),
            },
            HeapType::Extern => {
                if self.nullable {
                    return "externref".to_string();
                }
                "extern".to_string()
            }
            HeapType::NoExtern => "noextern".to_string(),
            HeapType::Func => "func".to_string(),
            HeapType::NoFunc => "nofunc".to_string(),
            HeapType::Any => "any".to_string(),
            HeapType::Eq => "eq".to_string(),
            HeapType::I31 => "i31".to_string(),
            HeapType::Struct => "struct".to_string(),
            HeapType::Array => "array".to_string(),
            HeapType::None => "none".to_string(),
            HeapType::Other => "?".to_string(),
        };
        if self.nullable {
            format!("(ref null {})", heap)
        } else {
            format!("(ref {})", heap)
        }
    }
}

/// A struct or array field: storage type plus mutability
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FieldType {
    pub ty: GuestRefType,
    pub mutable: bool,
}

/// A struct type from the module's type section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructType {
    pub index: TypeIndex,
    pub fields: Vec<FieldType>,
}

impl StructType {
    pub fn field_count(&self) -> u32 {
        self.fields.len() as u32
    }

    pub fn field_type(&self, i: u32) -> Option<GuestRefType> {
        self.fields.get(i as usize).map(|f| f.ty)
    }
}

/// An array type from the module's type section
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArrayType {
    pub index: TypeIndex,
    pub elem: FieldType,
}

/// A function signature
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FuncType {
    pub params: Vec<GuestRefType>,
    pub results: Vec<GuestRefType>,
}
