//! Guest module loading and type introspection

use std::collections::HashMap;

use rustica_types::{
    ArrayType, FieldType, FuncType, GuestRefType, HeapType, RefType, StructType, TypeIndex,
};
use tracing::debug;
use wasmparser::{
    AbstractHeapType, CompositeInnerType, ExternalKind, Parser, Payload, StorageType, TypeRef,
    UnpackedIndex, ValType, Validator, WasmFeatures,
};

use crate::LoadError;

/// One entry of the module's type section
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DefinedType {
    Func(FuncType),
    Struct(StructType),
    Array(ArrayType),
    /// Composite types the compiler never inspects (continuations, ...)
    Other,
}

/// A validated guest module
///
/// Holds the raw bytes (needed again by the native compiler and the
/// runtime) together with the decoded type table, so structural queries
/// never re-parse the binary.
#[derive(Debug)]
pub struct GuestModule {
    bytes: Vec<u8>,
    types: Vec<DefinedType>,
    /// Type index of every function, imports first
    funcs: Vec<TypeIndex>,
    /// Exported functions by name
    exports: HashMap<String, u32>,
    custom_sections: Vec<String>,
}

/// Proposals a guest module may rely on
pub fn features() -> WasmFeatures {
    WasmFeatures::default()
        | WasmFeatures::REFERENCE_TYPES
        | WasmFeatures::FUNCTION_REFERENCES
        | WasmFeatures::GC
        | WasmFeatures::SIMD
        | WasmFeatures::BULK_MEMORY
}

impl GuestModule {
    /// Validate and decode module bytes
    pub fn load(bytes: &[u8]) -> Result<Self, LoadError> {
        Validator::new_with_features(features()).validate_all(bytes)?;

        let mut types = Vec::new();
        let mut funcs = Vec::new();
        let mut exports = HashMap::new();
        let mut custom_sections = Vec::new();

        for payload in Parser::new(0).parse_all(bytes) {
            match payload? {
                Payload::TypeSection(reader) => {
                    for rec_group in reader {
                        let rec_group = rec_group?;
                        let rec_start = types.len() as u32;
                        for sub in rec_group.into_types() {
                            types.push(convert_composite(
                                sub.composite_type.inner,
                                types.len() as u32,
                                rec_start,
                            ));
                        }
                    }
                }
                Payload::ImportSection(reader) => {
                    for import in reader {
                        if let TypeRef::Func(ty) = import?.ty {
                            funcs.push(ty);
                        }
                    }
                }
                Payload::FunctionSection(reader) => {
                    for ty in reader {
                        funcs.push(ty?);
                    }
                }
                Payload::ExportSection(reader) => {
                    for export in reader {
                        let export = export?;
                        if matches!(export.kind, ExternalKind::Func) {
                            exports.insert(export.name.to_string(), export.index);
                        }
                    }
                }
                Payload::CustomSection(reader) => {
                    custom_sections.push(reader.name().to_string());
                }
                _ => {}
            }
        }

        for &ty in &funcs {
            if ty as usize >= types.len() {
                return Err(LoadError::UnknownType { index: ty });
            }
        }

        debug!(
            types = types.len(),
            funcs = funcs.len(),
            exports = exports.len(),
            "loaded guest module"
        );

        Ok(Self {
            bytes: bytes.to_vec(),
            types,
            funcs,
            exports,
            custom_sections,
        })
    }

    /// The original module bytes
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn types(&self) -> &[DefinedType] {
        &self.types
    }

    pub fn defined_type(&self, index: TypeIndex) -> Option<&DefinedType> {
        self.types.get(index as usize)
    }

    pub fn custom_sections(&self) -> &[String] {
        &self.custom_sections
    }

    /// Exported functions with their signatures, sorted by name
    pub fn exported_funcs(&self) -> Vec<(&str, &FuncType)> {
        let mut funcs: Vec<_> = self
            .exports
            .keys()
            .filter_map(|name| Some((name.as_str(), self.lookup_exported_func(name)?)))
            .collect();
        funcs.sort_by(|a, b| a.0.cmp(b.0));
        funcs
    }

    /// Signature of an exported function
    pub fn lookup_exported_func(&self, name: &str) -> Option<&FuncType> {
        let func = *self.exports.get(name)?;
        let ty = *self.funcs.get(func as usize)?;
        match self.defined_type(ty)? {
            DefinedType::Func(f) => Some(f),
            _ => None,
        }
    }

    /// The struct type referenced by `ty`, if `ty` is a reference to a
    /// struct with exactly the requested nullability
    pub fn referred_struct(&self, ty: GuestRefType, nullable: bool) -> Option<&StructType> {
        match self.referred(ty, nullable)? {
            DefinedType::Struct(s) => Some(s),
            _ => None,
        }
    }

    /// The array type referenced by `ty`, if `ty` is a reference to an
    /// array with exactly the requested nullability
    pub fn referred_array(&self, ty: GuestRefType, nullable: bool) -> Option<&ArrayType> {
        match self.referred(ty, nullable)? {
            DefinedType::Array(a) => Some(a),
            _ => None,
        }
    }

    fn referred(&self, ty: GuestRefType, nullable: bool) -> Option<&DefinedType> {
        match ty {
            GuestRefType::Ref(RefType {
                nullable: n,
                heap: HeapType::Concrete(idx),
            }) if n == nullable => self.defined_type(idx),
            _ => None,
        }
    }
}

fn convert_composite(ty: CompositeInnerType, index: u32, rec_start: u32) -> DefinedType {
    match ty {
        CompositeInnerType::Func(f) => DefinedType::Func(FuncType {
            params: f.params().iter().map(|t| convert_val(*t, rec_start)).collect(),
            results: f.results().iter().map(|t| convert_val(*t, rec_start)).collect(),
        }),
        CompositeInnerType::Struct(s) => DefinedType::Struct(StructType {
            index,
            fields: s
                .fields
                .iter()
                .map(|f| convert_field(*f, rec_start))
                .collect(),
        }),
        CompositeInnerType::Array(a) => DefinedType::Array(ArrayType {
            index,
            elem: convert_field(a.0, rec_start),
        }),
        #[allow(unreachable_patterns)]
        _ => DefinedType::Other,
    }
}

fn convert_field(field: wasmparser::FieldType, rec_start: u32) -> FieldType {
    let ty = match field.element_type {
        StorageType::I8 => GuestRefType::I8,
        StorageType::I16 => GuestRefType::I16,
        StorageType::Val(v) => convert_val(v, rec_start),
    };
    FieldType {
        ty,
        mutable: field.mutable,
    }
}

fn convert_val(ty: ValType, rec_start: u32) -> GuestRefType {
    match ty {
        ValType::I32 => GuestRefType::I32,
        ValType::I64 => GuestRefType::I64,
        ValType::F32 => GuestRefType::F32,
        ValType::F64 => GuestRefType::F64,
        ValType::V128 => GuestRefType::V128,
        ValType::Ref(r) => GuestRefType::Ref(convert_ref(r, rec_start)),
    }
}

fn convert_ref(r: wasmparser::RefType, rec_start: u32) -> RefType {
    let heap = match r.heap_type() {
        wasmparser::HeapType::Concrete(idx) => match idx {
            UnpackedIndex::Module(i) => HeapType::Concrete(i),
            UnpackedIndex::RecGroup(i) => HeapType::Concrete(rec_start + i),
            UnpackedIndex::Id(_) => HeapType::Other,
        },
        wasmparser::HeapType::Abstract { shared: false, ty } => match ty {
            AbstractHeapType::Extern => HeapType::Extern,
            AbstractHeapType::NoExtern => HeapType::NoExtern,
            AbstractHeapType::Func => HeapType::Func,
            AbstractHeapType::NoFunc => HeapType::NoFunc,
            AbstractHeapType::Any => HeapType::Any,
            AbstractHeapType::Eq => HeapType::Eq,
            AbstractHeapType::I31 => HeapType::I31,
            AbstractHeapType::Struct => HeapType::Struct,
            AbstractHeapType::Array => HeapType::Array,
            AbstractHeapType::None => HeapType::None,
            _ => HeapType::Other,
        },
        wasmparser::HeapType::Abstract { shared: true, .. } => HeapType::Other,
    };
    RefType {
        nullable: r.is_nullable(),
        heap,
    }
}
