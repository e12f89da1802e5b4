//! Structural recognition of query descriptor types

use rustica_module::GuestModule;
use rustica_types::{GuestRefType, TypeIndex};

use crate::{CompileContext, CompileError, ShapeError};

/// Upper bound for argument, result and query counts
pub const MAX_FIELDS: u32 = 65535;

/// A recognized length-tagged array: `struct { buf: (ref $array), len: i32 }`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArrayShape {
    /// Element type of the backing array
    pub elem: GuestRefType,
    /// Type of the `buf` field
    pub buffer: GuestRefType,
    pub struct_index: TypeIndex,
    pub array_index: TypeIndex,
}

/// Recognize `ty` as a length-tagged array. The struct reference must have
/// exactly the requested nullability; the buffer reference must be
/// non-nullable.
pub fn recognize_array(module: &GuestModule, ty: GuestRefType, nullable: bool) -> Option<ArrayShape> {
    let wrapper = module.referred_struct(ty, nullable)?;
    if wrapper.field_count() != 2 {
        return None;
    }

    let buffer = wrapper.field_type(0)?;
    let array = module.referred_array(buffer, false)?;
    if wrapper.field_type(1)? != GuestRefType::I32 {
        return None;
    }

    Some(ArrayShape {
        elem: array.elem.ty,
        buffer,
        struct_index: wrapper.index,
        array_index: array.index,
    })
}

/// Field layout of one query, derived from its declared type alone
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryShape {
    /// i32 or i64
    pub index_type: GuestRefType,
    /// i32 for unit, otherwise a nullable struct reference
    pub args_type: GuestRefType,
    pub arg_fields: Vec<GuestRefType>,
    /// Content of the result box: i32 for unit, otherwise a nullable struct reference
    pub result_type: GuestRefType,
    pub result_fields: Vec<GuestRefType>,
}

/// Check a query's declared type against the five-field contract:
///
/// 0. index: i32 or i64
/// 1. sql: externref
/// 2. argument type ids: `Array[Int]`
/// 3. arguments: unit (i32) or a nullable struct
/// 4. result box: a non-nullable struct of one field holding unit or a nullable struct
///
/// Fields after the fifth are ignored.
pub fn validate_query_shape(
    module: &GuestModule,
    ty: GuestRefType,
    query: u32,
    ctx: &mut CompileContext,
) -> Result<QueryShape, CompileError> {
    let shape_err = |error: ShapeError| CompileError::Shape { query, error };

    let query_type = module
        .referred_struct(ty, false)
        .ok_or_else(|| shape_err(ShapeError::NotStruct))?;
    if query_type.field_count() < 5 {
        return Err(shape_err(ShapeError::TooFewFields(query_type.field_count())));
    }
    let field = |i: u32| query_type.field_type(i).unwrap_or(GuestRefType::V128);

    let index_type = field(0);
    if !index_type.is_integer() {
        return Err(shape_err(ShapeError::Index));
    }

    if !field(1).is_extern() {
        return Err(shape_err(ShapeError::Sql));
    }

    let arg_types = recognize_array(module, field(2), false)
        .ok_or_else(|| shape_err(ShapeError::ArgTypesNotArray))?;
    if arg_types.elem != GuestRefType::I32 {
        return Err(shape_err(ShapeError::ArgTypesElem));
    }
    ctx.register_int_array(&arg_types)?;

    let args_type = field(3);
    let arg_fields = struct_or_unit(module, args_type).ok_or_else(|| shape_err(ShapeError::Args))?;
    check_count(query, "arguments", arg_fields.len())?;

    let result_box = module
        .referred_struct(field(4), false)
        .ok_or_else(|| shape_err(ShapeError::ResultNotBox))?;
    if result_box.field_count() != 1 {
        return Err(shape_err(ShapeError::ResultBoxFields(result_box.field_count())));
    }
    let result_type = result_box.field_type(0).unwrap_or(GuestRefType::V128);
    let result_fields =
        struct_or_unit(module, result_type).ok_or_else(|| shape_err(ShapeError::ResultContent))?;
    check_count(query, "result fields", result_fields.len())?;

    Ok(QueryShape {
        index_type,
        args_type,
        arg_fields,
        result_type,
        result_fields,
    })
}

/// Field types of a nullable struct, or none for unit
fn struct_or_unit(module: &GuestModule, ty: GuestRefType) -> Option<Vec<GuestRefType>> {
    if ty == GuestRefType::I32 {
        return Some(Vec::new());
    }
    let record = module.referred_struct(ty, true)?;
    Some(record.fields.iter().map(|f| f.ty).collect())
}

fn check_count(query: u32, what: &'static str, count: usize) -> Result<(), CompileError> {
    if count > MAX_FIELDS as usize {
        return Err(CompileError::CountOverflow {
            query: Some(query),
            what,
            count: count as u32,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{externref, field_ref, ModuleBuilder, ARRAY_INT, FIXED_ARRAY_INT};
    use wasm_encoder::ValType;

    #[test]
    fn test_recognize_array() {
        let mut builder = ModuleBuilder::new();
        let pair = builder.struct_type(&[ValType::I32, ValType::I32]);
        let module = builder.load();

        let shape = recognize_array(&module, GuestRefType::concrete(ARRAY_INT, false), false).unwrap();
        assert_eq!(shape.elem, GuestRefType::I32);
        assert_eq!(shape.struct_index, ARRAY_INT);
        assert_eq!(shape.array_index, FIXED_ARRAY_INT);
        assert_eq!(shape.buffer, GuestRefType::concrete(FIXED_ARRAY_INT, false));

        // Nullability must match the caller's request
        assert!(recognize_array(&module, GuestRefType::concrete(ARRAY_INT, true), false).is_none());
        assert!(recognize_array(&module, GuestRefType::concrete(pair, false), false).is_none());
        assert!(recognize_array(&module, GuestRefType::I32, false).is_none());
    }

    #[test]
    fn test_unit_args_and_struct_result() {
        let mut builder = ModuleBuilder::new();
        let row = builder.struct_type(&[ValType::I64, externref()]);
        let result_box = builder.struct_type(&[field_ref(row, true)]);
        let query = builder.struct_type(&[
            ValType::I64,
            externref(),
            field_ref(ARRAY_INT, false),
            ValType::I32,
            field_ref(result_box, false),
        ]);
        let module = builder.load();

        let mut ctx = CompileContext::new(&[]);
        let shape =
            validate_query_shape(&module, GuestRefType::concrete(query, false), 0, &mut ctx).unwrap();
        assert_eq!(shape.index_type, GuestRefType::I64);
        assert!(shape.arg_fields.is_empty());
        assert_eq!(shape.result_type, GuestRefType::concrete(row, true));
        assert_eq!(
            shape.result_fields,
            vec![GuestRefType::I64, GuestRefType::EXTERNREF]
        );
        assert_eq!(
            ctx.heap_types().to_vec(),
            vec![ARRAY_INT as i32, FIXED_ARRAY_INT as i32]
        );
    }

    #[test]
    fn test_field_rules() {
        let mut builder = ModuleBuilder::new();
        let unit_box = builder.struct_type(&[ValType::I32]);
        let two_box = builder.struct_type(&[ValType::I32, ValType::I32]);
        let base = [
            ValType::I32,
            externref(),
            field_ref(ARRAY_INT, false),
            ValType::I32,
            field_ref(unit_box, false),
        ];
        let mut variants = Vec::new();
        let mut with = |i: usize, ty: ValType| {
            let mut fields = base.to_vec();
            fields[i] = ty;
            builder.struct_type(&fields)
        };
        variants.push((with(0, ValType::F32), ShapeError::Index));
        variants.push((with(1, ValType::I32), ShapeError::Sql));
        variants.push((with(2, field_ref(unit_box, false)), ShapeError::ArgTypesNotArray));
        variants.push((with(3, ValType::I64), ShapeError::Args));
        variants.push((with(3, field_ref(unit_box, false)), ShapeError::Args));
        variants.push((with(4, field_ref(unit_box, true)), ShapeError::ResultNotBox));
        variants.push((with(4, field_ref(two_box, false)), ShapeError::ResultBoxFields(2)));
        let short = builder.struct_type(&base[..4]);
        let module = builder.load();

        for (ty, expected) in variants {
            let mut ctx = CompileContext::new(&[]);
            let err = validate_query_shape(&module, GuestRefType::concrete(ty, false), 3, &mut ctx)
                .unwrap_err();
            match err {
                CompileError::Shape { query, error } => {
                    assert_eq!(query, 3);
                    assert_eq!(error, expected);
                }
                other => panic!("expected shape error, got {other}"),
            }
        }

        let mut ctx = CompileContext::new(&[]);
        let err = validate_query_shape(&module, GuestRefType::concrete(short, false), 0, &mut ctx)
            .unwrap_err();
        assert!(matches!(
            err,
            CompileError::Shape {
                error: ShapeError::TooFewFields(4),
                ..
            }
        ));
    }

    #[test]
    fn test_extra_fields_are_ignored() {
        let mut builder = ModuleBuilder::new();
        let unit_box = builder.struct_type(&[ValType::I32]);
        let query = builder.struct_type(&[
            ValType::I32,
            externref(),
            field_ref(ARRAY_INT, false),
            ValType::I32,
            field_ref(unit_box, false),
            ValType::F64,
        ]);
        let module = builder.load();

        let mut ctx = CompileContext::new(&[]);
        let shape =
            validate_query_shape(&module, GuestRefType::concrete(query, false), 0, &mut ctx).unwrap();
        assert!(shape.result_fields.is_empty());
    }
}
