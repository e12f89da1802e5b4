//! Per-query value compiler
//!
//! Reads one live query object returned by `get_queries`, asks the host
//! analyzer for its result columns and builds the conversion plan.

use std::borrow::Cow;
use std::ffi::{CStr, CString};

use rustica_module::GuestModule;
use rustica_runtime::{ExecEnv, GuestValue, ObjRef};
use rustica_sql::SqlAnalyzer;
use rustica_types::{GuestRefType, Oid, PgToWasm, QueryDescriptor, WasmToPg};
use tracing::{debug, trace};

use crate::convert::{resolve_pg_to_wasm, resolve_wasm_to_pg};
use crate::oracle::describe_query_results;
use crate::shape::{recognize_array, QueryShape};
use crate::{CompileContext, CompileError};

const FIELD_INDEX: u32 = 0;
const FIELD_SQL: u32 = 1;
const FIELD_ARG_TYPES: u32 = 2;

/// NUL-terminate SQL text for the analyzer. Text that already ends in NUL
/// is borrowed as is; anything else is copied into a buffer one byte longer.
pub fn terminate_sql(bytes: &[u8]) -> Result<Cow<'_, CStr>, String> {
    if bytes.last() == Some(&0) {
        CStr::from_bytes_with_nul(bytes)
            .map(Cow::Borrowed)
            .map_err(|e| e.to_string())
    } else {
        CString::new(bytes)
            .map(Cow::Owned)
            .map_err(|e| e.to_string())
    }
}

/// Build the descriptor of query `query` from its object `obj`, whose
/// declared layout is `shape`
pub(crate) fn compile_query(
    env: &mut dyn ExecEnv,
    module: &GuestModule,
    analyzer: &dyn SqlAnalyzer,
    ctx: &mut CompileContext,
    query: u32,
    obj: ObjRef,
    shape: &QueryShape,
) -> Result<QueryDescriptor, CompileError> {
    let index = read_index(env, obj, shape.index_type)?;
    let sql = read_sql(env, obj, query)?;
    trace!(index, %sql, "read query object");

    let nargs = shape.arg_fields.len();
    let arg_types = read_arg_types(env, obj, query, nargs)?;

    let result_types = describe_query_results(analyzer, &sql, &arg_types).map_err(|error| {
        CompileError::Analyzer {
            query,
            sql: sql.clone(),
            error,
        }
    })?;
    if result_types.len() != shape.result_fields.len() {
        return Err(CompileError::consistency(
            query,
            format!(
                "query declares {} result fields but the SQL produces {} columns",
                shape.result_fields.len(),
                result_types.len()
            ),
        ));
    }

    let mut arg_conversions = Vec::with_capacity(nargs);
    for (guest, host) in shape.arg_fields.iter().zip(&arg_types) {
        let tag = resolve_wasm_to_pg(module, ctx.tid_map(), ctx.heap_types(), *guest, *host)
            .map_err(|error| CompileError::TypeMismatch { query, error })?;
        if matches!(
            tag,
            WasmToPg::I32ArrayToInt2Array | WasmToPg::I32ArrayToInt4Array
        ) {
            register_array(module, ctx, *guest)?;
        }
        arg_conversions.push(tag);
    }

    let mut result_conversions = Vec::with_capacity(result_types.len());
    for (host, guest) in result_types.iter().zip(&shape.result_fields) {
        let tag = resolve_pg_to_wasm(module, ctx.tid_map(), ctx.heap_types(), *host, *guest)
            .map_err(|error| CompileError::TypeMismatch { query, error })?;
        if matches!(
            tag,
            PgToWasm::Int2ArrayToI32Array | PgToWasm::Int4ArrayToI32Array
        ) {
            register_array(module, ctx, *guest)?;
        }
        result_conversions.push(tag);
    }

    debug!(
        index,
        args = arg_conversions.len(),
        results = result_conversions.len(),
        "compiled query"
    );

    Ok(QueryDescriptor {
        index,
        sql,
        arg_types,
        arg_conversions,
        result_types,
        result_conversions,
        args_type: shape.args_type,
        arg_field_types: shape.arg_fields.clone(),
        result_type: shape.result_type,
        result_field_types: shape.result_fields.clone(),
    })
}

fn register_array(
    module: &GuestModule,
    ctx: &mut CompileContext,
    ty: GuestRefType,
) -> Result<(), CompileError> {
    if let Some(array) = recognize_array(module, ty, false) {
        ctx.register_int_array(&array)?;
    }
    Ok(())
}

/// The index as written back into the object by the extractor
fn read_index(env: &mut dyn ExecEnv, obj: ObjRef, ty: GuestRefType) -> Result<u32, CompileError> {
    let value = env.struct_get(obj, FIELD_INDEX)?;
    let index = match ty {
        GuestRefType::I64 => value.as_i64()? as u32,
        _ => value.as_i32()? as u32,
    };
    Ok(index)
}

fn read_sql(env: &mut dyn ExecEnv, obj: ObjRef, query: u32) -> Result<String, CompileError> {
    let handle = match env.struct_get(obj, FIELD_SQL)? {
        GuestValue::Extern(handle) => handle,
        other => {
            return Err(CompileError::consistency(
                query,
                format!("expected SQL bytes, found {}", other),
            ))
        }
    };
    let bytes = env.extern_bytes(handle)?;
    let sql = terminate_sql(&bytes)
        .map_err(|e| CompileError::consistency(query, format!("invalid SQL text: {}", e)))?;
    sql.to_str()
        .map(str::to_string)
        .map_err(|e| CompileError::consistency(query, format!("invalid SQL text: {}", e)))
}

/// Host type ids from the `Array[Int]` in field 2. Its logical length must
/// equal the declared argument count.
fn read_arg_types(
    env: &mut dyn ExecEnv,
    obj: ObjRef,
    query: u32,
    nargs: usize,
) -> Result<Vec<Oid>, CompileError> {
    let array = env.struct_get(obj, FIELD_ARG_TYPES)?.as_struct()?;
    let len = env.struct_get(array, 1)?.as_i32()?;
    if len < 0 || len as usize != nargs {
        return Err(CompileError::consistency(
            query,
            format!("given {} OIDs but expect {}", len, nargs),
        ));
    }

    let buffer = env.struct_get(array, 0)?.as_array()?;
    let capacity = env.array_len(buffer)?;
    if (capacity as usize) < nargs {
        return Err(CompileError::consistency(
            query,
            format!(
                "argument type array holds {} elements but its length is {}",
                capacity, nargs
            ),
        ));
    }

    (0..nargs as u32)
        .map(|i| -> Result<Oid, CompileError> {
            Ok(Oid(env.array_get(buffer, i)?.as_i32()? as u32))
        })
        .collect()
}
