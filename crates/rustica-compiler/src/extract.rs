//! Query descriptor extraction
//!
//! Runs the guest's `get_queries` export in a short-lived instance and
//! compiles every query object it returns.

use rustica_module::GuestModule;
use rustica_runtime::{GuestRuntime, GuestValue, InstanceLimits};
use rustica_sql::SqlAnalyzer;
use rustica_types::{FuncType, GuestRefType, QueryDescriptor, StructType};
use tracing::{debug, info_span};

use crate::query::compile_query;
use crate::shape::{validate_query_shape, MAX_FIELDS};
use crate::{CompileContext, CompileError, SignatureError};

pub const GET_QUERIES: &str = "get_queries";

/// Check the `get_queries` signature: `(i32) -> (ref $queries)` where
/// `$queries` is a struct type
pub fn validate_signature<'m>(
    module: &'m GuestModule,
    func: &FuncType,
) -> Result<&'m StructType, SignatureError> {
    if func.params.len() != 1 {
        return Err(SignatureError::ParamCount(func.params.len()));
    }
    if func.params[0] != GuestRefType::I32 {
        return Err(SignatureError::ParamType(
            func.params[0].repr(&Default::default()),
        ));
    }
    if func.results.len() != 1 {
        return Err(SignatureError::ResultCount(func.results.len()));
    }
    let result = func.results[0];
    module
        .referred_struct(result, false)
        .ok_or_else(|| SignatureError::ResultType(result.repr(&Default::default())))
}

fn check_query_count(count: u32) -> Result<(), CompileError> {
    if count > MAX_FIELDS {
        return Err(CompileError::CountOverflow {
            query: None,
            what: "queries",
            count,
        });
    }
    Ok(())
}

/// Extract the query catalog. `None` when the module has no `get_queries`.
///
/// The instance and its execution environment live only inside this call
/// and are released on every path out of it.
pub fn extract_queries(
    runtime: &dyn GuestRuntime,
    analyzer: &dyn SqlAnalyzer,
    module: &GuestModule,
    ctx: &mut CompileContext,
    limits: &InstanceLimits,
) -> Result<Option<Vec<QueryDescriptor>>, CompileError> {
    let func = match module.lookup_exported_func(GET_QUERIES) {
        Some(func) => func,
        None => {
            debug!("module exports no get_queries()");
            return Ok(None);
        }
    };
    let queries_type = validate_signature(module, func)?;

    let count = queries_type.field_count();
    check_query_count(count)?;
    if count == 0 {
        return Ok(Some(Vec::new()));
    }

    let mut instance = runtime.instantiate(module, limits)?;
    let mut env = instance.create_exec_env(limits.exec_stack_size)?;

    // 1 asks the guest to fill in argument type ids
    let results = env.call(GET_QUERIES, &[GuestValue::I32(1)])?;
    let queries = match results.as_slice() {
        [GuestValue::Struct(obj)] => *obj,
        other => {
            return Err(CompileError::consistency(
                None,
                format!("get_queries() returned {} values, expected one struct", other.len()),
            ))
        }
    };
    let runtime_count = env.struct_field_count(queries)?;
    if runtime_count != count {
        return Err(CompileError::consistency(
            None,
            format!(
                "get_queries() returned a struct of {} fields but declares {}",
                runtime_count, count
            ),
        ));
    }

    let mut descriptors = Vec::with_capacity(count as usize);
    for q in 0..count {
        let _span = info_span!("query", index = q).entered();

        let query_type = queries_type
            .field_type(q)
            .ok_or_else(|| CompileError::consistency(q, "missing query field type"))?;
        let shape = validate_query_shape(module, query_type, q, ctx)?;

        let obj = match env.struct_get(queries, q)? {
            GuestValue::Struct(obj) => obj,
            other => {
                return Err(CompileError::consistency(
                    q,
                    format!("expected a query object, found {}", other),
                ))
            }
        };

        // The index is how the host addresses this query from now on
        let index = match shape.index_type {
            GuestRefType::I64 => GuestValue::I64(q as i64),
            _ => GuestValue::I32(q as i32),
        };
        env.struct_set(obj, 0, index)?;

        descriptors.push(compile_query(
            env.as_mut(),
            module,
            analyzer,
            ctx,
            q,
            obj,
            &shape,
        )?);
    }

    debug!(queries = descriptors.len(), "extracted queries");
    Ok(Some(descriptors))
}
