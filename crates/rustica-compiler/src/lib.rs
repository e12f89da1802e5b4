//! Rustica Compiler - guest modules to native artifacts and query catalogs
//!
//! A compile produces two things from one guest module: the native
//! artifact the database loads at run time, and a descriptor for every
//! query the module declares through its `get_queries` export. Each
//! descriptor pins the SQL text, the host types of its arguments and
//! results, and the conversions between guest and host values.

mod aot;
mod context;
mod convert;
mod error;
mod extract;
mod options;
mod oracle;
mod query;
mod shape;

#[cfg(test)]
mod testing;

#[cfg(feature = "debug-aot")]
pub use aot::DwarfExtractor;
pub use aot::AotCompiler;
pub use context::{CompileContext, TidOidMap};
pub use convert::{resolve_pg_to_wasm, resolve_wasm_to_pg, GuestShape, HostFamily};
pub use error::*;
pub use extract::{extract_queries, validate_signature, GET_QUERIES};
pub use options::CompileOptions;
pub use oracle::{choose_portal_strategy, describe_query_results, PortalStrategy};
pub use query::terminate_sql;
pub use shape::{recognize_array, validate_query_shape, ArrayShape, QueryShape, MAX_FIELDS};

use rustica_module::GuestModule;
use rustica_runtime::{ContextGuard, GuestRuntime};
use rustica_sql::SqlAnalyzer;
use rustica_types::{QueryDescriptor, TidOid};
use serde::Serialize;
use tracing::{debug, info, info_span};

/// Result of a successful compile
#[derive(Debug, Clone, Serialize)]
pub struct CompileOutput {
    /// Native code for the target
    #[serde(skip)]
    pub artifact: Vec<u8>,
    /// `CommonHeapTypes` as a flat list, `-1` for slots never resolved
    pub heap_types: Vec<i32>,
    /// `None` when the module exports no `get_queries`
    pub queries: Option<Vec<QueryDescriptor>>,
}

/// Compiles guest modules against one runtime and one SQL analyzer
pub struct Compiler<R, A> {
    runtime: R,
    analyzer: A,
    options: CompileOptions,
}

impl<R: GuestRuntime, A: SqlAnalyzer> Compiler<R, A> {
    pub fn new(runtime: R, analyzer: A) -> Self {
        Self::with_options(runtime, analyzer, CompileOptions::default())
    }

    pub fn with_options(runtime: R, analyzer: A, options: CompileOptions) -> Self {
        Self {
            runtime,
            analyzer,
            options,
        }
    }

    pub fn options(&self) -> &CompileOptions {
        &self.options
    }

    /// Compile `bytes` into a native artifact and its query catalog
    ///
    /// Either everything succeeds or nothing is returned. Whatever the
    /// outcome, the thread's runtime context is the same after the call
    /// as before it.
    pub fn compile(&self, bytes: &[u8], tid_map: &[TidOid]) -> Result<CompileOutput, CompileError> {
        let _span = info_span!("compile", bytes = bytes.len()).entered();
        let _context = ContextGuard::isolate();

        let mut ctx = CompileContext::new(tid_map);
        let module = GuestModule::load(bytes)?;
        debug!(types = module.types().len(), "loaded module");

        let artifact = AotCompiler::new(&self.options).compile(&module)?;
        let queries = extract_queries(
            &self.runtime,
            &self.analyzer,
            &module,
            &mut ctx,
            &self.options.limits,
        )?;

        info!(
            artifact = artifact.len(),
            queries = queries.as_ref().map_or(0, Vec::len),
            "compiled module"
        );
        Ok(CompileOutput {
            artifact,
            heap_types: ctx.heap_types().to_vec(),
            queries,
        })
    }
}
