//! Compile error types

use std::fmt;

use rustica_module::LoadError;
use rustica_runtime::RuntimeError;
use rustica_sql::AnalyzerError;
use rustica_types::HeapTypeConflict;
use thiserror::Error;

/// Why a compile call failed. Every variant aborts the whole call.
#[derive(Debug, Error)]
pub enum CompileError {
    #[error(transparent)]
    Load(#[from] LoadError),

    #[error("failed to compile WASM module: {0}")]
    Codegen(String),

    #[error("failed to prepare debug info: {0}")]
    DebugInfo(String),

    #[error(transparent)]
    Signature(#[from] SignatureError),

    #[error("query {query}: {error}")]
    Shape {
        query: u32,
        #[source]
        error: ShapeError,
    },

    #[error("{}too many {what}: {count} (max: 65535)", query_prefix(.query))]
    CountOverflow {
        query: Option<u32>,
        what: &'static str,
        count: u32,
    },

    #[error("{}{detail}", query_prefix(.query))]
    Consistency { query: Option<u32>, detail: String },

    #[error("query {query}: {error}")]
    TypeMismatch {
        query: u32,
        #[source]
        error: TypeMismatch,
    },

    #[error("query {query}: {error}")]
    Analyzer {
        query: u32,
        /// Text handed to the analyzer, for rendering error spans
        sql: String,
        #[source]
        error: AnalyzerError,
    },

    #[error(transparent)]
    HeapTypeConflict(#[from] HeapTypeConflict),

    #[error(transparent)]
    Runtime(#[from] RuntimeError),
}

fn query_prefix(query: &Option<u32>) -> String {
    match query {
        Some(q) => format!("query {}: ", q),
        None => String::new(),
    }
}

impl CompileError {
    /// Get the error code for this error
    pub fn code(&self) -> &'static str {
        match self {
            CompileError::Load(_) => "E-RST-001",
            CompileError::Codegen(_) => "E-RST-002",
            CompileError::DebugInfo(_) => "E-RST-003",
            CompileError::Signature(_) => "E-RST-004",
            CompileError::Shape { .. } => "E-RST-005",
            CompileError::CountOverflow { .. } => "E-RST-006",
            CompileError::Consistency { .. } => "E-RST-007",
            CompileError::TypeMismatch { .. } => "E-RST-008",
            CompileError::Analyzer { .. } => "E-RST-009",
            CompileError::HeapTypeConflict(_) => "E-RST-010",
            CompileError::Runtime(_) => "E-RST-011",
        }
    }

    pub(crate) fn consistency(query: impl Into<Option<u32>>, detail: impl Into<String>) -> Self {
        CompileError::Consistency {
            query: query.into(),
            detail: detail.into(),
        }
    }
}

/// The `get_queries` export has the wrong signature
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignatureError {
    #[error("get_queries() must take exactly 1 argument, found {0}")]
    ParamCount(usize),

    #[error("get_queries() must take a boolean/i32 argument, found {0}")]
    ParamType(String),

    #[error("get_queries() must return exactly 1 value, found {0}")]
    ResultCount(usize),

    #[error("get_queries() must return a non-nullable struct, found {0}")]
    ResultType(String),
}

/// Field of a query descriptor a [`ShapeError`] refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShapeField {
    Query,
    Index,
    Sql,
    ArgTypes,
    Args,
    Result,
}

/// A query's declared type violates the five-field contract
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ShapeError {
    #[error("Query must be a non-nullable struct")]
    NotStruct,

    #[error("Query must have at least 5 fields, found {0}")]
    TooFewFields(u32),

    #[error("first field of Query must be an integer")]
    Index,

    #[error("second field of Query must be bytes")]
    Sql,

    #[error("third field of Query must be an array")]
    ArgTypesNotArray,

    #[error("third field of Query must be an array of i32")]
    ArgTypesElem,

    #[error("fourth field of Query must be a nullable struct or Unit")]
    Args,

    #[error("fifth field of Query must be a result box")]
    ResultNotBox,

    #[error("the result box must have exactly 1 field, found {0}")]
    ResultBoxFields(u32),

    #[error("fifth field of Query must be a box of nullable struct or Unit")]
    ResultContent,
}

impl ShapeError {
    pub fn field(&self) -> ShapeField {
        match self {
            ShapeError::NotStruct | ShapeError::TooFewFields(_) => ShapeField::Query,
            ShapeError::Index => ShapeField::Index,
            ShapeError::Sql => ShapeField::Sql,
            ShapeError::ArgTypesNotArray | ShapeError::ArgTypesElem => ShapeField::ArgTypes,
            ShapeError::Args => ShapeField::Args,
            ShapeError::ResultNotBox
            | ShapeError::ResultBoxFields(_)
            | ShapeError::ResultContent => ShapeField::Result,
        }
    }
}

/// Which way a value crosses the boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Query arguments
    WasmToPg,
    /// Query results
    PgToWasm,
}

/// No conversion is registered for a (host type, guest type) pair
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub struct TypeMismatch {
    pub direction: Direction,
    /// Guest type, as written by [`rustica_types::GuestRefType::repr`]
    pub guest: String,
    pub host: String,
}

impl fmt::Display for TypeMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.direction {
            Direction::WasmToPg => {
                write!(f, "cannot cast WASM \"{}\" into PG \"{}\"", self.guest, self.host)
            }
            Direction::PgToWasm => {
                write!(f, "cannot cast PG \"{}\" into WASM \"{}\"", self.host, self.guest)
            }
        }
    }
}
