//! Runtime error types

use thiserror::Error;

use crate::ObjRef;

/// Errors raised by the embedded runtime while running guest code
#[derive(Debug, Clone, Error)]
pub enum RuntimeError {
    #[error("cannot create runtime engine: {0}")]
    Engine(String),

    #[error("cannot instantiate WASM module: {0}")]
    Instantiate(String),

    #[error("cannot create execution environment: {0}")]
    ExecEnv(String),

    #[error("function not found: {0}")]
    FunctionNotFound(String),

    #[error("failed to call {func}(): {message}")]
    Call { func: String, message: String },

    #[error("invalid object handle {0:?}")]
    InvalidHandle(ObjRef),

    #[error("expected {expected}, found {found}")]
    UnexpectedValue { expected: &'static str, found: String },

    #[error("index {index} out of bounds (length {len})")]
    OutOfBounds { index: u32, len: u32 },

    #[error("GC object access failed: {0}")]
    Access(String),
}

impl RuntimeError {
    /// Get the error code for this error
    pub fn code(&self) -> &'static str {
        match self {
            RuntimeError::Engine(_) => "E-RT-001",
            RuntimeError::Instantiate(_) => "E-RT-002",
            RuntimeError::ExecEnv(_) => "E-RT-003",
            RuntimeError::FunctionNotFound(_) => "E-RT-004",
            RuntimeError::Call { .. } => "E-RT-005",
            RuntimeError::InvalidHandle(_) => "E-RT-006",
            RuntimeError::UnexpectedValue { .. } => "E-RT-007",
            RuntimeError::OutOfBounds { .. } => "E-RT-008",
            RuntimeError::Access(_) => "E-RT-009",
        }
    }
}
