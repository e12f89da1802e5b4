//! Rustica Runtime - running guest code during compilation
//!
//! The query compiler needs to call `get_queries` and walk the GC objects
//! it returns. This crate defines that contract as traits and provides a
//! wasmtime implementation. It also owns the per-thread active runtime
//! context, which callers isolate around nested use.

mod context;
mod error;
mod instance;
mod wasmtime_runtime;

pub use context::{active, ContextGuard, ContextId};
pub use error::RuntimeError;
pub use instance::{ExecEnv, GuestInstance, GuestRuntime, GuestValue, InstanceLimits, ObjRef};
pub use wasmtime_runtime::{WasmtimeRuntime, BYTES_IMPORT};
