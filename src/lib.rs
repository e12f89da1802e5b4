//! Rustica - compile guest WebAssembly modules into native artifacts and
//! typed query catalogs
//!
//! This is the root workspace crate that provides integration tests.
//! The actual implementation is in the workspace member crates.

// Re-export main crates for convenience
pub use rustica_compiler as compiler;
pub use rustica_module as module;
pub use rustica_types as types;

pub use rustica_compiler::{CompileError, CompileOptions, CompileOutput, Compiler};
