//! Rustica Types - the shared vocabulary of the query compiler
//!
//! Guest-side WebAssembly GC types, host database type ids, conversion
//! tags and the query descriptors produced by a compile.

mod conversion;
mod guest;
mod host;
mod query;

pub use conversion::*;
pub use guest::*;
pub use host::*;
pub use query::*;
