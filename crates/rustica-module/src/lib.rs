//! Rustica Module - guest WebAssembly module loading
//!
//! Validates module bytes with the GC proposal enabled and exposes the
//! structural type queries the query compiler is built on.

mod error;
mod module;

pub use error::LoadError;
pub use module::{features, DefinedType, GuestModule};
