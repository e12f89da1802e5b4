//! Module loading errors

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to load WASM module: {0}")]
    Malformed(#[from] wasmparser::BinaryReaderError),

    #[error("failed to load WASM module: type index {index} out of bounds")]
    UnknownType { index: u32 },
}
