//! Conversion tags replayed at every query invocation
//!
//! Discriminants are part of the persisted query catalog; never reorder.

use serde::{Deserialize, Serialize};

/// How a guest value becomes a host column value (query arguments)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(i32)]
pub enum WasmToPg {
    I32ToBool = 0,
    I32ToInt4 = 1,
    I64ToInt8 = 2,
    F32ToFloat4 = 3,
    F64ToFloat8 = 4,
    ExternrefToDatum = 5,
    I32ArrayToInt2Array = 6,
    I32ArrayToInt4Array = 7,
}

/// How a host column value becomes a guest value (query results)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(i32)]
pub enum PgToWasm {
    BoolToI32 = 0,
    Int4ToI32 = 1,
    Int8ToI64 = 2,
    Float4ToF32 = 3,
    Float8ToF64 = 4,
    DatumToExternref = 5,
    Int2ArrayToI32Array = 6,
    Int4ArrayToI32Array = 7,
}

impl WasmToPg {
    pub fn as_i32(self) -> i32 {
        self as i32
    }
}

impl PgToWasm {
    pub fn as_i32(self) -> i32 {
        self as i32
    }
}
