//! Compile options

use rustica_runtime::InstanceLimits;
use serde::{Deserialize, Serialize};

/// Options for one compile call
///
/// Every field has a default, so a config file only needs the fields it
/// changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompileOptions {
    /// 0 disables optimization, 3 is the most aggressive
    pub opt_level: u8,
    /// Nonzero also optimizes for code size
    pub size_level: u8,
    /// Target triple of the native artifact; the host when unset
    pub target: Option<String>,
    pub enable_simd: bool,
    pub enable_bulk_memory: bool,
    pub enable_gc: bool,
    pub bounds_checks: bool,
    pub stack_bounds_checks: bool,
    /// Stack available to guest code in the compiled artifact, in bytes
    pub max_wasm_stack: usize,
    /// Collect DWARF sections and emit native debug info
    pub debug_info: bool,
    /// Budgets of the instance that enumerates queries
    pub limits: InstanceLimits,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            opt_level: 3,
            size_level: 3,
            target: None,
            enable_simd: true,
            enable_bulk_memory: true,
            enable_gc: true,
            bounds_checks: true,
            stack_bounds_checks: true,
            max_wasm_stack: 512 * 1024,
            debug_info: false,
            limits: InstanceLimits::default(),
        }
    }
}
