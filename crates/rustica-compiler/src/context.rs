//! State scoped to one compile call

use std::collections::HashMap;

use rustica_types::{CommonHeapTypes, HeapSlot, HeapTypeConflict, Oid, TidOid};
use tracing::{trace, warn};

use crate::shape::ArrayShape;

/// Guest type ids mapped to host types
#[derive(Debug, Clone, Default)]
pub struct TidOidMap {
    by_tid: HashMap<String, Oid>,
}

impl TidOidMap {
    pub fn new(entries: &[TidOid]) -> Self {
        let mut by_tid = HashMap::with_capacity(entries.len());
        for entry in entries {
            if let Some(prev) = by_tid.insert(entry.tid.clone(), entry.oid) {
                if prev != entry.oid {
                    warn!(tid = %entry.tid, %prev, oid = %entry.oid, "type id mapped twice, keeping the last");
                }
            }
        }
        Self { by_tid }
    }

    pub fn oid_of(&self, tid: &str) -> Option<Oid> {
        self.by_tid.get(tid).copied()
    }

    /// Whether some guest type maps to `oid`
    pub fn maps_to(&self, oid: Oid) -> bool {
        self.by_tid.values().any(|o| *o == oid)
    }

    pub fn len(&self) -> usize {
        self.by_tid.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_tid.is_empty()
    }
}

/// Everything a compile call learns or is given, passed explicitly down
/// the pipeline and dropped when the call returns
#[derive(Debug, Clone, Default)]
pub struct CompileContext {
    tid_map: TidOidMap,
    heap_types: CommonHeapTypes,
}

impl CompileContext {
    pub fn new(tid_map: &[TidOid]) -> Self {
        Self {
            tid_map: TidOidMap::new(tid_map),
            heap_types: CommonHeapTypes::default(),
        }
    }

    pub fn tid_map(&self) -> &TidOidMap {
        &self.tid_map
    }

    pub fn heap_types(&self) -> &CommonHeapTypes {
        &self.heap_types
    }

    /// Record the types behind a recognized `Array[Int]`
    pub fn register_int_array(&mut self, shape: &ArrayShape) -> Result<(), HeapTypeConflict> {
        self.heap_types
            .resolve(HeapSlot::IntArray, shape.struct_index)?;
        self.heap_types
            .resolve(HeapSlot::IntFixedArray, shape.array_index)?;
        trace!(
            int_array = shape.struct_index,
            int_fixed_array = shape.array_index,
            "registered common heap types"
        );
        Ok(())
    }
}
