//! Query catalog types produced by a compile

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{GuestRefType, Oid, PgToWasm, TypeIndex, WasmToPg};

/// Sentinel for a heap type slot that has not been discovered yet
pub const UNKNOWN_HEAP_TYPE: i32 = -1;

/// Heap types with a fixed meaning in the guest language, discovered while
/// compiling queries and handed to the runtime as a flat array
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommonHeapTypes {
    /// `Array[Int]`: struct { buf: (ref $int_fixed_array), len: i32 }
    pub int_array: i32,
    /// `FixedArray[Int]`: array i32
    pub int_fixed_array: i32,
}

/// One slot of [`CommonHeapTypes`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeapSlot {
    IntArray,
    IntFixedArray,
}

impl HeapSlot {
    pub fn name(self) -> &'static str {
        match self {
            HeapSlot::IntArray => "Array[Int]",
            HeapSlot::IntFixedArray => "FixedArray[Int]",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{} resolved to type ${found}, but an earlier query resolved it to ${existing}", .slot.name())]
pub struct HeapTypeConflict {
    pub slot: HeapSlot,
    pub existing: i32,
    pub found: i32,
}

impl Default for CommonHeapTypes {
    fn default() -> Self {
        Self {
            int_array: UNKNOWN_HEAP_TYPE,
            int_fixed_array: UNKNOWN_HEAP_TYPE,
        }
    }
}

impl CommonHeapTypes {
    pub fn get(&self, slot: HeapSlot) -> i32 {
        match slot {
            HeapSlot::IntArray => self.int_array,
            HeapSlot::IntFixedArray => self.int_fixed_array,
        }
    }

    fn slot_mut(&mut self, slot: HeapSlot) -> &mut i32 {
        match slot {
            HeapSlot::IntArray => &mut self.int_array,
            HeapSlot::IntFixedArray => &mut self.int_fixed_array,
        }
    }

    /// Record a discovered heap type. Resolving a slot again to the same
    /// type is a no-op; resolving it to a different type is a conflict.
    pub fn resolve(&mut self, slot: HeapSlot, index: TypeIndex) -> Result<(), HeapTypeConflict> {
        let found = index as i32;
        let current = self.slot_mut(slot);
        if *current == UNKNOWN_HEAP_TYPE {
            *current = found;
            Ok(())
        } else if *current == found {
            Ok(())
        } else {
            Err(HeapTypeConflict {
                slot,
                existing: *current,
                found,
            })
        }
    }

    /// Display name of a concrete type, if it fills one of the slots
    pub fn name_of(&self, index: TypeIndex) -> Option<&'static str> {
        [HeapSlot::IntArray, HeapSlot::IntFixedArray]
            .into_iter()
            .find(|slot| self.get(*slot) == index as i32)
            .map(HeapSlot::name)
    }

    /// Flatten into the integer array handed back to the caller
    pub fn to_vec(&self) -> Vec<i32> {
        vec![self.int_array, self.int_fixed_array]
    }
}

/// Association of a guest-language type id with a host type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TidOid {
    /// Guest type id (UUID text)
    pub tid: String,
    pub oid: Oid,
}

/// One fully-typed query extracted from the guest module
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryDescriptor {
    /// Position in the `get_queries()` struct; also written back into the guest object
    pub index: u32,
    pub sql: String,
    /// Host type of each argument
    pub arg_types: Vec<Oid>,
    pub arg_conversions: Vec<WasmToPg>,
    /// Host type of each result column, as reported by the analyzer
    pub result_types: Vec<Oid>,
    pub result_conversions: Vec<PgToWasm>,
    /// Type of the arguments record (i32 for unit)
    pub args_type: GuestRefType,
    pub arg_field_types: Vec<GuestRefType>,
    /// Content type of the result box (i32 for unit)
    pub result_type: GuestRefType,
    pub result_field_types: Vec<GuestRefType>,
}
