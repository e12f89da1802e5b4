//! Conversion tag resolution
//!
//! Both directions are lookups in a table keyed by (host family, guest
//! shape). A pair missing from the table is a type mismatch; nothing is
//! coerced silently.

use rustica_module::GuestModule;
use rustica_types::{CommonHeapTypes, GuestRefType, Oid, PgToWasm, WasmToPg};

use crate::context::TidOidMap;
use crate::shape::{recognize_array, ArrayShape};
use crate::{Direction, TypeMismatch};

/// Host column types grouped by how their values cross the boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HostFamily {
    Bool,
    /// int4 and date
    Int4,
    Int8,
    /// timestamp, timestamptz and time
    Timestamp,
    Float4,
    Float8,
    /// Values handed to the guest as host-owned handles
    Opaque,
    Int2Array,
    Int4Array,
}

impl HostFamily {
    pub fn classify(oid: Oid, tid_map: &TidOidMap) -> Option<HostFamily> {
        let family = match oid {
            Oid::BOOL => HostFamily::Bool,
            Oid::INT4 | Oid::DATE => HostFamily::Int4,
            Oid::INT8 => HostFamily::Int8,
            Oid::TIMESTAMP | Oid::TIMESTAMPTZ | Oid::TIME => HostFamily::Timestamp,
            Oid::FLOAT4 => HostFamily::Float4,
            Oid::FLOAT8 => HostFamily::Float8,
            Oid::TEXT
            | Oid::VARCHAR
            | Oid::BPCHAR
            | Oid::UUID
            | Oid::JSON
            | Oid::JSONB
            | Oid::BYTEA
            | Oid::INTERVAL => HostFamily::Opaque,
            Oid::INT2ARRAY => HostFamily::Int2Array,
            Oid::INT4ARRAY => HostFamily::Int4Array,
            // Guest-defined types travel as handles
            other if tid_map.maps_to(other) => HostFamily::Opaque,
            _ => return None,
        };
        Some(family)
    }
}

/// Guest value types reduced to what the conversion tables distinguish
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GuestShape {
    I32,
    I64,
    F32,
    F64,
    /// externref of either nullability
    Extern,
    /// Length-tagged array of i32 (`Array[Int]`)
    IntArray,
    Other,
}

impl GuestShape {
    pub fn classify(ty: GuestRefType, module: &GuestModule) -> GuestShape {
        match ty {
            GuestRefType::I32 => GuestShape::I32,
            GuestRefType::I64 => GuestShape::I64,
            GuestRefType::F32 => GuestShape::F32,
            GuestRefType::F64 => GuestShape::F64,
            _ if ty.is_extern() => GuestShape::Extern,
            GuestRefType::Ref(_) => match recognize_array(module, ty, false) {
                Some(ArrayShape {
                    elem: GuestRefType::I32,
                    ..
                }) => GuestShape::IntArray,
                _ => GuestShape::Other,
            },
            GuestRefType::V128 | GuestRefType::I8 | GuestRefType::I16 => GuestShape::Other,
        }
    }
}

/// Guest to host (query arguments)
pub const WASM_TO_PG: &[(HostFamily, GuestShape, WasmToPg)] = &[
    (HostFamily::Bool, GuestShape::I32, WasmToPg::I32ToBool),
    (HostFamily::Int4, GuestShape::I32, WasmToPg::I32ToInt4),
    (HostFamily::Int8, GuestShape::I64, WasmToPg::I64ToInt8),
    // Widening: the host converts the int4 datum on assignment
    (HostFamily::Int8, GuestShape::I32, WasmToPg::I32ToInt4),
    (HostFamily::Timestamp, GuestShape::I64, WasmToPg::I64ToInt8),
    (HostFamily::Float4, GuestShape::F32, WasmToPg::F32ToFloat4),
    (HostFamily::Float8, GuestShape::F64, WasmToPg::F64ToFloat8),
    (HostFamily::Opaque, GuestShape::Extern, WasmToPg::ExternrefToDatum),
    (HostFamily::Int2Array, GuestShape::IntArray, WasmToPg::I32ArrayToInt2Array),
    (HostFamily::Int4Array, GuestShape::IntArray, WasmToPg::I32ArrayToInt4Array),
];

/// Host to guest (query results)
pub const PG_TO_WASM: &[(HostFamily, GuestShape, PgToWasm)] = &[
    (HostFamily::Bool, GuestShape::I32, PgToWasm::BoolToI32),
    (HostFamily::Int4, GuestShape::I32, PgToWasm::Int4ToI32),
    (HostFamily::Int8, GuestShape::I64, PgToWasm::Int8ToI64),
    (HostFamily::Timestamp, GuestShape::I64, PgToWasm::Int8ToI64),
    (HostFamily::Float4, GuestShape::F32, PgToWasm::Float4ToF32),
    (HostFamily::Float8, GuestShape::F64, PgToWasm::Float8ToF64),
    (HostFamily::Opaque, GuestShape::Extern, PgToWasm::DatumToExternref),
    (HostFamily::Int2Array, GuestShape::IntArray, PgToWasm::Int2ArrayToI32Array),
    (HostFamily::Int4Array, GuestShape::IntArray, PgToWasm::Int4ArrayToI32Array),
];

fn lookup<T: Copy>(
    table: &[(HostFamily, GuestShape, T)],
    family: Option<HostFamily>,
    shape: GuestShape,
) -> Option<T> {
    let family = family?;
    table
        .iter()
        .find(|(f, s, _)| *f == family && *s == shape)
        .map(|(_, _, tag)| *tag)
}

fn mismatch(
    direction: Direction,
    guest: GuestRefType,
    host: Oid,
    heap_types: &CommonHeapTypes,
) -> TypeMismatch {
    TypeMismatch {
        direction,
        guest: guest.repr(heap_types),
        host: host.to_string(),
    }
}

/// Conversion for a query argument of guest type `guest` bound to host type `host`
pub fn resolve_wasm_to_pg(
    module: &GuestModule,
    tid_map: &TidOidMap,
    heap_types: &CommonHeapTypes,
    guest: GuestRefType,
    host: Oid,
) -> Result<WasmToPg, TypeMismatch> {
    let family = HostFamily::classify(host, tid_map);
    let shape = GuestShape::classify(guest, module);
    lookup(WASM_TO_PG, family, shape)
        .ok_or_else(|| mismatch(Direction::WasmToPg, guest, host, heap_types))
}

/// Conversion for a result column of host type `host` read into guest type `guest`
pub fn resolve_pg_to_wasm(
    module: &GuestModule,
    tid_map: &TidOidMap,
    heap_types: &CommonHeapTypes,
    host: Oid,
    guest: GuestRefType,
) -> Result<PgToWasm, TypeMismatch> {
    let family = HostFamily::classify(host, tid_map);
    let shape = GuestShape::classify(guest, module);
    lookup(PG_TO_WASM, family, shape)
        .ok_or_else(|| mismatch(Direction::PgToWasm, guest, host, heap_types))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ModuleBuilder, ARRAY_INT};
    use rustica_types::TidOid;

    const ALL_OIDS: &[Oid] = &[
        Oid::BOOL,
        Oid::INT4,
        Oid::DATE,
        Oid::INT8,
        Oid::TIMESTAMP,
        Oid::TIMESTAMPTZ,
        Oid::TIME,
        Oid::FLOAT4,
        Oid::FLOAT8,
        Oid::TEXT,
        Oid::VARCHAR,
        Oid::UUID,
        Oid::JSON,
        Oid::JSONB,
        Oid::BYTEA,
        Oid::INTERVAL,
        Oid::INT2ARRAY,
        Oid::INT4ARRAY,
        Oid::NUMERIC,
    ];

    fn guest_types() -> Vec<GuestRefType> {
        vec![
            GuestRefType::I32,
            GuestRefType::I64,
            GuestRefType::F32,
            GuestRefType::F64,
            GuestRefType::EXTERNREF,
            GuestRefType::concrete(ARRAY_INT, false),
        ]
    }

    #[test]
    fn test_widening_only_into_the_host() {
        let module = ModuleBuilder::new().load();
        let tids = TidOidMap::default();
        let heap_types = CommonHeapTypes::default();

        assert_eq!(
            resolve_wasm_to_pg(&module, &tids, &heap_types, GuestRefType::I32, Oid::INT8).unwrap(),
            WasmToPg::I32ToInt4
        );
        let err =
            resolve_pg_to_wasm(&module, &tids, &heap_types, Oid::INT8, GuestRefType::I32).unwrap_err();
        assert_eq!(err.to_string(), "cannot cast PG \"int8\" into WASM \"i32\"");
    }

    #[test]
    fn test_no_float_coercion() {
        let module = ModuleBuilder::new().load();
        let tids = TidOidMap::default();
        let heap_types = CommonHeapTypes::default();

        let err = resolve_wasm_to_pg(&module, &tids, &heap_types, GuestRefType::I64, Oid::FLOAT4)
            .unwrap_err();
        assert_eq!(err.to_string(), "cannot cast WASM \"i64\" into PG \"float4\"");
        assert!(
            resolve_pg_to_wasm(&module, &tids, &heap_types, Oid::FLOAT8, GuestRefType::F32).is_err()
        );
    }

    #[test]
    fn test_resolution_is_deterministic_and_symmetric() {
        let module = ModuleBuilder::new().load();
        let tids = TidOidMap::default();
        let heap_types = CommonHeapTypes::default();

        for &oid in ALL_OIDS {
            for guest in guest_types() {
                let a = resolve_wasm_to_pg(&module, &tids, &heap_types, guest, oid).ok();
                let b = resolve_wasm_to_pg(&module, &tids, &heap_types, guest, oid).ok();
                assert_eq!(a, b);

                let back = resolve_pg_to_wasm(&module, &tids, &heap_types, oid, guest).ok();
                if let Some(back) = back {
                    assert_eq!(a.map(WasmToPg::as_i32), Some(back.as_i32()), "{oid} / {guest:?}");
                }
            }
        }
    }

    #[test]
    fn test_array_and_mapped_types() {
        let module = ModuleBuilder::new().load();
        let tids = TidOidMap::new(&[TidOid {
            tid: "0b7e".to_string(),
            oid: Oid(91000),
        }]);
        let mut heap_types = CommonHeapTypes::default();
        let array = GuestRefType::concrete(ARRAY_INT, false);

        assert_eq!(
            resolve_pg_to_wasm(&module, &tids, &heap_types, Oid::INT2ARRAY, array).unwrap(),
            PgToWasm::Int2ArrayToI32Array
        );
        assert_eq!(
            resolve_wasm_to_pg(&module, &tids, &heap_types, GuestRefType::EXTERNREF, Oid(91000))
                .unwrap(),
            WasmToPg::ExternrefToDatum
        );

        heap_types.int_array = ARRAY_INT as i32;
        let err = resolve_wasm_to_pg(&module, &tids, &heap_types, array, Oid::TEXT).unwrap_err();
        assert_eq!(err.to_string(), "cannot cast WASM \"Array[Int]\" into PG \"text\"");
        let err =
            resolve_wasm_to_pg(&module, &tids, &heap_types, GuestRefType::I32, Oid(424242)).unwrap_err();
        assert_eq!(err.host, "oid 424242");
    }
}
