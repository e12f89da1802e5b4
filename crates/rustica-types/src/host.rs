//! Host (relational database) type identifiers

use std::fmt;

use serde::{Deserialize, Serialize};

/// A type id in the host database catalog
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Oid(pub u32);

impl Oid {
    pub const INVALID: Oid = Oid(0);
    pub const BOOL: Oid = Oid(16);
    pub const BYTEA: Oid = Oid(17);
    pub const NAME: Oid = Oid(19);
    pub const INT8: Oid = Oid(20);
    pub const INT2: Oid = Oid(21);
    pub const INT4: Oid = Oid(23);
    pub const TEXT: Oid = Oid(25);
    pub const OID: Oid = Oid(26);
    pub const JSON: Oid = Oid(114);
    pub const FLOAT4: Oid = Oid(700);
    pub const FLOAT8: Oid = Oid(701);
    pub const INT2ARRAY: Oid = Oid(1005);
    pub const INT4ARRAY: Oid = Oid(1007);
    pub const TEXTARRAY: Oid = Oid(1009);
    pub const BPCHAR: Oid = Oid(1042);
    pub const VARCHAR: Oid = Oid(1043);
    pub const DATE: Oid = Oid(1082);
    pub const TIME: Oid = Oid(1083);
    pub const TIMESTAMP: Oid = Oid(1114);
    pub const TIMESTAMPTZ: Oid = Oid(1184);
    pub const INTERVAL: Oid = Oid(1186);
    pub const NUMERIC: Oid = Oid(1700);
    pub const UUID: Oid = Oid(2950);
    pub const JSONB: Oid = Oid(3802);

    /// Canonical catalog name, if this is a well-known type
    pub fn name(self) -> Option<&'static str> {
        WELL_KNOWN
            .iter()
            .find(|(oid, _)| *oid == self)
            .map(|(_, name)| *name)
    }

    /// Resolve a type name, accepting the usual SQL aliases
    pub fn from_name(name: &str) -> Option<Oid> {
        let lowered = name.trim().to_ascii_lowercase();
        let canonical = match lowered.as_str() {
            "boolean" => "bool",
            "smallint" => "int2",
            "int" | "integer" => "int4",
            "bigint" => "int8",
            "real" => "float4",
            "double precision" | "float" => "float8",
            "character varying" => "varchar",
            "char" | "character" => "bpchar",
            "decimal" => "numeric",
            "timestamp without time zone" => "timestamp",
            "timestamp with time zone" => "timestamptz",
            "time without time zone" => "time",
            "smallint[]" | "_int2" => "int2[]",
            "int[]" | "integer[]" | "_int4" => "int4[]",
            "_text" => "text[]",
            other => other,
        };
        WELL_KNOWN
            .iter()
            .find(|(_, n)| *n == canonical)
            .map(|(oid, _)| *oid)
    }
}

impl fmt::Display for Oid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "{}", name),
            None => write!(f, "oid {}", self.0),
        }
    }
}

const WELL_KNOWN: &[(Oid, &str)] = &[
    (Oid::BOOL, "bool"),
    (Oid::BYTEA, "bytea"),
    (Oid::NAME, "name"),
    (Oid::INT8, "int8"),
    (Oid::INT2, "int2"),
    (Oid::INT4, "int4"),
    (Oid::TEXT, "text"),
    (Oid::OID, "oid"),
    (Oid::JSON, "json"),
    (Oid::FLOAT4, "float4"),
    (Oid::FLOAT8, "float8"),
    (Oid::INT2ARRAY, "int2[]"),
    (Oid::INT4ARRAY, "int4[]"),
    (Oid::TEXTARRAY, "text[]"),
    (Oid::BPCHAR, "bpchar"),
    (Oid::VARCHAR, "varchar"),
    (Oid::DATE, "date"),
    (Oid::TIME, "time"),
    (Oid::TIMESTAMP, "timestamp"),
    (Oid::TIMESTAMPTZ, "timestamptz"),
    (Oid::INTERVAL, "interval"),
    (Oid::NUMERIC, "numeric"),
    (Oid::UUID, "uuid"),
    (Oid::JSONB, "jsonb"),
];
