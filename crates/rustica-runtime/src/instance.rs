//! Runtime contract: instantiate, call, inspect GC objects

use std::fmt;

use rustica_module::GuestModule;
use serde::{Deserialize, Serialize};

use crate::RuntimeError;

/// Memory budgets for a short-lived instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InstanceLimits {
    /// Operand/call stack of the instance, in bytes
    pub stack_size: u32,
    /// Linear memory available to the instance, in bytes
    pub heap_size: u32,
    /// Stack of the execution environment used for calls, in bytes
    pub exec_stack_size: u32,
}

impl Default for InstanceLimits {
    fn default() -> Self {
        Self {
            stack_size: 64 * 1024,
            heap_size: 256 * 1024,
            exec_stack_size: 64 * 1024,
        }
    }
}

/// Handle to a GC object owned by an execution environment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjRef(pub u32);

/// A value crossing the runtime boundary
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GuestValue {
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
    /// Null reference of any heap type
    Null,
    Struct(ObjRef),
    Array(ObjRef),
    Extern(ObjRef),
    /// Values the compiler never inspects (funcref, v128, i31, ...)
    Opaque,
}

impl GuestValue {
    pub fn kind(&self) -> &'static str {
        match self {
            GuestValue::I32(_) => "i32",
            GuestValue::I64(_) => "i64",
            GuestValue::F32(_) => "f32",
            GuestValue::F64(_) => "f64",
            GuestValue::Null => "null",
            GuestValue::Struct(_) => "struct",
            GuestValue::Array(_) => "array",
            GuestValue::Extern(_) => "externref",
            GuestValue::Opaque => "opaque value",
        }
    }

    pub fn as_i32(&self) -> Result<i32, RuntimeError> {
        match self {
            GuestValue::I32(v) => Ok(*v),
            other => Err(other.unexpected("i32")),
        }
    }

    pub fn as_i64(&self) -> Result<i64, RuntimeError> {
        match self {
            GuestValue::I64(v) => Ok(*v),
            other => Err(other.unexpected("i64")),
        }
    }

    pub fn as_struct(&self) -> Result<ObjRef, RuntimeError> {
        match self {
            GuestValue::Struct(obj) => Ok(*obj),
            other => Err(other.unexpected("struct")),
        }
    }

    pub fn as_array(&self) -> Result<ObjRef, RuntimeError> {
        match self {
            GuestValue::Array(obj) => Ok(*obj),
            other => Err(other.unexpected("array")),
        }
    }

    pub fn as_extern(&self) -> Result<ObjRef, RuntimeError> {
        match self {
            GuestValue::Extern(obj) => Ok(*obj),
            other => Err(other.unexpected("externref")),
        }
    }

    fn unexpected(&self, expected: &'static str) -> RuntimeError {
        RuntimeError::UnexpectedValue {
            expected,
            found: self.to_string(),
        }
    }
}

impl fmt::Display for GuestValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GuestValue::I32(v) => write!(f, "i32 {}", v),
            GuestValue::I64(v) => write!(f, "i64 {}", v),
            GuestValue::F32(v) => write!(f, "f32 {}", v),
            GuestValue::F64(v) => write!(f, "f64 {}", v),
            other => write!(f, "{}", other.kind()),
        }
    }
}

/// An embedded runtime able to instantiate guest modules
pub trait GuestRuntime {
    /// Instantiate `module` with the given budgets. The instance is
    /// released when the returned box is dropped.
    fn instantiate<'a>(
        &'a self,
        module: &'a GuestModule,
        limits: &InstanceLimits,
    ) -> Result<Box<dyn GuestInstance + 'a>, RuntimeError>;
}

/// A live instance of a guest module
pub trait GuestInstance {
    /// Create an execution environment. It borrows the instance, so it is
    /// always released before the instance is.
    fn create_exec_env(&mut self, stack_size: u32) -> Result<Box<dyn ExecEnv + '_>, RuntimeError>;
}

/// Calls into the instance and inspection of the GC objects it returns
///
/// Object handles are only valid for the execution environment that
/// produced them.
pub trait ExecEnv {
    /// Call an exported function by name
    fn call(&mut self, func: &str, args: &[GuestValue]) -> Result<Vec<GuestValue>, RuntimeError>;

    fn struct_field_count(&mut self, obj: ObjRef) -> Result<u32, RuntimeError>;

    fn struct_get(&mut self, obj: ObjRef, index: u32) -> Result<GuestValue, RuntimeError>;

    fn struct_set(&mut self, obj: ObjRef, index: u32, value: GuestValue) -> Result<(), RuntimeError>;

    /// Physical length of an array object
    fn array_len(&mut self, obj: ObjRef) -> Result<u32, RuntimeError>;

    fn array_get(&mut self, obj: ObjRef, index: u32) -> Result<GuestValue, RuntimeError>;

    /// Bytes held by an externref created by the host
    fn extern_bytes(&mut self, obj: ObjRef) -> Result<Vec<u8>, RuntimeError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_limits() {
        let limits = InstanceLimits::default();
        assert_eq!(limits.stack_size, 64 * 1024);
        assert_eq!(limits.heap_size, 256 * 1024);
        assert_eq!(limits.exec_stack_size, 64 * 1024);
    }

    #[test]
    fn test_accessors() {
        assert_eq!(GuestValue::I32(3).as_i32().unwrap(), 3);
        assert_eq!(GuestValue::Struct(ObjRef(1)).as_struct().unwrap(), ObjRef(1));

        let err = GuestValue::Null.as_struct().unwrap_err();
        assert_eq!(err.to_string(), "expected struct, found null");
        let err = GuestValue::I64(9).as_i32().unwrap_err();
        assert_eq!(err.to_string(), "expected i32, found i64 9");
    }
}
