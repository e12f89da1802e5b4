//! wasmtime-backed runtime

use std::marker::PhantomData;

use rustica_module::GuestModule;
use tracing::{debug, trace};
use wasmtime::{
    ArrayRef, Caller, Config, Engine, ExternRef, ExternType, FuncType, HeapType, Linker, Module,
    Rooted, Store, StoreLimits, StoreLimitsBuilder, StructRef, Val,
};

use crate::context::{ContextGuard, ContextId};
use crate::{ExecEnv, GuestInstance, GuestRuntime, GuestValue, InstanceLimits, ObjRef, RuntimeError};

/// Host import turning a guest byte array (`array (mut i8)`) into an
/// externref that carries the bytes. Guests use it to hand SQL text over.
pub const BYTES_IMPORT: (&str, &str) = ("rustica", "bytes_to_extern");

/// Runtime backed by wasmtime with the GC proposal enabled
///
/// Each instantiation gets its own engine so the instance's stack budget
/// becomes the engine's `max_wasm_stack`. Imports the guest declares but the
/// host does not provide are linked as trapping stubs, so query enumeration
/// works on modules that also use host APIs at query execution time.
///
/// wasmtime has no per-store cap on the GC heap: `heap_size` bounds linear
/// memory only.
pub struct WasmtimeRuntime {
    config: Config,
}

fn engine_err(e: wasmtime::Error) -> RuntimeError {
    RuntimeError::Engine(format!("{:#}", e))
}

impl WasmtimeRuntime {
    pub fn new() -> Result<Self, RuntimeError> {
        let mut config = Config::new();
        config
            .wasm_reference_types(true)
            .wasm_function_references(true)
            .wasm_gc(true);
        // Surface a rejected configuration here rather than on first use
        Engine::new(&config).map_err(engine_err)?;
        Ok(Self { config })
    }

    /// Engine whose wasm stack is bounded by the smaller of the instance
    /// and execution environment budgets
    fn engine(&self, limits: &InstanceLimits) -> Result<Engine, RuntimeError> {
        let stack = limits.stack_size.min(limits.exec_stack_size);
        if stack == 0 {
            return Err(RuntimeError::Engine("stack budget must be positive".to_string()));
        }
        let mut config = self.config.clone();
        config.max_wasm_stack(stack as usize);
        Engine::new(&config).map_err(engine_err)
    }
}

struct HostState {
    limits: StoreLimits,
}

struct WasmtimeInstance<'m> {
    store: Store<HostState>,
    instance: wasmtime::Instance,
    _module: PhantomData<&'m GuestModule>,
}

/// `(ref null? $a) -> externref` where `$a` is an array of i8
fn is_bytes_signature(ty: &FuncType) -> bool {
    let mut params = ty.params();
    let mut results = ty.results();
    if params.len() != 1 || results.len() != 1 {
        return false;
    }
    let takes_bytes = params
        .next()
        .and_then(|p| {
            p.as_ref()
                .and_then(|r| r.heap_type().as_concrete_array())
                .map(|a| a.element_type().is_i8())
        })
        .unwrap_or(false);
    let returns_extern = results
        .next()
        .and_then(|r| r.as_ref().map(|r| matches!(r.heap_type(), HeapType::Extern)))
        .unwrap_or(false);
    takes_bytes && returns_extern
}

fn bytes_to_extern(
    mut caller: Caller<'_, HostState>,
    params: &[Val],
    results: &mut [Val],
) -> wasmtime::Result<()> {
    let array = match params.first() {
        Some(Val::AnyRef(Some(any))) => any.unwrap_array(&caller)?,
        _ => return Err(wasmtime::Error::msg("expected a non-null byte array")),
    };
    let bytes = array
        .elems(&mut caller)?
        .map(|v| match v {
            Val::I32(b) => Some(b as u8),
            _ => None,
        })
        .collect::<Option<Vec<u8>>>()
        .ok_or_else(|| wasmtime::Error::msg("byte array holds non-integer elements"))?;
    trace!(len = bytes.len(), "wrapped guest bytes");
    let data = ExternRef::new(&mut caller, bytes)?;
    match results.first_mut() {
        Some(slot) => *slot = Val::ExternRef(Some(data)),
        None => return Err(wasmtime::Error::msg("missing result slot")),
    }
    Ok(())
}

fn define_bytes_import(linker: &mut Linker<HostState>, module: &Module) -> Result<(), RuntimeError> {
    let (module_name, name) = BYTES_IMPORT;
    for import in module.imports() {
        if import.module() != module_name || import.name() != name {
            continue;
        }
        let ty = match import.ty() {
            ExternType::Func(ty) if is_bytes_signature(&ty) => ty,
            _ => {
                return Err(RuntimeError::Instantiate(format!(
                    "{}::{} must have type (ref array i8) -> externref",
                    module_name, name
                )))
            }
        };
        linker
            .func_new(module_name, name, ty, bytes_to_extern)
            .map_err(|e| RuntimeError::Instantiate(format!("{:#}", e)))?;
    }
    Ok(())
}

impl GuestRuntime for WasmtimeRuntime {
    fn instantiate<'a>(
        &'a self,
        module: &'a GuestModule,
        limits: &InstanceLimits,
    ) -> Result<Box<dyn GuestInstance + 'a>, RuntimeError> {
        let instantiate_err = |e: wasmtime::Error| RuntimeError::Instantiate(format!("{:#}", e));

        let engine = self.engine(limits)?;
        let compiled = Module::new(&engine, module.bytes()).map_err(instantiate_err)?;
        let mut store = Store::new(
            &engine,
            HostState {
                limits: StoreLimitsBuilder::new()
                    .memory_size(limits.heap_size as usize)
                    .build(),
            },
        );
        store.limiter(|state| &mut state.limits);

        let mut linker: Linker<HostState> = Linker::new(&engine);
        define_bytes_import(&mut linker, &compiled)?;
        linker
            .define_unknown_imports_as_traps(&compiled)
            .map_err(instantiate_err)?;
        let instance = linker
            .instantiate(&mut store, &compiled)
            .map_err(instantiate_err)?;

        debug!(
            stack_size = limits.stack_size,
            heap_size = limits.heap_size,
            "instantiated guest module"
        );
        Ok(Box::new(WasmtimeInstance {
            store,
            instance,
            _module: PhantomData,
        }))
    }
}

impl<'m> GuestInstance for WasmtimeInstance<'m> {
    fn create_exec_env(&mut self, stack_size: u32) -> Result<Box<dyn ExecEnv + '_>, RuntimeError> {
        if stack_size == 0 {
            return Err(RuntimeError::ExecEnv("stack size must be positive".to_string()));
        }
        Ok(Box::new(WasmtimeExecEnv {
            id: ContextId::next(),
            instance: self,
            objects: Vec::new(),
        }))
    }
}

/// Rooted GC references handed out as [`ObjRef`]s
enum Obj {
    Struct(Rooted<StructRef>),
    Array(Rooted<ArrayRef>),
    Extern(Rooted<ExternRef>),
}

struct WasmtimeExecEnv<'i, 'm> {
    id: ContextId,
    instance: &'i mut WasmtimeInstance<'m>,
    objects: Vec<Obj>,
}

fn access_err(e: wasmtime::Error) -> RuntimeError {
    RuntimeError::Access(format!("{:#}", e))
}

impl<'i, 'm> WasmtimeExecEnv<'i, 'm> {
    fn handle(&mut self, obj: Obj) -> ObjRef {
        self.objects.push(obj);
        ObjRef(self.objects.len() as u32 - 1)
    }

    fn object(&self, obj: ObjRef) -> Result<&Obj, RuntimeError> {
        self.objects
            .get(obj.0 as usize)
            .ok_or(RuntimeError::InvalidHandle(obj))
    }

    fn struct_ref(&self, obj: ObjRef) -> Result<Rooted<StructRef>, RuntimeError> {
        match self.object(obj)? {
            Obj::Struct(s) => Ok(*s),
            _ => Err(RuntimeError::InvalidHandle(obj)),
        }
    }

    fn array_ref(&self, obj: ObjRef) -> Result<Rooted<ArrayRef>, RuntimeError> {
        match self.object(obj)? {
            Obj::Array(a) => Ok(*a),
            _ => Err(RuntimeError::InvalidHandle(obj)),
        }
    }

    fn import(&mut self, val: Val) -> Result<GuestValue, RuntimeError> {
        let value = match val {
            Val::I32(v) => GuestValue::I32(v),
            Val::I64(v) => GuestValue::I64(v),
            Val::F32(bits) => GuestValue::F32(f32::from_bits(bits)),
            Val::F64(bits) => GuestValue::F64(f64::from_bits(bits)),
            Val::AnyRef(None) | Val::ExternRef(None) | Val::FuncRef(None) => GuestValue::Null,
            Val::AnyRef(Some(any)) => {
                let store = &self.instance.store;
                let obj = match any.as_struct(store).map_err(access_err)? {
                    Some(s) => Some(Obj::Struct(s)),
                    None => any.as_array(store).map_err(access_err)?.map(Obj::Array),
                };
                match obj {
                    Some(obj @ Obj::Struct(_)) => GuestValue::Struct(self.handle(obj)),
                    Some(obj) => GuestValue::Array(self.handle(obj)),
                    None => GuestValue::Opaque,
                }
            }
            Val::ExternRef(Some(e)) => GuestValue::Extern(self.handle(Obj::Extern(e))),
            _ => GuestValue::Opaque,
        };
        Ok(value)
    }

    fn export(&self, value: GuestValue) -> Result<Val, RuntimeError> {
        match value {
            GuestValue::I32(v) => Ok(Val::I32(v)),
            GuestValue::I64(v) => Ok(Val::I64(v)),
            GuestValue::F32(v) => Ok(Val::F32(v.to_bits())),
            GuestValue::F64(v) => Ok(Val::F64(v.to_bits())),
            GuestValue::Null => Ok(Val::AnyRef(None)),
            GuestValue::Extern(obj) => match self.object(obj)? {
                Obj::Extern(e) => Ok(Val::ExternRef(Some(*e))),
                _ => Err(RuntimeError::InvalidHandle(obj)),
            },
            other => Err(RuntimeError::UnexpectedValue {
                expected: "numeric value, null or externref",
                found: other.to_string(),
            }),
        }
    }
}

impl<'i, 'm> ExecEnv for WasmtimeExecEnv<'i, 'm> {
    fn call(&mut self, func: &str, args: &[GuestValue]) -> Result<Vec<GuestValue>, RuntimeError> {
        let f = self
            .instance
            .instance
            .get_func(&mut self.instance.store, func)
            .ok_or_else(|| RuntimeError::FunctionNotFound(func.to_string()))?;
        let params = args
            .iter()
            .map(|a| self.export(*a))
            .collect::<Result<Vec<_>, _>>()?;
        let result_count = f.ty(&self.instance.store).results().len();
        let mut results = vec![Val::I32(0); result_count];

        trace!(func, args = args.len(), "calling guest function");
        {
            let _ctx = ContextGuard::enter(self.id);
            f.call(&mut self.instance.store, &params, &mut results)
                .map_err(|e| RuntimeError::Call {
                    func: func.to_string(),
                    message: format!("{:#}", e),
                })?;
        }

        results.into_iter().map(|v| self.import(v)).collect()
    }

    fn struct_field_count(&mut self, obj: ObjRef) -> Result<u32, RuntimeError> {
        let s = self.struct_ref(obj)?;
        let ty = s.ty(&self.instance.store).map_err(access_err)?;
        let count = ty.fields().len() as u32;
        Ok(count)
    }

    fn struct_get(&mut self, obj: ObjRef, index: u32) -> Result<GuestValue, RuntimeError> {
        let s = self.struct_ref(obj)?;
        let val = s
            .field(&mut self.instance.store, index as usize)
            .map_err(access_err)?;
        self.import(val)
    }

    fn struct_set(&mut self, obj: ObjRef, index: u32, value: GuestValue) -> Result<(), RuntimeError> {
        let s = self.struct_ref(obj)?;
        let val = self.export(value)?;
        s.set_field(&mut self.instance.store, index as usize, val)
            .map_err(access_err)
    }

    fn array_len(&mut self, obj: ObjRef) -> Result<u32, RuntimeError> {
        let a = self.array_ref(obj)?;
        a.len(&self.instance.store).map_err(access_err)
    }

    fn array_get(&mut self, obj: ObjRef, index: u32) -> Result<GuestValue, RuntimeError> {
        let a = self.array_ref(obj)?;
        let len = a.len(&self.instance.store).map_err(access_err)?;
        if index >= len {
            return Err(RuntimeError::OutOfBounds { index, len });
        }
        let val = a.get(&mut self.instance.store, index).map_err(access_err)?;
        self.import(val)
    }

    fn extern_bytes(&mut self, obj: ObjRef) -> Result<Vec<u8>, RuntimeError> {
        let e = match self.object(obj)? {
            Obj::Extern(e) => *e,
            _ => return Err(RuntimeError::InvalidHandle(obj)),
        };
        let data = e.data(&self.instance.store).map_err(access_err)?;
        if let Some(bytes) = data.downcast_ref::<Vec<u8>>() {
            Ok(bytes.clone())
        } else if let Some(text) = data.downcast_ref::<String>() {
            Ok(text.as_bytes().to_vec())
        } else if let Some(bytes) = data.downcast_ref::<Box<[u8]>>() {
            Ok(bytes.to_vec())
        } else {
            Err(RuntimeError::UnexpectedValue {
                expected: "host bytes",
                found: "externref of another host type".to_string(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wasm_encoder::{
        BlockType, CodeSection, EntityType, ExportKind, ExportSection, FieldType, Function,
        FunctionSection, HeapType, ImportSection, Instruction, RefType, StorageType, TypeSection,
        ValType,
    };

    /// (struct i64 i32), (func (param i32) (result (ref 0))) returning struct.new(7, param)
    fn struct_module() -> Vec<u8> {
        let mut module = wasm_encoder::Module::new();

        let mut types = TypeSection::new();
        types.ty().struct_(vec![
            FieldType {
                element_type: StorageType::Val(ValType::I64),
                mutable: true,
            },
            FieldType {
                element_type: StorageType::Val(ValType::I32),
                mutable: true,
            },
        ]);
        types.ty().function(
            vec![ValType::I32],
            vec![ValType::Ref(RefType {
                nullable: false,
                heap_type: HeapType::Concrete(0),
            })],
        );
        module.section(&types);

        let mut functions = FunctionSection::new();
        functions.function(1);
        module.section(&functions);

        let mut exports = ExportSection::new();
        exports.export("make", ExportKind::Func, 0);
        module.section(&exports);

        let mut codes = CodeSection::new();
        let mut body = Function::new(vec![]);
        body.instruction(&Instruction::I64Const(7));
        body.instruction(&Instruction::LocalGet(0));
        body.instruction(&Instruction::StructNew(0));
        body.instruction(&Instruction::End);
        codes.function(&body);
        module.section(&codes);

        module.finish()
    }

    #[test]
    fn test_call_and_inspect_struct() {
        let module = GuestModule::load(&struct_module()).unwrap();
        let runtime = WasmtimeRuntime::new().unwrap();
        let mut instance = runtime
            .instantiate(&module, &InstanceLimits::default())
            .unwrap();
        let mut env = instance.create_exec_env(64 * 1024).unwrap();

        let results = env.call("make", &[GuestValue::I32(5)]).unwrap();
        assert_eq!(results.len(), 1);
        let obj = results[0].as_struct().unwrap();

        assert_eq!(env.struct_field_count(obj).unwrap(), 2);
        assert_eq!(env.struct_get(obj, 0).unwrap(), GuestValue::I64(7));
        assert_eq!(env.struct_get(obj, 1).unwrap(), GuestValue::I32(5));

        env.struct_set(obj, 0, GuestValue::I64(0)).unwrap();
        assert_eq!(env.struct_get(obj, 0).unwrap(), GuestValue::I64(0));
    }

    #[test]
    fn test_missing_function() {
        let module = GuestModule::load(&struct_module()).unwrap();
        let runtime = WasmtimeRuntime::new().unwrap();
        let mut instance = runtime
            .instantiate(&module, &InstanceLimits::default())
            .unwrap();
        let mut env = instance.create_exec_env(64 * 1024).unwrap();

        let err = env.call("get_queries", &[GuestValue::I32(1)]).unwrap_err();
        assert!(matches!(err, RuntimeError::FunctionNotFound(_)));
    }
    /// `sql() -> externref` wrapping the bytes "SQL" through the host
    /// import, and `deep(n)` recursing n frames
    fn host_module() -> Vec<u8> {
        let mut module = wasm_encoder::Module::new();

        let mut types = TypeSection::new();
        types.ty().array(&StorageType::I8, true);
        types.ty().function(
            vec![ValType::Ref(RefType {
                nullable: false,
                heap_type: HeapType::Concrete(0),
            })],
            vec![ValType::Ref(RefType::EXTERNREF)],
        );
        types.ty().function(vec![], vec![ValType::Ref(RefType::EXTERNREF)]);
        types.ty().function(vec![ValType::I32], vec![ValType::I32]);
        module.section(&types);

        let mut imports = ImportSection::new();
        imports.import(BYTES_IMPORT.0, BYTES_IMPORT.1, EntityType::Function(1));
        module.section(&imports);

        let mut functions = FunctionSection::new();
        functions.function(2);
        functions.function(3);
        module.section(&functions);

        let mut exports = ExportSection::new();
        exports.export("sql", ExportKind::Func, 1);
        exports.export("deep", ExportKind::Func, 2);
        module.section(&exports);

        let mut codes = CodeSection::new();
        let mut sql = Function::new(vec![]);
        for byte in b"SQL" {
            sql.instruction(&Instruction::I32Const(*byte as i32));
        }
        sql.instruction(&Instruction::ArrayNewFixed {
            array_type_index: 0,
            array_size: 3,
        });
        sql.instruction(&Instruction::Call(0));
        sql.instruction(&Instruction::End);
        codes.function(&sql);

        let mut deep = Function::new(vec![]);
        deep.instruction(&Instruction::LocalGet(0));
        deep.instruction(&Instruction::I32Eqz);
        deep.instruction(&Instruction::If(BlockType::Result(ValType::I32)));
        deep.instruction(&Instruction::I32Const(0));
        deep.instruction(&Instruction::Else);
        deep.instruction(&Instruction::LocalGet(0));
        deep.instruction(&Instruction::I32Const(1));
        deep.instruction(&Instruction::I32Sub);
        deep.instruction(&Instruction::Call(2));
        deep.instruction(&Instruction::I32Const(1));
        deep.instruction(&Instruction::I32Add);
        deep.instruction(&Instruction::End);
        deep.instruction(&Instruction::End);
        codes.function(&deep);
        module.section(&codes);

        module.finish()
    }

    #[test]
    fn test_guest_bytes_through_host_import() {
        let module = GuestModule::load(&host_module()).unwrap();
        let runtime = WasmtimeRuntime::new().unwrap();
        let mut instance = runtime
            .instantiate(&module, &InstanceLimits::default())
            .unwrap();
        let mut env = instance.create_exec_env(64 * 1024).unwrap();

        let results = env.call("sql", &[]).unwrap();
        let handle = results[0].as_extern().unwrap();
        assert_eq!(env.extern_bytes(handle).unwrap(), b"SQL".to_vec());
    }

    #[test]
    fn test_stack_budget() {
        let module = GuestModule::load(&host_module()).unwrap();
        let runtime = WasmtimeRuntime::new().unwrap();

        let mut instance = runtime
            .instantiate(&module, &InstanceLimits::default())
            .unwrap();
        let mut env = instance.create_exec_env(64 * 1024).unwrap();
        let err = env.call("deep", &[GuestValue::I32(10_000)]).unwrap_err();
        match err {
            RuntimeError::Call { func, message } => {
                assert_eq!(func, "deep");
                assert!(message.contains("call stack exhausted"), "{message}");
            }
            other => panic!("expected a trap, got {other}"),
        }

        let roomy = InstanceLimits {
            stack_size: 1024 * 1024,
            exec_stack_size: 1024 * 1024,
            ..InstanceLimits::default()
        };
        let mut instance = runtime.instantiate(&module, &roomy).unwrap();
        let mut env = instance.create_exec_env(roomy.exec_stack_size).unwrap();
        let results = env.call("deep", &[GuestValue::I32(10_000)]).unwrap();
        assert_eq!(results, vec![GuestValue::I32(10_000)]);
    }

    #[test]
    fn test_zero_stack_budget() {
        let module = GuestModule::load(&struct_module()).unwrap();
        let runtime = WasmtimeRuntime::new().unwrap();
        let limits = InstanceLimits {
            stack_size: 0,
            ..InstanceLimits::default()
        };
        assert!(matches!(
            runtime.instantiate(&module, &limits),
            Err(RuntimeError::Engine(_))
        ));
    }
}
