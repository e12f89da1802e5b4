//! Shared fixtures: a guest module builder and an in-memory runtime

#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use rustica_module::GuestModule;
use rustica_runtime::{
    active, ContextGuard, ContextId, ExecEnv, GuestInstance, GuestRuntime, GuestValue,
    InstanceLimits, ObjRef, RuntimeError,
};
use rustica_sql::{Catalog, CatalogAnalyzer};
use rustica_types::Oid;
use wasm_encoder::{
    CodeSection, EntityType, ExportKind, ExportSection, FieldType, Function, FunctionSection,
    HeapType, ImportSection, Instruction, Module, RefType, StorageType, TypeSection, ValType,
};

/// `FixedArray[Int]`
pub const FIXED_ARRAY_INT: u32 = 0;
/// `Array[Int]`
pub const ARRAY_INT: u32 = 1;
/// Result box of a query without results
pub const UNIT_BOX: u32 = 2;

pub fn externref() -> ValType {
    ValType::Ref(RefType::EXTERNREF)
}

pub fn field_ref(index: u32, nullable: bool) -> ValType {
    ValType::Ref(RefType {
        nullable,
        heap_type: HeapType::Concrete(index),
    })
}

// ===== Module builder =====

/// Emits guest modules the way the guest toolchain lays them out: the
/// integer array types first, then whatever the test declares
pub struct GuestBuilder {
    types: TypeSection,
    count: u32,
    imports: Vec<(&'static str, &'static str, u32)>,
    funcs: Vec<(String, u32, Vec<Instruction<'static>>)>,
}

impl GuestBuilder {
    pub fn new() -> Self {
        let mut builder = Self {
            types: TypeSection::new(),
            count: 0,
            imports: Vec::new(),
            funcs: Vec::new(),
        };
        builder.types.ty().array(&StorageType::Val(ValType::I32), true);
        builder.count += 1;
        builder.struct_type(&[field_ref(FIXED_ARRAY_INT, false), ValType::I32]);
        builder.struct_type(&[ValType::I32]);
        builder
    }

    pub fn struct_type(&mut self, fields: &[ValType]) -> u32 {
        self.types.ty().struct_(fields.iter().map(|ty| FieldType {
            element_type: StorageType::Val(*ty),
            mutable: true,
        }));
        self.count += 1;
        self.count - 1
    }

    /// Mutable array of packed elements, e.g. bytes
    pub fn array_type(&mut self, elem: StorageType) -> u32 {
        self.types.ty().array(&elem, true);
        self.count += 1;
        self.count - 1
    }

    pub fn func_type(&mut self, params: &[ValType], results: &[ValType]) -> u32 {
        self.types
            .ty()
            .function(params.iter().copied(), results.iter().copied());
        self.count += 1;
        self.count - 1
    }

    /// Declare a query type. `args` is `i32` for unit or a nullable struct
    /// reference; `result` is the content of the result box.
    pub fn query_type(&mut self, index: ValType, args: ValType, result: ValType) -> u32 {
        let result_box = if result == ValType::I32 {
            UNIT_BOX
        } else {
            self.struct_type(&[result])
        };
        self.struct_type(&[
            index,
            externref(),
            field_ref(ARRAY_INT, false),
            args,
            field_ref(result_box, false),
        ])
    }

    /// Declare the queries struct and a trapping `get_queries` returning it
    pub fn get_queries(&mut self, queries: &[u32]) -> u32 {
        self.get_queries_with(queries, |_| vec![Instruction::Unreachable])
    }

    /// Same as [`GuestBuilder::get_queries`] with a body built from the
    /// index of the queries struct
    pub fn get_queries_with(
        &mut self,
        queries: &[u32],
        body: impl FnOnce(u32) -> Vec<Instruction<'static>>,
    ) -> u32 {
        let fields: Vec<ValType> = queries.iter().map(|q| field_ref(*q, false)).collect();
        let queries_type = self.struct_type(&fields);
        let func = self.func_type(&[ValType::I32], &[field_ref(queries_type, false)]);
        self.export_func("get_queries", func, body(queries_type));
        queries_type
    }

    /// Import a function. Imports must be declared before any function is
    /// exported, as they come first in the function index space.
    pub fn import_func(&mut self, module: &'static str, name: &'static str, ty: u32) -> u32 {
        assert!(self.funcs.is_empty(), "imports must precede functions");
        self.imports.push((module, name, ty));
        self.imports.len() as u32 - 1
    }

    /// Function index the next exported function will get
    pub fn next_func(&self) -> u32 {
        (self.imports.len() + self.funcs.len()) as u32
    }

    pub fn export_func(&mut self, name: &str, ty: u32, body: Vec<Instruction<'static>>) -> u32 {
        let index = self.next_func();
        self.funcs.push((name.to_string(), ty, body));
        index
    }

    pub fn finish(self) -> Vec<u8> {
        let mut module = Module::new();
        module.section(&self.types);

        if !self.imports.is_empty() {
            let mut imports = ImportSection::new();
            for (module_name, name, ty) in &self.imports {
                imports.import(module_name, name, EntityType::Function(*ty));
            }
            module.section(&imports);
        }

        let mut functions = FunctionSection::new();
        let mut exports = ExportSection::new();
        let mut codes = CodeSection::new();
        for (index, (name, ty, body)) in self.funcs.iter().enumerate() {
            functions.function(*ty);
            exports.export(name, ExportKind::Func, (self.imports.len() + index) as u32);
            let mut func = Function::new(vec![]);
            for instruction in body {
                func.instruction(instruction);
            }
            func.instruction(&Instruction::End);
            codes.function(&func);
        }
        module.section(&functions);
        module.section(&exports);
        module.section(&codes);

        module.finish()
    }
}

// ===== Analyzer =====

pub fn users_catalog() -> CatalogAnalyzer {
    let catalog = Catalog::default().table(
        "users",
        &[
            ("id", "int8"),
            ("name", "text"),
            ("age", "int4"),
            ("score", "float8"),
            ("created_at", "timestamptz"),
        ],
    );
    CatalogAnalyzer::new(&catalog).unwrap()
}

// ===== Fake runtime =====

pub enum Obj {
    Struct(Vec<GuestValue>),
    Array(Vec<GuestValue>),
    Extern(Vec<u8>),
}

/// Objects of one fake instance
#[derive(Default)]
pub struct Heap {
    objects: Vec<Obj>,
}

impl Heap {
    pub fn alloc(&mut self, obj: Obj) -> ObjRef {
        self.objects.push(obj);
        ObjRef(self.objects.len() as u32 - 1)
    }

    pub fn sql(&mut self, text: &str) -> GuestValue {
        GuestValue::Extern(self.alloc(Obj::Extern(text.as_bytes().to_vec())))
    }

    /// `Array[Int]` holding the given type ids, with one spare slot
    pub fn oids(&mut self, oids: &[Oid]) -> GuestValue {
        let mut buffer: Vec<GuestValue> = oids.iter().map(|o| GuestValue::I32(o.0 as i32)).collect();
        buffer.push(GuestValue::I32(0));
        let buffer = GuestValue::Array(self.alloc(Obj::Array(buffer)));
        GuestValue::Struct(self.alloc(Obj::Struct(vec![
            buffer,
            GuestValue::I32(oids.len() as i32),
        ])))
    }

    /// A query object whose index still holds the guest's placeholder
    pub fn query(&mut self, sql: &str, oids: &[Oid]) -> GuestValue {
        let sql = self.sql(sql);
        let oids = self.oids(oids);
        GuestValue::Struct(self.alloc(Obj::Struct(vec![
            GuestValue::I32(-1),
            sql,
            oids,
            GuestValue::Null,
            GuestValue::Null,
        ])))
    }

    /// Same as [`Heap::query`] for queries declaring an i64 index
    pub fn query64(&mut self, sql: &str, oids: &[Oid]) -> GuestValue {
        let query = self.query(sql, oids);
        if let GuestValue::Struct(obj) = query {
            if let Some(Obj::Struct(fields)) = self.objects.get_mut(obj.0 as usize) {
                fields[0] = GuestValue::I64(-1);
            }
        }
        query
    }

    /// The queries struct returned by `get_queries`
    pub fn queries(&mut self, queries: Vec<GuestValue>) -> Vec<GuestValue> {
        vec![GuestValue::Struct(self.alloc(Obj::Struct(queries)))]
    }

    fn get(&mut self, obj: ObjRef) -> Result<&mut Obj, RuntimeError> {
        self.objects
            .get_mut(obj.0 as usize)
            .ok_or(RuntimeError::InvalidHandle(obj))
    }
}

/// Resource accounting shared between a runtime and its test
#[derive(Default)]
pub struct Counters {
    pub instances: Cell<i32>,
    pub envs: Cell<i32>,
    pub instantiated: Cell<u32>,
    pub calls: Cell<u32>,
    /// Arguments of every guest call
    pub call_args: RefCell<Vec<Vec<GuestValue>>>,
    /// Context active inside each guest call
    pub call_contexts: RefCell<Vec<Option<ContextId>>>,
    /// `(object, field, value)` of every struct write
    pub writes: RefCell<Vec<(ObjRef, u32, GuestValue)>>,
}

impl Counters {
    pub fn assert_released(&self) {
        assert_eq!(self.instances.get(), 0, "instance leaked");
        assert_eq!(self.envs.get(), 0, "exec env leaked");
    }
}

type Populate = Box<dyn Fn(&mut Heap) -> Vec<GuestValue>>;

/// Runtime whose `get_queries` builds objects in a host-side heap
pub struct FakeRuntime {
    populate: Populate,
    pub counters: Rc<Counters>,
}

impl FakeRuntime {
    pub fn new(populate: impl Fn(&mut Heap) -> Vec<GuestValue> + 'static) -> Self {
        Self {
            populate: Box::new(populate),
            counters: Rc::new(Counters::default()),
        }
    }
}

struct FakeInstance<'a> {
    runtime: &'a FakeRuntime,
    heap: Heap,
}

impl Drop for FakeInstance<'_> {
    fn drop(&mut self) {
        let counters = &self.runtime.counters;
        counters.instances.set(counters.instances.get() - 1);
    }
}

impl GuestRuntime for FakeRuntime {
    fn instantiate<'a>(
        &'a self,
        _module: &'a GuestModule,
        _limits: &InstanceLimits,
    ) -> Result<Box<dyn GuestInstance + 'a>, RuntimeError> {
        self.counters.instances.set(self.counters.instances.get() + 1);
        self.counters.instantiated.set(self.counters.instantiated.get() + 1);
        Ok(Box::new(FakeInstance {
            runtime: self,
            heap: Heap::default(),
        }))
    }
}

impl GuestInstance for FakeInstance<'_> {
    fn create_exec_env(&mut self, stack_size: u32) -> Result<Box<dyn ExecEnv + '_>, RuntimeError> {
        if stack_size == 0 {
            return Err(RuntimeError::ExecEnv("empty stack".to_string()));
        }
        let counters = &self.runtime.counters;
        counters.envs.set(counters.envs.get() + 1);
        Ok(Box::new(FakeEnv {
            id: ContextId::next(),
            instance: self,
        }))
    }
}

struct FakeEnv<'i, 'a> {
    id: ContextId,
    instance: &'i mut FakeInstance<'a>,
}

impl Drop for FakeEnv<'_, '_> {
    fn drop(&mut self) {
        let counters = &self.instance.runtime.counters;
        counters.envs.set(counters.envs.get() - 1);
    }
}

impl FakeEnv<'_, '_> {
    fn fields(&mut self, obj: ObjRef) -> Result<&mut Vec<GuestValue>, RuntimeError> {
        match self.instance.heap.get(obj)? {
            Obj::Struct(fields) => Ok(fields),
            _ => Err(RuntimeError::InvalidHandle(obj)),
        }
    }

    fn elems(&mut self, obj: ObjRef) -> Result<&mut Vec<GuestValue>, RuntimeError> {
        match self.instance.heap.get(obj)? {
            Obj::Array(elems) => Ok(elems),
            _ => Err(RuntimeError::InvalidHandle(obj)),
        }
    }
}

fn out_of_bounds(index: u32, len: usize) -> RuntimeError {
    RuntimeError::OutOfBounds {
        index,
        len: len as u32,
    }
}

impl ExecEnv for FakeEnv<'_, '_> {
    fn call(&mut self, func: &str, args: &[GuestValue]) -> Result<Vec<GuestValue>, RuntimeError> {
        if func != "get_queries" {
            return Err(RuntimeError::FunctionNotFound(func.to_string()));
        }
        let _context = ContextGuard::enter(self.id);
        let runtime = self.instance.runtime;
        runtime.counters.calls.set(runtime.counters.calls.get() + 1);
        runtime.counters.call_args.borrow_mut().push(args.to_vec());
        runtime.counters.call_contexts.borrow_mut().push(active());
        Ok((runtime.populate)(&mut self.instance.heap))
    }

    fn struct_field_count(&mut self, obj: ObjRef) -> Result<u32, RuntimeError> {
        Ok(self.fields(obj)?.len() as u32)
    }

    fn struct_get(&mut self, obj: ObjRef, index: u32) -> Result<GuestValue, RuntimeError> {
        let fields = self.fields(obj)?;
        let len = fields.len();
        fields
            .get(index as usize)
            .copied()
            .ok_or_else(|| out_of_bounds(index, len))
    }

    fn struct_set(&mut self, obj: ObjRef, index: u32, value: GuestValue) -> Result<(), RuntimeError> {
        let fields = self.fields(obj)?;
        let len = fields.len();
        let slot = fields
            .get_mut(index as usize)
            .ok_or_else(|| out_of_bounds(index, len))?;
        *slot = value;
        self.instance
            .runtime
            .counters
            .writes
            .borrow_mut()
            .push((obj, index, value));
        Ok(())
    }

    fn array_len(&mut self, obj: ObjRef) -> Result<u32, RuntimeError> {
        Ok(self.elems(obj)?.len() as u32)
    }

    fn array_get(&mut self, obj: ObjRef, index: u32) -> Result<GuestValue, RuntimeError> {
        let elems = self.elems(obj)?;
        let len = elems.len();
        elems
            .get(index as usize)
            .copied()
            .ok_or_else(|| out_of_bounds(index, len))
    }

    fn extern_bytes(&mut self, obj: ObjRef) -> Result<Vec<u8>, RuntimeError> {
        match self.instance.heap.get(obj)? {
            Obj::Extern(bytes) => Ok(bytes.clone()),
            _ => Err(RuntimeError::InvalidHandle(obj)),
        }
    }
}
