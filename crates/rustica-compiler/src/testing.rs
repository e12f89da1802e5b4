//! Guest module builder for unit tests

use rustica_module::GuestModule;
use wasm_encoder::{
    CodeSection, ExportKind, ExportSection, FieldType, Function, FunctionSection, HeapType,
    Instruction, Module, RefType, StorageType, TypeSection, ValType,
};

/// `FixedArray[Int]`, always type 0
pub const FIXED_ARRAY_INT: u32 = 0;
/// `Array[Int]`, always type 1
pub const ARRAY_INT: u32 = 1;

pub fn externref() -> ValType {
    ValType::Ref(RefType::EXTERNREF)
}

pub fn field_ref(index: u32, nullable: bool) -> ValType {
    ValType::Ref(RefType {
        nullable,
        heap_type: HeapType::Concrete(index),
    })
}

/// Type section plus trapping function bodies
pub struct ModuleBuilder {
    types: TypeSection,
    count: u32,
    funcs: Vec<(String, u32)>,
}

impl ModuleBuilder {
    pub fn new() -> Self {
        let mut builder = Self {
            types: TypeSection::new(),
            count: 0,
            funcs: Vec::new(),
        };
        builder.types.ty().array(&StorageType::Val(ValType::I32), true);
        builder.count += 1;
        builder.struct_type(&[field_ref(FIXED_ARRAY_INT, false), ValType::I32]);
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

    pub fn func_type(&mut self, params: &[ValType], results: &[ValType]) -> u32 {
        self.types
            .ty()
            .function(params.iter().copied(), results.iter().copied());
        self.count += 1;
        self.count - 1
    }

    /// Export a function whose body traps
    pub fn export_func(&mut self, name: &str, ty: u32) {
        self.funcs.push((name.to_string(), ty));
    }

    pub fn finish(self) -> Vec<u8> {
        let mut module = Module::new();
        module.section(&self.types);

        let mut functions = FunctionSection::new();
        let mut exports = ExportSection::new();
        let mut codes = CodeSection::new();
        for (index, (name, ty)) in self.funcs.iter().enumerate() {
            functions.function(*ty);
            exports.export(name, ExportKind::Func, index as u32);
            let mut body = Function::new(vec![]);
            body.instruction(&Instruction::Unreachable);
            body.instruction(&Instruction::End);
            codes.function(&body);
        }
        module.section(&functions);
        module.section(&exports);
        module.section(&codes);

        module.finish()
    }

    pub fn load(self) -> GuestModule {
        GuestModule::load(&self.finish()).unwrap()
    }
}
