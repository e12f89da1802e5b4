//! Native code generation
//!
//! Module bytes go through a wasmtime engine configured from
//! [`CompileOptions`] and come out as a precompiled artifact.

use rustica_module::GuestModule;
use tracing::{debug, warn};
use wasmtime::{Config, Engine, OptLevel};

use crate::{CompileError, CompileOptions};

/// Ahead-of-time compiler for guest modules
pub struct AotCompiler {
    options: CompileOptions,
}

impl AotCompiler {
    pub fn new(options: &CompileOptions) -> Self {
        Self {
            options: options.clone(),
        }
    }

    fn opt_level(&self) -> OptLevel {
        match (self.options.opt_level, self.options.size_level) {
            (0, _) => OptLevel::None,
            (_, 0) => OptLevel::Speed,
            _ => OptLevel::SpeedAndSize,
        }
    }

    /// Code generation context for one compile
    fn config(&self, debug_info: bool) -> Result<Config, CompileError> {
        let options = &self.options;
        let mut config = Config::new();
        config
            .cranelift_opt_level(self.opt_level())
            .wasm_simd(options.enable_simd)
            .wasm_bulk_memory(options.enable_bulk_memory)
            .wasm_reference_types(true)
            .wasm_function_references(true)
            .wasm_gc(options.enable_gc)
            .debug_info(debug_info);
        if !options.enable_simd {
            config.wasm_relaxed_simd(false);
        }

        if let Some(target) = &options.target {
            config
                .target(target)
                .map_err(|e| CompileError::Codegen(format!("{:#}", e)))?;
        }

        // Linear memory accesses are always checked by the engine
        if !options.bounds_checks {
            warn!("bounds checks cannot be disabled, ignoring");
        }
        if options.stack_bounds_checks {
            config.max_wasm_stack(options.max_wasm_stack);
        } else {
            warn!("stack bounds checks cannot be disabled, ignoring");
        }
        Ok(config)
    }

    /// Produce the native artifact for `module`
    pub fn compile(&self, module: &GuestModule) -> Result<Vec<u8>, CompileError> {
        // The extractor and its scratch file stay alive until codegen is done
        #[cfg(feature = "debug-aot")]
        let dwarf = if self.options.debug_info {
            let dwarf = DwarfExtractor::create(module.bytes())?;
            debug!(sections = dwarf.sections().len(), "collected debug sections");
            Some(dwarf)
        } else {
            None
        };
        #[cfg(feature = "debug-aot")]
        let debug_info = dwarf.is_some();
        #[cfg(not(feature = "debug-aot"))]
        let debug_info = {
            if self.options.debug_info {
                warn!("built without debug-aot, debug info is not emitted");
            }
            false
        };

        let config = self.config(debug_info)?;
        let engine = Engine::new(&config).map_err(|e| CompileError::Codegen(format!("{:#}", e)))?;
        let artifact = engine
            .precompile_module(module.bytes())
            .map_err(|e| CompileError::Codegen(format!("{:#}", e)))?;

        debug!(
            input = module.bytes().len(),
            output = artifact.len(),
            target = self.options.target.as_deref().unwrap_or("host"),
            "compiled native artifact"
        );
        Ok(artifact)
    }
}

/// DWARF sections of a module, read back from a scratch copy on disk
#[cfg(feature = "debug-aot")]
pub struct DwarfExtractor {
    // Held so the scratch file lives as long as the extractor
    _file: tempfile::NamedTempFile,
    sections: Vec<(String, Vec<u8>)>,
}

#[cfg(feature = "debug-aot")]
impl DwarfExtractor {
    pub fn create(bytes: &[u8]) -> Result<Self, CompileError> {
        use std::io::Write;
        use wasmparser::{Parser, Payload};

        let io_err = |e: std::io::Error| CompileError::DebugInfo(e.to_string());

        let mut file = tempfile::NamedTempFile::new().map_err(io_err)?;
        file.write_all(bytes).map_err(io_err)?;
        file.flush().map_err(io_err)?;

        let data = std::fs::read(file.path()).map_err(io_err)?;
        let mut sections = Vec::new();
        for payload in Parser::new(0).parse_all(&data) {
            let payload = payload.map_err(|e| CompileError::DebugInfo(e.to_string()))?;
            if let Payload::CustomSection(reader) = payload {
                if reader.name().starts_with(".debug_") {
                    sections.push((reader.name().to_string(), reader.data().to_vec()));
                }
            }
        }

        Ok(Self {
            _file: file,
            sections,
        })
    }

    /// `(name, contents)` of every `.debug_*` section, in module order
    pub fn sections(&self) -> &[(String, Vec<u8>)] {
        &self.sections
    }
}
