//! Rustica CLI - compile guest modules and inspect their types

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use ariadne::{Color, Label, Report, ReportKind, Source};
use clap::{Parser, Subcommand};
use thiserror::Error;
use tracing_subscriber::EnvFilter;

use rustica_compiler::{CompileError, CompileOptions, Compiler};
use rustica_module::{DefinedType, GuestModule, LoadError};
use rustica_runtime::{RuntimeError, WasmtimeRuntime};
use rustica_sql::{AnalyzerError, Catalog, CatalogAnalyzer};
use rustica_types::{CommonHeapTypes, FieldType, GuestRefType, TidOid};

#[derive(Parser)]
#[command(name = "rustica")]
#[command(about = "Rustica query compiler", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a guest module to a native artifact and print its query catalog
    Compile {
        /// Guest WebAssembly module
        module: PathBuf,
        /// Table catalog (JSON) used to type the SQL of every query
        #[arg(long)]
        catalog: Option<PathBuf>,
        /// Guest type id to host type mapping (JSON list of {tid, oid})
        #[arg(long)]
        tid_map: Option<PathBuf>,
        /// Artifact path; defaults to the module path with a .cwasm extension
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Target triple; defaults to the host
        #[arg(long)]
        target: Option<String>,
        /// Emit native debug info
        #[arg(long)]
        debug_info: bool,
        /// Compile options (JSON); flags override it
        #[arg(long)]
        config: Option<PathBuf>,
        /// Pretty print the output
        #[arg(short, long)]
        pretty: bool,
    },
    /// Show the GC types and exports of a guest module
    Inspect {
        /// Guest WebAssembly module
        module: PathBuf,
    },
}

#[derive(Debug, Error)]
enum CliError {
    #[error("cannot read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("cannot write {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid JSON in {}: {source}", .path.display())]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("cannot serialize the query catalog: {0}")]
    Output(serde_json::Error),

    #[error(transparent)]
    Catalog(#[from] AnalyzerError),

    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    Runtime(#[from] RuntimeError),

    #[error(transparent)]
    Compile(#[from] CompileError),
}

impl CliError {
    fn code(&self) -> Option<&'static str> {
        match self {
            CliError::Compile(e) => Some(e.code()),
            CliError::Runtime(e) => Some(e.code()),
            _ => None,
        }
    }
}

fn main() -> ExitCode {
    // Initialize tracing if RUSTICA_LOG is set
    if let Ok(filter) = EnvFilter::try_from_env("RUSTICA_LOG") {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .with_writer(std::io::stderr)
            .init();
        tracing::debug!("tracing initialized");
    }

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Compile {
            module,
            catalog,
            tid_map,
            output,
            target,
            debug_info,
            config,
            pretty,
        } => cmd_compile(CompileArgs {
            module,
            catalog,
            tid_map,
            output,
            target,
            debug_info,
            config,
            pretty,
        }),
        Commands::Inspect { module } => cmd_inspect(&module),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            report_error(&e);
            ExitCode::FAILURE
        }
    }
}

struct CompileArgs {
    module: PathBuf,
    catalog: Option<PathBuf>,
    tid_map: Option<PathBuf>,
    output: Option<PathBuf>,
    target: Option<String>,
    debug_info: bool,
    config: Option<PathBuf>,
    pretty: bool,
}

fn read_text(path: &Path) -> Result<String, CliError> {
    fs::read_to_string(path).map_err(|source| CliError::Read {
        path: path.to_path_buf(),
        source,
    })
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, CliError> {
    let text = read_text(path)?;
    serde_json::from_str(&text).map_err(|source| CliError::Json {
        path: path.to_path_buf(),
        source,
    })
}

fn cmd_compile(args: CompileArgs) -> Result<(), CliError> {
    let bytes = fs::read(&args.module).map_err(|source| CliError::Read {
        path: args.module.clone(),
        source,
    })?;

    let mut options: CompileOptions = match &args.config {
        Some(path) => read_json(path)?,
        None => CompileOptions::default(),
    };
    if args.target.is_some() {
        options.target = args.target;
    }
    if args.debug_info {
        options.debug_info = true;
    }

    let catalog = match &args.catalog {
        Some(path) => read_json(path)?,
        None => Catalog::default(),
    };
    let tid_map: Vec<TidOid> = match &args.tid_map {
        Some(path) => read_json(path)?,
        None => Vec::new(),
    };

    let compiler = Compiler::with_options(
        WasmtimeRuntime::new()?,
        CatalogAnalyzer::new(&catalog)?,
        options,
    );
    let output = compiler.compile(&bytes, &tid_map)?;

    let artifact_path = args
        .output
        .unwrap_or_else(|| args.module.with_extension("cwasm"));
    fs::write(&artifact_path, &output.artifact).map_err(|source| CliError::Write {
        path: artifact_path.clone(),
        source,
    })?;
    tracing::info!(path = %artifact_path.display(), "wrote artifact");

    let json = if args.pretty {
        serde_json::to_string_pretty(&output)
    } else {
        serde_json::to_string(&output)
    }
    .map_err(CliError::Output)?;
    println!("{}", json);
    Ok(())
}

fn cmd_inspect(path: &Path) -> Result<(), CliError> {
    let bytes = fs::read(path).map_err(|source| CliError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let module = GuestModule::load(&bytes)?;
    let names = CommonHeapTypes::default();

    println!("Module: {}", path.display());
    println!();

    println!("Types:");
    for (index, ty) in module.types().iter().enumerate() {
        match ty {
            DefinedType::Struct(s) => {
                println!("  ${} struct {{ {} }}", index, fields(&s.fields, &names));
            }
            DefinedType::Array(a) => {
                println!("  ${} array [{}]", index, field(&a.elem, &names));
            }
            DefinedType::Func(f) => {
                println!(
                    "  ${} func ({}) -> ({})",
                    index,
                    types(&f.params, &names),
                    types(&f.results, &names)
                );
            }
            DefinedType::Other => println!("  ${} (other)", index),
        }
    }

    println!();
    println!("Exports:");
    for (name, func) in module.exported_funcs() {
        println!(
            "  {} : ({}) -> ({})",
            name,
            types(&func.params, &names),
            types(&func.results, &names)
        );
    }

    if !module.custom_sections().is_empty() {
        println!();
        println!("Custom sections: {}", module.custom_sections().join(", "));
    }
    Ok(())
}

fn types(tys: &[GuestRefType], names: &CommonHeapTypes) -> String {
    tys.iter()
        .map(|t| t.repr(names))
        .collect::<Vec<_>>()
        .join(", ")
}

fn field(f: &FieldType, names: &CommonHeapTypes) -> String {
    if f.mutable {
        format!("mut {}", f.ty.repr(names))
    } else {
        f.ty.repr(names)
    }
}

fn fields(list: &[FieldType], names: &CommonHeapTypes) -> String {
    list.iter()
        .map(|f| field(f, names))
        .collect::<Vec<_>>()
        .join(", ")
}

fn report_error(error: &CliError) {
    if let CliError::Compile(CompileError::Analyzer {
        query,
        sql,
        error: analyzer,
    }) = error
    {
        if let Some(span) = analyzer.span() {
            report_sql_error(*query, sql, analyzer, span.start..span.end);
        }
    }

    match error.code() {
        Some(code) => eprintln!("error[{}]: {}", code, error),
        None => eprintln!("error: {}", error),
    }
}

fn report_sql_error(query: u32, sql: &str, error: &AnalyzerError, span: std::ops::Range<usize>) {
    let id = format!("query {}", query);
    let _ = Report::build(ReportKind::Error, id.clone(), span.start)
        .with_message(error.to_string())
        .with_label(
            Label::new((id.clone(), span))
                .with_message(error.to_string())
                .with_color(Color::Red),
        )
        .finish()
        .eprint((id, Source::from(sql)));
}
