//! Nano Compiler CLI
//!
//! Command-line interface for compiling `.no` programs to `.nbc` images,
//! running them, and dumping disassembly listings.

use clap::{CommandFactory, Parser as ClapParser, Subcommand};
use clap_complete::{generate, Shell};
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::process;
use tracing_subscriber::EnvFilter;

use nano_core::{Program, SourceManager};
use nano_runtime::{builtins, Vm};
use nanoc::{CompileError, Compiler, CompilerConfig, Disassembler};

/// Default cycle budget for `nanoc run`.
const RUN_CYCLE_BUDGET: u64 = 1 << 28;

#[derive(ClapParser)]
#[command(name = "nanoc")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Nano compiler - compile and run .no programs", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a .no file to a .nbc program image
    Build {
        /// Input .no source file
        input: PathBuf,

        /// Output image path (defaults to input with a .nbc extension)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Compiler options file (TOML)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Disable the AST optimizer
        #[arg(long)]
        no_optimize: bool,

        /// Report errors as JSON diagnostics
        #[arg(long)]
        json: bool,
    },

    /// Compile (or load) a program and run its main function
    Run {
        /// Input .no source or .nbc image
        input: PathBuf,

        /// Disable the AST optimizer
        #[arg(long)]
        no_optimize: bool,

        /// Report errors as JSON diagnostics
        #[arg(long)]
        json: bool,
    },

    /// Print a disassembly listing
    Disasm {
        /// Input .no source or .nbc image
        input: PathBuf,
    },

    /// Generate shell completion scripts
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Build {
            input,
            output,
            config,
            no_optimize,
            json,
        } => {
            let output = output.unwrap_or_else(|| input.with_extension("nbc"));
            run_build(&input, &output, config.as_deref(), no_optimize, json);
        }
        Commands::Run {
            input,
            no_optimize,
            json,
        } => run_run(&input, no_optimize, json),
        Commands::Disasm { input } => run_disasm(&input),
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            generate(shell, &mut cmd, "nanoc", &mut io::stdout());
        }
    }
}

/// Compile one source file (plus its imports) with the standard syscalls.
fn compile(
    input: &Path,
    config: Option<&Path>,
    no_optimize: bool,
    json: bool,
) -> (Program, SourceManager) {
    let mut config = match config {
        Some(path) => match CompilerConfig::from_toml_file(path) {
            Ok(config) => {
                // the standard builtins are always available
                let mut merged = CompilerConfig::standard();
                merged.optimize = config.optimize;
                merged.syscalls.extend(config.syscalls);
                merged
            }
            Err(e) => {
                eprintln!("error: {}", e);
                process::exit(1);
            }
        },
        None => CompilerConfig::standard(),
    };
    if no_optimize {
        config.optimize = false;
    }

    let mut sources = SourceManager::new();
    let Some(path) = input.to_str() else {
        eprintln!("error: invalid input path");
        process::exit(1);
    };
    if !sources.load(path) {
        eprintln!("error: unable to load '{}'", path);
        process::exit(1);
    }

    let mut compiler = Compiler::with_config(&config);
    match compiler.build(&mut sources) {
        Ok(program) => (program, sources),
        Err(e) => {
            report_error(&e, &sources, json);
            process::exit(1);
        }
    }
}

fn report_error(e: &CompileError, sources: &SourceManager, json: bool) {
    let file = usize::try_from(e.line.file)
        .ok()
        .and_then(|i| sources.get(i))
        .map(|s| s.path().to_string())
        .unwrap_or_default();
    if json {
        let diagnostic = serde_json::json!({
            "file": file,
            "line": e.line.line,
            "message": e.message,
        });
        println!("{}", diagnostic);
    } else {
        eprintln!("error: {}:{}: {}", file, e.line.line, e.message);
        if let Some(text) = sources.get_line(e.line) {
            eprintln!("  {}", text.trim_end());
        }
    }
}

fn run_build(input: &Path, output: &Path, config: Option<&Path>, no_optimize: bool, json: bool) {
    let (program, _sources) = compile(input, config, no_optimize, json);

    let file = match File::create(output) {
        Ok(file) => file,
        Err(e) => {
            eprintln!("error: unable to create '{}': {}", output.display(), e);
            process::exit(1);
        }
    };
    if let Err(e) = program.save(io::BufWriter::new(file)) {
        eprintln!("error: unable to write '{}': {}", output.display(), e);
        process::exit(1);
    }
}

/// Load a program: a `.nbc` image directly, anything else compiles.
fn load_program(input: &Path, no_optimize: bool, json: bool) -> (Program, Option<SourceManager>) {
    if input.extension().is_some_and(|e| e == "nbc") {
        let file = match File::open(input) {
            Ok(file) => file,
            Err(e) => {
                eprintln!("error: unable to open '{}': {}", input.display(), e);
                process::exit(1);
            }
        };
        match Program::load(io::BufReader::new(file)) {
            Ok(program) => (program, None),
            Err(e) => {
                eprintln!("error: {}", e);
                process::exit(1);
            }
        }
    } else {
        let (program, sources) = compile(input, None, no_optimize, json);
        (program, Some(sources))
    }
}

fn run_run(input: &Path, no_optimize: bool, json: bool) {
    let (program, _sources) = load_program(input, no_optimize, json);

    if program.function_find("main").is_none() {
        eprintln!("error: program has no 'main' function");
        process::exit(1);
    }

    let mut vm = Vm::new(&program);
    builtins::resolve(&mut vm);
    let unresolved = vm.unresolved_syscalls();
    if !unresolved.is_empty() {
        eprintln!("error: unresolved syscalls: {}", unresolved.join(", "));
        process::exit(1);
    }

    if let Err(e) = vm.call_init() {
        eprintln!("error: global initialization failed: {}", e);
        process::exit(1);
    }
    match vm.call_once("main", &[], RUN_CYCLE_BUDGET) {
        Ok(result) => {
            println!("{}", nano_runtime::value::to_string(vm.gc(), result));
        }
        Err(e) => {
            eprintln!("error: runtime error: {}", e);
            process::exit(1);
        }
    }
}

fn run_disasm(input: &Path) {
    let (program, sources) = load_program(input, false, false);
    let listing = match &sources {
        Some(sources) => Disassembler::with_sources(&program, sources).disasm(),
        None => Disassembler::new(&program).disasm(),
    };
    print!("{}", listing);
}
