use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use lunaria_vm::ir::ProcedureDef;
use lunaria_vm::{compile, disassemble, CompiledProc, Driver, Value, VmConfig};
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Lunaria - resumable procedure runtime
#[derive(Parser)]
#[command(name = "lunaria")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Compile and run Lunaria procedure graphs", long_about = "Lunaria Development Toolkit\n\nWorks on procedure graphs stored as JSON:\n  - Compilation checking\n  - Procedure inspection and bytecode disassembly\n  - Execution under the suspend/resume driver")]
#[command(author = "Lunaria Team")]
struct Cli {
    /// VM configuration file (TOML)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a procedure graph
    Run {
        /// Path to the procedure graph (JSON)
        file: PathBuf,
        /// Arguments passed to the procedure: integers, floats, true, false, nil or strings
        #[arg(value_name = "ARGS")]
        args: Vec<String>,
        /// Show disassembled bytecode before running
        #[arg(long)]
        debug_bytecode: bool,
    },
    /// Check that a procedure graph compiles
    Check {
        /// File to check
        file: PathBuf,
    },
    /// Show compiled procedure metadata as JSON
    Inspect {
        /// File to inspect
        file: PathBuf,
    },
    /// Disassemble compiled bytecode
    Disassemble {
        /// File to disassemble
        file: PathBuf,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => VmConfig::load(path)
            .with_context(|| format!("Failed to load configuration '{}'", path.display()))?,
        None => VmConfig::default(),
    };

    match cli.command {
        Commands::Run {
            file,
            args,
            debug_bytecode,
        } => run_command(&file, &args, debug_bytecode, config),
        Commands::Check { file } => check_command(&file),
        Commands::Inspect { file } => inspect_command(&file),
        Commands::Disassemble { file } => disassemble_command(&file),
    }
}

fn load_proc(path: &Path) -> Result<Rc<CompiledProc>> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Error reading file '{}'", path.display()))?;
    let def = ProcedureDef::from_json(&contents)
        .with_context(|| format!("Invalid procedure graph in '{}'", path.display()))?;
    compile(&def).with_context(|| format!("Compilation error in '{}'", path.display()))
}

fn check_command(path: &Path) -> Result<()> {
    let proc = load_proc(path)?;
    println!("✓ Compilation OK");
    if proc.is_resumable() {
        println!("  {} resumption points", proc.resume_points());
    } else {
        println!("  never suspends");
    }
    Ok(())
}

fn inspect_command(path: &Path) -> Result<()> {
    let proc = load_proc(path)?;
    let summary = summarize(&proc);
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

fn summarize(proc: &CompiledProc) -> serde_json::Value {
    serde_json::json!({
        "name": proc.name,
        "params": proc.param_count,
        "vararg": proc.is_vararg,
        "registers": proc.register_count,
        "instructions": proc.code.len(),
        "resume_points": proc.resume_points(),
        "upvalues": proc.upvalues.len(),
        "returns": proc.return_type.to_string(),
        "nested": proc.nested.iter().map(|p| summarize(p)).collect::<Vec<_>>(),
    })
}

fn disassemble_command(path: &Path) -> Result<()> {
    let proc = load_proc(path)?;
    println!("Disassembly of '{}':", path.display());
    println!();
    print!("{}", disassemble(&proc));
    Ok(())
}

fn run_command(path: &Path, args: &[String], debug_bytecode: bool, config: VmConfig) -> Result<()> {
    let proc = load_proc(path)?;
    if debug_bytecode {
        print!("{}", disassemble(&proc));
    }

    let mut driver = Driver::with_config(config);
    let main = driver.instantiate(proc)?;
    let args = args.iter().map(|a| parse_value(a)).collect();

    let mut suspensions = 0usize;
    let values = driver.run_to_completion(main, args, |signal| {
        suspensions += 1;
        info!(
            frames = signal.depth(),
            values = %format_values(signal.values()),
            "suspended; resuming"
        );
        Vec::new()
    })?;

    println!("{}", format_values(&values));
    if suspensions > 0 {
        info!(suspensions, "completed");
    }
    Ok(())
}

fn parse_value(text: &str) -> Value {
    match text {
        "nil" => Value::Nil,
        "true" => Value::Boolean(true),
        "false" => Value::Boolean(false),
        _ => {
            if let Ok(i) = text.parse::<i64>() {
                Value::Integer(i)
            } else if let Ok(f) = text.parse::<f64>() {
                Value::Float(f)
            } else {
                Value::from(text)
            }
        }
    }
}

fn format_values(values: &[Value]) -> String {
    values
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join("\t")
}
