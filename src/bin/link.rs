//! `link`: the LINK command surface (§6.3).

use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use smof::arena::Arena;
use smof::driver::link::{LinkConfig, LinkDriver, LinkInput};
use smof::error::{Error, Result};
use smof::layout::OutputKind;
use smof::obj::ObjectFile;
use smof::script;

#[derive(Parser)]
#[command(name = "link", about = "Resolve symbols, relocate, and emit an OBJ or flat binary")]
struct Cli {
    /// OBJ inputs to link.
    inputs: Vec<PathBuf>,

    /// Output file path.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// EXECUTABLE, SHARED_LIBRARY, OBJECT, or BINARY_FLAT (§6.3).
    #[arg(long, default_value = "EXECUTABLE")]
    output_type: String,

    /// Entry point address; 0 auto-resolves via `_start` (§4.6 step 4).
    #[arg(long, default_value_t = 0)]
    entry_point: u32,

    /// Base address for section layout (§4.6).
    #[arg(long, value_parser = parse_u64, default_value = "0")]
    base_address: u64,

    /// Page size, must be a power of two (§4.6).
    #[arg(long, value_parser = parse_u64, default_value = "4096")]
    page_size: u64,

    /// Fill gaps between sections in a BINARY_FLAT image (§4.6 step 3).
    #[arg(long)]
    fill_gaps: bool,

    /// Byte value used to fill gaps when `--fill-gaps` is set.
    #[arg(long, default_value_t = 0)]
    fill_value: u8,

    /// Directive file overriding section addresses, entry symbol, or
    /// base address (§6.3 `script_file`).
    #[arg(long)]
    script_file: Option<PathBuf>,

    /// Enable debug-level logging regardless of `RUST_LOG`.
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    action: Option<Action>,
}

#[derive(Subcommand)]
enum Action {
    /// Print section and symbol tables for one OBJ (read-only).
    Analyze { path: PathBuf },
    /// Print every structural table's raw layout for one OBJ.
    Dump { path: PathBuf },
    /// Validate one OBJ against the §3.1 invariants without linking.
    Validate { path: PathBuf },
}

fn parse_u64(s: &str) -> std::result::Result<u64, String> {
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u64::from_str_radix(hex, 16).map_err(|e| e.to_string())
    } else {
        s.parse::<u64>().map_err(|e| e.to_string())
    }
}

fn output_kind(name: &str) -> Result<OutputKind> {
    match name {
        "EXECUTABLE" => Ok(OutputKind::Executable),
        "SHARED_LIBRARY" => Ok(OutputKind::SharedLib),
        "OBJECT" | "STATIC_LIBRARY" => Ok(OutputKind::Relocatable),
        "BINARY_FLAT" => Ok(OutputKind::BinaryFlat),
        other => Err(Error::InvalidArgument(format!("unknown output_type `{other}`"))),
    }
}

fn init_logging(verbose: bool) {
    use tracing_subscriber::EnvFilter;
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn describe(path: &PathBuf) -> Result<String> {
    let bytes = fs::read(path)?;
    let mut arena = Arena::new();
    let object = ObjectFile::parse(&bytes, &mut arena)?;
    let strings = object.string_table(&arena);
    let mut out = format!(
        "{}: {} section(s), {} symbol(s), {} relocation(s), {} import(s), entry {:#x}\n",
        path.display(),
        object.sections.len(),
        object.symbols.len(),
        object.relocations.len(),
        object.imports.len(),
        object.header.entry_point,
    );
    for (i, section) in object.sections.iter().enumerate() {
        let name = strings.get(section.name_offset).ok().unwrap_or("<bad name>");
        out.push_str(&format!(
            "  [{i}] {name} size={} va={:#x} flags={:?}\n",
            section.size, section.virtual_address, section.flags
        ));
    }
    for symbol in &object.symbols {
        let name = strings.get(symbol.name_offset).ok().unwrap_or("<bad name>");
        out.push_str(&format!(
            "  symbol {name} value={:#x} binding={:?} type={:?}\n",
            symbol.value, symbol.binding, symbol.symbol_type
        ));
    }
    Ok(out)
}

fn run(cli: &Cli) -> Result<()> {
    if let Some(action) = &cli.action {
        match action {
            Action::Analyze { path } | Action::Dump { path } => {
                print!("{}", describe(path)?);
            }
            Action::Validate { path } => {
                describe(path)?;
                println!("{}: valid", path.display());
            }
        }
        return Ok(());
    }

    let output_path = cli
        .output
        .as_ref()
        .ok_or_else(|| Error::InvalidArgument("--output is required".to_string()))?;
    if cli.inputs.is_empty() {
        return Err(Error::InvalidArgument("at least one OBJ input is required".to_string()));
    }

    let script = cli
        .script_file
        .as_ref()
        .map(|path| -> Result<_> {
            let text = fs::read_to_string(path)?;
            script::parse(&text)
        })
        .transpose()?;

    let input_bytes: Vec<Vec<u8>> = cli
        .inputs
        .iter()
        .map(fs::read)
        .collect::<std::io::Result<_>>()?;
    let inputs: Vec<LinkInput> = cli
        .inputs
        .iter()
        .zip(&input_bytes)
        .map(|(path, bytes)| LinkInput {
            name: path.display().to_string(),
            bytes: bytes.as_slice(),
        })
        .collect();

    let config = LinkConfig::builder()
        .output_kind(output_kind(&cli.output_type)?)
        .base_address(cli.base_address)
        .page_size(cli.page_size)
        .entry_point(cli.entry_point)
        .fill_gaps(cli.fill_gaps)
        .fill_value(cli.fill_value)
        .script(script)
        .build();

    let mut driver = LinkDriver::new();
    let mut progress = |phase: &str, percent: u8| {
        tracing::info!(phase, percent, "link progress");
    };
    let out = driver.link(&inputs, &config, Some(&mut progress), None)?;
    fs::write(output_path, out)?;
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("link: {err}");
            ExitCode::from(err.exit_code())
        }
    }
}
