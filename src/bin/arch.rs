//! `arch`: the ARCH command surface (§6.4).

use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use smof::ar::{self, MemberFlags};
use smof::arena::Arena;
use smof::compress;
use smof::driver::archive::ArchiveDriver;
use smof::error::{Error, Result};

#[derive(Parser)]
#[command(name = "arch", about = "Create, inspect, and modify STAR archives")]
struct Cli {
    /// Enable debug-level logging regardless of `RUST_LOG`.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Build a new archive from a set of members.
    Create {
        archive: PathBuf,
        members: Vec<PathBuf>,
        #[arg(long, default_value = "NONE")]
        compression: String,
        #[arg(long, default_value_t = 0)]
        compression_level: u8,
        #[arg(long)]
        create_index: bool,
        #[arg(long)]
        sort_members: bool,
        #[arg(long)]
        force_overwrite: bool,
    },
    /// Extract one member, or every member when none is named.
    Extract {
        archive: PathBuf,
        member: Option<String>,
        #[arg(long, default_value = ".")]
        output_dir: PathBuf,
    },
    /// List every member with its sizes and flags.
    List { archive: PathBuf },
    /// Replace or add members, rebuilding the archive.
    Update {
        archive: PathBuf,
        members: Vec<PathBuf>,
        #[arg(long, default_value = "NONE")]
        compression: String,
        #[arg(long, default_value_t = 0)]
        compression_level: u8,
        #[arg(long)]
        create_index: bool,
        #[arg(long)]
        sort_members: bool,
    },
    /// Remove named members, rebuilding the archive.
    Delete { archive: PathBuf, names: Vec<String> },
    /// Parse an archive and report any invariant violation (§3.2).
    Validate { archive: PathBuf },
}

fn compression_tag(name: &str) -> Result<u8> {
    match name {
        "NONE" => Ok(compress::TAG_NONE),
        "LZ4" => Ok(compress::TAG_LZ4),
        "ZLIB" => Ok(compress::TAG_ZLIB),
        "LZMA" => Ok(compress::TAG_LZMA),
        other => Err(Error::InvalidArgument(format!("unknown compression `{other}`"))),
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

fn member_name(path: &PathBuf) -> String {
    path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default()
}

fn run(cli: &Cli) -> Result<()> {
    let mut progress = |phase: &str, percent: u8| {
        tracing::info!(phase, percent, "archive progress");
    };
    let mut driver = ArchiveDriver::new();

    match &cli.command {
        Command::Create {
            archive,
            members,
            compression,
            compression_level,
            create_index,
            sort_members,
            force_overwrite,
        } => {
            if archive.exists() && !force_overwrite {
                return Err(Error::InvalidArgument(format!(
                    "{} already exists; pass --force-overwrite to replace it",
                    archive.display()
                )));
            }
            compress::validate_level(*compression_level)?;
            let data: Vec<Vec<u8>> = members.iter().map(fs::read).collect::<std::io::Result<_>>()?;
            let inputs: Vec<ar::MemberInput> = members
                .iter()
                .zip(&data)
                .map(|(path, bytes)| ar::MemberInput {
                    name: member_name(path),
                    data: bytes.as_slice(),
                    flags: MemberFlags::empty(),
                    mtime: 0,
                })
                .collect();
            let config = ar::CreateConfig::builder()
                .compression_tag(compression_tag(compression)?)
                .level(*compression_level)
                .indexed(*create_index)
                .sorted(*sort_members)
                .build();
            let out = driver.create(&inputs, &config, Some(&mut progress), None)?;
            fs::write(archive, out)?;
        }
        Command::Extract { archive, member, output_dir } => {
            let bytes = fs::read(archive)?;
            let extracted = driver.extract(&bytes, member.as_deref(), Some(&mut progress), None)?;
            fs::create_dir_all(output_dir)?;
            for (name, data) in extracted {
                fs::write(output_dir.join(&name), data)?;
            }
        }
        Command::List { archive } => {
            let bytes = fs::read(archive)?;
            for summary in driver.list(&bytes)? {
                println!(
                    "{}\t{}\t{}\t{:?}",
                    summary.name, summary.uncompressed_size, summary.compressed_size, summary.flags
                );
            }
        }
        Command::Update { archive, members, compression, compression_level, create_index, sort_members } => {
            compress::validate_level(*compression_level)?;
            let existing = fs::read(archive)?;
            let data: Vec<Vec<u8>> = members.iter().map(fs::read).collect::<std::io::Result<_>>()?;
            let replacements: Vec<(String, Vec<u8>)> = members
                .iter()
                .zip(data)
                .map(|(path, bytes)| (member_name(path), bytes))
                .collect();
            let config = ar::CreateConfig::builder()
                .compression_tag(compression_tag(compression)?)
                .level(*compression_level)
                .indexed(*create_index)
                .sorted(*sort_members)
                .build();
            let out = driver.update(&existing, &replacements, &config, Some(&mut progress), None)?;
            fs::write(archive, out)?;
        }
        Command::Delete { archive, names } => {
            let existing = fs::read(archive)?;
            let config = ar::CreateConfig::builder().build();
            let out = driver.delete(&existing, names, &config, Some(&mut progress), None)?;
            fs::write(archive, out)?;
        }
        Command::Validate { archive } => {
            let bytes = fs::read(archive)?;
            let mut arena = Arena::new();
            let parsed = ar::Archive::parse(&bytes, &mut arena)?;
            println!("{}: valid, {} member(s)", archive.display(), parsed.members.len());
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("arch: {err}");
            ExitCode::from(err.exit_code())
        }
    }
}
