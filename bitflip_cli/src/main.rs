use bitflip_core::config::{BitflipConfig, LogLevel};
use bitflip_core::flip::{ReadWriteSeek, flip_bit_at_offset};
use bitflip_core::offset::OffsetSpec;
use bitflip_core::rng::session_rng;
use bitflip_core::spray::{FileInfo, SprayRegistry};

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use rand_chacha::ChaCha8Rng;
use std::fs::{File, OpenOptions};
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

#[derive(Parser, Debug)]
#[command(name = "bitflip", author, version, about = "Flip bits in files.", long_about = None)]
struct Cli {
    /// TOML config file. Defaults to ./bitflip.toml when present.
    #[arg(short, long, global = true)]
    config_file: Option<PathBuf>,

    /// Seed for the random and spray modes, for reproducible corruption.
    #[arg(long, global = true)]
    seed: Option<u64>,

    /// One of error, warn, info, debug, trace.
    #[arg(long, global = true)]
    log_level: Option<LogLevel>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Flip a bit in a file at an offset
    Offset {
        /// Of the form <offset>@<bit>: <offset> is the byte in which the flip occurs,
        /// <bit> is 0 to 7, counted from the least-significant bit
        offset: OffsetSpec,
        /// File in which to flip the bit
        file: PathBuf,
    },

    /// Flip a random bit in a file
    Random {
        /// File in which to flip a random bit
        file: PathBuf,
    },

    /// Flip a bunch of bits at random in a file
    #[command(after_help = "Spray patterns:\n  \
        percent:<float>  flip a random, uniform percentage of the file's bits,\n                   \
        e.g. `bitflip spray percent:11.5 /var/lib/mysqld/db`")]
    Spray {
        /// Of the form <type>:<args>, where <args> depends on <type>
        pattern: String,
        /// File in which to spray bitflips
        file: PathBuf,
    },
}

/// Opens an existing file for in-place modification. Never creates or truncates.
fn open_target(path: &Path) -> Result<File, anyhow::Error> {
    OpenOptions::new()
        .read(true)
        .write(true)
        .open(path)
        .with_context(|| format!("opening {:?} for read-write", path))
}

fn file_info(path: &Path, file: &File) -> Result<FileInfo, anyhow::Error> {
    let metadata = file
        .metadata()
        .with_context(|| format!("reading metadata of {:?}", path))?;
    Ok(FileInfo::from_metadata(path, &metadata))
}

fn cmd_offset(offset: OffsetSpec, path: &Path) -> Result<(), anyhow::Error> {
    let mut file = open_target(path)?;
    info!(
        "flipping {}th bit of byte {} in file {:?}",
        offset.bit_offset(),
        offset.byte_offset(),
        path
    );
    flip_bit_at_offset(&mut file, offset.byte_offset(), offset.bit_offset())
        .context("flipping bit")?;
    Ok(())
}

fn cmd_random(path: &Path, mut rng: ChaCha8Rng) -> Result<(), anyhow::Error> {
    let mut file = open_target(path)?;
    let info = file_info(path, &file)?;
    let Some(offset) = OffsetSpec::random(&mut rng, info.size) else {
        bail!("cannot flip a random bit in {:?}: file is empty", path);
    };
    info!(
        "flipping {}th bit of byte {} in file {:?}",
        offset.bit_offset(),
        offset.byte_offset(),
        path
    );
    flip_bit_at_offset(&mut file, offset.byte_offset(), offset.bit_offset())
        .context("flipping bit")?;
    Ok(())
}

fn cmd_spray(pattern: &str, path: &Path, rng: ChaCha8Rng) -> Result<(), anyhow::Error> {
    let registry = SprayRegistry::default();
    let factory = registry.parse(pattern).with_context(|| {
        format!(
            "parsing spray pattern {:?} (known types: {})",
            pattern,
            registry.kinds().collect::<Vec<_>>().join(", ")
        )
    })?;

    let mut file = open_target(path)?;
    let info = file_info(path, &file)?;
    debug!("spraying {:?} with {:?} pattern", info, factory.kind());
    let mut sprayer = factory.build_with_rng(&info, rng);
    sprayer.spray(&mut file, &mut |stream: &mut dyn ReadWriteSeek, byte, bit| {
        flip_bit_at_offset(stream, byte, bit)
    })?;
    Ok(())
}

fn main() -> Result<(), anyhow::Error> {
    let cli = Cli::parse();

    let current_dir = std::env::current_dir().context("resolving working directory")?;
    let config = BitflipConfig::discover(cli.config_file.as_deref(), &current_dir)?;

    let log_level = cli.log_level.unwrap_or(config.logging.level);
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::from(log_level))
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .init();
    debug!("effective configuration: {config:?}");

    let seed = cli.seed.or(config.rng.seed);
    if let Some(seed) = seed {
        debug!("seeding session with {seed}");
    }

    match cli.command {
        Command::Offset { offset, file } => cmd_offset(offset, &file),
        Command::Random { file } => cmd_random(&file, session_rng(seed)),
        Command::Spray { pattern, file } => cmd_spray(&pattern, &file, session_rng(seed)),
    }
}
