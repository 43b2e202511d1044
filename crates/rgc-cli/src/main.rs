use anyhow::Result;
use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;

use rgc_lib::cli::{DecodeConfig, EncodeConfig};

#[derive(Parser)]
#[command(name = "rgc")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Reference-guided compression of short sequencing reads", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compress reads against a reference genome
    Encode(EncodeArgs),
    /// Reconstruct reads from the encoded streams
    Decode(DecodeArgs),
}

#[derive(Parser)]
struct EncodeArgs {
    /// K-mer size (1-16)
    #[arg(short, long, default_value_t = 16)]
    k: usize,

    /// Gzipped multi-FASTA reference genome
    #[arg(short = 'r', long, value_name = "FILE", required = true)]
    reference: PathBuf,

    /// Input reads (FASTQ, FASTA or one sequence per line; gzip auto-detected)
    #[arg(long, value_name = "FILE", required = true)]
    reads: PathBuf,

    /// Output basename; .enc/.bittree/.counts/.flipped/.ns are appended
    #[arg(short, long, value_name = "BASE", required = true)]
    out: PathBuf,

    /// Reverse-complement reads that match the reference better flipped
    #[arg(long, default_value_t = true, action = ArgAction::Set)]
    flip: bool,

    /// Collapse fully duplicate buckets
    #[arg(long, default_value_t = true, action = ArgAction::Set)]
    dups: bool,

    /// Adapt the model while coding
    #[arg(long, default_value_t = true, action = ArgAction::Set)]
    update: bool,

    /// Worker threads for the flipping phase (0 = auto-detect)
    #[arg(short = 'p', long, default_value_t = 10)]
    threads: usize,

    /// Weight multiplier for observed transitions
    #[arg(long = "mul", value_name = "WEIGHT", default_value_t = 10)]
    observation_weight: u64,

    /// Use the dense 4^k model (more memory, faster lookups)
    #[arg(long)]
    bigmem: bool,
}

#[derive(Parser)]
struct DecodeArgs {
    /// K-mer size; must match the encode run
    #[arg(short, long, default_value_t = 16)]
    k: usize,

    /// The reference the encoder used
    #[arg(short = 'r', long, value_name = "FILE", required = true)]
    reference: PathBuf,

    /// Basename of the encoded streams
    #[arg(long, value_name = "BASE", required = true)]
    reads: PathBuf,

    /// Output file for the decoded reads
    #[arg(short, long, value_name = "FILE", required = true)]
    out: PathBuf,

    /// Write FASTA records; plain sequence lines otherwise
    #[arg(long, default_value_t = true, action = ArgAction::Set)]
    fasta: bool,

    /// Must match the encode run
    #[arg(long, default_value_t = true, action = ArgAction::Set)]
    update: bool,

    /// Must match the encode run
    #[arg(long = "mul", value_name = "WEIGHT", default_value_t = 10)]
    observation_weight: u64,

    /// Use the dense 4^k model
    #[arg(long)]
    bigmem: bool,
}

impl EncodeArgs {
    fn into_config(self) -> EncodeConfig {
        EncodeConfig {
            k: self.k,
            reference: self.reference,
            reads: self.reads,
            out: self.out,
            flip: self.flip,
            dups: self.dups,
            update: self.update,
            threads: self.threads,
            observation_weight: self.observation_weight,
            bigmem: self.bigmem,
        }
    }
}

impl DecodeArgs {
    fn into_config(self) -> DecodeConfig {
        DecodeConfig {
            k: self.k,
            reference: self.reference,
            reads: self.reads,
            out: self.out,
            fasta: self.fasta,
            update: self.update,
            observation_weight: self.observation_weight,
            bigmem: self.bigmem,
        }
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Encode(args) => {
            info!("Starting encode...");
            rgc_lib::compression::encode(&args.into_config())?;
            info!("Encode complete");
        }
        Commands::Decode(args) => {
            info!("Starting decode...");
            rgc_lib::compression::decode(&args.into_config())?;
            info!("Decode complete");
        }
    }

    Ok(())
}
