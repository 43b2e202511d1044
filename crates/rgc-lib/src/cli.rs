//! Run configuration shared by the library API and the CLI front-end.
//!
//! A stream encoded with one set of (k, observation weight, flip, dups,
//! update) can only be decoded with the identical set; none of these are
//! embedded in the output, so they travel with the user.

use std::path::PathBuf;

use crate::model::DEFAULT_OBSERVATION_WEIGHT;

#[derive(Clone, Debug)]
pub struct EncodeConfig {
    /// K-mer size, 1..=16.
    pub k: usize,
    /// Gzipped multi-FASTA reference.
    pub reference: PathBuf,
    /// Reads file (FASTQ, FASTA or one sequence per line; gzip auto-detected).
    pub reads: PathBuf,
    /// Output basename; `.enc`, `.bittree`, `.counts`, `.flipped` and `.ns`
    /// are appended.
    pub out: PathBuf,
    /// Reverse-complement reads that match the reference better flipped.
    pub flip: bool,
    /// Collapse fully uniform buckets by negating their count.
    pub dups: bool,
    /// Adapt the model as symbols are coded.
    pub update: bool,
    /// Worker threads for the flipping phase (0 = auto-detect).
    pub threads: usize,
    /// Multiplier applied to observed transition counts.
    pub observation_weight: u64,
    /// Use the dense 4^k model backend instead of the sparse one.
    pub bigmem: bool,
}

impl Default for EncodeConfig {
    fn default() -> Self {
        Self {
            k: 16,
            reference: PathBuf::new(),
            reads: PathBuf::new(),
            out: PathBuf::new(),
            flip: true,
            dups: true,
            update: true,
            threads: 10,
            observation_weight: DEFAULT_OBSERVATION_WEIGHT,
            bigmem: false,
        }
    }
}

#[derive(Clone, Debug)]
pub struct DecodeConfig {
    /// K-mer size; must match the encode run.
    pub k: usize,
    /// The same reference the encoder used.
    pub reference: PathBuf,
    /// Basename of the encoded streams.
    pub reads: PathBuf,
    /// Output file for the decoded reads.
    pub out: PathBuf,
    /// Write FASTA records (`>R{n}`); plain lines otherwise.
    pub fasta: bool,
    /// Must match the encode run.
    pub update: bool,
    /// Must match the encode run.
    pub observation_weight: u64,
    /// Use the dense model backend.
    pub bigmem: bool,
}

impl Default for DecodeConfig {
    fn default() -> Self {
        Self {
            k: 16,
            reference: PathBuf::new(),
            reads: PathBuf::new(),
            out: PathBuf::new(),
            fasta: true,
            update: true,
            observation_weight: DEFAULT_OBSERVATION_WEIGHT,
            bigmem: false,
        }
    }
}

pub fn num_cpus() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(8)
}
