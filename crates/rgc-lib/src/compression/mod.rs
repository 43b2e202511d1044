//! Encode/decode pipeline and the sidecar stream formats.
//!
//! Encoding produces five gzip-compressed streams next to the output
//! basename: `.enc` (arithmetic-coded read tails), `.bittree` (trie of
//! bucket prefixes), `.counts` (ASCII bucket sizes, negatives marking
//! uniform buckets), `.flipped` (one bit per read) and `.ns` (one line of
//! N positions per read). Decoding consumes the same five.

pub mod arith;
pub mod bittree;
pub mod bucket;
mod decode;
mod encode;
pub mod flip;

pub use decode::decode;
pub use encode::encode;

use anyhow::{bail, Context, Result};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use crate::io::bits::{BitReader, BitWriter};
use crate::io::fastq::ReadRecord;
use crate::kmer::{self, Kmer};
use crate::model::{KmerModel, SEEN_THRESHOLD};

/// `base` + `suffix`, e.g. `out` -> `out.counts`.
fn suffixed(base: &Path, suffix: &str) -> PathBuf {
    let mut s = base.as_os_str().to_owned();
    s.push(suffix);
    PathBuf::from(s)
}

fn create_gz(path: &Path, level: Compression) -> Result<GzEncoder<BufWriter<std::fs::File>>> {
    let file = std::fs::File::create(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    Ok(GzEncoder::new(BufWriter::new(file), level))
}

fn open_gz(path: &Path) -> Result<BufReader<GzDecoder<BufReader<std::fs::File>>>> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;
    Ok(BufReader::new(GzDecoder::new(BufReader::new(file))))
}

/// Seeds a model from the reference: every transition observed there starts
/// at [`SEEN_THRESHOLD`]. Encoder and decoder both start from this state.
pub(crate) fn seed_model<M: KmerModel>(model: &mut M, refs: &[Vec<u8>], k: usize) {
    let mask = kmer::kmer_mask(k);
    for s in refs {
        if s.len() <= k {
            continue;
        }
        let mut ctx = kmer::pack(&s[..k]);
        for &b in &s[k..] {
            let next = kmer::base_code(b);
            model.set_count(ctx, next, SEEN_THRESHOLD as u8);
            ctx = kmer::shift(ctx, next, mask);
        }
    }
}

// ---------------------------------------------------------------------------
// .counts — ASCII "<readLength> <c1> <c2> ... ", gzipped
// ---------------------------------------------------------------------------

fn write_counts_file(path: &Path, read_len: usize, counts: &[i64]) -> Result<()> {
    let mut out = create_gz(path, Compression::best())?;
    write!(out, "{} ", read_len)?;
    for c in counts {
        write!(out, "{} ", c)?;
    }
    out.finish()?.flush()?;
    Ok(())
}

fn read_counts_file(path: &Path) -> Result<(Vec<i64>, usize)> {
    let mut text = String::new();
    open_gz(path)?
        .read_to_string(&mut text)
        .with_context(|| format!("Failed to read counts from {}", path.display()))?;
    let mut tokens = text.split_ascii_whitespace();
    let read_len: usize = tokens
        .next()
        .context("Counts file is empty")?
        .parse()
        .context("Bad read length in counts file")?;
    let counts = tokens
        .map(|t| t.parse::<i64>().context("Bad bucket count"))
        .collect::<Result<Vec<_>>>()?;
    Ok((counts, read_len))
}

// ---------------------------------------------------------------------------
// .flipped — one bit per read in bucket order, gzipped
// ---------------------------------------------------------------------------

fn write_flipped_file(path: &Path, reads: &[ReadRecord]) -> Result<()> {
    let mut bits = BitWriter::new(create_gz(path, Compression::best())?);
    for read in reads {
        bits.write_bit(read.flipped as u8)?;
    }
    bits.finish()?.finish()?.flush()?;
    Ok(())
}

/// Missing file means no read was flipped (or orientation is not tracked).
fn read_flipped_file(path: &Path, num_reads: usize) -> Result<Option<Vec<bool>>> {
    if !path.exists() {
        return Ok(None);
    }
    let mut bits = BitReader::new(open_gz(path)?);
    let mut flipped = Vec::with_capacity(num_reads);
    for _ in 0..num_reads {
        match bits.read_bit()? {
            Some(b) => flipped.push(b == 1),
            None => bail!("Unexpected EOF in {}", path.display()),
        }
    }
    Ok(Some(flipped))
}

// ---------------------------------------------------------------------------
// .ns — one line of space-separated N positions per read, gzipped
// ---------------------------------------------------------------------------

fn write_ns_file(path: &Path, reads: &[ReadRecord]) -> Result<()> {
    let mut out = create_gz(path, Compression::best())?;
    for read in reads {
        for (i, p) in read.n_positions.iter().enumerate() {
            if i > 0 {
                write!(out, " ")?;
            }
            write!(out, "{}", p)?;
        }
        writeln!(out)?;
    }
    out.finish()?.flush()?;
    Ok(())
}

/// Missing file means no read contains an N.
fn read_ns_file(path: &Path, num_reads: usize) -> Result<Option<Vec<Vec<u16>>>> {
    use std::io::BufRead;
    if !path.exists() {
        return Ok(None);
    }
    let reader = open_gz(path)?;
    let mut all = Vec::with_capacity(num_reads);
    for line in reader.lines() {
        let line = line?;
        let positions = line
            .split_ascii_whitespace()
            .map(|t| t.parse::<u16>().context("Bad N position"))
            .collect::<Result<Vec<_>>>()?;
        all.push(positions);
    }
    if all.len() < num_reads {
        bail!(
            "N position file {} has {} lines for {} reads",
            path.display(),
            all.len(),
            num_reads
        );
    }
    Ok(Some(all))
}

// ---------------------------------------------------------------------------
// .bittree — serialized trie of bucket prefixes, gzipped
// ---------------------------------------------------------------------------

fn write_bittree_file(path: &Path, buckets: &[Kmer], k: usize) -> Result<()> {
    let mut bits = BitWriter::new(create_gz(path, Compression::best())?);
    bittree::write_kmers(buckets, k, &mut bits)?;
    bits.finish()?.finish()?.flush()?;
    Ok(())
}

fn read_bittree_file(path: &Path, k: usize) -> Result<Vec<Kmer>> {
    let mut bits = BitReader::new(open_gz(path)?);
    bittree::read_kmers(&mut bits, k)
        .with_context(|| format!("Failed to read bucket trie from {}", path.display()))
}
