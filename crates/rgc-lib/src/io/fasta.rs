//! Reference genome ingestion: gzipped multi-FASTA.

use anyhow::{bail, Context, Result};
use flate2::read::GzDecoder;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::info;

use crate::kmer;

/// Reads a gzipped multi-FASTA reference into one byte vector per record.
///
/// Lower-case bases are uppercased; any byte outside A,C,G,T,N is fatal.
/// N bases are kept verbatim here and folded to A only when k-mers are
/// packed.
pub fn read_reference(path: impl AsRef<Path>) -> Result<Vec<Vec<u8>>> {
    let path = path.as_ref();
    info!("Reading reference from {}", path.display());

    let file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open reference file: {}", path.display()))?;
    let reader = BufReader::new(GzDecoder::new(BufReader::with_capacity(
        4 * 1024 * 1024,
        file,
    )));

    let mut seqs: Vec<Vec<u8>> = Vec::new();
    let mut cur: Vec<u8> = Vec::new();

    for line in reader.lines() {
        let line = line.with_context(|| {
            format!("Failed to read reference (is {} gzipped FASTA?)", path.display())
        })?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line.as_bytes()[0] == b'>' {
            if !cur.is_empty() {
                seqs.push(std::mem::take(&mut cur));
            }
            continue;
        }
        for &b in line.as_bytes() {
            let up = b.to_ascii_uppercase();
            if !kmer::is_acgtn(up) {
                bail!("Invalid base {:?} in reference {}", b as char, path.display());
            }
            cur.push(up);
        }
    }
    if !cur.is_empty() {
        seqs.push(cur);
    }

    let total: usize = seqs.iter().map(|s| s.len()).sum();
    info!("Read {} reference sequences ({} bases)", seqs.len(), total);
    Ok(seqs)
}
