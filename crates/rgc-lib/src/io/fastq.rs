//! Read ingestion: FASTQ (sequence line only), FASTA, or plain
//! one-sequence-per-line, with gzip auto-detection.
//!
//! Records are stored as raw bytes rather than `String` since everything
//! downstream (packing, flipping, sorting) works on ASCII bytes. N bases are
//! folded to A at ingest and their positions recorded so the decoder can put
//! them back.

use anyhow::{bail, Context, Result};
use flate2::read::GzDecoder;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;
use tracing::info;

use crate::kmer;

/// A single read, with N bases already folded to A.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadRecord {
    /// ASCII sequence over A,C,G,T.
    pub seq: Vec<u8>,
    /// Offsets where the original base was N, ascending.
    pub n_positions: Vec<u16>,
    /// True once the read has been replaced by its reverse complement.
    pub flipped: bool,
}

impl ReadRecord {
    /// Builds a record from a raw sequence line, folding N to A and
    /// recording its positions. Bytes outside A,C,G,T,N are fatal.
    pub fn from_raw(raw: &[u8]) -> Result<Self> {
        let mut seq = Vec::with_capacity(raw.len());
        let mut n_positions = Vec::new();
        for (i, &b) in raw.iter().enumerate() {
            let up = b.to_ascii_uppercase();
            if !kmer::is_acgtn(up) {
                bail!("Invalid base {:?} in read", b as char);
            }
            if up == b'N' {
                n_positions.push(i as u16);
                seq.push(b'A');
            } else {
                seq.push(up);
            }
        }
        Ok(Self { seq, n_positions, flipped: false })
    }

    /// Replaces the sequence with its precomputed reverse complement and
    /// mirrors the N positions into the new orientation.
    pub fn set_reverse_complement(&mut self, rc: Vec<u8>) {
        let last = (self.seq.len() - 1) as u16;
        self.seq = rc;
        for p in &mut self.n_positions {
            *p = last - *p;
        }
        self.n_positions.reverse();
        self.flipped = true;
    }
}

enum Format {
    Fastq,
    Fasta,
    Plain,
}

// Either a plain file reader or a gzip decoder, picked by magic bytes.
enum FileReader {
    Plain(BufReader<std::fs::File>),
    Gzipped(BufReader<GzDecoder<BufReader<std::fs::File>>>),
}

impl Read for FileReader {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match self {
            FileReader::Plain(r) => r.read(buf),
            FileReader::Gzipped(r) => r.read(buf),
        }
    }
}

impl BufRead for FileReader {
    fn fill_buf(&mut self) -> std::io::Result<&[u8]> {
        match self {
            FileReader::Plain(r) => r.fill_buf(),
            FileReader::Gzipped(r) => r.fill_buf(),
        }
    }

    fn consume(&mut self, amt: usize) {
        match self {
            FileReader::Plain(r) => r.consume(amt),
            FileReader::Gzipped(r) => r.consume(amt),
        }
    }
}

/// Streaming reader yielding one [`ReadRecord`] per input read.
pub struct ReadFileReader {
    reader: FileReader,
    format: Format,
    buffer: Vec<u8>,
}

impl ReadFileReader {
    /// Opens a reads file, auto-detecting gzip by magic bytes and the record
    /// format by the first content byte ('@' FASTQ, '>' FASTA, anything else
    /// one sequence per line).
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = std::fs::File::open(path)
            .with_context(|| format!("Failed to open reads file: {}", path.display()))?;

        let mut buffered = BufReader::with_capacity(4 * 1024 * 1024, file);
        let is_gzipped = {
            let peek = buffered.fill_buf()?;
            peek.len() >= 2 && peek[0] == 0x1f && peek[1] == 0x8b
        };

        let mut reader = if is_gzipped {
            FileReader::Gzipped(BufReader::new(GzDecoder::new(buffered)))
        } else {
            FileReader::Plain(buffered)
        };

        let format = match reader.fill_buf()?.first() {
            Some(b'@') => Format::Fastq,
            Some(b'>') => Format::Fasta,
            _ => Format::Plain,
        };

        Ok(Self { reader, format, buffer: Vec::with_capacity(512) })
    }

    fn trim_newline(buf: &mut Vec<u8>) {
        while buf.last().is_some_and(|&b| b == b'\n' || b == b'\r') {
            buf.pop();
        }
    }

    // Reads one line into the internal buffer; false at EOF.
    fn next_line(&mut self) -> Result<bool> {
        self.buffer.clear();
        let n = self.reader.read_until(b'\n', &mut self.buffer)?;
        if n == 0 {
            return Ok(false);
        }
        Self::trim_newline(&mut self.buffer);
        Ok(true)
    }

    /// Next read, or `None` at end of input. Only the sequence line of a
    /// FASTQ record is consumed; id, separator and quality are skipped.
    pub fn next(&mut self) -> Result<Option<ReadRecord>> {
        match self.format {
            Format::Fastq => {
                if !self.next_line()? {
                    return Ok(None);
                }
                if self.buffer.first() != Some(&b'@') {
                    bail!("Invalid FASTQ: expected '@' id line");
                }
                if !self.next_line()? {
                    bail!("Invalid FASTQ: missing sequence line");
                }
                let record = ReadRecord::from_raw(&self.buffer)?;
                if !self.next_line()? || self.buffer.first() != Some(&b'+') {
                    bail!("Invalid FASTQ: missing '+' separator line");
                }
                if !self.next_line()? {
                    bail!("Invalid FASTQ: missing quality line");
                }
                Ok(Some(record))
            }
            Format::Fasta => {
                // header line, then sequence lines until the next header
                if !self.next_line()? {
                    return Ok(None);
                }
                if self.buffer.first() != Some(&b'>') {
                    bail!("Invalid FASTA: expected '>' header line");
                }
                let mut seq = Vec::new();
                loop {
                    let at_boundary = {
                        let peek = self.reader.fill_buf()?;
                        peek.is_empty() || peek[0] == b'>'
                    };
                    if at_boundary || !self.next_line()? {
                        break;
                    }
                    seq.extend_from_slice(&self.buffer);
                }
                if seq.is_empty() {
                    bail!("Invalid FASTA: record with empty sequence");
                }
                Ok(Some(ReadRecord::from_raw(&seq)?))
            }
            Format::Plain => {
                loop {
                    if !self.next_line()? {
                        return Ok(None);
                    }
                    if !self.buffer.is_empty() {
                        return Ok(Some(ReadRecord::from_raw(&self.buffer)?));
                    }
                }
            }
        }
    }
}

/// Reads every record from a reads file and checks they share one length.
pub fn read_reads(path: impl AsRef<Path>) -> Result<Vec<ReadRecord>> {
    let path = path.as_ref();
    let mut reader = ReadFileReader::from_path(path)?;
    let mut reads: Vec<ReadRecord> = Vec::new();
    while let Some(record) = reader.next()? {
        if let Some(first) = reads.first() {
            if record.seq.len() != first.seq.len() {
                bail!(
                    "All reads must share one length: read {} has {} bases, expected {}",
                    reads.len(),
                    record.seq.len(),
                    first.seq.len()
                );
            }
        }
        reads.push(record);
    }
    if reads.is_empty() {
        bail!("No reads found in {}", path.display());
    }
    info!("Read {} reads of length {}", reads.len(), reads[0].seq.len());
    Ok(reads)
}
