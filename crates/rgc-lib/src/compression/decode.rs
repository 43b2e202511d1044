//! Decode driver: rebuild the model from the reference, replay every bucket
//! and reconstruct the original reads.

use anyhow::{bail, ensure, Context, Result};
use std::io::{BufWriter, Read, Write};
use std::time::Instant;
use tracing::info;

use super::arith::ArithDecoder;
use super::{
    read_bittree_file, read_counts_file, read_flipped_file, read_ns_file, seed_model, suffixed,
};
use crate::cli::DecodeConfig;
use crate::io::bits::BitReader;
use crate::io::fasta;
use crate::kmer::{self, Kmer};
use crate::model::{CoderState, DenseKmerModel, KmerModel, SparseKmerModel};

pub fn decode(cfg: &DecodeConfig) -> Result<()> {
    ensure!(
        (1..=16).contains(&cfg.k),
        "k must be in 1..=16, got {}",
        cfg.k
    );
    let start = Instant::now();

    let refs = fasta::read_reference(&cfg.reference)?;

    let buckets = read_bittree_file(&suffixed(&cfg.reads, ".bittree"), cfg.k)?;
    let (counts, read_len) = read_counts_file(&suffixed(&cfg.reads, ".counts"))?;
    ensure!(
        buckets.len() == counts.len(),
        "bucket trie has {} prefixes but counts file has {} entries",
        buckets.len(),
        counts.len()
    );
    ensure!(
        read_len >= cfg.k,
        "counts file claims read length {} below k = {}",
        read_len,
        cfg.k
    );
    let num_reads: usize = counts.iter().map(|c| c.unsigned_abs() as usize).sum();
    info!("{} buckets, {} reads of length {}", buckets.len(), num_reads, read_len);

    let flipped = read_flipped_file(&suffixed(&cfg.reads, ".flipped"), num_reads)?;
    let ns = read_ns_file(&suffixed(&cfg.reads, ".ns"), num_reads)?;

    let enc_path = suffixed(&cfg.reads, ".enc");
    let mut decoder = ArithDecoder::new(BitReader::new(super::open_gz(&enc_path)?))?;

    let out_file = std::fs::File::create(&cfg.out)
        .with_context(|| format!("Failed to create output file {}", cfg.out.display()))?;
    let mut out = BufWriter::new(out_file);

    let sidecars = Sidecars { flipped, ns };
    let written = if cfg.bigmem {
        let mut model = DenseKmerModel::new(cfg.k);
        seed_model(&mut model, &refs, cfg.k);
        decode_reads(cfg, &buckets, &counts, read_len, &sidecars, &mut model, &mut decoder, &mut out)?
    } else {
        let mut model = SparseKmerModel::new();
        seed_model(&mut model, &refs, cfg.k);
        decode_reads(cfg, &buckets, &counts, read_len, &sidecars, &mut model, &mut decoder, &mut out)?
    };
    out.flush()?;

    info!("Decoded {} reads in {:.2}s", written, start.elapsed().as_secs_f64());
    Ok(())
}

struct Sidecars {
    flipped: Option<Vec<bool>>,
    ns: Option<Vec<Vec<u16>>>,
}

#[allow(clippy::too_many_arguments)]
fn decode_reads<M: KmerModel, R: Read, W: Write>(
    cfg: &DecodeConfig,
    buckets: &[Kmer],
    counts: &[i64],
    read_len: usize,
    sidecars: &Sidecars,
    model: &mut M,
    decoder: &mut ArithDecoder<R>,
    out: &mut W,
) -> Result<usize> {
    let mut state = CoderState::new(cfg.observation_weight, cfg.update);
    let mask = kmer::kmer_mask(cfg.k);
    let tail_len = read_len - cfg.k;
    let mut tail = vec![0u8; tail_len];
    let mut seq = Vec::with_capacity(read_len);
    let mut n = 0usize;

    for (bucket, &count) in buckets.iter().zip(counts) {
        let prefix = kmer::unpack(*bucket, cfg.k);
        if count < 0 {
            // uniform bucket: one tail in the stream, replicated on output
            decode_tail(model, &mut state, decoder, *bucket, mask, &mut tail)?;
            for _ in 0..count.unsigned_abs() {
                emit_read(cfg, &prefix, &tail, n, sidecars, &mut seq, out)?;
                n += 1;
            }
        } else {
            for _ in 0..count {
                decode_tail(model, &mut state, decoder, *bucket, mask, &mut tail)?;
                emit_read(cfg, &prefix, &tail, n, sidecars, &mut seq, out)?;
                n += 1;
            }
        }
    }
    Ok(n)
}

// Decodes one tail, updating the model and default interval exactly as the
// encoder did at the same position.
fn decode_tail<M: KmerModel, R: Read>(
    model: &mut M,
    state: &mut CoderState,
    decoder: &mut ArithDecoder<R>,
    bucket: Kmer,
    mask: Kmer,
    tail: &mut [u8],
) -> Result<()> {
    let mut ctx = bucket;
    for slot in tail.iter_mut() {
        let total = state.context_total(model, ctx);
        let sym = decoder.decode(total, |t| state.locate(model, ctx, t))? as u8;
        *slot = kmer::base_from_code(sym);
        state.next_interval(model, ctx, sym, false);
        ctx = kmer::shift(ctx, sym, mask);
    }
    Ok(())
}

// Reassembles read `n`: prefix + tail, Ns restored, orientation undone.
fn emit_read<W: Write>(
    cfg: &DecodeConfig,
    prefix: &[u8],
    tail: &[u8],
    n: usize,
    sidecars: &Sidecars,
    seq: &mut Vec<u8>,
    out: &mut W,
) -> Result<()> {
    seq.clear();
    seq.extend_from_slice(prefix);
    seq.extend_from_slice(tail);

    if let Some(ns) = &sidecars.ns {
        for &p in &ns[n] {
            let p = p as usize;
            if p >= seq.len() {
                bail!("N position {} outside read of length {}", p, seq.len());
            }
            seq[p] = b'N';
        }
    }
    if let Some(flipped) = &sidecars.flipped {
        if flipped[n] {
            let rc = kmer::reverse_complement(seq);
            seq.clear();
            seq.extend_from_slice(&rc);
        }
    }

    if cfg.fasta {
        writeln!(out, ">R{}", n)?;
    }
    out.write_all(seq)?;
    out.write_all(b"\n")?;
    Ok(())
}
