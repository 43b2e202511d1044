//! Encode driver: orient, sort and bucket the reads, write the sidecars,
//! then arithmetic-code every read tail against the reference model.

use anyhow::{ensure, Result};
use flate2::Compression;
use std::io::Write;
use std::time::Instant;
use tracing::info;

use super::arith::ArithEncoder;
use super::{
    bucket, flip, seed_model, suffixed, write_bittree_file, write_counts_file,
    write_flipped_file, write_ns_file,
};
use crate::cli::EncodeConfig;
use crate::io::bits::BitWriter;
use crate::io::fastq::ReadRecord;
use crate::io::{fasta, fastq};
use crate::kmer::{self, Kmer};
use crate::model::{CoderState, DenseKmerModel, KmerModel, SparseKmerModel};

pub fn encode(cfg: &EncodeConfig) -> Result<()> {
    ensure!(
        (1..=16).contains(&cfg.k),
        "k must be in 1..=16, got {}",
        cfg.k
    );
    let start = Instant::now();

    let threads = if cfg.threads == 0 {
        crate::cli::num_cpus()
    } else {
        cfg.threads
    };
    // the pool may already exist when the library is called repeatedly;
    // that only changes worker count, never output
    let _ = rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global();

    let refs = fasta::read_reference(&cfg.reference)?;
    let mut reads = fastq::read_reads(&cfg.reads)?;
    let read_len = reads[0].seq.len();
    ensure!(
        read_len >= cfg.k,
        "reads of length {} are shorter than k = {}",
        read_len,
        cfg.k
    );

    // orient reads against the reference presence vector, which is dropped
    // again before the full model is materialized
    if cfg.flip {
        let flip_start = Instant::now();
        let bv = flip::reference_bitvec(&refs, cfg.k);
        let flipped = flip::flip_reads(&mut reads, &bv, cfg.k, threads);
        info!(
            "Flipped {} of {} reads in {:.2}s",
            flipped,
            reads.len(),
            flip_start.elapsed().as_secs_f64()
        );
    }

    bucket::sort_reads(&mut reads, cfg.k);
    let (buckets, counts) = bucket::list_buckets(&reads, cfg.k, cfg.dups);
    info!(
        "{} buckets, {} uniform",
        buckets.len(),
        counts.iter().filter(|&&c| c < 0).count()
    );

    write_sidecars(cfg, &reads, &buckets, &counts, read_len)?;

    let encoded = if cfg.bigmem {
        let mut model = DenseKmerModel::new(cfg.k);
        seed_model(&mut model, &refs, cfg.k);
        encode_tails(cfg, &reads, &buckets, &counts, &mut model)?
    } else {
        let mut model = SparseKmerModel::new();
        seed_model(&mut model, &refs, cfg.k);
        encode_tails(cfg, &reads, &buckets, &counts, &mut model)?
    };

    info!(
        "Encoded {} tails ({} input reads) in {:.2}s",
        encoded,
        reads.len(),
        start.elapsed().as_secs_f64()
    );
    Ok(())
}

// The four sidecar streams go to distinct files, so each writer task owns
// its stream; the joins are the barrier before tail encoding starts.
fn write_sidecars(
    cfg: &EncodeConfig,
    reads: &[ReadRecord],
    buckets: &[Kmer],
    counts: &[i64],
    read_len: usize,
) -> Result<()> {
    let (flipped_res, (ns_res, (tree_res, counts_res))) = rayon::join(
        || write_flipped_file(&suffixed(&cfg.out, ".flipped"), reads),
        || {
            rayon::join(
                || write_ns_file(&suffixed(&cfg.out, ".ns"), reads),
                || {
                    rayon::join(
                        || write_bittree_file(&suffixed(&cfg.out, ".bittree"), buckets, cfg.k),
                        || write_counts_file(&suffixed(&cfg.out, ".counts"), read_len, counts),
                    )
                },
            )
        },
    );
    flipped_res?;
    ns_res?;
    tree_res?;
    counts_res?;
    Ok(())
}

// Encodes every tail in bucket order; a uniform bucket contributes only its
// first read. The model and default interval adapt per symbol, exactly
// mirrored by the decoder.
fn encode_tails<M: KmerModel>(
    cfg: &EncodeConfig,
    reads: &[ReadRecord],
    buckets: &[Kmer],
    counts: &[i64],
    model: &mut M,
) -> Result<usize> {
    let enc_path = suffixed(&cfg.out, ".enc");
    let gz = super::create_gz(&enc_path, Compression::default())?;
    let mut enc = ArithEncoder::new(BitWriter::new(gz));
    let mut state = CoderState::new(cfg.observation_weight, cfg.update);
    let mask = kmer::kmer_mask(cfg.k);

    let encode_start = Instant::now();
    let mut idx = 0usize;
    let mut encoded = 0usize;
    for (bucket, &count) in buckets.iter().zip(counts) {
        let size = count.unsigned_abs() as usize;
        let emit = if count < 0 { 1 } else { size };
        for read in &reads[idx..idx + emit] {
            let mut ctx = *bucket;
            for &b in &read.seq[cfg.k..] {
                let sym = kmer::base_code(b);
                let (low, high, total) = state.next_interval(model, ctx, sym, true);
                enc.encode(low, high, total)?;
                ctx = kmer::shift(ctx, sym, mask);
            }
            encoded += 1;
        }
        idx += size;
    }

    enc.finish()?.finish()?.flush()?;
    info!(
        "Tail encoding took {:.2}s; context used {} times, default interval mass {}",
        encode_start.elapsed().as_secs_f64(),
        state.context_hits(),
        state.default_sum()
    );
    Ok(encoded)
}
