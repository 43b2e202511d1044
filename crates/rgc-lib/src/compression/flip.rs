//! Read orientation: score each read and its reverse complement against the
//! reference k-mer presence vector and keep the better-matching strand.

use rayon::prelude::*;

use crate::bitvec::BitVec;
use crate::io::fastq::ReadRecord;
use crate::kmer::{self, Kmer};
use crate::model::SEEN_THRESHOLD;

/// Builds the k-mer presence vector from the reference sequences.
pub fn reference_bitvec(seqs: &[Vec<u8>], k: usize) -> BitVec {
    let mask = kmer::kmer_mask(k);
    let mut bv = BitVec::new(1u64 << (2 * k));
    for s in seqs {
        if s.len() <= k {
            continue;
        }
        let mut ctx = kmer::pack(&s[..k]);
        for &b in &s[k..] {
            bv.set(ctx as u64);
            ctx = kmer::shift(ctx, kmer::base_code(b), mask);
        }
    }
    bv
}

/// Scores a sequence by its consecutive k-mer pairs both present in the
/// reference, each worth [`SEEN_THRESHOLD`] observations.
pub fn matching_observations(bv: &BitVec, seq: &[u8], k: usize, mask: Kmer) -> u32 {
    let mut ctx = kmer::pack(&seq[..k]);
    let mut n = 0u32;
    for &b in &seq[k..] {
        let next = kmer::shift(ctx, kmer::base_code(b), mask);
        if bv.get(ctx as u64) && bv.get(next as u64) {
            n += SEEN_THRESHOLD as u32;
        }
        ctx = next;
    }
    n
}

// Flips one contiguous slice of reads; returns how many were flipped.
fn flip_range(block: &mut [ReadRecord], bv: &BitVec, k: usize, mask: Kmer) -> usize {
    let mut flipped = 0;
    for read in block {
        let forward = matching_observations(bv, &read.seq, k, mask);
        let rc = kmer::reverse_complement(&read.seq);
        let reverse = matching_observations(bv, &rc, k, mask);
        // ties go to the lexicographically smaller strand
        if reverse > forward || (reverse == forward && rc < read.seq) {
            read.set_reverse_complement(rc);
            flipped += 1;
        }
    }
    flipped
}

/// Flips every read whose reverse complement scores better, in parallel
/// over contiguous blocks of size ceil(n / workers). Workers share the
/// immutable bit vector and mutate only their own slice.
pub fn flip_reads(reads: &mut [ReadRecord], bv: &BitVec, k: usize, workers: usize) -> usize {
    if reads.is_empty() {
        return 0;
    }
    let mask = kmer::kmer_mask(k);
    let block = reads.len().div_ceil(workers.max(1));
    reads
        .par_chunks_mut(block)
        .map(|chunk| flip_range(chunk, bv, k, mask))
        .sum()
}
