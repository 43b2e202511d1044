//! Bucket construction: reads sorted by leading k-mer, one bucket per
//! distinct prefix, with fully uniform buckets marked by a negated count.

use rayon::prelude::*;

use crate::io::fastq::ReadRecord;
use crate::kmer::{self, Kmer};

/// Stable sort by the first k bases. Stability keeps the encoder
/// deterministic for any thread count.
pub fn sort_reads(reads: &mut [ReadRecord], k: usize) {
    reads.par_sort_by(|a, b| a.seq[..k].cmp(&b.seq[..k]));
}

/// One linear scan over the sorted reads. Returns the packed bucket
/// prefixes and their counts; a negative count marks a bucket whose reads
/// are all byte-identical (only meaningful when `dups` is set and the
/// bucket holds at least two reads).
pub fn list_buckets(reads: &[ReadRecord], k: usize, dups: bool) -> (Vec<Kmer>, Vec<i64>) {
    let mut buckets: Vec<Kmer> = Vec::new();
    let mut counts: Vec<i64> = Vec::new();

    let mut cur_prefix: Option<&[u8]> = None;
    let mut prev_seq: &[u8] = &[];
    let mut all_same = false;

    for read in reads {
        let prefix = &read.seq[..k];
        if cur_prefix != Some(prefix) {
            if dups && all_same {
                if let Some(last) = counts.last_mut() {
                    if *last > 1 {
                        *last = -*last;
                    }
                }
            }
            cur_prefix = Some(prefix);
            prev_seq = &read.seq;
            buckets.push(kmer::pack(prefix));
            counts.push(1);
            all_same = true;
        } else {
            all_same = all_same && read.seq == prev_seq;
            prev_seq = &read.seq;
            *counts.last_mut().unwrap() += 1;
        }
    }
    if dups && all_same {
        if let Some(last) = counts.last_mut() {
            if *last > 1 {
                *last = -*last;
            }
        }
    }

    (buckets, counts)
}
