//! Bucket-name serialization as a depth-first 2-bit trie.
//!
//! A sorted list of distinct k-mers is written as one 4-bit child-presence
//! mask per trie node (A,C,G,T order), recursing into present children
//! depth-first. Given k, the format is self-delimiting and reproduces the
//! k-mers in sorted order on the way back.

use anyhow::{bail, Result};
use std::io::{Read, Write};

use crate::io::bits::{BitReader, BitWriter};
use crate::kmer::Kmer;

// Digit of `kmer` at `depth`, counting from the leftmost base.
#[inline]
fn digit(kmer: Kmer, depth: usize, k: usize) -> u8 {
    ((kmer >> (2 * (k - 1 - depth))) & 3) as u8
}

fn write_node<W: Write>(
    kmers: &[Kmer],
    depth: usize,
    k: usize,
    out: &mut BitWriter<W>,
) -> std::io::Result<()> {
    if depth == k {
        return Ok(());
    }
    // the slice is sorted, so each child is a contiguous range
    let mut bounds = [0usize; 5];
    bounds[4] = kmers.len();
    let mut child = 0u8;
    for (i, &km) in kmers.iter().enumerate() {
        let d = digit(km, depth, k);
        while child < d {
            child += 1;
            bounds[child as usize] = i;
        }
    }
    while child < 4 {
        child += 1;
        bounds[child as usize] = kmers.len();
    }

    for c in 0..4 {
        let present = bounds[c + 1] > bounds[c];
        out.write_bit(present as u8)?;
    }
    for c in 0..4 {
        let range = &kmers[bounds[c]..bounds[c + 1]];
        if !range.is_empty() {
            write_node(range, depth + 1, k, out)?;
        }
    }
    Ok(())
}

/// Serializes a sorted list of distinct k-mers.
pub fn write_kmers<W: Write>(
    kmers: &[Kmer],
    k: usize,
    out: &mut BitWriter<W>,
) -> std::io::Result<()> {
    debug_assert!(kmers.windows(2).all(|w| w[0] < w[1]), "kmers must be sorted");
    if kmers.is_empty() {
        // an explicit empty root keeps the stream self-delimiting
        for _ in 0..4 {
            out.write_bit(0)?;
        }
        return Ok(());
    }
    write_node(kmers, 0, k, out)
}

fn read_node<R: Read>(
    bits: &mut BitReader<R>,
    prefix: Kmer,
    depth: usize,
    k: usize,
    out: &mut Vec<Kmer>,
) -> Result<()> {
    if depth == k {
        out.push(prefix);
        return Ok(());
    }
    let mut mask = [false; 4];
    for slot in &mut mask {
        match bits.read_bit()? {
            Some(b) => *slot = b == 1,
            None => bail!("unexpected EOF in bucket trie"),
        }
    }
    for (c, &present) in mask.iter().enumerate() {
        if present {
            read_node(bits, (prefix << 2) | c as Kmer, depth + 1, k, out)?;
        }
    }
    Ok(())
}

/// Reads back a trie written by [`write_kmers`]; the result is sorted.
pub fn read_kmers<R: Read>(bits: &mut BitReader<R>, k: usize) -> Result<Vec<Kmer>> {
    let mut out = Vec::new();
    read_node(bits, 0, 0, k, &mut out)?;
    Ok(out)
}
