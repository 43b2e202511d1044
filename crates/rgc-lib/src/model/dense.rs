//! Dense model backend: a flat 4^k array of packed cells. Trades memory
//! (4 bytes per possible context) for constant-time access with no hashing.

use tracing::debug;

use super::{bump_cell, cell_count, overflow_index, widen, Distribution, KmerModel};
use crate::kmer::Kmer;

pub struct DenseKmerModel {
    dist: Vec<[u8; 4]>,
    overflow: Vec<Distribution>,
}

impl DenseKmerModel {
    pub fn new(k: usize) -> Self {
        debug!("Creating dense kmer count model for k = {k}");
        Self {
            dist: vec![[0u8; 4]; 1usize << (2 * k)],
            overflow: Vec::with_capacity(100_000),
        }
    }
}

impl KmerModel for DenseKmerModel {
    fn next_count(&self, k: Kmer, c: u8) -> u16 {
        cell_count(&self.dist[k as usize], &self.overflow, c as usize)
    }

    // Known means any nonzero cell; through the public API this agrees with
    // the sparse backend's key-present semantics, since every inserted key
    // carries at least one nonzero channel.
    fn distribution(&self, k: Kmer) -> Option<Distribution> {
        let cell = &self.dist[k as usize];
        if let Some(idx) = overflow_index(cell) {
            return Some(self.overflow[idx]);
        }
        if cell.iter().all(|&v| v == 0) {
            return None;
        }
        Some(widen(cell))
    }

    fn set_count(&mut self, k: Kmer, c: u8, v: u8) {
        self.dist[k as usize][c as usize] = v;
    }

    fn increment(&mut self, k: Kmer, c: u8, by: u8) {
        bump_cell(&mut self.dist[k as usize], &mut self.overflow, c as usize, by);
    }
}
