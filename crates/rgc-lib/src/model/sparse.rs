//! Sparse model backend: contexts absent from the reference take no space.

use rustc_hash::FxHashMap;
use tracing::debug;

use super::{bump_cell, cell_count, overflow_index, widen, Distribution, KmerModel};
use crate::kmer::Kmer;

pub struct SparseKmerModel {
    dist: FxHashMap<Kmer, [u8; 4]>,
    overflow: Vec<Distribution>,
}

impl SparseKmerModel {
    pub fn new() -> Self {
        debug!("Creating sparse kmer count model");
        Self {
            dist: FxHashMap::with_capacity_and_hasher(100_000, Default::default()),
            overflow: Vec::new(),
        }
    }
}

impl Default for SparseKmerModel {
    fn default() -> Self {
        Self::new()
    }
}

impl KmerModel for SparseKmerModel {
    fn next_count(&self, k: Kmer, c: u8) -> u16 {
        match self.dist.get(&k) {
            Some(cell) => cell_count(cell, &self.overflow, c as usize),
            None => 0,
        }
    }

    // Known means the key is present.
    fn distribution(&self, k: Kmer) -> Option<Distribution> {
        let cell = self.dist.get(&k)?;
        Some(match overflow_index(cell) {
            Some(idx) => self.overflow[idx],
            None => widen(cell),
        })
    }

    fn set_count(&mut self, k: Kmer, c: u8, v: u8) {
        self.dist.entry(k).or_insert([0u8; 4])[c as usize] = v;
    }

    fn increment(&mut self, k: Kmer, c: u8, by: u8) {
        let cell = self.dist.entry(k).or_insert([0u8; 4]);
        bump_cell(cell, &mut self.overflow, c as usize, by);
    }
}
