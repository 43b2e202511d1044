//! K-mer transition model and the interval math that drives the coder.
//!
//! The model maps a k-mer context to a distribution of counts over the next
//! base. Two backends share one trait: a sparse hash map for ordinary
//! references and a dense 4^k array for speed at the cost of memory. Both
//! store each distribution in a packed 4-byte cell of 8-bit counters; the
//! first time any channel would cross 255 the cell is promoted to an entry
//! in an overflow table of true 16-bit counts, and the cell is rewritten as
//! a sentinel byte plus a big-endian 24-bit index into that table.

mod dense;
mod sparse;

pub use dense::DenseKmerModel;
pub use sparse::SparseKmerModel;

use crate::kmer::Kmer;

/// Largest value a transition counter can hold; further increments are
/// silently discarded.
pub const MAX_OBSERVATION: u16 = u16::MAX;

/// A context seen in the reference starts its observed transition here;
/// counts below this are weighted as unseen.
pub const SEEN_THRESHOLD: u16 = 2;

/// Weight of a never-observed transition inside a known context.
pub const PSEUDO_COUNT: u64 = 1;

/// Default multiplier applied to observed transition counts.
pub const DEFAULT_OBSERVATION_WEIGHT: u64 = 10;

const OVERFLOW_SENTINEL: u8 = 0xFF;
const MAX_OVERFLOW_ENTRIES: usize = 1 << 24;

/// Transition counts for one context, in A,C,G,T order.
pub type Distribution = [u16; 4];

/// Storage-agnostic contract shared by both model backends. The drivers are
/// monomorphized over this trait, so there is no dynamic dispatch in the
/// per-symbol loop.
pub trait KmerModel {
    /// Count for the transition `k -> c`.
    fn next_count(&self, k: Kmer, c: u8) -> u16;

    /// Full distribution if the context is known, `None` otherwise.
    fn distribution(&self, k: Kmer) -> Option<Distribution>;

    /// Overwrites a single small counter. Only valid before the cell has
    /// been promoted to the overflow table (model construction time).
    fn set_count(&mut self, k: Kmer, c: u8, v: u8);

    /// Adds `by` to the c-th counter, promoting to the overflow table when
    /// any channel would reach 255 and saturating at [`MAX_OBSERVATION`].
    fn increment(&mut self, k: Kmer, c: u8, by: u8);
}

// ---------------------------------------------------------------------------
// Packed-cell helpers shared by both backends
// ---------------------------------------------------------------------------

#[inline(always)]
fn overflow_index(cell: &[u8; 4]) -> Option<usize> {
    if cell[0] == OVERFLOW_SENTINEL {
        Some(((cell[1] as usize) << 16) | ((cell[2] as usize) << 8) | cell[3] as usize)
    } else {
        None
    }
}

#[inline(always)]
fn widen(cell: &[u8; 4]) -> Distribution {
    [cell[0] as u16, cell[1] as u16, cell[2] as u16, cell[3] as u16]
}

fn promote(cell: &mut [u8; 4], overflow: &mut Vec<Distribution>) -> usize {
    let idx = overflow.len();
    if idx >= MAX_OVERFLOW_ENTRIES {
        panic!("kmer model overflow table exhausted ({MAX_OVERFLOW_ENTRIES} entries)");
    }
    overflow.push(widen(cell));
    *cell = [
        OVERFLOW_SENTINEL,
        (idx >> 16) as u8,
        (idx >> 8) as u8,
        idx as u8,
    ];
    idx
}

// One increment step against a packed cell, promoting on the crossing step.
fn bump_cell(cell: &mut [u8; 4], overflow: &mut Vec<Distribution>, c: usize, by: u8) {
    if let Some(idx) = overflow_index(cell) {
        overflow[idx][c] = overflow[idx][c].saturating_add(by as u16);
    } else if cell[c] as u16 + by as u16 >= OVERFLOW_SENTINEL as u16 {
        let idx = promote(cell, overflow);
        overflow[idx][c] = overflow[idx][c].saturating_add(by as u16);
    } else {
        cell[c] += by;
    }
}

fn cell_count(cell: &[u8; 4], overflow: &[Distribution], c: usize) -> u16 {
    match overflow_index(cell) {
        Some(idx) => overflow[idx][c],
        None => cell[c] as u16,
    }
}

// ---------------------------------------------------------------------------
// Interval math
// ---------------------------------------------------------------------------

/// Adaptive state threaded through the encode and decode loops: the default
/// interval used for unknown contexts, the tuning knobs, and running
/// statistics. Mutating it in lockstep on both sides is what keeps encoder
/// and decoder models byte-identical.
pub struct CoderState {
    default_interval: [u32; 4],
    default_sum: u64,
    observation_weight: u64,
    update_model: bool,
    context_hits: u64,
}

impl CoderState {
    pub fn new(observation_weight: u64, update_model: bool) -> Self {
        Self {
            default_interval: [2, 2, 2, 2],
            default_sum: 8,
            observation_weight,
            update_model,
            context_hits: 0,
        }
    }

    /// Times a known context supplied the distribution.
    pub fn context_hits(&self) -> u64 {
        self.context_hits
    }

    /// Times the default interval stood in (plus its initial mass of 8).
    pub fn default_sum(&self) -> u64 {
        self.default_sum
    }

    // Weight of channel `i` in a known context's distribution.
    #[inline(always)]
    fn context_weight(&self, i: usize, dist: &Distribution) -> u64 {
        if dist[i] >= SEEN_THRESHOLD {
            self.observation_weight * dist[i] as u64
        } else {
            PSEUDO_COUNT
        }
    }

    /// Half-open interval `[a, b)` of `letter` within the weighted
    /// distribution, plus the distribution total. Iteration is strictly
    /// A,C,G,T.
    pub fn interval_for(&self, letter: u8, dist: &Distribution) -> (u64, u64, u64) {
        let (mut a, mut b, mut total) = (0u64, 0u64, 0u64);
        for i in 0..4 {
            let w = self.context_weight(i, dist);
            total += w;
            if i <= letter as usize {
                b += w;
                if i < letter as usize {
                    a += w;
                }
            }
        }
        (a, b, total)
    }

    /// Interval of `letter` within the adaptive default distribution.
    pub fn interval_for_default(&self, letter: u8) -> (u64, u64, u64) {
        let (mut a, mut b, mut total) = (0u64, 0u64, 0u64);
        for (i, &w) in self.default_interval.iter().enumerate() {
            let w = w as u64;
            total += w;
            if i <= letter as usize {
                b += w;
                if i < letter as usize {
                    a += w;
                }
            }
        }
        (a, b, total)
    }

    /// Computes the coding interval for `sym` under `ctx` and applies the
    /// symmetric adaptive update. The decoder calls this with
    /// `compute = false` purely for the side effects.
    pub fn next_interval<M: KmerModel>(
        &mut self,
        model: &mut M,
        ctx: Kmer,
        sym: u8,
        compute: bool,
    ) -> (u64, u64, u64) {
        let interval = match model.distribution(ctx) {
            Some(dist) => {
                self.context_hits += 1;
                if compute {
                    self.interval_for(sym, &dist)
                } else {
                    (0, 0, 0)
                }
            }
            None => {
                let interval = if compute {
                    self.interval_for_default(sym)
                } else {
                    (0, 0, 0)
                };
                self.default_interval[sym as usize] += 1;
                self.default_sum += 1;
                interval
            }
        };
        if self.update_model {
            model.increment(ctx, sym, 1);
        }
        interval
    }

    /// Total weight of the distribution the decoder is about to search:
    /// the context's if known, the default's otherwise.
    pub fn context_total<M: KmerModel>(&self, model: &M, ctx: Kmer) -> u64 {
        match model.distribution(ctx) {
            Some(dist) => (0..4).map(|i| self.context_weight(i, &dist)).sum(),
            None => self.default_sum,
        }
    }

    /// Finds the interval containing `target`, used as the lookup callback
    /// of the arithmetic decoder. Returns `(a, b, symbol)`.
    pub fn locate<M: KmerModel>(&self, model: &M, ctx: Kmer, target: u64) -> (u64, u64, u64) {
        match model.distribution(ctx) {
            Some(dist) => {
                let mut sum = 0u64;
                for i in 0..4 {
                    let w = self.context_weight(i, &dist);
                    sum += w;
                    if target < sum {
                        return (sum - w, sum, i as u64);
                    }
                }
                panic!("decoder target {target} outside every context interval");
            }
            None => {
                let mut sum = 0u64;
                for (i, &w) in self.default_interval.iter().enumerate() {
                    sum += w as u64;
                    if target < sum {
                        return (sum - w as u64, sum, i as u64);
                    }
                }
                panic!("decoder target {target} outside the default interval");
            }
        }
    }
}
