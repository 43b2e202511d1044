//! Integer arithmetic coder over dynamic totals.
//!
//! Classic Witten-Neal-Cleary construction with 32-bit precision and 64-bit
//! working registers. Each symbol is described by its cumulative interval
//! `[low, high)` out of `total`, where the model supplies a fresh `total`
//! every step. Underflow is handled with pending-bit counting; the decoder
//! treats bits past end-of-stream as zeros.

use anyhow::{ensure, Result};
use std::io::{Read, Write};

use crate::io::bits::{BitReader, BitWriter};

const PRECISION: u32 = 32;
const TOP: u64 = 1 << PRECISION;
const HALF: u64 = TOP / 2;
const QUARTER: u64 = TOP / 4;
const THREE_QUARTERS: u64 = 3 * QUARTER;

/// Largest supported per-symbol total; beyond this the coding intervals can
/// collapse to zero width.
pub const MAX_TOTAL: u64 = QUARTER;

pub struct ArithEncoder<W: Write> {
    low: u64,
    high: u64,
    pending: u64,
    bits: BitWriter<W>,
}

impl<W: Write> ArithEncoder<W> {
    pub fn new(bits: BitWriter<W>) -> Self {
        Self { low: 0, high: TOP - 1, pending: 0, bits }
    }

    fn emit(&mut self, bit: u8) -> std::io::Result<()> {
        self.bits.write_bit(bit)?;
        let inverse = bit ^ 1;
        while self.pending > 0 {
            self.bits.write_bit(inverse)?;
            self.pending -= 1;
        }
        Ok(())
    }

    /// Narrows the current range to the symbol interval `[low, high)` of
    /// `total` and renormalizes.
    pub fn encode(&mut self, low: u64, high: u64, total: u64) -> Result<()> {
        ensure!(
            low < high && high <= total && total <= MAX_TOTAL,
            "invalid coding interval [{low}, {high}) of {total}"
        );

        let range = self.high - self.low + 1;
        self.high = self.low + range * high / total - 1;
        self.low += range * low / total;

        loop {
            if self.high < HALF {
                self.emit(0)?;
            } else if self.low >= HALF {
                self.emit(1)?;
                self.low -= HALF;
                self.high -= HALF;
            } else if self.low >= QUARTER && self.high < THREE_QUARTERS {
                self.pending += 1;
                self.low -= QUARTER;
                self.high -= QUARTER;
            } else {
                break;
            }
            self.low <<= 1;
            self.high = (self.high << 1) | 1;
        }
        Ok(())
    }

    /// Emits the bits that disambiguate the final interval and flushes the
    /// underlying writer.
    pub fn finish(mut self) -> Result<W> {
        self.pending += 1;
        if self.low < QUARTER {
            self.emit(0)?;
        } else {
            self.emit(1)?;
        }
        Ok(self.bits.finish()?)
    }
}

pub struct ArithDecoder<R: Read> {
    low: u64,
    high: u64,
    value: u64,
    bits: BitReader<R>,
}

impl<R: Read> ArithDecoder<R> {
    pub fn new(mut bits: BitReader<R>) -> Result<Self> {
        let mut value = 0u64;
        for _ in 0..PRECISION {
            value = (value << 1) | bits.read_bit()?.unwrap_or(0) as u64;
        }
        Ok(Self { low: 0, high: TOP - 1, value, bits })
    }

    /// Decodes one symbol. `lookup` maps a target in `[0, total)` to the
    /// containing interval `(low, high, symbol)`; the model owns that
    /// search, so totals can change every call.
    pub fn decode<F>(&mut self, total: u64, lookup: F) -> Result<u64>
    where
        F: FnOnce(u64) -> (u64, u64, u64),
    {
        ensure!(
            total > 0 && total <= MAX_TOTAL,
            "invalid decoding total {total}"
        );

        let range = self.high - self.low + 1;
        let target = (((self.value - self.low + 1) * total - 1) / range).min(total - 1);
        let (low, high, symbol) = lookup(target);

        self.high = self.low + range * high / total - 1;
        self.low += range * low / total;

        loop {
            if self.high < HALF {
                // nothing to subtract
            } else if self.low >= HALF {
                self.low -= HALF;
                self.high -= HALF;
                self.value -= HALF;
            } else if self.low >= QUARTER && self.high < THREE_QUARTERS {
                self.low -= QUARTER;
                self.high -= QUARTER;
                self.value -= QUARTER;
            } else {
                break;
            }
            self.low <<= 1;
            self.high = (self.high << 1) | 1;
            self.value = (self.value << 1) | self.bits.read_bit()?.unwrap_or(0) as u64;
        }
        Ok(symbol)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn locate(cum: &[u64], target: u64) -> (u64, u64, u64) {
        for i in 0..cum.len() - 1 {
            if target < cum[i + 1] {
                return (cum[i], cum[i + 1], i as u64);
            }
        }
        panic!("target {target} out of range");
    }

    fn roundtrip_static(symbols: &[usize], cum: &[u64]) {
        let total = *cum.last().unwrap();
        let mut enc = ArithEncoder::new(BitWriter::new(Vec::new()));
        for &s in symbols {
            enc.encode(cum[s], cum[s + 1], total).unwrap();
        }
        let bytes = enc.finish().unwrap();

        let mut dec = ArithDecoder::new(BitReader::new(&bytes[..])).unwrap();
        for &expected in symbols {
            let got = dec.decode(total, |t| locate(cum, t)).unwrap();
            assert_eq!(got as usize, expected);
        }
    }

    #[test]
    fn test_uniform_roundtrip() {
        let symbols: Vec<usize> = (0..2000).map(|i| (i * 7 + 3) % 4).collect();
        roundtrip_static(&symbols, &[0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_skewed_roundtrip() {
        let symbols: Vec<usize> = (0..5000).map(|i| usize::from(i % 61 == 0)).collect();
        roundtrip_static(&symbols, &[0, 97, 100]);
    }

    #[test]
    fn test_dynamic_totals_roundtrip() {
        // adaptive counts: totals change every symbol, mirrored on decode
        let symbols: Vec<usize> = (0..3000).map(|i| (i * i + i / 5) % 4).collect();

        let mut counts = [1u64; 4];
        let mut enc = ArithEncoder::new(BitWriter::new(Vec::new()));
        for &s in &symbols {
            let cum = [
                0,
                counts[0],
                counts[0] + counts[1],
                counts[0] + counts[1] + counts[2],
                counts.iter().sum::<u64>(),
            ];
            enc.encode(cum[s], cum[s + 1], cum[4]).unwrap();
            counts[s] += 1;
        }
        let bytes = enc.finish().unwrap();

        let mut counts = [1u64; 4];
        let mut dec = ArithDecoder::new(BitReader::new(&bytes[..])).unwrap();
        for &expected in &symbols {
            let cum = [
                0,
                counts[0],
                counts[0] + counts[1],
                counts[0] + counts[1] + counts[2],
                counts.iter().sum::<u64>(),
            ];
            let got = dec.decode(cum[4], |t| locate(&cum, t)).unwrap();
            assert_eq!(got as usize, expected);
            counts[got as usize] += 1;
        }
    }

    #[test]
    fn test_single_symbol_stream() {
        roundtrip_static(&[2], &[0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_rejects_empty_interval() {
        let mut enc = ArithEncoder::new(BitWriter::new(Vec::new()));
        assert!(enc.encode(3, 3, 10).is_err());
        assert!(enc.encode(0, 11, 10).is_err());
    }
}
