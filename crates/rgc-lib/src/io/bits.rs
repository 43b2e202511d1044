//! Bit-level I/O over byte streams, MSB first within each byte.
//!
//! The arithmetic coder, the flipped-read sidecar and the bucket trie all
//! speak bits; these wrappers buffer them into whole bytes. `finish` pads the
//! final partial byte with zeros, so readers must know how many bits they
//! need rather than reading to EOF.

use std::io::{self, Read, Write};

pub struct BitWriter<W: Write> {
    inner: W,
    buf: u8,
    nbits: u8,
}

impl<W: Write> BitWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner, buf: 0, nbits: 0 }
    }

    #[inline(always)]
    pub fn write_bit(&mut self, bit: u8) -> io::Result<()> {
        self.buf = (self.buf << 1) | (bit & 1);
        self.nbits += 1;
        if self.nbits == 8 {
            self.inner.write_all(&[self.buf])?;
            self.buf = 0;
            self.nbits = 0;
        }
        Ok(())
    }

    /// Flushes the final partial byte (zero-padded) and returns the inner
    /// writer.
    pub fn finish(mut self) -> io::Result<W> {
        if self.nbits > 0 {
            self.buf <<= 8 - self.nbits;
            self.inner.write_all(&[self.buf])?;
        }
        self.inner.flush()?;
        Ok(self.inner)
    }
}

pub struct BitReader<R: Read> {
    inner: R,
    buf: u8,
    nbits: u8,
}

impl<R: Read> BitReader<R> {
    pub fn new(inner: R) -> Self {
        Self { inner, buf: 0, nbits: 0 }
    }

    /// Reads the next bit, or `None` at end of stream.
    #[inline(always)]
    pub fn read_bit(&mut self) -> io::Result<Option<u8>> {
        if self.nbits == 0 {
            let mut byte = [0u8; 1];
            loop {
                match self.inner.read(&mut byte) {
                    Ok(0) => return Ok(None),
                    Ok(_) => break,
                    Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                    Err(e) => return Err(e),
                }
            }
            self.buf = byte[0];
            self.nbits = 8;
        }
        self.nbits -= 1;
        Ok(Some((self.buf >> self.nbits) & 1))
    }
}
