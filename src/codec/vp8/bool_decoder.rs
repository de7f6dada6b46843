//! Boolean arithmetic decoder for VP8
//!
//! The boolean arithmetic coder is the core entropy coding mechanism in VP8.
//! Every symbol in the compressed data is decoded through this mechanism.

use crate::error::{Error, Result};

/// Bytes the decoder may read past the end of its partition before the
/// stream is considered truncated. The encoder's flush covers the tail, so
/// a valid partition never needs more than this.
const MAX_OVERRUN_BYTES: usize = 2;

/// Boolean arithmetic decoder state
#[derive(Debug)]
pub struct BoolDecoder<'a> {
    data: &'a [u8],
    pos: usize,
    value: u32,
    range: u32,
    bit_count: i32,
    overrun: usize,
}

impl<'a> BoolDecoder<'a> {
    /// Initialize decoder from a partition; at least two bytes are required
    pub fn new(data: &'a [u8]) -> Result<Self> {
        if data.len() < 2 {
            return Err(Error::malformed(format!(
                "bool decoder needs at least 2 bytes, got {}",
                data.len()
            )));
        }

        Ok(BoolDecoder {
            data,
            pos: 2,
            value: ((data[0] as u32) << 8) | data[1] as u32,
            range: 255,
            bit_count: 0,
            overrun: 0,
        })
    }

    /// Read a single boolean with given probability
    /// prob = probability of 0 (prob/256 is actual probability)
    #[inline]
    pub fn read_bool(&mut self, prob: u8) -> bool {
        let split = 1 + (((self.range - 1) * prob as u32) >> 8);
        let split_shifted = split << 8;

        let bit = if self.value >= split_shifted {
            self.range -= split;
            self.value -= split_shifted;
            true
        } else {
            self.range = split;
            false
        };

        // Normalize (shift until range >= 128)
        while self.range < 128 {
            self.value <<= 1;
            self.range <<= 1;
            self.bit_count += 1;

            if self.bit_count == 8 {
                self.bit_count = 0;
                match self.data.get(self.pos) {
                    Some(&byte) => self.value |= byte as u32,
                    None => self.overrun += 1,
                }
                self.pos += 1;
            }
        }

        bit
    }

    /// Read a flag (probability 1/2)
    #[inline]
    pub fn read_flag(&mut self) -> bool {
        self.read_bool(128)
    }

    /// Read an unsigned n-bit literal value, most significant bit first
    #[inline]
    pub fn read_literal(&mut self, n: u8) -> u32 {
        let mut value = 0u32;
        for _ in 0..n {
            value = (value << 1) | (self.read_bool(128) as u32);
        }
        value
    }

    /// Read an n-bit magnitude followed by a sign flag
    #[inline]
    pub fn read_signed_literal(&mut self, n: u8) -> i32 {
        let value = self.read_literal(n) as i32;
        if self.read_flag() {
            -value
        } else {
            value
        }
    }

    /// Read a signed value that is present only when a leading flag is set
    #[inline]
    pub fn read_optional_signed(&mut self, n: u8) -> i32 {
        if self.read_flag() {
            self.read_signed_literal(n)
        } else {
            0
        }
    }

    /// Read a value using a probability tree
    #[inline]
    pub fn read_tree(&mut self, tree: &[i8], probs: &[u8]) -> i8 {
        self.read_tree_from(tree, probs, 0)
    }

    /// Read a value using a probability tree, starting at node `start`
    pub fn read_tree_from(&mut self, tree: &[i8], probs: &[u8], start: usize) -> i8 {
        let mut node = start;
        loop {
            let prob = probs[node >> 1];
            let bit = self.read_bool(prob) as usize;
            let next = tree[node + bit];
            if next <= 0 {
                return -next;
            }
            node = next as usize;
        }
    }

    /// Fail if decoding ran further past the end of the partition than a
    /// well-formed stream ever does
    pub fn check(&self, what: &str) -> Result<()> {
        if self.overrun > MAX_OVERRUN_BYTES {
            return Err(Error::malformed(format!(
                "{} truncated: read {} bytes past end of partition",
                what, self.overrun
            )));
        }
        Ok(())
    }

    /// Check if we've consumed all data
    pub fn is_exhausted(&self) -> bool {
        self.pos >= self.data.len()
    }

    /// Get current position in bytes
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Get remaining bytes
    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.pos)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bool_decoder_creation() {
        let data = [0x9D, 0x01, 0x2A, 0x00, 0x00];
        let decoder = BoolDecoder::new(&data).unwrap();
        assert_eq!(decoder.position(), 2);
        assert_eq!(decoder.remaining(), 3);
    }

    #[test]
    fn test_rejects_short_input() {
        assert!(BoolDecoder::new(&[]).unwrap_err().is_malformed());
        assert!(BoolDecoder::new(&[0x12]).unwrap_err().is_malformed());
    }

    #[test]
    fn test_zero_input_reads_zeros() {
        let data = [0x00; 8];
        let mut decoder = BoolDecoder::new(&data).unwrap();
        for _ in 0..16 {
            assert!(!decoder.read_bool(128));
        }
        assert_eq!(decoder.read_literal(7), 0);
        assert!(decoder.check("test").is_ok());
    }

    #[test]
    fn test_overrun_detected() {
        let data = [0xA5, 0x5A];
        let mut decoder = BoolDecoder::new(&data).unwrap();
        for _ in 0..64 {
            decoder.read_flag();
        }
        assert!(decoder.is_exhausted());
        assert!(decoder.check("partition").unwrap_err().is_malformed());
    }
}
