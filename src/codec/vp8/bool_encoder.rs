//! Boolean arithmetic encoder for VP8
//!
//! The boolean arithmetic coder is the core entropy coding mechanism in VP8.
//! Every symbol in the compressed data is encoded through this mechanism.
//! This is the inverse operation of the BoolDecoder.

/// VP8 Boolean arithmetic encoder
///
/// `low` holds the bottom of the coding interval with 24 bits of headroom;
/// `count` is the number of shifts left before the next byte is complete
/// (negative while fewer than 8 bits are pending). Carries out of `low`
/// are propagated backwards through the bytes already emitted.
pub struct Vp8BoolEncoder {
    /// Low bound of the current interval
    low: u32,
    /// Range of the current interval, kept in [128, 255] between calls
    range: u32,
    /// Shift counter; a byte is emitted whenever it becomes non-negative
    count: i32,
    /// Output buffer
    buffer: Vec<u8>,
}

impl Vp8BoolEncoder {
    /// Create a new encoder
    pub fn new() -> Self {
        Self::with_capacity(4096)
    }

    /// Create encoder with pre-allocated capacity
    pub fn with_capacity(capacity: usize) -> Self {
        Vp8BoolEncoder {
            low: 0,
            range: 255,
            count: -24,
            buffer: Vec::with_capacity(capacity),
        }
    }

    /// Encode a single boolean with given probability
    /// prob is the probability that the bit is 0 (prob/256)
    #[inline]
    pub fn encode_bool(&mut self, bit: bool, prob: u8) {
        let split = 1 + (((self.range - 1) * prob as u32) >> 8);

        let mut low = self.low;
        let mut range = if bit {
            low += split;
            self.range - split
        } else {
            split
        };

        let mut shift = range.leading_zeros() as i32 - 24;
        range <<= shift;
        let mut count = self.count + shift;

        if count >= 0 {
            let offset = shift - count;

            if (low << (offset - 1)) & 0x8000_0000 != 0 {
                self.propagate_carry();
            }

            self.buffer.push((low >> (24 - offset)) as u8);
            low <<= offset;
            shift = count;
            low &= 0x00ff_ffff;
            count -= 8;
        }

        self.low = low << shift;
        self.count = count;
        self.range = range;
    }

    /// Add one to the bytes emitted so far
    fn propagate_carry(&mut self) {
        for byte in self.buffer.iter_mut().rev() {
            if *byte == 0xff {
                *byte = 0;
            } else {
                *byte += 1;
                break;
            }
        }
    }

    /// Encode a flag (probability 1/2)
    #[inline]
    pub fn encode_flag(&mut self, bit: bool) {
        self.encode_bool(bit, 128);
    }

    /// Encode an unsigned n-bit literal value, most significant bit first
    #[inline]
    pub fn encode_literal(&mut self, value: u32, n: u8) {
        for i in (0..n).rev() {
            let bit = ((value >> i) & 1) != 0;
            self.encode_bool(bit, 128);
        }
    }

    /// Encode an n-bit magnitude followed by a sign flag
    #[inline]
    pub fn encode_signed_literal(&mut self, value: i32, n: u8) {
        self.encode_literal(value.unsigned_abs(), n);
        self.encode_flag(value < 0);
    }

    /// Encode a signed value behind a presence flag (absent when zero)
    #[inline]
    pub fn encode_optional_signed(&mut self, value: i32, n: u8) {
        self.encode_flag(value != 0);
        if value != 0 {
            self.encode_signed_literal(value, n);
        }
    }

    /// Encode `value` with an explicit per-bit probability list, MSB first
    pub fn encode_literal_with_probs(&mut self, value: u32, probs: &[u8]) {
        let n = probs.len();
        for (i, &prob) in probs.iter().enumerate() {
            let bit = (value >> (n - 1 - i)) & 1 != 0;
            self.encode_bool(bit, prob);
        }
    }

    /// Encode a value using a probability tree
    pub fn encode_tree(&mut self, tree: &[i8], probs: &[u8], value: i8) {
        self.encode_tree_from(tree, probs, value, 0);
    }

    /// Encode a value using a probability tree, starting at node `start`
    pub fn encode_tree_from(&mut self, tree: &[i8], probs: &[u8], value: i8, start: usize) {
        let mut node = start;

        loop {
            let prob = probs[node >> 1];
            let left = tree[node];

            // Determine which branch leads to our value
            let in_left = if left <= 0 {
                -left == value
            } else {
                Self::tree_contains(tree, left as usize, value)
            };

            let bit = !in_left;
            self.encode_bool(bit, prob);

            let next = tree[node + bit as usize];
            if next <= 0 {
                break;
            }
            node = next as usize;
        }
    }

    /// Check if a subtree contains a value
    fn tree_contains(tree: &[i8], node: usize, value: i8) -> bool {
        tree[node..node + 2].iter().any(|&child| {
            if child <= 0 {
                -child == value
            } else {
                Self::tree_contains(tree, child as usize, value)
            }
        })
    }

    /// Flush the pending interval and close the encoder
    ///
    /// The output is padded to at least two bytes so it can always seed a
    /// decoder.
    pub fn finish(mut self) -> Vec<u8> {
        for _ in 0..32 {
            self.encode_bool(false, 128);
        }
        while self.buffer.len() < 2 {
            self.buffer.push(0);
        }
        self.buffer
    }

    /// Bytes emitted so far
    pub fn buffer(&self) -> &[u8] {
        &self.buffer
    }

    /// Get current output size estimate
    pub fn output_size(&self) -> usize {
        self.buffer.len() + 4
    }
}

impl Default for Vp8BoolEncoder {
    fn default() -> Self {
        Self::new()
    }
}
