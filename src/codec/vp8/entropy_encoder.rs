//! VP8 entropy coding - coefficient encoding
//!
//! This module implements the coefficient token encoding used for
//! DCT coefficients in VP8. It is the inverse of the decoder in entropy.rs.
//!
//! Tokenization is written once against [`TokenWriter`]; the same walk
//! either emits bits into a [`Vp8BoolEncoder`] or counts tree branches so
//! the frame header can carry better probabilities.

use super::bool_encoder::Vp8BoolEncoder;
use super::entropy::{
    first_coeff, magnitude_context, BandProbs, CoeffProbs, Token, NODE_AFTER_ZERO,
};
use super::tables::{
    COEFF_BANDS, COEFF_TOKEN_TREE, COEFF_UPDATE_PROBS, MAX_COEFF_MAGNITUDE, NUM_BLOCK_TYPES,
    NUM_COEFF_BANDS, NUM_ENTROPY_NODES, NUM_PREV_COEFF_CONTEXTS, ZIGZAG_SCAN,
};

/// Cost in bits of writing a probability literal in the header
const UPDATE_LITERAL_BITS: f64 = 8.0;

impl Token {
    /// Determine the token for a given coefficient magnitude
    pub fn from_magnitude(abs_value: i32) -> Self {
        match abs_value {
            0 => Token::Dct0,
            1 => Token::Dct1,
            2 => Token::Dct2,
            3 => Token::Dct3,
            4 => Token::Dct4,
            5..=6 => Token::DctCat1,
            7..=10 => Token::DctCat2,
            11..=18 => Token::DctCat3,
            19..=34 => Token::DctCat4,
            35..=66 => Token::DctCat5,
            _ => Token::DctCat6,
        }
    }
}

/// Sink for the bits of a tokenized block
pub trait TokenWriter {
    /// A branch of the token tree; `node` indexes the probabilities of the
    /// (band, ctx) slot
    fn tree_bit(&mut self, band: usize, ctx: usize, node: usize, bit: bool);

    /// A bit with a fixed probability (category extra bits and signs)
    fn fixed_bit(&mut self, bit: bool, prob: u8);
}

/// Writes tokens of one block type into a bool encoder
pub struct BoolTokenWriter<'a> {
    encoder: &'a mut Vp8BoolEncoder,
    probs: &'a BandProbs,
}

impl<'a> BoolTokenWriter<'a> {
    pub fn new(encoder: &'a mut Vp8BoolEncoder, probs: &'a BandProbs) -> Self {
        BoolTokenWriter { encoder, probs }
    }
}

impl TokenWriter for BoolTokenWriter<'_> {
    #[inline]
    fn tree_bit(&mut self, band: usize, ctx: usize, node: usize, bit: bool) {
        self.encoder.encode_bool(bit, self.probs[band][ctx][node]);
    }

    #[inline]
    fn fixed_bit(&mut self, bit: bool, prob: u8) {
        self.encoder.encode_bool(bit, prob);
    }
}

/// Branch counts `[type][band][ctx][node][bit]`
pub type BranchCounts = [[[[[u32; 2]; NUM_ENTROPY_NODES]; NUM_PREV_COEFF_CONTEXTS];
    NUM_COEFF_BANDS]; NUM_BLOCK_TYPES];

/// Token statistics gathered over a frame
pub struct TokenStats {
    counts: Box<BranchCounts>,
}

impl Default for TokenStats {
    fn default() -> Self {
        TokenStats {
            counts: Box::new([[[[[0; 2]; NUM_ENTROPY_NODES]; NUM_PREV_COEFF_CONTEXTS];
                NUM_COEFF_BANDS]; NUM_BLOCK_TYPES]),
        }
    }
}

impl TokenStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the tokens of one block
    pub fn record_block(&mut self, block_type: usize, ctx: usize, levels: &[i32; 16]) -> bool {
        let mut counter = StatsWriter {
            counts: &mut self.counts[block_type],
        };
        write_block_tokens(&mut counter, block_type, ctx, levels)
    }

    /// Count of `(false, true)` branches taken at a tree node
    pub fn branch(&self, block_type: usize, band: usize, ctx: usize, node: usize) -> (u32, u32) {
        let c = self.counts[block_type][band][ctx][node];
        (c[0], c[1])
    }

    /// Choose the probabilities to signal for the next frame
    ///
    /// An entry is replaced only when the bits saved on this frame's tokens
    /// outweigh the cost of signalling the update.
    pub fn optimize(&self, current: &CoeffProbs) -> CoeffProbs {
        let mut planned = current.clone();
        for t in 0..NUM_BLOCK_TYPES {
            for b in 0..NUM_COEFF_BANDS {
                for c in 0..NUM_PREV_COEFF_CONTEXTS {
                    for n in 0..NUM_ENTROPY_NODES {
                        let [n0, n1] = self.counts[t][b][c][n];
                        let total = n0 as u64 + n1 as u64;
                        if total == 0 {
                            continue;
                        }
                        let old = current.probs[t][b][c][n];
                        let new = ((n0 as u64 * 256 + total / 2) / total).clamp(1, 255) as u8;
                        if new == old {
                            continue;
                        }

                        let upd = COEFF_UPDATE_PROBS[t][b][c][n];
                        let savings = branch_cost(old, n0, n1) - branch_cost(new, n0, n1)
                            - UPDATE_LITERAL_BITS
                            - (bit_cost(upd, true) - bit_cost(upd, false));
                        if savings > 0.0 {
                            planned.probs[t][b][c][n] = new;
                        }
                    }
                }
            }
        }
        planned
    }
}

struct StatsWriter<'a> {
    counts: &'a mut [[[[u32; 2]; NUM_ENTROPY_NODES]; NUM_PREV_COEFF_CONTEXTS]; NUM_COEFF_BANDS],
}

impl TokenWriter for StatsWriter<'_> {
    #[inline]
    fn tree_bit(&mut self, band: usize, ctx: usize, node: usize, bit: bool) {
        self.counts[band][ctx][node][bit as usize] += 1;
    }

    #[inline]
    fn fixed_bit(&mut self, _bit: bool, _prob: u8) {}
}

/// Approximate cost in bits of one boolean
fn bit_cost(prob: u8, bit: bool) -> f64 {
    let p = prob.max(1) as f64 / 256.0;
    if bit {
        -(1.0 - p).max(1.0 / 256.0).log2()
    } else {
        -p.log2()
    }
}

fn branch_cost(prob: u8, n0: u32, n1: u32) -> f64 {
    n0 as f64 * bit_cost(prob, false) + n1 as f64 * bit_cost(prob, true)
}

/// Whether the subtree rooted at `child` holds the leaf `value`
fn subtree_holds(child: i8, value: i8) -> bool {
    if child <= 0 {
        return -child == value;
    }
    let node = child as usize;
    subtree_holds(COEFF_TOKEN_TREE[node], value) || subtree_holds(COEFF_TOKEN_TREE[node + 1], value)
}

/// Walk the token tree from `start` down to `token`
fn write_token<W: TokenWriter>(w: &mut W, band: usize, ctx: usize, token: Token, start: usize) {
    let value = token as i8;
    let mut node = start;
    loop {
        let bit = !subtree_holds(COEFF_TOKEN_TREE[node], value);
        w.tree_bit(band, ctx, node >> 1, bit);
        let next = COEFF_TOKEN_TREE[node + bit as usize];
        if next <= 0 {
            break;
        }
        node = next as usize;
    }
}

/// Category extra bits, most significant first
fn write_extra_bits<W: TokenWriter>(w: &mut W, token: Token, magnitude: i32) {
    if let Some((base, probs)) = token.category() {
        let extra = magnitude - base;
        let n = probs.len();
        for (i, &prob) in probs.iter().enumerate() {
            w.fixed_bit((extra >> (n - 1 - i)) & 1 != 0, prob);
        }
    }
}

/// Tokenize one block of quantized levels (raster order)
///
/// Returns whether any token other than an immediate end-of-block was
/// produced, matching what the decoder reports for the same block.
pub fn write_block_tokens<W: TokenWriter>(
    w: &mut W,
    block_type: usize,
    ctx: usize,
    levels: &[i32; 16],
) -> bool {
    let first = first_coeff(block_type);
    let last = (first..16).rev().find(|&i| levels[ZIGZAG_SCAN[i]] != 0);

    let Some(last) = last else {
        write_token(w, COEFF_BANDS[first], ctx, Token::DctEob, 0);
        return false;
    };

    let mut ctx = ctx;
    let mut after_zero = false;
    for i in first..=last {
        let band = COEFF_BANDS[i];
        let start = if after_zero { NODE_AFTER_ZERO } else { 0 };
        let level = levels[ZIGZAG_SCAN[i]];
        let magnitude = level.abs().min(MAX_COEFF_MAGNITUDE);
        let token = Token::from_magnitude(magnitude);

        write_token(w, band, ctx, token, start);
        if magnitude != 0 {
            write_extra_bits(w, token, magnitude);
            w.fixed_bit(level < 0, 128);
        }

        after_zero = magnitude == 0;
        ctx = magnitude_context(magnitude);
    }

    if last < 15 {
        write_token(w, COEFF_BANDS[last + 1], ctx, Token::DctEob, 0);
    }
    true
}

/// Encode DCT coefficients for a 4x4 block
pub fn encode_block_coeffs(
    encoder: &mut Vp8BoolEncoder,
    probs: &CoeffProbs,
    block_type: usize,
    ctx: usize,
    levels: &[i32; 16],
) -> bool {
    let mut writer = BoolTokenWriter::new(encoder, probs.for_type(block_type));
    write_block_tokens(&mut writer, block_type, ctx, levels)
}

/// Write the header's coefficient probability updates, moving `current`
/// to `planned`
pub fn encode_coeff_updates(
    encoder: &mut Vp8BoolEncoder,
    current: &mut CoeffProbs,
    planned: &CoeffProbs,
) -> usize {
    let mut updated = 0;
    for t in 0..NUM_BLOCK_TYPES {
        for b in 0..NUM_COEFF_BANDS {
            for c in 0..NUM_PREV_COEFF_CONTEXTS {
                for n in 0..NUM_ENTROPY_NODES {
                    let new = planned.probs[t][b][c][n];
                    let update = new != current.probs[t][b][c][n];
                    encoder.encode_bool(update, COEFF_UPDATE_PROBS[t][b][c][n]);
                    if update {
                        encoder.encode_literal(new as u32, 8);
                        current.probs[t][b][c][n] = new;
                        updated += 1;
                    }
                }
            }
        }
    }
    updated
}

/// Check if all coefficients in a block are zero
pub fn is_zero_block(levels: &[i32; 16]) -> bool {
    levels.iter().all(|&c| c == 0)
}
