//! VP8 entropy coding - coefficient decoding
//!
//! This module implements the coefficient token decoding used for
//! DCT coefficients in VP8, and the probability tables it draws from.

use super::bool_decoder::BoolDecoder;
use super::tables::{
    CoeffProbTable, CAT1_PROB, CAT2_PROB, CAT3_PROB, CAT4_PROB, CAT5_PROB, CAT6_PROB, CAT_BASE,
    COEFF_BANDS, COEFF_TOKEN_TREE, COEFF_UPDATE_PROBS, DEFAULT_COEFF_PROBS, NUM_BLOCK_TYPES,
    NUM_COEFF_BANDS, NUM_ENTROPY_NODES, NUM_PREV_COEFF_CONTEXTS, ZIGZAG_SCAN,
};

/// Block type of luma blocks whose DC lives in the Y2 block
pub const BLOCK_TYPE_Y_NO_DC: usize = 0;
/// Block type of the Y2 block
pub const BLOCK_TYPE_Y2: usize = 1;
/// Block type of chroma blocks
pub const BLOCK_TYPE_UV: usize = 2;
/// Block type of luma blocks carrying their own DC (B_PRED macroblocks)
pub const BLOCK_TYPE_Y_WITH_DC: usize = 3;

/// Tree node to resume from after a zero token (EOB cannot follow a zero)
pub const NODE_AFTER_ZERO: usize = 2;

/// Probabilities for one block type, `[band][ctx][node]`
pub type BandProbs = [[[u8; NUM_ENTROPY_NODES]; NUM_PREV_COEFF_CONTEXTS]; NUM_COEFF_BANDS];

/// DCT coefficient token values
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Token {
    DctEob = 0,   // End of block
    Dct0 = 1,     // Zero
    Dct1 = 2,     // +1 or -1
    Dct2 = 3,     // +2 or -2
    Dct3 = 4,     // +3 or -3
    Dct4 = 5,     // +4 or -4
    DctCat1 = 6,  // 5-6 (1 extra bit)
    DctCat2 = 7,  // 7-10 (2 extra bits)
    DctCat3 = 8,  // 11-18 (3 extra bits)
    DctCat4 = 9,  // 19-34 (4 extra bits)
    DctCat5 = 10, // 35-66 (5 extra bits)
    DctCat6 = 11, // 67-2048 (11 extra bits)
}

impl Token {
    pub(crate) fn from_u8(val: u8) -> Self {
        match val {
            1 => Token::Dct0,
            2 => Token::Dct1,
            3 => Token::Dct2,
            4 => Token::Dct3,
            5 => Token::Dct4,
            6 => Token::DctCat1,
            7 => Token::DctCat2,
            8 => Token::DctCat3,
            9 => Token::DctCat4,
            10 => Token::DctCat5,
            11 => Token::DctCat6,
            _ => Token::DctEob,
        }
    }

    /// Base magnitude and extra-bit probabilities of a category token
    pub(crate) fn category(self) -> Option<(i32, &'static [u8])> {
        match self {
            Token::DctCat1 => Some((CAT_BASE[0], &CAT1_PROB)),
            Token::DctCat2 => Some((CAT_BASE[1], &CAT2_PROB)),
            Token::DctCat3 => Some((CAT_BASE[2], &CAT3_PROB)),
            Token::DctCat4 => Some((CAT_BASE[3], &CAT4_PROB)),
            Token::DctCat5 => Some((CAT_BASE[4], &CAT5_PROB)),
            Token::DctCat6 => Some((CAT_BASE[5], &CAT6_PROB)),
            _ => None,
        }
    }
}

/// Coefficient probabilities for the current frame
#[derive(Clone, PartialEq, Eq)]
pub struct CoeffProbs {
    pub probs: CoeffProbTable,
}

impl Default for CoeffProbs {
    fn default() -> Self {
        CoeffProbs {
            probs: DEFAULT_COEFF_PROBS,
        }
    }
}

impl std::fmt::Debug for CoeffProbs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoeffProbs")
            .field("differs_from_default", &(self.probs != DEFAULT_COEFF_PROBS))
            .finish()
    }
}

impl CoeffProbs {
    /// Apply the header's probability updates; returns how many changed
    pub fn update(&mut self, bd: &mut BoolDecoder) -> usize {
        let mut updated = 0;
        for block_type in 0..NUM_BLOCK_TYPES {
            for band in 0..NUM_COEFF_BANDS {
                for ctx in 0..NUM_PREV_COEFF_CONTEXTS {
                    for node in 0..NUM_ENTROPY_NODES {
                        let update_prob = COEFF_UPDATE_PROBS[block_type][band][ctx][node];
                        if bd.read_bool(update_prob) {
                            self.probs[block_type][band][ctx][node] = bd.read_literal(8) as u8;
                            updated += 1;
                        }
                    }
                }
            }
        }
        updated
    }

    /// Probabilities of one block type
    #[inline]
    pub fn for_type(&self, block_type: usize) -> &BandProbs {
        &self.probs[block_type]
    }
}

/// First scan position coded for a block type
#[inline]
pub fn first_coeff(block_type: usize) -> usize {
    if block_type == BLOCK_TYPE_Y_NO_DC {
        1
    } else {
        0
    }
}

/// Context contributed by a just-coded magnitude
#[inline]
pub fn magnitude_context(magnitude: i32) -> usize {
    match magnitude {
        0 => 0,
        1 => 1,
        _ => 2,
    }
}

/// Read the magnitude carried by a non-EOB token
fn read_magnitude(bd: &mut BoolDecoder, token: Token) -> i32 {
    match token.category() {
        Some((base, probs)) => {
            let mut extra = 0i32;
            for &prob in probs {
                extra = (extra << 1) | bd.read_bool(prob) as i32;
            }
            base + extra
        }
        None => token as i32 - 1,
    }
}

/// Decode the coefficients of one 4x4 block
///
/// `ctx` is the initial context (above + left trackers). Coefficients are
/// written dequantized, in raster order. Returns whether any token other
/// than an immediate end-of-block was read, which is what the neighbouring
/// blocks' context is built from.
pub fn decode_block_coeffs(
    bd: &mut BoolDecoder,
    probs: &BandProbs,
    block_type: usize,
    ctx: usize,
    dc_quant: i32,
    ac_quant: i32,
    coeffs: &mut [i32; 16],
) -> bool {
    let mut ctx = ctx;
    let mut after_zero = false;
    let mut has_tokens = false;

    for i in first_coeff(block_type)..16 {
        let node_probs = &probs[COEFF_BANDS[i]][ctx];
        let start = if after_zero { NODE_AFTER_ZERO } else { 0 };
        let token = Token::from_u8(bd.read_tree_from(&COEFF_TOKEN_TREE, node_probs, start) as u8);

        match token {
            Token::DctEob => break,
            Token::Dct0 => {
                has_tokens = true;
                after_zero = true;
                ctx = 0;
                continue;
            }
            _ => {}
        }

        let magnitude = read_magnitude(bd, token);
        let value = if bd.read_flag() { -magnitude } else { magnitude };
        let step = if i == 0 { dc_quant } else { ac_quant };
        coeffs[ZIGZAG_SCAN[i]] = value * step;

        has_tokens = true;
        after_zero = false;
        ctx = magnitude_context(magnitude);
    }

    has_tokens
}

/// Check if a block has all zero coefficients
pub fn has_nonzero_coeffs(coeffs: &[i32; 16]) -> bool {
    coeffs.iter().any(|&c| c != 0)
}
