//! VP8 quantization and dequantization
//!
//! This module contains quantization lookup tables and functions for
//! converting between quantized and unquantized DCT coefficients.

use super::tables::MAX_COEFF_MAGNITUDE;

/// DC quantizer step lookup table (qi 0-127)
pub const DC_QUANT: [i32; 128] = [
    4, 5, 6, 7, 8, 9, 10, 10, 11, 12, 13, 14, 15, 16, 17, 17, 18, 19, 20, 20, 21, 21, 22, 22, 23,
    23, 24, 25, 25, 26, 27, 28, 29, 30, 31, 32, 33, 34, 35, 36, 37, 37, 38, 39, 40, 41, 42, 43, 44,
    45, 46, 46, 47, 48, 49, 50, 51, 52, 53, 54, 55, 56, 57, 58, 59, 60, 61, 62, 63, 64, 65, 66, 67,
    68, 69, 70, 71, 72, 73, 74, 75, 76, 76, 77, 78, 79, 80, 81, 82, 83, 84, 85, 86, 87, 88, 89, 91,
    93, 95, 96, 98, 100, 101, 102, 104, 106, 108, 110, 112, 114, 116, 118, 122, 124, 126, 128, 130,
    132, 134, 136, 138, 140, 143, 145, 148, 151, 154, 157,
];

/// AC quantizer step lookup table (qi 0-127)
pub const AC_QUANT: [i32; 128] = [
    4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16, 17, 18, 19, 20, 21, 22, 23, 24, 25, 26, 27, 28,
    29, 30, 31, 32, 33, 34, 35, 36, 37, 38, 39, 40, 41, 42, 43, 44, 45, 46, 47, 48, 49, 50, 51, 52,
    53, 54, 55, 56, 57, 58, 60, 62, 64, 66, 68, 70, 72, 74, 76, 78, 80, 82, 84, 86, 88, 90, 92, 94,
    96, 98, 100, 102, 104, 106, 108, 110, 112, 114, 116, 119, 122, 125, 128, 131, 134, 137, 140,
    143, 146, 149, 152, 155, 158, 161, 164, 167, 170, 173, 177, 181, 185, 189, 193, 197, 201, 205,
    209, 213, 217, 221, 225, 229, 234, 239, 245, 249, 254, 259, 264, 269, 274, 279, 284,
];

/// Largest quantizer index
pub const MAX_QINDEX: i32 = 127;

/// Quantizer indices as carried in the frame header
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QuantIndices {
    /// Base index (luma AC)
    pub y_ac_qi: u8,
    pub y_dc_delta: i8,
    pub y2_dc_delta: i8,
    pub y2_ac_delta: i8,
    pub uv_dc_delta: i8,
    pub uv_ac_delta: i8,
}

impl QuantIndices {
    /// Indices with the given base and no deltas
    pub fn with_base(y_ac_qi: u8) -> Self {
        QuantIndices {
            y_ac_qi: y_ac_qi.min(MAX_QINDEX as u8),
            ..Default::default()
        }
    }
}

/// Quantizer step sizes for a frame
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QuantFactors {
    pub y_dc: i32,
    pub y_ac: i32,
    pub y2_dc: i32,
    pub y2_ac: i32,
    pub uv_dc: i32,
    pub uv_ac: i32,
}

impl QuantFactors {
    /// Get quantization factors from quantizer indices
    pub fn from_indices(indices: &QuantIndices) -> Self {
        let q = indices.y_ac_qi as i32;
        let qi = |delta: i8| -> usize { (q + delta as i32).clamp(0, MAX_QINDEX) as usize };

        QuantFactors {
            y_dc: DC_QUANT[qi(indices.y_dc_delta)],
            y_ac: AC_QUANT[qi(0)],
            y2_dc: DC_QUANT[qi(indices.y2_dc_delta)] * 2,
            y2_ac: (AC_QUANT[qi(indices.y2_ac_delta)] * 155 / 100).max(8),
            uv_dc: DC_QUANT[qi(indices.uv_dc_delta)].min(132),
            uv_ac: AC_QUANT[qi(indices.uv_ac_delta)],
        }
    }

    /// (DC, AC) step pair for a coefficient block type
    pub fn steps(&self, block_type: usize) -> (i32, i32) {
        match block_type {
            1 => (self.y2_dc, self.y2_ac),
            2 => (self.uv_dc, self.uv_ac),
            _ => (self.y_dc, self.y_ac),
        }
    }
}

/// Quantize one coefficient by rounded division
///
/// Levels are limited to the largest magnitude the token alphabet codes.
#[inline]
pub fn quantize(coeff: i32, step: i32) -> i32 {
    let magnitude = ((coeff.abs() + (step >> 1)) / step).min(MAX_COEFF_MAGNITUDE);
    if coeff < 0 {
        -magnitude
    } else {
        magnitude
    }
}

/// Quantize a 4x4 block of coefficients (for encoder)
#[inline]
pub fn quantize_block(coeffs: &[i32; 16], dc_quant: i32, ac_quant: i32) -> [i32; 16] {
    let mut output = [0i32; 16];
    output[0] = quantize(coeffs[0], dc_quant);
    for i in 1..16 {
        output[i] = quantize(coeffs[i], ac_quant);
    }
    output
}

/// Dequantize a 4x4 block of quantized coefficients
#[inline]
pub fn dequantize_block(levels: &[i32; 16], dc_quant: i32, ac_quant: i32) -> [i32; 16] {
    let mut output = [0i32; 16];
    output[0] = levels[0] * dc_quant;
    for i in 1..16 {
        output[i] = levels[i] * ac_quant;
    }
    output
}
