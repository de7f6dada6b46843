//! VP8 transform implementations (DCT and WHT)
//!
//! This module contains the 4x4 DCT (Discrete Cosine Transform) and
//! WHT (Walsh-Hadamard Transform) implementations used in VP8. All
//! arithmetic is integer; the inverse transforms are bit-exact with the
//! reference decoder, and the forward transforms are built as their
//! transposes so that reconstruction error stays within one level.

/// sqrt(2) * cos(pi/8) - 1 in 16-bit fixed point
const C1: i64 = 20091;
/// sqrt(2) * sin(pi/8) in 16-bit fixed point
const C2: i64 = 35468;

#[inline]
fn mul_c1(x: i32) -> i32 {
    ((x as i64 * C1) >> 16) as i32
}

#[inline]
fn mul_c2(x: i32) -> i32 {
    ((x as i64 * C2) >> 16) as i32
}

/// 4x4 Inverse DCT
///
/// Takes a 4x4 block of dequantized coefficients in raster order and
/// outputs a 4x4 block of residuals. Columns first, then rows, with a
/// final `(x + 4) >> 3`.
#[inline]
pub fn inverse_dct4x4(input: &[i32; 16], output: &mut [i32; 16]) {
    let mut temp = [0i32; 16];

    for j in 0..4 {
        let a = input[j];
        let b = input[4 + j];
        let c = input[8 + j];
        let d = input[12 + j];

        let a1 = a + c;
        let b1 = a - c;
        let c1 = mul_c2(b) - (d + mul_c1(d));
        let d1 = (b + mul_c1(b)) + mul_c2(d);

        temp[j] = a1 + d1;
        temp[4 + j] = b1 + c1;
        temp[8 + j] = b1 - c1;
        temp[12 + j] = a1 - d1;
    }

    for i in 0..4 {
        let row = i * 4;
        let a = temp[row];
        let b = temp[row + 1];
        let c = temp[row + 2];
        let d = temp[row + 3];

        let a1 = a + c;
        let b1 = a - c;
        let c1 = mul_c2(b) - (d + mul_c1(d));
        let d1 = (b + mul_c1(b)) + mul_c2(d);

        output[row] = (a1 + d1 + 4) >> 3;
        output[row + 1] = (b1 + c1 + 4) >> 3;
        output[row + 2] = (b1 - c1 + 4) >> 3;
        output[row + 3] = (a1 - d1 + 4) >> 3;
    }
}

/// Simplified IDCT for DC-only blocks
#[inline]
pub fn inverse_dct4x4_dc_only(dc: i32, output: &mut [i32; 16]) {
    output.fill((dc + 4) >> 3);
}

/// 4x4 Inverse Walsh-Hadamard Transform
///
/// Turns the dequantized Y2 block into the DC coefficients of the 16 luma
/// sub-blocks (output index = sub-block index).
#[inline]
pub fn inverse_wht4x4(input: &[i32; 16], output: &mut [i32; 16]) {
    let mut temp = [0i32; 16];

    for j in 0..4 {
        let a1 = input[j] + input[12 + j];
        let b1 = input[4 + j] + input[8 + j];
        let c1 = input[4 + j] - input[8 + j];
        let d1 = input[j] - input[12 + j];

        temp[j] = a1 + b1;
        temp[4 + j] = c1 + d1;
        temp[8 + j] = a1 - b1;
        temp[12 + j] = d1 - c1;
    }

    for i in 0..4 {
        let row = i * 4;
        let a1 = temp[row] + temp[row + 3];
        let b1 = temp[row + 1] + temp[row + 2];
        let c1 = temp[row + 1] - temp[row + 2];
        let d1 = temp[row] - temp[row + 3];

        output[row] = (a1 + b1 + 3) >> 3;
        output[row + 1] = (c1 + d1 + 3) >> 3;
        output[row + 2] = (a1 - b1 + 3) >> 3;
        output[row + 3] = (d1 - c1 + 3) >> 3;
    }
}

/// One forward DCT butterfly, scaled by 2^16
#[inline]
fn fdct_1d(x0: i64, x1: i64, x2: i64, x3: i64) -> [i64; 4] {
    const ONE: i64 = 1 << 16;
    const K1: i64 = ONE + C1;
    const K2: i64 = C2;

    let a = x0 + x3;
    let d = x0 - x3;
    let b = x1 + x2;
    let c = x1 - x2;

    [ONE * (a + b), K1 * d + K2 * c, ONE * (a - b), K2 * d - K1 * c]
}

/// 4x4 Forward DCT (for encoder)
///
/// The transpose of [`inverse_dct4x4`] evaluated at full precision and
/// rounded once with `(+1) >> 1`. Constant blocks map to a lone DC of
/// `8 * value` and reconstruct exactly.
pub fn forward_dct4x4(input: &[i32; 16], output: &mut [i32; 16]) {
    let mut temp = [0i64; 16];

    for i in 0..4 {
        let row = i * 4;
        let out = fdct_1d(
            input[row] as i64,
            input[row + 1] as i64,
            input[row + 2] as i64,
            input[row + 3] as i64,
        );
        temp[row..row + 4].copy_from_slice(&out);
    }

    for j in 0..4 {
        let out = fdct_1d(temp[j], temp[4 + j], temp[8 + j], temp[12 + j]);
        for (k, &v) in out.iter().enumerate() {
            // Scaled by 2^32; the extra bit is the (+1) >> 1 rounding
            output[k * 4 + j] = ((v + (1i64 << 32)) >> 33) as i32;
        }
    }
}

/// DC coefficient of a residual block, identical to `forward_dct4x4(x)[0]`
#[inline]
pub fn dc_of(input: &[i32; 16]) -> i32 {
    (input.iter().sum::<i32>() + 1) >> 1
}

/// One Walsh-Hadamard butterfly
#[inline]
fn wht_1d(i0: i32, i1: i32, i2: i32, i3: i32) -> [i32; 4] {
    let a1 = i0 + i3;
    let b1 = i1 + i2;
    let c1 = i1 - i2;
    let d1 = i0 - i3;
    [a1 + b1, c1 + d1, a1 - b1, d1 - c1]
}

/// 4x4 Forward Walsh-Hadamard Transform (for encoder)
///
/// The butterfly matrix is its own inverse up to a factor of 4, so the
/// unrounded product is exactly `16 * input` after the inverse. Halving it
/// is exact when the products are even (they share one parity); odd
/// products are nudged by a fixed +/-1 pattern whose inverse image stays
/// inside the `(+3) >> 3` rounding window, which makes the pair lossless.
pub fn forward_wht4x4(input: &[i32; 16], output: &mut [i32; 16]) {
    let mut temp = [0i32; 16];

    for i in 0..4 {
        let row = i * 4;
        let out = wht_1d(input[row], input[row + 1], input[row + 2], input[row + 3]);
        temp[row..row + 4].copy_from_slice(&out);
    }

    for j in 0..4 {
        let out = wht_1d(temp[j], temp[4 + j], temp[8 + j], temp[12 + j]);
        for (k, &v) in out.iter().enumerate() {
            output[k * 4 + j] = v;
        }
    }

    if output[0] & 1 != 0 {
        for (idx, v) in output.iter_mut().enumerate() {
            let (row, col) = (idx / 4, idx % 4);
            let nudge = if (row == 3) != (col == 3) { -1 } else { 1 };
            *v = (*v + nudge) >> 1;
        }
    } else {
        for v in output.iter_mut() {
            *v >>= 1;
        }
    }
}

/// Add a residual block to a 4x4 prediction in place, clamping to [0, 255]
#[inline]
pub fn add_residual_inplace(output: &mut [u8], stride: usize, residual: &[i32; 16]) {
    for y in 0..4 {
        for x in 0..4 {
            let idx = y * stride + x;
            output[idx] = (output[idx] as i32 + residual[y * 4 + x]).clamp(0, 255) as u8;
        }
    }
}

/// Inverse transform dequantized coefficients and add them to a 4x4
/// prediction in place
///
/// All-zero blocks are left untouched and DC-only blocks take the flat
/// shortcut, which produces the same pixels as the full transform.
pub fn add_inverse_dct(output: &mut [u8], stride: usize, coeffs: &[i32; 16]) {
    if coeffs.iter().all(|&c| c == 0) {
        return;
    }
    let mut residual = [0i32; 16];
    if coeffs[1..].iter().all(|&c| c == 0) {
        inverse_dct4x4_dc_only(coeffs[0], &mut residual);
    } else {
        inverse_dct4x4(coeffs, &mut residual);
    }
    add_residual_inplace(output, stride, &residual);
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Lcg(u64);

    impl Lcg {
        fn next_in(&mut self, lo: i32, hi: i32) -> i32 {
            self.0 = self
                .0
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            lo + ((self.0 >> 33) % (hi - lo + 1) as u64) as i32
        }
    }

    #[test]
    fn test_idct_dc_only() {
        let mut input = [0i32; 16];
        input[0] = 80;
        let mut full = [0i32; 16];
        inverse_dct4x4(&input, &mut full);

        let mut simple = [0i32; 16];
        inverse_dct4x4_dc_only(80, &mut simple);

        assert_eq!(full, simple);
        assert!(full.iter().all(|&v| v == 10));
    }

    #[test]
    fn test_constant_blocks_exact() {
        for value in -255..=255 {
            let block = [value; 16];
            let mut coeffs = [0i32; 16];
            forward_dct4x4(&block, &mut coeffs);
            assert_eq!(coeffs[0], 8 * value);
            assert!(coeffs[1..].iter().all(|&c| c == 0));
            assert_eq!(dc_of(&block), coeffs[0]);

            let mut recon = [0i32; 16];
            inverse_dct4x4(&coeffs, &mut recon);
            assert_eq!(recon, block);
        }
    }

    /// VP8's fixed-point DCT pair is not an exact inverse: the 20091/35468
    /// multipliers and the output rounding leave up to one unit of error
    #[test]
    fn test_dct_roundtrip_within_one() {
        let mut rng = Lcg(42);
        for _ in 0..20_000 {
            let mut block = [0i32; 16];
            for v in block.iter_mut() {
                *v = rng.next_in(-2048, 2047);
            }
            let mut coeffs = [0i32; 16];
            forward_dct4x4(&block, &mut coeffs);
            let mut recon = [0i32; 16];
            inverse_dct4x4(&coeffs, &mut recon);

            for i in 0..16 {
                assert!(
                    (recon[i] - block[i]).abs() <= 1,
                    "{:?} -> {:?}",
                    block,
                    recon
                );
            }
        }
    }

    #[test]
    fn test_dc_of_matches_forward_dct() {
        let mut rng = Lcg(9);
        for _ in 0..1000 {
            let mut block = [0i32; 16];
            for v in block.iter_mut() {
                *v = rng.next_in(-255, 255);
            }
            let mut coeffs = [0i32; 16];
            forward_dct4x4(&block, &mut coeffs);
            assert_eq!(dc_of(&block), coeffs[0]);
        }
    }

    #[test]
    fn test_wht_roundtrip_exact() {
        let mut rng = Lcg(1234);
        for _ in 0..20_000 {
            let mut block = [0i32; 16];
            for v in block.iter_mut() {
                *v = rng.next_in(-2048, 2047);
            }
            let mut coeffs = [0i32; 16];
            forward_wht4x4(&block, &mut coeffs);
            let mut recon = [0i32; 16];
            inverse_wht4x4(&coeffs, &mut recon);
            assert_eq!(recon, block);
        }
    }

    #[test]
    fn test_wht_constant_dc() {
        let block = [24i32; 16];
        let mut coeffs = [0i32; 16];
        forward_wht4x4(&block, &mut coeffs);
        assert_eq!(coeffs[0], 24 * 8);
        assert!(coeffs[1..].iter().all(|&c| c == 0));
    }

    #[test]
    fn test_add_residual() {
        let mut pixels = [250u8; 4 * 8];
        let mut residual = [0i32; 16];
        residual[0] = 10;
        residual[5] = -300;
        residual[15] = 3;
        add_residual_inplace(&mut pixels, 8, &residual);

        assert_eq!(pixels[0], 255);
        assert_eq!(pixels[8 + 1], 0);
        assert_eq!(pixels[3 * 8 + 3], 253);
        assert_eq!(pixels[4], 250);
    }

    #[test]
    fn test_add_inverse_dct_shortcuts() {
        let mut untouched = [77u8; 16];
        add_inverse_dct(&mut untouched, 4, &[0; 16]);
        assert!(untouched.iter().all(|&p| p == 77));

        let mut coeffs = [0i32; 16];
        coeffs[0] = 44;
        let mut flat = [100u8; 16];
        add_inverse_dct(&mut flat, 4, &coeffs);
        let mut full = [0i32; 16];
        inverse_dct4x4(&coeffs, &mut full);
        for (p, r) in flat.iter().zip(full.iter()) {
            assert_eq!(*p as i32, 100 + r);
        }
    }
}
