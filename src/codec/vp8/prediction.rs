//! VP8 intra and inter prediction
//!
//! Prediction works inside a small bordered workspace per macroblock: row 0
//! holds the pixels above (plus four above-right pixels for luma), column 0
//! holds the pixels to the left, and the interior receives the prediction
//! and, once residuals are added, the reconstruction. Frame-edge fallbacks
//! (127 above, 129 left) are written into the border once, so every mode
//! reads its neighbours the same way.
//!
//! - 16x16 and 8x8 intra prediction (DC, V, H, TM)
//! - 4x4 intra prediction (10 modes)
//! - Zero-motion inter prediction from the last frame

use super::tables::{IntraMode, SubBlockMode};

/// Stride of the luma workspace: left column, 16 pixels, 4 above-right
pub const LUMA_STRIDE: usize = 1 + 16 + 4;
/// Size of the luma workspace (border row plus 16 rows)
pub const LUMA_WORKSPACE: usize = LUMA_STRIDE * (1 + 16);
/// Stride of a chroma workspace
pub const CHROMA_STRIDE: usize = 1 + 8;
/// Size of a chroma workspace
pub const CHROMA_WORKSPACE: usize = CHROMA_STRIDE * (1 + 8);

/// Border value above the top frame edge
const ABOVE_EDGE: u8 = 127;
/// Border value left of the left frame edge
const LEFT_EDGE: u8 = 129;

/// Clamp to the 8-bit pixel range
#[inline]
pub fn clamp255(v: i32) -> u8 {
    v.clamp(0, 255) as u8
}

/// Two-tap rounded average
#[inline]
pub fn avg2(a: u8, b: u8) -> u8 {
    ((a as u16 + b as u16 + 1) >> 1) as u8
}

/// Three-tap (1, 2, 1) rounded average
#[inline]
pub fn avg3(a: u8, b: u8, c: u8) -> u8 {
    ((a as u16 + 2 * b as u16 + c as u16 + 2) >> 2) as u8
}

/// Fill the border of a luma workspace for the macroblock at (`mbx`, `mby`)
///
/// `plane` is the luma plane being reconstructed, so the rows above and the
/// column to the left already hold final pixels.
pub fn luma_workspace(
    plane: &[u8],
    stride: usize,
    mbx: usize,
    mby: usize,
    mb_cols: usize,
) -> [u8; LUMA_WORKSPACE] {
    let mut ws = [0u8; LUMA_WORKSPACE];
    let x0 = mbx * 16;
    let y0 = mby * 16;

    // The corner and above-right pixels read by the 4x4 modes take the
    // bitstream's 127/129 edge values rather than a flat 128
    if mby == 0 {
        ws[..LUMA_STRIDE].fill(ABOVE_EDGE);
    } else {
        let above = &plane[(y0 - 1) * stride..];
        ws[0] = if mbx == 0 { LEFT_EDGE } else { above[x0 - 1] };
        ws[1..17].copy_from_slice(&above[x0..x0 + 16]);
        if mbx + 1 == mb_cols {
            ws[17..LUMA_STRIDE].fill(above[x0 + 15]);
        } else {
            ws[17..LUMA_STRIDE].copy_from_slice(&above[x0 + 16..x0 + 20]);
        }
    }

    // Sub-blocks in the right column below the first row take their
    // above-right pixels from the row above the macroblock
    for row in [4, 8, 12] {
        let (top, rest) = ws.split_at_mut(row * LUMA_STRIDE);
        rest[17..LUMA_STRIDE].copy_from_slice(&top[17..LUMA_STRIDE]);
    }

    for y in 0..16 {
        ws[(y + 1) * LUMA_STRIDE] = if mbx == 0 {
            LEFT_EDGE
        } else {
            plane[(y0 + y) * stride + x0 - 1]
        };
    }

    ws
}

/// Fill the border of a chroma workspace for the macroblock at (`mbx`, `mby`)
pub fn chroma_workspace(
    plane: &[u8],
    stride: usize,
    mbx: usize,
    mby: usize,
) -> [u8; CHROMA_WORKSPACE] {
    let mut ws = [0u8; CHROMA_WORKSPACE];
    let x0 = mbx * 8;
    let y0 = mby * 8;

    if mby == 0 {
        ws[..CHROMA_STRIDE].fill(ABOVE_EDGE);
    } else {
        let above = &plane[(y0 - 1) * stride..];
        ws[0] = if mbx == 0 { LEFT_EDGE } else { above[x0 - 1] };
        ws[1..CHROMA_STRIDE].copy_from_slice(&above[x0..x0 + 8]);
    }

    for y in 0..8 {
        ws[(y + 1) * CHROMA_STRIDE] = if mbx == 0 {
            LEFT_EDGE
        } else {
            plane[(y0 + y) * stride + x0 - 1]
        };
    }

    ws
}

/// Whole-block intra prediction into the interior of a workspace
///
/// `size` is 16 for luma and 8 for chroma. `above_available` and
/// `left_available` only matter for DC; the other modes read the border,
/// which already carries the frame-edge constants.
pub fn predict_block(
    ws: &mut [u8],
    stride: usize,
    size: usize,
    mode: IntraMode,
    above_available: bool,
    left_available: bool,
) {
    match mode {
        IntraMode::Dc | IntraMode::BPred => {
            let shift = if size == 16 { 3 } else { 2 };
            let above_sum: u32 = ws[1..=size].iter().map(|&p| p as u32).sum();
            let left_sum: u32 = (1..=size).map(|y| ws[y * stride] as u32).sum();

            let dc = match (above_available, left_available) {
                (true, true) => (above_sum + left_sum + size as u32) >> (shift + 2),
                (true, false) => (above_sum + (size as u32 >> 1)) >> (shift + 1),
                (false, true) => (left_sum + (size as u32 >> 1)) >> (shift + 1),
                (false, false) => 128,
            } as u8;

            for y in 1..=size {
                ws[y * stride + 1..y * stride + 1 + size].fill(dc);
            }
        }
        IntraMode::V => {
            for y in 1..=size {
                let (top, rest) = ws.split_at_mut(y * stride);
                rest[1..=size].copy_from_slice(&top[1..=size]);
            }
        }
        IntraMode::H => {
            for y in 1..=size {
                let left = ws[y * stride];
                ws[y * stride + 1..y * stride + 1 + size].fill(left);
            }
        }
        IntraMode::Tm => {
            let corner = ws[0] as i32;
            for y in 1..=size {
                let left = ws[y * stride] as i32;
                for x in 1..=size {
                    let above = ws[x] as i32;
                    ws[y * stride + x] = clamp255(left + above - corner);
                }
            }
        }
    }
}

/// Offset of the top-left pixel of luma sub-block `index` in a workspace
#[inline]
pub fn subblock_offset(index: usize) -> usize {
    (1 + (index / 4) * 4) * LUMA_STRIDE + 1 + (index % 4) * 4
}

/// 4x4 intra prediction for the sub-block whose top-left pixel is at `base`
///
/// The edge is gathered as the left column bottom-up, the corner, then the
/// eight pixels above and above-right: `e[0..4]`, `e[4]`, `e[5..13]`.
pub fn predict_4x4(ws: &mut [u8], stride: usize, base: usize, mode: SubBlockMode) {
    let top = base - stride;
    let mut e = [0u8; 13];
    for i in 0..4 {
        e[3 - i] = ws[base + i * stride - 1];
    }
    e[4] = ws[top - 1];
    e[5..13].copy_from_slice(&ws[top..top + 8]);

    let a = |i: usize| e[5 + i];
    let l = |i: usize| e[3 - i];
    let p = e[4];

    let mut b = [[0u8; 4]; 4];

    match mode {
        SubBlockMode::Dc => {
            let sum: u32 = (0..4).map(|i| a(i) as u32 + l(i) as u32).sum();
            let dc = ((sum + 4) >> 3) as u8;
            b = [[dc; 4]; 4];
        }
        SubBlockMode::Tm => {
            for (r, row) in b.iter_mut().enumerate() {
                for (c, px) in row.iter_mut().enumerate() {
                    *px = clamp255(l(r) as i32 + a(c) as i32 - p as i32);
                }
            }
        }
        SubBlockMode::Ve => {
            let row = [
                avg3(p, a(0), a(1)),
                avg3(a(0), a(1), a(2)),
                avg3(a(1), a(2), a(3)),
                avg3(a(2), a(3), a(4)),
            ];
            b = [row; 4];
        }
        SubBlockMode::He => {
            let cols = [
                avg3(p, l(0), l(1)),
                avg3(l(0), l(1), l(2)),
                avg3(l(1), l(2), l(3)),
                avg3(l(2), l(3), l(3)),
            ];
            for (r, row) in b.iter_mut().enumerate() {
                *row = [cols[r]; 4];
            }
        }
        SubBlockMode::Ld => {
            // Anti-diagonals r + c share a value
            let d = [
                avg3(a(0), a(1), a(2)),
                avg3(a(1), a(2), a(3)),
                avg3(a(2), a(3), a(4)),
                avg3(a(3), a(4), a(5)),
                avg3(a(4), a(5), a(6)),
                avg3(a(5), a(6), a(7)),
                avg3(a(6), a(7), a(7)),
            ];
            for (r, row) in b.iter_mut().enumerate() {
                for (c, px) in row.iter_mut().enumerate() {
                    *px = d[r + c];
                }
            }
        }
        SubBlockMode::Rd => {
            // Diagonals c - r share a value
            let d = [
                avg3(e[0], e[1], e[2]),
                avg3(e[1], e[2], e[3]),
                avg3(e[2], e[3], e[4]),
                avg3(e[3], e[4], e[5]),
                avg3(e[4], e[5], e[6]),
                avg3(e[5], e[6], e[7]),
                avg3(e[6], e[7], e[8]),
            ];
            for (r, row) in b.iter_mut().enumerate() {
                for (c, px) in row.iter_mut().enumerate() {
                    *px = d[3 + c - r];
                }
            }
        }
        SubBlockMode::Vr => {
            b[3][0] = avg3(e[1], e[2], e[3]);
            b[2][0] = avg3(e[2], e[3], e[4]);
            b[3][1] = avg3(e[3], e[4], e[5]);
            b[1][0] = b[3][1];
            b[2][1] = avg2(e[4], e[5]);
            b[0][0] = b[2][1];
            b[3][2] = avg3(e[4], e[5], e[6]);
            b[1][1] = b[3][2];
            b[2][2] = avg2(e[5], e[6]);
            b[0][1] = b[2][2];
            b[3][3] = avg3(e[5], e[6], e[7]);
            b[1][2] = b[3][3];
            b[2][3] = avg2(e[6], e[7]);
            b[0][2] = b[2][3];
            b[1][3] = avg3(e[6], e[7], e[8]);
            b[0][3] = avg2(e[7], e[8]);
        }
        SubBlockMode::Vl => {
            b[0][0] = avg2(a(0), a(1));
            b[1][0] = avg3(a(0), a(1), a(2));
            b[2][0] = avg2(a(1), a(2));
            b[0][1] = b[2][0];
            b[1][1] = avg3(a(1), a(2), a(3));
            b[3][0] = b[1][1];
            b[2][1] = avg2(a(2), a(3));
            b[0][2] = b[2][1];
            b[3][1] = avg3(a(2), a(3), a(4));
            b[1][2] = b[3][1];
            b[2][2] = avg2(a(3), a(4));
            b[0][3] = b[2][2];
            b[3][2] = avg3(a(3), a(4), a(5));
            b[1][3] = b[3][2];
            b[2][3] = avg3(a(4), a(5), a(6));
            b[3][3] = avg3(a(5), a(6), a(7));
        }
        SubBlockMode::Hd => {
            b[3][0] = avg2(e[0], e[1]);
            b[3][1] = avg3(e[0], e[1], e[2]);
            b[2][0] = avg2(e[1], e[2]);
            b[3][2] = b[2][0];
            b[2][1] = avg3(e[1], e[2], e[3]);
            b[3][3] = b[2][1];
            b[2][2] = avg2(e[2], e[3]);
            b[1][0] = b[2][2];
            b[2][3] = avg3(e[2], e[3], e[4]);
            b[1][1] = b[2][3];
            b[1][2] = avg2(e[3], e[4]);
            b[0][0] = b[1][2];
            b[1][3] = avg3(e[3], e[4], e[5]);
            b[0][1] = b[1][3];
            b[0][2] = avg3(e[4], e[5], e[6]);
            b[0][3] = avg3(e[5], e[6], e[7]);
        }
        SubBlockMode::Hu => {
            b[0][0] = avg2(l(0), l(1));
            b[0][1] = avg3(l(0), l(1), l(2));
            b[0][2] = avg2(l(1), l(2));
            b[1][0] = b[0][2];
            b[0][3] = avg3(l(1), l(2), l(3));
            b[1][1] = b[0][3];
            b[1][2] = avg2(l(2), l(3));
            b[2][0] = b[1][2];
            b[1][3] = avg3(l(2), l(3), l(3));
            b[2][1] = b[1][3];
            b[2][2] = l(3);
            b[2][3] = l(3);
            b[3] = [l(3); 4];
        }
    }

    for (r, row) in b.iter().enumerate() {
        let start = base + r * stride;
        ws[start..start + 4].copy_from_slice(row);
    }
}

/// Copy a `size`x`size` block at (`x0`, `y0`) of a reference plane into the
/// interior of a workspace (zero motion vector prediction)
pub fn copy_reference_block(
    reference: &[u8],
    ref_stride: usize,
    x0: usize,
    y0: usize,
    size: usize,
    ws: &mut [u8],
    ws_stride: usize,
) {
    for y in 0..size {
        let src = (y0 + y) * ref_stride + x0;
        let dst = (y + 1) * ws_stride + 1;
        ws[dst..dst + size].copy_from_slice(&reference[src..src + size]);
    }
}

/// Copy the interior of a workspace back into a plane
pub fn store_workspace(
    ws: &[u8],
    ws_stride: usize,
    size: usize,
    plane: &mut [u8],
    stride: usize,
    x0: usize,
    y0: usize,
) {
    for y in 0..size {
        let src = (y + 1) * ws_stride + 1;
        let dst = (y0 + y) * stride + x0;
        plane[dst..dst + size].copy_from_slice(&ws[src..src + size]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn interior(ws: &[u8], stride: usize, size: usize) -> Vec<u8> {
        (1..=size)
            .flat_map(|y| ws[y * stride + 1..y * stride + 1 + size].to_vec())
            .collect()
    }

    #[test]
    fn test_averages() {
        assert_eq!(avg2(1, 2), 2);
        assert_eq!(avg2(255, 255), 255);
        assert_eq!(avg3(0, 1, 2), 1);
        assert_eq!(avg3(255, 255, 255), 255);
        assert_eq!(clamp255(-5), 0);
        assert_eq!(clamp255(300), 255);
    }

    #[test]
    fn test_first_macroblock_edges() {
        let plane = vec![0u8; 32 * 32];
        let ws = luma_workspace(&plane, 32, 0, 0, 2);
        assert!(ws[..LUMA_STRIDE].iter().all(|&p| p == 127));
        for y in 1..=16 {
            assert_eq!(ws[y * LUMA_STRIDE], 129);
        }
        assert_eq!(ws[4 * LUMA_STRIDE + 17], 127);
    }

    #[test]
    fn test_predict_16x16_dc_first_block() {
        let plane = vec![0u8; 16 * 16];
        let mut ws = luma_workspace(&plane, 16, 0, 0, 1);
        predict_block(&mut ws, LUMA_STRIDE, 16, IntraMode::Dc, false, false);
        assert!(interior(&ws, LUMA_STRIDE, 16).iter().all(|&p| p == 128));
    }

    #[test]
    fn test_predict_16x16_dc_left_only() {
        let mut plane = vec![0u8; 32 * 16];
        for y in 0..16 {
            plane[y * 32 + 15] = 60;
        }
        let mut ws = luma_workspace(&plane, 32, 1, 0, 2);
        predict_block(&mut ws, LUMA_STRIDE, 16, IntraMode::Dc, false, true);
        assert!(interior(&ws, LUMA_STRIDE, 16).iter().all(|&p| p == 60));
    }

    #[test]
    fn test_predict_16x16_v_and_h_at_edges() {
        let plane = vec![0u8; 16 * 16];
        let mut ws = luma_workspace(&plane, 16, 0, 0, 1);
        predict_block(&mut ws, LUMA_STRIDE, 16, IntraMode::V, false, false);
        assert!(interior(&ws, LUMA_STRIDE, 16).iter().all(|&p| p == 127));

        let mut ws = luma_workspace(&plane, 16, 0, 0, 1);
        predict_block(&mut ws, LUMA_STRIDE, 16, IntraMode::H, false, false);
        assert!(interior(&ws, LUMA_STRIDE, 16).iter().all(|&p| p == 129));
    }

    #[test]
    fn test_predict_tm_uses_corner() {
        // Second row, first column: corner is the left edge constant
        let mut plane = vec![0u8; 16 * 32];
        for x in 0..16 {
            plane[15 * 16 + x] = 200;
        }
        let mut ws = luma_workspace(&plane, 16, 0, 1, 1);
        assert_eq!(ws[0], 129);
        predict_block(&mut ws, LUMA_STRIDE, 16, IntraMode::Tm, true, false);
        // 129 (left) + 200 (above) - 129 (corner)
        assert!(interior(&ws, LUMA_STRIDE, 16).iter().all(|&p| p == 200));
    }

    #[test]
    fn test_chroma_dc_both_neighbours() {
        let mut plane = vec![0u8; 16 * 16];
        for x in 8..16 {
            plane[7 * 16 + x] = 10;
        }
        for y in 8..16 {
            plane[y * 16 + 7] = 30;
        }
        let mut ws = chroma_workspace(&plane, 16, 1, 1);
        predict_block(&mut ws, CHROMA_STRIDE, 8, IntraMode::Dc, true, true);
        assert!(interior(&ws, CHROMA_STRIDE, 8).iter().all(|&p| p == 20));
    }

    #[test]
    fn test_subblock_dc_and_ve() {
        let plane = vec![0u8; 16 * 16];
        let mut ws = luma_workspace(&plane, 16, 0, 0, 1);
        let base = subblock_offset(0);
        predict_4x4(&mut ws, LUMA_STRIDE, base, SubBlockMode::Dc);
        // (4 * 127 + 4 * 129 + 4) >> 3
        assert_eq!(ws[base], 128);
        assert_eq!(ws[base + 3 * LUMA_STRIDE + 3], 128);

        let mut ws = luma_workspace(&plane, 16, 0, 0, 1);
        predict_4x4(&mut ws, LUMA_STRIDE, base, SubBlockMode::Ve);
        assert_eq!(ws[base], 127);
    }

    #[test]
    fn test_subblock_ld_uses_above_right() {
        let mut ws = [0u8; LUMA_WORKSPACE];
        for x in 1..LUMA_STRIDE {
            ws[x] = (x * 10) as u8;
        }
        let base = subblock_offset(3);
        predict_4x4(&mut ws, LUMA_STRIDE, base, SubBlockMode::Ld);
        // Bottom-right pixel is avg3(A6, A7, A7) with A = pixels 13..21
        assert_eq!(ws[base + 3 * LUMA_STRIDE + 3], avg3(190, 200, 200));
        assert_eq!(ws[base], avg3(130, 140, 150));
    }

    #[test]
    fn test_subblock_hu_bottom_rows() {
        let mut ws = [0u8; LUMA_WORKSPACE];
        for y in 1..=16 {
            ws[y * LUMA_STRIDE] = (y * 5) as u8;
        }
        let base = subblock_offset(0);
        predict_4x4(&mut ws, LUMA_STRIDE, base, SubBlockMode::Hu);
        assert_eq!(ws[base + 3 * LUMA_STRIDE], 20);
        assert_eq!(ws[base + 2 * LUMA_STRIDE + 3], 20);
        assert_eq!(ws[base], avg2(5, 10));
    }

    #[test]
    fn test_copy_and_store() {
        let reference: Vec<u8> = (0..32 * 32).map(|i| (i % 251) as u8).collect();
        let mut ws = [0u8; LUMA_WORKSPACE];
        copy_reference_block(&reference, 32, 16, 16, 16, &mut ws, LUMA_STRIDE);

        let mut out = vec![0u8; 32 * 32];
        store_workspace(&ws, LUMA_STRIDE, 16, &mut out, 32, 16, 16);
        for y in 16..32 {
            assert_eq!(out[y * 32 + 16..y * 32 + 32], reference[y * 32 + 16..y * 32 + 32]);
        }
    }
}
