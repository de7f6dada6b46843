//! Per-macroblock mode syntax in partition 0
//!
//! Keyframes carry intra modes with fixed, context-dependent
//! probabilities. Inter frames carry a reference frame choice, then either
//! intra modes with the frame's adaptive probabilities or a motion vector
//! mode chosen relative to the neighbouring macroblocks' vectors.

use super::bool_decoder::BoolDecoder;
use super::bool_encoder::Vp8BoolEncoder;
use super::frame::{EntropyContext, FrameHeader};
use super::macroblock::{InterMode, MbGrid, MbInfo, MotionVector, RefFrame};
use super::tables::{
    IntraMode, SubBlockMode, BMODE_TREE, DEFAULT_BMODE_PROBS, KF_BMODE_PROBS, KF_UV_MODE_PROBS,
    KF_YMODE_PROBS, KF_YMODE_TREE, MODE_CONTEXTS, MVP_BITS, MVP_IS_SHORT, MVP_SHORT, MVP_SIGN,
    MV_LONG_BITS, MV_NEAR, MV_NEAREST, MV_NEW, MV_PROB_COUNT, MV_REF_TREE, MV_SPLIT, MV_ZERO,
    SMALL_MV_TREE, UV_MODE_TREE, YMODE_TREE,
};
use crate::error::{Error, Result};

/// How far a predicted vector may point beyond the frame, in 1/8 pixels
const MV_BORDER: i32 = 16 << 3;
/// Magnitudes below this use the short tree
const MV_SHORT_COUNT: i32 = 8;

/// Neighbouring vectors of a macroblock and the weights that select the
/// inter mode probabilities
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NearMvs {
    pub best: MotionVector,
    pub nearest: MotionVector,
    pub near: MotionVector,
    pub counts: [u8; 4],
}

impl NearMvs {
    /// Probabilities of the inter mode tree
    pub fn mode_probs(&self) -> [u8; 4] {
        let mut probs = [0u8; 4];
        for (i, p) in probs.iter_mut().enumerate() {
            *p = MODE_CONTEXTS[self.counts[i] as usize][i];
        }
        probs
    }
}

fn flip_if_biased(
    mv: MotionVector,
    neighbour: RefFrame,
    target: RefFrame,
    bias: &[bool; 4],
) -> MotionVector {
    if bias[neighbour.index()] != bias[target.index()] {
        MotionVector::new(-mv.row, -mv.col)
    } else {
        mv
    }
}

/// Collect the above, left and above-left vectors of a macroblock
pub fn find_near_mvs(
    grid: &MbGrid,
    mbx: usize,
    mby: usize,
    target: RefFrame,
    sign_bias: &[bool; 4],
) -> NearMvs {
    let (x, y) = (mbx as isize, mby as isize);
    let neighbours = [
        (grid.neighbor(x, y - 1), 2u8),
        (grid.neighbor(x - 1, y), 2),
        (grid.neighbor(x - 1, y - 1), 1),
    ];

    let mut mvs = [MotionVector::ZERO; 4];
    let mut counts = [0u8; 4];
    let mut slot = 0usize;

    for &(info, weight) in neighbours.iter() {
        if !info.is_inter() {
            continue;
        }
        if info.mv.is_zero() {
            counts[0] += weight;
            continue;
        }
        let mv = flip_if_biased(info.mv, info.ref_frame, target, sign_bias);
        // Slot 0 holds the zero vector, so the first nonzero one always opens
        // a new slot
        if mv != mvs[slot] {
            slot += 1;
            mvs[slot] = mv;
        }
        counts[slot] += weight;
    }

    // Three distinct vectors where the last matches the nearest
    if counts[3] > 0 && mvs[slot] == mvs[1] {
        counts[1] += 1;
    }

    counts[3] = neighbours
        .iter()
        .map(|&(info, weight)| {
            if info.inter_mode == Some(InterMode::Split) {
                weight
            } else {
                0
            }
        })
        .sum();

    if counts[2] > counts[1] {
        counts.swap(1, 2);
        mvs.swap(1, 2);
    }
    if counts[1] >= counts[0] {
        mvs[0] = mvs[1];
    }

    let clamp = |mv: MotionVector| clamp_mv(mv, grid, mbx, mby);
    NearMvs {
        best: clamp(mvs[0]),
        nearest: clamp(mvs[1]),
        near: clamp(mvs[2]),
        counts,
    }
}

/// Keep a vector within one macroblock of the frame edges
pub fn clamp_mv(mv: MotionVector, grid: &MbGrid, mbx: usize, mby: usize) -> MotionVector {
    let to_left = -((mbx as i32 * 16) << 3) - MV_BORDER;
    let to_right = (((grid.cols() - 1 - mbx) as i32 * 16) << 3) + MV_BORDER;
    let to_top = -((mby as i32 * 16) << 3) - MV_BORDER;
    let to_bottom = (((grid.rows() - 1 - mby) as i32 * 16) << 3) + MV_BORDER;
    MotionVector::new(
        (mv.row as i32).clamp(to_top, to_bottom) as i16,
        (mv.col as i32).clamp(to_left, to_right) as i16,
    )
}

fn read_mv_component(bd: &mut BoolDecoder, p: &[u8; MV_PROB_COUNT]) -> i32 {
    let mut x = if bd.read_bool(p[MVP_IS_SHORT]) {
        let mut x = 0i32;
        for i in 0..3 {
            x += (bd.read_bool(p[MVP_BITS + i]) as i32) << i;
        }
        for i in (4..MV_LONG_BITS).rev() {
            x += (bd.read_bool(p[MVP_BITS + i]) as i32) << i;
        }
        // Bit 3 is implicit when nothing above it is set
        if x & 0xFFF0 == 0 || bd.read_bool(p[MVP_BITS + 3]) {
            x += 8;
        }
        x
    } else {
        bd.read_tree(&SMALL_MV_TREE, &p[MVP_SHORT..]) as i32
    };

    if x != 0 && bd.read_bool(p[MVP_SIGN]) {
        x = -x;
    }
    x
}

fn write_mv_component(be: &mut Vp8BoolEncoder, value: i32, p: &[u8; MV_PROB_COUNT]) {
    let x = value.abs();
    if x < MV_SHORT_COUNT {
        be.encode_bool(false, p[MVP_IS_SHORT]);
        be.encode_tree(&SMALL_MV_TREE, &p[MVP_SHORT..], x as i8);
        if x == 0 {
            return;
        }
    } else {
        be.encode_bool(true, p[MVP_IS_SHORT]);
        for i in 0..3 {
            be.encode_bool((x >> i) & 1 != 0, p[MVP_BITS + i]);
        }
        for i in (4..MV_LONG_BITS).rev() {
            be.encode_bool((x >> i) & 1 != 0, p[MVP_BITS + i]);
        }
        if x & 0xFFF0 != 0 {
            be.encode_bool((x >> 3) & 1 != 0, p[MVP_BITS + 3]);
        }
    }
    be.encode_bool(value < 0, p[MVP_SIGN]);
}

/// Read a motion vector difference, row then column
pub fn read_mv(bd: &mut BoolDecoder, entropy: &EntropyContext) -> MotionVector {
    let row = read_mv_component(bd, &entropy.mv.probs[0]) * 2;
    let col = read_mv_component(bd, &entropy.mv.probs[1]) * 2;
    MotionVector::new(row as i16, col as i16)
}

/// Write a motion vector difference; both components must be even
pub fn write_mv(be: &mut Vp8BoolEncoder, diff: MotionVector, entropy: &EntropyContext) {
    write_mv_component(be, diff.row as i32 >> 1, &entropy.mv.probs[0]);
    write_mv_component(be, diff.col as i32 >> 1, &entropy.mv.probs[1]);
}

fn read_skip(bd: &mut BoolDecoder, header: &FrameHeader) -> bool {
    header.mb_no_coeff_skip && bd.read_bool(header.prob_skip_false)
}

fn write_skip(be: &mut Vp8BoolEncoder, header: &FrameHeader, skip: bool) {
    if header.mb_no_coeff_skip {
        be.encode_bool(skip, header.prob_skip_false);
    }
}

/// Read the modes of a keyframe macroblock into the grid
pub fn read_kf_modes(
    bd: &mut BoolDecoder,
    grid: &mut MbGrid,
    mbx: usize,
    mby: usize,
    header: &FrameHeader,
) {
    let skip = read_skip(bd, header);
    let y_mode = IntraMode::from_tree(bd.read_tree(&KF_YMODE_TREE, &KF_YMODE_PROBS));

    *grid.at_mut(mbx, mby) = MbInfo {
        y_mode,
        skip,
        sub_modes: [SubBlockMode::from_luma(y_mode); 16],
        ..Default::default()
    };

    if y_mode == IntraMode::BPred {
        for b in 0..16 {
            let above = grid.above_sub_mode(mbx, mby, b);
            let left = grid.left_sub_mode(mbx, mby, b);
            let probs = &KF_BMODE_PROBS[above as usize][left as usize];
            grid.at_mut(mbx, mby).sub_modes[b] =
                SubBlockMode::from_tree(bd.read_tree(&BMODE_TREE, probs));
        }
    }

    grid.at_mut(mbx, mby).uv_mode =
        IntraMode::from_tree(bd.read_tree(&UV_MODE_TREE, &KF_UV_MODE_PROBS));
}

/// Write the modes of a keyframe macroblock already stored in the grid
pub fn write_kf_modes(
    be: &mut Vp8BoolEncoder,
    grid: &MbGrid,
    mbx: usize,
    mby: usize,
    header: &FrameHeader,
) {
    let info = grid.at(mbx, mby);
    write_skip(be, header, info.skip);
    be.encode_tree(&KF_YMODE_TREE, &KF_YMODE_PROBS, info.y_mode.tree_value());

    if info.y_mode == IntraMode::BPred {
        for b in 0..16 {
            let above = grid.above_sub_mode(mbx, mby, b);
            let left = grid.left_sub_mode(mbx, mby, b);
            let probs = &KF_BMODE_PROBS[above as usize][left as usize];
            be.encode_tree(&BMODE_TREE, probs, info.sub_modes[b].tree_value());
        }
    }

    be.encode_tree(&UV_MODE_TREE, &KF_UV_MODE_PROBS, info.uv_mode.tree_value());
}

fn sign_bias(header: &FrameHeader) -> [bool; 4] {
    [false, false, header.sign_bias_golden, header.sign_bias_altref]
}

/// Read the modes of an inter frame macroblock into the grid
pub fn read_inter_modes(
    bd: &mut BoolDecoder,
    grid: &mut MbGrid,
    mbx: usize,
    mby: usize,
    header: &FrameHeader,
    entropy: &EntropyContext,
) -> Result<()> {
    let skip = read_skip(bd, header);

    let ref_frame = if !bd.read_bool(header.prob_intra) {
        RefFrame::Intra
    } else if !bd.read_bool(header.prob_last) {
        RefFrame::Last
    } else if !bd.read_bool(header.prob_golden) {
        RefFrame::Golden
    } else {
        RefFrame::AltRef
    };

    if ref_frame == RefFrame::Intra {
        let y_mode = IntraMode::from_tree(bd.read_tree(&YMODE_TREE, &entropy.modes.ymode));
        let mut info = MbInfo {
            y_mode,
            skip,
            sub_modes: [SubBlockMode::from_luma(y_mode); 16],
            ..Default::default()
        };
        if y_mode == IntraMode::BPred {
            for mode in info.sub_modes.iter_mut() {
                *mode = SubBlockMode::from_tree(bd.read_tree(&BMODE_TREE, &DEFAULT_BMODE_PROBS));
            }
        }
        info.uv_mode = IntraMode::from_tree(bd.read_tree(&UV_MODE_TREE, &entropy.modes.uv_mode));
        *grid.at_mut(mbx, mby) = info;
        return Ok(());
    }

    let near = find_near_mvs(grid, mbx, mby, ref_frame, &sign_bias(header));
    let (inter_mode, mv) = match bd.read_tree(&MV_REF_TREE, &near.mode_probs()) {
        MV_ZERO => (InterMode::Zero, MotionVector::ZERO),
        MV_NEAREST => (InterMode::Nearest, near.nearest),
        MV_NEAR => (InterMode::Near, near.near),
        MV_NEW => {
            let diff = read_mv(bd, entropy);
            let mv = MotionVector::new(
                near.best.row.wrapping_add(diff.row),
                near.best.col.wrapping_add(diff.col),
            );
            (InterMode::New, mv)
        }
        MV_SPLIT => return Err(Error::unsupported("split motion vectors")),
        other => {
            return Err(Error::malformed(format!("invalid inter mode {}", other)));
        }
    };

    *grid.at_mut(mbx, mby) = MbInfo {
        ref_frame,
        inter_mode: Some(inter_mode),
        mv,
        skip,
        ..Default::default()
    };
    Ok(())
}

/// Write the modes of an inter frame macroblock already stored in the grid
pub fn write_inter_modes(
    be: &mut Vp8BoolEncoder,
    grid: &MbGrid,
    mbx: usize,
    mby: usize,
    header: &FrameHeader,
    entropy: &EntropyContext,
) -> Result<()> {
    let info = grid.at(mbx, mby);
    write_skip(be, header, info.skip);

    be.encode_bool(info.is_inter(), header.prob_intra);
    if !info.is_inter() {
        be.encode_tree(&YMODE_TREE, &entropy.modes.ymode, info.y_mode.tree_value());
        if info.y_mode == IntraMode::BPred {
            for mode in info.sub_modes.iter() {
                be.encode_tree(&BMODE_TREE, &DEFAULT_BMODE_PROBS, mode.tree_value());
            }
        }
        be.encode_tree(&UV_MODE_TREE, &entropy.modes.uv_mode, info.uv_mode.tree_value());
        return Ok(());
    }

    be.encode_bool(info.ref_frame != RefFrame::Last, header.prob_last);
    if info.ref_frame != RefFrame::Last {
        be.encode_bool(info.ref_frame == RefFrame::AltRef, header.prob_golden);
    }

    let near = find_near_mvs(grid, mbx, mby, info.ref_frame, &sign_bias(header));
    let probs = near.mode_probs();
    match info.inter_mode {
        Some(InterMode::Zero) => be.encode_tree(&MV_REF_TREE, &probs, MV_ZERO),
        Some(InterMode::Nearest) => be.encode_tree(&MV_REF_TREE, &probs, MV_NEAREST),
        Some(InterMode::Near) => be.encode_tree(&MV_REF_TREE, &probs, MV_NEAR),
        Some(InterMode::New) => {
            be.encode_tree(&MV_REF_TREE, &probs, MV_NEW);
            let diff = MotionVector::new(
                info.mv.row.wrapping_sub(near.best.row),
                info.mv.col.wrapping_sub(near.best.col),
            );
            write_mv(be, diff, entropy);
        }
        Some(InterMode::Split) | None => {
            return Err(Error::unsupported("split motion vectors"));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::vp8::frame::KeyframeInfo;
    use crate::codec::vp8::quant::QuantIndices;

    fn inter_mb(mv: MotionVector) -> MbInfo {
        MbInfo {
            ref_frame: RefFrame::Last,
            inter_mode: Some(if mv.is_zero() {
                InterMode::Zero
            } else {
                InterMode::New
            }),
            mv,
            ..Default::default()
        }
    }

    #[test]
    fn test_zero_mv_mode_contexts() {
        let mut grid = MbGrid::new(3, 3);
        for y in 0..3 {
            for x in 0..3 {
                *grid.at_mut(x, y) = inter_mb(MotionVector::ZERO);
            }
        }
        let bias = [false; 4];
        let corner = find_near_mvs(&grid, 0, 0, RefFrame::Last, &bias);
        let edge = find_near_mvs(&grid, 1, 0, RefFrame::Last, &bias);
        let inside = find_near_mvs(&grid, 1, 1, RefFrame::Last, &bias);
        assert_eq!(corner.mode_probs()[0], 7);
        assert_eq!(edge.mode_probs()[0], 135);
        assert_eq!(inside.mode_probs()[0], 234);
        assert_eq!(inside.best, MotionVector::ZERO);
    }

    #[test]
    fn test_near_mvs_ranking() {
        let mut grid = MbGrid::new(3, 3);
        let a = MotionVector::new(8, -4);
        let b = MotionVector::new(-6, 2);
        *grid.at_mut(1, 0) = inter_mb(a); // above
        *grid.at_mut(0, 1) = inter_mb(b); // left
        *grid.at_mut(0, 0) = inter_mb(b); // above-left

        let near = find_near_mvs(&grid, 1, 1, RefFrame::Last, &[false; 4]);
        // b collects 2 + 1 against a's 2
        assert_eq!(near.nearest, b);
        assert_eq!(near.near, a);
        assert_eq!(near.counts, [0, 3, 2, 0]);
        assert_eq!(near.best, b);
    }

    #[test]
    fn test_sign_bias_flips_vectors() {
        let mut grid = MbGrid::new(2, 2);
        let mut above = inter_mb(MotionVector::new(4, 6));
        above.ref_frame = RefFrame::Golden;
        *grid.at_mut(1, 0) = above;

        let bias = [false, false, true, false];
        let near = find_near_mvs(&grid, 1, 1, RefFrame::Last, &bias);
        assert_eq!(near.nearest, MotionVector::new(-4, -6));
    }

    #[test]
    fn test_clamp_mv() {
        let grid = MbGrid::new(2, 2);
        let mv = clamp_mv(MotionVector::new(-1000, 1000), &grid, 0, 0);
        assert_eq!(mv, MotionVector::new(-128, (16 << 3) + 128));
    }

    #[test]
    fn test_mv_roundtrip() {
        let entropy = EntropyContext::default();
        let diffs = [
            MotionVector::new(0, 0),
            MotionVector::new(2, -14),
            MotionVector::new(16, -16),
            MotionVector::new(30, 32),
            MotionVector::new(-2046, 2046),
            MotionVector::new(300, -522),
        ];

        let mut be = Vp8BoolEncoder::new();
        for &d in &diffs {
            write_mv(&mut be, d, &entropy);
        }
        let data = be.finish();

        let mut bd = BoolDecoder::new(&data).unwrap();
        for &d in &diffs {
            assert_eq!(read_mv(&mut bd, &entropy), d);
        }
    }

    #[test]
    fn test_kf_modes_roundtrip() {
        let header = {
            let mut h = FrameHeader::keyframe(
                KeyframeInfo {
                    width: 48,
                    height: 32,
                    ..Default::default()
                },
                QuantIndices::default(),
            );
            h.mb_no_coeff_skip = true;
            h.prob_skip_false = 90;
            h
        };

        let mut source = MbGrid::new(3, 2);
        let all_sub = [
            SubBlockMode::Dc,
            SubBlockMode::Tm,
            SubBlockMode::Ve,
            SubBlockMode::He,
            SubBlockMode::Ld,
            SubBlockMode::Rd,
            SubBlockMode::Vr,
            SubBlockMode::Vl,
            SubBlockMode::Hd,
            SubBlockMode::Hu,
        ];
        let luma = [
            IntraMode::BPred,
            IntraMode::V,
            IntraMode::BPred,
            IntraMode::Tm,
            IntraMode::BPred,
            IntraMode::H,
        ];
        for (i, &y_mode) in luma.iter().enumerate() {
            let info = source.at_mut(i % 3, i / 3);
            info.y_mode = y_mode;
            info.uv_mode = [IntraMode::Dc, IntraMode::V, IntraMode::H, IntraMode::Tm][i % 4];
            info.skip = i % 2 == 0;
            for b in 0..16 {
                info.sub_modes[b] = if y_mode == IntraMode::BPred {
                    all_sub[(b + i) % 10]
                } else {
                    SubBlockMode::from_luma(y_mode)
                };
            }
        }

        let mut be = Vp8BoolEncoder::new();
        for y in 0..2 {
            for x in 0..3 {
                write_kf_modes(&mut be, &source, x, y, &header);
            }
        }
        let data = be.finish();

        let mut decoded = MbGrid::new(3, 2);
        let mut bd = BoolDecoder::new(&data).unwrap();
        for y in 0..2 {
            for x in 0..3 {
                read_kf_modes(&mut bd, &mut decoded, x, y, &header);
                assert_eq!(decoded.at(x, y), source.at(x, y), "mb ({}, {})", x, y);
            }
        }
    }

    #[test]
    fn test_inter_modes_roundtrip() {
        let header = FrameHeader::inter(QuantIndices::default());
        let header = FrameHeader {
            prob_intra: 120,
            prob_last: 140,
            ..header
        };
        let entropy = EntropyContext::default();

        let mut source = MbGrid::new(2, 2);
        *source.at_mut(0, 0) = inter_mb(MotionVector::ZERO);
        *source.at_mut(1, 0) = inter_mb(MotionVector::new(10, -4));
        *source.at_mut(0, 1) = MbInfo {
            y_mode: IntraMode::BPred,
            uv_mode: IntraMode::Tm,
            sub_modes: [SubBlockMode::Hu; 16],
            ..Default::default()
        };
        let mut nearest = inter_mb(MotionVector::ZERO);
        nearest.inter_mode = Some(InterMode::Nearest);
        nearest.mv = find_near_mvs(&source, 1, 1, RefFrame::Last, &[false; 4]).nearest;
        *source.at_mut(1, 1) = nearest;

        let mut be = Vp8BoolEncoder::new();
        for y in 0..2 {
            for x in 0..2 {
                write_inter_modes(&mut be, &source, x, y, &header, &entropy).unwrap();
            }
        }
        let data = be.finish();

        let mut decoded = MbGrid::new(2, 2);
        let mut bd = BoolDecoder::new(&data).unwrap();
        for y in 0..2 {
            for x in 0..2 {
                read_inter_modes(&mut bd, &mut decoded, x, y, &header, &entropy).unwrap();
                assert_eq!(decoded.at(x, y), source.at(x, y), "mb ({}, {})", x, y);
            }
        }
    }

    #[test]
    fn test_split_mv_is_unsupported() {
        let header = FrameHeader::inter(QuantIndices::default());
        let entropy = EntropyContext::default();
        let mut grid = MbGrid::new(1, 1);
        grid.at_mut(0, 0).ref_frame = RefFrame::Last;
        grid.at_mut(0, 0).inter_mode = Some(InterMode::Split);

        let mut be = Vp8BoolEncoder::new();
        let err = write_inter_modes(&mut be, &grid, 0, 0, &header, &entropy).unwrap_err();
        assert!(err.is_unsupported());

        // Hand-write a split macroblock and read it back
        let near = find_near_mvs(&MbGrid::new(1, 1), 0, 0, RefFrame::Last, &[false; 4]);
        let mut be = Vp8BoolEncoder::new();
        be.encode_bool(true, header.prob_intra);
        be.encode_bool(false, header.prob_last);
        be.encode_tree(&MV_REF_TREE, &near.mode_probs(), MV_SPLIT);
        let data = be.finish();

        let mut grid = MbGrid::new(1, 1);
        let mut bd = BoolDecoder::new(&data).unwrap();
        let err = read_inter_modes(&mut bd, &mut grid, 0, 0, &header, &entropy).unwrap_err();
        assert!(err.is_unsupported());
    }
}
