//! VP8 video encoder
//!
//! A deliberately simple encoder: keyframes code every luma sub-block with
//! 4x4 DC prediction and chroma with 8x8 DC prediction; inter frames code
//! every macroblock as a zero motion vector prediction from the previous
//! reconstruction, and macroblocks whose source did not change are copied
//! with no residual. There is no mode or motion search and no rate control;
//! quality is fixed by the quantizer index.
//!
//! # Example
//!
//! ```no_run
//! use vp8lite::codec::vp8::{Vp8Encoder, Vp8EncoderConfig};
//!
//! let config = Vp8EncoderConfig {
//!     width: 320,
//!     height: 240,
//!     quant_index: 20,
//!     keyframe_interval: 30,
//!     ..Default::default()
//! };
//! let mut encoder = Vp8Encoder::with_config(config).unwrap();
//! let rgb = vec![0u8; 320 * 240 * 3];
//! let frame = encoder.encode_frame(&rgb, 320, 240, false).unwrap();
//! ```

use super::bool_encoder::Vp8BoolEncoder;
use super::entropy::{BLOCK_TYPE_UV, BLOCK_TYPE_Y2, BLOCK_TYPE_Y_NO_DC, BLOCK_TYPE_Y_WITH_DC};
use super::entropy_encoder::{encode_block_coeffs, TokenStats};
use super::frame::{EntropyContext, FrameHeader, KeyframeInfo, MAX_DIMENSION};
use super::frame_writer::{build_frame, write_compressed_header};
use super::macroblock::{
    InterMode, MacroblockLevels, MbGrid, MbInfo, MotionVector, NonzeroContext, RefFrame,
    U_BLOCK_START, Y2_BLOCK,
};
use super::modes::{write_inter_modes, write_kf_modes};
use super::prediction::{
    chroma_workspace, copy_reference_block, luma_workspace, predict_4x4, predict_block,
    store_workspace, subblock_offset, CHROMA_STRIDE, LUMA_STRIDE,
};
use super::quant::{dequantize_block, quantize_block, QuantFactors, QuantIndices, MAX_QINDEX};
use super::tables::{IntraMode, SubBlockMode};
use super::transform::{add_inverse_dct, forward_dct4x4, forward_wht4x4, inverse_wht4x4};
use crate::codec::{Encoder, PlanarImage, VideoFrame};
use crate::error::{Error, Result};
use crate::format::Packet;
use crate::util::{Buffer, Rational, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tracing::{debug, info, trace};

/// VP8 encoder configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Vp8EncoderConfig {
    /// Video width in pixels
    pub width: u32,
    /// Video height in pixels
    pub height: u32,
    /// Quantizer index (0-127, lower is better quality)
    pub quant_index: u8,
    /// Keyframe every this many frames (0 = first and forced frames only)
    pub keyframe_interval: u32,
    /// Carry probability updates into the following frames
    pub refresh_entropy_probs: bool,
    /// Signal coefficient probabilities fitted to each frame
    pub update_coefficient_probs: bool,
    /// Time base of presentation timestamps
    pub timebase: Rational,
}

impl Default for Vp8EncoderConfig {
    fn default() -> Self {
        Vp8EncoderConfig {
            width: 640,
            height: 480,
            quant_index: 24,
            keyframe_interval: 120,
            refresh_entropy_probs: true,
            update_coefficient_probs: true,
            timebase: Rational::new(1, 30),
        }
    }
}

impl Vp8EncoderConfig {
    /// Check the configuration for values the bitstream cannot carry
    pub fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(Error::config(format!(
                "Invalid dimensions: {}x{}",
                self.width, self.height
            )));
        }
        if self.width > MAX_DIMENSION || self.height > MAX_DIMENSION {
            return Err(Error::config(format!(
                "Dimensions {}x{} exceed {}",
                self.width, self.height, MAX_DIMENSION
            )));
        }
        if self.quant_index as i32 > MAX_QINDEX {
            return Err(Error::config(format!(
                "Quantizer index {} exceeds {}",
                self.quant_index, MAX_QINDEX
            )));
        }
        if !self.timebase.is_positive() {
            return Err(Error::config(format!("Invalid time base {}", self.timebase)));
        }
        Ok(())
    }
}

/// VP8 video encoder
pub struct Vp8Encoder {
    /// Encoder configuration
    config: Vp8EncoderConfig,
    /// Frame counter for PTS calculation
    frame_count: u64,
    /// Frames coded since the last keyframe
    since_keyframe: u32,
    /// Encoded packets waiting to be retrieved
    packet_buffer: VecDeque<Packet>,
    /// Probabilities carried into the next frame
    entropy: EntropyContext,
    /// Reconstruction of the last frame, as a decoder sees it
    last: Option<PlanarImage>,
    /// Source image of the last frame
    last_source: Option<PlanarImage>,
    force_next_keyframe: bool,
}

impl Vp8Encoder {
    /// Create a new VP8 encoder with the given dimensions
    pub fn new(width: u32, height: u32) -> Result<Self> {
        let config = Vp8EncoderConfig {
            width,
            height,
            ..Default::default()
        };
        Self::with_config(config)
    }

    /// Create a VP8 encoder with custom configuration
    pub fn with_config(config: Vp8EncoderConfig) -> Result<Self> {
        config.validate()?;
        info!(
            "VP8 encoder created: {}x{}, q={}, keyframe interval {}",
            config.width, config.height, config.quant_index, config.keyframe_interval
        );
        Ok(Vp8Encoder {
            config,
            frame_count: 0,
            since_keyframe: 0,
            packet_buffer: VecDeque::new(),
            entropy: EntropyContext::default(),
            last: None,
            last_source: None,
            force_next_keyframe: false,
        })
    }

    pub fn config(&self) -> &Vp8EncoderConfig {
        &self.config
    }

    /// Force the next frame to be a keyframe
    pub fn force_keyframe(&mut self) {
        self.force_next_keyframe = true;
    }

    /// Encode an RGB24 raster into one compressed frame
    pub fn encode_frame(
        &mut self,
        rgb: &[u8],
        width: u32,
        height: u32,
        force_keyframe: bool,
    ) -> Result<Vec<u8>> {
        let image = PlanarImage::from_rgb(rgb, width, height)?;
        self.encode_image(&image, force_keyframe)
    }

    /// Encode a planar image into one compressed frame
    pub fn encode_image(&mut self, source: &PlanarImage, force_keyframe: bool) -> Result<Vec<u8>> {
        if source.width() > MAX_DIMENSION || source.height() > MAX_DIMENSION {
            return Err(Error::numeric_guard(format!(
                "frame size {}x{} exceeds the 14-bit limit",
                source.width(),
                source.height()
            )));
        }

        let reference = match &self.last {
            Some(last) if last.same_size(source) && !self.keyframe_due(force_keyframe) => {
                Some(last)
            }
            _ => None,
        };
        let keyframe = reference.is_none();

        let quant = QuantIndices::with_base(self.config.quant_index);
        let mut header = if keyframe {
            let info = KeyframeInfo {
                width: source.width() as u16,
                height: source.height() as u16,
                ..Default::default()
            };
            FrameHeader::keyframe(info, quant)
        } else {
            FrameHeader::inter(quant)
        };
        header.refresh_entropy_probs = self.config.refresh_entropy_probs;

        let mut entropy = if keyframe {
            EntropyContext::default()
        } else {
            self.entropy.clone()
        };

        let mut recon = source.blank_like();
        let previous = self.last_source.as_ref().filter(|_| !keyframe);
        let (grid, levels) = analyze(source, reference, previous, &quant, &mut recon);

        let skipped = levels.iter().filter(|l| l.is_empty()).count();
        header.mb_no_coeff_skip = skipped > 0;
        header.prob_skip_false = skip_probability(levels.len() - skipped, levels.len());

        let planned = if self.config.update_coefficient_probs {
            let mut stats = TokenStats::new();
            tokenize(&grid, &levels, |block_type, ctx, blocks| {
                stats.record_block(block_type, ctx, blocks)
            });
            stats.optimize(&entropy.coeff)
        } else {
            entropy.coeff.clone()
        };

        let mut part0 = Vp8BoolEncoder::new();
        let updated = write_compressed_header(&mut part0, &header, &mut entropy, &planned);
        for mby in 0..grid.rows() {
            for mbx in 0..grid.cols() {
                if keyframe {
                    write_kf_modes(&mut part0, &grid, mbx, mby, &header);
                } else {
                    write_inter_modes(&mut part0, &grid, mbx, mby, &header, &entropy)?;
                }
            }
        }

        let mut tokens = Vp8BoolEncoder::with_capacity(source.y().len() / 4);
        tokenize(&grid, &levels, |block_type, ctx, blocks| {
            encode_block_coeffs(&mut tokens, &entropy.coeff, block_type, ctx, blocks)
        });

        let frame = build_frame(&header, &part0.finish(), &tokens.finish())?;
        debug!(
            "VP8 {} frame {}: {} bytes, {}/{} macroblocks skipped, {} probability updates",
            if keyframe { "key" } else { "inter" },
            self.frame_count,
            frame.len(),
            skipped,
            levels.len(),
            updated
        );

        if header.refresh_entropy_probs {
            self.entropy = entropy;
        } else if keyframe {
            self.entropy = EntropyContext::default();
        }
        self.last = Some(recon);
        self.last_source = Some(source.clone());
        self.since_keyframe = if keyframe { 1 } else { self.since_keyframe + 1 };
        self.force_next_keyframe = false;
        self.frame_count += 1;

        Ok(frame)
    }

    fn keyframe_due(&self, forced: bool) -> bool {
        forced
            || self.force_next_keyframe
            || (self.config.keyframe_interval > 0
                && self.since_keyframe >= self.config.keyframe_interval)
    }

    /// Reconstruction of the last encoded frame
    pub fn reconstruction(&self) -> Option<&PlanarImage> {
        self.last.as_ref()
    }
}

/// `prob_skip_false` from the share of coded macroblocks
fn skip_probability(coded: usize, total: usize) -> u8 {
    if total == 0 {
        return 128;
    }
    ((coded * 256 / total).clamp(1, 255)) as u8
}

/// Choose modes, quantize and reconstruct every macroblock
///
/// Inter macroblocks whose source pixels match `previous` are coded as a
/// plain copy of the reference with no residual.
fn analyze(
    source: &PlanarImage,
    reference: Option<&PlanarImage>,
    previous: Option<&PlanarImage>,
    quant: &QuantIndices,
    recon: &mut PlanarImage,
) -> (MbGrid, Vec<MacroblockLevels>) {
    let coder = MacroblockCoder {
        factors: QuantFactors::from_indices(quant),
        source,
        reference,
    };
    let (cols, rows) = (source.mb_cols(), source.mb_rows());
    let mut grid = MbGrid::new(cols, rows);
    let mut levels = Vec::with_capacity(cols * rows);

    for mby in 0..rows {
        for mbx in 0..cols {
            let mut info = if reference.is_some() {
                MbInfo {
                    ref_frame: RefFrame::Last,
                    inter_mode: Some(InterMode::Zero),
                    mv: MotionVector::ZERO,
                    ..Default::default()
                }
            } else {
                MbInfo {
                    y_mode: IntraMode::BPred,
                    uv_mode: IntraMode::Dc,
                    sub_modes: [SubBlockMode::Dc; 16],
                    ..Default::default()
                }
            };

            let unchanged = previous.is_some_and(|prev| same_macroblock(source, prev, mbx, mby));
            let mb_levels = if unchanged {
                coder.copy_reference(mbx, mby, recon);
                MacroblockLevels::new(info.has_y2())
            } else {
                coder.code(&info, mbx, mby, recon)
            };
            info.skip = mb_levels.is_empty();
            trace!("MB ({}, {}) skip={}", mbx, mby, info.skip);
            *grid.at_mut(mbx, mby) = info;
            levels.push(mb_levels);
        }
    }

    (grid, levels)
}

/// Walk the blocks of every macroblock in coding order, tracking the
/// nonzero context the way the decoder will
///
/// `code` receives (block type, context, levels) and reports whether the
/// block produced tokens.
fn tokenize<F>(grid: &MbGrid, levels: &[MacroblockLevels], mut code: F)
where
    F: FnMut(usize, usize, &[i32; 16]) -> bool,
{
    let mut nonzero = NonzeroContext::new(grid.cols());
    for mby in 0..grid.rows() {
        nonzero.start_row();
        for mbx in 0..grid.cols() {
            let info = grid.at(mbx, mby);
            let mb = &levels[mby * grid.cols() + mbx];
            if info.skip {
                nonzero.clear_macroblock(mbx, info.has_y2());
                continue;
            }

            let mut code_block = |block_type: usize, block: usize| {
                let ctx = nonzero.context(mbx, block);
                let has_tokens = code(block_type, ctx, &mb.blocks[block]);
                nonzero.set(mbx, block, has_tokens);
            };

            let luma_type = if mb.has_y2 {
                code_block(BLOCK_TYPE_Y2, Y2_BLOCK);
                BLOCK_TYPE_Y_NO_DC
            } else {
                BLOCK_TYPE_Y_WITH_DC
            };
            for b in 0..U_BLOCK_START {
                code_block(luma_type, b);
            }
            for b in U_BLOCK_START..Y2_BLOCK {
                code_block(BLOCK_TYPE_UV, b);
            }
        }
    }
}

/// Whether macroblock (`mbx`, `mby`) holds the same pixels in both images
fn same_macroblock(a: &PlanarImage, b: &PlanarImage, mbx: usize, mby: usize) -> bool {
    if !a.same_size(b) {
        return false;
    }
    let rows_match = |pa: &[u8], pb: &[u8], stride: usize, size: usize| {
        (0..size).all(|y| {
            let start = (mby * size + y) * stride + mbx * size;
            pa[start..start + size] == pb[start..start + size]
        })
    };
    rows_match(a.y(), b.y(), a.y_stride(), 16)
        && rows_match(a.u(), b.u(), a.uv_stride(), 8)
        && rows_match(a.v(), b.v(), a.uv_stride(), 8)
}

/// Residual of a 4x4 block: source pixels minus the prediction at `offset`
fn residual(
    plane: &[u8],
    stride: usize,
    x0: usize,
    y0: usize,
    ws: &[u8],
    ws_stride: usize,
    offset: usize,
) -> [i32; 16] {
    let mut block = [0i32; 16];
    for y in 0..4 {
        for x in 0..4 {
            block[y * 4 + x] =
                plane[(y0 + y) * stride + x0 + x] as i32 - ws[offset + y * ws_stride + x] as i32;
        }
    }
    block
}

/// Quantizes one macroblock and reconstructs it exactly as a decoder will
struct MacroblockCoder<'a> {
    factors: QuantFactors,
    source: &'a PlanarImage,
    reference: Option<&'a PlanarImage>,
}

impl MacroblockCoder<'_> {
    fn code(&self, info: &MbInfo, mbx: usize, mby: usize, recon: &mut PlanarImage) -> MacroblockLevels {
        let mut levels = MacroblockLevels::new(info.has_y2());
        self.code_luma(info, mbx, mby, recon, &mut levels);
        self.code_chroma(info, mbx, mby, recon, &mut levels);
        levels
    }

    /// Copy one macroblock of the reference into `recon` unchanged
    fn copy_reference(&self, mbx: usize, mby: usize, recon: &mut PlanarImage) {
        let Some(reference) = self.reference else {
            return;
        };
        let (y_stride, uv_stride) = (recon.y_stride(), recon.uv_stride());
        let (y, u, v) = recon.planes_mut();
        let planes = [
            (reference.y(), y, y_stride, 16),
            (reference.u(), u, uv_stride, 8),
            (reference.v(), v, uv_stride, 8),
        ];
        for (src, dst, stride, size) in planes {
            for row in 0..size {
                let start = (mby * size + row) * stride + mbx * size;
                dst[start..start + size].copy_from_slice(&src[start..start + size]);
            }
        }
    }

    fn code_luma(
        &self,
        info: &MbInfo,
        mbx: usize,
        mby: usize,
        recon: &mut PlanarImage,
        levels: &mut MacroblockLevels,
    ) {
        let stride = recon.y_stride();
        let (x0, y0) = (mbx * 16, mby * 16);
        let src = self.source.y();
        let mut ws = luma_workspace(recon.y(), stride, mbx, mby, recon.mb_cols());

        if info.y_mode == IntraMode::BPred && !info.is_inter() {
            // Each sub-block predicts from its reconstructed neighbours
            let (dc, ac) = self.factors.steps(BLOCK_TYPE_Y_WITH_DC);
            for b in 0..16 {
                let offset = subblock_offset(b);
                predict_4x4(&mut ws, LUMA_STRIDE, offset, info.sub_modes[b]);
                let (bx, by) = (x0 + (b % 4) * 4, y0 + (b / 4) * 4);
                let mut coeffs = [0i32; 16];
                forward_dct4x4(&residual(src, stride, bx, by, &ws, LUMA_STRIDE, offset), &mut coeffs);
                levels.blocks[b] = quantize_block(&coeffs, dc, ac);
                add_inverse_dct(
                    &mut ws[offset..],
                    LUMA_STRIDE,
                    &dequantize_block(&levels.blocks[b], dc, ac),
                );
            }
        } else {
            match self.reference {
                Some(reference) if info.is_inter() => {
                    copy_reference_block(reference.y(), stride, x0, y0, 16, &mut ws, LUMA_STRIDE);
                }
                _ => predict_block(&mut ws, LUMA_STRIDE, 16, info.y_mode, mby > 0, mbx > 0),
            }

            let (dc, ac) = self.factors.steps(BLOCK_TYPE_Y_NO_DC);
            let mut dcs = [0i32; 16];
            for b in 0..16 {
                let offset = subblock_offset(b);
                let (bx, by) = (x0 + (b % 4) * 4, y0 + (b / 4) * 4);
                let mut coeffs = [0i32; 16];
                forward_dct4x4(&residual(src, stride, bx, by, &ws, LUMA_STRIDE, offset), &mut coeffs);
                dcs[b] = coeffs[0];
                levels.blocks[b] = quantize_block(&coeffs, dc, ac);
                levels.blocks[b][0] = 0;
            }

            let (y2_dc, y2_ac) = self.factors.steps(BLOCK_TYPE_Y2);
            let mut y2 = [0i32; 16];
            forward_wht4x4(&dcs, &mut y2);
            levels.blocks[Y2_BLOCK] = quantize_block(&y2, y2_dc, y2_ac);

            let mut recon_dcs = [0i32; 16];
            inverse_wht4x4(
                &dequantize_block(&levels.blocks[Y2_BLOCK], y2_dc, y2_ac),
                &mut recon_dcs,
            );
            for b in 0..16 {
                let mut coeffs = dequantize_block(&levels.blocks[b], dc, ac);
                coeffs[0] = recon_dcs[b];
                add_inverse_dct(&mut ws[subblock_offset(b)..], LUMA_STRIDE, &coeffs);
            }
        }

        let (y, _, _) = recon.planes_mut();
        store_workspace(&ws, LUMA_STRIDE, 16, y, stride, x0, y0);
    }

    fn code_chroma(
        &self,
        info: &MbInfo,
        mbx: usize,
        mby: usize,
        recon: &mut PlanarImage,
        levels: &mut MacroblockLevels,
    ) {
        let stride = recon.uv_stride();
        let (x0, y0) = (mbx * 8, mby * 8);
        let (dc, ac) = self.factors.steps(BLOCK_TYPE_UV);

        for plane in 0..2 {
            let src = if plane == 0 { self.source.u() } else { self.source.v() };
            let target = if plane == 0 { recon.u() } else { recon.v() };
            let mut ws = chroma_workspace(target, stride, mbx, mby);

            match self.reference {
                Some(reference) if info.is_inter() => {
                    let ref_plane = if plane == 0 { reference.u() } else { reference.v() };
                    copy_reference_block(ref_plane, stride, x0, y0, 8, &mut ws, CHROMA_STRIDE);
                }
                _ => predict_block(&mut ws, CHROMA_STRIDE, 8, info.uv_mode, mby > 0, mbx > 0),
            }

            let first = U_BLOCK_START + plane * 4;
            for j in 0..4 {
                let offset = (1 + (j / 2) * 4) * CHROMA_STRIDE + 1 + (j % 2) * 4;
                let (bx, by) = (x0 + (j % 2) * 4, y0 + (j / 2) * 4);
                let mut coeffs = [0i32; 16];
                forward_dct4x4(&residual(src, stride, bx, by, &ws, CHROMA_STRIDE, offset), &mut coeffs);
                levels.blocks[first + j] = quantize_block(&coeffs, dc, ac);
                add_inverse_dct(
                    &mut ws[offset..],
                    CHROMA_STRIDE,
                    &dequantize_block(&levels.blocks[first + j], dc, ac),
                );
            }

            let (_, u, v) = recon.planes_mut();
            let out = if plane == 0 { u } else { v };
            store_workspace(&ws, CHROMA_STRIDE, 8, out, stride, x0, y0);
        }
    }
}

impl Encoder for Vp8Encoder {
    fn send_frame(&mut self, frame: &VideoFrame) -> Result<()> {
        let pts = if frame.pts.is_valid() {
            frame.pts
        } else {
            Timestamp::new(self.frame_count as i64)
        };

        let data = self.encode_image(&frame.image, frame.keyframe)?;
        let keyframe = data[0] & 1 == 0;

        let mut packet = Packet::new(0, Buffer::from_vec(data));
        packet.pts = pts;
        packet.dts = pts;
        packet.duration = 1;
        packet.set_keyframe(keyframe);
        self.packet_buffer.push_back(packet);
        Ok(())
    }

    fn receive_packet(&mut self) -> Result<Packet> {
        self.packet_buffer.pop_front().ok_or(Error::TryAgain)
    }

    fn flush(&mut self) -> Result<()> {
        // Every frame is emitted as soon as it is sent
        Ok(())
    }
}
