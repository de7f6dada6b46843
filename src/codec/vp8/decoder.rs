//! VP8 decoder
//!
//! Decodes keyframes and zero-motion inter frames of a single-partition,
//! unsegmented VP8 stream. Each frame is parsed and reconstructed into
//! fresh state; the reference frame and the persistent probabilities are
//! only replaced once the whole frame decoded, so a failing frame leaves
//! the decoder as it was.

use super::bool_decoder::BoolDecoder;
use super::entropy::{
    decode_block_coeffs, CoeffProbs, BLOCK_TYPE_UV, BLOCK_TYPE_Y2, BLOCK_TYPE_Y_NO_DC,
    BLOCK_TYPE_Y_WITH_DC,
};
use super::frame::{EntropyContext, FrameHeader, FrameTag, MAX_DIMENSION};
use super::macroblock::{MbGrid, MbInfo, NonzeroContext, RefFrame, U_BLOCK_START, Y2_BLOCK};
use super::modes::{read_inter_modes, read_kf_modes};
use super::prediction::{
    chroma_workspace, copy_reference_block, luma_workspace, predict_4x4, predict_block,
    store_workspace, subblock_offset, CHROMA_STRIDE, LUMA_STRIDE,
};
use super::quant::QuantFactors;
use super::tables::IntraMode;
use super::transform::{add_inverse_dct, inverse_wht4x4};
use crate::codec::{Decoder, PictureType, PlanarImage, VideoFrame};
use crate::error::{Error, Result};
use crate::format::Packet;
use crate::util::Timestamp;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tracing::{debug, info, trace, warn};

/// Dequantized coefficients of one macroblock, raster order per block
type MacroblockCoeffs = [[i32; 16]; 25];

/// VP8 decoder configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vp8DecoderConfig {
    /// Largest accepted frame width
    pub max_width: u32,
    /// Largest accepted frame height
    pub max_height: u32,
}

impl Default for Vp8DecoderConfig {
    fn default() -> Self {
        Vp8DecoderConfig {
            max_width: MAX_DIMENSION,
            max_height: MAX_DIMENSION,
        }
    }
}

/// VP8 decoder
pub struct Vp8Decoder {
    config: Vp8DecoderConfig,
    /// Probabilities carried into the next frame
    entropy: EntropyContext,
    /// Reference for inter prediction
    last: Option<PlanarImage>,
    /// Most recently decoded picture
    current: Option<PlanarImage>,
    grid: MbGrid,
    frame_buffer: VecDeque<VideoFrame>,
    frame_count: u64,
}

impl Vp8Decoder {
    /// Create a new VP8 decoder
    pub fn new() -> Self {
        Self::with_config(Vp8DecoderConfig::default())
    }

    /// Create a new VP8 decoder with size limits
    pub fn with_config(config: Vp8DecoderConfig) -> Self {
        info!(
            "VP8 decoder created (max {}x{})",
            config.max_width, config.max_height
        );
        Vp8Decoder {
            config,
            entropy: EntropyContext::default(),
            last: None,
            current: None,
            grid: MbGrid::default(),
            frame_buffer: VecDeque::new(),
            frame_count: 0,
        }
    }

    /// Number of frames decoded successfully
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Most recently decoded picture
    pub fn current_frame(&self) -> Option<&PlanarImage> {
        self.current.as_ref()
    }

    /// Decode one compressed frame
    pub fn decode_frame(&mut self, data: &[u8]) -> Result<&PlanarImage> {
        let (header, image, entropy) = self.decode_uncommitted(data)?;

        if header.refresh_entropy_probs {
            self.entropy = entropy;
        } else if header.is_keyframe() {
            self.entropy = EntropyContext::default();
        }

        if header.refresh_last {
            self.last = Some(image.clone());
        }
        self.frame_count += 1;
        let image: &PlanarImage = self.current.insert(image);
        Ok(image)
    }

    /// Parse and reconstruct a frame without touching the reference state
    fn decode_uncommitted(
        &mut self,
        data: &[u8],
    ) -> Result<(FrameHeader, PlanarImage, EntropyContext)> {
        let tag = FrameTag::parse(data)?;
        if !tag.is_keyframe && self.last.is_none() {
            return Err(Error::invalid_state("inter frame before the first keyframe"));
        }
        let mut entropy = if tag.is_keyframe {
            EntropyContext::default()
        } else {
            self.entropy.clone()
        };

        let (header, mut bd, tokens) = FrameHeader::parse(data, &mut entropy)?;
        debug!(
            "VP8 {} frame: q={} part0={} bytes, tokens={} bytes",
            if header.is_keyframe() { "key" } else { "inter" },
            header.quant.y_ac_qi,
            header.tag.first_partition_size,
            tokens.len()
        );
        self.warn_ignored(&header);

        let mut image = match (&header.keyframe, &self.last) {
            (Some(info), _) => {
                let (width, height) = (info.width as u32, info.height as u32);
                if width > self.config.max_width || height > self.config.max_height {
                    return Err(Error::numeric_guard(format!(
                        "frame size {}x{} exceeds the configured {}x{}",
                        width, height, self.config.max_width, self.config.max_height
                    )));
                }
                debug!("VP8 keyframe {}x{}", width, height);
                PlanarImage::new(width, height)?
                    .with_scales(info.horizontal_scale, info.vertical_scale)
            }
            (None, Some(last)) => last.blank_like(),
            (None, None) => return Err(Error::invalid_state("missing reference frame")),
        };

        let (cols, rows) = (image.mb_cols(), image.mb_rows());
        if header.is_keyframe() || self.grid.cols() != cols || self.grid.rows() != rows {
            self.grid = MbGrid::new(cols, rows);
        }

        for mby in 0..rows {
            for mbx in 0..cols {
                if header.is_keyframe() {
                    read_kf_modes(&mut bd, &mut self.grid, mbx, mby, &header);
                } else {
                    read_inter_modes(&mut bd, &mut self.grid, mbx, mby, &header, &entropy)?;
                }
            }
        }
        bd.check("first partition")?;

        let reference = if header.is_keyframe() {
            None
        } else {
            self.last.as_ref()
        };
        let mut tokens = BoolDecoder::new(tokens)?;
        let mut reconstructor = Reconstructor {
            factors: QuantFactors::from_indices(&header.quant),
            probs: &entropy.coeff,
            nonzero: NonzeroContext::new(cols),
            reference,
        };

        for mby in 0..rows {
            reconstructor.nonzero.start_row();
            for mbx in 0..cols {
                let info = *self.grid.at(mbx, mby);
                reconstructor.macroblock(&mut tokens, &info, mbx, mby, &mut image)?;
            }
        }
        tokens.check("token partition")?;

        Ok((header, image, entropy))
    }

    fn warn_ignored(&self, header: &FrameHeader) {
        if header.loop_filter.level > 0 {
            warn!(
                "loop filter level {} is parsed but not applied",
                header.loop_filter.level
            );
        }
        if !header.is_keyframe()
            && (header.refresh_golden
                || header.refresh_altref
                || header.copy_to_golden != 0
                || header.copy_to_altref != 0)
        {
            warn!("golden/alt-ref updates are ignored");
        }
    }
}

impl Default for Vp8Decoder {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-frame token decoding and pixel reconstruction
struct Reconstructor<'a> {
    factors: QuantFactors,
    probs: &'a CoeffProbs,
    nonzero: NonzeroContext,
    reference: Option<&'a PlanarImage>,
}

impl Reconstructor<'_> {
    fn macroblock(
        &mut self,
        bd: &mut BoolDecoder,
        info: &MbInfo,
        mbx: usize,
        mby: usize,
        image: &mut PlanarImage,
    ) -> Result<()> {
        let mut coeffs = [[0i32; 16]; 25];
        if info.skip {
            self.nonzero.clear_macroblock(mbx, info.has_y2());
        } else {
            self.read_residual(bd, info, mbx, &mut coeffs);
        }
        trace!("MB ({}, {}) {:?} skip={}", mbx, mby, info.y_mode, info.skip);

        let reference = if info.is_inter() {
            if info.ref_frame != RefFrame::Last {
                return Err(Error::unsupported(format!(
                    "prediction from {:?} frame",
                    info.ref_frame
                )));
            }
            if !info.mv.is_zero() {
                return Err(Error::unsupported("nonzero motion vectors"));
            }
            let reference = self
                .reference
                .ok_or_else(|| Error::invalid_state("inter macroblock without a reference"))?;
            Some(reference)
        } else {
            None
        };

        reconstruct_luma(info, reference, &coeffs, mbx, mby, image);
        reconstruct_chroma(info, reference, &coeffs, mbx, mby, image);
        Ok(())
    }

    /// Read the 25 blocks of a macroblock, updating the nonzero trackers
    fn read_residual(
        &mut self,
        bd: &mut BoolDecoder,
        info: &MbInfo,
        mbx: usize,
        coeffs: &mut MacroblockCoeffs,
    ) {
        let luma_type = if info.has_y2() {
            self.read_block(bd, BLOCK_TYPE_Y2, mbx, Y2_BLOCK, &mut coeffs[Y2_BLOCK]);
            BLOCK_TYPE_Y_NO_DC
        } else {
            BLOCK_TYPE_Y_WITH_DC
        };

        for b in 0..U_BLOCK_START {
            self.read_block(bd, luma_type, mbx, b, &mut coeffs[b]);
        }
        for b in U_BLOCK_START..Y2_BLOCK {
            self.read_block(bd, BLOCK_TYPE_UV, mbx, b, &mut coeffs[b]);
        }

        if info.has_y2() {
            let mut dcs = [0i32; 16];
            inverse_wht4x4(&coeffs[Y2_BLOCK], &mut dcs);
            for (block, &dc) in coeffs.iter_mut().zip(dcs.iter()) {
                block[0] = dc;
            }
        }
    }

    fn read_block(
        &mut self,
        bd: &mut BoolDecoder,
        block_type: usize,
        mbx: usize,
        block: usize,
        out: &mut [i32; 16],
    ) {
        let (dc, ac) = self.factors.steps(block_type);
        let ctx = self.nonzero.context(mbx, block);
        let has_tokens =
            decode_block_coeffs(bd, self.probs.for_type(block_type), block_type, ctx, dc, ac, out);
        self.nonzero.set(mbx, block, has_tokens);
    }
}

fn reconstruct_luma(
    info: &MbInfo,
    reference: Option<&PlanarImage>,
    coeffs: &MacroblockCoeffs,
    mbx: usize,
    mby: usize,
    image: &mut PlanarImage,
) {
    let stride = image.y_stride();
    let cols = image.mb_cols();
    let mut ws = luma_workspace(image.y(), stride, mbx, mby, cols);

    match reference {
        Some(reference) => {
            copy_reference_block(reference.y(), stride, mbx * 16, mby * 16, 16, &mut ws, LUMA_STRIDE);
        }
        None if info.y_mode == IntraMode::BPred => {
            for (b, block) in coeffs.iter().take(16).enumerate() {
                let offset = subblock_offset(b);
                predict_4x4(&mut ws, LUMA_STRIDE, offset, info.sub_modes[b]);
                add_inverse_dct(&mut ws[offset..], LUMA_STRIDE, block);
            }
        }
        None => predict_block(&mut ws, LUMA_STRIDE, 16, info.y_mode, mby > 0, mbx > 0),
    }

    if reference.is_some() || info.y_mode != IntraMode::BPred {
        for (b, block) in coeffs.iter().take(16).enumerate() {
            add_inverse_dct(&mut ws[subblock_offset(b)..], LUMA_STRIDE, block);
        }
    }

    let (y, _, _) = image.planes_mut();
    store_workspace(&ws, LUMA_STRIDE, 16, y, stride, mbx * 16, mby * 16);
}

fn reconstruct_chroma(
    info: &MbInfo,
    reference: Option<&PlanarImage>,
    coeffs: &MacroblockCoeffs,
    mbx: usize,
    mby: usize,
    image: &mut PlanarImage,
) {
    let stride = image.uv_stride();

    for plane in 0..2 {
        let source = if plane == 0 { image.u() } else { image.v() };
        let mut ws = chroma_workspace(source, stride, mbx, mby);

        match reference {
            Some(reference) => {
                let ref_plane = if plane == 0 { reference.u() } else { reference.v() };
                copy_reference_block(ref_plane, stride, mbx * 8, mby * 8, 8, &mut ws, CHROMA_STRIDE);
            }
            None => predict_block(&mut ws, CHROMA_STRIDE, 8, info.uv_mode, mby > 0, mbx > 0),
        }

        let first = U_BLOCK_START + plane * 4;
        for (j, block) in coeffs[first..first + 4].iter().enumerate() {
            let offset = (1 + (j / 2) * 4) * CHROMA_STRIDE + 1 + (j % 2) * 4;
            add_inverse_dct(&mut ws[offset..], CHROMA_STRIDE, block);
        }

        let (_, u, v) = image.planes_mut();
        let target = if plane == 0 { u } else { v };
        store_workspace(&ws, CHROMA_STRIDE, 8, target, stride, mbx * 8, mby * 8);
    }
}

impl Decoder for Vp8Decoder {
    fn send_packet(&mut self, packet: &Packet) -> Result<()> {
        if packet.data.is_empty() {
            return Err(Error::invalid_input("Empty VP8 packet"));
        }

        let show = packet.data.as_slice()[0] & 0x10 != 0;
        let frame_index = self.frame_count as i64;
        let image = self.decode_frame(packet.data.as_slice())?.clone();
        if !show {
            debug!("VP8 frame {} is hidden", frame_index);
            return Ok(());
        }

        let keyframe = packet.data.as_slice()[0] & 1 == 0;
        let mut frame = VideoFrame::new(image);
        frame.pts = if packet.pts.is_valid() {
            packet.pts
        } else {
            Timestamp::new(frame_index)
        };
        frame.keyframe = keyframe;
        frame.pict_type = if keyframe { PictureType::I } else { PictureType::P };
        self.frame_buffer.push_back(frame);
        Ok(())
    }

    fn receive_frame(&mut self) -> Result<VideoFrame> {
        self.frame_buffer.pop_front().ok_or(Error::TryAgain)
    }

    fn flush(&mut self) -> Result<()> {
        self.frame_buffer.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::vp8::bool_encoder::Vp8BoolEncoder;
    use crate::codec::vp8::frame::KeyframeInfo;
    use crate::codec::vp8::frame_writer::{build_frame, write_compressed_header};
    use crate::codec::vp8::modes::write_kf_modes;
    use crate::codec::vp8::quant::QuantIndices;
    use crate::codec::vp8::entropy_encoder::encode_block_coeffs;
    use crate::codec::vp8::tables::SubBlockMode;

    /// Keyframe whose macroblocks all use `y_mode` and carry no residual
    fn flat_keyframe(width: u16, height: u16, y_mode: IntraMode) -> Vec<u8> {
        let info = KeyframeInfo {
            width,
            height,
            ..Default::default()
        };
        let header = FrameHeader::keyframe(info, QuantIndices::with_base(10));
        let mut entropy = EntropyContext::default();
        let planned = entropy.coeff.clone();

        let mut part0 = Vp8BoolEncoder::new();
        write_compressed_header(&mut part0, &header, &mut entropy, &planned);

        let (cols, rows) = info.macroblock_dimensions();
        let mut grid = MbGrid::new(cols, rows);
        let mut nonzero = NonzeroContext::new(cols);
        let mut tokens = Vp8BoolEncoder::new();
        for mby in 0..rows {
            nonzero.start_row();
            for mbx in 0..cols {
                let mb = grid.at_mut(mbx, mby);
                mb.y_mode = y_mode;
                mb.sub_modes = [SubBlockMode::from_luma(y_mode); 16];
                write_kf_modes(&mut part0, &grid, mbx, mby, &header);

                let has_y2 = grid.at(mbx, mby).has_y2();
                let mut blocks = Vec::new();
                if has_y2 {
                    blocks.push((BLOCK_TYPE_Y2, Y2_BLOCK));
                }
                let luma = if has_y2 { BLOCK_TYPE_Y_NO_DC } else { BLOCK_TYPE_Y_WITH_DC };
                blocks.extend((0..16).map(|b| (luma, b)));
                blocks.extend((16..24).map(|b| (BLOCK_TYPE_UV, b)));
                for (block_type, b) in blocks {
                    let ctx = nonzero.context(mbx, b);
                    let has = encode_block_coeffs(&mut tokens, &entropy.coeff, block_type, ctx, &[0; 16]);
                    nonzero.set(mbx, b, has);
                }
            }
        }

        build_frame(&header, &part0.finish(), &tokens.finish()).unwrap()
    }

    #[test]
    fn test_decode_flat_keyframe() {
        let frame = flat_keyframe(32, 32, IntraMode::Dc);
        let mut decoder = Vp8Decoder::new();
        let image = decoder.decode_frame(&frame).unwrap();
        assert_eq!(image.width(), 32);
        assert_eq!(image.height(), 32);
        // DC prediction from nothing is 128, and every later block copies it
        assert!(image.y().iter().all(|&p| p == 128));
        assert!(image.u().iter().all(|&p| p == 128));
        assert_eq!(decoder.frame_count(), 1);
    }

    #[test]
    fn test_decode_vertical_edge_constant() {
        let frame = flat_keyframe(16, 16, IntraMode::V);
        let mut decoder = Vp8Decoder::new();
        let image = decoder.decode_frame(&frame).unwrap();
        assert!(image.y().iter().all(|&p| p == 127));
    }

    #[test]
    fn test_inter_before_keyframe() {
        let mut decoder = Vp8Decoder::new();
        let data = [0x01, 0x00, 0x00, 0x00, 0x00];
        let err = decoder.decode_frame(&data).unwrap_err();
        assert!(matches!(err, Error::InvalidState(_)));
    }

    #[test]
    fn test_size_limit() {
        let frame = flat_keyframe(64, 16, IntraMode::Dc);
        let mut decoder = Vp8Decoder::with_config(Vp8DecoderConfig {
            max_width: 32,
            max_height: 32,
        });
        assert!(matches!(
            decoder.decode_frame(&frame),
            Err(Error::NumericGuard(_))
        ));
        assert!(decoder.current_frame().is_none());
    }

    #[test]
    fn test_failed_frame_keeps_state() {
        let good = flat_keyframe(16, 16, IntraMode::Dc);
        let mut decoder = Vp8Decoder::new();
        decoder.decode_frame(&good).unwrap();

        let mut bad = flat_keyframe(48, 48, IntraMode::Dc);
        bad[3] = 0;
        assert!(decoder.decode_frame(&bad).is_err());
        assert_eq!(decoder.frame_count(), 1);
        assert_eq!(decoder.current_frame().map(|f| f.width()), Some(16));
    }

    #[test]
    fn test_trait_queue() {
        let frame = flat_keyframe(16, 16, IntraMode::Tm);
        let mut decoder = Vp8Decoder::new();
        assert!(matches!(decoder.receive_frame(), Err(Error::TryAgain)));

        let packet = Packet::new(0, crate::util::Buffer::from_vec(frame));
        decoder.send_packet(&packet).unwrap();
        let out = decoder.receive_frame().unwrap();
        assert!(out.keyframe);
        assert_eq!(out.pict_type, PictureType::I);
        assert_eq!(out.pts, Timestamp::new(0));
        assert!(matches!(decoder.receive_frame(), Err(Error::TryAgain)));
    }
}
