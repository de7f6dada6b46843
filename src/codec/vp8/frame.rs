//! VP8 frame header parsing
//!
//! This module handles parsing the VP8 frame header from the bitstream,
//! including both the uncompressed header and the compressed header data
//! carried at the start of partition 0.

use byteorder::{ByteOrder, LittleEndian};

use super::bool_decoder::BoolDecoder;
use super::entropy::CoeffProbs;
use super::quant::QuantIndices;
use super::tables::{
    DEFAULT_MV_PROBS, DEFAULT_UV_MODE_PROBS, DEFAULT_YMODE_PROBS, MV_PROB_COUNT, MV_UPDATE_PROBS,
};
use crate::error::{Error, Result};

/// Size of the frame tag
pub const FRAME_TAG_SIZE: usize = 3;
/// Size of the keyframe start code plus dimensions
pub const KEYFRAME_INFO_SIZE: usize = 7;
/// Keyframe start code
pub const KEYFRAME_START_CODE: [u8; 3] = [0x9D, 0x01, 0x2A];
/// Largest first-partition size the 19-bit tag field can describe
pub const MAX_PARTITION_SIZE: usize = (1 << 19) - 1;
/// Largest dimension the 14-bit size fields can describe
pub const MAX_DIMENSION: u32 = (1 << 14) - 1;
/// Highest bitstream version
pub const MAX_VERSION: u8 = 3;

/// Uncompressed 3-byte frame tag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameTag {
    pub is_keyframe: bool,
    pub version: u8,
    pub show_frame: bool,
    pub first_partition_size: u32,
}

impl FrameTag {
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < FRAME_TAG_SIZE {
            return Err(Error::malformed(format!(
                "frame of {} bytes is too small for a frame tag",
                data.len()
            )));
        }

        let raw = LittleEndian::read_u24(&data[..FRAME_TAG_SIZE]);
        let tag = FrameTag {
            is_keyframe: raw & 1 == 0,
            version: ((raw >> 1) & 0x7) as u8,
            show_frame: (raw >> 4) & 1 != 0,
            first_partition_size: raw >> 5,
        };

        if tag.version > MAX_VERSION {
            return Err(Error::malformed(format!(
                "unsupported bitstream version {}",
                tag.version
            )));
        }
        Ok(tag)
    }

    pub fn to_bytes(&self) -> Result<[u8; FRAME_TAG_SIZE]> {
        if self.first_partition_size as usize > MAX_PARTITION_SIZE {
            return Err(Error::numeric_guard(format!(
                "first partition of {} bytes does not fit the frame tag",
                self.first_partition_size
            )));
        }

        let raw = (!self.is_keyframe as u32)
            | ((self.version as u32 & 0x7) << 1)
            | ((self.show_frame as u32) << 4)
            | (self.first_partition_size << 5);
        let mut bytes = [0u8; FRAME_TAG_SIZE];
        LittleEndian::write_u24(&mut bytes, raw);
        Ok(bytes)
    }
}

/// Keyframe start code and dimensions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct KeyframeInfo {
    pub width: u16,
    pub horizontal_scale: u8,
    pub height: u16,
    pub vertical_scale: u8,
}

impl KeyframeInfo {
    /// Parse from the bytes that follow the frame tag
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < KEYFRAME_INFO_SIZE {
            return Err(Error::malformed("keyframe header truncated"));
        }
        if data[..3] != KEYFRAME_START_CODE {
            return Err(Error::malformed(format!(
                "invalid keyframe start code {:02X} {:02X} {:02X}",
                data[0], data[1], data[2]
            )));
        }

        let w = LittleEndian::read_u16(&data[3..5]);
        let h = LittleEndian::read_u16(&data[5..7]);
        let info = KeyframeInfo {
            width: w & 0x3FFF,
            horizontal_scale: (w >> 14) as u8,
            height: h & 0x3FFF,
            vertical_scale: (h >> 14) as u8,
        };

        if info.width == 0 || info.height == 0 {
            return Err(Error::malformed(format!(
                "keyframe declares empty frame {}x{}",
                info.width, info.height
            )));
        }
        Ok(info)
    }

    pub fn to_bytes(&self) -> [u8; KEYFRAME_INFO_SIZE] {
        let mut bytes = [0u8; KEYFRAME_INFO_SIZE];
        bytes[..3].copy_from_slice(&KEYFRAME_START_CODE);
        LittleEndian::write_u16(
            &mut bytes[3..5],
            (self.width & 0x3FFF) | ((self.horizontal_scale as u16 & 0x3) << 14),
        );
        LittleEndian::write_u16(
            &mut bytes[5..7],
            (self.height & 0x3FFF) | ((self.vertical_scale as u16 & 0x3) << 14),
        );
        bytes
    }

    /// Get number of macroblocks
    pub fn macroblock_dimensions(&self) -> (usize, usize) {
        ((self.width as usize + 15) >> 4, (self.height as usize + 15) >> 4)
    }
}

/// Loop filter type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FilterType {
    #[default]
    Normal,
    Simple,
}

/// Loop filter header; parsed and carried but never applied to pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LoopFilterHeader {
    pub filter_type: FilterType,
    pub level: u8,
    pub sharpness: u8,
    pub delta_enabled: bool,
    pub delta_update: bool,
    pub ref_deltas: [i8; 4],
    pub mode_deltas: [i8; 4],
}

impl LoopFilterHeader {
    fn parse(bd: &mut BoolDecoder) -> Self {
        let mut lf = LoopFilterHeader {
            filter_type: if bd.read_flag() {
                FilterType::Simple
            } else {
                FilterType::Normal
            },
            level: bd.read_literal(6) as u8,
            sharpness: bd.read_literal(3) as u8,
            ..Default::default()
        };

        lf.delta_enabled = bd.read_flag();
        if lf.delta_enabled {
            lf.delta_update = bd.read_flag();
            if lf.delta_update {
                for delta in lf.ref_deltas.iter_mut().chain(lf.mode_deltas.iter_mut()) {
                    if bd.read_flag() {
                        *delta = bd.read_signed_literal(6) as i8;
                    }
                }
            }
        }
        lf
    }
}

/// Luma and chroma mode probabilities for inter frames
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModeProbs {
    pub ymode: [u8; 4],
    pub uv_mode: [u8; 3],
}

impl Default for ModeProbs {
    fn default() -> Self {
        ModeProbs {
            ymode: DEFAULT_YMODE_PROBS,
            uv_mode: DEFAULT_UV_MODE_PROBS,
        }
    }
}

impl ModeProbs {
    fn update(&mut self, bd: &mut BoolDecoder) {
        if bd.read_flag() {
            for p in self.ymode.iter_mut() {
                *p = bd.read_literal(8) as u8;
            }
        }
        if bd.read_flag() {
            for p in self.uv_mode.iter_mut() {
                *p = bd.read_literal(8) as u8;
            }
        }
    }
}

/// Motion vector probabilities
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MvProbs {
    pub probs: [[u8; MV_PROB_COUNT]; 2],
}

impl Default for MvProbs {
    fn default() -> Self {
        MvProbs {
            probs: DEFAULT_MV_PROBS,
        }
    }
}

impl MvProbs {
    /// Update MV probabilities from bitstream
    pub fn update(&mut self, bd: &mut BoolDecoder) {
        for comp in 0..2 {
            for i in 0..MV_PROB_COUNT {
                if bd.read_bool(MV_UPDATE_PROBS[comp][i]) {
                    let value = bd.read_literal(7) as u8;
                    self.probs[comp][i] = if value == 0 { 1 } else { value << 1 };
                }
            }
        }
    }
}

/// Every probability that persists from frame to frame
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntropyContext {
    pub coeff: CoeffProbs,
    pub modes: ModeProbs,
    pub mv: MvProbs,
}

/// Parsed frame header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameHeader {
    pub tag: FrameTag,
    /// Present on keyframes only
    pub keyframe: Option<KeyframeInfo>,
    /// Set when reconstructed pixels are already in range and need no clamping
    pub clamping_type: bool,
    pub loop_filter: LoopFilterHeader,
    pub quant: QuantIndices,

    pub refresh_golden: bool,
    pub refresh_altref: bool,
    pub copy_to_golden: u8,
    pub copy_to_altref: u8,
    pub sign_bias_golden: bool,
    pub sign_bias_altref: bool,
    pub refresh_entropy_probs: bool,
    pub refresh_last: bool,

    pub mb_no_coeff_skip: bool,
    pub prob_skip_false: u8,
    pub prob_intra: u8,
    pub prob_last: u8,
    pub prob_golden: u8,
}

impl FrameHeader {
    /// Header of a keyframe with nothing signalled beyond the quantizer
    pub fn keyframe(info: KeyframeInfo, quant: QuantIndices) -> Self {
        FrameHeader {
            tag: FrameTag {
                is_keyframe: true,
                version: 0,
                show_frame: true,
                first_partition_size: 0,
            },
            keyframe: Some(info),
            clamping_type: false,
            loop_filter: LoopFilterHeader::default(),
            quant,
            refresh_golden: true,
            refresh_altref: true,
            copy_to_golden: 0,
            copy_to_altref: 0,
            sign_bias_golden: false,
            sign_bias_altref: false,
            refresh_entropy_probs: true,
            refresh_last: true,
            mb_no_coeff_skip: false,
            prob_skip_false: 128,
            prob_intra: 0,
            prob_last: 0,
            prob_golden: 0,
        }
    }

    /// Header of an inter frame predicting from the last frame only
    pub fn inter(quant: QuantIndices) -> Self {
        let mut header = Self::keyframe(KeyframeInfo::default(), quant);
        header.tag.is_keyframe = false;
        header.keyframe = None;
        header.refresh_golden = false;
        header.refresh_altref = false;
        // Every macroblock inter coded from the last frame
        header.prob_intra = 1;
        header.prob_last = 255;
        header.prob_golden = 128;
        header
    }

    /// Check if this is a keyframe
    pub fn is_keyframe(&self) -> bool {
        self.tag.is_keyframe
    }

    /// Parse the uncompressed header and the compressed header fields
    ///
    /// `entropy` must already be reset for keyframes; the header's
    /// probability updates are applied to it. Returns the header, the
    /// partition-0 decoder positioned at the first macroblock, and the
    /// token partition.
    pub fn parse<'a>(
        data: &'a [u8],
        entropy: &mut EntropyContext,
    ) -> Result<(Self, BoolDecoder<'a>, &'a [u8])> {
        let tag = FrameTag::parse(data)?;
        let mut offset = FRAME_TAG_SIZE;

        let keyframe = if tag.is_keyframe {
            let info = KeyframeInfo::parse(&data[offset..])?;
            offset += KEYFRAME_INFO_SIZE;
            Some(info)
        } else {
            None
        };

        let part0_size = tag.first_partition_size as usize;
        let remaining = data.len() - offset;
        if part0_size > remaining {
            return Err(Error::malformed(format!(
                "first partition claims {} bytes but only {} remain",
                part0_size, remaining
            )));
        }
        let partition0 = &data[offset..offset + part0_size];
        let tokens = &data[offset + part0_size..];

        let mut bd = BoolDecoder::new(partition0)?;
        let header = Self::parse_compressed(&mut bd, tag, keyframe, entropy)?;
        bd.check("frame header")?;

        if tokens.len() < 2 {
            return Err(Error::malformed("token partition missing"));
        }
        Ok((header, bd, tokens))
    }

    fn parse_compressed(
        bd: &mut BoolDecoder,
        tag: FrameTag,
        keyframe: Option<KeyframeInfo>,
        entropy: &mut EntropyContext,
    ) -> Result<Self> {
        let mut header = if tag.is_keyframe {
            Self::keyframe(keyframe.unwrap_or_default(), QuantIndices::default())
        } else {
            Self::inter(QuantIndices::default())
        };
        header.tag = tag;
        header.keyframe = keyframe;

        if tag.is_keyframe {
            if bd.read_flag() {
                return Err(Error::unsupported("non-default color space"));
            }
            header.clamping_type = bd.read_flag();
        }

        if bd.read_flag() {
            return Err(Error::unsupported("segmentation"));
        }

        header.loop_filter = LoopFilterHeader::parse(bd);

        let log2_partitions = bd.read_literal(2);
        if log2_partitions != 0 {
            return Err(Error::unsupported(format!(
                "{} token partitions",
                1 << log2_partitions
            )));
        }

        header.quant = QuantIndices {
            y_ac_qi: bd.read_literal(7) as u8,
            y_dc_delta: bd.read_optional_signed(4) as i8,
            y2_dc_delta: bd.read_optional_signed(4) as i8,
            y2_ac_delta: bd.read_optional_signed(4) as i8,
            uv_dc_delta: bd.read_optional_signed(4) as i8,
            uv_ac_delta: bd.read_optional_signed(4) as i8,
        };

        if !tag.is_keyframe {
            header.refresh_golden = bd.read_flag();
            header.refresh_altref = bd.read_flag();
            if !header.refresh_golden {
                header.copy_to_golden = bd.read_literal(2) as u8;
            }
            if !header.refresh_altref {
                header.copy_to_altref = bd.read_literal(2) as u8;
            }
            header.sign_bias_golden = bd.read_flag();
            header.sign_bias_altref = bd.read_flag();
        }

        header.refresh_entropy_probs = bd.read_flag();
        header.refresh_last = if tag.is_keyframe { true } else { bd.read_flag() };

        entropy.coeff.update(bd);

        header.mb_no_coeff_skip = bd.read_flag();
        if header.mb_no_coeff_skip {
            header.prob_skip_false = bd.read_literal(8) as u8;
        }

        if !tag.is_keyframe {
            header.prob_intra = bd.read_literal(8) as u8;
            header.prob_last = bd.read_literal(8) as u8;
            header.prob_golden = bd.read_literal(8) as u8;
            entropy.modes.update(bd);
            entropy.mv.update(bd);
        }

        Ok(header)
    }
}
