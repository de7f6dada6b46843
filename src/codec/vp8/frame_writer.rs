//! VP8 frame header writing
//!
//! This module handles writing VP8 frame headers to the bitstream,
//! including both the uncompressed header and the compressed header data.
//! Field order mirrors [`FrameHeader::parse`](super::frame::FrameHeader::parse).

use super::bool_encoder::Vp8BoolEncoder;
use super::entropy::CoeffProbs;
use super::entropy_encoder::encode_coeff_updates;
use super::frame::{
    EntropyContext, FilterType, FrameHeader, FrameTag, LoopFilterHeader, FRAME_TAG_SIZE,
    KEYFRAME_INFO_SIZE, MAX_DIMENSION,
};
use super::quant::QuantIndices;
use super::tables::{MV_PROB_COUNT, MV_UPDATE_PROBS};
use crate::error::{Error, Result};

/// Write the compressed header fields at the start of partition 0
///
/// Coefficient probabilities in `entropy` are moved to `planned` as the
/// updates are signalled. Mode and motion vector probabilities are never
/// updated.
pub fn write_compressed_header(
    encoder: &mut Vp8BoolEncoder,
    header: &FrameHeader,
    entropy: &mut EntropyContext,
    planned: &CoeffProbs,
) -> usize {
    let keyframe = header.is_keyframe();

    if keyframe {
        // Color space 0 (YUV) and the clamping type
        encoder.encode_flag(false);
        encoder.encode_flag(header.clamping_type);
    }

    // No segmentation
    encoder.encode_flag(false);

    write_loop_filter(encoder, &header.loop_filter);

    // One token partition
    encoder.encode_literal(0, 2);

    write_quantization(encoder, &header.quant);

    if !keyframe {
        encoder.encode_flag(header.refresh_golden);
        encoder.encode_flag(header.refresh_altref);
        if !header.refresh_golden {
            encoder.encode_literal(header.copy_to_golden as u32, 2);
        }
        if !header.refresh_altref {
            encoder.encode_literal(header.copy_to_altref as u32, 2);
        }
        encoder.encode_flag(header.sign_bias_golden);
        encoder.encode_flag(header.sign_bias_altref);
    }

    encoder.encode_flag(header.refresh_entropy_probs);
    if !keyframe {
        encoder.encode_flag(header.refresh_last);
    }

    let updated = encode_coeff_updates(encoder, &mut entropy.coeff, planned);

    encoder.encode_flag(header.mb_no_coeff_skip);
    if header.mb_no_coeff_skip {
        encoder.encode_literal(header.prob_skip_false as u32, 8);
    }

    if !keyframe {
        encoder.encode_literal(header.prob_intra as u32, 8);
        encoder.encode_literal(header.prob_last as u32, 8);
        encoder.encode_literal(header.prob_golden as u32, 8);
        // Luma and chroma mode probabilities unchanged
        encoder.encode_flag(false);
        encoder.encode_flag(false);
        for comp_probs in MV_UPDATE_PROBS.iter() {
            for &prob in comp_probs.iter().take(MV_PROB_COUNT) {
                encoder.encode_bool(false, prob);
            }
        }
    }

    updated
}

fn write_loop_filter(encoder: &mut Vp8BoolEncoder, lf: &LoopFilterHeader) {
    encoder.encode_flag(lf.filter_type == FilterType::Simple);
    encoder.encode_literal(lf.level as u32, 6);
    encoder.encode_literal(lf.sharpness as u32, 3);

    encoder.encode_flag(lf.delta_enabled);
    if lf.delta_enabled {
        encoder.encode_flag(lf.delta_update);
        if lf.delta_update {
            for &delta in lf.ref_deltas.iter().chain(lf.mode_deltas.iter()) {
                encoder.encode_optional_signed(delta as i32, 6);
            }
        }
    }
}

fn write_quantization(encoder: &mut Vp8BoolEncoder, quant: &QuantIndices) {
    encoder.encode_literal(quant.y_ac_qi as u32, 7);
    for delta in [
        quant.y_dc_delta,
        quant.y2_dc_delta,
        quant.y2_ac_delta,
        quant.uv_dc_delta,
        quant.uv_ac_delta,
    ] {
        encoder.encode_optional_signed(delta as i32, 4);
    }
}

/// Build a complete VP8 frame from header and partitions
pub fn build_frame(header: &FrameHeader, first_partition: &[u8], tokens: &[u8]) -> Result<Vec<u8>> {
    let tag = FrameTag {
        first_partition_size: first_partition.len().try_into().map_err(|_| {
            Error::numeric_guard(format!(
                "first partition of {} bytes is too large",
                first_partition.len()
            ))
        })?,
        ..header.tag
    };

    let mut output = Vec::with_capacity(
        FRAME_TAG_SIZE + KEYFRAME_INFO_SIZE + first_partition.len() + tokens.len(),
    );
    output.extend_from_slice(&tag.to_bytes()?);

    if let Some(info) = header.keyframe {
        if info.width as u32 > MAX_DIMENSION || info.height as u32 > MAX_DIMENSION {
            return Err(Error::numeric_guard(format!(
                "frame size {}x{} exceeds the 14-bit limit",
                info.width, info.height
            )));
        }
        output.extend_from_slice(&info.to_bytes());
    }

    output.extend_from_slice(first_partition);
    output.extend_from_slice(tokens);
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::vp8::frame::KeyframeInfo;

    fn info(width: u16, height: u16) -> KeyframeInfo {
        KeyframeInfo {
            width,
            height,
            ..Default::default()
        }
    }

    fn roundtrip(header: &FrameHeader, start: &EntropyContext) -> (FrameHeader, EntropyContext) {
        let mut enc_entropy = start.clone();
        let mut planned = start.coeff.clone();
        planned.probs[2][1][0][0] = 17;

        let mut part0 = Vp8BoolEncoder::new();
        write_compressed_header(&mut part0, header, &mut enc_entropy, &planned);
        let part0 = part0.finish();
        let frame = build_frame(header, &part0, &[0, 0]).unwrap();

        let mut dec_entropy = start.clone();
        let (parsed, _, tokens) = FrameHeader::parse(&frame, &mut dec_entropy).unwrap();
        assert_eq!(tokens, &[0, 0]);
        assert_eq!(dec_entropy, enc_entropy);
        (parsed, dec_entropy)
    }

    #[test]
    fn test_keyframe_header_roundtrip() {
        let mut header = FrameHeader::keyframe(info(640, 480), QuantIndices::with_base(30));
        header.quant.uv_ac_delta = -7;
        header.quant.y2_dc_delta = 15;
        header.mb_no_coeff_skip = true;
        header.prob_skip_false = 200;
        header.loop_filter = LoopFilterHeader {
            filter_type: FilterType::Simple,
            level: 63,
            sharpness: 5,
            delta_enabled: true,
            delta_update: true,
            ref_deltas: [2, 0, -2, -2],
            mode_deltas: [4, -2, 2, 4],
        };

        let (parsed, entropy) = roundtrip(&header, &EntropyContext::default());
        let mut expected = header.clone();
        expected.tag.first_partition_size = parsed.tag.first_partition_size;
        assert_eq!(parsed, expected);
        assert_eq!(entropy.coeff.probs[2][1][0][0], 17);
    }

    #[test]
    fn test_clamping_type_bit() {
        for clamping_type in [false, true] {
            let mut header = FrameHeader::keyframe(info(16, 16), QuantIndices::default());
            header.clamping_type = clamping_type;
            let (parsed, _) = roundtrip(&header, &EntropyContext::default());
            assert_eq!(parsed.clamping_type, clamping_type);
        }
    }

    #[test]
    fn test_inter_header_roundtrip() {
        let mut header = FrameHeader::inter(QuantIndices::with_base(64));
        header.refresh_entropy_probs = false;
        header.copy_to_golden = 1;
        header.copy_to_altref = 2;
        header.sign_bias_altref = true;

        let (parsed, _) = roundtrip(&header, &EntropyContext::default());
        let mut expected = header.clone();
        expected.tag.first_partition_size = parsed.tag.first_partition_size;
        assert_eq!(parsed, expected);
    }

    #[test]
    fn test_build_frame_layout() {
        let header = FrameHeader::keyframe(info(32, 16), QuantIndices::default());
        let frame = build_frame(&header, &[1, 2, 3], &[4, 5]).unwrap();
        assert_eq!(frame.len(), 10 + 3 + 2);
        assert_eq!(&frame[3..6], &[0x9D, 0x01, 0x2A]);
        assert_eq!(frame[6], 32);
        assert_eq!(frame[8], 16);
        assert_eq!(&frame[10..], &[1, 2, 3, 4, 5]);

        let tag = FrameTag::parse(&frame).unwrap();
        assert!(tag.is_keyframe);
        assert_eq!(tag.first_partition_size, 3);
    }

    #[test]
    fn test_build_frame_rejects_huge_dimensions() {
        let header = FrameHeader::keyframe(info(20000, 16), QuantIndices::default());
        assert!(matches!(
            build_frame(&header, &[0, 0], &[0, 0]),
            Err(Error::NumericGuard(_))
        ));
    }
}
