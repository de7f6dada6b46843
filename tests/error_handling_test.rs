//! Error handling tests for vp8lite
//!
//! These tests verify that the decoder and the IVF reader reject malformed,
//! truncated, unsupported or garbage input with the right error instead of
//! panicking, and that a rejected frame leaves the decoder usable.

use std::panic;
use vp8lite::codec::vp8::bool_encoder::Vp8BoolEncoder;
use vp8lite::codec::vp8::frame::{FrameTag, KeyframeInfo};
use vp8lite::codec::vp8::Vp8Decoder;
use vp8lite::error::Error;
use vp8lite::format::IvfReader;

#[path = "common/mod.rs"]
mod common;

use common::*;

// ============================================================================
// Helper Functions
// ============================================================================

/// Test that a closure does not panic
fn assert_no_panic<F: FnOnce() -> R + panic::UnwindSafe, R>(f: F, description: &str) {
    let result = panic::catch_unwind(f);
    assert!(result.is_ok(), "Panic occurred: {}", description);
}

fn valid_keyframe() -> Vec<u8> {
    vp8lite::encode_frame(&gradient_rgb(32, 32, 0), 32, 32).unwrap()
}

/// A 16x16 keyframe whose partition 0 holds the given leading flags
fn keyframe_with_header_bits(write: impl FnOnce(&mut Vp8BoolEncoder)) -> Vec<u8> {
    let mut part0 = Vp8BoolEncoder::new();
    write(&mut part0);
    part0.encode_literal(0, 32);
    let part0 = part0.finish();

    let tag = FrameTag {
        is_keyframe: true,
        version: 0,
        show_frame: true,
        first_partition_size: part0.len() as u32,
    };
    let info = KeyframeInfo {
        width: 16,
        height: 16,
        ..Default::default()
    };

    let mut frame = tag.to_bytes().unwrap().to_vec();
    frame.extend_from_slice(&info.to_bytes());
    frame.extend_from_slice(&part0);
    frame.extend_from_slice(&[0, 0, 0, 0]);
    frame
}

// ============================================================================
// Malformed streams
// ============================================================================

#[test]
fn test_bad_start_code() {
    let mut frame = valid_keyframe();
    frame[3] ^= 0xFF;
    let err = Vp8Decoder::new().decode_frame(&frame).unwrap_err();
    assert!(err.is_malformed(), "{}", err);
}

#[test]
fn test_oversized_first_partition() {
    let mut frame = valid_keyframe();
    let mut tag = FrameTag::parse(&frame).unwrap();
    tag.first_partition_size = frame.len() as u32;
    frame[..3].copy_from_slice(&tag.to_bytes().unwrap());

    let err = Vp8Decoder::new().decode_frame(&frame).unwrap_err();
    assert!(err.is_malformed(), "{}", err);
}

#[test]
fn test_tiny_frames() {
    let mut decoder = Vp8Decoder::new();
    for len in 0..10 {
        let frame = vec![0u8; len];
        let err = decoder.decode_frame(&frame).unwrap_err();
        assert!(err.is_malformed(), "{} bytes: {}", len, err);
    }
}

#[test]
fn test_bad_version() {
    let mut frame = valid_keyframe();
    frame[0] |= 0x7 << 1;
    let err = Vp8Decoder::new().decode_frame(&frame).unwrap_err();
    assert!(err.is_malformed(), "{}", err);
}

// ============================================================================
// Unsupported features
// ============================================================================

#[test]
fn test_segmentation_unsupported() {
    let frame = keyframe_with_header_bits(|be| {
        be.encode_flag(false); // color space
        be.encode_flag(false); // clamping
        be.encode_flag(true); // segmentation enabled
    });
    let err = Vp8Decoder::new().decode_frame(&frame).unwrap_err();
    assert!(err.is_unsupported(), "{}", err);
}

#[test]
fn test_color_space_unsupported() {
    let frame = keyframe_with_header_bits(|be| {
        be.encode_flag(true);
    });
    let err = Vp8Decoder::new().decode_frame(&frame).unwrap_err();
    assert!(err.is_unsupported(), "{}", err);
}

#[test]
fn test_multiple_partitions_unsupported() {
    let frame = keyframe_with_header_bits(|be| {
        be.encode_flag(false);
        be.encode_flag(false);
        be.encode_flag(false);
        // Loop filter: type, level, sharpness, no deltas
        be.encode_flag(false);
        be.encode_literal(0, 6);
        be.encode_literal(0, 3);
        be.encode_flag(false);
        // Two token partitions
        be.encode_literal(1, 2);
    });
    let err = Vp8Decoder::new().decode_frame(&frame).unwrap_err();
    assert!(err.is_unsupported(), "{}", err);
}

// ============================================================================
// Recovery and robustness
// ============================================================================

#[test]
fn test_failed_frame_keeps_decoder_usable() {
    let key = valid_keyframe();
    let mut decoder = Vp8Decoder::new();
    let reference = decoder.decode_frame(&key).unwrap().clone();

    let mut truncated = key.clone();
    truncated[3] = 0;
    assert!(decoder.decode_frame(&truncated).is_err());
    assert_eq!(decoder.frame_count(), 1);
    assert_eq!(decoder.current_frame(), Some(&reference));

    assert_eq!(decoder.decode_frame(&key).unwrap(), &reference);
}

#[test]
fn test_truncated_frames_never_panic() {
    let frame = valid_keyframe();
    for len in 0..frame.len() {
        let prefix = frame[..len].to_vec();
        assert_no_panic(
            move || {
                let _ = Vp8Decoder::new().decode_frame(&prefix);
            },
            &format!("truncated to {} bytes", len),
        );
    }
}

#[test]
fn test_garbage_never_panics() {
    let key = valid_keyframe();
    for seed in 0..64u32 {
        // Pure noise, and noise behind a valid keyframe header
        let noisy = noise(64 + seed as usize * 7, seed);
        let mut framed = key[..10].to_vec();
        framed.extend_from_slice(&noise(200, seed + 1000));

        assert_no_panic(
            move || {
                let mut decoder = Vp8Decoder::new();
                let _ = decoder.decode_frame(&noisy);
                let _ = decoder.decode_frame(&framed);
            },
            &format!("noise seed {}", seed),
        );
    }
}

#[test]
fn test_corrupted_tokens_never_panic() {
    let key = valid_keyframe();
    for offset in (10..key.len()).step_by(3) {
        let mut corrupt = key.clone();
        corrupt[offset] ^= 0x5A;
        assert_no_panic(
            move || {
                let mut decoder = Vp8Decoder::new();
                let _ = decoder.decode_frame(&corrupt);
            },
            &format!("byte {} flipped", offset),
        );
    }
}

// ============================================================================
// Container errors
// ============================================================================

#[test]
fn test_ivf_bad_signature() {
    let mut bytes = vec![0u8; 32];
    bytes[..4].copy_from_slice(b"OggS");
    let err = IvfReader::new(bytes.as_slice()).err().unwrap();
    assert!(matches!(err, Error::Format(_)));
}

#[test]
fn test_ivf_garbage_never_panics() {
    for seed in 0..32u32 {
        let mut bytes = b"DKIF".to_vec();
        bytes.extend_from_slice(&noise(100, seed));
        assert_no_panic(
            move || {
                if let Ok(reader) = IvfReader::new(bytes.as_slice()) {
                    for packet in reader {
                        if packet.is_err() {
                            break;
                        }
                    }
                }
            },
            &format!("IVF noise seed {}", seed),
        );
    }
}
