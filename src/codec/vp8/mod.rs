//! VP8 video codec implementation
//!
//! A pure Rust codec for the intra-centric subset of VP8: keyframes with
//! every intra prediction mode, and inter frames whose macroblocks are
//! intra coded or predicted from the last frame with a zero motion vector.
//! Segmentation, multiple token partitions, the loop filter and sub-pixel
//! motion compensation are outside the subset; streams that use them fail
//! with [`Error::Unsupported`](crate::Error::Unsupported).
//!
//! ## Layout
//!
//! - `bool_decoder` / `bool_encoder`: the boolean entropy coder
//! - `frame` / `frame_writer`: frame tag, keyframe header, partition 0 headers
//! - `modes`: per-macroblock mode syntax
//! - `entropy` / `entropy_encoder`: coefficient tokens
//! - `quant`, `transform`, `prediction`: reconstruction
//! - `decoder` / `encoder`: the frame-level state machines
//!
//! ## Example
//!
//! ```no_run
//! use vp8lite::codec::vp8::{Vp8Decoder, Vp8Encoder};
//!
//! let mut encoder = Vp8Encoder::new(64, 64)?;
//! let frame = encoder.encode_frame(&vec![128u8; 64 * 64 * 3], 64, 64, false)?;
//!
//! let mut decoder = Vp8Decoder::new();
//! let image = decoder.decode_frame(&frame)?;
//! assert_eq!(image.width(), 64);
//! # Ok::<(), vp8lite::Error>(())
//! ```

pub mod bool_decoder;
pub mod bool_encoder;
pub mod decoder;
pub mod encoder;
pub mod entropy;
pub mod entropy_encoder;
pub mod frame;
pub mod frame_writer;
pub mod macroblock;
pub mod modes;
pub mod prediction;
pub mod quant;
pub mod tables;
pub mod transform;

pub use decoder::{Vp8Decoder, Vp8DecoderConfig};
pub use encoder::{Vp8Encoder, Vp8EncoderConfig};
pub use frame::{FrameHeader, FrameTag, KeyframeInfo};
