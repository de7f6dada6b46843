//! Codec implementations
//!
//! The codec traits, the uncompressed frame types they exchange, and the
//! VP8 codec.

pub mod decoder;
pub mod encoder;
pub mod frame;
pub mod vp8;

pub use decoder::{create_decoder, Decoder};
pub use encoder::{create_encoder, Encoder};
pub use frame::{PictureType, PlanarImage, VideoFrame};
pub use vp8::{Vp8Decoder, Vp8DecoderConfig, Vp8Encoder, Vp8EncoderConfig};
