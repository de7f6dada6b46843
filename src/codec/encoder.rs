//! Encoder trait and factory

use super::VideoFrame;
use crate::error::{Error, Result};
use crate::format::Packet;

/// Encoder trait for encoding frames
///
/// Each frame sent produces exactly one packet, available from
/// [`receive_packet`](Encoder::receive_packet) until [`Error::TryAgain`].
/// A frame whose `keyframe` flag is set forces a keyframe.
pub trait Encoder {
    /// Send a frame to the encoder
    fn send_frame(&mut self, frame: &VideoFrame) -> Result<()>;

    /// Receive an encoded packet
    fn receive_packet(&mut self) -> Result<Packet>;

    /// Flush the encoder
    fn flush(&mut self) -> Result<()>;
}

/// Create an encoder for the given codec and frame size
pub fn create_encoder(codec_id: &str, width: u32, height: u32) -> Result<Box<dyn Encoder>> {
    match codec_id.to_ascii_lowercase().as_str() {
        "vp8" | "vp80" => Ok(Box::new(super::Vp8Encoder::new(width, height)?)),
        _ => Err(Error::unsupported(format!("Encoder for codec '{}'", codec_id))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_encoder() {
        let mut encoder = create_encoder("vp8", 32, 32).unwrap();
        assert!(matches!(encoder.receive_packet(), Err(Error::TryAgain)));
        assert!(create_encoder("vp8", 0, 32).is_err());
        assert!(create_encoder("av1", 32, 32).err().unwrap().is_unsupported());
    }
}
