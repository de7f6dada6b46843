//! Decoder trait and factory

use super::VideoFrame;
use crate::error::{Error, Result};
use crate::format::Packet;

/// Decoder trait for decoding compressed data
///
/// Packets go in with [`send_packet`](Decoder::send_packet); decoded frames
/// come out of [`receive_frame`](Decoder::receive_frame), which returns
/// [`Error::TryAgain`] once the queue is drained.
pub trait Decoder {
    /// Send a packet to the decoder
    fn send_packet(&mut self, packet: &Packet) -> Result<()>;

    /// Receive a decoded frame
    fn receive_frame(&mut self) -> Result<VideoFrame>;

    /// Drop any queued frames
    fn flush(&mut self) -> Result<()>;
}

/// Create a decoder for the given codec
pub fn create_decoder(codec_id: &str) -> Result<Box<dyn Decoder>> {
    match codec_id.to_ascii_lowercase().as_str() {
        "vp8" | "vp80" => Ok(Box::new(super::Vp8Decoder::new())),
        _ => Err(Error::unsupported(format!("Decoder for codec '{}'", codec_id))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_decoder() {
        let mut decoder = create_decoder("VP8").unwrap();
        assert!(matches!(decoder.receive_frame(), Err(Error::TryAgain)));
        assert!(create_decoder("h264").err().unwrap().is_unsupported());
    }
}
