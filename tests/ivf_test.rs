//! IVF container tests
//!
//! Writes encoded VP8 streams to temporary files and reads them back
//! through the IVF reader and the decoder.

use std::fs::File;
use std::io::{BufReader, Seek, SeekFrom, Write};
use tempfile::NamedTempFile;
use vp8lite::codec::vp8::{Vp8Decoder, Vp8Encoder, Vp8EncoderConfig};
use vp8lite::codec::{Decoder, Encoder, PlanarImage, VideoFrame};
use vp8lite::error::Error;
use vp8lite::format::{IvfHeader, IvfReader, IvfWriter};
use vp8lite::util::{Rational, Timestamp};

#[path = "common/mod.rs"]
mod common;

use common::*;

const WIDTH: u32 = 48;
const HEIGHT: u32 = 32;

/// Encode `count` gradient frames into a temporary IVF file
fn write_stream(count: u32, keyframe_interval: u32) -> (NamedTempFile, Vec<Vec<u8>>) {
    let config = Vp8EncoderConfig {
        width: WIDTH,
        height: HEIGHT,
        keyframe_interval,
        timebase: Rational::new(1, 25),
        ..Default::default()
    };
    let mut encoder = Vp8Encoder::with_config(config).unwrap();

    let file = NamedTempFile::new().unwrap();
    let header = IvfHeader::vp8(WIDTH as u16, HEIGHT as u16, Rational::new(1, 25));
    let mut writer = IvfWriter::new(file.reopen().unwrap(), header).unwrap();

    let mut frames = Vec::new();
    for i in 0..count {
        let image = PlanarImage::from_rgb(&gradient_rgb(WIDTH, HEIGHT, i * 5), WIDTH, HEIGHT)
            .unwrap();
        let mut frame = VideoFrame::new(image);
        frame.pts = Timestamp::new(i as i64);
        encoder.send_frame(&frame).unwrap();

        let packet = encoder.receive_packet().unwrap();
        writer.write_packet(&packet).unwrap();
        frames.push(packet.data.as_slice().to_vec());
    }
    assert_eq!(writer.frame_count(), count);
    writer.finish().unwrap();

    (file, frames)
}

#[test]
fn test_ivf_roundtrip_file() {
    let (file, frames) = write_stream(5, 3);

    let reader = IvfReader::new(BufReader::new(File::open(file.path()).unwrap())).unwrap();
    let header = *reader.header();
    assert!(header.is_vp8());
    assert_eq!((header.width, header.height), (WIDTH as u16, HEIGHT as u16));
    assert_eq!(header.timebase, Rational::new(1, 25));
    assert_eq!(header.frame_count, 5);

    let packets: Vec<_> = reader.collect::<Result<_, Error>>().unwrap();
    assert_eq!(packets.len(), 5);
    for (i, (packet, original)) in packets.iter().zip(frames.iter()).enumerate() {
        assert_eq!(packet.data.as_slice(), original.as_slice());
        assert_eq!(packet.pts, Timestamp::new(i as i64));
        assert_eq!(packet.is_keyframe(), i % 3 == 0);
    }
}

#[test]
fn test_ivf_decode_through_trait() {
    let (file, _) = write_stream(4, 0);

    let reader = IvfReader::new(File::open(file.path()).unwrap()).unwrap();
    let mut decoder = Vp8Decoder::new();
    let mut encoder = Vp8Encoder::with_config(Vp8EncoderConfig {
        width: WIDTH,
        height: HEIGHT,
        keyframe_interval: 0,
        ..Default::default()
    })
    .unwrap();

    for (i, packet) in reader.enumerate() {
        decoder.send_packet(&packet.unwrap()).unwrap();
        let frame = decoder.receive_frame().unwrap();
        assert_eq!((frame.width(), frame.height()), (WIDTH, HEIGHT));
        assert_eq!(frame.keyframe, i == 0);

        // The same source through a second encoder reconstructs identically
        encoder
            .encode_frame(&gradient_rgb(WIDTH, HEIGHT, i as u32 * 5), WIDTH, HEIGHT, false)
            .unwrap();
        assert_eq!(Some(&frame.image), encoder.reconstruction());
    }
    assert_eq!(decoder.frame_count(), 4);
}

#[test]
fn test_ivf_truncated_file() {
    let (file, _) = write_stream(2, 0);
    let len = file.as_file().metadata().unwrap().len();
    file.as_file().set_len(len - 3).unwrap();

    let reader = IvfReader::new(File::open(file.path()).unwrap()).unwrap();
    let results: Vec<_> = reader.collect();
    assert_eq!(results.len(), 2);
    assert!(results[0].is_ok());
    assert!(matches!(results[1], Err(Error::Format(_))));
}

#[test]
fn test_ivf_trailing_partial_header() {
    let (file, _) = write_stream(1, 0);
    let mut handle = file.reopen().unwrap();
    handle.seek(SeekFrom::End(0)).unwrap();
    handle.write_all(&[1, 2, 3, 4, 5]).unwrap();

    let mut reader = IvfReader::new(File::open(file.path()).unwrap()).unwrap();
    assert!(reader.read_packet().is_ok());
    assert!(matches!(reader.read_packet(), Err(Error::Format(_))));
}
