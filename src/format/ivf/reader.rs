//! IVF reader

use super::{IvfHeader, IVF_FRAME_HEADER_SIZE, IVF_HEADER_SIZE};
use crate::error::{Error, Result};
use crate::format::Packet;
use crate::util::{Buffer, Timestamp};
use byteorder::{ByteOrder, LittleEndian};
use std::io::{ErrorKind, Read};
use tracing::{trace, warn};

/// Largest frame the reader will allocate for
pub const MAX_FRAME_SIZE: u32 = 64 * 1024 * 1024;

/// Reads frames out of an IVF stream
///
/// Also an iterator over packets that stops at the end of the stream and
/// yields the first error it meets.
pub struct IvfReader<R: Read> {
    reader: R,
    header: IvfHeader,
    frames_read: u32,
    position: u64,
    failed: bool,
}

impl<R: Read> IvfReader<R> {
    /// Parse the file header
    pub fn new(mut reader: R) -> Result<Self> {
        let header = IvfHeader::read_from(&mut reader)?;
        if !header.is_vp8() {
            warn!("IVF stream carries {} rather than VP80", header.fourcc_str());
        }

        Ok(IvfReader {
            reader,
            header,
            frames_read: 0,
            position: IVF_HEADER_SIZE as u64,
            failed: false,
        })
    }

    pub fn header(&self) -> &IvfHeader {
        &self.header
    }

    pub fn frames_read(&self) -> u32 {
        self.frames_read
    }

    /// Read the next frame, `Ok(None)` at a clean end of stream
    pub fn read_frame(&mut self) -> Result<Option<(Vec<u8>, i64)>> {
        let mut frame_header = [0u8; IVF_FRAME_HEADER_SIZE];
        let filled = read_full(&mut self.reader, &mut frame_header)?;
        if filled == 0 {
            return Ok(None);
        }
        if filled < IVF_FRAME_HEADER_SIZE {
            return Err(Error::format(format!(
                "Truncated IVF frame header after frame {}",
                self.frames_read
            )));
        }

        let size = LittleEndian::read_u32(&frame_header[0..4]);
        let pts = LittleEndian::read_u64(&frame_header[4..12]) as i64;
        if size > MAX_FRAME_SIZE {
            return Err(Error::numeric_guard(format!(
                "IVF frame of {} bytes exceeds {}",
                size, MAX_FRAME_SIZE
            )));
        }

        let mut data = vec![0u8; size as usize];
        self.reader.read_exact(&mut data).map_err(|e| {
            Error::format(format!("Truncated IVF frame {}: {}", self.frames_read, e))
        })?;

        trace!("IVF frame {}: {} bytes, pts {}", self.frames_read, size, pts);
        self.frames_read += 1;
        self.position += (IVF_FRAME_HEADER_SIZE + data.len()) as u64;
        Ok(Some((data, pts)))
    }

    /// Read the next frame as a packet, [`Error::EndOfStream`] when done
    pub fn read_packet(&mut self) -> Result<Packet> {
        let position = self.position;
        let (data, pts) = self.read_frame()?.ok_or(Error::EndOfStream)?;

        let keyframe = data.first().map_or(false, |tag| tag & 1 == 0);
        let hidden = data.first().map_or(false, |tag| tag & 0x10 == 0);

        let mut packet = Packet::new(0, Buffer::from_vec(data));
        packet.pts = Timestamp::new(pts);
        packet.dts = Timestamp::new(pts);
        packet.duration = 1;
        packet.position = position as i64;
        packet.flags.keyframe = keyframe;
        packet.flags.hidden = hidden;
        Ok(packet)
    }

    pub fn into_inner(self) -> R {
        self.reader
    }
}

impl<R: Read> Iterator for IvfReader<R> {
    type Item = Result<Packet>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        match self.read_packet() {
            Ok(packet) => Some(Ok(packet)),
            Err(Error::EndOfStream) => None,
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}

/// Fill `buf` as far as the stream allows
fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(filled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::ivf::IvfWriter;
    use crate::util::Rational;
    use std::io::Cursor;

    fn stream(frames: &[&[u8]]) -> Vec<u8> {
        let header = IvfHeader::vp8(48, 32, Rational::new(1, 30));
        let mut writer = IvfWriter::new(Cursor::new(Vec::new()), header).unwrap();
        for (i, frame) in frames.iter().enumerate() {
            writer.write_frame(frame, i as i64 * 2).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    #[test]
    fn test_read_packets() {
        let bytes = stream(&[&[0x10, 1, 2], &[0x11, 3]]);
        let mut reader = IvfReader::new(bytes.as_slice()).unwrap();
        assert_eq!(reader.header().width, 48);
        assert_eq!(reader.header().frame_count, 2);

        let first = reader.read_packet().unwrap();
        assert!(first.is_keyframe());
        assert!(!first.flags.hidden);
        assert_eq!(first.position, IVF_HEADER_SIZE as i64);

        let second = reader.read_packet().unwrap();
        assert!(!second.is_keyframe());
        assert_eq!(second.pts, Timestamp::new(2));
        assert_eq!(second.data.as_slice(), &[0x11, 3]);

        assert!(matches!(reader.read_packet(), Err(Error::EndOfStream)));
        assert_eq!(reader.frames_read(), 2);
    }

    #[test]
    fn test_iterator_stops_at_end() {
        let bytes = stream(&[&[0], &[1], &[2]]);
        let packets: Vec<_> = IvfReader::new(bytes.as_slice())
            .unwrap()
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(packets.len(), 3);
    }

    #[test]
    fn test_truncated_frame() {
        let mut bytes = stream(&[&[0, 1, 2, 3]]);
        bytes.truncate(bytes.len() - 2);
        let mut reader = IvfReader::new(bytes.as_slice()).unwrap();
        assert!(matches!(reader.next(), Some(Err(Error::Format(_)))));
        assert!(reader.next().is_none());
    }

    #[test]
    fn test_truncated_frame_header() {
        let mut bytes = stream(&[]);
        bytes.extend_from_slice(&[5, 0, 0]);
        let mut reader = IvfReader::new(bytes.as_slice()).unwrap();
        assert!(matches!(reader.read_frame(), Err(Error::Format(_))));
    }

    #[test]
    fn test_oversized_frame_rejected() {
        let mut bytes = stream(&[]);
        bytes.extend_from_slice(&u32::MAX.to_le_bytes());
        bytes.extend_from_slice(&0u64.to_le_bytes());
        let mut reader = IvfReader::new(bytes.as_slice()).unwrap();
        assert!(matches!(reader.read_frame(), Err(Error::NumericGuard(_))));
    }
}
