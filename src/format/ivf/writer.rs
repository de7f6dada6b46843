//! IVF writer

use super::{IvfHeader, FRAME_COUNT_OFFSET};
use crate::error::{Error, Result};
use crate::format::Packet;
use byteorder::{LittleEndian, WriteBytesExt};
use std::io::{Seek, SeekFrom, Write};
use tracing::debug;

/// Writes VP8 frames into an IVF stream
///
/// The header is written on construction with a zero frame count, which
/// [`finish`](IvfWriter::finish) patches in place.
pub struct IvfWriter<W: Write + Seek> {
    writer: W,
    header: IvfHeader,
    frame_count: u32,
}

impl<W: Write + Seek> IvfWriter<W> {
    pub fn new(mut writer: W, header: IvfHeader) -> Result<Self> {
        let header = IvfHeader {
            frame_count: 0,
            ..header
        };
        header.write_to(&mut writer)?;
        debug!("IVF writer started: {}", header);

        Ok(IvfWriter {
            writer,
            header,
            frame_count: 0,
        })
    }

    pub fn header(&self) -> &IvfHeader {
        &self.header
    }

    /// Frames written so far
    pub fn frame_count(&self) -> u32 {
        self.frame_count
    }

    /// Append one frame with its timestamp in timebase units
    pub fn write_frame(&mut self, data: &[u8], pts: i64) -> Result<()> {
        let frame_len = u32::try_from(data.len()).map_err(|_| {
            Error::invalid_input(format!("Frame of {} bytes is too large for IVF", data.len()))
        })?;

        let mut frame_header = Vec::with_capacity(super::IVF_FRAME_HEADER_SIZE);
        frame_header.write_u32::<LittleEndian>(frame_len)?;
        frame_header.write_u64::<LittleEndian>(pts as u64)?;

        self.writer
            .write_all(&frame_header)
            .map_err(|e| Error::format(format!("Failed to write IVF frame header: {}", e)))?;
        self.writer
            .write_all(data)
            .map_err(|e| Error::format(format!("Failed to write IVF frame: {}", e)))?;

        self.frame_count = self.frame_count.saturating_add(1);
        Ok(())
    }

    /// Append a packet, numbering it by position when it has no timestamp
    pub fn write_packet(&mut self, packet: &Packet) -> Result<()> {
        let pts = if packet.pts.is_valid() {
            packet.pts.value
        } else {
            self.frame_count as i64
        };
        self.write_frame(packet.data.as_slice(), pts)
    }

    /// Patch the frame count into the header and hand back the sink
    pub fn finish(mut self) -> Result<W> {
        self.writer
            .seek(SeekFrom::Start(FRAME_COUNT_OFFSET))
            .map_err(|e| Error::format(format!("Failed to seek IVF header: {}", e)))?;
        self.writer
            .write_u32::<LittleEndian>(self.frame_count)
            .map_err(|e| Error::format(format!("Failed to write frame count: {}", e)))?;
        self.writer
            .seek(SeekFrom::End(0))
            .map_err(|e| Error::format(format!("Failed to seek to end of stream: {}", e)))?;
        self.writer.flush()?;

        debug!("IVF writer finished with {} frames", self.frame_count);
        Ok(self.writer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::ivf::{IVF_FRAME_HEADER_SIZE, IVF_HEADER_SIZE};
    use crate::util::{Buffer, Rational, Timestamp};
    use std::io::Cursor;

    #[test]
    fn test_frame_count_patched() {
        let header = IvfHeader::vp8(32, 32, Rational::new(1, 30));
        let mut writer = IvfWriter::new(Cursor::new(Vec::new()), header).unwrap();
        writer.write_frame(&[1, 2, 3], 0).unwrap();

        let mut packet = Packet::new(0, Buffer::from_vec(vec![4, 5]));
        packet.pts = Timestamp::new(9);
        writer.write_packet(&packet).unwrap();
        assert_eq!(writer.frame_count(), 2);

        let bytes = writer.finish().unwrap().into_inner();
        assert_eq!(bytes.len(), IVF_HEADER_SIZE + 2 * IVF_FRAME_HEADER_SIZE + 5);
        assert_eq!(&bytes[24..28], &2u32.to_le_bytes());

        let second = IVF_HEADER_SIZE + IVF_FRAME_HEADER_SIZE + 3;
        assert_eq!(&bytes[second..second + 4], &2u32.to_le_bytes());
        assert_eq!(&bytes[second + 4..second + 12], &9u64.to_le_bytes());
        assert_eq!(&bytes[second + 12..], &[4, 5]);
    }

    #[test]
    fn test_untimed_packets_numbered() {
        let header = IvfHeader::vp8(16, 16, Rational::new(1, 30));
        let mut writer = IvfWriter::new(Cursor::new(Vec::new()), header).unwrap();
        for _ in 0..3 {
            writer
                .write_packet(&Packet::new(0, Buffer::from_vec(vec![0])))
                .unwrap();
        }
        let bytes = writer.finish().unwrap().into_inner();
        let third = IVF_HEADER_SIZE + 2 * (IVF_FRAME_HEADER_SIZE + 1);
        assert_eq!(&bytes[third + 4..third + 12], &2u64.to_le_bytes());
    }
}
