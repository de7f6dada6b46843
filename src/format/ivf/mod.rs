//! IVF container (video-only)
//!
//! IVF is the minimal container the VPx tools use for elementary streams: a
//! 32-byte file header followed by frames, each behind a 12-byte header
//! carrying its size and timestamp. All integers are little-endian.
//!
//! ```text
//! 0   "DKIF"
//! 4   version (u16, 0)
//! 6   header size (u16, 32)
//! 8   fourcc ("VP80")
//! 12  width, height (u16 each)
//! 16  timebase denominator (u32)
//! 20  timebase numerator (u32)
//! 24  frame count (u32)
//! 28  unused
//! ```

mod reader;
mod writer;

pub use reader::IvfReader;
pub use writer::IvfWriter;

use crate::error::{Error, Result};
use crate::util::Rational;
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::fmt;
use std::io::{Read, Write};

pub const IVF_SIGNATURE: [u8; 4] = *b"DKIF";
pub const IVF_HEADER_SIZE: usize = 32;
pub const IVF_FRAME_HEADER_SIZE: usize = 12;
pub const VP8_FOURCC: [u8; 4] = *b"VP80";

/// Byte offset of the frame count inside the file header
pub(crate) const FRAME_COUNT_OFFSET: u64 = 24;

/// IVF file header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IvfHeader {
    pub fourcc: [u8; 4],
    pub width: u16,
    pub height: u16,
    /// Units of the frame timestamps
    pub timebase: Rational,
    pub frame_count: u32,
}

impl IvfHeader {
    /// Header for a VP8 stream
    pub fn vp8(width: u16, height: u16, timebase: Rational) -> Self {
        IvfHeader {
            fourcc: VP8_FOURCC,
            width,
            height,
            timebase,
            frame_count: 0,
        }
    }

    pub fn is_vp8(&self) -> bool {
        self.fourcc == VP8_FOURCC
    }

    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        if !self.timebase.is_positive() || self.timebase.den > u32::MAX as i64 {
            return Err(Error::invalid_input(format!(
                "IVF timebase {} is not representable",
                self.timebase
            )));
        }

        let mut header = Vec::with_capacity(IVF_HEADER_SIZE);
        header.extend_from_slice(&IVF_SIGNATURE);
        header.write_u16::<LittleEndian>(0)?;
        header.write_u16::<LittleEndian>(IVF_HEADER_SIZE as u16)?;
        header.extend_from_slice(&self.fourcc);
        header.write_u16::<LittleEndian>(self.width)?;
        header.write_u16::<LittleEndian>(self.height)?;
        header.write_u32::<LittleEndian>(self.timebase.den as u32)?;
        header.write_u32::<LittleEndian>(self.timebase.num as u32)?;
        header.write_u32::<LittleEndian>(self.frame_count)?;
        header.write_u32::<LittleEndian>(0)?;

        writer
            .write_all(&header)
            .map_err(|e| Error::format(format!("Failed to write IVF header: {}", e)))
    }

    pub fn read_from<R: Read>(reader: &mut R) -> Result<Self> {
        let mut header = [0u8; IVF_HEADER_SIZE];
        reader
            .read_exact(&mut header)
            .map_err(|e| Error::format(format!("Failed to read IVF header: {}", e)))?;

        if header[0..4] != IVF_SIGNATURE {
            return Err(Error::format(format!(
                "Not an IVF file (signature {:02x?})",
                &header[0..4]
            )));
        }

        let mut fields = &header[4..];
        let _version = fields.read_u16::<LittleEndian>()?;
        let header_size = fields.read_u16::<LittleEndian>()? as usize;
        if header_size < IVF_HEADER_SIZE {
            return Err(Error::format(format!(
                "IVF header size {} is smaller than {}",
                header_size, IVF_HEADER_SIZE
            )));
        }

        let mut fourcc = [0u8; 4];
        fields.read_exact(&mut fourcc)?;
        let width = fields.read_u16::<LittleEndian>()?;
        let height = fields.read_u16::<LittleEndian>()?;
        let den = fields.read_u32::<LittleEndian>()?;
        let num = fields.read_u32::<LittleEndian>()?;
        let frame_count = fields.read_u32::<LittleEndian>()?;

        if num == 0 || den == 0 {
            return Err(Error::format(format!("IVF timebase {}/{} is invalid", num, den)));
        }

        // Skip any extension of the header
        let extra = (header_size - IVF_HEADER_SIZE) as u64;
        if extra > 0 {
            let skipped = std::io::copy(&mut reader.take(extra), &mut std::io::sink())?;
            if skipped != extra {
                return Err(Error::format("Truncated IVF header"));
            }
        }

        Ok(IvfHeader {
            fourcc,
            width,
            height,
            timebase: Rational::new(num as i64, den as i64),
            frame_count,
        })
    }

    /// The fourcc as text, with non-printable bytes replaced
    pub fn fourcc_str(&self) -> String {
        self.fourcc
            .iter()
            .map(|&b| if b.is_ascii_graphic() { b as char } else { '?' })
            .collect()
    }
}

impl fmt::Display for IvfHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "IVF {} {}x{} timebase {} frames {}",
            self.fourcc_str(),
            self.width,
            self.height,
            self.timebase,
            self.frame_count
        )
    }
}
