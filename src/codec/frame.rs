//! Frame representation for uncompressed video data

use crate::error::{Error, Result};
use crate::util::colorspace;
use crate::util::Timestamp;
use std::fmt;

/// Round a dimension up to whole macroblocks
#[inline]
pub fn align16(value: u32) -> u32 {
    (value + 15) & !15
}

/// A YUV 4:2:0 image whose planes cover whole macroblocks
///
/// The display size is what the stream signals; the planes are always
/// allocated for the size padded up to a multiple of 16, all three at once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanarImage {
    width: u32,
    height: u32,
    padded_width: u32,
    padded_height: u32,
    horizontal_scale: u8,
    vertical_scale: u8,
    y: Vec<u8>,
    u: Vec<u8>,
    v: Vec<u8>,
}

impl PlanarImage {
    /// Allocate a black image
    pub fn new(width: u32, height: u32) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(Error::invalid_input(format!(
                "image dimensions must be nonzero, got {}x{}",
                width, height
            )));
        }

        let padded_width = align16(width);
        let padded_height = align16(height);
        let luma = padded_width as usize * padded_height as usize;

        Ok(PlanarImage {
            width,
            height,
            padded_width,
            padded_height,
            horizontal_scale: 0,
            vertical_scale: 0,
            y: vec![0; luma],
            u: vec![128; luma / 4],
            v: vec![128; luma / 4],
        })
    }

    /// Convert an interleaved RGB24 raster, padding by edge replication
    pub fn from_rgb(rgb: &[u8], width: u32, height: u32) -> Result<Self> {
        let mut image = PlanarImage::new(width, height)?;
        let expected = width as usize * height as usize * 3;
        if rgb.len() != expected {
            return Err(Error::invalid_input(format!(
                "RGB buffer holds {} bytes, {}x{} needs {}",
                rgb.len(),
                width,
                height,
                expected
            )));
        }
        colorspace::rgb_to_yuv420(rgb, &mut image);
        Ok(image)
    }

    /// Convert back to an interleaved RGB24 raster of the display size
    pub fn to_rgb(&self) -> Vec<u8> {
        colorspace::yuv420_to_rgb(self)
    }

    /// Copy of this image's geometry with fresh planes
    pub fn blank_like(&self) -> Self {
        let luma = self.y.len();
        PlanarImage {
            y: vec![0; luma],
            u: vec![128; luma / 4],
            v: vec![128; luma / 4],
            ..*self
        }
    }

    pub fn with_scales(mut self, horizontal: u8, vertical: u8) -> Self {
        self.horizontal_scale = horizontal & 3;
        self.vertical_scale = vertical & 3;
        self
    }

    /// Display width
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Display height
    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn padded_width(&self) -> u32 {
        self.padded_width
    }

    pub fn padded_height(&self) -> u32 {
        self.padded_height
    }

    pub fn horizontal_scale(&self) -> u8 {
        self.horizontal_scale
    }

    pub fn vertical_scale(&self) -> u8 {
        self.vertical_scale
    }

    /// Macroblock columns
    pub fn mb_cols(&self) -> usize {
        self.padded_width as usize / 16
    }

    /// Macroblock rows
    pub fn mb_rows(&self) -> usize {
        self.padded_height as usize / 16
    }

    /// Whether `other` has the same display size
    pub fn same_size(&self, other: &PlanarImage) -> bool {
        self.width == other.width && self.height == other.height
    }

    pub fn y_stride(&self) -> usize {
        self.padded_width as usize
    }

    pub fn uv_stride(&self) -> usize {
        self.padded_width as usize / 2
    }

    pub fn y(&self) -> &[u8] {
        &self.y
    }

    pub fn u(&self) -> &[u8] {
        &self.u
    }

    pub fn v(&self) -> &[u8] {
        &self.v
    }

    /// All three planes, mutably
    pub fn planes_mut(&mut self) -> (&mut [u8], &mut [u8], &mut [u8]) {
        (&mut self.y, &mut self.u, &mut self.v)
    }
}

/// A decoded video frame
#[derive(Debug, Clone)]
pub struct VideoFrame {
    /// Picture data
    pub image: PlanarImage,

    /// Presentation timestamp
    pub pts: Timestamp,

    /// Is keyframe
    pub keyframe: bool,

    /// Picture type (I, P)
    pub pict_type: PictureType,
}

impl VideoFrame {
    /// Create a new video frame
    pub fn new(image: PlanarImage) -> Self {
        VideoFrame {
            image,
            pts: Timestamp::none(),
            keyframe: false,
            pict_type: PictureType::None,
        }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }
}

/// Picture type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PictureType {
    /// Intra frame
    I,
    /// Predicted frame
    P,
    /// None/Unknown
    None,
}

impl fmt::Display for PictureType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PictureType::I => write!(f, "I"),
            PictureType::P => write!(f, "P"),
            PictureType::None => write!(f, "?"),
        }
    }
}
