//! Color Space Conversion Utilities
//!
//! Converts between interleaved RGB24 rasters and the YUV 4:2:0 planes the
//! codec works on, using full-range ITU-R BT.601 coefficients in 8-bit
//! fixed point:
//!
//! - Y: 0-255
//! - U/V: 0-255, centered on 128
//!
//! Chroma is subsampled by averaging each 2x2 block. Rows are converted in
//! parallel on the global `rayon` pool.

use crate::codec::PlanarImage;
use rayon::prelude::*;

/// RGB color (8-bit per channel)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    /// Create a new RGB color
    pub fn new(r: u8, g: u8, b: u8) -> Self {
        Rgb { r, g, b }
    }

    /// Create from slice [r, g, b]
    pub fn from_slice(data: &[u8]) -> Self {
        Rgb {
            r: data[0],
            g: data[1],
            b: data[2],
        }
    }

    /// Convert to array [r, g, b]
    pub fn to_array(&self) -> [u8; 3] {
        [self.r, self.g, self.b]
    }
}

/// YUV color
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Yuv {
    pub y: u8,
    pub u: u8,
    pub v: u8,
}

impl Yuv {
    /// Create a new YUV color
    pub fn new(y: u8, u: u8, v: u8) -> Self {
        Yuv { y, u, v }
    }
}

/// Clamp to the 8-bit range
#[inline]
pub fn clamp_u8(v: i32) -> u8 {
    v.clamp(0, 255) as u8
}

#[inline]
fn luma(r: i32, g: i32, b: i32) -> i32 {
    (77 * r + 150 * g + 29 * b + 128) >> 8
}

#[inline]
fn chroma_u(r: i32, g: i32, b: i32) -> i32 {
    ((-43 * r - 85 * g + 128 * b + 128) >> 8) + 128
}

#[inline]
fn chroma_v(r: i32, g: i32, b: i32) -> i32 {
    ((128 * r - 107 * g - 21 * b + 128) >> 8) + 128
}

/// RGB to YUV conversion of one pixel
pub fn rgb_to_yuv(rgb: Rgb) -> Yuv {
    let (r, g, b) = (rgb.r as i32, rgb.g as i32, rgb.b as i32);
    Yuv::new(
        clamp_u8(luma(r, g, b)),
        clamp_u8(chroma_u(r, g, b)),
        clamp_u8(chroma_v(r, g, b)),
    )
}

/// YUV to RGB conversion of one pixel
pub fn yuv_to_rgb(yuv: Yuv) -> Rgb {
    let y = yuv.y as i32;
    let u = yuv.u as i32 - 128;
    let v = yuv.v as i32 - 128;
    Rgb::new(
        clamp_u8(y + ((359 * v + 128) >> 8)),
        clamp_u8(y - ((88 * u + 183 * v + 128) >> 8)),
        clamp_u8(y + ((454 * u + 128) >> 8)),
    )
}

/// Fill the planes of `image` from an RGB24 raster of its display size
///
/// Pixels past the display size replicate the last column and row.
pub fn rgb_to_yuv420(rgb: &[u8], image: &mut PlanarImage) {
    let width = image.width() as usize;
    let height = image.height() as usize;
    let y_stride = image.y_stride();
    let uv_stride = image.uv_stride();

    let pixel = move |x: usize, y: usize| -> (i32, i32, i32) {
        let idx = (y.min(height - 1) * width + x.min(width - 1)) * 3;
        (rgb[idx] as i32, rgb[idx + 1] as i32, rgb[idx + 2] as i32)
    };

    let (y_plane, u_plane, v_plane) = image.planes_mut();

    y_plane
        .par_chunks_mut(y_stride)
        .enumerate()
        .for_each(|(row, line)| {
            for (x, out) in line.iter_mut().enumerate() {
                let (r, g, b) = pixel(x, row);
                *out = clamp_u8(luma(r, g, b));
            }
        });

    u_plane
        .par_chunks_mut(uv_stride)
        .zip(v_plane.par_chunks_mut(uv_stride))
        .enumerate()
        .for_each(|(row, (u_line, v_line))| {
            for x in 0..uv_stride {
                let mut u_sum = 0;
                let mut v_sum = 0;
                for (dx, dy) in [(0, 0), (1, 0), (0, 1), (1, 1)] {
                    let (r, g, b) = pixel(2 * x + dx, 2 * row + dy);
                    u_sum += chroma_u(r, g, b);
                    v_sum += chroma_v(r, g, b);
                }
                u_line[x] = clamp_u8((u_sum + 2) >> 2);
                v_line[x] = clamp_u8((v_sum + 2) >> 2);
            }
        });
}

/// Convert the display area of `image` to an RGB24 raster
pub fn yuv420_to_rgb(image: &PlanarImage) -> Vec<u8> {
    let width = image.width() as usize;
    let height = image.height() as usize;
    let y_stride = image.y_stride();
    let uv_stride = image.uv_stride();
    let (y_plane, u_plane, v_plane) = (image.y(), image.u(), image.v());

    let mut rgb = vec![0u8; width * height * 3];
    rgb.par_chunks_mut(width * 3)
        .enumerate()
        .for_each(|(row, line)| {
            for x in 0..width {
                let c = (row / 2) * uv_stride + x / 2;
                let out = yuv_to_rgb(Yuv::new(y_plane[row * y_stride + x], u_plane[c], v_plane[c]));
                line[x * 3..x * 3 + 3].copy_from_slice(&out.to_array());
            }
        });
    rgb
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gray_is_neutral() {
        for level in [0u8, 64, 128, 200, 255] {
            let yuv = rgb_to_yuv(Rgb::new(level, level, level));
            assert!((yuv.y as i32 - level as i32).abs() <= 1);
            assert!((yuv.u as i32 - 128).abs() <= 1);
            assert!((yuv.v as i32 - 128).abs() <= 1);
        }
    }

    #[test]
    fn test_pixel_roundtrip() {
        let colors = [
            Rgb::new(255, 0, 0),
            Rgb::new(0, 255, 0),
            Rgb::new(0, 0, 255),
            Rgb::new(12, 200, 99),
            Rgb::new(128, 128, 128),
        ];
        for rgb in colors {
            let back = yuv_to_rgb(rgb_to_yuv(rgb));
            assert!((back.r as i32 - rgb.r as i32).abs() <= 4, "{:?} -> {:?}", rgb, back);
            assert!((back.g as i32 - rgb.g as i32).abs() <= 4, "{:?} -> {:?}", rgb, back);
            assert!((back.b as i32 - rgb.b as i32).abs() <= 4, "{:?} -> {:?}", rgb, back);
        }
    }

    #[test]
    fn test_edge_replication() {
        // 3x1 image: black, black, white
        let rgb = [0, 0, 0, 0, 0, 0, 255, 255, 255];
        let image = PlanarImage::from_rgb(&rgb, 3, 1).unwrap();
        let stride = image.y_stride();
        assert_eq!(image.y()[0], 0);
        assert_eq!(image.y()[2], 255);
        assert_eq!(image.y()[15], 255);
        assert_eq!(image.y()[15 * stride + 15], 255);
        assert_eq!(image.y()[15 * stride], 0);
    }

    #[test]
    fn test_planar_roundtrip_flat() {
        let rgb: Vec<u8> = std::iter::repeat([90u8, 140, 60]).take(5 * 7).flatten().collect();
        let image = PlanarImage::from_rgb(&rgb, 5, 7).unwrap();
        let back = image.to_rgb();
        assert_eq!(back.len(), rgb.len());
        for (a, b) in back.iter().zip(rgb.iter()) {
            assert!((*a as i32 - *b as i32).abs() <= 4);
        }
    }
}
