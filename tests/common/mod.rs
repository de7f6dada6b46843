//! Common test utilities for vp8lite integration tests
//!
//! Raster generators and comparison helpers shared by the test suites.

#![allow(dead_code)]

// ============================================================================
// RGB24 raster generation
// ============================================================================

/// A raster of one solid color
pub fn solid_rgb(width: u32, height: u32, rgb: [u8; 3]) -> Vec<u8> {
    std::iter::repeat(rgb)
        .take(width as usize * height as usize)
        .flatten()
        .collect()
}

/// A mid-gray raster
pub fn gray_rgb(width: u32, height: u32) -> Vec<u8> {
    solid_rgb(width, height, [128, 128, 128])
}

/// Black and white squares of `square` pixels
pub fn checkerboard_rgb(width: u32, height: u32, square: u32) -> Vec<u8> {
    let mut rgb = Vec::with_capacity(width as usize * height as usize * 3);
    for y in 0..height {
        for x in 0..width {
            let level = if (x / square + y / square) % 2 == 0 { 0 } else { 255 };
            rgb.extend_from_slice(&[level, level, level]);
        }
    }
    rgb
}

/// A smooth diagonal gradient that shifts with `phase`
pub fn gradient_rgb(width: u32, height: u32, phase: u32) -> Vec<u8> {
    let mut rgb = Vec::with_capacity(width as usize * height as usize * 3);
    for y in 0..height {
        for x in 0..width {
            let r = ((x * 4 + phase) % 256) as u8;
            let g = ((y * 4 + phase) % 256) as u8;
            let b = (((x + y) * 2) % 256) as u8;
            rgb.extend_from_slice(&[r, g, b]);
        }
    }
    rgb
}

// ============================================================================
// Comparison
// ============================================================================

/// Largest absolute difference between two equally sized buffers
pub fn max_abs_diff(a: &[u8], b: &[u8]) -> u8 {
    assert_eq!(a.len(), b.len(), "buffers differ in length");
    a.iter()
        .zip(b.iter())
        .map(|(&x, &y)| (x as i16 - y as i16).unsigned_abs() as u8)
        .max()
        .unwrap_or(0)
}

/// Deterministic pseudo-random bytes
pub fn noise(len: usize, seed: u32) -> Vec<u8> {
    let mut state = seed.wrapping_mul(2_654_435_761).wrapping_add(1);
    (0..len)
        .map(|_| {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            (state >> 24) as u8
        })
        .collect()
}
