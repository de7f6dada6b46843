//! vp8lite - a pure Rust codec for the intra-centric subset of VP8
//!
//! Encodes RGB frames into VP8 keyframes and zero-motion inter frames and
//! decodes such streams back, bit-exactly reproducing the encoder's own
//! reconstruction.
//!
//! # Architecture
//!
//! - `codec`: the `Decoder`/`Encoder` traits, uncompressed frames and the
//!   VP8 codec itself
//! - `format`: compressed packets and the IVF container
//! - `util`: color conversion, timestamps and shared buffers
//!
//! # Example
//!
//! ```no_run
//! let rgb = vec![200u8; 32 * 32 * 3];
//! let frame = vp8lite::encode_frame(&rgb, 32, 32)?;
//! let image = vp8lite::decode_frame(&frame)?;
//! assert_eq!(image.to_rgb().len(), rgb.len());
//! # Ok::<(), vp8lite::Error>(())
//! ```

pub mod codec;
pub mod error;
pub mod format;
pub mod util;

pub use codec::{PlanarImage, VideoFrame, Vp8Decoder, Vp8Encoder};
pub use error::{Error, Result};

use tracing_subscriber::EnvFilter;

/// vp8lite version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const VERSION_MAJOR: u32 = 0;
pub const VERSION_MINOR: u32 = 1;
pub const VERSION_PATCH: u32 = 0;

/// Configuration for the vp8lite library
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Threads for the color conversion pool
    pub max_threads: Option<usize>,
    /// Enable verbose logging
    pub verbose: bool,
    /// Enable debug output
    pub debug: bool,
}

/// Initialize the library with the given configuration
///
/// Sizes the global `rayon` pool and, when `verbose` or `debug` is set,
/// installs a `tracing` subscriber. `RUST_LOG` overrides the level.
pub fn init(config: Config) -> Result<()> {
    if let Some(threads) = config.max_threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
            .map_err(|e| Error::Init(format!("Failed to initialize thread pool: {}", e)))?;
    }

    if config.verbose || config.debug {
        let level = if config.debug { "debug" } else { "info" };
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .try_init()
            .map_err(|e| Error::Init(format!("Failed to install logger: {}", e)))?;
    }

    Ok(())
}

/// Encode one RGB24 raster as a standalone VP8 keyframe
pub fn encode_frame(rgb: &[u8], width: u32, height: u32) -> Result<Vec<u8>> {
    Vp8Encoder::new(width, height)?.encode_frame(rgb, width, height, true)
}

/// Decode one standalone VP8 keyframe
pub fn decode_frame(data: &[u8]) -> Result<PlanarImage> {
    let mut decoder = Vp8Decoder::new();
    Ok(decoder.decode_frame(data)?.clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert_eq!(VERSION_MAJOR, 0);
        assert_eq!(VERSION_MINOR, 1);
        assert_eq!(VERSION_PATCH, 0);
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.max_threads, None);
        assert!(!config.verbose);
        assert!(!config.debug);
    }

    #[test]
    fn test_init() {
        assert!(init(Config::default()).is_ok());
    }

    #[test]
    fn test_single_frame_boundary() {
        let rgb = vec![128u8; 24 * 20 * 3];
        let frame = encode_frame(&rgb, 24, 20).unwrap();
        assert_eq!(frame[0] & 1, 0);

        let image = decode_frame(&frame).unwrap();
        assert_eq!((image.width(), image.height()), (24, 20));
        assert!(image.to_rgb().iter().all(|&p| (p as i32 - 128).abs() <= 2));
    }

    #[test]
    fn test_inter_frame_needs_context() {
        let mut encoder = Vp8Encoder::new(16, 16).unwrap();
        let rgb = vec![60u8; 16 * 16 * 3];
        encoder.encode_frame(&rgb, 16, 16, false).unwrap();
        let inter = encoder.encode_frame(&rgb, 16, 16, false).unwrap();
        assert!(matches!(decode_frame(&inter), Err(Error::InvalidState(_))));
    }
}
