//! Common utilities and data structures

pub mod buffer;
pub mod colorspace;
pub mod rational;
pub mod timestamp;

pub use buffer::Buffer;
pub use colorspace::{Rgb, Yuv};
pub use rational::Rational;
pub use timestamp::Timestamp;
