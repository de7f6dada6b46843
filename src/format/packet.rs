//! Packet representation for compressed video frames

use crate::util::{Buffer, Timestamp};
use std::fmt;

/// Packet flags
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PacketFlags {
    /// Packet contains a keyframe
    pub keyframe: bool,
    /// The frame inside is not meant to be displayed
    pub hidden: bool,
}

/// One compressed VP8 frame with its timing
#[derive(Debug, Clone)]
pub struct Packet {
    /// Stream index this packet belongs to
    pub stream_index: usize,

    /// Compressed frame
    pub data: Buffer,

    /// Presentation timestamp
    pub pts: Timestamp,

    /// Decoding timestamp
    pub dts: Timestamp,

    /// Duration in timebase units
    pub duration: i64,

    pub flags: PacketFlags,

    /// Byte offset of the frame in its container (-1 if unknown)
    pub position: i64,
}

impl Packet {
    /// Create a new packet
    pub fn new(stream_index: usize, data: Buffer) -> Self {
        Packet {
            stream_index,
            data,
            pts: Timestamp::none(),
            dts: Timestamp::none(),
            duration: 0,
            flags: PacketFlags::default(),
            position: -1,
        }
    }

    /// Check if this packet is a keyframe
    pub fn is_keyframe(&self) -> bool {
        self.flags.keyframe
    }

    /// Set keyframe flag
    pub fn set_keyframe(&mut self, keyframe: bool) {
        self.flags.keyframe = keyframe;
    }

    /// Get the size of the packet data
    pub fn size(&self) -> usize {
        self.data.len()
    }
}

impl fmt::Display for Packet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Packet(stream={}, size={}, pts={}, dts={}, key={})",
            self.stream_index,
            self.size(),
            self.pts,
            self.dts,
            self.is_keyframe()
        )
    }
}
