//! Compressed packets and the IVF container

pub mod ivf;
pub mod packet;

pub use ivf::{IvfHeader, IvfReader, IvfWriter};
pub use packet::{Packet, PacketFlags};
