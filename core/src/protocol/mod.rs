//! Wire protocol of the sensor's data channel: magic-word framing, the
//! fixed packet header, and the TLV elements that follow it.

pub mod buffer;
pub mod builder;
pub mod frame;
pub mod framer;
pub mod header;
pub mod tlv;

pub use buffer::ByteStreamBuffer;
pub use builder::PacketBuilder;
pub use frame::{DecodedFrame, DecodedPacket, DetectedPoint};
pub use framer::{FramedPacket, PacketFramer};
pub use header::{PacketHeader, MAGIC_WORD};
pub use tlv::{TlvDecoder, TlvType, DEFAULT_RANGE_BINS};
