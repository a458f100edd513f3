use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use serde::{Deserialize, Serialize};
use std::io::{self, Cursor};

/// Sync pattern opening every packet on the data channel.
pub const MAGIC_WORD: [u8; 8] = [0x02, 0x01, 0x04, 0x03, 0x06, 0x05, 0x08, 0x07];

/// Header size for firmware without sub-frame support.
pub const HEADER_LEN: usize = 36;

/// Header size once the sub-frame number is appended.
pub const EXTENDED_HEADER_LEN: usize = 40;

/// First header version that carries a sub-frame number.
pub const SUBFRAME_VERSION_THRESHOLD: u32 = 0x0302_0006;

/// Fixed packet header following the magic word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PacketHeader {
    pub version: u32,
    /// Total packet length in bytes, magic word and padding included.
    pub total_len: u32,
    pub platform: u32,
    pub frame_number: u32,
    pub cpu_cycles: u32,
    pub num_detected_obj: u32,
    pub num_tlvs: u32,
    pub sub_frame_number: Option<u32>,
}

impl PacketHeader {
    pub fn has_sub_frame(version: u32) -> bool {
        version >= SUBFRAME_VERSION_THRESHOLD
    }

    /// Size of this header on the wire.
    pub fn encoded_len(&self) -> usize {
        if self.sub_frame_number.is_some() {
            EXTENDED_HEADER_LEN
        } else {
            HEADER_LEN
        }
    }

    /// Parses a header from `bytes`, which must start at the magic word.
    /// Short input surfaces as `UnexpectedEof`.
    pub fn parse(bytes: &[u8]) -> io::Result<Self> {
        let mut cursor = Cursor::new(bytes);
        let mut magic = [0u8; 8];
        io::Read::read_exact(&mut cursor, &mut magic)?;
        if magic != MAGIC_WORD {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "packet does not start with the magic word",
            ));
        }

        let version = cursor.read_u32::<LittleEndian>()?;
        let total_len = cursor.read_u32::<LittleEndian>()?;
        let platform = cursor.read_u32::<LittleEndian>()?;
        let frame_number = cursor.read_u32::<LittleEndian>()?;
        let cpu_cycles = cursor.read_u32::<LittleEndian>()?;
        let num_detected_obj = cursor.read_u32::<LittleEndian>()?;
        let num_tlvs = cursor.read_u32::<LittleEndian>()?;
        let sub_frame_number = if Self::has_sub_frame(version) {
            Some(cursor.read_u32::<LittleEndian>()?)
        } else {
            None
        };

        Ok(Self {
            version,
            total_len,
            platform,
            frame_number,
            cpu_cycles,
            num_detected_obj,
            num_tlvs,
            sub_frame_number,
        })
    }

    pub fn write_to(&self, out: &mut Vec<u8>) -> io::Result<()> {
        out.extend_from_slice(&MAGIC_WORD);
        for field in [
            self.version,
            self.total_len,
            self.platform,
            self.frame_number,
            self.cpu_cycles,
            self.num_detected_obj,
            self.num_tlvs,
        ] {
            out.write_u32::<LittleEndian>(field)?;
        }
        if let Some(sub_frame) = self.sub_frame_number {
            out.write_u32::<LittleEndian>(sub_frame)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(version: u32) -> PacketHeader {
        PacketHeader {
            version,
            total_len: 64,
            platform: 0xA6843,
            frame_number: 7,
            cpu_cycles: 1234,
            num_detected_obj: 2,
            num_tlvs: 3,
            sub_frame_number: PacketHeader::has_sub_frame(version).then_some(1),
        }
    }

    #[test]
    fn extended_header_carries_sub_frame() {
        let original = header(SUBFRAME_VERSION_THRESHOLD);
        let mut bytes = Vec::new();
        original.write_to(&mut bytes).unwrap();
        assert_eq!(bytes.len(), EXTENDED_HEADER_LEN);
        assert_eq!(PacketHeader::parse(&bytes).unwrap(), original);
    }

    #[test]
    fn legacy_header_is_36_bytes() {
        let original = header(0x0102_0000);
        let mut bytes = Vec::new();
        original.write_to(&mut bytes).unwrap();
        assert_eq!(bytes.len(), HEADER_LEN);
        let parsed = PacketHeader::parse(&bytes).unwrap();
        assert_eq!(parsed.sub_frame_number, None);
        assert_eq!(parsed.encoded_len(), HEADER_LEN);
    }

    #[test]
    fn truncated_extended_header_is_eof() {
        let mut bytes = Vec::new();
        header(SUBFRAME_VERSION_THRESHOLD)
            .write_to(&mut bytes)
            .unwrap();
        let err = PacketHeader::parse(&bytes[..HEADER_LEN]).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }
}
