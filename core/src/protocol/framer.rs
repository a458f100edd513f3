use crate::prelude::FrameStatus;
use crate::protocol::header::{PacketHeader, HEADER_LEN, MAGIC_WORD};

/// One packet located inside the stream buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct FramedPacket {
    pub header: PacketHeader,
    /// TLV bytes: header stripped, bounded by the declared packet length.
    pub payload: Vec<u8>,
    /// Buffer offset of the magic word.
    pub start: usize,
    /// Buffer offset just past this packet; leftover data begins here.
    pub end: usize,
}

/// Locates complete packets in a byte window. Never blocks and never fails:
/// anything short of a whole packet is `Incomplete`.
pub struct PacketFramer;

impl PacketFramer {
    pub fn find_magic(bytes: &[u8]) -> Option<usize> {
        bytes
            .windows(MAGIC_WORD.len())
            .position(|window| window == MAGIC_WORD)
    }

    pub fn frame(bytes: &[u8]) -> FrameStatus<FramedPacket> {
        let Some(start) = Self::find_magic(bytes) else {
            return FrameStatus::Incomplete;
        };
        let data = &bytes[start..];
        if data.len() < HEADER_LEN {
            return FrameStatus::Incomplete;
        }

        let header = match PacketHeader::parse(data) {
            Ok(header) => header,
            Err(err) => {
                log::debug!("header at offset {} not resolvable yet: {}", start, err);
                return FrameStatus::Incomplete;
            }
        };

        let total_len = header.total_len as usize;
        let header_len = header.encoded_len();
        if total_len > data.len() {
            return FrameStatus::Incomplete;
        }
        if total_len < header_len {
            log::warn!(
                "packet {} declares length {} shorter than its {}-byte header",
                header.frame_number,
                total_len,
                header_len
            );
            return FrameStatus::Incomplete;
        }

        FrameStatus::Complete(FramedPacket {
            header,
            payload: data[header_len..total_len].to_vec(),
            start,
            end: start + total_len,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::buffer::ByteStreamBuffer;
    use crate::protocol::builder::PacketBuilder;
    use crate::protocol::header::EXTENDED_HEADER_LEN;
    use crate::protocol::tlv::TlvDecoder;

    fn sample_packet() -> Vec<u8> {
        PacketBuilder::new()
            .frame_number(42)
            .range_profile(&[100; 16])
            .padding(32)
            .build()
    }

    #[test]
    fn complete_packet_reports_leftover_offset() {
        let packet = sample_packet();
        let leftover = [0xAA, 0xBB, 0xCC];
        let mut bytes = packet.clone();
        bytes.extend_from_slice(&leftover);

        let framed = PacketFramer::frame(&bytes).complete().unwrap();
        assert_eq!(framed.header.frame_number, 42);
        assert_eq!(framed.start, 0);
        assert_eq!(framed.end, packet.len());
        assert_eq!(&bytes[framed.end..], &leftover);
        assert_eq!(framed.payload, packet[framed.header.encoded_len()..].to_vec());
    }

    #[test]
    fn garbage_prefix_is_skipped() {
        let packet = sample_packet();
        let mut bytes = vec![0x00, 0x13, 0x37, 0x02, 0x01, 0x04];
        let garbage = bytes.len();
        bytes.extend_from_slice(&packet);

        let alone = PacketFramer::frame(&packet).complete().unwrap();
        let resynced = PacketFramer::frame(&bytes).complete().unwrap();
        assert_eq!(resynced.header, alone.header);
        assert_eq!(resynced.payload, alone.payload);
        assert_eq!(resynced.start, garbage);
        assert_eq!(resynced.end, garbage + packet.len());
    }

    #[test]
    fn chunked_delivery_completes_only_on_last_chunk() {
        let packet = sample_packet();
        let whole = PacketFramer::frame(&packet).complete().unwrap();

        for chunk_size in [1, 7, 32, 33] {
            let mut buffer = ByteStreamBuffer::new();
            let chunks: Vec<&[u8]> = packet.chunks(chunk_size).collect();
            for (index, chunk) in chunks.iter().enumerate() {
                buffer.append(chunk);
                let status = PacketFramer::frame(buffer.as_slice());
                if index + 1 < chunks.len() {
                    assert_eq!(status, FrameStatus::Incomplete, "chunk size {}", chunk_size);
                } else {
                    assert_eq!(status, FrameStatus::Complete(whole.clone()));
                }
            }
        }
    }

    #[test]
    fn legacy_header_frames_and_decodes() {
        let packet = PacketBuilder::new()
            .version(0x0102_0005)
            .frame_number(7)
            .range_profile(&[9; 8])
            .padding(32)
            .build();

        let framed = PacketFramer::frame(&packet).complete().unwrap();
        assert_eq!(framed.header.sub_frame_number, None);
        assert_eq!(framed.header.encoded_len(), HEADER_LEN);
        assert_eq!(framed.payload.len(), packet.len() - HEADER_LEN);

        let decoded = TlvDecoder::new()
            .decode(&framed.header, &framed.payload)
            .unwrap()
            .complete()
            .unwrap();
        assert_eq!(decoded.header.frame_number, 7);
        assert_eq!(decoded.range_profile, Some(vec![9; 8]));
    }

    #[test]
    fn extended_header_carries_sub_frame() {
        let packet = PacketBuilder::new()
            .sub_frame_number(3)
            .range_profile(&[1; 4])
            .build();
        let framed = PacketFramer::frame(&packet).complete().unwrap();
        assert_eq!(framed.header.sub_frame_number, Some(3));
        assert_eq!(framed.payload.len(), packet.len() - EXTENDED_HEADER_LEN);
    }

    #[test]
    fn no_magic_is_incomplete() {
        assert_eq!(PacketFramer::frame(&[0u8; 128]), FrameStatus::Incomplete);
    }

    #[test]
    fn undersized_length_field_is_incomplete() {
        let mut packet = sample_packet();
        packet[12..16].copy_from_slice(&8u32.to_le_bytes());
        assert_eq!(PacketFramer::frame(&packet), FrameStatus::Incomplete);
    }
}
