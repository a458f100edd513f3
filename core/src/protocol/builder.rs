//! Encoder for well-formed packets, shared by tests and the synthetic sensor.

use crate::protocol::frame::DetectedPoint;
use crate::protocol::header::{PacketHeader, EXTENDED_HEADER_LEN, HEADER_LEN, SUBFRAME_VERSION_THRESHOLD};
use crate::protocol::tlv::{TlvType, AZIMUTH_ANTENNA_COUNT};
use byteorder::{ByteOrder, LittleEndian};
use ndarray::ArrayView2;

pub const TLV_HEADER_LEN: usize = 8;

/// Builds one packet as the sensor firmware would emit it.
#[derive(Debug, Clone)]
pub struct PacketBuilder {
    version: u32,
    platform: u32,
    frame_number: u32,
    cpu_cycles: u32,
    sub_frame_number: u32,
    num_detected_obj: u32,
    tlvs: Vec<(u32, Vec<u8>)>,
    padding: Option<usize>,
}

impl Default for PacketBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl PacketBuilder {
    /// Starts a packet with the extended (sub-frame) header.
    pub fn new() -> Self {
        Self {
            version: SUBFRAME_VERSION_THRESHOLD,
            platform: 0x000A_6843,
            frame_number: 0,
            cpu_cycles: 0,
            sub_frame_number: 0,
            num_detected_obj: 0,
            tlvs: Vec::new(),
            padding: None,
        }
    }

    pub fn version(mut self, version: u32) -> Self {
        self.version = version;
        self
    }

    pub fn frame_number(mut self, frame_number: u32) -> Self {
        self.frame_number = frame_number;
        self
    }

    pub fn cpu_cycles(mut self, cpu_cycles: u32) -> Self {
        self.cpu_cycles = cpu_cycles;
        self
    }

    pub fn sub_frame_number(mut self, sub_frame_number: u32) -> Self {
        self.sub_frame_number = sub_frame_number;
        self
    }

    /// Pads the packet to a multiple of `multiple` bytes.
    pub fn padding(mut self, multiple: usize) -> Self {
        self.padding = Some(multiple);
        self
    }

    /// Appends a raw TLV element.
    pub fn tlv(mut self, tlv_type: u32, payload: Vec<u8>) -> Self {
        self.tlvs.push((tlv_type, payload));
        self
    }

    pub fn points(mut self, points: &[DetectedPoint]) -> Self {
        self.num_detected_obj = points.len() as u32;
        let floats: Vec<f32> = points.iter().flat_map(|p| p.as_array()).collect();
        let mut payload = vec![0u8; floats.len() * 4];
        LittleEndian::write_f32_into(&floats, &mut payload);
        self.tlv(TlvType::DetectedPoints.code(), payload)
    }

    pub fn range_profile(self, bins: &[u16]) -> Self {
        self.tlv(TlvType::RangeProfile.code(), encode_u16(bins))
    }

    /// Encodes a range-Doppler heatmap in wire order, row-major.
    pub fn range_doppler(self, heatmap: ArrayView2<u16>) -> Self {
        let values: Vec<u16> = heatmap.iter().copied().collect();
        self.tlv(TlvType::RangeDoppler.code(), encode_u16(&values))
    }

    pub fn statistics(self, fields: [u32; 6]) -> Self {
        let mut payload = vec![0u8; 24];
        LittleEndian::write_u32_into(&fields, &mut payload);
        self.tlv(TlvType::Statistics.code(), payload)
    }

    /// Encodes one virtual-antenna row per range bin as `(real, imag)` pairs.
    pub fn azimuth(self, rows: &[[(i16, i16); AZIMUTH_ANTENNA_COUNT]]) -> Self {
        let mut payload = Vec::with_capacity(rows.len() * AZIMUTH_ANTENNA_COUNT * 4);
        for row in rows {
            for &(re, im) in row {
                payload.extend_from_slice(&re.to_le_bytes());
                payload.extend_from_slice(&im.to_le_bytes());
            }
        }
        self.tlv(TlvType::AzimuthElevation.code(), payload)
    }

    pub fn build(self) -> Vec<u8> {
        let has_sub_frame = PacketHeader::has_sub_frame(self.version);
        let header_len = if has_sub_frame {
            EXTENDED_HEADER_LEN
        } else {
            HEADER_LEN
        };
        let body_len: usize = self
            .tlvs
            .iter()
            .map(|(_, payload)| TLV_HEADER_LEN + payload.len())
            .sum();
        let mut total_len = header_len + body_len;
        if let Some(multiple) = self.padding.filter(|m| *m > 0) {
            total_len = total_len.div_ceil(multiple) * multiple;
        }

        let header = PacketHeader {
            version: self.version,
            total_len: total_len as u32,
            platform: self.platform,
            frame_number: self.frame_number,
            cpu_cycles: self.cpu_cycles,
            num_detected_obj: self.num_detected_obj,
            num_tlvs: self.tlvs.len() as u32,
            sub_frame_number: has_sub_frame.then_some(self.sub_frame_number),
        };

        let mut bytes = Vec::with_capacity(total_len);
        // writing into a Vec cannot fail
        let _ = header.write_to(&mut bytes);
        for (tlv_type, payload) in &self.tlvs {
            bytes.extend_from_slice(&tlv_type.to_le_bytes());
            bytes.extend_from_slice(&(payload.len() as u32).to_le_bytes());
            bytes.extend_from_slice(payload);
        }
        bytes.resize(total_len, 0);
        bytes
    }
}

fn encode_u16(values: &[u16]) -> Vec<u8> {
    let mut payload = vec![0u8; values.len() * 2];
    LittleEndian::write_u16_into(values, &mut payload);
    payload
}
