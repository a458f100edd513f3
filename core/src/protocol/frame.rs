use crate::protocol::header::PacketHeader;
use ndarray::Array2;
use serde::{Deserialize, Serialize};

/// One detected object in sensor-relative Cartesian coordinates (metres)
/// with its radial velocity.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DetectedPoint {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub doppler: f32,
}

impl DetectedPoint {
    pub fn new(x: f32, y: f32, z: f32, doppler: f32) -> Self {
        Self { x, y, z, doppler }
    }

    pub fn as_array(&self) -> [f32; 4] {
        [self.x, self.y, self.z, self.doppler]
    }
}

/// Everything the TLV decoder recovered from one packet.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedPacket {
    pub header: PacketHeader,
    pub detected_points: Option<Vec<DetectedPoint>>,
    pub range_profile: Option<Vec<u16>>,
    /// `(range_bins, doppler_bins)`, halves already swapped.
    pub range_doppler: Option<Array2<u16>>,
    /// `(range_bins, azimuth_bins)` FFT magnitudes.
    pub range_azimuth: Option<Array2<f32>>,
}

/// Fixed-shape record handed to consumers after filtering. Any field may be
/// absent when the matching TLV was not in the packet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecodedFrame {
    pub header: PacketHeader,
    pub detected_points: Option<Vec<DetectedPoint>>,
    pub range_profile: Option<Vec<u16>>,
    pub range_doppler: Option<Array2<u16>>,
    pub range_azimuth: Option<Array2<f32>>,
    pub range_doppler_clean: Option<Array2<f32>>,
    pub range_azimuth_clean: Option<Array2<f32>>,
}

impl DecodedFrame {
    pub fn from_packet(packet: DecodedPacket) -> Self {
        Self {
            header: packet.header,
            detected_points: packet.detected_points,
            range_profile: packet.range_profile,
            range_doppler: packet.range_doppler,
            range_azimuth: packet.range_azimuth,
            range_doppler_clean: None,
            range_azimuth_clean: None,
        }
    }

    pub fn frame_number(&self) -> u32 {
        self.header.frame_number
    }

    /// Detected points as an `N x 4` matrix of `(x, y, z, doppler)`.
    pub fn points_matrix(&self) -> Option<Array2<f32>> {
        let points = self.detected_points.as_ref()?;
        let flat: Vec<f32> = points.iter().flat_map(|p| p.as_array()).collect();
        Array2::from_shape_vec((points.len(), 4), flat).ok()
    }
}
