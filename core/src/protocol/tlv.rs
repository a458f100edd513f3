//! TLV walker for one framed packet.
//!
//! Contract on element order: the range-Doppler element (type 5) is shaped
//! with the range-bin count taken from a range-profile element (type 2) that
//! appears *earlier in the same packet*. Without one, the decoder falls back
//! to [`DEFAULT_RANGE_BINS`]. A profile that arrives after the heatmap does
//! not reshape it. The range-azimuth element (type 8) uses the same count.

use crate::math::fft::FftHelper;
use crate::math::matrix::MatrixHelper;
use crate::prelude::{FrameStatus, SensorError, SensorResult};
use crate::protocol::builder::TLV_HEADER_LEN;
use crate::protocol::frame::{DecodedPacket, DetectedPoint};
use crate::protocol::header::PacketHeader;
use crate::telemetry::log::LogManager;
use byteorder::{ByteOrder, LittleEndian};
use ndarray::Array2;
use num_complex::Complex32;

/// Range bins assumed when no range profile precedes a heatmap.
pub const DEFAULT_RANGE_BINS: usize = 8;

/// Virtual antennas per range row in the azimuth element.
pub const AZIMUTH_ANTENNA_COUNT: usize = 12;

/// Antennas forming the azimuth array, in TX0/TX1/TX2 order.
const AZIMUTH_ANTENNAS: [usize; 4] = [7, 5, 11, 9];

/// Zero-padded FFT length, i.e. the number of azimuth bins produced.
pub const AZIMUTH_BINS: usize = 64;

const AZIMUTH_ROW_BYTES: usize = AZIMUTH_ANTENNA_COUNT * 4;
const POINT_BYTES: usize = 16;
const STATISTICS_BYTES: usize = 24;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TlvType {
    DetectedPoints,
    RangeProfile,
    StaticAzimuth,
    RangeDoppler,
    Statistics,
    Reserved,
    AzimuthElevation,
    AopOnly,
    Unknown(u32),
}

impl TlvType {
    pub fn code(&self) -> u32 {
        match self {
            TlvType::DetectedPoints => 1,
            TlvType::RangeProfile => 2,
            TlvType::StaticAzimuth => 4,
            TlvType::RangeDoppler => 5,
            TlvType::Statistics => 6,
            TlvType::Reserved => 7,
            TlvType::AzimuthElevation => 8,
            TlvType::AopOnly => 9,
            TlvType::Unknown(code) => *code,
        }
    }
}

impl From<u32> for TlvType {
    fn from(code: u32) -> Self {
        match code {
            1 => TlvType::DetectedPoints,
            2 => TlvType::RangeProfile,
            4 => TlvType::StaticAzimuth,
            5 => TlvType::RangeDoppler,
            6 => TlvType::Statistics,
            7 => TlvType::Reserved,
            8 => TlvType::AzimuthElevation,
            9 => TlvType::AopOnly,
            other => TlvType::Unknown(other),
        }
    }
}

/// Why a packet could not be decoded.
enum TlvFault {
    /// Fewer bytes than an element declares; retried once more data arrives.
    Truncated(String),
    /// Bytes present but inconsistent with the declared shape.
    Malformed(String),
}

type TlvResult<T> = Result<T, TlvFault>;

/// Decodes the TLV elements of framed packets.
pub struct TlvDecoder {
    azimuth_fft: FftHelper,
    logger: LogManager,
}

impl TlvDecoder {
    pub fn new() -> Self {
        Self {
            azimuth_fft: FftHelper::new(AZIMUTH_BINS),
            logger: LogManager::new("tlv"),
        }
    }

    /// Walks exactly `header.num_tlvs` elements of `payload`.
    ///
    /// Truncated elements yield `Incomplete`; shape inconsistencies are
    /// `GeneralDecode` errors.
    pub fn decode(
        &mut self,
        header: &PacketHeader,
        payload: &[u8],
    ) -> SensorResult<FrameStatus<DecodedPacket>> {
        match self.walk(header, payload) {
            Ok(packet) => Ok(FrameStatus::Complete(packet)),
            Err(TlvFault::Truncated(reason)) => {
                self.logger.detail(&format!(
                    "frame {} not decodable yet: {}",
                    header.frame_number, reason
                ));
                Ok(FrameStatus::Incomplete)
            }
            Err(TlvFault::Malformed(reason)) => Err(SensorError::GeneralDecode(format!(
                "frame {}: {}",
                header.frame_number, reason
            ))),
        }
    }

    fn walk(&mut self, header: &PacketHeader, payload: &[u8]) -> TlvResult<DecodedPacket> {
        let mut packet = DecodedPacket {
            header: *header,
            detected_points: None,
            range_profile: None,
            range_doppler: None,
            range_azimuth: None,
        };
        let mut range_bins = DEFAULT_RANGE_BINS;
        let mut cursor = 0usize;

        for index in 0..header.num_tlvs {
            let sub_header = slice(payload, cursor, TLV_HEADER_LEN).ok_or_else(|| {
                TlvFault::Truncated(format!("TLV {} header past end of payload", index))
            })?;
            let tlv_type = TlvType::from(LittleEndian::read_u32(&sub_header[..4]));
            let length = LittleEndian::read_u32(&sub_header[4..]) as usize;
            cursor += TLV_HEADER_LEN;

            let body = slice(payload, cursor, length).ok_or_else(|| {
                TlvFault::Truncated(format!(
                    "TLV {} (type {}) declares {} bytes, {} available",
                    index,
                    tlv_type.code(),
                    length,
                    payload.len().saturating_sub(cursor)
                ))
            })?;

            match tlv_type {
                TlvType::DetectedPoints => {
                    packet.detected_points =
                        Some(decode_points(body, header.num_detected_obj as usize)?);
                }
                TlvType::RangeProfile => {
                    let profile = decode_u16(body)?;
                    range_bins = profile.len();
                    packet.range_profile = Some(profile);
                }
                TlvType::RangeDoppler => {
                    packet.range_doppler = Some(decode_range_doppler(body, range_bins)?);
                }
                TlvType::Statistics => self.log_statistics(body)?,
                TlvType::AzimuthElevation => {
                    packet.range_azimuth = self.decode_azimuth(body, range_bins);
                }
                other => {
                    self.logger.detail(&format!(
                        "skipping TLV type {} ({} bytes)",
                        other.code(),
                        length
                    ));
                }
            }
            cursor += length;
        }

        if packet.range_profile.is_none() {
            if let Some(heatmap) = packet.range_doppler.as_ref().filter(|h| h.ncols() > 0) {
                packet.range_profile = Some(heatmap.column(0).to_vec());
            }
        }

        Ok(packet)
    }

    fn log_statistics(&self, body: &[u8]) -> TlvResult<()> {
        if body.len() < STATISTICS_BYTES {
            return Err(TlvFault::Truncated(format!(
                "statistics block needs {} bytes, got {}",
                STATISTICS_BYTES,
                body.len()
            )));
        }
        let mut fields = [0u32; 6];
        LittleEndian::read_u32_into(&body[..STATISTICS_BYTES], &mut fields);
        let [inter_process, transmit_out, frame_margin, chirp_margin, active_cpu, inter_cpu] =
            fields;
        self.logger.detail(&format!(
            "stats: interProcess={} transmitOut={} frameMargin={} chirpMargin={} activeCPULoad={} interCPULoad={}",
            inter_process, transmit_out, frame_margin, chirp_margin, active_cpu, inter_cpu
        ));
        Ok(())
    }

    /// Beamforms each range row over four virtual antennas. A short element
    /// leaves the heatmap absent rather than failing the packet.
    fn decode_azimuth(&mut self, body: &[u8], range_bins: usize) -> Option<Array2<f32>> {
        let needed = range_bins * AZIMUTH_ROW_BYTES;
        if range_bins == 0 || body.len() < needed {
            self.logger.warn(&format!(
                "bad azimuth element: {} bytes for {} range bins",
                body.len(),
                range_bins
            ));
            return None;
        }

        let mut heatmap = Array2::<f32>::zeros((range_bins, AZIMUTH_BINS));
        for (row, mut out) in heatmap.rows_mut().into_iter().enumerate() {
            let base = row * AZIMUTH_ROW_BYTES;
            let samples: Vec<Complex32> = AZIMUTH_ANTENNAS
                .iter()
                .map(|&antenna| {
                    let offset = base + 4 * antenna;
                    let re = LittleEndian::read_i16(&body[offset..offset + 2]);
                    let im = LittleEndian::read_i16(&body[offset + 2..offset + 4]);
                    Complex32::new(re as f32, im as f32)
                })
                .collect();
            let magnitudes = self.azimuth_fft.shifted_magnitudes(&samples);
            for (dst, value) in out.iter_mut().zip(magnitudes) {
                *dst = value;
            }
        }
        Some(heatmap)
    }
}

impl Default for TlvDecoder {
    fn default() -> Self {
        Self::new()
    }
}

fn slice(bytes: &[u8], start: usize, len: usize) -> Option<&[u8]> {
    bytes.get(start..start.checked_add(len)?)
}

fn decode_points(body: &[u8], count: usize) -> TlvResult<Vec<DetectedPoint>> {
    let needed = count * POINT_BYTES;
    if body.len() < needed {
        return Err(TlvFault::Truncated(format!(
            "{} points need {} bytes, got {}",
            count,
            needed,
            body.len()
        )));
    }
    let mut floats = vec![0f32; count * 4];
    LittleEndian::read_f32_into(&body[..needed], &mut floats);
    Ok(floats
        .chunks_exact(4)
        .map(|p| DetectedPoint::new(p[0], p[1], p[2], p[3]))
        .collect())
}

fn decode_u16(body: &[u8]) -> TlvResult<Vec<u16>> {
    if body.len() % 2 != 0 {
        return Err(TlvFault::Truncated(format!(
            "odd length {} for a u16 array",
            body.len()
        )));
    }
    let mut values = vec![0u16; body.len() / 2];
    LittleEndian::read_u16_into(body, &mut values);
    Ok(values)
}

fn decode_range_doppler(body: &[u8], range_bins: usize) -> TlvResult<Array2<u16>> {
    let values = decode_u16(body)?;
    if range_bins == 0 || values.len() % range_bins != 0 {
        return Err(TlvFault::Malformed(format!(
            "{} heatmap values do not reshape into {} range bins",
            values.len(),
            range_bins
        )));
    }
    let doppler_bins = values.len() / range_bins;
    let heatmap = Array2::from_shape_vec((range_bins, doppler_bins), values)
        .map_err(|err| TlvFault::Malformed(err.to_string()))?;
    Ok(MatrixHelper::swap_halves(heatmap.view()))
}
