use crate::generator::template::{bump, sine_wave};
use anyhow::Context;
use mmwcore::protocol::tlv::AZIMUTH_ANTENNA_COUNT;
use mmwcore::protocol::PacketBuilder;
use mmwcore::DetectedPoint;
use ndarray::Array2;
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::f32::consts::PI;

/// Shape of the synthetic sensor's output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    pub frames: usize,
    pub range_bins: usize,
    pub doppler_bins: usize,
    pub points: usize,
    /// Static background level of every heatmap cell.
    pub clutter_level: f32,
    /// Peak amplitude added by the moving target.
    pub target_level: f32,
    pub noise: f32,
    pub seed: u64,
    /// Emit range profiles; without them heatmaps use the default bin count.
    pub range_profile: bool,
    pub azimuth: bool,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            frames: 120,
            range_bins: 8,
            doppler_bins: 16,
            points: 3,
            clutter_level: 400.0,
            target_level: 1200.0,
            noise: 20.0,
            seed: 0,
            range_profile: true,
            azimuth: true,
        }
    }
}

impl GeneratorConfig {
    fn normalized_range(&self) -> usize {
        self.range_bins.max(1)
    }

    fn normalized_doppler(&self) -> usize {
        self.doppler_bins.max(2)
    }
}

/// Target sweeping back and forth across range over the capture.
fn target_range(config: &GeneratorConfig, frame: usize) -> f32 {
    let span = config.normalized_range() as f32 - 1.0;
    let phase = frame as f32 / config.frames.max(1) as f32 * 2.0 * PI;
    span * 0.5 * (1.0 - phase.cos())
}

fn to_u16(value: f32) -> u16 {
    value.clamp(0.0, u16::MAX as f32) as u16
}

fn build_heatmap(config: &GeneratorConfig, frame: usize, rng: &mut StdRng) -> Vec<u16> {
    let range_bins = config.normalized_range();
    let doppler_bins = config.normalized_doppler();
    let target = bump(range_bins, target_range(config, frame), 0.8);
    let texture = sine_wave(range_bins, 1.5);
    // wire order keeps zero Doppler at the edges; the target sits off-centre
    let target_doppler = doppler_bins / 4;

    let mut values = Vec::with_capacity(range_bins * doppler_bins);
    for (range, (&t, &tex)) in target.iter().zip(texture.iter()).enumerate() {
        for doppler in 0..doppler_bins {
            let static_part = config.clutter_level * (1.0 + 0.25 * tex) / (1.0 + range as f32 * 0.1);
            let moving = if doppler == target_doppler {
                config.target_level * t
            } else {
                0.0
            };
            let jitter = if config.noise > 0.0 {
                rng.gen_range(-config.noise..config.noise)
            } else {
                0.0
            };
            values.push(to_u16(static_part + moving + jitter));
        }
    }
    values
}

fn build_points(config: &GeneratorConfig, frame: usize, rng: &mut StdRng) -> Vec<DetectedPoint> {
    let range_m = 0.1 + target_range(config, frame) * 0.05;
    (0..config.points)
        .map(|_| {
            let spread = config.noise.max(1.0) * 1e-4;
            DetectedPoint::new(
                rng.gen_range(-spread..spread),
                range_m + rng.gen_range(-spread..spread),
                rng.gen_range(-spread..spread),
                rng.gen_range(-0.5..0.5),
            )
        })
        .collect()
}

fn build_azimuth(
    config: &GeneratorConfig,
    frame: usize,
) -> Vec<[(i16, i16); AZIMUTH_ANTENNA_COUNT]> {
    let steer = (frame as f32 / config.frames.max(1) as f32 - 0.5) * PI;
    (0..config.normalized_range())
        .map(|range| {
            let mut row = [(0i16, 0i16); AZIMUTH_ANTENNA_COUNT];
            for (antenna, slot) in row.iter_mut().enumerate() {
                let phase = steer * antenna as f32 + range as f32 * 0.3;
                *slot = (
                    (phase.cos() * 300.0) as i16,
                    (phase.sin() * 300.0) as i16,
                );
            }
            row
        })
        .collect()
}

/// One packet as the firmware would emit it for `frame`.
pub fn build_packet(
    config: &GeneratorConfig,
    frame: usize,
    rng: &mut StdRng,
) -> anyhow::Result<Vec<u8>> {
    let heatmap = Array2::from_shape_vec(
        (config.normalized_range(), config.normalized_doppler()),
        build_heatmap(config, frame, rng),
    )
    .context("shaping synthetic range-Doppler heatmap")?;
    let mut builder = PacketBuilder::new()
        .frame_number(frame as u32)
        .cpu_cycles(rng.gen_range(100_000..200_000));

    if config.points > 0 {
        builder = builder.points(&build_points(config, frame, rng));
    }
    if config.range_profile {
        let profile: Vec<u16> = heatmap.column(0).to_vec();
        builder = builder.range_profile(&profile);
    }
    builder = builder
        .range_doppler(heatmap.view())
        .statistics([frame as u32, 120, 900, 40, 35, 12]);
    if config.azimuth {
        builder = builder.azimuth(&build_azimuth(config, frame));
    }
    Ok(builder.padding(32).build())
}

/// Concatenated byte stream for the whole capture.
pub fn build_stream(config: &GeneratorConfig) -> anyhow::Result<Vec<u8>> {
    let per_frame = config
        .normalized_range()
        .checked_mul(config.normalized_doppler())
        .context("overflow computing heatmap size for generator")?;
    let mut rng = StdRng::seed_from_u64(config.seed);
    let mut stream = Vec::with_capacity(config.frames * (per_frame * 2 + 256));
    for frame in 0..config.frames {
        stream.extend(build_packet(config, frame, &mut rng)?);
    }
    Ok(stream)
}
