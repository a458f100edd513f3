use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Result of one attempt to pull a complete unit (packet, decoded frame) out
/// of the stream. `Incomplete` is the normal "wait for more bytes" answer and
/// never an error; fatal conditions travel as `Err(SensorError)`.
#[derive(Debug, Clone, PartialEq)]
pub enum FrameStatus<T> {
    Incomplete,
    Complete(T),
}

impl<T> FrameStatus<T> {
    pub fn complete(self) -> Option<T> {
        match self {
            FrameStatus::Complete(value) => Some(value),
            FrameStatus::Incomplete => None,
        }
    }
}

/// Fatal conditions surfaced by the sensor pipeline.
#[derive(thiserror::Error, Debug)]
pub enum SensorError {
    #[error("TLV buffer overflowed: {size} bytes buffered, limit is {limit}")]
    BufferOverflow { size: usize, limit: usize },
    #[error("attempting to read from unopen data port")]
    DataPortNotOpen,
    #[error("sensor ports are not set up: {0}")]
    PortsNotSetUp(String),
    #[error("general mmWave decode error: {0}")]
    GeneralDecode(String),
    #[error("cannot read config script {path}: {source}")]
    ConfigScript {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("signal/clutter ratio {0} is outside [0, 1]")]
    InvalidRatio(f32),
    #[error("invalid sensor configuration: {0}")]
    InvalidConfig(String),
    #[error("transport I/O failure: {0}")]
    Io(#[from] std::io::Error),
}

pub type SensorResult<T> = Result<T, SensorError>;

/// Shared configuration for each heatmap processing stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageConfig {
    pub signal_clutter_ratio: f32,
}

/// Input payload for a processing stage.
#[derive(Debug, Clone)]
pub struct StageInput {
    pub frame: Array2<f32>,
    pub frame_number: Option<u32>,
}

/// Output produced by each stage.
#[derive(Debug, Clone)]
pub struct StageOutput {
    pub frame: Array2<f32>,
    pub metadata: StageMetadata,
}

/// Metadata used for chaining stages and telemetry.
#[derive(Debug, Clone, Default)]
pub struct StageMetadata {
    pub residual_rms: Option<f32>,
    pub reseeded: bool,
    pub notes: Vec<String>,
}

/// Trait describing stateful heatmap-processing stages.
pub trait ProcessingStage {
    fn initialize(&mut self, config: &StageConfig) -> SensorResult<()>;
    fn execute(&mut self, input: StageInput) -> SensorResult<StageOutput>;
    fn cleanup(&mut self);
}
