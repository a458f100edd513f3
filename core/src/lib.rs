//! Streaming decoder and real-time frame pipeline for TI mmWave radar sensors.
//!
//! Raw bytes from the sensor's data channel are buffered, framed on the
//! magic word, decoded from TLV elements into point clouds, range profiles
//! and heatmaps, and the heatmaps are passed through per-stream clutter
//! removal before being handed to the caller.

pub mod config;
pub mod math;
pub mod prelude;
pub mod processing;
pub mod protocol;
pub mod sensor;
pub mod telemetry;
pub mod transport;

pub use config::SensorConfig;
pub use prelude::{FrameStatus, ProcessingStage, SensorError, SensorResult};
pub use protocol::{DecodedFrame, DetectedPoint};
pub use sensor::{SensorInterface, SensorState};
