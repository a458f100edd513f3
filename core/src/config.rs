use crate::prelude::{SensorError, SensorResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Tunables for one sensor connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorConfig {
    /// Bytes pulled from the data port per tick. Packets are padded to 32
    /// bytes by the firmware, so this must divide that cadence.
    pub data_chunk_size: usize,
    /// Hard ceiling on unframed bytes before the session is abandoned.
    pub buffer_size: usize,
    pub read_timeout_us: u64,
    pub stop_settle_ms: u64,
    pub config_line_delay_ms: u64,
    pub rd_signal_clutter_ratio: f32,
    pub ra_signal_clutter_ratio: f32,
    pub data_baud_rate: u32,
    pub user_baud_rate: u32,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            data_chunk_size: 32,
            buffer_size: 16_000,
            read_timeout_us: 50,
            stop_settle_ms: 100,
            config_line_delay_ms: 10,
            rd_signal_clutter_ratio: 0.5,
            ra_signal_clutter_ratio: 0.5,
            data_baud_rate: 921_600,
            user_baud_rate: 115_200,
        }
    }
}

impl SensorConfig {
    pub fn validate(&self) -> SensorResult<()> {
        if self.data_chunk_size == 0 {
            return Err(SensorError::InvalidConfig(
                "data_chunk_size must be non-zero".into(),
            ));
        }
        if self.buffer_size < self.data_chunk_size {
            return Err(SensorError::InvalidConfig(format!(
                "buffer_size {} is smaller than one chunk ({})",
                self.buffer_size, self.data_chunk_size
            )));
        }
        for ratio in [self.rd_signal_clutter_ratio, self.ra_signal_clutter_ratio] {
            if !(0.0..=1.0).contains(&ratio) {
                return Err(SensorError::InvalidRatio(ratio));
            }
        }
        Ok(())
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_micros(self.read_timeout_us)
    }

    pub fn stop_settle(&self) -> Duration {
        Duration::from_millis(self.stop_settle_ms)
    }

    pub fn config_line_delay(&self) -> Duration {
        Duration::from_millis(self.config_line_delay_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = SensorConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.data_chunk_size, 32);
        assert_eq!(config.buffer_size, 16_000);
    }

    #[test]
    fn ratio_out_of_range_is_rejected() {
        let config = SensorConfig {
            ra_signal_clutter_ratio: 1.5,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(SensorError::InvalidRatio(r)) if r == 1.5
        ));
    }

    #[test]
    fn buffer_smaller_than_chunk_is_rejected() {
        let config = SensorConfig {
            data_chunk_size: 64,
            buffer_size: 32,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(SensorError::InvalidConfig(_))
        ));
    }

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let config: SensorConfig =
            serde_json::from_str(r#"{"buffer_size": 3200, "rd_signal_clutter_ratio": 0.8}"#)
                .unwrap();
        assert_eq!(config.buffer_size, 3200);
        assert_eq!(config.rd_signal_clutter_ratio, 0.8);
        assert_eq!(config.data_chunk_size, 32);
    }
}
