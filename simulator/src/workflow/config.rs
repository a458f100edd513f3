use crate::generator::profile::GeneratorConfig;
use anyhow::Context;
use mmwcore::SensorConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowConfig {
    /// Enhanced (CLI) port, e.g. `/dev/ttyUSB0` or `COM3`.
    pub user_port: Option<String>,
    /// Standard (data) port.
    pub data_port: Option<String>,
    /// Vendor configuration script sent before starting the sensor.
    pub config_script: Option<PathBuf>,
    pub tick_interval_ms: u64,
    /// Stop after this many decoded frames.
    pub max_frames: Option<usize>,
    /// Stop after this many consecutive ticks without a frame.
    pub max_idle_ticks: Option<usize>,
    pub sensor: SensorConfig,
    pub generator: GeneratorConfig,
}

impl WorkflowConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path_ref = path.as_ref();
        let contents = fs::read_to_string(path_ref)
            .with_context(|| format!("reading workflow config {}", path_ref.display()))?;
        let config: WorkflowConfig = serde_yaml::from_str(&contents)
            .with_context(|| format!("parsing workflow config {}", path_ref.display()))?;
        config
            .sensor
            .validate()
            .with_context(|| format!("validating sensor section of {}", path_ref.display()))?;
        Ok(config)
    }

    pub fn from_ports(user_port: String, data_port: String, config_script: Option<PathBuf>) -> Self {
        Self {
            user_port: Some(user_port),
            data_port: Some(data_port),
            config_script,
            ..Default::default()
        }
    }

    pub fn ports(&self) -> Option<(&str, &str)> {
        Some((self.user_port.as_deref()?, self.data_port.as_deref()?))
    }
}
