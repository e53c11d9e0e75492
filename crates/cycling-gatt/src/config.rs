use crate::advertising::DEFAULT_DEVICE_NAME;
use crate::line_stream::MAX_LINE_LEN;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Settings for a sensor bring-up, typically loaded from YAML.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorConfig {
    pub device_name: String,
    /// Skip catalog verification and rebuild on every start.
    pub always_reprovision: bool,
    /// How long to wait for the catalog listing.
    pub response_wait_ms: u64,
    pub max_line_len: usize,
    /// Cadence of measurement updates.
    pub update_interval_ms: u64,
    /// Also create a (write-only) control point characteristic.
    pub control_point: bool,
    pub cache_path: Option<PathBuf>,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            device_name: DEFAULT_DEVICE_NAME.to_string(),
            always_reprovision: true,
            response_wait_ms: 100,
            max_line_len: MAX_LINE_LEN,
            update_interval_ms: 200,
            control_point: false,
            cache_path: None,
        }
    }
}

pub fn load_config_file(path: impl AsRef<Path>) -> anyhow::Result<SensorConfig> {
    let path = path.as_ref();
    let raw = fs::read_to_string(path)
        .with_context(|| format!("reading config: {}", path.display()))?;
    let cfg: SensorConfig =
        serde_yaml::from_str(&raw).with_context(|| format!("parsing yaml: {}", path.display()))?;
    Ok(cfg)
}
