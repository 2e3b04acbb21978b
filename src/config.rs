//! Configuration for the recorder CLI.

use crate::source::{QuantityType, SimulatedConfig, Unit};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Main configuration for a recording session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Quantity to record
    pub quantity: QuantityType,

    /// Unit samples are persisted in; the quantity's default when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<Unit>,

    /// Identifier of the task step the recording belongs to
    pub step_identifier: String,

    /// How long a recording runs before it is stopped
    #[serde(with = "duration_serde")]
    pub duration: Duration,

    /// Directory data files are written to
    pub output_path: PathBuf,

    /// Settings for the simulated data source
    pub simulated: SimulatedSettings,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("quantity-recorder");

        Self {
            quantity: QuantityType::HeartRate,
            unit: None,
            step_identifier: "recording".to_string(),
            duration: Duration::from_secs(30),
            output_path: data_dir.join("recordings"),
            simulated: SimulatedSettings::default(),
        }
    }
}

impl Config {
    /// Load configuration from the default location.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_path();

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let config: Config = serde_json::from_str(&content)?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to the default location.
    pub fn save(&self) -> Result<(), ConfigError> {
        let config_path = Self::config_path();

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(&config_path, content)?;
        Ok(())
    }

    /// Get the path to the configuration file.
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("quantity-recorder")
            .join("config.json")
    }

    /// Ensure the output directory exists.
    pub fn ensure_directories(&self) -> Result<(), ConfigError> {
        std::fs::create_dir_all(&self.output_path)?;
        Ok(())
    }

    /// The unit recordings are persisted in.
    pub fn effective_unit(&self) -> Unit {
        self.unit.unwrap_or_else(|| self.quantity.default_unit())
    }
}

/// Settings for the simulated data source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulatedSettings {
    /// Milliseconds between batches
    pub interval_ms: u64,
    /// Samples per batch
    pub batch_size: usize,
    /// Center of the generated values; per-quantity default when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub baseline: Option<f64>,
    /// Peak deviation from the baseline
    pub amplitude: f64,
}

impl Default for SimulatedSettings {
    fn default() -> Self {
        Self {
            interval_ms: 1000,
            batch_size: 1,
            baseline: None,
            amplitude: 6.0,
        }
    }
}

impl SimulatedSettings {
    pub fn to_source_config(&self) -> SimulatedConfig {
        SimulatedConfig {
            interval: Duration::from_millis(self.interval_ms),
            batch_size: self.batch_size,
            baseline: self.baseline,
            amplitude: self.amplitude,
            ..SimulatedConfig::default()
        }
    }
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Serde support for Duration.
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_secs().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
