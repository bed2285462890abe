//! Bench configuration.
//!
//! One JSON file describes the whole bench: which sensor feeds the loop,
//! where each instrument lives, and the per-axis loop tuning. Missing
//! fields fall back to their defaults, so a minimal file only needs the
//! values that differ from a stock bench.

use std::path::Path;

use hardware::coil::ChecksumScheme;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from loading or validating a configuration file.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// File could not be read or written.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// File is not valid JSON for this schema.
    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// Values are structurally valid but unusable.
    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Which instrument drives the control loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SensorSource {
    /// MDL datalogger station over TCP.
    #[default]
    Mdl,
    /// MFG-3 fluxgate over serial.
    Mfg,
}

/// MFG-3 serial connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MfgConfig {
    pub port: String,
    pub baud: u32,
    /// Sampling rate wire code (0-3).
    pub rate_code: u8,
}

impl Default for MfgConfig {
    fn default() -> Self {
        Self {
            port: "/dev/ttyUSB0".to_string(),
            baud: 115_200,
            rate_code: 2,
        }
    }
}

/// MDL station connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MdlConfig {
    pub addr: String,
    pub timeout_ms: u64,
}

impl Default for MdlConfig {
    fn default() -> Self {
        Self {
            addr: format!("192.168.1.50:{}", hardware::mdl::DEFAULT_PORT),
            timeout_ms: 5000,
        }
    }
}

/// Coil amplifier connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CoilConfig {
    /// Serial port of the amplifier. `None` discards frames (dry run).
    pub port: Option<String>,
    pub baud: u32,
    pub scheme: ChecksumScheme,
    pub transmit_period_ms: u64,
}

impl Default for CoilConfig {
    fn default() -> Self {
        Self {
            port: None,
            baud: 115_200,
            scheme: ChecksumScheme::default(),
            transmit_period_ms: 100,
        }
    }
}

/// Per-axis loop tuning, applied identically to all three axes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlConfig {
    pub kp: f64,
    pub ki: f64,
    pub kd: f64,
    pub output_min: f64,
    pub output_max: f64,
    pub process_noise: f64,
    pub measurement_noise: f64,
    pub control_period_ms: u64,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            kp: 0.5,
            ki: 0.05,
            kd: 0.0,
            output_min: -5000.0,
            output_max: 5000.0,
            process_noise: 1.0,
            measurement_noise: 100.0,
            control_period_ms: 10,
        }
    }
}

/// Complete bench configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CageConfig {
    pub source: SensorSource,
    pub mfg: MfgConfig,
    pub mdl: MdlConfig,
    pub coil: CoilConfig,
    pub control: ControlConfig,
}

impl CageConfig {
    /// Load and validate a configuration file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Write the configuration as pretty-printed JSON.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let text = serde_json::to_string_pretty(self)?;
        std::fs::write(path, text)?;
        Ok(())
    }

    /// Check value-level constraints the schema cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.control.output_min >= self.control.output_max {
            return Err(ConfigError::Invalid(format!(
                "output bounds must satisfy min < max, got [{}, {}]",
                self.control.output_min, self.control.output_max
            )));
        }
        if self.control.measurement_noise <= 0.0 {
            return Err(ConfigError::Invalid(
                "measurement noise must be positive".to_string(),
            ));
        }
        if self.control.control_period_ms == 0 || self.coil.transmit_period_ms == 0 {
            return Err(ConfigError::Invalid(
                "tick periods must be non-zero".to_string(),
            ));
        }
        if hardware::mfg::SampleRate::from_code(self.mfg.rate_code).is_none() {
            return Err(ConfigError::Invalid(format!(
                "unknown MFG rate code {}",
                self.mfg.rate_code
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn temp_config_path() -> std::path::PathBuf {
        std::env::temp_dir().join(format!(
            "cage_config_test_{}.json",
            SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap()
                .as_nanos()
        ))
    }

    #[test]
    fn test_default_config_is_valid() {
        CageConfig::default().validate().unwrap();
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let path = temp_config_path();
        let mut config = CageConfig::default();
        config.source = SensorSource::Mfg;
        config.control.kp = 1.25;
        config.coil.scheme = ChecksumScheme::Xor;

        config.save(&path).unwrap();
        let loaded = CageConfig::load(&path).unwrap();

        assert_eq!(loaded.source, SensorSource::Mfg);
        assert_eq!(loaded.control.kp, 1.25);
        assert_eq!(loaded.coil.scheme, ChecksumScheme::Xor);

        std::fs::remove_file(path).ok();
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let path = temp_config_path();
        std::fs::write(&path, r#"{"control": {"kp": 2.0}}"#).unwrap();

        let loaded = CageConfig::load(&path).unwrap();
        assert_eq!(loaded.control.kp, 2.0);
        assert_eq!(loaded.control.ki, ControlConfig::default().ki);
        assert_eq!(loaded.source, SensorSource::Mdl);

        std::fs::remove_file(path).ok();
    }

    #[test]
    fn test_inverted_bounds_rejected() {
        let mut config = CageConfig::default();
        config.control.output_min = 100.0;
        config.control.output_max = -100.0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_unknown_rate_code_rejected() {
        let mut config = CageConfig::default();
        config.mfg.rate_code = 9;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let path = temp_config_path();
        assert!(matches!(
            CageConfig::load(&path),
            Err(ConfigError::Io(_))
        ));
    }
}
