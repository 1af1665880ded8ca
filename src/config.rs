//! Typed server/sensor configuration, replacing the original's module-level settings
//!
//! The original implementation kept this as a module-level Python script: a
//! handful of `@dataclass` definitions plus directory-creation side effects
//! run at import time. Here configuration is plain data with no side effects
//! at construction — callers decide when (and whether) to create directories
//! or load overrides from disk.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

/// Errors produced while loading or validating configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failure reading or writing a config file.
    #[error("config file I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// Failure decoding a config file's JSON.
    #[error("config file JSON error: {0}")]
    Json(#[from] serde_json::Error),
    /// A sensor's `range_min` was not strictly less than its `range_max`.
    #[error("sensor {sensor_id}: range_min ({range_min}) >= range_max ({range_max})")]
    InvalidRange {
        /// The offending sensor.
        sensor_id: String,
        /// The configured minimum.
        range_min: f64,
        /// The configured maximum.
        range_max: f64,
    },
}

/// Server connection settings (§2A).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Hostname or IP the streaming client dispatches requests to.
    pub host: String,
    /// TCP port.
    pub port: u16,
    /// URL scheme, typically `"http"` or `"https"`.
    pub protocol: String,
    /// Per-request timeout, in seconds.
    pub timeout_s: u64,
    /// Number of retries attempted for a transient failure before giving up.
    pub retry_count: u32,
    /// Process-wide cap on in-flight requests (§5), enforced by a semaphore.
    pub max_concurrent_requests: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            host: "localhost".to_string(),
            port: 8084,
            protocol: "http".to_string(),
            timeout_s: 30,
            retry_count: 3,
            max_concurrent_requests: 100,
        }
    }
}

impl ServerConfig {
    /// The base URL this config resolves to, e.g. `http://localhost:8084`.
    pub fn url(&self) -> String {
        format!("{}://{}:{}", self.protocol, self.host, self.port)
    }

    /// Load a server config from a JSON file, falling back to per-field
    /// defaults for anything the file omits.
    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Write this config to a JSON file.
    pub fn to_json_file(&self, path: &Path) -> Result<(), ConfigError> {
        let text = serde_json::to_string_pretty(self)?;
        fs::write(path, text)?;
        Ok(())
    }
}

/// A single sensor's identity, data source, and valid value range (§2A).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SensorConfig {
    /// Unique sensor identifier, e.g. `"DM-PIT01"`.
    pub sensor_id: String,
    /// The dataset this sensor's readings originate from, e.g. `"hai"` or `"swat"`.
    pub data_source: String,
    /// Physical quantity measured, e.g. `"pressure"`, `"flow"`, `"temperature"`, `"level"`.
    pub sensor_type: String,
    /// Minimum valid reading.
    pub range_min: f64,
    /// Maximum valid reading.
    pub range_max: f64,
    /// Sampling rate in Hz.
    pub sampling_rate: u32,
    /// Physical unit, e.g. `"bar"`, `"L/min"`, `"°C"`, `"%"`.
    pub unit: String,
}

impl SensorConfig {
    /// Validate that `range_min < range_max`.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.range_min >= self.range_max {
            return Err(ConfigError::InvalidRange {
                sensor_id: self.sensor_id.clone(),
                range_min: self.range_min,
                range_max: self.range_max,
            });
        }
        Ok(())
    }
}

/// A small catalog of representative HAI-dataset sensors (§2A.1), grounded on
/// the original implementation's `HAI_SENSORS` table. Not exhaustive: this is
/// bring-up/demo data, not a dataset loader.
pub mod sensor_catalog {
    use super::SensorConfig;

    /// Pressure sensor with a 0-50 bar range.
    pub fn dm_pit01() -> SensorConfig {
        SensorConfig {
            sensor_id: "DM-PIT01".to_string(),
            data_source: "hai".to_string(),
            sensor_type: "pressure".to_string(),
            range_min: 0.0,
            range_max: 50.0,
            sampling_rate: 1,
            unit: "bar".to_string(),
        }
    }

    /// Pressure sensor with a 0-2 bar range.
    pub fn dm_pit02() -> SensorConfig {
        SensorConfig {
            sensor_id: "DM-PIT02".to_string(),
            data_source: "hai".to_string(),
            sensor_type: "pressure".to_string(),
            range_min: 0.0,
            range_max: 2.0,
            sampling_rate: 1,
            unit: "bar".to_string(),
        }
    }

    /// Flow sensor with a 0-500 L/min range.
    pub fn dm_ft01() -> SensorConfig {
        SensorConfig {
            sensor_id: "DM-FT01".to_string(),
            data_source: "hai".to_string(),
            sensor_type: "flow".to_string(),
            range_min: 0.0,
            range_max: 500.0,
            sampling_rate: 1,
            unit: "L/min".to_string(),
        }
    }

    /// Temperature sensor with a 0-100 degC range.
    pub fn dm_tit01() -> SensorConfig {
        SensorConfig {
            sensor_id: "DM-TIT01".to_string(),
            data_source: "hai".to_string(),
            sensor_type: "temperature".to_string(),
            range_min: 0.0,
            range_max: 100.0,
            sampling_rate: 1,
            unit: "degC".to_string(),
        }
    }

    /// Level sensor with a 0-100% range.
    pub fn dm_lit01() -> SensorConfig {
        SensorConfig {
            sensor_id: "DM-LIT01".to_string(),
            data_source: "hai".to_string(),
            sensor_type: "level".to_string(),
            range_min: 0.0,
            range_max: 100.0,
            sampling_rate: 1,
            unit: "%".to_string(),
        }
    }

    /// All catalog entries.
    pub fn all() -> Vec<SensorConfig> {
        vec![dm_pit01(), dm_pit02(), dm_ft01(), dm_tit01(), dm_lit01()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_config_url_formats_correctly() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.url(), "http://localhost:8084");
    }

    #[test]
    fn server_config_round_trips_through_json() {
        let dir = std::env::temp_dir().join(format!("ics-attest-core-test-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("server.json");
        let cfg = ServerConfig { host: "example.internal".to_string(), port: 9090, ..Default::default() };
        cfg.to_json_file(&path).unwrap();
        let loaded = ServerConfig::from_json_file(&path).unwrap();
        assert_eq!(cfg, loaded);
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn sensor_config_rejects_inverted_range() {
        let mut sensor = sensor_catalog::dm_pit01();
        sensor.range_min = 100.0;
        sensor.range_max = 0.0;
        assert!(sensor.validate().is_err());
    }

    #[test]
    fn sensor_catalog_entries_all_validate() {
        for sensor in sensor_catalog::all() {
            sensor.validate().unwrap();
        }
    }
}
