//! Configuration for provider selection and reads.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors loading configuration from a file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Cannot read config {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Configuration for the provider registry and file sessions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IospConfig {
    /// Bytes read from the start of a file and handed to each probe.
    pub header_probe_bytes: usize,

    /// Provider ids never tried by the registry.
    pub disabled_iosps: Vec<String>,

    /// Run `read_many` requests on the rayon pool.
    pub parallel_reads: bool,

    /// Log stored-versus-computed layout disagreements at warn level
    /// (debug otherwise).
    pub warn_on_layout_mismatch: bool,
}

impl Default for IospConfig {
    fn default() -> Self {
        Self {
            header_probe_bytes: 2048,
            disabled_iosps: Vec::new(),
            parallel_reads: true,
            warn_on_layout_mismatch: true,
        }
    }
}

impl IospConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("CDM_HEADER_PROBE_BYTES") {
            if let Ok(size) = val.parse() {
                config.header_probe_bytes = size;
            }
        }

        if let Ok(val) = std::env::var("CDM_DISABLED_IOSPS") {
            config.disabled_iosps = val
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }

        if let Ok(val) = std::env::var("CDM_PARALLEL_READS") {
            config.parallel_reads = val.to_lowercase() == "true" || val == "1";
        }

        if let Ok(val) = std::env::var("CDM_WARN_LAYOUT_MISMATCH") {
            config.warn_on_layout_mismatch = val.to_lowercase() == "true" || val == "1";
        }

        config
    }

    /// Parse configuration from YAML text. Missing keys take defaults.
    pub fn from_yaml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(text)?;
        config.validate().map_err(ConfigError::Invalid)?;
        Ok(config)
    }

    /// Load configuration from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_yaml_str(&contents)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.header_probe_bytes < 4 {
            return Err("header_probe_bytes must be >= 4".to_string());
        }
        Ok(())
    }

    pub fn is_disabled(&self, id: &str) -> bool {
        self.disabled_iosps.iter().any(|d| d.eq_ignore_ascii_case(id))
    }
}
