//! Configuration loading traits and types.
//!
//! The pipeline reads a single TOML file. Every section is optional and every
//! field has a default, so a partial file (or no file at all) still yields a
//! usable configuration with optional features switched off.
//!
//! # Usage
//!
//! ```rust,no_run
//! use haptic_common::config::{ConfigLoader, HapticConfig, ConfigError};
//! use std::path::Path;
//!
//! fn main() -> Result<(), ConfigError> {
//!     let config = HapticConfig::load(Path::new("haptic.toml"))?;
//!     config.validate()?;
//!     println!("Service: {}", config.shared.service_name);
//!     Ok(())
//! }
//! ```

use crate::consts::{
    FRAME_DURATION_MS, MIN_DURATION_MS, MIN_SUBMIT_INTERVAL_MS, TICK_INTERVAL_MS,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

/// Configuration loading and validation failures.
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    /// Configuration file not found at specified path.
    #[error("Configuration file not found")]
    FileNotFound,

    /// TOML parsing failed.
    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    /// Semantic validation failed.
    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

/// Log level of the service.
///
/// Written in lowercase in the TOML file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Per-tick and per-frame detail.
    Trace,
    /// Periodic summaries and state transitions.
    Debug,
    /// Lifecycle events.
    #[default]
    Info,
    /// Dropped work and recoverable failures.
    Warn,
    /// Failures that stop the service.
    Error,
}

impl From<LogLevel> for tracing::Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => tracing::Level::TRACE,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Error => tracing::Level::ERROR,
        }
    }
}

/// Common configuration fields.
///
/// # TOML Example
///
/// ```toml
/// [shared]
/// log_level = "debug"
/// service_name = "haptic-core-01"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SharedConfig {
    /// Logging verbosity level.
    #[serde(default)]
    pub log_level: LogLevel,

    /// Instance name used in logs.
    pub service_name: String,
}

impl SharedConfig {
    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationError` if `service_name` is empty.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.service_name.is_empty() {
            return Err(ConfigError::ValidationError(
                "service_name cannot be empty".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for SharedConfig {
    fn default() -> Self {
        Self {
            log_level: LogLevel::default(),
            service_name: "haptic-core".to_string(),
        }
    }
}

/// Feature switches read by the pipeline.
///
/// Missing switches take their safe state: hot-plug and diagnostics off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureFlags {
    /// Register devices automatically when they connect at runtime.
    pub enable_hotplug: bool,
    /// Let locally-owned points drive the local devices.
    pub enable_self_feedback: bool,
    /// Emit per-tick and per-frame diagnostic logs.
    pub enable_diagnostics: bool,
}

impl Default for FeatureFlags {
    fn default() -> Self {
        Self {
            enable_hotplug: false,
            enable_self_feedback: true,
            enable_diagnostics: false,
        }
    }
}

/// Timing parameters of the sampling loop and the submission gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// Sampling tick interval [ms].
    pub tick_interval_ms: u64,
    /// Minimum spacing of submissions per (position, pattern) [ms].
    pub min_submit_interval_ms: u64,
    /// Floor applied to every play duration [ms].
    pub min_duration_ms: u32,
    /// Duration requested for each sampled frame [ms].
    pub frame_duration_ms: u32,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: TICK_INTERVAL_MS,
            min_submit_interval_ms: MIN_SUBMIT_INTERVAL_MS,
            min_duration_ms: MIN_DURATION_MS as u32,
            frame_duration_ms: FRAME_DURATION_MS as u32,
        }
    }
}

impl TimingConfig {
    /// Sampling tick interval.
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    /// Minimum submission spacing.
    pub fn min_submit_interval(&self) -> Duration {
        Duration::from_millis(self.min_submit_interval_ms)
    }

    /// Duration floor, saturated to the wire range.
    pub fn min_duration_ms(&self) -> u16 {
        u16::try_from(self.min_duration_ms).unwrap_or(u16::MAX)
    }

    /// Per-frame duration, saturated to the wire range.
    pub fn frame_duration_ms(&self) -> u16 {
        u16::try_from(self.frame_duration_ms).unwrap_or(u16::MAX)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.tick_interval_ms == 0 {
            return Err(ConfigError::ValidationError(
                "tick_interval_ms must be > 0".to_string(),
            ));
        }
        if self.min_submit_interval_ms == 0 {
            return Err(ConfigError::ValidationError(
                "min_submit_interval_ms must be > 0".to_string(),
            ));
        }
        if self.min_duration_ms > u16::MAX as u32 {
            return Err(ConfigError::ValidationError(format!(
                "min_duration_ms {} exceeds {}",
                self.min_duration_ms,
                u16::MAX
            )));
        }
        if self.frame_duration_ms > u16::MAX as u32 {
            return Err(ConfigError::ValidationError(format!(
                "frame_duration_ms {} exceeds {}",
                self.frame_duration_ms,
                u16::MAX
            )));
        }
        Ok(())
    }
}

/// Complete configuration of a haptic pipeline instance.
///
/// # TOML Example
///
/// ```toml
/// [shared]
/// service_name = "haptic-core"
///
/// [features]
/// enable_hotplug = true
///
/// [timing]
/// tick_interval_ms = 10
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HapticConfig {
    /// Logging and identity.
    pub shared: SharedConfig,
    /// Optional features.
    pub features: FeatureFlags,
    /// Loop and gateway timing.
    pub timing: TimingConfig,
}

impl HapticConfig {
    /// Validate all sections.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.shared.validate()?;
        self.timing.validate()
    }

    /// Load and validate a configuration, falling back to defaults.
    ///
    /// A missing, unreadable or invalid file is not fatal: the problem is
    /// logged and the default configuration (optional features off) is used.
    pub fn load_or_default(path: &Path) -> Self {
        let loaded = Self::load(path).and_then(|config| {
            config.validate()?;
            Ok(config)
        });
        match loaded {
            Ok(config) => {
                info!("Loaded configuration from {:?}", path);
                config
            }
            Err(ConfigError::FileNotFound) => {
                info!("No configuration at {:?}, using defaults", path);
                Self::default()
            }
            Err(e) => {
                warn!("Ignoring configuration {:?}: {}. Using defaults.", path, e);
                Self::default()
            }
        }
    }
}

/// Trait for loading configuration from TOML files.
///
/// # Contract
///
/// - Returns `ConfigError::FileNotFound` if the file does not exist
/// - Returns `ConfigError::ParseError` if TOML syntax is invalid
pub trait ConfigLoader: Sized + serde::de::DeserializeOwned {
    /// Load configuration from a TOML file.
    fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::FileNotFound
            } else {
                ConfigError::ParseError(e.to_string())
            }
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }
}

// Blanket implementation: any serde-deserializable struct can be loaded.
impl<T: serde::de::DeserializeOwned> ConfigLoader for T {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_log_level_default() {
        assert_eq!(LogLevel::default(), LogLevel::Info);
    }

    #[test]
    fn test_log_level_deserialization() {
        #[derive(Debug, Deserialize, PartialEq)]
        struct TestWrapper {
            level: LogLevel,
        }

        assert_eq!(
            toml::from_str::<TestWrapper>("level = \"trace\"")
                .unwrap()
                .level,
            LogLevel::Trace
        );
        assert_eq!(
            toml::from_str::<TestWrapper>("level = \"warn\"")
                .unwrap()
                .level,
            LogLevel::Warn
        );
    }

    #[test]
    fn test_log_level_into_tracing() {
        assert_eq!(tracing::Level::from(LogLevel::Debug), tracing::Level::DEBUG);
        assert_eq!(tracing::Level::from(LogLevel::Error), tracing::Level::ERROR);
    }

    #[test]
    fn test_defaults_are_safe() {
        let config = HapticConfig::default();
        assert!(!config.features.enable_hotplug);
        assert!(!config.features.enable_diagnostics);
        assert!(config.features.enable_self_feedback);
        assert_eq!(config.timing.tick_interval(), Duration::from_millis(10));
        assert_eq!(config.timing.min_duration_ms(), 40);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_shared_config_validation_empty_service_name() {
        let config = SharedConfig {
            log_level: LogLevel::Info,
            service_name: "".to_string(),
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn test_timing_validation_rejects_zero_tick() {
        let mut config = HapticConfig::default();
        config.timing.tick_interval_ms = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn test_timing_validation_rejects_oversized_duration() {
        let mut config = HapticConfig::default();
        config.timing.min_duration_ms = 70_000;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_loader_file_not_found() {
        let result = HapticConfig::load(Path::new("/nonexistent/path/haptic.toml"));
        assert!(matches!(result, Err(ConfigError::FileNotFound)));
    }

    #[test]
    fn test_config_loader_parse_error() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "invalid toml {{{{").unwrap();

        let result = HapticConfig::load(file.path());
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[features]
enable_hotplug = true

[timing]
min_duration_ms = 60
"#
        )
        .unwrap();
        file.flush().unwrap();

        let config = HapticConfig::load(file.path()).unwrap();
        assert!(config.features.enable_hotplug);
        assert!(config.features.enable_self_feedback);
        assert_eq!(config.timing.min_duration_ms(), 60);
        assert_eq!(config.timing.tick_interval_ms, TICK_INTERVAL_MS);
        assert_eq!(config.shared.service_name, "haptic-core");
    }

    #[test]
    fn test_load_or_default_on_invalid_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "[timing]\ntick_interval_ms = 0\n").unwrap();
        file.flush().unwrap();

        let config = HapticConfig::load_or_default(file.path());
        assert_eq!(config.timing.tick_interval_ms, TICK_INTERVAL_MS);
    }
}
