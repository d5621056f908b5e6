//! # Configuration Module
//!
//! Handles loading and validating configuration from TOML files.

use serde::de::Error;
use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::error::Result;
use crate::rotation::RotationPolicy;

/// Main configuration structure
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub sensor: SensorConfig,
    pub storage: StorageConfig,
    pub fetch: FetchConfig,
    pub server: ServerConfig,
}

/// Sensor acquisition configuration
#[derive(Debug, Deserialize, Clone)]
pub struct SensorConfig {
    #[serde(default = "default_acquisition_interval_s")]
    pub acquisition_interval_s: u64,

    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

/// Log storage configuration
#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    #[serde(default = "default_readings_dir")]
    pub readings_dir: String,

    #[serde(default = "default_rotation")]
    pub rotation: String,
}

/// External pollutant fetch configuration
#[derive(Debug, Deserialize, Clone)]
pub struct FetchConfig {
    #[serde(default = "default_fetch_enabled")]
    pub enabled: bool,

    #[serde(default = "default_fetch_interval_s")]
    pub interval_s: u64,

    #[serde(default)]
    pub url: String,

    #[serde(default)]
    pub api_key: String,
}

/// Dashboard server configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

// Default value functions
fn default_acquisition_interval_s() -> u64 { 300 }
fn default_max_retries() -> u32 { 10 }
fn default_retry_delay_ms() -> u64 { 1000 }

fn default_readings_dir() -> String { "./readings".to_string() }
fn default_rotation() -> String { "daily".to_string() }

fn default_fetch_enabled() -> bool { true }
fn default_fetch_interval_s() -> u64 { 3600 }

fn default_bind() -> String { "0.0.0.0".to_string() }
fn default_port() -> u16 { 8080 }

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the configuration file
    ///
    /// # Returns
    ///
    /// * `Result<Config>` - Loaded and validated configuration
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - File cannot be read
    /// - TOML parsing fails
    /// - Validation fails
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use co2_monitor::config::Config;
    ///
    /// let config = Config::load("config/default.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// The configured rotation policy.
    pub fn rotation_policy(&self) -> RotationPolicy {
        // validate() guarantees the string parses
        RotationPolicy::parse(&self.storage.rotation).unwrap_or(RotationPolicy::Daily)
    }

    /// Validate configuration values
    ///
    /// # Returns
    ///
    /// * `Result<()>` - Ok if valid, Err if invalid
    ///
    /// # Errors
    ///
    /// Returns error if any configuration value is out of valid range
    fn validate(&self) -> Result<()> {
        if self.sensor.acquisition_interval_s == 0 || self.sensor.acquisition_interval_s > 86400 {
            return Err(crate::error::MonitorError::Config(
                toml::de::Error::custom("acquisition_interval_s must be between 1 and 86400")
            ));
        }

        if self.sensor.max_retries == 0 || self.sensor.max_retries > 100 {
            return Err(crate::error::MonitorError::Config(
                toml::de::Error::custom("max_retries must be between 1 and 100")
            ));
        }

        if self.sensor.retry_delay_ms == 0 || self.sensor.retry_delay_ms > 60000 {
            return Err(crate::error::MonitorError::Config(
                toml::de::Error::custom("retry_delay_ms must be between 1 and 60000")
            ));
        }

        if self.storage.readings_dir.is_empty() {
            return Err(crate::error::MonitorError::Config(
                toml::de::Error::custom("readings_dir cannot be empty")
            ));
        }

        if RotationPolicy::parse(&self.storage.rotation).is_none() {
            return Err(crate::error::MonitorError::Config(
                toml::de::Error::custom("rotation must be 'daily' or 'weekly'")
            ));
        }

        if self.fetch.enabled {
            if self.fetch.url.is_empty() {
                return Err(crate::error::MonitorError::Config(
                    toml::de::Error::custom("fetch url cannot be empty when enabled")
                ));
            }

            if self.fetch.interval_s == 0 || self.fetch.interval_s > 86400 {
                return Err(crate::error::MonitorError::Config(
                    toml::de::Error::custom("fetch interval_s must be between 1 and 86400")
                ));
            }
        }

        if self.server.bind.is_empty() {
            return Err(crate::error::MonitorError::Config(
                toml::de::Error::custom("server bind address cannot be empty")
            ));
        }

        if self.server.port == 0 {
            return Err(crate::error::MonitorError::Config(
                toml::de::Error::custom("server port must be greater than 0")
            ));
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sensor: SensorConfig {
                acquisition_interval_s: default_acquisition_interval_s(),
                max_retries: default_max_retries(),
                retry_delay_ms: default_retry_delay_ms(),
            },
            storage: StorageConfig {
                readings_dir: default_readings_dir(),
                rotation: default_rotation(),
            },
            fetch: FetchConfig {
                enabled: false,
                interval_s: default_fetch_interval_s(),
                url: String::new(),
                api_key: String::new(),
            },
            server: ServerConfig {
                bind: default_bind(),
                port: default_port(),
            },
        }
    }
}
