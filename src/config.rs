//! # Configuration Module
//!
//! Handles loading and validating configuration from TOML files.
//!
//! Every section and field has a default, so an empty file (or no file at
//! all) yields a working configuration.

use serde::de::Error;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::{FbusError, Result};
use crate::fbus::protocol::{FBUS_DEFAULT_DEVICE_ID, FBUS_MAX_CHANNELS};

/// Main configuration structure
#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub link: LinkConfig,

    #[serde(default)]
    pub sampler: SamplerConfig,

    #[serde(default)]
    pub mapping: MappingConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Serial link and protocol timing
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct LinkConfig {
    /// Serial device; the default candidates are tried when unset
    #[serde(default)]
    pub device: Option<String>,

    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,

    #[serde(default = "default_device_id")]
    pub device_id: u8,

    /// Use the simulated sampler instead of a real link
    #[serde(default)]
    pub simulated: bool,

    #[serde(default = "default_turnaround_min_us")]
    pub turnaround_min_us: u32,

    #[serde(default = "default_turnaround_max_us")]
    pub turnaround_max_us: u32,
}

/// Host-side sampling
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct SamplerConfig {
    #[serde(default = "default_period_ms")]
    pub period_ms: u64,

    #[serde(default = "default_simulated_period_ms")]
    pub simulated_period_ms: u64,

    #[serde(default = "default_quality_window")]
    pub quality_window: usize,

    #[serde(default = "default_quality_reset_threshold")]
    pub quality_reset_threshold: u8,
}

/// Channel index assignment for sticks, dials and switches
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct MappingConfig {
    #[serde(default = "default_throttle")]
    pub throttle: usize,

    #[serde(default = "default_steering")]
    pub steering: usize,

    #[serde(default = "default_aux_y")]
    pub aux_y: usize,

    #[serde(default = "default_aux_x")]
    pub aux_x: usize,

    #[serde(default = "default_dial1")]
    pub dial1: usize,

    #[serde(default = "default_dial2")]
    pub dial2: usize,

    #[serde(default = "default_switch_a")]
    pub switch_a: usize,

    #[serde(default = "default_switch_b")]
    pub switch_b: usize,

    #[serde(default = "default_switch_c")]
    pub switch_c: usize,

    #[serde(default = "default_switch_d")]
    pub switch_d: usize,

    #[serde(default = "default_switch_e")]
    pub switch_e: usize,

    /// Safety (arming) toggle
    #[serde(default = "default_switch_f")]
    pub switch_f: usize,

    #[serde(default = "default_switch_g")]
    pub switch_g: usize,

    /// Reverse toggle
    #[serde(default = "default_switch_h")]
    pub switch_h: usize,

    /// Hazard toggle
    #[serde(default = "default_switch_i")]
    pub switch_i: usize,
}

/// Logging output
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Directory for daily rolling log files; stdout only when unset
    #[serde(default)]
    pub dir: Option<String>,
}

// Default value functions
fn default_baud_rate() -> u32 { 460_800 }
fn default_device_id() -> u8 { FBUS_DEFAULT_DEVICE_ID }
fn default_turnaround_min_us() -> u32 { 500 }
fn default_turnaround_max_us() -> u32 { 2000 }

fn default_period_ms() -> u64 { 10 }
fn default_simulated_period_ms() -> u64 { 100 }
fn default_quality_window() -> usize { 10 }
fn default_quality_reset_threshold() -> u8 { 15 }

fn default_throttle() -> usize { 0 }
fn default_steering() -> usize { 1 }
fn default_aux_y() -> usize { 2 }
fn default_aux_x() -> usize { 3 }
fn default_dial1() -> usize { 4 }
fn default_dial2() -> usize { 5 }
fn default_switch_a() -> usize { 6 }
fn default_switch_b() -> usize { 7 }
fn default_switch_c() -> usize { 8 }
fn default_switch_d() -> usize { 9 }
fn default_switch_e() -> usize { 10 }
fn default_switch_f() -> usize { 11 }
fn default_switch_g() -> usize { 12 }
fn default_switch_h() -> usize { 13 }
fn default_switch_i() -> usize { 14 }

fn default_log_level() -> String { "info".to_string() }

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            device: None,
            baud_rate: default_baud_rate(),
            device_id: default_device_id(),
            simulated: false,
            turnaround_min_us: default_turnaround_min_us(),
            turnaround_max_us: default_turnaround_max_us(),
        }
    }
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            period_ms: default_period_ms(),
            simulated_period_ms: default_simulated_period_ms(),
            quality_window: default_quality_window(),
            quality_reset_threshold: default_quality_reset_threshold(),
        }
    }
}

impl Default for MappingConfig {
    fn default() -> Self {
        Self {
            throttle: default_throttle(),
            steering: default_steering(),
            aux_y: default_aux_y(),
            aux_x: default_aux_x(),
            dial1: default_dial1(),
            dial2: default_dial2(),
            switch_a: default_switch_a(),
            switch_b: default_switch_b(),
            switch_c: default_switch_c(),
            switch_d: default_switch_d(),
            switch_e: default_switch_e(),
            switch_f: default_switch_f(),
            switch_g: default_switch_g(),
            switch_h: default_switch_h(),
            switch_i: default_switch_i(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            dir: None,
        }
    }
}

impl MappingConfig {
    fn entries(&self) -> [(&'static str, usize); 15] {
        [
            ("throttle", self.throttle),
            ("steering", self.steering),
            ("aux_y", self.aux_y),
            ("aux_x", self.aux_x),
            ("dial1", self.dial1),
            ("dial2", self.dial2),
            ("switch_a", self.switch_a),
            ("switch_b", self.switch_b),
            ("switch_c", self.switch_c),
            ("switch_d", self.switch_d),
            ("switch_e", self.switch_e),
            ("switch_f", self.switch_f),
            ("switch_g", self.switch_g),
            ("switch_h", self.switch_h),
            ("switch_i", self.switch_i),
        ]
    }
}

fn invalid(msg: impl std::fmt::Display) -> FbusError {
    FbusError::Config(toml::de::Error::custom(msg))
}

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
    /// use fbus_link::config::Config;
    ///
    /// let config = Config::load("config/default.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    /// Parse and validate configuration text
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns error if any configuration value is out of valid range
    pub fn validate(&self) -> Result<()> {
        // Link
        if let Some(device) = &self.link.device {
            if device.is_empty() {
                return Err(invalid("link device cannot be empty (omit it to auto-detect)"));
            }
        }

        if ![115_200, 230_400, 460_800, 921_600].contains(&self.link.baud_rate) {
            return Err(invalid("baud_rate must be one of: 115200, 230400, 460800, 921600"));
        }

        if self.link.turnaround_min_us >= self.link.turnaround_max_us {
            return Err(invalid("turnaround_min_us must be less than turnaround_max_us"));
        }

        if self.link.turnaround_max_us > 10_000 {
            return Err(invalid("turnaround_max_us must be at most 10000"));
        }

        // Sampler
        if self.sampler.period_ms == 0 || self.sampler.period_ms > 1000 {
            return Err(invalid("period_ms must be between 1 and 1000"));
        }

        if self.sampler.simulated_period_ms == 0 || self.sampler.simulated_period_ms > 10_000 {
            return Err(invalid("simulated_period_ms must be between 1 and 10000"));
        }

        if self.sampler.quality_window == 0 || self.sampler.quality_window > 100 {
            return Err(invalid("quality_window must be between 1 and 100"));
        }

        // Mapping
        for (name, index) in self.mapping.entries() {
            if index >= FBUS_MAX_CHANNELS {
                return Err(invalid(format!(
                    "mapping {} index {} is out of bounds (must be 0-{})",
                    name,
                    index,
                    FBUS_MAX_CHANNELS - 1
                )));
            }
        }

        // Logging
        if !["trace", "debug", "info", "warn", "error"].contains(&self.logging.level.as_str()) {
            return Err(invalid("log level must be one of: trace, debug, info, warn, error"));
        }

        if let Some(dir) = &self.logging.dir {
            if dir.is_empty() {
                return Err(invalid("logging dir cannot be empty (omit it to log to stdout only)"));
            }
        }

        Ok(())
    }
}
