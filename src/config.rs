//! Configuration loading from TOML
//!
//! # Configuration File Format
//!
//! ```toml
//! device_port = "/dev/ttyUSB0"
//! protocol_version = "2.0"
//! simulation = false
//! sigslots_namespace = "/kobuki"
//!
//! # Wheel geometry (optional, defaults shown)
//! [geometry]
//! wheel_base = 0.298
//! wheel_radius = 0.042
//! ticks_per_revolution = 2578.33
//! ```
//!
//! Only `protocol_version = "2.0"` enables sub-record decoding; any other
//! value is accepted at load time but the dispatcher drains frames without
//! parsing them.

use crate::error::{Error, Result};
use serde::Deserialize;
use std::f64::consts::PI;
use std::fs;
use std::path::Path;

/// Wheel geometry used by odometry and motion encoding.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct Geometry {
    /// Wheel-to-wheel distance in metres
    #[serde(default = "default_wheel_base")]
    pub wheel_base: f64,

    /// Wheel radius in metres
    #[serde(default = "default_wheel_radius")]
    pub wheel_radius: f64,

    /// Encoder ticks per wheel revolution
    #[serde(default = "default_ticks_per_revolution")]
    pub ticks_per_revolution: f64,
}

fn default_wheel_base() -> f64 {
    0.298
}

fn default_wheel_radius() -> f64 {
    0.042
}

fn default_ticks_per_revolution() -> f64 {
    2578.33
}

impl Default for Geometry {
    fn default() -> Self {
        Self {
            wheel_base: default_wheel_base(),
            wheel_radius: default_wheel_radius(),
            ticks_per_revolution: default_ticks_per_revolution(),
        }
    }
}

impl Geometry {
    /// Wheel angle per encoder tick, radians.
    #[inline]
    pub fn tick_to_rad(&self) -> f64 {
        2.0 * PI / self.ticks_per_revolution
    }

    /// Wheel arc length per encoder tick, millimetres.
    #[inline]
    pub fn tick_to_mm(&self) -> f64 {
        2.0 * PI * self.wheel_radius * 1000.0 / self.ticks_per_revolution
    }
}

/// Driver configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Path to the serial device node
    ///
    /// **Required** unless `simulation = true`.
    pub device_port: String,

    /// Sensor stream protocol version; only `"2.0"` is decoded
    pub protocol_version: String,

    /// When true, no serial I/O occurs and commands are discarded
    #[serde(default)]
    pub simulation: bool,

    /// Prefix for all observer channel names
    pub sigslots_namespace: String,

    /// Wheel geometry
    #[serde(default)]
    pub geometry: Geometry,
}

impl Config {
    /// Load and validate configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path)
            .map_err(|e| Error::Config(format!("Failed to read config: {}", e)))?;

        let config: Config = basic_toml::from_str(&content)
            .map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Validate parameter values; called by [`load`](Self::load) and by the
    /// driver constructor for configs built in code.
    pub fn validate(&self) -> Result<()> {
        if !self.simulation && self.device_port.is_empty() {
            return Err(Error::Config(
                "device_port must be set when not simulating".to_string(),
            ));
        }
        if self.sigslots_namespace.is_empty() {
            return Err(Error::Config("sigslots_namespace must be set".to_string()));
        }
        if self.geometry.wheel_base <= 0.0
            || self.geometry.wheel_radius <= 0.0
            || self.geometry.ticks_per_revolution <= 0.0
        {
            return Err(Error::Config(format!(
                "geometry values must be positive (wheel_base={}, wheel_radius={}, ticks_per_revolution={})",
                self.geometry.wheel_base,
                self.geometry.wheel_radius,
                self.geometry.ticks_per_revolution
            )));
        }
        Ok(())
    }
}
