//! Configuration System using Figment
//!
//! Settings are loaded from:
//! 1. `config/daq-trigger.toml` (base configuration, optional)
//! 2. Environment variables prefixed with `DAQ_TRIGGER_`, nested keys separated by `__`
//!
//! Every field has a default, so an empty or missing file yields a parallel-port trigger
//! at `0x378` with a 50 ms hold time.
//!
//! # Example
//!
//! ```toml
//! delay_ms = 50
//! verbose = true
//! log_level = "info"
//!
//! [backend]
//! type = "arduino"
//! pattern = "Arduino"
//! ```
//!
//! ```no_run
//! use daq_trigger::config::TriggerSettings;
//!
//! # fn main() -> daq_trigger::Result<()> {
//! let settings = TriggerSettings::load()?;
//! settings.validate()?;
//! println!("Hold time: {} ms", settings.delay_ms);
//! # Ok(())
//! # }
//! ```

use crate::error::{Result, TriggerError};
use crate::hardware::driver::DEFAULT_DRIVER_DIR;
use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default settings file, relative to the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "config/daq-trigger.toml";

/// Environment variable prefix for overrides, e.g. `DAQ_TRIGGER_DELAY_MS=100`.
pub const ENV_PREFIX: &str = "DAQ_TRIGGER_";

/// Top-level trigger settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TriggerSettings {
    /// Minimum hold time of a trigger value in milliseconds
    pub delay_ms: u64,
    /// Log every sent trigger at info level
    pub verbose: bool,
    /// Logging level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Hardware backend
    pub backend: BackendSettings,
}

/// Backend selection, tagged by `type`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BackendSettings {
    /// Parallel port card
    Lpt {
        /// I/O address of the port, usually 0x378 or 0x278
        #[serde(default = "default_port_address")]
        port_address: u16,
        /// Directory holding the `LptControl_*` libraries
        #[serde(default = "default_driver_dir")]
        driver_dir: PathBuf,
    },
    /// USB to LPT converter
    Usb2lpt {
        /// Directory holding the `LptControl_*` libraries
        #[serde(default = "default_driver_dir")]
        driver_dir: PathBuf,
    },
    /// Arduino to LPT converter
    Arduino {
        /// Serial device; discovered by `pattern` when absent
        #[serde(default)]
        port: Option<String>,
        /// Case-insensitive regex matched against port descriptors
        #[serde(default = "default_pattern")]
        pattern: String,
        /// Serial link speed
        #[serde(default = "default_baud_rate")]
        baud_rate: u32,
        /// Wait after opening the port, in milliseconds
        #[serde(default = "default_settle_ms")]
        settle_ms: u64,
    },
    /// In-memory output, nothing leaves the process
    Mock,
}

// Default value functions
fn default_delay_ms() -> u64 {
    50
}

fn default_port_address() -> u16 {
    0x378
}

fn default_driver_dir() -> PathBuf {
    PathBuf::from(DEFAULT_DRIVER_DIR)
}

fn default_pattern() -> String {
    crate::hardware::port_discovery::ARDUINO_PATTERN.to_string()
}

fn default_baud_rate() -> u32 {
    115_200
}

fn default_settle_ms() -> u64 {
    1000
}

impl Default for BackendSettings {
    fn default() -> Self {
        BackendSettings::Lpt {
            port_address: default_port_address(),
            driver_dir: default_driver_dir(),
        }
    }
}

impl Default for TriggerSettings {
    fn default() -> Self {
        Self {
            delay_ms: default_delay_ms(),
            verbose: true,
            log_level: "info".to_string(),
            backend: BackendSettings::default(),
        }
    }
}

impl TriggerSettings {
    /// Load settings from `config/daq-trigger.toml` and environment variables
    pub fn load() -> Result<Self> {
        Self::load_from(DEFAULT_CONFIG_PATH)
    }

    /// Load settings from a specific file path
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(Self::figment(path).extract()?)
    }

    /// The layered provider chain, exposed so callers can merge further overrides.
    pub fn figment<P: AsRef<Path>>(path: P) -> Figment {
        Figment::new()
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Validate settings after loading
    pub fn validate(&self) -> Result<()> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.log_level.to_lowercase().as_str()) {
            return Err(TriggerError::Configuration(format!(
                "Invalid log_level '{}'. Must be one of: {}",
                self.log_level,
                valid_levels.join(", ")
            )));
        }

        if let BackendSettings::Arduino {
            pattern, baud_rate, ..
        } = &self.backend
        {
            if *baud_rate == 0 {
                return Err(TriggerError::Configuration(
                    "Invalid baud_rate 0".to_string(),
                ));
            }
            if pattern.trim().is_empty() {
                return Err(TriggerError::Configuration(
                    "Arduino port pattern must not be empty".to_string(),
                ));
            }
        }

        Ok(())
    }
}
