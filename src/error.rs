//! Custom error types for the trigger library.
//!
//! This module defines the primary error type, `TriggerError`. Using the `thiserror`
//! crate, it provides one place for every failure that can occur while opening a
//! trigger backend or talking to it.
//!
//! ## Error Hierarchy
//!
//! - **Connection errors** (`DriverNotFound`, `DriverLoad`, `DriverInit`, `NoDevice`,
//!   `Discovery`, `Connection`): the driver or device is unavailable. These are fatal and
//!   are raised while a backend is being constructed. Nothing retries them; that is left
//!   to the operator.
//! - **Transport errors** (`Transport`, `NotConnected`): a write to an already open serial
//!   link failed, or the link was closed.
//! - **`Tokio`**: the background runtime that runs deferred resets could not be started.
//! - **Configuration errors** (`Config`, `Configuration`): the settings file could not be
//!   parsed, or holds values that parse but make no sense.
//!
//! A trigger that is still holding a previous value ("busy") is *not* an error value:
//! `Trigger::signal` reports it with a `false` return so the real-time path never has
//! to unwind an error.

use std::path::PathBuf;
use thiserror::Error;

/// Convenience alias for results using the library error type.
pub type Result<T> = std::result::Result<T, TriggerError>;

/// Errors raised while opening or driving a trigger backend.
#[derive(Error, Debug)]
pub enum TriggerError {
    /// Settings could not be loaded or parsed.
    #[error("Configuration error: {0}")]
    Config(#[from] Box<figment::Error>),

    /// Settings parsed but hold an invalid value.
    #[error("Configuration validation error: {0}")]
    Configuration(String),

    /// The driver artifact for this host is missing.
    #[error("Cannot find the required driver library '{}'", .0.display())]
    DriverNotFound(PathBuf),

    /// The driver artifact exists but could not be loaded, or lacks a symbol.
    #[error("Failed to load driver library '{}': {source}", .path.display())]
    DriverLoad {
        /// Artifact that failed
        path: PathBuf,
        /// Loader error
        #[source]
        source: abi_stable::library::LibraryError,
    },

    /// The driver's `init` returned a failure code.
    #[error("Connecting to {driver} failed (init returned {code}). Check the driver status.")]
    DriverInit {
        /// Driver label, e.g. `LptControl_Desktop64`
        driver: String,
        /// Value returned by `init`
        code: i32,
    },

    /// No serial port descriptor matched the pattern.
    #[error("No serial device matching '{pattern}' found")]
    NoDevice {
        /// Descriptor pattern that matched nothing
        pattern: String,
    },

    /// Listing the host's serial ports failed.
    #[error("Serial port enumeration failed: {0}")]
    Discovery(#[source] serialport::Error),

    /// A serial port could not be opened.
    #[error("Disconnect and reconnect the Arduino converter on '{port}': {source}")]
    Connection {
        /// Port that failed to open
        port: String,
        /// Serial error
        #[source]
        source: serialport::Error,
    },

    /// Writing to an open serial link failed.
    #[error("Write to '{port}' failed: {source}")]
    Transport {
        /// Port that was written to
        port: String,
        /// I/O error
        #[source]
        source: std::io::Error,
    },

    /// Write after `close`.
    #[error("Serial port not connected")]
    NotConnected,

    /// The background timer runtime could not be started.
    #[error("Tokio runtime error: {0}")]
    Tokio(std::io::Error),
}

impl TriggerError {
    /// True for the errors that mean the device or its driver could not be reached.
    ///
    /// These are the setup-time failures that abort backend construction.
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            TriggerError::DriverNotFound(_)
                | TriggerError::DriverLoad { .. }
                | TriggerError::DriverInit { .. }
                | TriggerError::NoDevice { .. }
                | TriggerError::Discovery(_)
                | TriggerError::Connection { .. }
        )
    }
}

impl From<figment::Error> for TriggerError {
    fn from(err: figment::Error) -> Self {
        TriggerError::Config(Box::new(err))
    }
}
