//! Serial port discovery by descriptor pattern.
//!
//! The Arduino converter enumerates as an ordinary USB serial device whose path
//! (`/dev/ttyACM0`, `COM4`, ...) changes between machines and reboots. Instead of asking
//! the operator for a path we look at every port's descriptor and take the first one
//! that mentions the vendor.
//!
//! A descriptor is the port name followed by whatever USB metadata the OS reports:
//!
//! ```text
//! /dev/ttyACM0 Arduino (www.arduino.cc) Arduino Uno USB VID:PID=2341:0043 SER=85736323838351F0E1E1
//! ```
//!
//! Matching is a case-insensitive regex search over that string.

use crate::error::{Result, TriggerError};
use once_cell::sync::Lazy;
use regex::{Regex, RegexBuilder};
use serialport::{SerialPortInfo, SerialPortType};
use tracing::{error, info};

/// Pattern identifying Arduino based converters.
pub const ARDUINO_PATTERN: &str = "Arduino";

#[allow(clippy::expect_used)]
static ARDUINO_REGEX: Lazy<Regex> = Lazy::new(|| {
    RegexBuilder::new(ARDUINO_PATTERN)
        .case_insensitive(true)
        .build()
        .expect("Invalid Arduino port regex")
});

/// Human readable descriptor of a serial port, used for matching and logging.
pub fn descriptor(info: &SerialPortInfo) -> String {
    let mut parts = vec![info.port_name.clone()];
    match &info.port_type {
        SerialPortType::UsbPort(usb) => {
            parts.extend(usb.manufacturer.iter().cloned());
            parts.extend(usb.product.iter().cloned());
            let mut hwid = format!("USB VID:PID={:04X}:{:04X}", usb.vid, usb.pid);
            if let Some(serial) = &usb.serial_number {
                hwid.push_str(&format!(" SER={serial}"));
            }
            parts.push(hwid);
        }
        SerialPortType::PciPort => parts.push("PCI".to_string()),
        SerialPortType::BluetoothPort => parts.push("Bluetooth".to_string()),
        SerialPortType::Unknown => {}
    }
    parts.join(" ")
}

/// Case-insensitive descriptor matcher.
#[derive(Debug, Clone)]
pub struct PortMatcher {
    pattern: String,
    regex: Regex,
}

impl PortMatcher {
    /// Compile `pattern` as a case-insensitive regex.
    ///
    /// # Errors
    /// [`TriggerError::Configuration`] when the pattern is not a valid regex.
    pub fn new(pattern: &str) -> Result<Self> {
        let regex = RegexBuilder::new(pattern)
            .case_insensitive(true)
            .build()
            .map_err(|e| {
                TriggerError::Configuration(format!("Invalid port pattern '{pattern}': {e}"))
            })?;
        Ok(Self {
            pattern: pattern.to_string(),
            regex,
        })
    }

    /// Matcher for Arduino converters.
    pub fn arduino() -> Self {
        Self {
            pattern: ARDUINO_PATTERN.to_string(),
            regex: ARDUINO_REGEX.clone(),
        }
    }

    /// Pattern as given, before compilation.
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// True when the descriptor of `info` contains a match.
    pub fn matches(&self, info: &SerialPortInfo) -> bool {
        self.regex.is_match(&descriptor(info))
    }

    /// First port whose descriptor matches, in enumeration order.
    pub fn first_match<'a>(&self, ports: &'a [SerialPortInfo]) -> Option<&'a SerialPortInfo> {
        ports.iter().find(|info| self.matches(info))
    }

    /// Pick the port to connect to from an enumeration result.
    ///
    /// # Errors
    /// [`TriggerError::NoDevice`] when nothing matches. There is no fallback port.
    pub fn select(&self, ports: &[SerialPortInfo]) -> Result<String> {
        match self.first_match(ports) {
            Some(info) => {
                info!("Found {}", descriptor(info));
                Ok(info.port_name.clone())
            }
            None => {
                error!("No device matching '{}' found.", self.pattern);
                Err(TriggerError::NoDevice {
                    pattern: self.pattern.clone(),
                })
            }
        }
    }
}

impl Default for PortMatcher {
    fn default() -> Self {
        Self::arduino()
    }
}
