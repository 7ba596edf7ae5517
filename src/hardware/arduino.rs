//! Arduino to LPT converter trigger backend
//!
//! The converter is an Arduino running firmware that copies every byte received on its
//! USB serial link onto eight output pins wired to a DB-25 connector. Protocol:
//!
//! - Baud: 115200, 8N1, no flow control
//! - Frame: one raw byte per value, no terminator, no response
//! - The board resets when the port is opened; its firmware needs about one second before
//!   it accepts bytes
//!
//! # Example Usage
//!
//! ```no_run
//! use daq_trigger::hardware::arduino::{ArduinoConfig, ArduinoConverter};
//! use daq_trigger::Trigger;
//!
//! # fn main() -> daq_trigger::Result<()> {
//! let converter = ArduinoConverter::open(&ArduinoConfig::default())?;
//! let trigger = Trigger::new(converter, 50, true)?;
//! trigger.signal(3);
//! # Ok(())
//! # }
//! ```

use crate::error::{Result, TriggerError};
use crate::hardware::capabilities::TriggerOutput;
use crate::hardware::port_discovery::PortMatcher;
use serialport::SerialPortInfo;
use std::io::Write;
use std::time::Duration;
use tracing::{debug, error, info};

/// Baud rate of the converter firmware.
pub const BAUD_RATE: u32 = 115_200;

/// Time the firmware needs after the port is opened.
pub const SETTLE_TIME: Duration = Duration::from_secs(1);

/// Write half of an open serial connection.
pub type SerialLink = Box<dyn Write + Send>;

/// Enumerates and opens serial ports.
///
/// [`SystemSerial`] goes through the `serialport` crate; tests substitute an in-memory
/// implementation.
pub trait SerialConnector: Send {
    /// Serial ports present on the host, in enumeration order.
    fn available_ports(&self) -> serialport::Result<Vec<SerialPortInfo>>;

    /// Open `port_name` at `baud_rate`, 8N1.
    fn connect(&self, port_name: &str, baud_rate: u32) -> serialport::Result<SerialLink>;
}

/// The host's serial ports.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemSerial;

impl SerialConnector for SystemSerial {
    fn available_ports(&self) -> serialport::Result<Vec<SerialPortInfo>> {
        serialport::available_ports()
    }

    fn connect(&self, port_name: &str, baud_rate: u32) -> serialport::Result<SerialLink> {
        let port = serialport::new(port_name, baud_rate)
            .timeout(Duration::from_millis(500))
            .open()?;
        Ok(Box::new(port))
    }
}

/// Connection settings for [`ArduinoConverter`].
#[derive(Debug, Clone)]
pub struct ArduinoConfig {
    /// Serial device to use. Discovered with `matcher` when `None`.
    pub port: Option<String>,
    /// Descriptor pattern used for discovery
    pub matcher: PortMatcher,
    /// Link speed, 115200 for the stock firmware
    pub baud_rate: u32,
    /// Wait after opening, before the first byte
    pub settle: Duration,
}

impl Default for ArduinoConfig {
    fn default() -> Self {
        Self {
            port: None,
            matcher: PortMatcher::arduino(),
            baud_rate: BAUD_RATE,
            settle: SETTLE_TIME,
        }
    }
}

/// Trigger output on an Arduino to LPT converter.
pub struct ArduinoConverter<C: SerialConnector = SystemSerial> {
    connector: C,
    com_port: String,
    link: Option<SerialLink>,
    baud_rate: u32,
    settle: Duration,
}

impl ArduinoConverter<SystemSerial> {
    /// Find the converter on the host's serial ports and connect to it.
    ///
    /// # Errors
    /// [`TriggerError::NoDevice`] when no port matches, [`TriggerError::Connection`] when
    /// the port cannot be opened.
    pub fn open(config: &ArduinoConfig) -> Result<Self> {
        Self::open_with(SystemSerial, config)
    }
}

impl<C: SerialConnector> ArduinoConverter<C> {
    /// Connect through `connector`.
    pub fn open_with(connector: C, config: &ArduinoConfig) -> Result<Self> {
        let com_port = match &config.port {
            Some(port) => port.clone(),
            None => find_port(&connector, &config.matcher)?,
        };
        debug!(port = %com_port, baud_rate = config.baud_rate, "Opening Arduino converter");

        let link = connect(&connector, &com_port, config.baud_rate, config.settle)?;

        Ok(Self {
            connector,
            com_port,
            link: Some(link),
            baud_rate: config.baud_rate,
            settle: config.settle,
        })
    }

    /// Serial device in use.
    pub fn com_port(&self) -> &str {
        &self.com_port
    }

    /// False after `close`.
    pub fn is_connected(&self) -> bool {
        self.link.is_some()
    }

    /// Reconnect to `com_port`, replacing the current link.
    ///
    /// The new device is opened before the current link is released, so a failed
    /// reconnect leaves the converter on its old port. Reopening the port already in use
    /// releases it first, since the OS grants serial devices exclusively.
    ///
    /// # Errors
    /// [`TriggerError::Connection`] carrying the serial error. Power-cycling the adapter
    /// is usually what fixes it.
    pub fn set_com_port(&mut self, com_port: &str) -> Result<()> {
        if com_port == self.com_port {
            self.close();
        }
        let link = connect(&self.connector, com_port, self.baud_rate, self.settle)?;
        self.close();
        self.link = Some(link);
        self.com_port = com_port.to_string();
        Ok(())
    }
}

/// Enumerate ports through `connector` and pick the first match.
pub fn find_port<C: SerialConnector + ?Sized>(connector: &C, matcher: &PortMatcher) -> Result<String> {
    let ports = connector.available_ports().map_err(|e| {
        error!("Serial port enumeration failed: {}", e);
        TriggerError::Discovery(e)
    })?;
    matcher.select(&ports)
}

fn connect<C: SerialConnector + ?Sized>(
    connector: &C,
    com_port: &str,
    baud_rate: u32,
    settle: Duration,
) -> Result<SerialLink> {
    let link = connector.connect(com_port, baud_rate).map_err(|source| {
        error!(
            "Disconnect and reconnect the Arduino converter because {}",
            source
        );
        TriggerError::Connection {
            port: com_port.to_string(),
            source,
        }
    })?;

    std::thread::sleep(settle);
    info!("Connected to {}.", com_port);
    Ok(link)
}

impl<C: SerialConnector> TriggerOutput for ArduinoConverter<C> {
    fn write(&mut self, value: u8) -> Result<()> {
        let link = self.link.as_mut().ok_or(TriggerError::NotConnected)?;
        link.write_all(&[value])
            .and_then(|()| link.flush())
            .map_err(|source| TriggerError::Transport {
                port: self.com_port.clone(),
                source,
            })
    }

    /// Release the serial port. Safe to call repeatedly; errors are swallowed.
    fn close(&mut self) {
        if let Some(mut link) = self.link.take() {
            let _ = link.flush();
            debug!(port = %self.com_port, "Serial port released");
        }
    }

    fn name(&self) -> &str {
        "Arduino2LPT"
    }
}

impl<C: SerialConnector> Drop for ArduinoConverter<C> {
    fn drop(&mut self) {
        self.close();
    }
}
