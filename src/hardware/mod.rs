//! Trigger hardware backends
//!
//! One capability trait, [`TriggerOutput`], and its implementations:
//!
//! - [`lpt::ParallelPort`]: on-board or PCI(e) parallel port via `LptControl_Desktop`
//! - [`usb2lpt::UsbConverter`]: USB2LPT adapter via `LptControl_USB2LPT`
//! - [`arduino::ArduinoConverter`]: Arduino firmware on a USB serial port
//! - [`mock::MockOutput`]: in-memory output for tests and dry runs

pub mod arduino;
pub mod capabilities;
pub mod driver;
pub mod lpt;
pub mod mock;
pub mod port_discovery;
pub mod usb2lpt;

pub use capabilities::TriggerOutput;

use crate::config::BackendSettings;
use crate::error::Result;
use arduino::{ArduinoConfig, ArduinoConverter};
use lpt::ParallelPort;
use mock::MockOutput;
use port_discovery::PortMatcher;
use std::time::Duration;
use usb2lpt::UsbConverter;

/// Open the backend described by `settings`.
///
/// # Errors
/// Whatever the backend's `open` returns; all of them are fatal setup errors.
pub fn open_output(settings: &BackendSettings) -> Result<Box<dyn TriggerOutput>> {
    let output: Box<dyn TriggerOutput> = match settings {
        BackendSettings::Lpt {
            port_address,
            driver_dir,
        } => Box::new(ParallelPort::open(*port_address, driver_dir)?),
        BackendSettings::Usb2lpt { driver_dir } => Box::new(UsbConverter::open(driver_dir)?),
        BackendSettings::Arduino {
            port,
            pattern,
            baud_rate,
            settle_ms,
        } => {
            let config = ArduinoConfig {
                port: port.clone(),
                matcher: PortMatcher::new(pattern)?,
                baud_rate: *baud_rate,
                settle: Duration::from_millis(*settle_ms),
            };
            Box::new(ArduinoConverter::open(&config)?)
        }
        BackendSettings::Mock => Box::new(MockOutput::new()),
    };
    Ok(output)
}
