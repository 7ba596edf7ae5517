//! Parallel port (LPT) trigger backend
//!
//! Drives the LPT port on the motherboard or on a PCI(e) card through the
//! `LptControl_Desktop` vendor library. The library exposes:
//!
//! - `int init(void)`: opens the port driver, `-1` on failure
//! - `void setdata(int port_address, int value)`: puts `value` on the data lines
//!
//! # Example Usage
//!
//! ```no_run
//! use daq_trigger::hardware::lpt::ParallelPort;
//! use daq_trigger::Trigger;
//! use std::path::Path;
//!
//! # fn main() -> daq_trigger::Result<()> {
//! let port = ParallelPort::open(0x378, Path::new("lpt_libs"))?;
//! let trigger = Trigger::new(port, 50, true)?;
//! trigger.signal(1);
//! # Ok(())
//! # }
//! ```

use crate::error::Result;
use crate::hardware::capabilities::TriggerOutput;
use crate::hardware::driver::{check_init, DriverFamily, DriverLibrary};
use std::ffi::c_int;
use std::path::Path;
use tracing::{debug, warn};

/// Port addresses of the first and second on-board parallel port.
pub const STANDARD_PORT_ADDRESSES: [u16; 2] = [0x278, 0x378];

/// `void setdata(int port_address, int value)`
type SetDataFn = extern "C" fn(c_int, c_int);

/// Low-level access to a parallel-port driver.
///
/// Implemented by [`DesktopLptDriver`] for the vendor library and by test doubles.
pub trait LptDriver: Send {
    /// Open the driver. Negative return codes mean failure.
    fn init(&self) -> i32;

    /// Put `value` on the data lines of the port at `port_address`.
    fn set_data(&self, port_address: u16, value: u8);

    /// Name used in logs and errors.
    fn label(&self) -> &str {
        "LptControl_Desktop"
    }
}

/// `LptControl_Desktop{32,64}` loaded from disk.
#[derive(Debug)]
pub struct DesktopLptDriver {
    library: DriverLibrary,
    setdata: SetDataFn,
}

impl DesktopLptDriver {
    /// Load the driver build matching the host pointer width from `driver_dir`.
    pub fn load(driver_dir: &Path) -> Result<Self> {
        let library = DriverLibrary::load(driver_dir, DriverFamily::Desktop)?;
        // SAFETY: LptControl_Desktop exports `void setdata(int, int)`.
        #[allow(unsafe_code)]
        let setdata: SetDataFn = unsafe { library.function(b"setdata\0")? };
        Ok(Self { library, setdata })
    }
}

impl LptDriver for DesktopLptDriver {
    fn init(&self) -> i32 {
        self.library.init()
    }

    fn set_data(&self, port_address: u16, value: u8) {
        (self.setdata)(c_int::from(port_address), c_int::from(value));
    }

    fn label(&self) -> &str {
        self.library.label()
    }
}

/// Warn about port addresses other than the two standard ones. The address is kept.
pub fn check_port_address(port_address: u16) -> u16 {
    if !STANDARD_PORT_ADDRESSES.contains(&port_address) {
        warn!(
            port_address = %format!("{port_address:#x}"),
            "LPT port address {:#x} is unusual.",
            port_address
        );
    }
    port_address
}

/// Trigger output on a parallel port.
pub struct ParallelPort<D: LptDriver = DesktopLptDriver> {
    driver: D,
    port_address: u16,
}

impl ParallelPort<DesktopLptDriver> {
    /// Load the vendor driver from `driver_dir` and open the port at `port_address`.
    ///
    /// # Errors
    /// Missing or unloadable driver library, or a failing `init`.
    pub fn open(port_address: u16, driver_dir: &Path) -> Result<Self> {
        let driver = DesktopLptDriver::load(driver_dir)?;
        Self::with_driver(driver, port_address)
    }
}

impl<D: LptDriver> ParallelPort<D> {
    /// Open the port through an already loaded driver.
    pub fn with_driver(driver: D, port_address: u16) -> Result<Self> {
        let port_address = check_port_address(port_address);
        debug!("LPT port address: {:#x}", port_address);

        check_init(driver.label(), driver.init())?;

        Ok(Self {
            driver,
            port_address,
        })
    }

    /// Address `write` goes to.
    pub fn port_address(&self) -> u16 {
        self.port_address
    }

    /// Point subsequent writes at another port. Unusual addresses are logged and kept.
    pub fn set_port_address(&mut self, port_address: u16) {
        self.port_address = check_port_address(port_address);
        debug!("LPT port address: {:#x}", self.port_address);
    }

    /// The underlying driver.
    pub fn driver(&self) -> &D {
        &self.driver
    }
}

impl<D: LptDriver> TriggerOutput for ParallelPort<D> {
    fn write(&mut self, value: u8) -> Result<()> {
        self.driver.set_data(self.port_address, value);
        Ok(())
    }

    fn name(&self) -> &str {
        self.driver.label()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::error::TriggerError;
    use std::sync::{Arc, Mutex};
    use tracing_test::traced_test;

    /// Records `(port_address, value)` pairs.
    #[derive(Clone, Default)]
    pub(crate) struct RecordingDriver {
        pub(crate) init_code: i32,
        pub(crate) calls: Arc<Mutex<Vec<(u16, u8)>>>,
    }

    impl LptDriver for RecordingDriver {
        fn init(&self) -> i32 {
            self.init_code
        }

        fn set_data(&self, port_address: u16, value: u8) {
            self.calls.lock().unwrap().push((port_address, value));
        }
    }

    #[test]
    fn writes_go_to_the_configured_address() {
        let driver = RecordingDriver::default();
        let calls = Arc::clone(&driver.calls);
        let mut port = ParallelPort::with_driver(driver, 0x378).unwrap();

        port.write(7).unwrap();
        port.set_port_address(0x278);
        port.write(0).unwrap();

        assert_eq!(*calls.lock().unwrap(), vec![(0x378, 7), (0x278, 0)]);
    }

    #[test]
    fn failing_init_aborts_construction() {
        let driver = RecordingDriver {
            init_code: -1,
            ..Default::default()
        };
        let err = ParallelPort::with_driver(driver, 0x378).err().unwrap();
        assert!(matches!(err, TriggerError::DriverInit { code: -1, .. }));
    }

    #[test]
    #[traced_test]
    fn unusual_address_is_accepted_with_warning() {
        let port = ParallelPort::with_driver(RecordingDriver::default(), 0x100).unwrap();
        assert_eq!(port.port_address(), 0x100);
        assert!(logs_contain("is unusual"));
    }

    #[test]
    #[traced_test]
    fn standard_addresses_do_not_warn() {
        check_port_address(0x378);
        check_port_address(0x278);
        assert!(!logs_contain("is unusual"));
    }

    #[test]
    fn missing_driver_library_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let err = ParallelPort::open(0x378, dir.path()).err().unwrap();
        assert!(err.is_connection_error());
    }
}
