//! USB to LPT converter trigger backend
//!
//! The USB2LPT adapter is driven through the `LptControl_USB2LPT` vendor library, which
//! mirrors the desktop one except that the device has no port address:
//!
//! - `int init(void)`
//! - `void setdata(int value)`

use crate::error::Result;
use crate::hardware::capabilities::TriggerOutput;
use crate::hardware::driver::{check_init, DriverFamily, DriverLibrary};
use std::ffi::c_int;
use std::path::Path;
use tracing::debug;

/// `void setdata(int value)`
type SetDataFn = extern "C" fn(c_int);

/// Low-level access to a USB2LPT driver.
pub trait Usb2LptDriver: Send {
    /// Open the driver. Negative return codes mean failure.
    fn init(&self) -> i32;

    /// Put `value` on the converter's data lines.
    fn set_data(&self, value: u8);

    /// Name used in logs and errors.
    fn label(&self) -> &str {
        "LptControl_USB2LPT"
    }
}

/// `LptControl_USB2LPT{32,64}` loaded from disk.
#[derive(Debug)]
pub struct Usb2LptLibrary {
    library: DriverLibrary,
    setdata: SetDataFn,
}

impl Usb2LptLibrary {
    /// Load the driver build matching the host pointer width from `driver_dir`.
    pub fn load(driver_dir: &Path) -> Result<Self> {
        let library = DriverLibrary::load(driver_dir, DriverFamily::Usb2Lpt)?;
        // SAFETY: LptControl_USB2LPT exports `void setdata(int)`.
        #[allow(unsafe_code)]
        let setdata: SetDataFn = unsafe { library.function(b"setdata\0")? };
        Ok(Self { library, setdata })
    }
}

impl Usb2LptDriver for Usb2LptLibrary {
    fn init(&self) -> i32 {
        self.library.init()
    }

    fn set_data(&self, value: u8) {
        (self.setdata)(c_int::from(value));
    }

    fn label(&self) -> &str {
        self.library.label()
    }
}

/// Trigger output on a USB2LPT converter.
pub struct UsbConverter<D: Usb2LptDriver = Usb2LptLibrary> {
    driver: D,
}

impl UsbConverter<Usb2LptLibrary> {
    /// Load the vendor driver from `driver_dir` and open the converter.
    pub fn open(driver_dir: &Path) -> Result<Self> {
        Self::with_driver(Usb2LptLibrary::load(driver_dir)?)
    }
}

impl<D: Usb2LptDriver> UsbConverter<D> {
    /// Open the converter through an already loaded driver.
    pub fn with_driver(driver: D) -> Result<Self> {
        check_init(driver.label(), driver.init())?;
        debug!(driver = driver.label(), "USB2LPT converter opened");
        Ok(Self { driver })
    }
}

impl<D: Usb2LptDriver> TriggerOutput for UsbConverter<D> {
    fn write(&mut self, value: u8) -> Result<()> {
        self.driver.set_data(value);
        Ok(())
    }

    fn name(&self) -> &str {
        self.driver.label()
    }
}
