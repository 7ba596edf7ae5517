//! Native LPT driver libraries.
//!
//! The parallel-port card and the USB2LPT converter are both driven through a small
//! vendor library exposing an `init` entry point and a `setdata` entry point. The library
//! is shipped in two builds, one per host pointer width, and lives in a fixed directory:
//!
//! ```text
//! lpt_libs/
//!   LptControl_Desktop32.dll   LptControl_Desktop64.dll
//!   LptControl_USB2LPT32.dll   LptControl_USB2LPT64.dll
//! ```
//!
//! Artifact selection is a lookup `(family, bitness) -> file name` done once in
//! [`locate`], so the backends never branch on pointer width themselves.

use crate::error::{Result, TriggerError};
use abi_stable::library::RawLibrary;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info};

/// Directory searched for driver artifacts when the configuration names none.
pub const DEFAULT_DRIVER_DIR: &str = "lpt_libs";

/// `int init(void)`
pub(crate) type InitFn = extern "C" fn() -> std::ffi::c_int;

/// Vendor library family, one per converter type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverFamily {
    /// Parallel port on the motherboard or a PCI(e) card.
    Desktop,
    /// USB to LPT converter.
    Usb2Lpt,
}

impl DriverFamily {
    fn stem(self) -> &'static str {
        match self {
            DriverFamily::Desktop => "LptControl_Desktop",
            DriverFamily::Usb2Lpt => "LptControl_USB2LPT",
        }
    }
}

/// Host pointer width, which selects the driver build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bitness {
    /// 32-bit host, `*32` artifacts.
    Bits32,
    /// 64-bit host, `*64` artifacts.
    Bits64,
}

impl Bitness {
    /// Bitness of the running process.
    pub fn host() -> Self {
        Self::from_pointer_width(std::mem::size_of::<usize>())
    }

    /// Map a pointer width in bytes to a driver build. Only 4 selects the 32-bit build.
    pub fn from_pointer_width(bytes: usize) -> Self {
        if bytes == 4 {
            Bitness::Bits32
        } else {
            Bitness::Bits64
        }
    }

    fn suffix(self) -> &'static str {
        match self {
            Bitness::Bits32 => "32",
            Bitness::Bits64 => "64",
        }
    }
}

/// File name of the driver artifact, e.g. `LptControl_Desktop64.dll`.
pub fn artifact_name(family: DriverFamily, bitness: Bitness) -> String {
    format!(
        "{}{}.{}",
        family.stem(),
        bitness.suffix(),
        std::env::consts::DLL_EXTENSION
    )
}

/// Find the artifact for `family` and the host bitness inside `dir`.
///
/// # Errors
/// [`TriggerError::DriverNotFound`] when the file does not exist.
pub fn locate(dir: &Path, family: DriverFamily) -> Result<PathBuf> {
    let name = artifact_name(family, Bitness::host());
    let path = dir.join(&name);
    if !path.exists() {
        error!("Cannot find the required library '{}'.", name);
        return Err(TriggerError::DriverNotFound(path));
    }
    Ok(path)
}

/// A loaded driver library together with its `init` entry point.
///
/// Calling `init` is left to the backend, which checks the code with [`check_init`].
///
/// The library stays loaded for as long as this value lives, which keeps every function
/// pointer copied out of it valid.
pub(crate) struct DriverLibrary {
    library: RawLibrary,
    init: InitFn,
    path: PathBuf,
    label: String,
}

impl DriverLibrary {
    /// Locate and load the driver for `family` from `dir`.
    pub(crate) fn load(dir: &Path, family: DriverFamily) -> Result<Self> {
        let path = locate(dir, family)?;
        info!("Loading '{}'.", path.display());

        let library = RawLibrary::load_at(&path).map_err(|source| {
            error!("Failed to load '{}': {}", path.display(), source);
            TriggerError::DriverLoad {
                path: path.clone(),
                source,
            }
        })?;

        let label = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| family.stem().to_string());

        // SAFETY: every LptControl build exports `int init(void)`.
        #[allow(unsafe_code)]
        let init: InitFn = unsafe { symbol(&library, &path, b"init\0")? };

        Ok(Self {
            library,
            init,
            path,
            label,
        })
    }

    /// Copy a function pointer out of the library.
    ///
    /// # Safety
    /// `F` must be the exact `extern "C"` signature the library exports under `name`,
    /// and `name` must be NUL terminated.
    #[allow(unsafe_code)]
    pub(crate) unsafe fn function<F: Copy>(&self, name: &[u8]) -> Result<F> {
        symbol(&self.library, &self.path, name)
    }

    /// Call the library's `init` entry point. The vendor libraries return `-1` on failure.
    pub(crate) fn init(&self) -> i32 {
        (self.init)()
    }

    pub(crate) fn label(&self) -> &str {
        &self.label
    }
}

#[allow(unsafe_code)]
unsafe fn symbol<F: Copy>(library: &RawLibrary, path: &Path, name: &[u8]) -> Result<F> {
    let sym = library
        .get::<F>(name)
        .map_err(|source| TriggerError::DriverLoad {
            path: path.to_path_buf(),
            source,
        })?;
    Ok(*sym)
}

impl fmt::Debug for DriverLibrary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DriverLibrary")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

/// Map an `init` return code to a result. Negative codes mean the driver failed.
pub(crate) fn check_init(driver: &str, code: i32) -> Result<()> {
    if code < 0 {
        error!("Connecting to LPT port failed. Check the driver status.");
        return Err(TriggerError::DriverInit {
            driver: driver.to_string(),
            code,
        });
    }
    debug!(driver, code, "LPT driver initialized");
    Ok(())
}
