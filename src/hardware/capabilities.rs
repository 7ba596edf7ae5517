//! Trigger Output Capability
//!
//! Every trigger backend, whatever the physical link, does the same job: put one byte on
//! an output and leave it there. This module defines that single capability so the timed
//! reset logic in [`crate::trigger`] is written once against the trait and never per
//! device.
//!
//! # Contract
//!
//! - Construction is the backend's `open()`. A backend value that exists is connected.
//! - `write` asserts `value` on the device until the next `write`. `0` is the "off" level.
//! - `close` releases the device handle. It must be safe to call more than once.
//!
//! # Thread Safety
//!
//! Implementations are `Send` because the automaton hands the backend to a background
//! timer task for the auto-reset write. They do not need to be `Sync`: the trigger keeps
//! the backend behind a mutex.

use crate::error::Result;

/// Capability: Byte-wide trigger output
///
/// Implemented by the parallel-port card, the USB2LPT converter, the Arduino converter
/// and the in-memory mock.
pub trait TriggerOutput: Send {
    /// Assert `value` on the output.
    ///
    /// # Errors
    /// Driver-backed outputs never fail once opened. Serial outputs return
    /// [`crate::TriggerError::Transport`] when the byte cannot be sent and
    /// [`crate::TriggerError::NotConnected`] after `close`.
    fn write(&mut self, value: u8) -> Result<()>;

    /// Release the device handle.
    ///
    /// Driver-backed outputs are released on process exit, so the default does nothing.
    fn close(&mut self) {}

    /// Short human readable name used in log events.
    fn name(&self) -> &str;
}

impl<T: TriggerOutput + ?Sized> TriggerOutput for Box<T> {
    fn write(&mut self, value: u8) -> Result<()> {
        (**self).write(value)
    }

    fn close(&mut self) {
        (**self).close()
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}
