//! # DAQ Trigger Library
//!
//! Precisely timed digital trigger pulses for EEG and physiology amplifiers. A trigger puts
//! a byte on a hardware output to mark an experiment event, holds it for a minimum
//! interval, then returns the output to zero on its own. A new trigger sent while the
//! previous one is still held is refused, so two events never smear into one.
//!
//! ## Crate Structure
//!
//! - **`trigger`**: The `Trigger` façade and the idle/armed reset automaton behind it.
//! - **`hardware`**: The `TriggerOutput` capability and its backends: parallel port,
//!   USB2LPT converter, Arduino converter, and an in-memory mock.
//! - **`config`**: Figment-based settings (`TriggerSettings`) from TOML and environment.
//! - **`error`**: The `TriggerError` enum used across the crate.
//! - **`telemetry`**: Subscriber setup for the `tracing` events the library emits.
//!
//! ## Quick Start
//!
//! ```no_run
//! use daq_trigger::hardware::lpt::ParallelPort;
//! use daq_trigger::Trigger;
//! use std::path::Path;
//!
//! # fn main() -> daq_trigger::Result<()> {
//! let trigger = Trigger::new(ParallelPort::open(0x378, Path::new("lpt_libs"))?, 50, true)?;
//! if !trigger.signal(1) {
//!     // previous trigger still held
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod hardware;
pub mod telemetry;
pub mod trigger;

pub use error::{Result, TriggerError};
pub use hardware::mock::MockOutput;
pub use hardware::TriggerOutput;
pub use trigger::{AutomatonState, Trigger};
