//! Idle/armed state machine enforcing the minimum hold time of a trigger value.
//!
//! ```text
//!            arm(value): write value, start reset timer
//!   Idle ─────────────────────────────────────────────▶ Armed
//!    ▲                                                    │
//!    └────────────────────────────────────────────────────┘
//!        disarm() from the timer: write 0, fresh timer
//! ```
//!
//! The automaton is armed exactly while its reset timer is pending. It does no locking
//! of its own; [`crate::Trigger`] keeps it and the output behind one mutex so `arm` and
//! `disarm` never interleave.

use super::scheduler::{background_handle, DeferredReset};
use crate::error::Result;
use crate::hardware::capabilities::TriggerOutput;
use std::time::Duration;
use tokio::runtime::Handle;
use tracing::{error, trace, warn};

/// State of a [`ResetAutomaton`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutomatonState {
    /// Ready to accept a new value.
    Idle,
    /// A value is asserted and its reset to 0 is pending.
    Armed,
}

/// Timed reset logic shared by every backend.
#[derive(Debug)]
pub struct ResetAutomaton {
    delay: Duration,
    timer: DeferredReset,
    handle: Handle,
}

impl ResetAutomaton {
    /// New idle automaton scheduling its resets on `handle`.
    pub fn new(delay: Duration, handle: Handle) -> Self {
        Self {
            delay,
            timer: DeferredReset::new(delay),
            handle,
        }
    }

    /// `Armed` while the reset timer is pending.
    pub fn state(&self) -> AutomatonState {
        if self.timer.is_pending() {
            AutomatonState::Armed
        } else {
            AutomatonState::Idle
        }
    }

    /// Shorthand for `state() == AutomatonState::Armed`.
    pub fn is_armed(&self) -> bool {
        self.state() == AutomatonState::Armed
    }

    /// Hold time of the next cycle.
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Hold time in whole milliseconds.
    pub fn delay_ms(&self) -> u64 {
        u64::try_from(self.delay.as_millis()).unwrap_or(u64::MAX)
    }

    /// Write `value` and schedule `on_expiry` after the hold time.
    ///
    /// `on_expiry` must end up calling [`ResetAutomaton::disarm`] on this automaton.
    /// Precondition: the automaton is idle.
    ///
    /// If the previous reset was lost with its runtime, 0 is written first and the timer
    /// moves to the crate's background runtime.
    ///
    /// # Errors
    /// The output's write error. Nothing is scheduled in that case.
    pub fn arm<B, F>(&mut self, output: &mut B, value: u8, on_expiry: F) -> Result<()>
    where
        B: TriggerOutput + ?Sized,
        F: FnOnce() + Send + 'static,
    {
        debug_assert!(!self.is_armed(), "arm() called while armed");

        if self.timer.is_consumed() {
            // The previous reset task ended without running because its runtime shut
            // down. Close that cycle here and keep later timers off the dead runtime.
            warn!(
                "Previous trigger reset was lost; resetting now on the background timer runtime."
            );
            self.handle = background_handle()?;
            output.write(0)?;
            self.timer = DeferredReset::new(self.delay);
        }

        output.write(value)?;
        self.timer.start(&self.handle, on_expiry);
        trace!(value, delay_ms = self.delay_ms(), "Trigger armed");
        Ok(())
    }

    /// Write 0 and replace the consumed timer with a fresh one.
    ///
    /// Called only from the timer callback scheduled by `arm`.
    pub fn disarm<B>(&mut self, output: &mut B)
    where
        B: TriggerOutput + ?Sized,
    {
        if let Err(e) = output.write(0) {
            error!("Failed to reset trigger on {}: {}", output.name(), e);
        }
        self.timer = DeferredReset::new(self.delay);
        trace!("Trigger disarmed");
    }

    /// Change the hold time. Refused while armed.
    pub fn set_delay(&mut self, delay: Duration) -> bool {
        if self.is_armed() {
            return false;
        }
        self.delay = delay;
        self.timer = DeferredReset::new(delay);
        true
    }
}
