//! Mock Trigger Output
//!
//! Simulated trigger device for testing without physical hardware, and for dry runs of
//! the command-line tool.
//!
//! `MockOutput` is a cheap handle: clones share the same recorded history, so a test can
//! hand one clone to a [`crate::Trigger`] and inspect the other.
//!
//! # Example
//!
//! ```rust,ignore
//! let output = MockOutput::new();
//! let trigger = Trigger::new(output.clone(), 50, false)?;
//! trigger.signal(4);
//! assert_eq!(output.level(), 4);
//! ```

use crate::error::{Result, TriggerError};
use crate::hardware::capabilities::TriggerOutput;
use std::io;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;
use tracing::debug;

/// One value asserted on the mock device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteRecord {
    /// Value written
    pub value: u8,
    /// When the write happened
    pub at: Instant,
}

#[derive(Debug, Default)]
struct MockState {
    writes: Mutex<Vec<WriteRecord>>,
    closes: AtomicUsize,
    failing: AtomicBool,
}

/// In-memory trigger output recording every write with its timestamp.
#[derive(Debug, Clone, Default)]
pub struct MockOutput {
    state: Arc<MockState>,
}

impl MockOutput {
    /// Empty history, writes succeed.
    pub fn new() -> Self {
        Self::default()
    }

    fn writes_guard(&self) -> MutexGuard<'_, Vec<WriteRecord>> {
        self.state
            .writes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Every write so far, oldest first.
    pub fn writes(&self) -> Vec<WriteRecord> {
        self.writes_guard().clone()
    }

    /// Values written so far, oldest first.
    pub fn values(&self) -> Vec<u8> {
        self.writes_guard().iter().map(|w| w.value).collect()
    }

    /// Level currently asserted on the simulated lines.
    pub fn level(&self) -> u8 {
        self.writes_guard().last().map_or(0, |w| w.value)
    }

    /// Number of `close` calls received.
    pub fn close_count(&self) -> usize {
        self.state.closes.load(Ordering::SeqCst)
    }

    /// Make subsequent writes fail with a transport error, as an unplugged cable would.
    pub fn set_failing(&self, failing: bool) {
        self.state.failing.store(failing, Ordering::SeqCst);
    }
}

impl TriggerOutput for MockOutput {
    fn write(&mut self, value: u8) -> Result<()> {
        if self.state.failing.load(Ordering::SeqCst) {
            return Err(TriggerError::Transport {
                port: "mock".to_string(),
                source: io::Error::new(io::ErrorKind::BrokenPipe, "mock output unplugged"),
            });
        }
        debug!(value, "MockOutput: write");
        self.writes_guard().push(WriteRecord {
            value,
            at: Instant::now(),
        });
        Ok(())
    }

    fn close(&mut self) {
        self.state.closes.fetch_add(1, Ordering::SeqCst);
    }

    fn name(&self) -> &str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_history() {
        let output = MockOutput::new();
        let mut handle = output.clone();

        assert_eq!(output.level(), 0);
        handle.write(9).unwrap();
        handle.write(0).unwrap();

        assert_eq!(output.values(), vec![9, 0]);
        assert_eq!(output.level(), 0);
        assert!(output.writes()[0].at <= output.writes()[1].at);
    }

    #[test]
    fn failing_writes_are_not_recorded() {
        let mut output = MockOutput::new();
        output.set_failing(true);
        assert!(output.write(1).is_err());
        assert!(output.values().is_empty());
    }
}
