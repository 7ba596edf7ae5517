//! Trigger façade
//!
//! [`Trigger`] is the single entry point experiment code talks to. It owns a backend and a
//! [`ResetAutomaton`] and exposes:
//!
//! - `signal(value)`: assert a value, auto-reset to 0 after the hold time
//! - `delay_ms` / `set_delay`: the hold time
//! - `verbose` / `set_verbose`: info-level logging of every sent value
//! - backend specific properties (`port_address`, `com_port`)
//!
//! # Concurrency
//!
//! Two actors touch a trigger: the caller's thread and the timer task that performs the
//! reset. Both go through the same mutex, which guards the output, the automaton and the
//! verbosity flag together. The state check, the write and the arming in `signal` form
//! one critical section, as do the reset write and the disarming in the callback.
//!
//! # Example
//!
//! ```no_run
//! use daq_trigger::{MockOutput, Trigger};
//!
//! # async fn demo() -> daq_trigger::Result<()> {
//! let trigger = Trigger::new(MockOutput::new(), 50, true)?;
//! assert!(trigger.signal(1));
//! assert!(!trigger.signal(2)); // still holding 1
//! tokio::time::sleep(std::time::Duration::from_millis(60)).await;
//! assert!(trigger.signal(2));
//! # Ok(())
//! # }
//! ```

pub mod automaton;
pub mod scheduler;

pub use automaton::{AutomatonState, ResetAutomaton};
pub use scheduler::{background_handle, timer_handle, DeferredReset};

use crate::config::TriggerSettings;
use crate::error::Result;
use crate::hardware::arduino::{ArduinoConverter, SerialConnector};
use crate::hardware::capabilities::TriggerOutput;
use crate::hardware::lpt::{LptDriver, ParallelPort};
use crate::hardware::open_output;
use chrono::Local;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::runtime::Handle;
use tracing::{debug, error, info, warn};

/// Default hold time in milliseconds.
pub const DEFAULT_DELAY_MS: u64 = 50;

struct Shared<B> {
    output: B,
    automaton: ResetAutomaton,
    verbose: bool,
}

fn lock<B>(shared: &Mutex<Shared<B>>) -> MutexGuard<'_, Shared<B>> {
    shared.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Timed trigger on a hardware output.
pub struct Trigger<B> {
    shared: Arc<Mutex<Shared<B>>>,
}

impl<B: TriggerOutput + 'static> Trigger<B> {
    /// Wrap an opened backend.
    ///
    /// Resets are scheduled on the ambient tokio runtime, or on the crate's background
    /// timer runtime when called outside one.
    pub fn new(output: B, delay_ms: u64, verbose: bool) -> Result<Self> {
        Ok(Self::with_handle(output, delay_ms, verbose, timer_handle()?))
    }

    /// Wrap an opened backend, scheduling resets on `handle`.
    pub fn with_handle(output: B, delay_ms: u64, verbose: bool, handle: Handle) -> Self {
        debug!(
            backend = output.name(),
            delay_ms, verbose, "Trigger created"
        );
        let automaton = ResetAutomaton::new(Duration::from_millis(delay_ms), handle);
        Self {
            shared: Arc::new(Mutex::new(Shared {
                output,
                automaton,
                verbose,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Shared<B>> {
        lock(&self.shared)
    }

    /// Send a trigger value.
    ///
    /// Returns `false` without touching the hardware while the previous value is still
    /// held, and `false` if the backend write fails. Never blocks on the hold time.
    pub fn signal(&self, value: u8) -> bool {
        let mut guard = self.lock();
        let shared = &mut *guard;

        if shared.automaton.is_armed() {
            warn!(
                "You are sending a new signal before the end of the last signal. \
                 Signal ignored. Delay required = {} ms.",
                shared.automaton.delay_ms()
            );
            return false;
        }

        let reset = {
            let shared = Arc::clone(&self.shared);
            move || {
                let mut guard = lock(&shared);
                let shared = &mut *guard;
                shared.automaton.disarm(&mut shared.output);
            }
        };

        match shared.automaton.arm(&mut shared.output, value, reset) {
            Ok(()) => {
                if shared.verbose {
                    info!(
                        value,
                        "Trigger value {} sent at {}.",
                        value,
                        Local::now().format("%H:%M:%S%.3f")
                    );
                }
                true
            }
            Err(e) => {
                error!("Failed to send trigger value {}: {}", value, e);
                false
            }
        }
    }

    /// True while a sent value is waiting for its reset.
    pub fn is_armed(&self) -> bool {
        self.lock().automaton.is_armed()
    }

    /// Delay to wait between two `signal` calls, in milliseconds.
    pub fn delay_ms(&self) -> u64 {
        self.lock().automaton.delay_ms()
    }

    /// Change the hold time. Refused, with a warning, while a value is held.
    pub fn set_delay(&self, delay_ms: u64) -> bool {
        let mut guard = self.lock();
        if !guard.automaton.set_delay(Duration::from_millis(delay_ms)) {
            warn!(
                "You are changing the delay while an event has been sent less than {} ms ago. \
                 Skipping.",
                guard.automaton.delay_ms()
            );
            return false;
        }
        debug!(delay_ms, "Trigger delay updated");
        true
    }

    /// Whether sent values are logged at info level.
    pub fn verbose(&self) -> bool {
        self.lock().verbose
    }

    /// Turn info-level logging of sent values on or off.
    pub fn set_verbose(&self, verbose: bool) {
        self.lock().verbose = verbose;
    }

    /// Name of the backend, for logs.
    pub fn backend_name(&self) -> String {
        self.lock().output.name().to_string()
    }

    /// Release the backend's device handle.
    ///
    /// A value sent less than the hold time ago is left asserted.
    pub fn close(&self) {
        let mut guard = self.lock();
        if guard.automaton.is_armed() {
            warn!("Closing the trigger while a value is still asserted.");
        }
        guard.output.close();
    }

    /// Run `f` on the backend if no value is held, otherwise warn and skip.
    fn with_idle_output<R>(&self, property: &str, f: impl FnOnce(&mut B) -> R) -> Option<R> {
        let mut guard = self.lock();
        if guard.automaton.is_armed() {
            warn!(
                "You are changing the {} while an event has been sent less than {} ms ago. \
                 Skipping.",
                property,
                guard.automaton.delay_ms()
            );
            return None;
        }
        Some(f(&mut guard.output))
    }
}

impl Trigger<Box<dyn TriggerOutput>> {
    /// Open the backend named in `settings` and wrap it.
    pub fn from_settings(settings: &TriggerSettings) -> Result<Self> {
        let output = open_output(&settings.backend)?;
        Self::new(output, settings.delay_ms, settings.verbose)
    }
}

impl<D: LptDriver + 'static> Trigger<ParallelPort<D>> {
    /// Address `write` goes to.
    pub fn port_address(&self) -> u16 {
        self.lock().output.port_address()
    }

    /// Change the port address. Refused, with a warning, while a value is held.
    pub fn set_port_address(&self, port_address: u16) -> bool {
        self.with_idle_output("port", |port| port.set_port_address(port_address))
            .is_some()
    }
}

impl<C: SerialConnector + 'static> Trigger<ArduinoConverter<C>> {
    /// Serial device currently in use.
    pub fn com_port(&self) -> String {
        self.lock().output.com_port().to_string()
    }

    /// Reconnect to another serial device.
    ///
    /// Returns `Ok(false)` when refused because a value is held.
    ///
    /// # Errors
    /// [`crate::TriggerError::Connection`] when the new device cannot be opened.
    pub fn set_com_port(&self, com_port: &str) -> Result<bool> {
        match self.with_idle_output("COM port", |arduino| arduino.set_com_port(com_port)) {
            Some(result) => result.map(|()| true),
            None => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hardware::arduino::tests::{fast_config, FakeSerial};
    use crate::hardware::lpt::tests::RecordingDriver;
    use crate::hardware::mock::MockOutput;
    use tracing_test::traced_test;

    async fn wait_reset() {
        tokio::time::sleep(Duration::from_millis(120)).await;
    }

    #[tokio::test]
    #[traced_test]
    async fn busy_signal_is_rejected_with_warning() {
        let output = MockOutput::new();
        let trigger = Trigger::new(output.clone(), 50, false).unwrap();

        assert!(trigger.signal(1));
        assert!(!trigger.signal(2));

        assert_eq!(output.values(), vec![1]);
        assert!(logs_contain("Signal ignored. Delay required = 50 ms."));
    }

    #[tokio::test]
    #[traced_test]
    async fn verbose_logs_sent_values() {
        let trigger = Trigger::new(MockOutput::new(), 10, true).unwrap();
        assert!(trigger.verbose());
        assert!(trigger.signal(42));
        assert!(logs_contain("Trigger value 42 sent at"));
    }

    #[tokio::test]
    #[traced_test]
    async fn quiet_trigger_does_not_log_values() {
        let trigger = Trigger::new(MockOutput::new(), 10, true).unwrap();
        trigger.set_verbose(false);
        assert!(trigger.signal(42));
        assert!(!logs_contain("Trigger value 42 sent at"));
    }

    #[tokio::test]
    #[traced_test]
    async fn delay_change_while_armed_is_ignored() {
        let trigger = Trigger::new(MockOutput::new(), 50, false).unwrap();
        assert!(trigger.signal(1));

        assert!(!trigger.set_delay(10));
        assert_eq!(trigger.delay_ms(), 50);
        assert!(logs_contain("You are changing the delay"));

        wait_reset().await;
        assert!(trigger.set_delay(10));
        assert_eq!(trigger.delay_ms(), 10);
    }

    #[tokio::test]
    async fn failed_write_returns_false_and_stays_idle() {
        let output = MockOutput::new();
        let trigger = Trigger::new(output.clone(), 20, false).unwrap();
        output.set_failing(true);

        assert!(!trigger.signal(3));
        assert!(!trigger.is_armed());

        output.set_failing(false);
        assert!(trigger.signal(3));
    }

    #[tokio::test]
    #[traced_test]
    async fn port_address_is_guarded() {
        let driver = RecordingDriver::default();
        let calls = Arc::clone(&driver.calls);
        let port = ParallelPort::with_driver(driver, 0x378).unwrap();
        let trigger = Trigger::new(port, 50, false).unwrap();

        assert!(trigger.signal(1));
        assert!(!trigger.set_port_address(0x278));
        assert_eq!(trigger.port_address(), 0x378);
        assert!(logs_contain("You are changing the port"));

        wait_reset().await;
        assert!(trigger.set_port_address(0x278));
        assert!(trigger.signal(2));

        assert_eq!(
            calls.lock().unwrap()[..3],
            [(0x378, 1), (0x378, 0), (0x278, 2)]
        );
    }

    #[tokio::test]
    async fn com_port_is_guarded_and_reconnects() {
        let serial = FakeSerial::with_arduino();
        let wire = serial.wire.clone();
        let arduino = ArduinoConverter::open_with(serial, &fast_config()).unwrap();
        let trigger = Trigger::new(arduino, 30, false).unwrap();

        assert!(trigger.signal(9));
        assert!(!trigger.set_com_port("/dev/ttyACM1").unwrap());
        assert_eq!(trigger.com_port(), "/dev/ttyACM0");

        wait_reset().await;
        assert!(trigger.set_com_port("/dev/ttyACM1").unwrap());
        assert_eq!(trigger.com_port(), "/dev/ttyACM1");
        assert!(trigger.signal(8));
        assert_eq!(wire.bytes(), vec![9, 0, 8]);
    }

    fn wait_idle_blocking<B: TriggerOutput + 'static>(trigger: &Trigger<B>) {
        let deadline = std::time::Instant::now() + Duration::from_secs(2);
        while trigger.is_armed() && std::time::Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(2));
        }
    }

    #[test]
    fn blocking_caller_on_current_thread_runtime_still_resets() {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let output = MockOutput::new();

        runtime.block_on(async {
            let trigger = Trigger::new(output.clone(), 20, false).unwrap();
            assert!(trigger.signal(7));
            std::thread::sleep(Duration::from_millis(120));
            assert_eq!(output.values(), vec![7, 0]);
            assert!(trigger.signal(8));
        });
    }

    #[test]
    #[traced_test]
    fn reset_lost_with_its_runtime_is_recovered() {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .enable_all()
            .build()
            .unwrap();
        let output = MockOutput::new();
        let trigger = runtime
            .block_on(async { Trigger::new(output.clone(), 50, false) })
            .unwrap();

        assert!(trigger.signal(1));
        drop(runtime);
        wait_idle_blocking(&trigger);
        assert_eq!(output.values(), vec![1]);

        assert!(trigger.signal(2));
        assert!(logs_contain("Previous trigger reset was lost"));
        assert!(trigger.is_armed());

        wait_idle_blocking(&trigger);
        assert_eq!(output.values(), vec![1, 0, 2, 0]);

        assert!(trigger.signal(3));
        wait_idle_blocking(&trigger);
        assert_eq!(output.values(), vec![1, 0, 2, 0, 3, 0]);
    }

    #[tokio::test]
    async fn close_forwards_to_backend() {
        let output = MockOutput::new();
        let trigger = Trigger::new(output.clone(), 10, false).unwrap();
        trigger.close();
        trigger.close();
        assert_eq!(output.close_count(), 2);
        assert_eq!(trigger.backend_name(), "mock");
    }
}
