//! Integration tests for the trigger façade
//!
//! These run the full signal → hold → reset cycle against the mock output and a
//! recording parallel-port driver, checking the timing contract end to end.

use daq_trigger::hardware::arduino::{
    ArduinoConfig, ArduinoConverter, SerialConnector, SerialLink,
};
use daq_trigger::hardware::lpt::{LptDriver, ParallelPort};
use daq_trigger::{MockOutput, Trigger, TriggerError};
use serial_test::serial;
use serialport::SerialPortInfo;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

// =============================================================================
// Test doubles
// =============================================================================

/// Parallel-port driver keeping the level of each port.
#[derive(Clone, Default)]
struct RecordingLpt {
    writes: Arc<Mutex<Vec<(u16, u8, Instant)>>>,
}

impl RecordingLpt {
    fn level(&self) -> u8 {
        self.writes.lock().unwrap().last().map_or(0, |w| w.1)
    }

    fn values(&self) -> Vec<u8> {
        self.writes.lock().unwrap().iter().map(|w| w.1).collect()
    }
}

impl LptDriver for RecordingLpt {
    fn init(&self) -> i32 {
        0
    }

    fn set_data(&self, port_address: u16, value: u8) {
        self.writes
            .lock()
            .unwrap()
            .push((port_address, value, Instant::now()));
    }
}

/// A host without any serial ports.
struct NoSerialPorts;

impl SerialConnector for NoSerialPorts {
    fn available_ports(&self) -> serialport::Result<Vec<SerialPortInfo>> {
        Ok(Vec::new())
    }

    fn connect(&self, _port_name: &str, _baud_rate: u32) -> serialport::Result<SerialLink> {
        Err(serialport::Error::new(
            serialport::ErrorKind::NoDevice,
            "no such port",
        ))
    }
}

async fn wait_until_idle<B: daq_trigger::TriggerOutput + 'static>(trigger: &Trigger<B>) {
    let deadline = Instant::now() + Duration::from_secs(2);
    while trigger.is_armed() && Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
}

// =============================================================================
// Scenarios
// =============================================================================

#[tokio::test]
#[serial]
async fn parallel_port_scenario() {
    let driver = RecordingLpt::default();
    let port = ParallelPort::with_driver(driver.clone(), 0x378).unwrap();
    let trigger = Trigger::new(port, 50, true).unwrap();

    assert!(trigger.signal(1));
    assert_eq!(driver.level(), 1);

    assert!(!trigger.signal(2));
    assert_eq!(driver.level(), 1);

    tokio::time::sleep(Duration::from_millis(50)).await;
    wait_until_idle(&trigger).await;
    assert_eq!(driver.level(), 0);

    assert!(trigger.signal(2));
    assert_eq!(driver.level(), 2);
    assert_eq!(driver.values(), vec![1, 0, 2]);
    assert!(driver.writes.lock().unwrap().iter().all(|w| w.0 == 0x378));
}

#[tokio::test]
#[serial]
async fn reset_follows_signal_after_delay() {
    let output = MockOutput::new();
    let trigger = Trigger::new(output.clone(), 40, false).unwrap();

    for value in [7u8, 255, 1] {
        assert!(trigger.signal(value));
        wait_until_idle(&trigger).await;
    }

    let writes = output.writes();
    assert_eq!(
        writes.iter().map(|w| w.value).collect::<Vec<_>>(),
        vec![7, 0, 255, 0, 1, 0]
    );
    for pair in writes.chunks(2) {
        let held = pair[1].at.duration_since(pair[0].at);
        assert!(
            held >= Duration::from_millis(40),
            "value {} reset after {:?}",
            pair[0].value,
            held
        );
    }
}

#[tokio::test]
#[serial]
async fn burst_only_first_signal_succeeds() {
    let output = MockOutput::new();
    let trigger = Trigger::new(output.clone(), 100, false).unwrap();

    let results: Vec<bool> = (1..=10u8).map(|v| trigger.signal(v)).collect();
    assert_eq!(results[0], true);
    assert!(results[1..].iter().all(|ok| !ok));
    assert_eq!(output.values(), vec![1]);

    wait_until_idle(&trigger).await;
    assert_eq!(output.values(), vec![1, 0]);
}

#[tokio::test]
#[serial]
async fn new_delay_applies_to_next_cycle() {
    let output = MockOutput::new();
    let trigger = Trigger::new(output.clone(), 20, false).unwrap();

    assert!(trigger.set_delay(80));
    assert_eq!(trigger.delay_ms(), 80);

    assert!(trigger.signal(3));
    tokio::time::sleep(Duration::from_millis(40)).await;
    assert!(trigger.is_armed());
    assert_eq!(output.level(), 3);

    wait_until_idle(&trigger).await;
    let writes = output.writes();
    assert!(writes[1].at.duration_since(writes[0].at) >= Duration::from_millis(80));
}

#[tokio::test]
async fn delay_round_trip() {
    let trigger = Trigger::new(MockOutput::new(), 50, false).unwrap();
    for ms in [0u64, 1, 17, 50, 250, 1000] {
        assert!(trigger.set_delay(ms));
        assert_eq!(trigger.delay_ms(), ms);
    }
}

#[tokio::test]
async fn unusual_port_address_is_accepted() {
    let port = ParallelPort::with_driver(RecordingLpt::default(), 0x100).unwrap();
    let trigger = Trigger::new(port, 50, false).unwrap();
    assert_eq!(trigger.port_address(), 0x100);
}

#[test]
fn arduino_without_device_fails() {
    let err = ArduinoConverter::open_with(NoSerialPorts, &ArduinoConfig::default())
        .err()
        .unwrap();
    assert!(matches!(err, TriggerError::NoDevice { .. }));
    assert!(err.is_connection_error());
}

#[test]
#[serial]
fn works_without_ambient_runtime() {
    let output = MockOutput::new();
    let trigger = Trigger::new(output.clone(), 20, false).unwrap();

    assert!(trigger.signal(5));
    assert!(!trigger.signal(6));

    let deadline = Instant::now() + Duration::from_secs(2);
    while trigger.is_armed() && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(2));
    }
    assert_eq!(output.values(), vec![5, 0]);
    assert!(trigger.signal(6));
}

#[test]
#[serial]
fn callers_on_many_threads_never_overlap() {
    let output = MockOutput::new();
    let trigger = Arc::new(Trigger::new(output.clone(), 5, false).unwrap());

    let workers: Vec<_> = (0..4u8)
        .map(|id| {
            let trigger = Arc::clone(&trigger);
            std::thread::spawn(move || {
                let mut sent = 0;
                let deadline = Instant::now() + Duration::from_millis(200);
                while Instant::now() < deadline {
                    if trigger.signal(id + 1) {
                        sent += 1;
                    }
                    std::thread::sleep(Duration::from_millis(1));
                }
                sent
            })
        })
        .collect();
    let sent: usize = workers.into_iter().map(|w| w.join().unwrap()).sum();

    let deadline = Instant::now() + Duration::from_secs(2);
    while trigger.is_armed() && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(2));
    }

    let values = output.values();
    assert_eq!(values.len(), sent * 2);
    for pair in values.chunks(2) {
        assert_ne!(pair[0], 0);
        assert_eq!(pair[1], 0);
    }
}
