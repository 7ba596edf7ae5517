//! CLI Entry Point for daq-trigger
//!
//! Sends trigger pulses from the command line, mostly to check the wiring between the
//! stimulus PC and the amplifier before an experiment:
//!
//! ```bash
//! # one pulse of value 1 on the configured backend
//! daq-trigger send 1
//!
//! # 20 pulses of value 4, one every 100 ms, with a 50 ms hold time
//! daq-trigger pulse 4 --count 20 --interval-ms 100
//!
//! # which serial port would the Arduino backend pick?
//! daq-trigger ports
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use daq_trigger::config::{BackendSettings, TriggerSettings, DEFAULT_CONFIG_PATH};
use daq_trigger::hardware::port_discovery::{descriptor, PortMatcher, ARDUINO_PATTERN};
use daq_trigger::{telemetry, Trigger, TriggerOutput};
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

#[derive(Parser)]
#[command(name = "daq-trigger")]
#[command(about = "Timed trigger pulses for EEG/physiology amplifiers", long_about = None)]
struct Cli {
    /// Settings file
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Override the configured hold time in milliseconds
    #[arg(long, global = true)]
    delay_ms: Option<u64>,

    /// Use the in-memory mock backend instead of the configured hardware
    #[arg(long, global = true)]
    mock: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Send a single trigger value and wait for its reset
    Send {
        /// Value to assert (0-255)
        value: u8,
    },

    /// Send the same value repeatedly
    Pulse {
        /// Value to assert (0-255)
        value: u8,

        /// Number of pulses
        #[arg(long, default_value = "10")]
        count: u32,

        /// Time between pulses in milliseconds
        #[arg(long, default_value = "100", value_parser = clap::value_parser!(u64).range(1..))]
        interval_ms: u64,
    },

    /// List serial ports and mark the ones the Arduino backend would match
    Ports {
        /// Descriptor pattern (case-insensitive regex)
        #[arg(long, default_value = ARDUINO_PATTERN)]
        pattern: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut settings = TriggerSettings::load_from(&cli.config)
        .with_context(|| format!("Failed to load settings from {}", cli.config.display()))?;
    if let Some(delay_ms) = cli.delay_ms {
        settings.delay_ms = delay_ms;
    }
    if cli.mock {
        settings.backend = BackendSettings::Mock;
    }
    settings.validate()?;
    telemetry::init_from_settings(&settings).map_err(anyhow::Error::msg)?;

    match cli.command {
        Commands::Send { value } => send(&settings, value).await,
        Commands::Pulse {
            value,
            count,
            interval_ms,
        } => pulse(&settings, value, count, interval_ms).await,
        Commands::Ports { pattern } => list_ports(&pattern),
    }
}

fn open(settings: &TriggerSettings) -> Result<Trigger<Box<dyn TriggerOutput>>> {
    let trigger = Trigger::from_settings(settings).context("Failed to open trigger backend")?;
    info!(
        backend = %trigger.backend_name(),
        delay_ms = trigger.delay_ms(),
        "Trigger ready"
    );
    Ok(trigger)
}

/// Wait until the pending reset of `trigger` has been written.
async fn settle(trigger: &Trigger<Box<dyn TriggerOutput>>) {
    tokio::time::sleep(Duration::from_millis(trigger.delay_ms())).await;
    while trigger.is_armed() {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
}

async fn send(settings: &TriggerSettings, value: u8) -> Result<()> {
    let trigger = open(settings)?;
    if !trigger.signal(value) {
        anyhow::bail!("Trigger value {} was not sent", value);
    }
    settle(&trigger).await;
    trigger.close();
    Ok(())
}

async fn pulse(settings: &TriggerSettings, value: u8, count: u32, interval_ms: u64) -> Result<()> {
    let trigger = open(settings)?;
    let mut interval = tokio::time::interval(Duration::from_millis(interval_ms));

    let mut sent = 0u32;
    for _ in 0..count {
        interval.tick().await;
        if trigger.signal(value) {
            sent += 1;
        }
    }
    settle(&trigger).await;
    trigger.close();

    println!("Sent {} of {} pulses ({} refused)", sent, count, count - sent);
    Ok(())
}

fn list_ports(pattern: &str) -> Result<()> {
    let matcher = PortMatcher::new(pattern)?;
    let ports = serialport::available_ports().context("Failed to enumerate serial ports")?;

    if ports.is_empty() {
        println!("No serial ports detected on this system.");
        return Ok(());
    }

    let selected = matcher.first_match(&ports).map(|info| info.port_name.clone());
    for info in &ports {
        let marker = if selected.as_deref() == Some(info.port_name.as_str()) {
            "*"
        } else if matcher.matches(info) {
            "+"
        } else {
            " "
        };
        println!("{} {}", marker, descriptor(info));
    }
    if selected.is_none() {
        println!("No port matches '{}'.", matcher.pattern());
    }
    Ok(())
}
