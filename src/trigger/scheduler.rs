//! One-shot deferred actions on a background tokio executor.
//!
//! A [`DeferredReset`] runs a callback once, a fixed delay after it is started. Like an OS
//! one-shot timer it cannot be restarted: once started it stays consumed, and the owner
//! builds a fresh one for the next cycle.
//!
//! Timers run on the ambient tokio runtime when the trigger is created inside a
//! multi-thread one, whose workers drive them whatever the caller's thread does. Every
//! other caller, including one on a current-thread runtime, gets a crate-wide runtime
//! with a single `trigger-timer` worker, started on first use.

use crate::error::{Result, TriggerError};
use once_cell::sync::OnceCell;
use std::time::Duration;
use tokio::runtime::{Builder, Handle, Runtime, RuntimeFlavor};
use tokio::task::JoinHandle;
use tracing::{debug, error};

static TIMER_RUNTIME: OnceCell<Runtime> = OnceCell::new();

/// Handle of the executor that runs deferred resets.
pub fn timer_handle() -> Result<Handle> {
    match Handle::try_current() {
        Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => Ok(handle),
        _ => background_handle(),
    }
}

/// Handle of the crate-wide `trigger-timer` runtime, started on first call.
pub fn background_handle() -> Result<Handle> {
    let runtime = TIMER_RUNTIME.get_or_try_init(|| {
        debug!("Starting background timer runtime");
        Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name("trigger-timer")
            .enable_time()
            .build()
    });

    runtime
        .map(|rt| rt.handle().clone())
        .map_err(TriggerError::Tokio)
}

/// A single-use deferred callback.
#[derive(Debug)]
pub struct DeferredReset {
    delay: Duration,
    task: Option<JoinHandle<()>>,
}

impl DeferredReset {
    /// Unstarted timer firing `delay` after `start`.
    pub fn new(delay: Duration) -> Self {
        Self { delay, task: None }
    }

    /// Time between `start` and the callback.
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// True from `start` until the callback has returned.
    pub fn is_pending(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// True once `start` has been called, whether or not the callback has run.
    pub fn is_consumed(&self) -> bool {
        self.task.is_some()
    }

    /// Run `callback` on a blocking thread of `handle`'s runtime after the delay.
    ///
    /// Returns `false` without scheduling anything if this timer was already started.
    pub fn start<F>(&mut self, handle: &Handle, callback: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        if self.is_consumed() {
            return false;
        }

        let delay = self.delay;
        self.task = Some(handle.spawn(async move {
            tokio::time::sleep(delay).await;
            if let Err(e) = tokio::task::spawn_blocking(callback).await {
                error!("Deferred reset failed: {}", e);
            }
        }));
        true
    }
}
