use std::ops::ControlFlow;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::debug;

/// One metered second
pub const DEFAULT_TICK_PERIOD: Duration = Duration::from_secs(1);

/// Owned periodic task.
///
/// At most one tick source exists per `Ticker`. The first tick fires one full
/// period after [`start`](Self::start); ticks are sequential and never
/// overlap. Dropping the ticker aborts the task.
#[derive(Debug)]
pub struct Ticker {
    period: Duration,
    handle: Option<JoinHandle<()>>,
}

impl Ticker {
    /// Create a stopped ticker
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            handle: None,
        }
    }

    /// Spawn the tick task, calling `on_tick` once per period until it
    /// returns `ControlFlow::Break` or the ticker is stopped.
    ///
    /// Returns `false` (and drops `on_tick`) if a tick task is already
    /// running. Must be called from within a tokio runtime.
    pub fn start<F>(&mut self, mut on_tick: F) -> bool
    where
        F: FnMut() -> ControlFlow<()> + Send + 'static,
    {
        if self.is_running() {
            return false;
        }

        let period = self.period;
        self.handle = Some(tokio::spawn(async move {
            let mut interval = time::interval_at(Instant::now() + period, period);
            // Catch up after a stall so the count keeps tracking wall-clock time
            interval.set_missed_tick_behavior(MissedTickBehavior::Burst);

            loop {
                interval.tick().await;
                if on_tick().is_break() {
                    debug!("Ticker finished by callback");
                    break;
                }
            }
        }));
        true
    }

    /// Cancel the tick task. Returns `false` if it was not running.
    pub fn stop(&mut self) -> bool {
        match self.handle.take() {
            Some(handle) => {
                let was_running = !handle.is_finished();
                handle.abort();
                was_running
            }
            None => false,
        }
    }

    /// Whether the tick task is alive
    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }
}

impl Default for Ticker {
    fn default() -> Self {
        Self::new(DEFAULT_TICK_PERIOD)
    }
}

impl Drop for Ticker {
    fn drop(&mut self) {
        self.stop();
    }
}
