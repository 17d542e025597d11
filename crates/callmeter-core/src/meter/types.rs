//! Meter state and snapshot types.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

/// Lifecycle state of a meter
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MeterState {
    /// Created, not yet joined
    #[default]
    Idle,
    /// Timer active, balance draining
    Running,
    /// Ended by the host; balance frozen
    Stopped,
    /// Projected balance reached zero while running
    Exhausted,
}

impl MeterState {
    /// Stopped and Exhausted are final for a meter instance
    pub fn is_terminal(self) -> bool {
        matches!(self, MeterState::Stopped | MeterState::Exhausted)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MeterState::Idle => "idle",
            MeterState::Running => "running",
            MeterState::Stopped => "stopped",
            MeterState::Exhausted => "exhausted",
        }
    }
}

impl fmt::Display for MeterState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error type for meter operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MeterError {
    /// Rate of zero minor units per minute
    #[error("rate must be at least 1 minor unit per minute")]
    InvalidRate,

    /// Join attempted on a meter that already ended
    #[error("session already {state}; start a new meter")]
    Finished { state: MeterState },

    /// Settlement attempted while the meter is still draining
    #[error("session is still running")]
    StillRunning,
}

/// Result of one tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeterTick {
    /// Elapsed seconds after this tick
    pub elapsed_seconds: u64,
    /// Projected balance after this tick (clamped, not rounded)
    pub projected_balance: f64,
    /// Less than one minute of funds remains; set on exactly one tick
    pub low_balance: bool,
    /// Balance reached zero; the meter is now exhausted
    pub exhausted: bool,
}

/// Owned, lock-free view of a meter for display
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MeterSnapshot {
    pub session_id: Uuid,
    pub state: MeterState,
    pub elapsed_seconds: u64,
    pub projected_balance: f64,
    pub initial_balance: u64,
    pub rate_per_minute: u64,
    pub low_balance_fired: bool,
    /// When the meter was joined
    pub started_at: Option<DateTime<Utc>>,
}

impl MeterSnapshot {
    /// Projected balance rounded down to whole minor units
    pub fn whole_balance(&self) -> u64 {
        self.projected_balance.floor() as u64
    }
}
