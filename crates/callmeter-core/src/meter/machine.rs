use chrono::{DateTime, Utc};
use tracing::{debug, info};
use uuid::Uuid;

use super::billing::{self, Settlement};
use super::types::{MeterError, MeterSnapshot, MeterState, MeterTick};
use crate::storage::WalletStore;
use crate::timer::ElapsedTimer;

/// Per-session balance meter.
///
/// `Idle -> Running -> Stopped | Exhausted`. Terminal states are final; a
/// new session needs a new meter, which re-snapshots the wallet.
#[derive(Debug, Clone)]
pub struct SessionMeter {
    session_id: Uuid,
    rate_per_minute: u64,
    initial_balance: u64,
    timer: ElapsedTimer,
    state: MeterState,
    /// One-shot latch for the low-balance signal
    low_balance_fired: bool,
    started_at: Option<DateTime<Utc>>,
}

impl SessionMeter {
    /// Create an idle meter billing `rate_per_minute` minor units per minute
    pub fn new(rate_per_minute: u64) -> Result<Self, MeterError> {
        if rate_per_minute == 0 {
            return Err(MeterError::InvalidRate);
        }
        Ok(Self {
            session_id: Uuid::new_v4(),
            rate_per_minute,
            initial_balance: 0,
            timer: ElapsedTimer::new(),
            state: MeterState::Idle,
            low_balance_fired: false,
            started_at: None,
        })
    }

    /// Start draining from `initial_balance`.
    ///
    /// Returns `Ok(false)` if already running; fails once the meter ended.
    pub fn join(&mut self, initial_balance: u64) -> Result<bool, MeterError> {
        match self.state {
            MeterState::Running => Ok(false),
            MeterState::Stopped | MeterState::Exhausted => {
                Err(MeterError::Finished { state: self.state })
            }
            MeterState::Idle => {
                self.initial_balance = initial_balance;
                self.timer.start();
                self.state = MeterState::Running;
                self.started_at = Some(Utc::now());
                info!(
                    "Session {} joined: balance {} at {}/min",
                    self.session_id, initial_balance, self.rate_per_minute
                );
                Ok(true)
            }
        }
    }

    /// Advance one second. `None` unless running.
    pub fn tick(&mut self) -> Option<MeterTick> {
        if self.state != MeterState::Running {
            return None;
        }
        let elapsed_seconds = self.timer.tick()?;
        let projected_balance = self.projected_balance();

        let low_balance = !self.low_balance_fired
            && projected_balance > 0.0
            && projected_balance < self.rate_per_minute as f64;
        if low_balance {
            self.low_balance_fired = true;
            info!(
                "Session {}: under one minute of funds left ({:.2})",
                self.session_id, projected_balance
            );
        }

        let exhausted = projected_balance <= 0.0 && elapsed_seconds > 0;
        if exhausted {
            self.timer.stop();
            self.state = MeterState::Exhausted;
            info!(
                "Session {} exhausted after {}s",
                self.session_id, elapsed_seconds
            );
        } else {
            debug!(
                "Session {} tick {}: {:.2} left",
                self.session_id, elapsed_seconds, projected_balance
            );
        }

        Some(MeterTick {
            elapsed_seconds,
            projected_balance,
            low_balance,
            exhausted,
        })
    }

    /// End the session. Returns `false` unless it was running.
    pub fn end(&mut self) -> bool {
        if self.state != MeterState::Running {
            return false;
        }
        self.timer.stop();
        self.state = MeterState::Stopped;
        info!(
            "Session {} ended after {}s ({:.2} left)",
            self.session_id,
            self.timer.elapsed_seconds(),
            self.projected_balance()
        );
        true
    }

    /// Debit this session's charge from `wallet`. Only valid once not running.
    pub fn settle<W: WalletStore + ?Sized>(&self, wallet: &W) -> Result<Settlement, MeterError> {
        if self.state == MeterState::Running {
            return Err(MeterError::StillRunning);
        }
        Ok(billing::settle(
            wallet,
            self.initial_balance,
            self.timer.elapsed_seconds(),
            self.rate_per_minute,
        ))
    }

    /// Projected remaining balance, clamped at zero
    pub fn projected_balance(&self) -> f64 {
        billing::projected_balance(
            self.initial_balance,
            self.timer.elapsed_seconds(),
            self.rate_per_minute,
        )
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn state(&self) -> MeterState {
        self.state
    }

    pub fn elapsed_seconds(&self) -> u64 {
        self.timer.elapsed_seconds()
    }

    pub fn rate_per_minute(&self) -> u64 {
        self.rate_per_minute
    }

    pub fn initial_balance(&self) -> u64 {
        self.initial_balance
    }

    pub fn low_balance_fired(&self) -> bool {
        self.low_balance_fired
    }

    pub fn is_running(&self) -> bool {
        self.state == MeterState::Running
    }

    /// Owned snapshot for display
    pub fn snapshot(&self) -> MeterSnapshot {
        MeterSnapshot {
            session_id: self.session_id,
            state: self.state,
            elapsed_seconds: self.timer.elapsed_seconds(),
            projected_balance: self.projected_balance(),
            initial_balance: self.initial_balance,
            rate_per_minute: self.rate_per_minute,
            low_balance_fired: self.low_balance_fired,
            started_at: self.started_at,
        }
    }
}
