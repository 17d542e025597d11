//! LiveSession — one meter, one tick source, and the channels feeding the host.
//!
//! The ticker task and the host share the meter behind a mutex. Each tick is
//! a single critical section, so after [`LiveSession::end`] returns no tick
//! can change the meter: either it finished before `end` took the lock, or
//! it finds the meter stopped and exits.

use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::{broadcast, watch};
use tracing::debug;
use uuid::Uuid;

use super::events::MeterEvent;
use crate::config::MeterSettings;
use crate::meter::{MeterError, MeterSnapshot, SessionMeter, Settlement};
use crate::storage::WalletStore;
use crate::timer::{Ticker, DEFAULT_TICK_PERIOD};

/// Broadcast channel capacity for meter events
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

/// A metered consultation session running on the tokio runtime.
///
/// Dropping a running session ends it, like the host view tearing down.
pub struct LiveSession {
    meter: Arc<Mutex<SessionMeter>>,
    ticker: Ticker,
    event_tx: broadcast::Sender<MeterEvent>,
    snapshot_tx: Arc<watch::Sender<MeterSnapshot>>,
}

impl LiveSession {
    /// Create an idle session ticking once per second
    pub fn new(rate_per_minute: u64) -> Result<Self, MeterError> {
        Self::with_tick_period(rate_per_minute, DEFAULT_TICK_PERIOD)
    }

    /// Create an idle session from configured rate and tick interval
    pub fn from_settings(settings: &MeterSettings) -> Result<Self, MeterError> {
        Self::with_tick_period(settings.rate_per_minute, settings.tick_interval())
    }

    /// Create an idle session with a custom tick period
    pub fn with_tick_period(rate_per_minute: u64, period: Duration) -> Result<Self, MeterError> {
        let meter = SessionMeter::new(rate_per_minute)?;
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let (snapshot_tx, _) = watch::channel(meter.snapshot());

        Ok(Self {
            meter: Arc::new(Mutex::new(meter)),
            ticker: Ticker::new(period),
            event_tx,
            snapshot_tx: Arc::new(snapshot_tx),
        })
    }

    /// Subscribe to meter events.
    ///
    /// Subscribe before [`join`](Self::join) to observe `Started`.
    pub fn subscribe(&self) -> broadcast::Receiver<MeterEvent> {
        self.event_tx.subscribe()
    }

    /// Continuously readable view of the meter
    pub fn watch(&self) -> watch::Receiver<MeterSnapshot> {
        self.snapshot_tx.subscribe()
    }

    /// Current snapshot
    pub fn snapshot(&self) -> MeterSnapshot {
        self.meter.lock().snapshot()
    }

    pub fn session_id(&self) -> Uuid {
        self.meter.lock().session_id()
    }

    pub fn is_running(&self) -> bool {
        self.meter.lock().is_running()
    }

    /// Snapshot the wallet and start draining.
    ///
    /// Returns `Ok(false)` if already running. Must be called from within a
    /// tokio runtime. The wallet is read before the meter lock is taken.
    pub fn join<W: WalletStore + ?Sized>(&mut self, wallet: &W) -> Result<bool, MeterError> {
        if self.is_running() {
            return Ok(false);
        }
        let balance = wallet.get_wallet().balance_minor_units;

        {
            let mut meter = self.meter.lock();
            if !meter.join(balance)? {
                return Ok(false);
            }
            let _ = self.event_tx.send(MeterEvent::Started {
                session_id: meter.session_id(),
                initial_balance: meter.initial_balance(),
                rate_per_minute: meter.rate_per_minute(),
            });
            self.snapshot_tx.send_replace(meter.snapshot());
        }

        let meter = Arc::clone(&self.meter);
        let event_tx = self.event_tx.clone();
        let snapshot_tx = Arc::clone(&self.snapshot_tx);
        self.ticker
            .start(move || on_tick(&meter, &event_tx, &snapshot_tx));
        Ok(true)
    }

    /// End the session and cancel the tick source.
    ///
    /// Safe to call in any state; returns the final snapshot.
    pub fn end(&mut self) -> MeterSnapshot {
        self.ticker.stop();

        let mut meter = self.meter.lock();
        if meter.end() {
            let _ = self.event_tx.send(MeterEvent::Stopped {
                elapsed_seconds: meter.elapsed_seconds(),
                projected_balance: meter.projected_balance(),
            });
            self.snapshot_tx.send_replace(meter.snapshot());
        }
        meter.snapshot()
    }

    /// Debit the session charge from `wallet` once the session is over
    pub fn settle<W: WalletStore + ?Sized>(&self, wallet: &W) -> Result<Settlement, MeterError> {
        self.meter.lock().settle(wallet)
    }
}

impl Drop for LiveSession {
    fn drop(&mut self) {
        if self.is_running() {
            debug!("LiveSession dropped while running, ending");
            self.end();
        }
    }
}

/// One tick: advance the meter and publish the outcome
fn on_tick(
    meter: &Mutex<SessionMeter>,
    event_tx: &broadcast::Sender<MeterEvent>,
    snapshot_tx: &watch::Sender<MeterSnapshot>,
) -> ControlFlow<()> {
    let mut meter = meter.lock();
    let Some(tick) = meter.tick() else {
        return ControlFlow::Break(());
    };

    let _ = event_tx.send(MeterEvent::Tick {
        elapsed_seconds: tick.elapsed_seconds,
        projected_balance: tick.projected_balance,
    });
    if tick.low_balance {
        let _ = event_tx.send(MeterEvent::LowBalance {
            elapsed_seconds: tick.elapsed_seconds,
            projected_balance: tick.projected_balance,
        });
    }
    if tick.exhausted {
        let _ = event_tx.send(MeterEvent::Exhausted {
            elapsed_seconds: tick.elapsed_seconds,
        });
    }
    snapshot_tx.send_replace(meter.snapshot());

    if tick.exhausted {
        ControlFlow::Break(())
    } else {
        ControlFlow::Continue(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::meter::MeterState;
    use crate::storage::{MemoryStore, Wallet, WalletAccessor};
    use std::sync::atomic::{AtomicBool, Ordering};
    use tokio::time;

    fn wallet_with(balance: u64) -> WalletAccessor<MemoryStore> {
        let accessor = WalletAccessor::new(MemoryStore::new());
        accessor.set_wallet(&Wallet::new(balance, "credits"));
        accessor
    }

    fn drain(rx: &mut broadcast::Receiver<MeterEvent>) -> Vec<MeterEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[tokio::test(start_paused = true)]
    async fn test_reference_scenario_in_real_time() {
        let wallet = wallet_with(500);
        let mut session = LiveSession::new(199).unwrap();
        let mut rx = session.subscribe();
        assert!(session.join(&wallet).unwrap());

        time::sleep(Duration::from_millis(60_500)).await;
        let snapshot = session.snapshot();
        assert_eq!(snapshot.elapsed_seconds, 60);
        assert_eq!(snapshot.projected_balance, 301.0);
        assert!(!snapshot.low_balance_fired);

        time::sleep(Duration::from_secs(200)).await;
        let snapshot = session.snapshot();
        assert_eq!(snapshot.state, MeterState::Exhausted);
        assert_eq!(snapshot.elapsed_seconds, 151);
        assert_eq!(snapshot.projected_balance, 0.0);
        assert!(!session.is_running());

        let events = drain(&mut rx);
        assert!(matches!(
            events[0],
            MeterEvent::Started {
                initial_balance: 500,
                rate_per_minute: 199,
                ..
            }
        ));

        let low: Vec<_> = events
            .iter()
            .filter_map(|e| match e {
                MeterEvent::LowBalance {
                    elapsed_seconds, ..
                } => Some(*elapsed_seconds),
                _ => None,
            })
            .collect();
        assert_eq!(low, vec![91]);

        let exhausted: Vec<_> = events
            .iter()
            .filter_map(|e| match e {
                MeterEvent::Exhausted { elapsed_seconds } => Some(*elapsed_seconds),
                _ => None,
            })
            .collect();
        assert_eq!(exhausted, vec![151]);
        assert_eq!(events.last(), Some(&MeterEvent::Exhausted { elapsed_seconds: 151 }));

        // Ending an exhausted session changes nothing
        let final_snapshot = session.end();
        assert_eq!(final_snapshot.state, MeterState::Exhausted);
        assert!(drain(&mut rx).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_end_freezes_elapsed_and_balance() {
        let wallet = wallet_with(500);
        let mut session = LiveSession::new(199).unwrap();
        let mut rx = session.subscribe();
        session.join(&wallet).unwrap();

        time::sleep(Duration::from_millis(10_500)).await;
        let ended = session.end();
        assert_eq!(ended.state, MeterState::Stopped);
        assert_eq!(ended.elapsed_seconds, 10);

        time::sleep(Duration::from_secs(60)).await;
        let later = session.snapshot();
        assert_eq!(later.elapsed_seconds, 10);
        assert_eq!(later.projected_balance, ended.projected_balance);

        let events = drain(&mut rx);
        assert!(matches!(
            events.last(),
            Some(MeterEvent::Stopped {
                elapsed_seconds: 10,
                ..
            })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_double_join_does_not_double_drain() {
        let wallet = wallet_with(500);
        let mut session = LiveSession::new(199).unwrap();
        assert!(session.join(&wallet).unwrap());
        assert!(!session.join(&wallet).unwrap());

        time::sleep(Duration::from_millis(5_500)).await;
        assert_eq!(session.snapshot().elapsed_seconds, 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rejoin_after_end_fails() {
        let wallet = wallet_with(500);
        let mut session = LiveSession::new(199).unwrap();
        session.join(&wallet).unwrap();
        session.end();

        assert_eq!(
            session.join(&wallet).unwrap_err(),
            MeterError::Finished {
                state: MeterState::Stopped
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_watch_tracks_progress() {
        let wallet = wallet_with(500);
        let mut session = LiveSession::new(60).unwrap();
        let watcher = session.watch();
        assert_eq!(watcher.borrow().state, MeterState::Idle);

        session.join(&wallet).unwrap();
        assert_eq!(watcher.borrow().state, MeterState::Running);

        time::sleep(Duration::from_millis(2_500)).await;
        assert_eq!(watcher.borrow().elapsed_seconds, 2);
        assert_eq!(watcher.borrow().projected_balance, 498.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_ends_running_session() {
        let wallet = wallet_with(500);
        let mut session = LiveSession::new(199).unwrap();
        let mut rx = session.subscribe();
        let watcher = session.watch();
        session.join(&wallet).unwrap();

        time::sleep(Duration::from_millis(3_500)).await;
        drop(session);
        time::sleep(Duration::from_secs(10)).await;

        let events = drain(&mut rx);
        assert!(matches!(
            events.last(),
            Some(MeterEvent::Stopped {
                elapsed_seconds: 3,
                ..
            })
        ));
        assert_eq!(watcher.borrow().state, MeterState::Stopped);
        assert_eq!(watcher.borrow().elapsed_seconds, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_custom_tick_period() {
        let wallet = wallet_with(500);
        let mut session = LiveSession::with_tick_period(60, Duration::from_millis(10)).unwrap();
        session.join(&wallet).unwrap();

        time::sleep(Duration::from_millis(105)).await;
        assert_eq!(session.snapshot().elapsed_seconds, 10);
    }

    #[tokio::test(start_paused = true)]
    async fn test_settle_after_end() {
        let wallet = wallet_with(500);
        let mut session = LiveSession::new(199).unwrap();
        session.join(&wallet).unwrap();

        time::sleep(Duration::from_millis(60_500)).await;
        assert_eq!(
            session.settle(&wallet).unwrap_err(),
            MeterError::StillRunning
        );

        session.end();
        let settlement = session.settle(&wallet).unwrap();
        assert_eq!(settlement.charged_minor_units, 199);
        assert_eq!(wallet.get_wallet().balance_minor_units, 301);
    }

    /// Wallet that records whether the meter lock was free while it was read
    struct LockCheckingWallet {
        inner: WalletAccessor<MemoryStore>,
        meter: Arc<Mutex<SessionMeter>>,
        lock_was_free: AtomicBool,
    }

    impl WalletStore for LockCheckingWallet {
        fn get_wallet(&self) -> Wallet {
            self.lock_was_free
                .store(self.meter.try_lock().is_some(), Ordering::SeqCst);
            self.inner.get_wallet()
        }

        fn set_wallet(&self, wallet: &Wallet) {
            self.inner.set_wallet(wallet)
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_join_reads_wallet_outside_meter_lock() {
        let mut session = LiveSession::new(199).unwrap();
        let wallet = LockCheckingWallet {
            inner: wallet_with(500),
            meter: Arc::clone(&session.meter),
            lock_was_free: AtomicBool::new(false),
        };

        assert!(session.join(&wallet).unwrap());
        assert!(wallet.lock_was_free.load(Ordering::SeqCst));
        assert_eq!(session.snapshot().initial_balance, 500);
    }

    #[tokio::test(start_paused = true)]
    async fn test_settle_after_exhaustion_keeps_top_up() {
        let wallet = wallet_with(500);
        let mut session = LiveSession::new(199).unwrap();
        session.join(&wallet).unwrap();

        time::sleep(Duration::from_secs(200)).await;
        assert_eq!(session.snapshot().state, MeterState::Exhausted);

        wallet.set_wallet(&Wallet::new(1_500, "credits"));
        session.end();
        let settlement = session.settle(&wallet).unwrap();
        assert_eq!(settlement.charged_minor_units, 500);
        assert_eq!(wallet.get_wallet().balance_minor_units, 1_000);
    }

    #[test]
    fn test_zero_rate_rejected() {
        assert!(matches!(
            LiveSession::new(0),
            Err(MeterError::InvalidRate)
        ));
    }
}
