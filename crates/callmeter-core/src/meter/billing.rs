//! Billing arithmetic shared by the live projection and settlement.
//!
//! The projection uses real division and is only clamped. Settlement rounds
//! the charge up to whole minor units and caps it at the starting balance,
//! so a session never costs more than the meter drained and the settled
//! balance always equals the floor of the projection from the same start.

use serde::Serialize;
use tracing::info;

use crate::storage::WalletStore;

/// Seconds per billed minute
const SECONDS_PER_MINUTE: u64 = 60;

/// Projected remaining balance after `elapsed_seconds` at `rate_per_minute`.
///
/// `max(0, initial - elapsed * rate / 60)`; NaN and negatives clamp to zero.
pub fn projected_balance(initial_balance: u64, elapsed_seconds: u64, rate_per_minute: u64) -> f64 {
    let consumed =
        elapsed_seconds as f64 * rate_per_minute as f64 / SECONDS_PER_MINUTE as f64;
    let remaining = initial_balance as f64 - consumed;
    if remaining.is_nan() || remaining <= 0.0 {
        0.0
    } else {
        remaining
    }
}

/// Whole minor units owed for `elapsed_seconds`, rounded up, uncapped
pub fn charge_for(elapsed_seconds: u64, rate_per_minute: u64) -> u64 {
    let total = u128::from(elapsed_seconds) * u128::from(rate_per_minute);
    let charge = total.div_ceil(u128::from(SECONDS_PER_MINUTE));
    u64::try_from(charge).unwrap_or(u64::MAX)
}

/// Outcome of debiting a finished session from the wallet
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Settlement {
    pub charged_minor_units: u64,
    pub balance_before: u64,
    pub balance_after: u64,
}

/// Charge for a session that started from `initial_balance`.
///
/// Never more than `initial_balance`: the projection clamps at zero.
pub fn session_charge(initial_balance: u64, elapsed_seconds: u64, rate_per_minute: u64) -> u64 {
    charge_for(elapsed_seconds, rate_per_minute).min(initial_balance)
}

/// Debit the session charge from the wallet as currently stored.
///
/// The wallet is re-read rather than taken from the join-time snapshot, so a
/// top-up made during the session is kept. Concurrent writers still race:
/// the last write wins.
pub fn settle<W: WalletStore + ?Sized>(
    wallet: &W,
    initial_balance: u64,
    elapsed_seconds: u64,
    rate_per_minute: u64,
) -> Settlement {
    let mut record = wallet.get_wallet();
    let charged = session_charge(initial_balance, elapsed_seconds, rate_per_minute);
    let balance_before = record.balance_minor_units;
    record.balance_minor_units = balance_before.saturating_sub(charged);
    wallet.set_wallet(&record);

    info!(
        "Settled session: {}s at {}/min, charged {} ({} -> {})",
        elapsed_seconds, rate_per_minute, charged, balance_before, record.balance_minor_units
    );

    Settlement {
        charged_minor_units: charged,
        balance_before,
        balance_after: record.balance_minor_units,
    }
}
