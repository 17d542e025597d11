//! Wallet record and its fail-soft accessor.
//!
//! The wallet is a best-effort client cache, not a system of record: reads
//! degrade to an empty wallet and failed writes are logged and dropped.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::KeyValueStore;

/// Storage key of the wallet record
pub const WALLET_KEY: &str = "wallet";

/// Label used when none is configured
pub const DEFAULT_CURRENCY_LABEL: &str = "credits";

/// Prepaid wallet record
///
/// Serialized as `{"balanceMinorUnits": 500, "currencyLabel": "credits"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Wallet {
    /// Balance in minor currency units (e.g. cents)
    pub balance_minor_units: u64,
    /// Display-only label, never used in arithmetic
    #[serde(default = "default_currency_label")]
    pub currency_label: String,
}

fn default_currency_label() -> String {
    DEFAULT_CURRENCY_LABEL.to_string()
}

impl Default for Wallet {
    fn default() -> Self {
        Self {
            balance_minor_units: 0,
            currency_label: default_currency_label(),
        }
    }
}

impl Wallet {
    /// Create a wallet with the given balance and label
    pub fn new(balance_minor_units: u64, currency_label: impl Into<String>) -> Self {
        Self {
            balance_minor_units,
            currency_label: currency_label.into(),
        }
    }
}

/// Read/write capability over the single wallet record.
///
/// Injected into the meter instead of reaching for global storage.
pub trait WalletStore: Send + Sync {
    /// Current wallet, or an empty one if none is stored or it is unreadable
    fn get_wallet(&self) -> Wallet;

    /// Overwrite the stored wallet wholesale
    fn set_wallet(&self, wallet: &Wallet);
}

impl<T: WalletStore + ?Sized> WalletStore for std::sync::Arc<T> {
    fn get_wallet(&self) -> Wallet {
        (**self).get_wallet()
    }

    fn set_wallet(&self, wallet: &Wallet) {
        (**self).set_wallet(wallet)
    }
}

/// [`WalletStore`] over any [`KeyValueStore`], keyed by [`WALLET_KEY`]
#[derive(Debug)]
pub struct WalletAccessor<S> {
    store: S,
    default_label: String,
}

impl<S: KeyValueStore> WalletAccessor<S> {
    /// Create an accessor over `store`
    pub fn new(store: S) -> Self {
        Self {
            store,
            default_label: default_currency_label(),
        }
    }

    /// Label given to the default wallet when nothing is stored yet
    pub fn with_currency_label(mut self, label: impl Into<String>) -> Self {
        self.default_label = label.into();
        self
    }

    /// Borrow the underlying store
    pub fn store(&self) -> &S {
        &self.store
    }

    fn default_wallet(&self) -> Wallet {
        Wallet::new(0, self.default_label.clone())
    }
}

impl<S: KeyValueStore> WalletStore for WalletAccessor<S> {
    fn get_wallet(&self) -> Wallet {
        let raw = match self.store.get(WALLET_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                debug!("No wallet stored yet, using default");
                return self.default_wallet();
            }
            Err(e) => {
                warn!("Wallet storage unavailable, using default: {}", e);
                return self.default_wallet();
            }
        };

        match serde_json::from_str(&raw) {
            Ok(wallet) => wallet,
            Err(e) => {
                warn!("Stored wallet is malformed, treating as absent: {}", e);
                self.default_wallet()
            }
        }
    }

    fn set_wallet(&self, wallet: &Wallet) {
        let json = match serde_json::to_string(wallet) {
            Ok(json) => json,
            Err(e) => {
                warn!("Failed to serialize wallet: {}", e);
                return;
            }
        };

        match self.store.set(WALLET_KEY, &json) {
            Ok(()) => debug!("Wallet saved: {} minor units", wallet.balance_minor_units),
            Err(e) => warn!("Failed to save wallet, change dropped: {}", e),
        }
    }
}
