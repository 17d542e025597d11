//! callmeter-core — per-minute wallet metering for live consultation sessions.
//!
//! The crate is layered leaves-first:
//! - [`timer`]: elapsed-second counter and the cancellable tick source
//! - [`storage`]: key-value persistence and the wallet accessor on top of it
//! - [`meter`]: the session meter state machine and billing arithmetic
//! - [`session`]: the tokio-driven live session that wires the three together

pub mod config;
pub mod meter;
pub mod session;
pub mod storage;
pub mod timer;

pub use meter::{MeterError, MeterSnapshot, MeterState, SessionMeter, Settlement};
pub use session::{LiveSession, MeterEvent};
pub use storage::{FileStore, KeyValueStore, MemoryStore, Wallet, WalletAccessor, WalletStore};
