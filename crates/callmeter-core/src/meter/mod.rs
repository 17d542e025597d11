//! Session meter — drains a wallet snapshot at a per-minute rate.
//!
//! [`SessionMeter`] is a synchronous state machine advanced one tick at a
//! time; it does no I/O and owns no task. The live, timer-driven wrapper is
//! [`LiveSession`](crate::session::LiveSession).

pub mod billing;
mod machine;
mod types;

pub use billing::{charge_for, projected_balance, session_charge, settle, Settlement};
pub use machine::SessionMeter;
pub use types::{MeterError, MeterSnapshot, MeterState, MeterTick};
