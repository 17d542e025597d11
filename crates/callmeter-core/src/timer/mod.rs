//! Timer primitive — elapsed-second counting and the tick source that drives it.
//!
//! [`ElapsedTimer`] is the pure counter; [`Ticker`] is the owned background
//! task firing once per period. Dropping a `Ticker` cancels it, so a tick
//! source can never outlive its owner.

mod elapsed;
mod ticker;

pub use elapsed::ElapsedTimer;
pub use ticker::{Ticker, DEFAULT_TICK_PERIOD};
