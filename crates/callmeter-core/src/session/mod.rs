//! Live session — a [`SessionMeter`](crate::meter::SessionMeter) driven by a
//! [`Ticker`](crate::timer::Ticker), publishing its progress to the host.

mod events;
mod live;

pub use events::MeterEvent;
pub use live::{LiveSession, EVENT_CHANNEL_CAPACITY};
