//! Events pushed from a live session to the host UI.

use serde::Serialize;
use uuid::Uuid;

/// Meter notifications, delivered over a `broadcast` channel.
///
/// `LowBalance` and `Exhausted` are each sent at most once per session.
/// Receivers that fall behind lose the oldest events (lagged).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum MeterEvent {
    /// The session was joined and the wallet snapshotted
    Started {
        session_id: Uuid,
        initial_balance: u64,
        rate_per_minute: u64,
    },

    /// One metered second elapsed
    Tick {
        elapsed_seconds: u64,
        projected_balance: f64,
    },

    /// Less than one minute of funds remains
    LowBalance {
        elapsed_seconds: u64,
        projected_balance: f64,
    },

    /// Funds ran out; the session is over
    Exhausted { elapsed_seconds: u64 },

    /// The host ended the session
    Stopped {
        elapsed_seconds: u64,
        projected_balance: f64,
    },
}

impl MeterEvent {
    /// Whether no further events follow this one
    pub fn is_final(&self) -> bool {
        matches!(self, MeterEvent::Exhausted { .. } | MeterEvent::Stopped { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serialization() {
        let event = MeterEvent::LowBalance {
            elapsed_seconds: 91,
            projected_balance: 198.5,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"event\":\"low_balance\""));
        assert!(json.contains("\"elapsed_seconds\":91"));
    }

    #[test]
    fn test_final_events() {
        assert!(MeterEvent::Exhausted { elapsed_seconds: 1 }.is_final());
        assert!(MeterEvent::Stopped {
            elapsed_seconds: 1,
            projected_balance: 0.0
        }
        .is_final());
        assert!(!MeterEvent::Tick {
            elapsed_seconds: 1,
            projected_balance: 0.0
        }
        .is_final());
    }
}
