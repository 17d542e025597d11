//! Plain-text rendering of meter output for the terminal host.

use callmeter_core::meter::{MeterSnapshot, MeterState, Settlement};
use callmeter_core::{MeterEvent, Wallet};

/// Format seconds as `HH:MM:SS`
pub fn format_elapsed(seconds: u64) -> String {
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;
    format!("{:02}:{:02}:{:02}", hours, minutes, secs)
}

/// Format a (possibly fractional) minor-unit amount with its label
pub fn format_amount(minor_units: f64, label: &str) -> String {
    format!("{:.2} {}", minor_units, label)
}

/// Stored wallet, one line
pub fn wallet_line(wallet: &Wallet) -> String {
    format!(
        "Balance: {}",
        format_amount(wallet.balance_minor_units as f64, &wallet.currency_label)
    )
}

/// One line per meter event
pub fn event_line(event: &MeterEvent, label: &str) -> String {
    match event {
        MeterEvent::Started {
            session_id,
            initial_balance,
            rate_per_minute,
        } => format!(
            "Session {} started with {} at {}/min",
            session_id,
            format_amount(*initial_balance as f64, label),
            rate_per_minute
        ),
        MeterEvent::Tick {
            elapsed_seconds,
            projected_balance,
        } => format!(
            "[{}] {} left",
            format_elapsed(*elapsed_seconds),
            format_amount(*projected_balance, label)
        ),
        MeterEvent::LowBalance {
            elapsed_seconds,
            projected_balance,
        } => format!(
            "[{}] Low balance: less than one minute left ({})",
            format_elapsed(*elapsed_seconds),
            format_amount(*projected_balance, label)
        ),
        MeterEvent::Exhausted { elapsed_seconds } => format!(
            "[{}] Balance exhausted, session ended",
            format_elapsed(*elapsed_seconds)
        ),
        MeterEvent::Stopped {
            elapsed_seconds,
            projected_balance,
        } => format!(
            "[{}] Session ended with {} left",
            format_elapsed(*elapsed_seconds),
            format_amount(*projected_balance, label)
        ),
    }
}

/// Closing summary for a finished session
pub fn summary(snapshot: &MeterSnapshot, label: &str) -> String {
    let how = match snapshot.state {
        MeterState::Exhausted => "exhausted",
        MeterState::Stopped => "ended",
        MeterState::Idle => "never started",
        MeterState::Running => "running",
    };
    format!(
        "Session {}: {} at {}/min, {} of {} {} remaining",
        how,
        format_elapsed(snapshot.elapsed_seconds),
        snapshot.rate_per_minute,
        snapshot.whole_balance(),
        snapshot.initial_balance,
        label
    )
}

/// Settlement result
pub fn settlement_line(settlement: &Settlement, label: &str) -> String {
    format!(
        "Charged {}: {} -> {}",
        format_amount(settlement.charged_minor_units as f64, label),
        format_amount(settlement.balance_before as f64, label),
        format_amount(settlement.balance_after as f64, label)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use callmeter_core::SessionMeter;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_format_elapsed() {
        assert_eq!(format_elapsed(0), "00:00:00");
        assert_eq!(format_elapsed(91), "00:01:31");
        assert_eq!(format_elapsed(3_661), "01:01:01");
    }

    #[test]
    fn test_format_amount() {
        assert_eq!(format_amount(198.183_333, "credits"), "198.18 credits");
        assert_eq!(format_amount(0.0, "USD"), "0.00 USD");
    }

    #[test]
    fn test_wallet_line() {
        assert_eq!(
            wallet_line(&Wallet::new(500, "credits")),
            "Balance: 500.00 credits"
        );
    }

    #[test]
    fn test_event_lines() {
        let tick = MeterEvent::Tick {
            elapsed_seconds: 60,
            projected_balance: 301.0,
        };
        assert_eq!(event_line(&tick, "credits"), "[00:01:00] 301.00 credits left");

        let low = MeterEvent::LowBalance {
            elapsed_seconds: 91,
            projected_balance: 198.183,
        };
        assert_eq!(
            event_line(&low, "credits"),
            "[00:01:31] Low balance: less than one minute left (198.18 credits)"
        );

        let exhausted = MeterEvent::Exhausted {
            elapsed_seconds: 151,
        };
        assert_eq!(
            event_line(&exhausted, "credits"),
            "[00:02:31] Balance exhausted, session ended"
        );
    }

    #[test]
    fn test_summary_shows_whole_units() {
        let mut meter = SessionMeter::new(199).unwrap();
        meter.join(500).unwrap();
        for _ in 0..91 {
            meter.tick();
        }
        meter.end();
        let snapshot = meter.snapshot();
        assert!(snapshot.projected_balance > 198.0);
        assert_eq!(
            summary(&snapshot, "credits"),
            "Session ended: 00:01:31 at 199/min, 198 of 500 credits remaining"
        );
    }

    #[test]
    fn test_settlement_line() {
        let settlement = Settlement {
            charged_minor_units: 199,
            balance_before: 500,
            balance_after: 301,
        };
        assert_eq!(
            settlement_line(&settlement, "credits"),
            "Charged 199.00 credits: 500.00 credits -> 301.00 credits"
        );
    }
}
