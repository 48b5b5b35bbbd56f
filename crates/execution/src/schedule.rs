// In crates/execution/src/schedule.rs

use chrono::{DateTime, Duration, Utc};

/// When the host should wake up and evaluate open orders again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reschedule {
    pub next_wake: DateTime<Utc>,
    /// Whether the decision was taken with the market open.
    pub market_open: bool,
}

impl Reschedule {
    /// Time left until `next_wake`, zero if it already passed.
    pub fn delay_from(&self, now: DateTime<Utc>) -> std::time::Duration {
        (self.next_wake - now).to_std().unwrap_or_default()
    }
}

/// Open market: poll again after `poll_interval`. Closed: wait for the open.
pub fn reschedule(
    market_open: bool,
    now: DateTime<Utc>,
    poll_interval: Duration,
    next_open: DateTime<Utc>,
) -> Reschedule {
    let next_wake = if market_open { now + poll_interval } else { next_open };
    Reschedule { next_wake, market_open }
}

/// Polling is only worth keeping alive while some order is still open.
pub fn should_reschedule(open_orders: usize) -> bool {
    open_orders > 0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn open_market_polls_after_interval() {
        let now = at("2024-01-10T15:00:00Z");
        let next = reschedule(true, now, Duration::seconds(60), at("2024-01-11T14:30:00Z"));
        assert_eq!(next.next_wake, at("2024-01-10T15:01:00Z"));
        assert!(next.market_open);
        assert_eq!(next.delay_from(now), std::time::Duration::from_secs(60));
    }

    #[test]
    fn closed_market_waits_for_open() {
        let now = at("2024-01-12T22:00:00Z");
        let open = at("2024-01-15T14:30:00Z");
        let next = reschedule(false, now, Duration::seconds(60), open);
        assert_eq!(next.next_wake, open);
        assert_eq!(next.delay_from(open + Duration::seconds(5)), std::time::Duration::ZERO);
    }

    #[test]
    fn reschedules_only_with_open_orders() {
        assert!(!should_reschedule(0));
        assert!(should_reschedule(3));
    }
}
