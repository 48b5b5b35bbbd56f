// In crates/market-data/src/clock.rs

use crate::{Error, MarketClock, Result};
use app_config::MarketSettings;
use chrono::{DateTime, Datelike, Duration, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc, Weekday};
use std::sync::{Mutex, PoisonError};

/// Opening hours of an exchange in its local time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarketHours {
    pub open: NaiveTime,
    pub close: NaiveTime,
    pub utc_offset: FixedOffset,
    /// Polling starts this long before `open`.
    pub pre_open_buffer: Duration,
    /// Polling continues this long after `close`.
    pub post_close_buffer: Duration,
}

impl MarketHours {
    /// Builds the hours from the `[market]` settings block.
    pub fn from_settings(settings: &MarketSettings) -> Result<Self> {
        let open = parse_time(&settings.open_time)?;
        let close = parse_time(&settings.close_time)?;
        if open >= close {
            return Err(Error::InvalidSchedule(format!(
                "open time {} is not before close time {}",
                open, close
            )));
        }
        let utc_offset = FixedOffset::east_opt(settings.utc_offset_minutes * 60).ok_or_else(|| {
            Error::InvalidSchedule(format!("utc offset {} minutes is out of range", settings.utc_offset_minutes))
        })?;

        Ok(Self {
            open,
            close,
            utc_offset,
            pre_open_buffer: Duration::minutes(settings.pre_open_buffer_minutes.max(0)),
            post_close_buffer: Duration::minutes(settings.post_close_buffer_minutes.max(0)),
        })
    }

    /// Weekends are always closed.
    pub fn is_trading_day(&self, date: NaiveDate) -> bool {
        !matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
    }

    fn local(&self, instant: DateTime<Utc>) -> NaiveDateTime {
        instant.with_timezone(&self.utc_offset).naive_local()
    }

    fn to_utc(&self, local: NaiveDateTime) -> DateTime<Utc> {
        let utc = local - Duration::seconds(i64::from(self.utc_offset.local_minus_utc()));
        Utc.from_utc_datetime(&utc)
    }

    pub fn is_open_at(&self, instant: DateTime<Utc>) -> bool {
        let local = self.local(instant);
        self.is_trading_day(local.date()) && local.time() >= self.open && local.time() < self.close
    }

    pub fn is_in_poll_time_at(&self, instant: DateTime<Utc>) -> bool {
        let local = self.local(instant);
        if !self.is_trading_day(local.date()) {
            return false;
        }
        let start = local.date().and_time(self.open) - self.pre_open_buffer;
        let end = local.date().and_time(self.close) + self.post_close_buffer;
        local >= start && local <= end
    }

    /// The first session open strictly after `instant`.
    pub fn next_open_after(&self, instant: DateTime<Utc>) -> DateTime<Utc> {
        let mut date = self.local(instant).date();
        // At most two weekend days sit between sessions.
        for _ in 0..8 {
            if self.is_trading_day(date) {
                let open = self.to_utc(date.and_time(self.open));
                if open > instant {
                    return open;
                }
            }
            date = date.succ_opt().unwrap_or(date);
        }
        self.to_utc(date.and_time(self.open))
    }

    /// Start of the poll window ahead of the first open after `instant`.
    pub fn next_poll_start_after(&self, instant: DateTime<Utc>) -> DateTime<Utc> {
        self.next_open_after(instant) - self.pre_open_buffer
    }

    /// Whether both instants fall on the same local calendar day.
    pub fn same_day(&self, a: DateTime<Utc>, b: DateTime<Utc>) -> bool {
        self.local(a).date() == self.local(b).date()
    }
}

fn parse_time(value: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(value.trim(), "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(value.trim(), "%H:%M:%S"))
        .map_err(|e| Error::InvalidSchedule(format!("bad time '{}': {}", value, e)))
}

#[derive(Debug)]
enum NowSource {
    System,
    Pinned(Mutex<DateTime<Utc>>),
}

/// A [`MarketClock`] driven by [`MarketHours`].
///
/// The current time is either the system clock or a pinned instant that can be
/// moved by hand, which is what replays and tests use.
#[derive(Debug)]
pub struct SessionClock {
    hours: MarketHours,
    now: NowSource,
}

impl SessionClock {
    pub fn new(hours: MarketHours) -> Self {
        Self { hours, now: NowSource::System }
    }

    pub fn pinned(hours: MarketHours, now: DateTime<Utc>) -> Self {
        Self {
            hours,
            now: NowSource::Pinned(Mutex::new(now)),
        }
    }

    pub fn from_settings(settings: &MarketSettings) -> Result<Self> {
        Ok(Self::new(MarketHours::from_settings(settings)?))
    }

    /// Moves a pinned clock. Has no effect on a system clock.
    pub fn set_now(&self, now: DateTime<Utc>) {
        if let NowSource::Pinned(pinned) = &self.now {
            *pinned.lock().unwrap_or_else(PoisonError::into_inner) = now;
        }
    }
}

impl MarketClock for SessionClock {
    fn now(&self) -> DateTime<Utc> {
        match &self.now {
            NowSource::System => Utc::now(),
            NowSource::Pinned(pinned) => *pinned.lock().unwrap_or_else(PoisonError::into_inner),
        }
    }

    fn is_market_open(&self) -> bool {
        self.hours.is_open_at(self.now())
    }

    fn is_in_poll_time(&self) -> bool {
        self.hours.is_in_poll_time_at(self.now())
    }

    fn next_market_open(&self) -> DateTime<Utc> {
        self.hours.next_open_after(self.now())
    }

    fn next_poll_start(&self) -> DateTime<Utc> {
        self.hours.next_poll_start_after(self.now())
    }

    fn is_today(&self, timestamp: DateTime<Utc>) -> bool {
        self.hours.same_day(timestamp, self.now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> MarketSettings {
        MarketSettings {
            open_time: "09:30".to_string(),
            close_time: "16:00".to_string(),
            utc_offset_minutes: -300,
            pre_open_buffer_minutes: 0,
            post_close_buffer_minutes: 15,
        }
    }

    fn utc(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn open_during_session_on_weekdays() {
        let hours = MarketHours::from_settings(&settings()).unwrap();
        // Wednesday 2024-01-10, 10:00 New York.
        assert!(hours.is_open_at(utc("2024-01-10T15:00:00Z")));
        // 09:29 local.
        assert!(!hours.is_open_at(utc("2024-01-10T14:29:00Z")));
        // Close is exclusive.
        assert!(!hours.is_open_at(utc("2024-01-10T21:00:00Z")));
        // Saturday.
        assert!(!hours.is_open_at(utc("2024-01-13T15:00:00Z")));
    }

    #[test]
    fn poll_time_extends_past_close() {
        let hours = MarketHours::from_settings(&settings()).unwrap();
        assert!(hours.is_in_poll_time_at(utc("2024-01-10T21:10:00Z")));
        assert!(!hours.is_in_poll_time_at(utc("2024-01-10T21:16:00Z")));
        assert!(!hours.is_in_poll_time_at(utc("2024-01-13T21:10:00Z")));
    }

    #[test]
    fn next_open_skips_weekend() {
        let hours = MarketHours::from_settings(&settings()).unwrap();
        // Friday after close -> Monday open.
        assert_eq!(
            hours.next_open_after(utc("2024-01-12T22:00:00Z")),
            utc("2024-01-15T14:30:00Z")
        );
        // Tuesday before open -> same day.
        assert_eq!(
            hours.next_open_after(utc("2024-01-09T12:00:00Z")),
            utc("2024-01-09T14:30:00Z")
        );
        // During the session -> next day.
        assert_eq!(
            hours.next_open_after(utc("2024-01-09T15:00:00Z")),
            utc("2024-01-10T14:30:00Z")
        );
    }

    #[test]
    fn poll_window_opens_before_the_session() {
        let mut s = settings();
        s.pre_open_buffer_minutes = 30;
        let clock = SessionClock::pinned(
            MarketHours::from_settings(&s).unwrap(),
            // 08:00 New York.
            utc("2024-01-10T13:00:00Z"),
        );
        assert!(!clock.is_in_poll_time());
        assert_eq!(clock.next_market_open(), utc("2024-01-10T14:30:00Z"));
        assert_eq!(clock.next_poll_start(), utc("2024-01-10T14:00:00Z"));

        clock.set_now(utc("2024-01-10T14:05:00Z"));
        assert!(clock.is_in_poll_time());
        assert!(!clock.is_market_open());
    }

    #[test]
    fn today_uses_exchange_calendar() {
        // 23:30 local on the 10th is already the 11th in UTC.
        let clock = SessionClock::pinned(
            MarketHours::from_settings(&settings()).unwrap(),
            utc("2024-01-11T04:30:00Z"),
        );
        assert!(clock.is_today(utc("2024-01-10T15:00:00Z")));
        assert!(!clock.is_today(utc("2024-01-09T15:00:00Z")));

        clock.set_now(utc("2024-01-11T15:00:00Z"));
        assert!(!clock.is_today(utc("2024-01-10T15:00:00Z")));
        assert!(clock.is_market_open());
    }

    #[test]
    fn rejects_inverted_schedule() {
        let mut s = settings();
        s.open_time = "17:00".to_string();
        assert!(matches!(MarketHours::from_settings(&s), Err(Error::InvalidSchedule(_))));
        s.open_time = "nine".to_string();
        assert!(matches!(MarketHours::from_settings(&s), Err(Error::InvalidSchedule(_))));
    }
}
