//! # WIB
//!
//! Western Indonesia Time (UTC+7). Every date-triggered rule of the shop,
//! such as the monthly site lock or the order code day, is evaluated on the
//! WIB calendar regardless of where the server runs.
use std::fmt;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime, TimeDelta, Utc};
use serde::Serialize;

pub const WIB_OFFSET_SECS: i32 = 7 * 60 * 60;

pub fn wib() -> FixedOffset {
    FixedOffset::east_opt(WIB_OFFSET_SECS).expect("UTC+7 is a valid offset")
}

pub fn now_wib() -> DateTime<FixedOffset> {
    to_wib(Utc::now())
}

pub fn to_wib(at: DateTime<Utc>) -> DateTime<FixedOffset> {
    at.with_timezone(&wib())
}

/// Midnight at the start of `date` on the WIB calendar.
pub fn wib_midnight(date: NaiveDate) -> DateTime<Utc> {
    let local = date.and_time(NaiveTime::MIN);
    (local - TimeDelta::seconds(WIB_OFFSET_SECS as i64)).and_utc()
}

/// `YYYY-MM` of the WIB month containing `at`.
pub fn month_key(at: DateTime<Utc>) -> String {
    to_wib(at).format("%Y-%m").to_string()
}

/// `YYMMDD` of the WIB day containing `at`.
pub fn day_code(at: DateTime<Utc>) -> String {
    to_wib(at).format("%y%m%d").to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Countdown {
    pub days: i64,
    pub hours: i64,
    pub minutes: i64,
    pub seconds: i64,
    pub total_seconds: i64,
}

impl Countdown {
    pub fn expired(&self) -> bool {
        self.total_seconds == 0
    }
}

impl fmt::Display for Countdown {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}d {:02}:{:02}:{:02}",
            self.days, self.hours, self.minutes, self.seconds
        )
    }
}

pub fn countdown(now: DateTime<Utc>, target: DateTime<Utc>) -> Countdown {
    let total_seconds = (target - now).num_seconds().max(0);

    Countdown {
        days: total_seconds / 86_400,
        hours: (total_seconds % 86_400) / 3_600,
        minutes: (total_seconds % 3_600) / 60,
        seconds: total_seconds % 60,
        total_seconds,
    }
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, TimeZone, Utc};

    use super::*;

    #[test]
    fn test_wib_midnight_is_previous_utc_evening() {
        let date = NaiveDate::from_ymd_opt(2026, 10, 25).unwrap();
        assert_eq!(
            wib_midnight(date),
            Utc.with_ymd_and_hms(2026, 10, 24, 17, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_now_wib_offset() {
        assert_eq!(now_wib().offset().local_minus_utc(), WIB_OFFSET_SECS);
    }

    #[test]
    fn test_month_key_rolls_over_in_wib() {
        // 18:00 UTC on the last day is already the next month in WIB.
        let at = Utc.with_ymd_and_hms(2026, 10, 31, 18, 0, 0).unwrap();
        assert_eq!(month_key(at), "2026-11");
        assert_eq!(day_code(at), "261101");
    }

    #[test]
    fn test_countdown_breakdown() {
        let now = Utc.with_ymd_and_hms(2026, 10, 19, 0, 0, 0).unwrap();
        let target = Utc.with_ymd_and_hms(2026, 10, 22, 4, 5, 6).unwrap();

        let left = countdown(now, target);
        assert_eq!((left.days, left.hours, left.minutes, left.seconds), (3, 4, 5, 6));
        assert_eq!(left.to_string(), "3d 04:05:06");
        assert!(!left.expired());
    }

    #[test]
    fn test_countdown_past_target_is_zero() {
        let now = Utc.with_ymd_and_hms(2026, 10, 19, 0, 0, 0).unwrap();
        let target = Utc.with_ymd_and_hms(2026, 10, 18, 0, 0, 0).unwrap();

        let left = countdown(now, target);
        assert!(left.expired());
        assert_eq!(left.to_string(), "0d 00:00:00");
    }
}
