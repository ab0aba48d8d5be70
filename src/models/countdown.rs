use chrono::{DateTime, Utc};
use serde::Serialize;

const MS_PER_SECOND: i64 = 1000;
const MS_PER_MINUTE: i64 = 60 * MS_PER_SECOND;
const MS_PER_HOUR: i64 = 60 * MS_PER_MINUTE;
const MS_PER_DAY: i64 = 24 * MS_PER_HOUR;

/// Time remaining until a contest starts, or until it ends while live
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Countdown {
    pub days: i64,
    pub hours: i64,
    pub minutes: i64,
    pub seconds: i64,
    /// Upcoming and less than a day away
    pub is_starting_soon: bool,
    /// Between start (inclusive) and end (exclusive)
    pub is_live: bool,
}

impl Countdown {
    /// Derive the countdown from the contest window and the current time
    pub fn compute(start: DateTime<Utc>, end: DateTime<Utc>, now: DateTime<Utc>) -> Self {
        if now >= start && now < end {
            let remaining = end.signed_duration_since(now).num_milliseconds();
            // Days stay at zero while live; hours wrap at one day.
            return Self {
                days: 0,
                hours: (remaining % MS_PER_DAY) / MS_PER_HOUR,
                minutes: (remaining % MS_PER_HOUR) / MS_PER_MINUTE,
                seconds: (remaining % MS_PER_MINUTE) / MS_PER_SECOND,
                is_starting_soon: false,
                is_live: true,
            };
        }

        let difference = start.signed_duration_since(now).num_milliseconds();
        if difference <= 0 {
            return Self::default();
        }

        Self {
            days: difference / MS_PER_DAY,
            hours: (difference % MS_PER_DAY) / MS_PER_HOUR,
            minutes: (difference % MS_PER_HOUR) / MS_PER_MINUTE,
            seconds: (difference % MS_PER_MINUTE) / MS_PER_SECOND,
            is_starting_soon: difference < MS_PER_DAY,
            is_live: false,
        }
    }

    /// Whether the contest window is over
    pub fn is_ended(&self) -> bool {
        *self == Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_live_contest() {
        let now = now();
        let countdown = Countdown::compute(
            now - Duration::seconds(10),
            now + Duration::seconds(3600),
            now,
        );

        assert!(countdown.is_live);
        assert!(!countdown.is_starting_soon);
        assert_eq!(countdown.days, 0);
        assert_eq!(countdown.hours, 0);
        assert_eq!(countdown.minutes, 59);
        assert_eq!(countdown.seconds, 50);
    }

    #[test]
    fn test_live_contest_longer_than_a_day_keeps_days_at_zero() {
        let now = now();
        let countdown = Countdown::compute(
            now - Duration::hours(1),
            now + Duration::hours(26),
            now,
        );

        assert!(countdown.is_live);
        assert_eq!(countdown.days, 0);
        assert_eq!(countdown.hours, 2);
    }

    #[test]
    fn test_starting_soon_boundary() {
        let now = now();

        let in_two_days = Countdown::compute(
            now + Duration::days(2),
            now + Duration::days(2) + Duration::hours(2),
            now,
        );
        assert!(!in_two_days.is_starting_soon);
        assert_eq!(in_two_days.days, 2);

        let in_23_hours = Countdown::compute(
            now + Duration::hours(23),
            now + Duration::hours(25),
            now,
        );
        assert!(in_23_hours.is_starting_soon);
        assert!(!in_23_hours.is_live);
        assert_eq!(in_23_hours.days, 0);
        assert_eq!(in_23_hours.hours, 23);
    }

    #[test]
    fn test_upcoming_decomposition() {
        let now = now();
        let start = now
            + Duration::days(3)
            + Duration::hours(4)
            + Duration::minutes(5)
            + Duration::seconds(6)
            + Duration::milliseconds(700);

        let countdown = Countdown::compute(start, start + Duration::hours(2), now);
        assert_eq!(
            (countdown.days, countdown.hours, countdown.minutes, countdown.seconds),
            (3, 4, 5, 6)
        );
    }

    #[test]
    fn test_ended_contest() {
        let now = now();
        let countdown = Countdown::compute(
            now - Duration::hours(3),
            now - Duration::hours(1),
            now,
        );

        assert_eq!(countdown, Countdown::default());
        assert!(countdown.is_ended());
        assert!(!countdown.is_live);
        assert!(!countdown.is_starting_soon);
    }
}
