use std::fmt;

use chrono::{DateTime, FixedOffset, Local, NaiveDateTime, NaiveTime, Offset, TimeDelta, TimeZone};

use crate::calendar::format_wire_datetime;

/// Source of "now" for computing the current day. Injected so tests can
/// pin the date and offset.
pub trait Clock: Send + Sync + fmt::Debug {
    fn now(&self) -> DateTime<FixedOffset>;

    fn today(&self) -> DayWindow {
        DayWindow::containing(&self.now())
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<FixedOffset> {
        Local::now().fixed_offset()
    }

    // Resolved against the local zone so each boundary carries the offset
    // in effect at that instant, not the offset of "now".
    fn today(&self) -> DayWindow {
        DayWindow::containing(&Local::now())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<FixedOffset>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<FixedOffset> {
        self.0
    }
}

/// First and last second of one local calendar day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayWindow {
    pub start: DateTime<FixedOffset>,
    pub end: DateTime<FixedOffset>,
}

impl DayWindow {
    pub fn containing<Tz: TimeZone>(now: &DateTime<Tz>) -> Self {
        let tz = now.timezone();
        let fallback = now.offset().fix();
        let midnight = now.date_naive().and_time(NaiveTime::MIN);
        let last_second = midnight + TimeDelta::seconds(86_399);

        Self {
            start: resolve_local(&tz, &midnight, fallback, true),
            end: resolve_local(&tz, &last_second, fallback, false),
        }
    }

    pub fn offset(&self) -> FixedOffset {
        *self.start.offset()
    }

    pub fn time_min(&self) -> String {
        format_wire_datetime(&self.start)
    }

    pub fn time_max(&self) -> String {
        format_wire_datetime(&self.end)
    }
}

fn resolve_local<Tz: TimeZone>(
    tz: &Tz,
    local: &NaiveDateTime,
    fallback: FixedOffset,
    earliest: bool,
) -> DateTime<FixedOffset> {
    let mapped = tz.from_local_datetime(local);
    let resolved = if earliest { mapped.earliest() } else { mapped.latest() };

    match resolved {
        Some(value) => value.fixed_offset(),
        // Local time falls in a DST gap.
        None => fallback
            .from_local_datetime(local)
            .single()
            .unwrap_or_else(|| fallback.from_utc_datetime(local)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};
    use proptest::prelude::*;

    fn at(value: &str) -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339(value).unwrap()
    }

    #[test]
    fn window_spans_local_day_of_fixed_clock() {
        let clock = FixedClock(at("2024-03-15T10:00:00-07:00"));

        let window = clock.today();

        assert_eq!(window.time_min(), "2024-03-15T00:00:00-07:00");
        assert_eq!(window.time_max(), "2024-03-15T23:59:59-07:00");
    }

    #[test]
    fn window_uses_local_date_not_utc_date() {
        // 23:30 local is already the next day in UTC.
        let clock = FixedClock(at("2024-03-15T23:30:00-07:00"));

        let window = clock.today();

        assert_eq!(window.time_min(), "2024-03-15T00:00:00-07:00");
        assert_eq!(window.time_max(), "2024-03-15T23:59:59-07:00");
    }

    #[test]
    fn window_at_midnight_includes_midnight() {
        let now = at("2024-03-15T00:00:00+05:30");

        let window = DayWindow::containing(&now);

        assert_eq!(window.start, now);
        assert_eq!(window.offset(), FixedOffset::east_opt(5 * 3600 + 1800).unwrap());
    }

    #[test]
    fn system_clock_window_contains_now() {
        let clock = SystemClock;

        let window = clock.today();
        let now = clock.now();

        assert!(window.start <= now);
        assert!(now <= window.end + TimeDelta::seconds(1));
    }

    proptest! {
        #[test]
        fn window_brackets_now_on_same_local_date(
            secs in 0i64..4_102_444_800,
            quarter_hours in -48i32..=56,
        ) {
            let offset = FixedOffset::east_opt(quarter_hours * 900).unwrap();
            let now = offset.timestamp_opt(secs, 0).unwrap();

            let window = DayWindow::containing(&now);

            prop_assert_eq!(window.start.date_naive(), now.date_naive());
            prop_assert_eq!(window.end.date_naive(), now.date_naive());
            prop_assert_eq!((window.start.hour(), window.start.minute(), window.start.second()), (0, 0, 0));
            prop_assert_eq!((window.end.hour(), window.end.minute(), window.end.second()), (23, 59, 59));
            prop_assert_eq!(*window.start.offset(), offset);
            prop_assert_eq!(*window.end.offset(), offset);
            prop_assert!(window.start <= now && now <= window.end);
            prop_assert_eq!(window.start.day(), now.day());
        }
    }
}
