//! Conversions between chrono values and the epoch-relative integers used on the wire.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta, TimeZone, Timelike};

pub const MILLIS_PER_DAY: i64 = 86_400_000;

fn epoch_date() -> NaiveDate {
    NaiveDate::default()
}

/// Shift an instant by its zone offset so the wall-clock reading is stored as if it were UTC.
pub fn chronon_adjusted<Tz: TimeZone>(instant: &DateTime<Tz>) -> i64 {
    let offset_secs = instant.fixed_offset().offset().local_minus_utc();
    instant.timestamp_millis() + i64::from(offset_secs) * 1000
}

/// Whole days, truncated toward zero.
pub fn truncate_to_days(millis: i64) -> i64 {
    millis / MILLIS_PER_DAY
}

/// Remainder after removing whole days; negative before the epoch.
pub fn time_of_day_millis(millis: i64) -> i64 {
    millis - truncate_to_days(millis) * MILLIS_PER_DAY
}

pub fn days_since_epoch(date: NaiveDate) -> i64 {
    date.signed_duration_since(epoch_date()).num_days()
}

pub fn date_from_days(days: i64) -> Option<NaiveDate> {
    epoch_date().checked_add_signed(TimeDelta::try_days(days)?)
}

pub fn millis_of_day(time: NaiveTime) -> i64 {
    i64::from(time.num_seconds_from_midnight()) * 1000 + i64::from(time.nanosecond() / 1_000_000)
}

pub fn time_from_millis(millis: i64) -> Option<NaiveTime> {
    let millis = millis.rem_euclid(MILLIS_PER_DAY);
    let secs = u32::try_from(millis / 1000).ok()?;
    let nanos = u32::try_from(millis % 1000).ok()? * 1_000_000;
    NaiveTime::from_num_seconds_from_midnight_opt(secs, nanos)
}

/// Zone-naive datetimes are taken as UTC.
pub fn datetime_millis(datetime: NaiveDateTime) -> i64 {
    datetime.and_utc().timestamp_millis()
}

pub fn datetime_from_millis(millis: i64) -> Option<NaiveDateTime> {
    DateTime::from_timestamp_millis(millis).map(|dt| dt.naive_utc())
}

/// ISO-8601 rendering of a composite duration, e.g. `P1Y2MT3.5S`.
pub fn format_duration(months: i32, millis: i64) -> String {
    if months == 0 && millis == 0 {
        return "PT0S".to_string();
    }
    let negative = months < 0 || (months == 0 && millis < 0);
    let months = i64::from(months).unsigned_abs();
    let millis = millis.unsigned_abs();

    let mut out = String::new();
    if negative {
        out.push('-');
    }
    out.push('P');
    let (years, months) = (months / 12, months % 12);
    if years > 0 {
        out.push_str(&format!("{}Y", years));
    }
    if months > 0 {
        out.push_str(&format!("{}M", months));
    }
    let day = MILLIS_PER_DAY.unsigned_abs();
    let days = millis / day;
    if days > 0 {
        out.push_str(&format!("{}D", days));
    }
    let rest = millis % day;
    if rest > 0 {
        out.push('T');
        let hours = rest / 3_600_000;
        let minutes = rest % 3_600_000 / 60_000;
        let seconds = rest % 60_000 / 1000;
        let fraction = rest % 1000;
        if hours > 0 {
            out.push_str(&format!("{}H", hours));
        }
        if minutes > 0 {
            out.push_str(&format!("{}M", minutes));
        }
        if fraction > 0 {
            out.push_str(&format!("{}.{:03}S", seconds, fraction));
        } else if seconds > 0 {
            out.push_str(&format!("{}S", seconds));
        }
    }
    out
}
