//! Household-local calendar helpers.
//!
//! Timestamps are stored in UTC; "today" and "early morning" are judged in the
//! household's fixed offset so results do not depend on the host timezone.

use chrono::{
    DateTime, Datelike, FixedOffset, NaiveDate, Offset, SecondsFormat, SubsecRound, Timelike, Utc, Weekday,
};

/// Build an offset from minutes east of UTC, clamped to the valid range.
pub fn offset_from_minutes(minutes: i32) -> FixedOffset {
    let seconds = minutes.clamp(-(23 * 60 + 59), 23 * 60 + 59) * 60;
    FixedOffset::east_opt(seconds).unwrap_or(Utc.fix())
}

pub fn local_date(at: DateTime<Utc>, offset: FixedOffset) -> NaiveDate {
    at.with_timezone(&offset).date_naive()
}

pub fn local_hour(at: DateTime<Utc>, offset: FixedOffset) -> u32 {
    at.with_timezone(&offset).hour()
}

pub fn local_weekday(at: DateTime<Utc>, offset: FixedOffset) -> Weekday {
    at.with_timezone(&offset).weekday()
}

/// Fixed-width storage form; lexical order equals chronological order.
pub fn to_storage(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Drop precision the storage form cannot hold.
pub fn storage_precision(at: DateTime<Utc>) -> DateTime<Utc> {
    at.trunc_subsecs(6)
}

pub fn from_storage(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}
