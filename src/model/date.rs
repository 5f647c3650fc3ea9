use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime};
use serde::Serializer;

use crate::error::{Result, ToolError};

/// Date stamp of 1970-01-01 in the spreadsheet serial convention.
pub const UNIX_EPOCH_STAMP: i64 = 25569;

const MAX_DAY_OFFSET: f64 = 3_000_000.0;
const MILLIS_PER_DAY: f64 = 86_400_000.0;

const DAYS: [&str; 7] = [
    "Sunday",
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
];

const MONTHS: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

/// Converts a spreadsheet date stamp into a UTC timestamp. The fractional
/// part is the time of day, truncated to whole milliseconds.
pub fn stamp_to_datetime(stamp: f64) -> Result<NaiveDateTime> {
    let out_of_range = || ToolError::InvalidCell {
        location: "date stamp".to_string(),
        reason: format!("{stamp} is not a usable date"),
    };
    let days = stamp - UNIX_EPOCH_STAMP as f64;
    if !days.is_finite() || days.abs() > MAX_DAY_OFFSET {
        return Err(out_of_range());
    }

    let millis = (days * MILLIS_PER_DAY).trunc() as i64;
    NaiveDate::from_ymd_opt(1970, 1, 1)
        .and_then(|epoch| epoch.and_hms_opt(0, 0, 0))
        .and_then(|epoch| epoch.checked_add_signed(Duration::milliseconds(millis)))
        .ok_or_else(out_of_range)
}

pub fn weekday_name(date: NaiveDate) -> &'static str {
    DAYS[date.weekday().num_days_from_sunday() as usize]
}

pub fn month_name(date: NaiveDate) -> &'static str {
    MONTHS[date.month0() as usize]
}

/// `Monday, November 4, 2019`
pub fn long_date(date: NaiveDate) -> String {
    format!(
        "{}, {} {}, {}",
        weekday_name(date),
        month_name(date),
        date.day(),
        date.year()
    )
}

/// `11/4`, without zero padding.
pub fn month_day(date: NaiveDate) -> String {
    format!("{}/{}", date.month(), date.day())
}

/// `2019-11-04`
pub fn iso_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Writes the timestamp in UTC ISO form, `2019-11-04T18:00:00.000Z`.
pub(crate) fn serialize_timestamp<S: Serializer>(
    timestamp: &NaiveDateTime,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_str(&timestamp.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string())
}
