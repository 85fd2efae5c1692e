/*!
 Contains date parsing functions for CIM `datetime` values.

 Values use the DMTF fixed-width text form:

 - Timestamps: `yyyymmddHHMMSS.mmmmmmsUUU`, where `s` is `+` or `-` and `UUU` is the UTC offset in minutes
 - Intervals: `ddddddddHHMMSS.mmmmmm:000`
*/

use std::ops::Range;

use chrono::{FixedOffset, NaiveDate, NaiveTime, TimeDelta};

use crate::mof::models::CimDateTime;

/// Length of every DMTF datetime string
pub const DMTF_LENGTH: usize = 25;

/// Parse a DMTF datetime string, returning the reason it was rejected on failure
pub fn parse_dmtf(text: &str) -> Result<CimDateTime, &'static str> {
    if text.len() != DMTF_LENGTH || !text.is_ascii() {
        return Err("expected 25 ASCII characters");
    }
    let bytes = text.as_bytes();
    if bytes.contains(&b'*') {
        return Err("wildcard fields are not supported");
    }
    if bytes[14] != b'.' {
        return Err("missing `.` before microseconds");
    }
    match bytes[21] {
        b':' => parse_interval(text),
        b'+' | b'-' => parse_timestamp(text, bytes[21] == b'-'),
        _ => Err("unknown UTC offset sign"),
    }
}

fn digits(text: &str, range: Range<usize>) -> Result<u32, &'static str> {
    text.get(range)
        .filter(|field| field.bytes().all(|b| b.is_ascii_digit()))
        .and_then(|field| field.parse().ok())
        .ok_or("non-digit in numeric field")
}

fn parse_timestamp(text: &str, west: bool) -> Result<CimDateTime, &'static str> {
    let year = digits(text, 0..4)?;
    let month = digits(text, 4..6)?;
    let day = digits(text, 6..8)?;
    let hour = digits(text, 8..10)?;
    let minute = digits(text, 10..12)?;
    let second = digits(text, 12..14)?;
    let micros = digits(text, 15..21)?;
    let offset_minutes = digits(text, 22..25)? as i32;

    let offset_seconds = offset_minutes * 60;
    let zone = if west {
        FixedOffset::west_opt(offset_seconds)
    } else {
        FixedOffset::east_opt(offset_seconds)
    }
    .ok_or("UTC offset out of range")?;

    let date = NaiveDate::from_ymd_opt(year as i32, month, day).ok_or("invalid calendar date")?;
    // Leap seconds are not representable in the DMTF form
    if second > 59 {
        return Err("invalid time of day");
    }
    let time = NaiveTime::from_hms_micro_opt(hour, minute, second, micros)
        .ok_or("invalid time of day")?;

    date.and_time(time)
        .and_local_timezone(zone)
        .single()
        .map(CimDateTime::Timestamp)
        .ok_or("ambiguous local time")
}

fn parse_interval(text: &str) -> Result<CimDateTime, &'static str> {
    let days = digits(text, 0..8)?;
    let hours = digits(text, 8..10)?;
    let minutes = digits(text, 10..12)?;
    let seconds = digits(text, 12..14)?;
    let micros = digits(text, 15..21)?;
    if text.get(22..25) != Some("000") {
        return Err("interval must end with `:000`");
    }
    if hours > 23 || minutes > 59 || seconds > 59 {
        return Err("interval field out of range");
    }

    let delta = TimeDelta::try_days(days as i64)
        .and_then(|delta| delta.checked_add(&TimeDelta::try_hours(hours as i64)?))
        .and_then(|delta| delta.checked_add(&TimeDelta::try_minutes(minutes as i64)?))
        .and_then(|delta| delta.checked_add(&TimeDelta::try_seconds(seconds as i64)?))
        .and_then(|delta| delta.checked_add(&TimeDelta::microseconds(micros as i64)))
        .ok_or("interval out of range")?;
    Ok(CimDateTime::Interval(delta))
}

/// Render a value back into the DMTF text form, used for display
pub fn format_dmtf(value: &CimDateTime) -> String {
    match value {
        CimDateTime::Timestamp(stamp) => {
            let offset_minutes = stamp.offset().local_minus_utc() / 60;
            format!("{}{offset_minutes:+04}", stamp.format("%Y%m%d%H%M%S.%6f"))
        }
        CimDateTime::Interval(delta) => {
            let micros = delta.subsec_nanos() / 1_000;
            format!(
                "{:08}{:02}{:02}{:02}.{micros:06}:000",
                delta.num_days(),
                delta.num_hours() % 24,
                delta.num_minutes() % 60,
                delta.num_seconds() % 60,
            )
        }
    }
}
