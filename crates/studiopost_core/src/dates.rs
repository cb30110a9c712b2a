use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, TimeZone, Utc};

/// Rendering used for every timestamp written into post front matter.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";
pub const CALENDAR_DATE_FORMAT: &str = "%Y-%m-%d";

const NAIVE_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
    "%m/%d/%Y %I:%M:%S %p",
    "%m/%d/%Y %I:%M %p",
];

const NAIVE_DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y"];

const SECONDS_PER_DAY: f64 = 86_400.0;
// Serial 2958466 would be 10000-01-01, past what spreadsheets can represent.
const MAX_SPREADSHEET_SERIAL: f64 = 2_958_466.0;

/// Parse a loosely formatted date string into a UTC instant.
///
/// Explicit patterns are tried first, then the string is read as a
/// spreadsheet serial day count. Returns `None` when nothing matches.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let value = raw.trim();
    if value.is_empty() {
        return None;
    }

    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Some(parsed.with_timezone(&Utc));
    }
    for format in NAIVE_DATETIME_FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(value, format) {
            return Some(Utc.from_utc_datetime(&parsed));
        }
    }
    for format in NAIVE_DATE_FORMATS {
        if let Ok(parsed) = NaiveDate::parse_from_str(value, format) {
            return parsed
                .and_hms_opt(0, 0, 0)
                .map(|midnight| Utc.from_utc_datetime(&midnight));
        }
    }

    spreadsheet_serial_to_timestamp(value)
}

/// Interpret `raw` as a spreadsheet serial: whole days since 1899-12-30 with
/// the fractional part as time of day, rounded to the nearest second.
pub fn spreadsheet_serial_to_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let serial = raw.trim().parse::<f64>().ok()?;
    if !serial.is_finite() || !(0.0..MAX_SPREADSHEET_SERIAL).contains(&serial) {
        return None;
    }

    let days = serial.trunc();
    let seconds = ((serial - days) * SECONDS_PER_DAY).round() as i64;
    let epoch = Utc.with_ymd_and_hms(1899, 12, 30, 0, 0, 0).single()?;
    epoch
        .checked_add_signed(Duration::days(days as i64))?
        .checked_add_signed(Duration::seconds(seconds))
}

/// Parse `raw`, falling back to `fallback` when it is empty or unrecognized.
pub fn timestamp_or(raw: &str, fallback: DateTime<Utc>) -> DateTime<Utc> {
    parse_timestamp(raw).unwrap_or(fallback)
}

pub fn format_timestamp(value: &DateTime<Utc>) -> String {
    value.format(TIMESTAMP_FORMAT).to_string()
}

/// Calendar date (`YYYY-MM-DD`) for `raw`, or an empty string when the value
/// cannot be dated.
pub fn calendar_date(raw: &str) -> String {
    parse_timestamp(raw)
        .map(|value| value.format(CALENDAR_DATE_FORMAT).to_string())
        .unwrap_or_default()
}

/// Parse a `YYYY-MM-DD` string previously produced by [`calendar_date`].
pub fn parse_calendar_date(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), CALENDAR_DATE_FORMAT).ok()
}
