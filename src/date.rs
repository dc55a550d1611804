use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};

/// Formats tried, in order, for naive date-times.
const DATE_TIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];

/// Formats tried, in order, for plain dates. Month names accept abbreviations.
const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%Y.%m.%d",
    "%d-%m-%Y",
    "%d.%m.%Y",
    "%d %B %Y",
    "%B %d %Y",
    "%B %d, %Y",
    "%A, %d %B %Y",
    "%A, %B %d, %Y",
];

/// Parse a date extracted from free text.
///
/// `dd/mm/yyyy` is read day-first and does not fall back to other orders: a day-first
/// candidate that is not a calendar date is no date. Everything else goes through the
/// generic parser. Values without a time are taken at midnight UTC.
pub fn parse_extracted(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if let Some(parts) = day_first_parts(text) {
        return parse_day_first(parts);
    }
    parse_generic(text)
}

fn day_first_parts(text: &str) -> Option<[&str; 3]> {
    let mut parts = text.split('/');
    let parts = [parts.next()?, parts.next()?, parts.next()?];
    if text.split('/').count() != 3 {
        return None;
    }
    let year = parts[2].trim();
    (year.len() == 4 && year.bytes().all(|b| b.is_ascii_digit())).then_some(parts)
}

fn parse_day_first([day, month, year]: [&str; 3]) -> Option<DateTime<Utc>> {
    let day = day.trim().parse::<u32>().ok()?;
    let month = month.trim().parse::<u32>().ok()?;
    let year = year.trim().parse::<i32>().ok()?;
    NaiveDate::from_ymd_opt(year, month, day).map(midnight)
}

/// Generic date parsing: RFC 3339, RFC 2822, then the naive formats above.
pub fn parse_generic(text: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(text) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Some(dt) = DATE_TIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
    {
        return Some(dt.and_utc());
    }
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(text, fmt).ok())
        .map(midnight)
}

fn midnight(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(NaiveTime::MIN).and_utc()
}

/// `2025-06-21T00:00:00.000Z`
pub fn to_iso_instant(dt: &DateTime<Utc>) -> String {
    dt.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
}

/// Parse an instant previously produced by [to_iso_instant], or any RFC 3339 value.
pub fn parse_iso_instant(text: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(text.trim())
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}
