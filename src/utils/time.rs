use chrono::{DateTime, NaiveDate, NaiveDateTime};

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// Calendar date of a `YYYY-MM-DD` string or of a date-time string.
/// Surrounding whitespace is ignored.
pub fn parse_calendar_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Some(date);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.date_naive());
    }
    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|dt| dt.date())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_dates_and_datetimes() {
        let expected = NaiveDate::from_ymd_opt(2021, 9, 15);
        assert_eq!(parse_calendar_date("2021-09-15"), expected);
        assert_eq!(parse_calendar_date(" 2021-09-15 "), expected);
        assert_eq!(parse_calendar_date("2021-09-15T23:10:00"), expected);
        assert_eq!(parse_calendar_date("2021-09-15 01:00:00.123456"), expected);
        assert_eq!(parse_calendar_date("2021-09-15T01:00:00+02:00"), expected);
    }

    #[test]
    fn rejects_garbage() {
        assert_eq!(parse_calendar_date("yesterday"), None);
        assert_eq!(parse_calendar_date("2021-13-01"), None);
        assert_eq!(parse_calendar_date(""), None);
    }
}
