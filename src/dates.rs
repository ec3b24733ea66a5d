//! Date normalization to ISO-8601 calendar dates (`YYYY-MM-DD`).
//!
//! Inputs that cannot be resolved to a full calendar date are rejected
//! (`None`); partial dates like `2021` or `2021-03` are never padded.

use chrono::{DateTime, NaiveDate, NaiveDateTime};

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%Y%m%d", "%d.%m.%Y"];

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
];

/// Normalize a source date string to `YYYY-MM-DD`.
pub fn normalize_date(input: &str) -> Option<String> {
    parse_calendar_date(input).map(|d| d.format("%Y-%m-%d").to_string())
}

/// Parse any accepted source date format into a calendar date.
pub fn parse_calendar_date(input: &str) -> Option<NaiveDate> {
    let input = input.trim();
    if input.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
        return Some(dt.date_naive());
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(input) {
        return Some(dt.date_naive());
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(input, fmt) {
            return Some(dt.date());
        }
    }
    for fmt in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(input, fmt) {
            return Some(d);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_iso_date() {
        assert_eq!(normalize_date("2024-03-01").as_deref(), Some("2024-03-01"));
    }

    #[test]
    fn test_rfc3339_timestamp_truncated_to_date() {
        assert_eq!(
            normalize_date("2024-03-05T12:34:56.789012+00:00").as_deref(),
            Some("2024-03-05")
        );
    }

    #[test]
    fn test_rfc2822_pub_date() {
        assert_eq!(
            normalize_date("Tue, 14 May 2024 09:12:00 +0000").as_deref(),
            Some("2024-05-14")
        );
    }

    #[test]
    fn test_naive_datetime_and_alternate_separators() {
        assert_eq!(normalize_date("2023-11-02 08:00:00").as_deref(), Some("2023-11-02"));
        assert_eq!(normalize_date("2023/11/02").as_deref(), Some("2023-11-02"));
        assert_eq!(normalize_date("02.11.2023").as_deref(), Some("2023-11-02"));
    }

    #[test]
    fn test_rejects_invalid_and_partial_dates() {
        assert_eq!(normalize_date("2024-02-30"), None);
        assert_eq!(normalize_date("2021"), None);
        assert_eq!(normalize_date("2021-03"), None);
        assert_eq!(normalize_date("sometime in spring"), None);
        assert_eq!(normalize_date("   "), None);
    }
}
