//! W3C Datetime parsing and formatting.
//!
//! Accepted forms, most to least precise:
//! `YYYY-MM-DDThh:mm:ss(.s+)TZD`, `YYYY-MM-DDThh:mmTZD`, `YYYY-MM-DD`,
//! `YYYY-MM`, `YYYY`. Date-only forms are midnight UTC.

use chrono::{DateTime, NaiveDate, Utc};

use crate::error::ManifestError;

pub fn parse(value: &str) -> Result<DateTime<Utc>, ManifestError> {
    let v = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(v) {
        return Ok(dt.with_timezone(&Utc));
    }

    let offset_form = match v.strip_suffix('Z') {
        Some(head) => format!("{head}+00:00"),
        None => v.to_string(),
    };
    if let Ok(dt) = DateTime::parse_from_str(&offset_form, "%Y-%m-%dT%H:%M%:z") {
        return Ok(dt.with_timezone(&Utc));
    }

    let date = match v.len() {
        10 => NaiveDate::parse_from_str(v, "%Y-%m-%d").ok(),
        7 => NaiveDate::parse_from_str(&format!("{v}-01"), "%Y-%m-%d").ok(),
        4 => NaiveDate::parse_from_str(&format!("{v}-01-01"), "%Y-%m-%d").ok(),
        _ => None,
    };
    date.and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
        .ok_or_else(|| ManifestError::BadDatetime {
            value: value.to_string(),
        })
}

/// Second-precision UTC, e.g. `2013-01-03T09:00:00Z`.
pub fn format(dt: &DateTime<Utc>) -> String {
    dt.format("%Y-%m-%dT%H:%M:%SZ").to_string()
}
