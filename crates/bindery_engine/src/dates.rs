//! Locale-aware display dates.

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};

const MONTHS_DE: [&str; 12] = [
    "Januar", "Februar", "März", "April", "Mai", "Juni", "Juli", "August", "September",
    "Oktober", "November", "Dezember",
];

const MONTHS_EN: [&str; 12] = [
    "January", "February", "March", "April", "May", "June", "July", "August", "September",
    "October", "November", "December",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum DateLocale {
    #[default]
    German,
    English,
}

/// Calendar date plus an optional wall-clock time, as written by the site.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ParsedDate {
    date: NaiveDate,
    time: Option<(u32, u32)>,
}

/// Format `raw` in the locale's long form, or `None` when it cannot be parsed.
///
/// `2025-10-29T10:36:01.000Z` -> `29. Oktober 2025, 10:36 Uhr`. A midnight
/// time is treated as "no time". The timestamp's own offset is kept.
pub fn format_display_date(raw: &str, locale: DateLocale) -> Option<String> {
    let parsed = parse_site_date(raw.trim())?;
    let day = parsed.date.day();
    let year = parsed.date.year();
    let month_index = parsed.date.month0() as usize;

    let text = match locale {
        DateLocale::German => {
            let month = MONTHS_DE[month_index];
            match parsed.time {
                Some((h, m)) => format!("{day}. {month} {year}, {h:02}:{m:02} Uhr"),
                None => format!("{day}. {month} {year}"),
            }
        }
        DateLocale::English => {
            let month = MONTHS_EN[month_index];
            match parsed.time {
                Some((h, m)) => format!("{day} {month} {year}, {h:02}:{m:02}"),
                None => format!("{day} {month} {year}"),
            }
        }
    };
    Some(text)
}

/// Display form of `raw`, falling back to `raw` itself when unparsable.
pub fn display_or_raw(raw: &str, locale: DateLocale) -> String {
    format_display_date(raw, locale).unwrap_or_else(|| raw.to_string())
}

fn parse_site_date(raw: &str) -> Option<ParsedDate> {
    if raw.is_empty() {
        return None;
    }

    if raw.contains('T') {
        if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
            return Some(with_time(dt.date_naive(), dt.hour(), dt.minute()));
        }
        for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M"] {
            if let Ok(dt) = NaiveDateTime::parse_from_str(raw, fmt) {
                return Some(with_time(dt.date(), dt.hour(), dt.minute()));
            }
        }
        return None;
    }

    let first = raw.split_whitespace().next()?.trim_end_matches(',');
    if let Ok(date) = NaiveDate::parse_from_str(first, "%Y-%m-%d") {
        return Some(ParsedDate { date, time: None });
    }
    // golem's visible form: `29.10.2025, 10:36 Uhr`
    let date = NaiveDate::parse_from_str(first, "%d.%m.%Y").ok()?;
    let time = raw
        .split_whitespace()
        .nth(1)
        .and_then(|t| chrono::NaiveTime::parse_from_str(t, "%H:%M").ok());
    Some(match time {
        Some(t) => with_time(date, t.hour(), t.minute()),
        None => ParsedDate { date, time: None },
    })
}

fn with_time(date: NaiveDate, hour: u32, minute: u32) -> ParsedDate {
    let time = if hour == 0 && minute == 0 {
        None
    } else {
        Some((hour, minute))
    };
    ParsedDate { date, time }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn iso_timestamp_becomes_german_long_form() {
        assert_eq!(
            format_display_date("2025-10-29T10:36:01.000Z", DateLocale::German).as_deref(),
            Some("29. Oktober 2025, 10:36 Uhr")
        );
    }

    #[test]
    fn midnight_renders_date_only() {
        assert_eq!(
            format_display_date("2024-03-01T00:00:00+01:00", DateLocale::German).as_deref(),
            Some("1. März 2024")
        );
        assert_eq!(
            format_display_date("2024-03-01", DateLocale::German).as_deref(),
            Some("1. März 2024")
        );
    }

    #[test]
    fn offset_is_not_converted() {
        assert_eq!(
            format_display_date("2025-01-05T23:15:00+02:00", DateLocale::German).as_deref(),
            Some("5. Januar 2025, 23:15 Uhr")
        );
    }

    #[test]
    fn dotted_date_with_time_is_accepted() {
        assert_eq!(
            format_display_date("29.10.2025, 10:36 Uhr", DateLocale::German).as_deref(),
            Some("29. Oktober 2025, 10:36 Uhr")
        );
    }

    #[test]
    fn english_locale() {
        assert_eq!(
            format_display_date("2025-10-29T10:36:01Z", DateLocale::English).as_deref(),
            Some("29 October 2025, 10:36")
        );
    }

    #[test]
    fn unparsable_dates_pass_through() {
        assert_eq!(format_display_date("gestern", DateLocale::German), None);
        assert_eq!(display_or_raw("gestern", DateLocale::German), "gestern");
        assert_eq!(display_or_raw("", DateLocale::German), "");
    }
}
