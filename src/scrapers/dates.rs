//! Relative review dates ("3 minggu lalu") to calendar dates

use chrono::{Duration, Local, NaiveDate, NaiveDateTime};
use once_cell::sync::Lazy;
use regex::Regex;

static NUMBER: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d+)").expect("valid number regex"));

/// Hours per unit keyword. Months and years use fixed 30 and 365 day
/// approximations.
fn unit_hours(phrase: &str) -> Option<i64> {
    const UNITS: [(&str, i64); 5] = [
        ("jam", 1),
        ("hari", 24),
        ("minggu", 24 * 7),
        ("bulan", 24 * 30),
        ("tahun", 24 * 365),
    ];
    UNITS
        .iter()
        .find(|(keyword, _)| phrase.contains(*keyword))
        .map(|&(_, hours)| hours)
}

/// Resolve `phrase` against `now`.
///
/// Absent or empty input gives `None`. "Baru", blank phrases and phrases
/// with an unknown unit give today's date.
pub fn resolve_relative_date(phrase: Option<&str>, now: NaiveDateTime) -> Option<NaiveDate> {
    let phrase = phrase?;
    if phrase.is_empty() {
        return None;
    }
    let phrase = phrase.trim().to_lowercase();
    let today = now.date();
    if phrase.contains("baru") {
        return Some(today);
    }

    let n = NUMBER
        .captures(&phrase)
        .and_then(|c| c[1].parse::<i64>().ok())
        .unwrap_or(0);

    let Some(hours) = unit_hours(&phrase) else {
        return Some(today);
    };
    n.checked_mul(hours)
        .and_then(Duration::try_hours)
        .and_then(|span| now.checked_sub_signed(span))
        .map(|t| t.date())
        .or(Some(today))
}

/// Resolve `phrase` against the local clock
pub fn parse_relative_date(phrase: Option<&str>) -> Option<NaiveDate> {
    resolve_relative_date(phrase, Local::now().naive_local())
}
