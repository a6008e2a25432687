//! Parse tagged date/time substrings into validated calendar values.
//!
//! Every function returns None for anything that is not a real date or time
//! of day (2024-02-30, 25:61, 13 PM, ...).

use std::sync::OnceLock;

use chrono::{NaiveDate, NaiveTime};
use regex::Regex;

use super::patterns::{DateFormat, TimeFormat};

fn re_ordinal_suffix() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)(\d)(?:st|nd|rd|th)\b").unwrap())
}

fn re_of() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\bof\b").unwrap())
}

/// Split out the ASCII digit groups of a substring ("01/06/2024" → [1, 6, 2024]).
fn digit_groups(text: &str) -> Vec<u32> {
    text.split(|c: char| !c.is_ascii_digit())
        .filter(|s| !s.is_empty())
        .filter_map(|s| s.parse().ok())
        .collect()
}

/// Parse a date substring according to its format tag.
pub fn parse_date(text: &str, format: DateFormat) -> Option<NaiveDate> {
    match format {
        DateFormat::YearMonthDay => {
            let [y, m, d] = <[u32; 3]>::try_from(digit_groups(text)).ok()?;
            NaiveDate::from_ymd_opt(i32::try_from(y).ok()?, m, d)
        }
        DateFormat::DayMonthYearSlash | DateFormat::DayMonthYearDash => {
            let [d, m, y] = <[u32; 3]>::try_from(digit_groups(text)).ok()?;
            NaiveDate::from_ymd_opt(i32::try_from(y).ok()?, m, d)
        }
        DateFormat::MonthDayYearSlash => {
            let [m, d, y] = <[u32; 3]>::try_from(digit_groups(text)).ok()?;
            NaiveDate::from_ymd_opt(i32::try_from(y).ok()?, m, d)
        }
        DateFormat::DayMonthNameYear => {
            NaiveDate::parse_from_str(&simplify_month_name_date(text), "%d %B %Y").ok()
        }
        DateFormat::MonthNameDayYear => {
            NaiveDate::parse_from_str(&simplify_month_name_date(text), "%B %d %Y").ok()
        }
    }
}

/// "15th of March, 2024" → "15 March 2024"; "Mar. 2nd, 2024" → "Mar 2 2024".
fn simplify_month_name_date(text: &str) -> String {
    let text = re_ordinal_suffix().replace_all(text, "$1");
    let text = re_of().replace_all(&text, " ");
    text.replace(['.', ','], " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Parse a time substring according to its format tag.
pub fn parse_time(text: &str, format: TimeFormat) -> Option<NaiveTime> {
    let groups = digit_groups(text);
    match format {
        TimeFormat::TwelveHour => {
            let (hour, minute) = match groups.as_slice() {
                [h] => (*h, 0),
                [h, m] => (*h, *m),
                _ => return None,
            };
            if !(1..=12).contains(&hour) {
                return None;
            }
            let is_pm = text.to_lowercase().contains('p');
            let hour24 = match (hour, is_pm) {
                (12, false) => 0,
                (12, true) => 12,
                (h, false) => h,
                (h, true) => h + 12,
            };
            NaiveTime::from_hms_opt(hour24, minute, 0)
        }
        TimeFormat::TwentyFourHour => match groups.as_slice() {
            [h, m] => NaiveTime::from_hms_opt(*h, *m, 0),
            _ => None,
        },
    }
}
