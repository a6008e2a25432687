//! Ordered date/time pattern tables and the generic match-and-tag routine.
//!
//! A table is plain data: `(regex, format tag)` pairs. Order encodes
//! precedence: when two patterns match overlapping text, the earlier-listed
//! pattern keeps the span.

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

const MONTH_NAMES: &str = r"(?:Jan(?:uary)?|Feb(?:ruary)?|Mar(?:ch)?|Apr(?:il)?|May|June?|July?|Aug(?:ust)?|Sep(?:tember)?|Oct(?:ober)?|Nov(?:ember)?|Dec(?:ember)?)";

/// Date format tags. The serialized name doubles as the config identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DateFormat {
    #[serde(rename = "YYYY-MM-DD")]
    YearMonthDay,
    #[serde(rename = "DD/MM/YYYY")]
    DayMonthYearSlash,
    #[serde(rename = "MM/DD/YYYY")]
    MonthDayYearSlash,
    #[serde(rename = "DD-MM-YYYY")]
    DayMonthYearDash,
    #[serde(rename = "D MONTH YYYY")]
    DayMonthNameYear,
    #[serde(rename = "MONTH D, YYYY")]
    MonthNameDayYear,
}

impl DateFormat {
    pub fn tag(&self) -> &'static str {
        match self {
            DateFormat::YearMonthDay => "YYYY-MM-DD",
            DateFormat::DayMonthYearSlash => "DD/MM/YYYY",
            DateFormat::MonthDayYearSlash => "MM/DD/YYYY",
            DateFormat::DayMonthYearDash => "DD-MM-YYYY",
            DateFormat::DayMonthNameYear => "D MONTH YYYY",
            DateFormat::MonthNameDayYear => "MONTH D, YYYY",
        }
    }
}

/// Time format tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TimeFormat {
    #[serde(rename = "12-hour")]
    TwelveHour,
    #[serde(rename = "24-hour")]
    TwentyFourHour,
}

impl TimeFormat {
    pub fn tag(&self) -> &'static str {
        match self {
            TimeFormat::TwelveHour => "12-hour",
            TimeFormat::TwentyFourHour => "24-hour",
        }
    }
}

/// One table row as configured: a regex and the format it yields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternSpec<F> {
    pub pattern: String,
    pub format: F,
}

impl<F> PatternSpec<F> {
    fn new(pattern: impl Into<String>, format: F) -> Self {
        Self {
            pattern: pattern.into(),
            format,
        }
    }
}

pub type DatePatternSpec = PatternSpec<DateFormat>;
pub type TimePatternSpec = PatternSpec<TimeFormat>;

/// Default date table, highest precedence first.
pub fn default_date_patterns() -> Vec<DatePatternSpec> {
    vec![
        PatternSpec::new(r"\b\d{4}-\d{1,2}-\d{1,2}\b", DateFormat::YearMonthDay),
        PatternSpec::new(r"\b\d{1,2}/\d{1,2}/\d{4}\b", DateFormat::DayMonthYearSlash),
        PatternSpec::new(r"\b\d{1,2}-\d{1,2}-\d{4}\b", DateFormat::DayMonthYearDash),
        PatternSpec::new(
            format!(r"(?i)\b\d{{1,2}}(?:st|nd|rd|th)?\s+(?:of\s+)?{MONTH_NAMES}\.?,?\s+\d{{4}}\b"),
            DateFormat::DayMonthNameYear,
        ),
        PatternSpec::new(
            format!(r"(?i)\b{MONTH_NAMES}\.?\s+\d{{1,2}}(?:st|nd|rd|th)?,?\s+\d{{4}}\b"),
            DateFormat::MonthNameDayYear,
        ),
    ]
}

/// Default time table, highest precedence first.
pub fn default_time_patterns() -> Vec<TimePatternSpec> {
    vec![
        PatternSpec::new(
            r"(?i)\b\d{1,2}(?::\d{2})?\s*(?:a\.m\.|p\.m\.|am\b|pm\b)",
            TimeFormat::TwelveHour,
        ),
        PatternSpec::new(r"\b\d{1,2}:\d{2}\b", TimeFormat::TwentyFourHour),
    ]
}

/// A compiled table row.
#[derive(Debug, Clone)]
pub struct TaggedPattern<F> {
    regex: Regex,
    format: F,
}

impl<F: Copy> TaggedPattern<F> {
    pub fn compile(spec: &PatternSpec<F>) -> Result<Self, ConfigError> {
        let regex = Regex::new(&spec.pattern).map_err(|e| ConfigError::pattern(&spec.pattern, e))?;
        Ok(Self {
            regex,
            format: spec.format,
        })
    }

    pub fn compile_all(specs: &[PatternSpec<F>]) -> Result<Vec<Self>, ConfigError> {
        specs.iter().map(Self::compile).collect()
    }
}

impl<F> TaggedPattern<F> {
    pub fn is_match(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }
}

/// A matched substring, tagged with its format and byte offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Candidate<'t, F> {
    pub text: &'t str,
    pub format: F,
    pub start: usize,
    pub end: usize,
}

impl<F> Candidate<'_, F> {
    fn overlaps(&self, start: usize, end: usize) -> bool {
        start < self.end && self.start < end
    }
}

pub type DateCandidate<'t> = Candidate<'t, DateFormat>;
pub type TimeCandidate<'t> = Candidate<'t, TimeFormat>;

/// Collect non-overlapping matches of an ordered table.
///
/// Output order is table order, then text order within one pattern, so the
/// first element is the highest-precedence pattern's earliest match.
pub fn match_and_tag<'t, F: Copy>(patterns: &[TaggedPattern<F>], text: &'t str) -> Vec<Candidate<'t, F>> {
    let mut found: Vec<Candidate<'t, F>> = Vec::new();
    for pattern in patterns {
        for m in pattern.regex.find_iter(text) {
            if found.iter().any(|c| c.overlaps(m.start(), m.end())) {
                continue;
            }
            found.push(Candidate {
                text: m.as_str(),
                format: pattern.format,
                start: m.start(),
                end: m.end(),
            });
        }
    }
    found
}
