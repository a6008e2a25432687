//! Meeting detection over normalized email text.
//!
//! Scans for date and time substrings with ordered pattern tables, pairs the
//! first date with the nearest time, validates the pair against the real
//! calendar and attaches the configured timezone. Absence of a meeting is
//! `None`, never an error.

pub mod parse;
pub mod patterns;

use std::sync::OnceLock;

use chrono::{DateTime, Duration, TimeZone};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

pub use patterns::{
    match_and_tag, Candidate, DateCandidate, DateFormat, DatePatternSpec, PatternSpec,
    TaggedPattern, TimeCandidate, TimeFormat, TimePatternSpec,
};

use crate::error::ConfigError;
use crate::normalizer::{Normalizer, NormalizerConfig};
use crate::types::{Config, MeetingCandidate};

/// Extractor settings. Every field is optional in JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractorConfig {
    /// IANA zone attached to detected meetings.
    #[serde(default = "default_timezone")]
    pub timezone: String,
    /// Meetings carry no end time in text; this is added to the start.
    #[serde(default = "default_meeting_duration_minutes")]
    pub default_meeting_duration_minutes: i64,
    #[serde(default = "patterns::default_date_patterns")]
    pub date_patterns: Vec<DatePatternSpec>,
    #[serde(default = "patterns::default_time_patterns")]
    pub time_patterns: Vec<TimePatternSpec>,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            timezone: default_timezone(),
            default_meeting_duration_minutes: default_meeting_duration_minutes(),
            date_patterns: patterns::default_date_patterns(),
            time_patterns: patterns::default_time_patterns(),
        }
    }
}

fn default_timezone() -> String {
    "Asia/Kolkata".to_string()
}

fn default_meeting_duration_minutes() -> i64 {
    60
}

/// A validated start/end pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MeetingSlot {
    pub start: DateTime<Tz>,
    pub end: DateTime<Tz>,
}

/// Compiled extractor: normalizer, pattern tables, timezone and duration.
#[derive(Debug, Clone)]
pub struct MeetingExtractor {
    normalizer: Normalizer,
    dates: Vec<TaggedPattern<DateFormat>>,
    times: Vec<TaggedPattern<TimeFormat>>,
    timezone: Tz,
    duration: Duration,
}

impl MeetingExtractor {
    pub fn new(
        normalizer: &NormalizerConfig,
        extractor: &ExtractorConfig,
    ) -> Result<Self, ConfigError> {
        let timezone: Tz = extractor
            .timezone
            .parse()
            .map_err(|_| ConfigError::UnknownTimezone(extractor.timezone.clone()))?;

        let duration = Duration::try_minutes(extractor.default_meeting_duration_minutes)
            .filter(|d| *d > Duration::zero())
            .ok_or_else(|| ConfigError::InvalidValue {
                field: "extractor.defaultMeetingDurationMinutes",
                reason: format!(
                    "{} is not a positive number of minutes",
                    extractor.default_meeting_duration_minutes
                ),
            })?;

        Ok(Self {
            normalizer: Normalizer::new(normalizer)?,
            dates: TaggedPattern::compile_all(&extractor.date_patterns)?,
            times: TaggedPattern::compile_all(&extractor.time_patterns)?,
            timezone,
            duration,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        Self::new(&config.normalizer, &config.extractor)
    }

    pub fn normalizer(&self) -> &Normalizer {
        &self.normalizer
    }

    pub fn timezone(&self) -> Tz {
        self.timezone
    }

    /// Normalize `body` and look for a meeting in it.
    pub fn extract_meeting(&self, subject: &str, sender: &str, body: &str) -> Option<MeetingCandidate> {
        let normalized = self.normalizer.normalize_str(body);
        self.extract_from_normalized(subject, sender, body, &normalized)
    }

    /// Same as `extract_meeting` for callers that already hold normalized text.
    /// `body` is echoed into the candidate untouched.
    pub fn extract_from_normalized(
        &self,
        subject: &str,
        sender: &str,
        body: &str,
        normalized: &str,
    ) -> Option<MeetingCandidate> {
        let slot = self.find_slot(normalized)?;
        Some(MeetingCandidate {
            subject: subject.to_string(),
            from: sender.to_string(),
            body: body.to_string(),
            start_datetime: slot.start,
            end_datetime: slot.end,
            timezone: self.timezone.name().to_string(),
        })
    }

    /// True when any date or time pattern matches, valid or not.
    pub fn mentions_date_or_time(&self, text: &str) -> bool {
        self.dates.iter().any(|p| p.is_match(text)) || self.times.iter().any(|p| p.is_match(text))
    }

    /// Find and validate the meeting slot in normalized text.
    pub fn find_slot(&self, text: &str) -> Option<MeetingSlot> {
        let dates = match_and_tag(&self.dates, text);
        let date = dates.first()?;

        let times = match_and_tag(&self.times, text);
        let time = times
            .iter()
            .min_by_key(|t| (t.start.abs_diff(date.start), t.start))?;

        let day = parse::parse_date(date.text, date.format)?;
        let clock = parse::parse_time(time.text, time.format)?;

        // DST gaps have no local instant; ambiguous times take the earlier one.
        let start = self
            .timezone
            .from_local_datetime(&day.and_time(clock))
            .earliest()?;
        let end = start.checked_add_signed(self.duration)?;
        Some(MeetingSlot { start, end })
    }
}

pub(crate) fn default_extractor() -> &'static MeetingExtractor {
    static EXTRACTOR: OnceLock<MeetingExtractor> = OnceLock::new();
    EXTRACTOR.get_or_init(|| {
        MeetingExtractor::new(&NormalizerConfig::default(), &ExtractorConfig::default())
            .expect("default extractor config is valid")
    })
}

/// Detect a meeting with the default tables (Asia/Kolkata, one hour).
pub fn extract_meeting(subject: &str, sender: &str, body: &str) -> Option<MeetingCandidate> {
    default_extractor().extract_meeting(subject, sender, body)
}
