use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, CoreError};
use crate::extractor::{ExtractorConfig, MeetingExtractor};
use crate::intent::Intent;
use crate::normalizer::NormalizerConfig;
use crate::pipeline::PipelineConfig;
use crate::thread::ThreadInfo;

/// Application configuration (`~/.mailmeet/config.json`).
///
/// Every section and field is optional; missing values take the built-in
/// defaults (Asia/Kolkata, one-hour meetings, four workers).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[serde(default)]
    pub normalizer: NormalizerConfig,
    #[serde(default)]
    pub extractor: ExtractorConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
}

impl Config {
    /// Check every value by compiling the components it configures.
    pub fn validate(&self) -> Result<(), ConfigError> {
        MeetingExtractor::from_config(self)?;
        self.pipeline.validate()
    }
}

/// An email as handed over by the fetching collaborator.
///
/// Fields default to empty so that a record with a missing field still
/// deserializes and is then rejected by `validate` with a precise error.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawEmail {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub from: String,
    #[serde(default)]
    pub body: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
}

impl RawEmail {
    /// Reject records the core cannot meaningfully process.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.id.trim().is_empty() {
            return Err(CoreError::MissingField("id"));
        }
        if self.from.trim().is_empty() {
            return Err(CoreError::MissingField("from"));
        }
        if self.id.chars().any(char::is_control) {
            return Err(CoreError::InvalidRecord {
                id: self.id.escape_debug().to_string(),
                reason: "id contains control characters".to_string(),
            });
        }
        Ok(())
    }
}

/// A detected meeting proposal, not yet committed to any calendar.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MeetingCandidate {
    pub subject: String,
    pub from: String,
    /// Original (not normalized) body, for notification and reply context.
    pub body: String,
    pub start_datetime: DateTime<Tz>,
    pub end_datetime: DateTime<Tz>,
    /// IANA name of the zone both datetimes are expressed in.
    pub timezone: String,
}

/// Per-email pipeline report.
#[derive(Debug, Clone, Serialize)]
pub struct ProcessedEmail {
    pub id: String,
    pub from: String,
    pub subject: String,
    /// Normalized body text.
    pub cleaned_summary: String,
    /// Cleaned text prefixed with thread context for replies.
    pub summary: String,
    pub content_valid: bool,
    pub thread: ThreadInfo,
    pub intent: Intent,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meeting: Option<MeetingCandidate>,
    pub calendar_event_created: bool,
    /// Line appended to the reply: calendar confirmation or manual-add note.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_note: Option<String>,
    pub processed_at: DateTime<Utc>,
}
