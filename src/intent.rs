//! Keyword-based meeting intent.
//!
//! An email reads as a meeting request when it mentions a date or a time and
//! also uses scheduling vocabulary. No model involved.

use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;

use crate::extractor::MeetingExtractor;

const MEETING_KEYWORDS: &[&str] = &[
    "meeting",
    "meet",
    "appointment",
    "schedule",
    "calendar",
    "event",
    "interview",
    "call",
    "conference",
    "discussion",
    "catch up",
    "get together",
    "gathering",
    "celebration",
    "party",
    "lunch",
    "dinner",
    "breakfast",
    "coffee",
    "video call",
    "zoom",
    "teams",
    "google meet",
    "webex",
    "skype",
];

const TIME_KEYWORDS: &[&str] = &[
    "at",
    "on",
    "to",
    "from",
    "between",
    "during",
    "morning",
    "afternoon",
    "evening",
    "night",
    "today",
    "tomorrow",
    "this week",
    "next week",
    "monday",
    "tuesday",
    "wednesday",
    "thursday",
    "friday",
    "saturday",
    "sunday",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Intent {
    Meeting,
    General,
}

fn keyword_regex(keywords: &[&str]) -> Regex {
    let alternation = keywords
        .iter()
        .map(|k| regex::escape(k).replace(' ', r"\s+"))
        .collect::<Vec<_>>()
        .join("|");
    Regex::new(&format!(r"(?i)\b(?:{})\b", alternation)).unwrap()
}

fn re_meeting_keyword() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| keyword_regex(MEETING_KEYWORDS))
}

fn re_time_keyword() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| keyword_regex(TIME_KEYWORDS))
}

/// Classify `text` using the extractor's date/time tables.
pub fn detect_intent_with(extractor: &MeetingExtractor, text: &str) -> Intent {
    if !extractor.mentions_date_or_time(text) {
        return Intent::General;
    }
    if re_meeting_keyword().is_match(text) || re_time_keyword().is_match(text) {
        Intent::Meeting
    } else {
        Intent::General
    }
}

/// Classify `text` with the default date/time tables.
pub fn detect_intent(text: &str) -> Intent {
    detect_intent_with(crate::extractor::default_extractor(), text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_meeting_keyword_with_date() {
        assert_eq!(
            detect_intent("Can we schedule a call 2024-03-15 2:30 PM?"),
            Intent::Meeting
        );
    }

    #[test]
    fn test_time_keyword_with_time() {
        assert_eq!(detect_intent("Free tomorrow 10:00?"), Intent::Meeting);
    }

    #[test]
    fn test_keywords_without_date_or_time() {
        assert_eq!(
            detect_intent("Let's have a meeting sometime next week"),
            Intent::General
        );
    }

    #[test]
    fn test_date_without_keywords() {
        assert_eq!(detect_intent("Invoice 2024-03-15 attached."), Intent::General);
    }

    #[test]
    fn test_keywords_match_whole_words() {
        // "atom" and "Tonga" must not count as "at" / "on"
        assert_eq!(detect_intent("Tonga atom 2024-03-15"), Intent::General);
    }

    #[test]
    fn test_to_counts_as_time_word() {
        assert_eq!(detect_intent("Moved to 2024-03-15"), Intent::Meeting);
        assert_eq!(detect_intent("Total 2024-03-15"), Intent::General);
    }

    #[test]
    fn test_multiword_keyword_spans_whitespace() {
        assert_eq!(detect_intent("catch\n up 11:30"), Intent::Meeting);
    }

    #[test]
    fn test_intent_serialization() {
        assert_eq!(serde_json::to_string(&Intent::Meeting).unwrap(), "\"Meeting\"");
    }
}
