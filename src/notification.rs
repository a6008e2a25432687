//! Notification and reply text
//!
//! Builds the chat message for a noteworthy email and the line appended to
//! the reply once a calendar event was (or could not be) created.

use chrono::DateTime;
use chrono_tz::Tz;
use serde::Serialize;

use crate::types::ProcessedEmail;

/// Longest body excerpt carried in a notification.
const MAX_BODY_CHARS: usize = 500;

pub const CALENDAR_FAILURE_NOTE: &str =
    "Note: I couldn't add this event to your calendar automatically. Please add it manually.";

/// A message for the notifier collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub email_id: String,
    pub title: String,
    pub text: String,
}

/// Chat-formatted text announcing a new email.
pub fn new_email_text(subject: &str, body: &str) -> String {
    format!(
        ":envelope_with_arrow: *New Important Email*\n\n*Subject*: {}\n*Body*: {}",
        subject,
        truncate_chars(body, MAX_BODY_CHARS)
    )
}

/// Notification for a processed email, using its summary as the body.
pub fn new_email_notification(email: &ProcessedEmail) -> Notification {
    let title = if email.meeting.is_some() {
        "Meeting request"
    } else {
        "New important email"
    };
    Notification {
        email_id: email.id.clone(),
        title: title.to_string(),
        text: new_email_text(&email.subject, &email.summary),
    }
}

/// Reply line confirming a created event, in the event's own timezone.
pub fn calendar_confirmation(start: &DateTime<Tz>) -> String {
    format!(
        "I've added this event to your calendar for {}.",
        start.format("%B %d, %Y at %I:%M %p")
    )
}

fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}
