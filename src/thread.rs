//! Thread metadata: message id, reply chain, subject root and participants.

use std::collections::BTreeSet;
use std::sync::OnceLock;

use chrono::Utc;
use mailparse::{MailAddr, MailHeaderMap};
use regex::Regex;
use serde::Serialize;

use crate::mime;
use crate::types::RawEmail;

const SUBJECT_PREFIXES: &[&str] = &["re:", "fw:", "fwd:", "aw:", "tr:", "r:"];

fn re_address() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[\w.+-]+@[\w-]+(?:\.[\w-]+)+").unwrap())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ThreadInfo {
    pub message_id: String,
    pub thread_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub in_reply_to: Option<String>,
    pub references: Vec<String>,
    pub is_reply: bool,
    pub subject_root: String,
    /// Lowercased addresses from From, To and Cc, sorted.
    pub participants: Vec<String>,
}

/// Strip any run of reply/forward prefixes and lowercase.
///
/// "Re: FWD: re:  Budget" → "budget".
pub fn clean_subject(subject: &str) -> String {
    let mut subject = subject.trim().to_lowercase();
    'outer: loop {
        for prefix in SUBJECT_PREFIXES {
            if let Some(rest) = subject.strip_prefix(prefix) {
                subject = rest.trim_start().to_string();
                continue 'outer;
            }
        }
        break;
    }
    subject.trim().to_string()
}

/// Bare lowercase address from a field like "Jane Doe <jane@example.com>".
pub fn extract_email_address(field: &str) -> Option<String> {
    re_address()
        .find(field)
        .map(|m| m.as_str().to_lowercase())
}

/// Every address in a header value, via the RFC 5322 parser when it accepts
/// the value and a plain scan otherwise.
fn addresses_in(value: &str) -> Vec<String> {
    match mailparse::addrparse(value) {
        Ok(list) => list
            .iter()
            .flat_map(|addr| match addr {
                MailAddr::Single(info) => vec![info.addr.clone()],
                MailAddr::Group(group) => group.addrs.iter().map(|i| i.addr.clone()).collect(),
            })
            .filter_map(|a| extract_email_address(&a))
            .collect(),
        Err(_) => value.split(',').filter_map(extract_email_address).collect(),
    }
}

fn strip_angle_brackets(id: &str) -> String {
    id.trim().trim_matches(|c| c == '<' || c == '>').trim().to_string()
}

/// Thread info from the record's subject and sender plus any headers at the
/// top of the body.
pub fn extract_thread_info(email: &RawEmail) -> ThreadInfo {
    let headers = mime::headers(&email.body);

    let message_id = headers
        .get_first_value("Message-ID")
        .map(|v| strip_angle_brackets(&v))
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| Utc::now().timestamp_micros().to_string());

    let references: Vec<String> = headers
        .get_first_value("References")
        .map(|v| {
            v.split_whitespace()
                .map(strip_angle_brackets)
                .filter(|r| !r.is_empty())
                .collect()
        })
        .unwrap_or_default();

    let in_reply_to = headers
        .get_first_value("In-Reply-To")
        .map(|v| strip_angle_brackets(&v))
        .filter(|v| !v.is_empty());

    let is_reply = in_reply_to.is_some() || !references.is_empty();
    let thread_id = references
        .first()
        .cloned()
        .or_else(|| in_reply_to.clone())
        .unwrap_or_else(|| message_id.clone());

    let mut participants = BTreeSet::new();
    participants.extend(extract_email_address(&email.from));
    for field in ["To", "Cc"] {
        for value in headers.get_all_values(field) {
            participants.extend(addresses_in(&value));
        }
    }

    ThreadInfo {
        message_id,
        thread_id,
        in_reply_to,
        references,
        is_reply,
        subject_root: clean_subject(&email.subject),
        participants: participants.into_iter().collect(),
    }
}

/// Context prefix for a reply's summary, empty for a new thread.
pub fn reply_context(info: &ThreadInfo) -> String {
    if !info.is_reply {
        return String::new();
    }
    let mut context = format!("[REPLY to thread: {}] ", info.subject_root);
    if let Some(parent) = &info.in_reply_to {
        context.push_str(&format!("[In reply to: {}] ", parent));
    }
    context
}
