//! Structural-noise marker tables and the line passes that strip them.
//!
//! Tables are plain data (see `NormalizerConfig`); `MarkerSet` compiles them
//! once. Every pass is a pure text-to-text transform and a no-op when
//! nothing matches.

use std::sync::OnceLock;

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Header fields stripped when the body carries a copied header block.
pub const HEADER_FIELDS: &[&str] = &[
    "From",
    "To",
    "Subject",
    "Date",
    "Cc",
    "Bcc",
    "Reply-To",
    "Return-Path",
    "Message-ID",
    "In-Reply-To",
    "References",
    "MIME-Version",
    "Content-Type",
    "Content-Transfer-Encoding",
];

/// Lines that open a forwarded or inlined original message.
pub const FORWARDED_MARKERS: &[&str] = &[
    r"^-+\s*Forwarded message\s*-*$",
    r"^Begin forwarded message:?$",
    r"^-+\s*Original Message\s*-+$",
];

/// Reply attribution lines ("On <date> <name> wrote:").
pub const REPLY_MARKERS: &[&str] = &[r"^On\s.+\swrote:$"];

/// Leading characters that mark a quoted line.
pub const QUOTE_MARKERS: &[&str] = &[">", "|"];

/// Whole-line signature delimiters and sign-offs (compared trimmed, case-insensitive).
pub const SIGNATURE_DELIMITERS: &[&str] = &[
    "--",
    "__",
    "Best regards,",
    "Best regards",
    "Kind regards,",
    "Regards,",
    "Thanks,",
    "Cheers,",
    "Sincerely,",
    "Sent from my iPhone",
];

/// Inline attachment placeholders.
pub const ATTACHMENT_MARKERS: &[&str] = &[
    r"\[image:[^\]]*\]",
    r"\[cid:[^\]]*\]",
    r"\[attachment:[^\]]*\]",
    r"<image\d+>",
];

/// Normalizer settings. Every field is optional in JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizerConfig {
    /// Minimum confidence for a detected (non-declared) encoding.
    #[serde(default = "default_encoding_confidence_threshold")]
    pub encoding_confidence_threshold: f32,
    #[serde(default = "default_header_fields")]
    pub header_fields: Vec<String>,
    /// Regexes matched against a trimmed line.
    #[serde(default = "default_forwarded_markers")]
    pub forwarded_markers: Vec<String>,
    /// Regexes matched against a trimmed line (or two joined lines).
    #[serde(default = "default_reply_markers")]
    pub reply_markers: Vec<String>,
    #[serde(default = "default_quote_markers")]
    pub quote_markers: Vec<String>,
    #[serde(default = "default_signature_delimiters")]
    pub signature_delimiters: Vec<String>,
    /// Regexes removed anywhere in the text.
    #[serde(default = "default_attachment_markers")]
    pub attachment_markers: Vec<String>,
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self {
            encoding_confidence_threshold: default_encoding_confidence_threshold(),
            header_fields: default_header_fields(),
            forwarded_markers: default_forwarded_markers(),
            reply_markers: default_reply_markers(),
            quote_markers: default_quote_markers(),
            signature_delimiters: default_signature_delimiters(),
            attachment_markers: default_attachment_markers(),
        }
    }
}

fn default_encoding_confidence_threshold() -> f32 {
    0.75
}

fn owned(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

fn default_header_fields() -> Vec<String> {
    owned(HEADER_FIELDS)
}

fn default_forwarded_markers() -> Vec<String> {
    owned(FORWARDED_MARKERS)
}

fn default_reply_markers() -> Vec<String> {
    owned(REPLY_MARKERS)
}

fn default_quote_markers() -> Vec<String> {
    owned(QUOTE_MARKERS)
}

fn default_signature_delimiters() -> Vec<String> {
    owned(SIGNATURE_DELIMITERS)
}

fn default_attachment_markers() -> Vec<String> {
    owned(ATTACHMENT_MARKERS)
}

// Second half of a wrapped attribution: "wrote:" alone, or an address then "wrote:".
fn re_wrapped_attribution_tail() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)^(?:.*\S+@\S+\s+)?wrote:$").unwrap())
}

fn compile(pattern: &str) -> Result<Regex, ConfigError> {
    RegexBuilder::new(pattern)
        .case_insensitive(true)
        .build()
        .map_err(|e| ConfigError::pattern(pattern, e))
}

fn compile_any(patterns: &[String]) -> Result<Vec<Regex>, ConfigError> {
    patterns.iter().map(|p| compile(p)).collect()
}

/// Compiled marker tables.
#[derive(Debug, Clone)]
pub struct MarkerSet {
    header: Option<Regex>,
    /// Header names that mark a line in a forwarded block as the original's headers.
    forwarded_header: Regex,
    forwarded: Vec<Regex>,
    reply: Vec<Regex>,
    quote_markers: Vec<String>,
    signatures: Vec<String>,
    attachments: Vec<Regex>,
}

impl MarkerSet {
    pub fn new(config: &NormalizerConfig) -> Result<Self, ConfigError> {
        let fields: Vec<String> = config
            .header_fields
            .iter()
            .map(|f| f.trim())
            .filter(|f| !f.is_empty())
            .map(regex::escape)
            .collect();
        let header = if fields.is_empty() {
            None
        } else {
            let pattern = format!(r"(?m)^[ \t]*(?:{}):[^\n]*(?:\n|$)", fields.join("|"));
            Some(compile(&pattern)?)
        };
        let mut forwarded_fields = fields;
        forwarded_fields.push("Sent".to_string());
        let forwarded_header = compile(&format!(r"^(?:{}):(\s|$)", forwarded_fields.join("|")))?;

        Ok(Self {
            header,
            forwarded_header,
            forwarded: compile_any(&config.forwarded_markers)?,
            reply: compile_any(&config.reply_markers)?,
            quote_markers: config
                .quote_markers
                .iter()
                .filter(|m| !m.is_empty())
                .cloned()
                .collect(),
            signatures: config
                .signature_delimiters
                .iter()
                .map(|s| s.trim().to_lowercase())
                .filter(|s| !s.is_empty())
                .collect(),
            attachments: compile_any(&config.attachment_markers)?,
        })
    }

    /// Remove copied header lines ("From: ...", "Subject: ...").
    pub fn strip_headers(&self, text: &str) -> String {
        match &self.header {
            Some(re) => re.replace_all(text, "").into_owned(),
            None => text.to_string(),
        }
    }

    /// Remove forwarded-message marker lines, plus the header block after each
    /// one when every line in it is a known header or quoted.
    pub fn strip_forwarded(&self, text: &str) -> String {
        let lines: Vec<&str> = text.lines().collect();
        let mut kept = Vec::with_capacity(lines.len());
        let mut i = 0;
        while i < lines.len() {
            let line = lines[i];
            if !self.forwarded.iter().any(|re| re.is_match(line.trim())) {
                kept.push(line);
                i += 1;
                continue;
            }
            i += 1;
            let block_end = lines[i..]
                .iter()
                .position(|l| l.trim().is_empty())
                .map_or(lines.len(), |p| i + p);
            let block = &lines[i..block_end];
            if !block.is_empty()
                && block
                    .iter()
                    .all(|l| self.forwarded_header.is_match(l.trim_start()) || self.is_quoted(l))
            {
                i = block_end;
            }
        }
        kept.join("\n")
    }

    /// Remove "On ... wrote:" attributions and the quoted lines right after them.
    pub fn strip_replies(&self, text: &str) -> String {
        let lines: Vec<&str> = text.lines().collect();
        let mut kept = Vec::with_capacity(lines.len());
        let mut i = 0;
        while i < lines.len() {
            let consumed = self.reply_marker_len(&lines[i..]);
            if consumed == 0 {
                kept.push(lines[i]);
                i += 1;
                continue;
            }
            i += consumed;
            while i < lines.len() && (self.is_quoted(lines[i]) || lines[i].trim().is_empty()) {
                i += 1;
            }
        }
        kept.join("\n")
    }

    /// Number of lines (0, 1 or 2) forming a reply attribution at the head of `lines`.
    fn reply_marker_len(&self, lines: &[&str]) -> usize {
        let first = lines[0].trim();
        if self.reply.iter().any(|re| re.is_match(first)) {
            return 1;
        }
        // Clients wrap long attributions: "On Mon, ... <a@b.com>\nwrote:"
        if let Some(next) = lines.get(1).map(|l| l.trim()) {
            if !re_wrapped_attribution_tail().is_match(next) {
                return 0;
            }
            let joined = format!("{} {}", first, next);
            if self.reply.iter().any(|re| re.is_match(&joined)) {
                return 2;
            }
        }
        0
    }

    /// Remove every line opened by a quote marker.
    pub fn strip_quoted(&self, text: &str) -> String {
        text.lines()
            .filter(|l| !self.is_quoted(l))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Truncate at the first line that is exactly a signature delimiter.
    pub fn strip_signature(&self, text: &str) -> String {
        let mut kept = Vec::new();
        for line in text.lines() {
            let lower = line.trim().to_lowercase();
            if self.signatures.iter().any(|s| *s == lower) {
                break;
            }
            kept.push(line);
        }
        kept.join("\n")
    }

    /// Remove inline attachment placeholders.
    pub fn strip_attachments(&self, text: &str) -> String {
        let mut out = text.to_string();
        for re in &self.attachments {
            out = re.replace_all(&out, " ").into_owned();
        }
        out
    }

    fn is_quoted(&self, line: &str) -> bool {
        let trimmed = line.trim_start();
        self.quote_markers.iter().any(|m| trimmed.starts_with(m.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn markers() -> MarkerSet {
        MarkerSet::new(&NormalizerConfig::default()).unwrap()
    }

    #[test]
    fn test_tables_populated() {
        assert!(HEADER_FIELDS.contains(&"Subject"));
        assert!(!FORWARDED_MARKERS.is_empty());
        assert!(!SIGNATURE_DELIMITERS.is_empty());
    }

    #[test]
    fn test_strip_headers_case_insensitive() {
        let m = markers();
        let out = m.strip_headers("FROM: a@b.com\nsubject: Hi\nBody stays\n  Cc: c@d.com");
        assert_eq!(out, "Body stays\n");
    }

    #[test]
    fn test_strip_headers_leaves_inline_words() {
        let m = markers();
        let out = m.strip_headers("Please send it to: Bob");
        assert_eq!(out, "Please send it to: Bob");
    }

    #[test]
    fn test_forwarded_header_block_removed() {
        let m = markers();
        let text = "FYI\n---------- Forwarded message ---------\nSent: Monday\nfrom: x@y.com\n> quoted\n\nOriginal text";
        assert_eq!(m.strip_forwarded(text), "FYI\n\nOriginal text");
    }

    #[test]
    fn test_forwarded_unknown_field_keeps_block() {
        let m = markers();
        let text = "Begin forwarded message:\nNote: the review moved to 2024-03-15 at 10:00\n\nSee below.";
        assert_eq!(
            m.strip_forwarded(text),
            "Note: the review moved to 2024-03-15 at 10:00\n\nSee below."
        );
        let text = "Begin forwarded message:\nSent: Monday\nX-Mailer: Foo\n\nSee below.";
        assert_eq!(m.strip_forwarded(text), "Sent: Monday\nX-Mailer: Foo\n\nSee below.");
    }

    #[test]
    fn test_forwarded_ambiguous_block_kept() {
        let m = markers();
        let text = "Begin forwarded message:\nPlease review the plan\n\nMore";
        assert_eq!(m.strip_forwarded(text), "Please review the plan\n\nMore");
    }

    #[test]
    fn test_reply_single_line() {
        let m = markers();
        let text = "Sounds good\nOn Mon, Jan 5, 2024, John Doe wrote:\n> Can we meet?\n>\nLater text";
        assert_eq!(m.strip_replies(text), "Sounds good\nLater text");
    }

    #[test]
    fn test_reply_wrapped_attribution() {
        let m = markers();
        let text = "Ok\nOn Tue, Feb 6, 2024 at 9:00 AM Jane <jane@x.com>\nwrote:\n> old";
        assert_eq!(m.strip_replies(text), "Ok");
    }

    #[test]
    fn test_reply_wrapped_with_address() {
        let m = markers();
        let text = "Ok\nOn Tue, Feb 6, 2024 at 9:00 AM\nJane <jane@x.com> wrote:\n> old";
        assert_eq!(m.strip_replies(text), "Ok");
    }

    #[test]
    fn test_content_line_starting_with_on_is_kept() {
        let m = markers();
        let text = "On 2024-03-15 at 10:00 we review the budget.\nMaria wrote:\n> ok";
        assert_eq!(m.strip_replies(text), text);
    }

    #[test]
    fn test_strip_quoted() {
        let m = markers();
        assert_eq!(m.strip_quoted("keep\n> drop\n  | drop too\nkeep2"), "keep\nkeep2");
    }

    #[test]
    fn test_signature_truncates() {
        let m = markers();
        let text = "See you then.\n-- \nJohn Doe\nCEO, Example";
        assert_eq!(m.strip_signature(text), "See you then.");
    }

    #[test]
    fn test_signoff_truncates_case_insensitive() {
        let m = markers();
        assert_eq!(m.strip_signature("Body\nBEST REGARDS,\nSender"), "Body");
    }

    #[test]
    fn test_attachment_markers() {
        let m = markers();
        let out = m.strip_attachments("Look [image: chart.png] and <image001> here [cid:abc@x]");
        assert!(!out.contains("image"));
        assert!(!out.contains("cid"));
        assert!(out.contains("Look"));
    }

    #[test]
    fn test_invalid_pattern_rejected() {
        let config = NormalizerConfig {
            reply_markers: vec!["(".to_string()],
            ..NormalizerConfig::default()
        };
        assert!(matches!(
            MarkerSet::new(&config),
            Err(ConfigError::InvalidPattern { .. })
        ));
    }

    #[test]
    fn test_partial_json_override() {
        let config: NormalizerConfig =
            serde_json::from_str(r#"{"signatureDelimiters": ["Ciao,"]}"#).unwrap();
        assert_eq!(config.signature_delimiters, vec!["Ciao,".to_string()]);
        assert_eq!(config.header_fields.len(), HEADER_FIELDS.len());
        assert_eq!(config.encoding_confidence_threshold, 0.75);
    }
}
