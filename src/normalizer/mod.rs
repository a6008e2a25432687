//! Email body normalization.
//!
//! Turns raw body bytes into canonical text: encoding repair, then structural
//! noise removal (headers, forwarded/reply markers, quoted lines, signatures,
//! attachment placeholders), then whitespace collapse.
//!
//! Pure and stateless after construction; safe to share across threads.

pub mod encoding;
pub mod markers;

use std::sync::OnceLock;

pub use encoding::{canonical_chars, decode_body, DecodeSource, DecodedText};
pub use markers::{MarkerSet, NormalizerConfig};

use crate::error::ConfigError;

/// Wrap width handed to html2text; wide enough that it never re-wraps prose.
const HTML_WRAP_WIDTH: usize = 10_000;

/// Compiled normalizer.
#[derive(Debug, Clone)]
pub struct Normalizer {
    markers: MarkerSet,
    confidence_threshold: f32,
}

impl Normalizer {
    pub fn new(config: &NormalizerConfig) -> Result<Self, ConfigError> {
        if !(0.0..=1.0).contains(&config.encoding_confidence_threshold) {
            return Err(ConfigError::InvalidValue {
                field: "normalizer.encodingConfidenceThreshold",
                reason: format!("{} is outside 0.0..=1.0", config.encoding_confidence_threshold),
            });
        }
        Ok(Self {
            markers: MarkerSet::new(config)?,
            confidence_threshold: config.encoding_confidence_threshold,
        })
    }

    /// Normalize raw body bytes, honoring the declared charset when it decodes cleanly.
    pub fn normalize(&self, raw: &[u8], declared_charset: Option<&str>) -> String {
        let decoded = decode_body(raw, declared_charset, self.confidence_threshold);
        self.clean(&decoded.text)
    }

    /// Normalize an HTML part: decode, render to text, then clean.
    pub fn normalize_html(&self, raw: &[u8], declared_charset: Option<&str>) -> String {
        let decoded = decode_body(raw, declared_charset, self.confidence_threshold);
        let text = html_to_text(&decoded.text)
            .map(|t| canonical_chars(&t))
            .unwrap_or(decoded.text);
        self.clean(&text)
    }

    /// Normalize text that is already decoded.
    pub fn normalize_str(&self, text: &str) -> String {
        self.normalize(text.as_bytes(), None)
    }

    /// Render HTML, strip line markers, then strip placeholders and collapse.
    ///
    /// The line passes run once, and only on text that still has line
    /// structure. A single line is what this function returns, so it is taken
    /// as already clean; that keeps `normalize` idempotent. Placeholder removal
    /// and collapsing repeat until the text stops changing, which always ends
    /// because neither pass lengthens the text.
    pub fn clean(&self, text: &str) -> String {
        let text = render_html(text);
        let text = if text.contains('\n') {
            self.strip_line_markers(&text)
        } else {
            text
        };
        let mut current = collapse_whitespace(&self.markers.strip_attachments(&text));
        loop {
            let next = collapse_whitespace(&self.markers.strip_attachments(&current));
            if next == current {
                return current;
            }
            current = next;
        }
    }

    fn strip_line_markers(&self, text: &str) -> String {
        let text = self.markers.strip_headers(text);
        let text = self.markers.strip_forwarded(&text);
        let text = self.markers.strip_replies(&text);
        let text = self.markers.strip_quoted(&text);
        self.markers.strip_signature(&text)
    }
}

/// Render HTML until no document wrapper is left. Entity-escaped markup
/// renders to markup one layer at a time; each render must shrink the text.
fn render_html(text: &str) -> String {
    let mut current = text.to_string();
    while looks_like_html(&current) {
        match html_to_text(&current).map(|r| canonical_chars(&r)) {
            Some(rendered) if rendered.len() < current.len() => current = rendered,
            _ => break,
        }
    }
    current
}

fn default_normalizer() -> &'static Normalizer {
    static NORMALIZER: OnceLock<Normalizer> = OnceLock::new();
    NORMALIZER.get_or_init(|| {
        Normalizer::new(&NormalizerConfig::default()).expect("default marker tables compile")
    })
}

/// Normalize with the default marker tables.
pub fn normalize(raw: &[u8], declared_charset: Option<&str>) -> String {
    default_normalizer().normalize(raw, declared_charset)
}

/// Collapse every whitespace run to one space and trim both ends.
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Heuristic HTML sniff, matching bodies that carry a document wrapper.
pub fn looks_like_html(text: &str) -> bool {
    let lower = text.to_lowercase();
    lower.contains("<html") || lower.contains("<body")
}

/// Render HTML to plain text. Returns None if html2text rejects the input.
pub fn html_to_text(html: &str) -> Option<String> {
    html2text::from_read(html.as_bytes(), HTML_WRAP_WIDTH).ok()
}

/// Whether cleaned content carries enough text to be worth summarizing.
pub fn is_meaningful(content: &str, min_chars: usize) -> bool {
    let trimmed = content.trim();
    if trimmed.chars().count() < min_chars {
        return false;
    }
    if trimmed.chars().all(|c| c.is_whitespace() || !c.is_alphanumeric()) {
        return false;
    }
    if trimmed.chars().all(|c| c.is_whitespace() || c.is_ascii_digit()) {
        return false;
    }
    let letters = trimmed.chars().filter(|c| !c.is_whitespace()).count();
    let all_alpha = trimmed
        .chars()
        .all(|c| c.is_ascii_alphabetic() || c.is_whitespace());
    !(all_alpha && letters <= 3)
}
