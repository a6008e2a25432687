//! Character encoding repair for raw email bodies.
//!
//! Detection priority:
//! 1. BOM (Byte Order Mark) - most reliable
//! 2. Declared charset, decoded strictly
//! 3. UTF-8 validation - if valid UTF-8, assume UTF-8
//! 4. chardetng statistical guess, accepted above a confidence threshold
//! 5. Lossy UTF-8 with replacement characters
//!
//! Never fails: every path produces some string.

use chardetng::EncodingDetector;
use encoding_rs::{Encoding, UTF_8};
use unicode_normalization::UnicodeNormalization;

/// Penalty applied when chardetng itself is not confident in its guess.
const UNCONFIDENT_GUESS_FACTOR: f32 = 0.8;

/// How a body was decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeSource {
    Bom,
    Declared,
    Utf8,
    Detected,
    Lossy,
}

/// Decoded body text plus the decision trail that produced it.
#[derive(Debug, Clone)]
pub struct DecodedText {
    pub text: String,
    pub encoding: &'static Encoding,
    pub source: DecodeSource,
    /// 0.0..=1.0; 1.0 for BOM, declared and valid UTF-8 decodes.
    pub confidence: f32,
}

/// Decode raw body bytes into NFC-normalized text.
pub fn decode_body(raw: &[u8], declared_charset: Option<&str>, threshold: f32) -> DecodedText {
    let mut decoded = decode_raw(raw, declared_charset, threshold);
    decoded.text = canonical_chars(&decoded.text);
    decoded
}

/// NFC with NUL and stray U+FEFF dropped. A leading U+FEFF would read as a
/// BOM on the next decode.
pub fn canonical_chars(text: &str) -> String {
    text.nfc().filter(|c| !matches!(c, '\0' | '\u{feff}')).collect()
}

fn decode_raw(raw: &[u8], declared_charset: Option<&str>, threshold: f32) -> DecodedText {
    if let Some((encoding, bom_len)) = Encoding::for_bom(raw) {
        let (text, _) = encoding.decode_without_bom_handling(&raw[bom_len..]);
        return DecodedText {
            text: text.into_owned(),
            encoding,
            source: DecodeSource::Bom,
            confidence: 1.0,
        };
    }

    if let Some(encoding) = declared_charset.and_then(|c| Encoding::for_label(c.trim().as_bytes())) {
        if let Some(text) = encoding.decode_without_bom_handling_and_without_replacement(raw) {
            return DecodedText {
                text: text.into_owned(),
                encoding,
                source: DecodeSource::Declared,
                confidence: 1.0,
            };
        }
    }

    if let Ok(text) = std::str::from_utf8(raw) {
        return DecodedText {
            text: text.to_string(),
            encoding: UTF_8,
            source: DecodeSource::Utf8,
            confidence: 1.0,
        };
    }

    let mut detector = EncodingDetector::new();
    detector.feed(raw, true);
    let (encoding, confident) = detector.guess_assess(None, true);
    let (text, _) = encoding.decode_without_bom_handling(raw);

    let mut confidence = clean_ratio(&text);
    if !confident {
        confidence *= UNCONFIDENT_GUESS_FACTOR;
    }

    if confidence >= threshold {
        return DecodedText {
            text: text.into_owned(),
            encoding,
            source: DecodeSource::Detected,
            confidence,
        };
    }

    DecodedText {
        text: String::from_utf8_lossy(raw).into_owned(),
        encoding: UTF_8,
        source: DecodeSource::Lossy,
        confidence,
    }
}

/// Fraction of characters that are neither U+FFFD nor stray control characters.
fn clean_ratio(text: &str) -> f32 {
    let mut total = 0usize;
    let mut bad = 0usize;
    for c in text.chars() {
        total += 1;
        if c == char::REPLACEMENT_CHARACTER || (c.is_control() && !matches!(c, '\n' | '\r' | '\t' | '\x0c')) {
            bad += 1;
        }
    }
    if total == 0 {
        return 1.0;
    }
    1.0 - bad as f32 / total as f32
}
