//! MIME handling for bodies that carry a full RFC 822 message.
//!
//! Some fetchers hand over the raw message instead of the decoded body. When
//! the body opens with a header block, walk its parts with mailparse and
//! return the text parts with transfer encoding already undone.

use std::sync::OnceLock;

use mailparse::{MailHeader, ParsedMail};
use regex::Regex;

// "Name: value" header line
fn re_header_line() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z][A-Za-z0-9-]*:").unwrap())
}

/// A decoded text part: transfer encoding removed, charset not yet applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextPart {
    pub mime_type: String,
    /// Only set when the part declares one; mailparse otherwise reports us-ascii.
    pub charset: Option<String>,
    pub raw: Vec<u8>,
}

/// The lines before the first blank line, if they all look like headers.
fn header_block(body: &str) -> Option<Vec<&str>> {
    let mut lines = Vec::new();
    for line in body.lines() {
        if line.trim().is_empty() {
            break;
        }
        // Folded continuation line
        if line.starts_with([' ', '\t']) && !lines.is_empty() {
            lines.push(line);
            continue;
        }
        if !re_header_line().is_match(line) {
            return None;
        }
        lines.push(line);
    }
    if lines.is_empty() {
        None
    } else {
        Some(lines)
    }
}

/// True when the body opens with a header block.
pub fn has_header_block(body: &str) -> bool {
    header_block(body).is_some()
}

/// True when the body is a MIME message (header block declaring content type or MIME version).
pub fn looks_like_mime(body: &str) -> bool {
    header_block(body).is_some_and(|lines| {
        lines.iter().any(|l| {
            let lower = l.to_ascii_lowercase();
            lower.starts_with("content-type:") || lower.starts_with("mime-version:")
        })
    })
}

/// Parse the leading header block. Empty when the body has none.
pub fn headers(body: &str) -> Vec<MailHeader<'_>> {
    if !has_header_block(body) {
        return Vec::new();
    }
    mailparse::parse_headers(body.as_bytes())
        .map(|(headers, _)| headers)
        .unwrap_or_default()
}

/// Text parts of a MIME body: every text/plain part, or every text/html part
/// when there is no plain one. None if the body is not MIME or fails to parse.
pub fn text_parts(body: &str) -> Option<Vec<TextPart>> {
    if !looks_like_mime(body) {
        return None;
    }
    let parsed = mailparse::parse_mail(body.as_bytes()).ok()?;

    let mut plain = Vec::new();
    let mut html = Vec::new();
    collect_text_parts(&parsed, &mut plain, &mut html);

    Some(if plain.is_empty() { html } else { plain })
}

fn collect_text_parts(part: &ParsedMail<'_>, plain: &mut Vec<TextPart>, html: &mut Vec<TextPart>) {
    if part.subparts.is_empty() {
        let mime_type = part.ctype.mimetype.to_lowercase();
        let target = match mime_type.as_str() {
            "text/plain" => plain,
            "text/html" => html,
            _ => return,
        };
        if let Ok(raw) = part.get_body_raw() {
            target.push(TextPart {
                mime_type,
                charset: part
                    .ctype
                    .params
                    .contains_key("charset")
                    .then(|| part.ctype.charset.clone()),
                raw,
            });
        }
        return;
    }
    for sub in &part.subparts {
        collect_text_parts(sub, plain, html);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mailparse::MailHeaderMap;

    const MULTIPART: &str = "From: Jane <jane@example.com>\r\n\
To: bob@example.com\r\n\
Subject: Sync\r\n\
MIME-Version: 1.0\r\n\
Content-Type: multipart/alternative; boundary=\"XYZ\"\r\n\
\r\n\
--XYZ\r\n\
Content-Type: text/plain; charset=\"utf-8\"\r\n\
Content-Transfer-Encoding: quoted-printable\r\n\
\r\n\
Let's meet on 2024-03-15 at 2:30 PM =E2=80=94 room 4.\r\n\
--XYZ\r\n\
Content-Type: text/html; charset=\"utf-8\"\r\n\
\r\n\
<html><body>Let's meet</body></html>\r\n\
--XYZ--\r\n";

    #[test]
    fn test_plain_body_is_not_mime() {
        assert!(!looks_like_mime("Let's meet on 2024-03-15 at 2:30 PM"));
        assert!(text_parts("Hi: there\nplain text").is_none());
        assert!(headers("Hello Bob,\nsee you").is_empty());
    }

    #[test]
    fn test_header_block_without_content_type() {
        let body = "From: a@b.com\nSubject: Hi\n\nNo meeting info here.";
        assert!(has_header_block(body));
        assert!(!looks_like_mime(body));
        let hs = headers(body);
        assert_eq!(hs.get_first_value("Subject").as_deref(), Some("Hi"));
    }

    #[test]
    fn test_multipart_prefers_plain_and_decodes_qp() {
        assert!(looks_like_mime(MULTIPART));
        let parts = text_parts(MULTIPART).unwrap();
        assert_eq!(parts.len(), 1);
        assert_eq!(parts[0].mime_type, "text/plain");
        assert_eq!(parts[0].charset.as_deref(), Some("utf-8"));
        let text = String::from_utf8(parts[0].raw.clone()).unwrap();
        assert!(text.contains("2024-03-15 at 2:30 PM \u{2014} room 4."));
    }

    #[test]
    fn test_html_only_message() {
        let body = "Content-Type: text/html; charset=utf-8\n\n<html><body><p>Call at 10:00</p></body></html>";
        let parts = text_parts(body).unwrap();
        assert_eq!(parts.len(), 1);
        assert_eq!(parts[0].mime_type, "text/html");
    }

    #[test]
    fn test_undeclared_charset_is_none() {
        let body = "Content-Type: text/plain\n\nCaf\u{e9} at 10:00";
        let parts = text_parts(body).unwrap();
        assert_eq!(parts[0].charset, None);
        assert_eq!(parts[0].raw, "Caf\u{e9} at 10:00".as_bytes().to_vec());
    }

    #[test]
    fn test_base64_part() {
        // "Lunch 2024-05-01 at 1 PM"
        let body = "Content-Type: text/plain; charset=us-ascii\n\
Content-Transfer-Encoding: base64\n\n\
THVuY2ggMjAyNC0wNS0wMSBhdCAxIFBN\n";
        let parts = text_parts(body).unwrap();
        assert_eq!(parts[0].raw, b"Lunch 2024-05-01 at 1 PM".to_vec());
    }

    #[test]
    fn test_folded_header_line() {
        let body = "Subject: a very\n long subject\nContent-Type: text/plain\n\nbody";
        assert!(looks_like_mime(body));
    }
}
