//! Linkify - turns markdown links and bare URLs into anchor segments
//!
//! Matching is a single left-to-right scan, so a URL inside a markdown span
//! is consumed by the span and never linked twice. Targets are percent-encoded
//! with the `encodeURI` character set, so relative and scheme-less targets
//! link as written. A target that cannot be encoded leaves its whole match as
//! plain text; the rest of the message is still processed.

use std::sync::OnceLock;

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use regex::{Captures, Regex};

use crate::error::{Result, WidgetError};

/// Characters `encodeURI` leaves alone: URI reserved marks, `#` and the
/// unreserved punctuation.
const URI_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')')
    .remove(b';')
    .remove(b'/')
    .remove(b'?')
    .remove(b':')
    .remove(b'@')
    .remove(b'&')
    .remove(b'=')
    .remove(b'+')
    .remove(b'$')
    .remove(b',')
    .remove(b'#');

/// Schemes that would run code when the anchor is followed.
const SCRIPT_SCHEMES: [&str; 3] = ["javascript:", "vbscript:", "data:"];

const LINK_PATTERN: &str = r"(\[([^\]]+)\]\(([^)]+)\))|(https?://[^\s<]+)";

fn link_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(LINK_PATTERN).expect("link pattern is valid"))
}

/// A run of message content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Text(String),
    Link { href: String, label: String },
}

impl Segment {
    /// The text a reader sees for this segment.
    pub fn visible_text(&self) -> &str {
        match self {
            Segment::Text(text) => text,
            Segment::Link { label, .. } => label,
        }
    }
}

/// Split `text` into plain and link segments.
pub fn linkify(text: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut last = 0;

    for caps in link_regex().captures_iter(text) {
        let Some(whole) = caps.get(0) else {
            continue;
        };
        push_text(&mut segments, &text[last..whole.start()]);
        match link_from_captures(&caps) {
            Ok(link) => segments.push(link),
            Err(e) => {
                tracing::warn!("Leaving link unprocessed: {}", e);
                push_text(&mut segments, whole.as_str());
            }
        }
        last = whole.end();
    }
    push_text(&mut segments, &text[last..]);
    segments
}

fn link_from_captures(caps: &Captures<'_>) -> Result<Segment> {
    if let (Some(label), Some(target)) = (caps.get(2), caps.get(3)) {
        return Ok(Segment::Link {
            href: encode_url(target.as_str())?,
            label: label.as_str().to_string(),
        });
    }
    let raw = caps.get(4).map(|m| m.as_str()).unwrap_or_default();
    Ok(Segment::Link {
        href: encode_url(raw)?,
        label: raw.to_string(),
    })
}

/// Percent-encode a link target the way `encodeURI` does. Existing escapes
/// are encoded again, as `encodeURI` would.
pub fn encode_url(raw: &str) -> Result<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(invalid_url(raw, "empty target"));
    }
    let lowered = raw.to_ascii_lowercase();
    if let Some(scheme) = SCRIPT_SCHEMES.iter().find(|s| lowered.starts_with(**s)) {
        return Err(invalid_url(raw, &format!("{} links are not allowed", scheme)));
    }
    Ok(utf8_percent_encode(raw, URI_ENCODE_SET).to_string())
}

fn invalid_url(url: &str, reason: &str) -> WidgetError {
    WidgetError::InvalidUrl {
        url: url.to_string(),
        reason: reason.to_string(),
    }
}

fn push_text(segments: &mut Vec<Segment>, text: &str) {
    if text.is_empty() {
        return;
    }
    if let Some(Segment::Text(prev)) = segments.last_mut() {
        prev.push_str(text);
    } else {
        segments.push(Segment::Text(text.to_string()));
    }
}

/// Concatenated visible text, as a DOM `textContent` read would return it.
pub fn text_content(segments: &[Segment]) -> String {
    segments.iter().map(Segment::visible_text).collect()
}

/// Render segments as HTML. Links open in a new browsing context without
/// an opener reference.
pub fn to_html(segments: &[Segment]) -> String {
    let mut html = String::new();
    for segment in segments {
        match segment {
            Segment::Text(text) => html.push_str(&escape_html(text)),
            Segment::Link { href, label } => {
                html.push_str(&format!(
                    r#"<a href="{}" target="_blank" rel="noopener noreferrer">{}</a>"#,
                    escape_html(href),
                    escape_html(label)
                ));
            }
        }
    }
    html
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
