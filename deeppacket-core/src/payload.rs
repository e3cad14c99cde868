//! Text heuristics applied to HTTP/2 DATA payloads.
//!
//! Raw frame bytes are re-linearized into printable lines, a JSON object or
//! array is sniffed out of the result, and the candidate is re-indented for
//! display. None of these steps fail: garbage in produces an empty string or
//! no candidate.

use std::iter::Peekable;
use std::str::Chars;
use std::sync::LazyLock;

use regex::Regex;
use serde::de::IgnoredAny;

/// Keywords after which a line break is forced.
const LINE_BREAK_KEYWORDS: [&str; 3] = [":path", "content-type", "location"];

/// Minimum length a sniffed candidate must exceed.
const MIN_CONTENT_LEN: usize = 3;

/// First brace- or bracket-delimited span, greedy to the last closer.
static JSON_SPAN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{[\s\S]*\}|\[[\s\S]*\]").expect("Invalid JSON span regex pattern")
});

/// Re-linearize raw payload bytes into printable lines.
///
/// Every byte outside `32..=126` becomes a line break, the text is trimmed,
/// empty lines are dropped, and the character right after any of `:path`,
/// `content-type` or `location` is replaced by a line break unless it
/// already is one or is a space.
pub fn format_payload(data: &[u8]) -> String {
    let cleaned: String = data
        .iter()
        .map(|&b| if (32..=126).contains(&b) { b as char } else { '\n' })
        .collect();

    cleaned
        .trim()
        .split('\n')
        .filter(|line| !line.is_empty())
        .map(break_after_keywords)
        .collect::<Vec<_>>()
        .join("\n")
}

fn break_after_keywords(line: &str) -> String {
    // Only ASCII survives `format_payload`, so byte offsets are char offsets
    let mut bytes = line.as_bytes().to_vec();
    for keyword in LINE_BREAK_KEYWORDS {
        let Some(pos) = find(&bytes, keyword.as_bytes()) else {
            continue;
        };
        let next = pos + keyword.len();
        if next < bytes.len() && bytes[next] != b'\n' && bytes[next] != b' ' {
            bytes[next] = b'\n';
        }
    }
    String::from_utf8_lossy(&bytes).into_owned()
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

/// Find the JSON-looking span in re-linearized text.
///
/// The match is not nesting-aware: it runs from the leftmost `{` (or `[`)
/// that has a closer anywhere after it to the last such closer.
pub fn sniff_json(text: &str) -> Option<&str> {
    JSON_SPAN_RE
        .find(text)
        .map(|m| m.as_str())
        .filter(|s| s.len() > MIN_CONTENT_LEN)
}

/// Pretty-print JSON text with two-space indentation.
///
/// Only whitespace between tokens changes: duplicate keys, escapes and
/// number spelling come out as they went in. Empty objects and arrays stay
/// on one line. Text that is not valid JSON is returned unchanged.
pub fn reindent_json(text: &str) -> String {
    if let Err(e) = serde_json::from_str::<IgnoredAny>(text) {
        tracing::trace!(error = %e, "content is not valid JSON, keeping raw text");
        return text.to_string();
    }

    let mut out = String::with_capacity(text.len() * 2);
    let mut depth = 0usize;
    let mut chars = text.trim().chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '"' => {
                out.push(c);
                copy_string(&mut chars, &mut out);
            }
            '{' | '[' => {
                out.push(c);
                skip_whitespace(&mut chars);
                match chars.next_if(|&next| next == '}' || next == ']') {
                    Some(close) => out.push(close),
                    None => {
                        depth += 1;
                        newline(&mut out, depth);
                    }
                }
            }
            '}' | ']' => {
                depth = depth.saturating_sub(1);
                newline(&mut out, depth);
                out.push(c);
            }
            ',' => {
                out.push(c);
                newline(&mut out, depth);
            }
            ':' => out.push_str(": "),
            c if c.is_ascii_whitespace() => {}
            c => out.push(c),
        }
    }
    out
}

/// Copy the rest of a string literal, closing quote included.
fn copy_string(chars: &mut Peekable<Chars<'_>>, out: &mut String) {
    let mut escaped = false;
    for c in chars.by_ref() {
        out.push(c);
        match c {
            _ if escaped => escaped = false,
            '\\' => escaped = true,
            '"' => return,
            _ => {}
        }
    }
}

fn skip_whitespace(chars: &mut Peekable<Chars<'_>>) {
    while chars.next_if(|c| c.is_ascii_whitespace()).is_some() {}
}

fn newline(out: &mut String, depth: usize) {
    out.push('\n');
    for _ in 0..depth {
        out.push_str("  ");
    }
}
