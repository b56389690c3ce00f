//! Repair ladder for near-valid JSON written by a language model.
//!
//! Model output is not guaranteed to be valid JSON. Before giving up on a
//! payload we run it through a fixed sequence of small, pure transforms that
//! undo the common malformations: markdown fences, upper-case boolean
//! literals, trailing commas and truncated output. The first step that cannot
//! continue stops the ladder and the caller falls back to regex extraction.

use serde_json::{Map, Value};
use tracing::debug;

/// Why a payload could not be turned into a JSON object.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RepairError {
    #[error("payload is empty")]
    Empty,
    #[error("payload does not start with a JSON object")]
    NotAnObject,
    #[error("payload is still not a JSON object after repair: {0}")]
    Unparseable(String),
}

/// One rung of the ladder.
pub type RepairStep = fn(&str) -> Result<String, RepairError>;

/// The ladder, in the order it is applied.
pub fn pipeline() -> [(&'static str, RepairStep); 5] {
    [
        ("strip_code_fence", |s| Ok(strip_code_fence(s))),
        ("require_object", require_object),
        ("normalize_booleans", |s| Ok(normalize_booleans(s))),
        ("strip_trailing_commas", |s| Ok(strip_trailing_commas(s))),
        ("close_unterminated", |s| Ok(close_unterminated(s))),
    ]
}

/// Parses `raw` as a JSON object, repairing it if the strict parse fails.
pub fn repair(raw: &str) -> Result<Map<String, Value>, RepairError> {
    if let Ok(object) = parse_object(raw) {
        return Ok(object);
    }

    let mut text = raw.to_string();
    for (name, step) in pipeline() {
        text = step(&text).inspect_err(|e| debug!(step = name, error = %e, "Repair ladder stopped"))?;
    }
    debug!(repaired = %text, "Repair ladder produced candidate");
    parse_object(&text)
}

/// Strict parse of a JSON object.
pub fn parse_object(text: &str) -> Result<Map<String, Value>, RepairError> {
    match serde_json::from_str::<Value>(text.trim()) {
        Ok(Value::Object(object)) => Ok(object),
        Ok(_) => Err(RepairError::NotAnObject),
        Err(e) => Err(RepairError::Unparseable(e.to_string())),
    }
}

/// Removes a surrounding markdown code fence (```` ```json ... ``` ````).
pub fn strip_code_fence(text: &str) -> String {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed.to_string();
    };
    // Drop the info string (`json`, `JSON`, ...) on the opening fence line.
    let body = match rest.find('\n') {
        Some(idx) => &rest[idx + 1..],
        None => rest.trim_start_matches(|c: char| c.is_ascii_alphabetic()),
    };
    body.trim_end()
        .trim_end_matches("```")
        .trim()
        .to_string()
}

/// Accepts only payloads that open a JSON object.
pub fn require_object(text: &str) -> Result<String, RepairError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(RepairError::Empty);
    }
    if !trimmed.starts_with('{') {
        return Err(RepairError::NotAnObject);
    }
    Ok(trimmed.to_string())
}

/// Lower-cases `TRUE`/`True`/`FALSE`/`False` literals outside of strings.
pub fn normalize_booleans(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut scanner = StringScanner::default();
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if scanner.in_string || !c.is_ascii_alphabetic() {
            scanner.feed(c);
            out.push(c);
            continue;
        }
        let mut word = String::from(c);
        while let Some(&next) = chars.peek() {
            if !next.is_ascii_alphanumeric() {
                break;
            }
            word.push(next);
            chars.next();
        }
        match word.as_str() {
            "TRUE" | "True" => out.push_str("true"),
            "FALSE" | "False" => out.push_str("false"),
            _ => out.push_str(&word),
        }
    }
    out
}

/// Drops commas that are followed only by whitespace and then a closing
/// bracket or the end of the payload.
pub fn strip_trailing_commas(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut scanner = StringScanner::default();

    for (i, &c) in chars.iter().enumerate() {
        if c == ',' && !scanner.in_string {
            let next = chars[i + 1..].iter().find(|ch| !ch.is_whitespace());
            if matches!(next, None | Some('}') | Some(']')) {
                continue;
            }
        }
        scanner.feed(c);
        out.push(c);
    }
    out
}

/// Closes a truncated payload: an open string literal gets its quote, then
/// every unclosed `{`/`[` gets its closer, innermost first.
pub fn close_unterminated(text: &str) -> String {
    let mut out = text.trim_end().to_string();
    let mut scanner = StringScanner::default();
    let mut open: Vec<char> = Vec::new();

    for c in out.chars() {
        let was_in_string = scanner.in_string;
        scanner.feed(c);
        if was_in_string || scanner.in_string {
            continue;
        }
        match c {
            '{' => open.push('}'),
            '[' => open.push(']'),
            '}' | ']' => {
                if open.last() == Some(&c) {
                    open.pop();
                }
            }
            _ => {}
        }
    }

    if scanner.in_string {
        if scanner.escaped {
            out.pop();
        }
        out.push('"');
    }
    while let Some(closer) = open.pop() {
        out.push(closer);
    }
    out
}

/// Tracks whether a character stream is inside a JSON string literal.
#[derive(Default)]
struct StringScanner {
    in_string: bool,
    escaped: bool,
}

impl StringScanner {
    fn feed(&mut self, c: char) {
        if !self.in_string {
            if c == '"' {
                self.in_string = true;
            }
            return;
        }
        if self.escaped {
            self.escaped = false;
        } else if c == '\\' {
            self.escaped = true;
        } else if c == '"' {
            self.in_string = false;
        }
    }
}
