//! Best-effort recovery of JSON from model output.
//!
//! Models wrap JSON in prose, markdown fences and reasoning blocks, and cut
//! off mid-array when they hit the token limit. Strategies run in order and
//! the first one that yields valid JSON wins.

use std::sync::LazyLock;

use regex::Regex;
use serde::de::DeserializeOwned;
use serde_json::Value;

use super::{truncate_chars, PipelineError};

static FENCE_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```[A-Za-z0-9_-]*[ \t]*\r?\n(.*?)```").unwrap());

static FENCE_OPEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"```[A-Za-z0-9_-]*[ \t]*\r?\n").unwrap());

static THINK_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<think>.*?</think>").unwrap());

static CODE_FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"```[A-Za-z]*[ \t]*\r?\n?").unwrap());

/// Longest raw-response excerpt carried in error messages.
const ERROR_SNIPPET_CHARS: usize = 500;

/// Upper bound on cut points tried when closing truncated output.
const MAX_CUT_ATTEMPTS: usize = 64;

/// Parse the JSON payload out of a model response.
pub fn parse_llm_json(response: &str) -> Result<Value, PipelineError> {
    let without_reasoning = THINK_BLOCK.replace_all(response, "");
    let text = without_reasoning.trim();
    if text.is_empty() {
        return Err(PipelineError::JsonParsing("empty response".into()));
    }

    if let Ok(value) = serde_json::from_str::<Value>(text) {
        return Ok(value);
    }

    for caps in FENCE_BLOCK.captures_iter(text) {
        if let Ok(value) = serde_json::from_str::<Value>(caps[1].trim()) {
            tracing::debug!("Recovered JSON from markdown fence");
            return Ok(value);
        }
    }

    if let Some(span) = outermost_span(text) {
        if let Ok(value) = serde_json::from_str::<Value>(span) {
            tracing::debug!("Recovered JSON from bracket span");
            return Ok(value);
        }
    }

    // Repair inside an (possibly unclosed) fence first, then the whole text.
    let mut candidates: Vec<&str> = FENCE_OPEN
        .find_iter(text)
        .map(|m| text[m.end()..].trim_end_matches('`').trim())
        .collect();
    candidates.push(text);

    for candidate in candidates {
        if let Some(value) = repair(candidate) {
            tracing::debug!("Recovered JSON through repair");
            return Ok(value);
        }
    }

    Err(PipelineError::JsonParsing(format!(
        "no parseable JSON in response: {}",
        truncate_chars(text, ERROR_SNIPPET_CHARS)
    )))
}

/// Turn a parsed payload into a list of items.
///
/// Arrays are returned as-is; `{key: [...]}` (or any object whose only field is
/// an array) yields that array; any other object becomes a one-item list.
pub fn value_to_list(value: Value, key: &str) -> Vec<Value> {
    match value {
        Value::Array(items) => items,
        Value::Object(mut map) => {
            if let Some(Value::Array(items)) = map.remove(key) {
                return items;
            }
            if map.len() == 1 && map.values().all(Value::is_array) {
                return match map.into_iter().next() {
                    Some((_, Value::Array(items))) => items,
                    _ => vec![],
                };
            }
            vec![Value::Object(map)]
        }
        _ => vec![],
    }
}

/// Deserialize items leniently - skip items that fail to deserialize.
pub fn parse_items_lenient<T: DeserializeOwned>(items: Vec<Value>) -> Vec<T> {
    let total = items.len();
    let parsed: Vec<T> = items
        .into_iter()
        .filter_map(|v| serde_json::from_value(v).ok())
        .collect();
    if parsed.len() < total {
        tracing::debug!(
            skipped = total - parsed.len(),
            total,
            "Skipped items that did not match the expected shape"
        );
    }
    parsed
}

/// Strip markdown fences and comment-only lines from generated code.
pub fn clean_code_output(code: &str) -> String {
    let unfenced = CODE_FENCE.replace_all(code, "");
    unfenced
        .lines()
        .filter(|line| {
            let t = line.trim_start();
            !(t.starts_with('#') || t.starts_with("//") || t.starts_with("/*"))
        })
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

/// The span from the outermost opening bracket to the last matching closer.
fn outermost_span(text: &str) -> Option<&str> {
    let start = text.find(['[', '{'])?;
    let close = if text[start..].starts_with('[') { ']' } else { '}' };
    let end = text.rfind(close)?;
    (end > start).then(|| &text[start..=end])
}

fn repair(text: &str) -> Option<Value> {
    let start = text.find(['[', '{'])?;
    let body = normalize_literals(&text[start..]);

    // A complete value followed by trailing prose.
    if let Some(Ok(value)) = serde_json::Deserializer::from_str(&body)
        .into_iter::<Value>()
        .next()
    {
        return Some(value);
    }

    close_truncated(&body)
}

/// Outside string literals: map Python `True/False/None` to JSON and drop
/// trailing commas before a closing bracket.
fn normalize_literals(body: &str) -> String {
    let chars: Vec<char> = body.chars().collect();
    let mut out = String::with_capacity(body.len());
    let mut in_string = false;
    let mut escaped = false;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if in_string {
            out.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            i += 1;
            continue;
        }

        match c {
            '"' => {
                in_string = true;
                out.push(c);
                i += 1;
            }
            ',' => {
                let next = chars[i + 1..].iter().find(|ch| !ch.is_whitespace());
                if !matches!(next, Some(']') | Some('}')) {
                    out.push(c);
                }
                i += 1;
            }
            c if c.is_ascii_alphabetic() => {
                let begin = i;
                while i < chars.len() && chars[i].is_ascii_alphanumeric() {
                    i += 1;
                }
                let word: String = chars[begin..i].iter().collect();
                out.push_str(match word.as_str() {
                    "True" => "true",
                    "False" => "false",
                    "None" => "null",
                    _ => &word,
                });
            }
            _ => {
                out.push(c);
                i += 1;
            }
        }
    }
    out
}

/// Close output that was cut off mid-structure.
///
/// First tries closing the open string and brackets as they stand; failing
/// that, cuts back to each earlier top-level separator and closes there.
fn close_truncated(body: &str) -> Option<Value> {
    let mut stack: Vec<char> = Vec::new();
    let mut in_string = false;
    let mut escaped = false;
    let mut cuts: Vec<(usize, Vec<char>)> = Vec::new();

    for (idx, c) in body.char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '[' => stack.push(']'),
            '{' => stack.push('}'),
            ']' | '}' => {
                stack.pop();
                if stack.is_empty() {
                    // Complete value; anything after it is noise.
                    return serde_json::from_str(&body[..=idx]).ok();
                }
            }
            ',' if !stack.is_empty() => cuts.push((idx, stack.clone())),
            _ => {}
        }
    }

    if stack.is_empty() {
        return None;
    }

    let mut naive = body.trim_end().to_string();
    if in_string {
        if escaped {
            naive.pop();
        }
        naive.push('"');
    }
    let closed = format!("{}{}", naive.trim_end(), closers(&stack));
    if let Ok(value) = serde_json::from_str(&closed) {
        return Some(value);
    }

    for (idx, stack_at_cut) in cuts.iter().rev().take(MAX_CUT_ATTEMPTS) {
        let candidate = format!("{}{}", body[..*idx].trim_end(), closers(stack_at_cut));
        if let Ok(value) = serde_json::from_str(&candidate) {
            return Some(value);
        }
    }
    None
}

fn closers(stack: &[char]) -> String {
    stack.iter().rev().collect()
}
