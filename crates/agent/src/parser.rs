//! Output parser: turns one raw model reply into a structured decision.
//!
//! The model is prompted to answer in the text protocol
//!
//! ```text
//! Thought: <reasoning>
//! Action: <action name>
//! Action Input: {"key": "value"}
//! ```
//!
//! or with `Final Answer: <text>`. Replies are messy in practice, so parsing
//! never fails: anything that cannot be classified comes back as
//! [`ParseResult::Unrecognized`] and the loop simply continues.
//!
//! Precedence is fixed: a final answer wins over everything, then an action,
//! then a bare thought.

use regex_lite::{Captures, Regex};
use scoutloop_core::ActionInput;
use serde_json::Value;
use tracing::{debug, warn};

use crate::repair;

const FINAL_ANSWER: &str = r"(?is)final answer:\s*(.+)";
const THOUGHT: &str = r"(?i)\bthought:\s*([^\n]+)";
const ACTION: &str = r"(?i)\baction:\s*([^\n]+)";
const ACTION_INPUT_MARKER: &str = r"(?i)action input:\s*";
const STRICT_ACTION_INPUT: &str = r"(?is)action input:\s*(\{.*\})\s*$";

/// A value captured after `Thought:` or `Action:` that is really the next
/// marker means the label itself was blank.
const MARKERS: &[&str] = &["thought:", "action:", "action input:", "final answer:"];

/// Characters models wrap action names in.
const NAME_DECORATION: &[char] = &['`', '"', '\'', '*'];

/// What one model reply asked for.
#[derive(Debug, Clone, PartialEq)]
pub enum ParseResult {
    /// The reply contains `Final Answer:`; holds the trimmed remainder.
    FinalAnswer(String),
    /// The reply names an action. `thought` may be empty; `input` is empty
    /// when no usable structured input was found.
    Action {
        thought: String,
        name: String,
        input: ActionInput,
    },
    /// Reasoning only, no action and no answer.
    Thought(String),
    /// Nothing recognizable; holds the raw reply.
    Unrecognized(String),
}

impl ParseResult {
    pub fn is_final(&self) -> bool {
        matches!(self, ParseResult::FinalAnswer(_))
    }
}

/// Classify a raw model reply.
pub fn parse(text: &str) -> ParseResult {
    if let Some(answer) = capture(FINAL_ANSWER, text).and_then(|c| group(&c, 1)) {
        return ParseResult::FinalAnswer(answer);
    }

    let thought = labelled(THOUGHT, text).unwrap_or_default();

    let name = labelled(ACTION, text).and_then(|raw| clean_action_name(&raw));

    if let Some(name) = name {
        let input = extract_input(text, &name);
        debug!(action = %name, args = input.len(), "Parsed action");
        return ParseResult::Action {
            thought,
            name,
            input,
        };
    }

    if !thought.is_empty() {
        return ParseResult::Thought(thought);
    }

    ParseResult::Unrecognized(text.to_string())
}

fn capture<'t>(pattern: &str, text: &'t str) -> Option<Captures<'t>> {
    Regex::new(pattern).ok()?.captures(text)
}

/// The value after a label, which may sit on the following line.
fn labelled(pattern: &str, text: &str) -> Option<String> {
    let value = capture(pattern, text).and_then(|c| group(&c, 1))?;
    let lower = value.to_ascii_lowercase();
    if MARKERS.iter().any(|m| lower.starts_with(m)) {
        return None;
    }
    Some(value)
}

fn group(captures: &Captures<'_>, index: usize) -> Option<String> {
    captures.get(index).map(|m| m.as_str().trim().to_string())
}

/// Strip quoting and any call-style suffix: `` `lookup("x")` `` -> `lookup`.
fn clean_action_name(raw: &str) -> Option<String> {
    let trimmed = raw.trim().trim_matches(NAME_DECORATION);
    let head = trimmed
        .split_once('(')
        .map_or(trimmed, |(head, _)| head);
    let name = head.trim().trim_matches(NAME_DECORATION).trim();
    (!name.is_empty()).then(|| name.to_string())
}

/// Find and decode the `Action Input:` payload. Falls back to an empty map.
fn extract_input(text: &str, action: &str) -> ActionInput {
    let candidates = input_candidates(text);
    if candidates.is_empty() {
        if capture(ACTION_INPUT_MARKER, text).is_some() {
            warn!(action, "Action input has no structured payload, using empty input");
        }
        return ActionInput::new();
    }

    let decoded = candidates
        .iter()
        .find_map(|c| serde_json::from_str::<Value>(c).ok())
        .or_else(|| candidates.iter().find_map(|c| repair::decode_repaired(c)));

    match decoded {
        Some(Value::Object(map)) => map,
        Some(other) => {
            warn!(action, kind = json_kind(&other), "Action input is not an object, using empty input");
            ActionInput::new()
        }
        None => {
            warn!(action, "Action input is not decodable, using empty input");
            ActionInput::new()
        }
    }
}

/// The strict end-of-text match first, then the first balanced `{...}`
/// after the marker.
fn input_candidates(text: &str) -> Vec<&str> {
    let mut candidates = Vec::with_capacity(2);

    if let Some(m) = capture(STRICT_ACTION_INPUT, text).and_then(|c| c.get(1)) {
        candidates.push(m.as_str());
    }

    let Some(marker) = Regex::new(ACTION_INPUT_MARKER)
        .ok()
        .and_then(|re| re.find(text))
    else {
        return candidates;
    };

    if let Some(balanced) = balanced_object(&text[marker.end()..])
        && !candidates.contains(&balanced)
    {
        candidates.push(balanced);
    }
    candidates
}

/// Slice from the first `{` to its matching `}`, skipping braces inside
/// quoted strings.
fn balanced_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut escaped = false;

    for (offset, c) in text[start..].char_indices() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '"' | '\'' => quote = Some(c),
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..=start + offset]);
                }
            }
            _ => {}
        }
    }
    None
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
