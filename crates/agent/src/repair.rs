//! Best-effort decoding of model-written JSON.
//!
//! Models are asked for strict JSON in `Action Input:` but regularly produce
//! Python-flavoured dicts, stray control characters, or trailing commas. The
//! repairs below are applied together, in a fixed order, and decoding is
//! retried exactly once. Anything they cannot fix stays unparseable; the
//! parser then falls back to an empty input.

use serde_json::Value;

/// One textual repair. Single-line valid JSON passes through every repair
/// unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Repair {
    /// Control characters (`\x00`–`\x1f`, `\x7f`–`\x9f`) become spaces.
    ControlChars,
    /// `'text'` becomes `"text"`.
    SingleQuotes,
    /// `True` / `False` / `None` outside strings become `true` / `false` / `null`.
    PythonLiterals,
    /// A comma directly before `}` or `]` is dropped.
    TrailingCommas,
}

impl Repair {
    /// All repairs, in the order they are applied.
    pub const ALL: [Repair; 4] = [
        Repair::ControlChars,
        Repair::SingleQuotes,
        Repair::PythonLiterals,
        Repair::TrailingCommas,
    ];

    pub fn apply(self, input: &str) -> String {
        match self {
            Repair::ControlChars => input
                .chars()
                .map(|c| if c.is_control() { ' ' } else { c })
                .collect(),
            Repair::SingleQuotes => single_to_double_quotes(input),
            Repair::PythonLiterals => map_code(input, replace_python_literals),
            Repair::TrailingCommas => map_code(input, drop_trailing_commas),
        }
    }
}

/// Apply every repair in order.
pub fn repair(input: &str) -> String {
    Repair::ALL
        .iter()
        .fold(input.to_string(), |acc, r| r.apply(&acc))
}

/// Decode only the repaired form of `raw`.
pub fn decode_repaired(raw: &str) -> Option<Value> {
    serde_json::from_str(&repair(raw)).ok()
}

fn single_to_double_quotes(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut quote: Option<char> = None;
    let mut chars = input.chars();

    while let Some(c) = chars.next() {
        match quote {
            None => match c {
                '"' => {
                    quote = Some('"');
                    out.push(c);
                }
                '\'' => {
                    quote = Some('\'');
                    out.push('"');
                }
                _ => out.push(c),
            },
            Some(q) => {
                if c == '\\' {
                    match chars.next() {
                        // `\'` has no meaning in JSON; it is just a quote.
                        Some('\'') if q == '\'' => out.push('\''),
                        Some(next) => {
                            out.push('\\');
                            out.push(next);
                        }
                        None => out.push('\\'),
                    }
                } else if c == q {
                    quote = None;
                    out.push('"');
                } else if q == '\'' && c == '"' {
                    out.push_str("\\\"");
                } else {
                    out.push(c);
                }
            }
        }
    }
    out
}

/// Rewrite only the parts of `input` outside double-quoted strings.
fn map_code(input: &str, f: fn(&str) -> String) -> String {
    let mut out = String::with_capacity(input.len());
    let mut code_start = 0;
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in input.char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
                out.push_str(&input[code_start..=i]);
                code_start = i + 1;
            }
        } else if c == '"' {
            out.push_str(&f(&input[code_start..i]));
            code_start = i;
            in_string = true;
        }
    }

    let tail = &input[code_start..];
    if in_string {
        out.push_str(tail);
    } else {
        out.push_str(&f(tail));
    }
    out
}

fn replace_python_literals(code: &str) -> String {
    let mut out = String::with_capacity(code.len());
    let mut word = String::new();

    let flush = |word: &mut String, out: &mut String| {
        out.push_str(match word.as_str() {
            "True" => "true",
            "False" => "false",
            "None" => "null",
            other => other,
        });
        word.clear();
    };

    for c in code.chars() {
        if c.is_alphanumeric() || c == '_' {
            word.push(c);
        } else {
            flush(&mut word, &mut out);
            out.push(c);
        }
    }
    flush(&mut word, &mut out);
    out
}

fn drop_trailing_commas(code: &str) -> String {
    let mut out = String::with_capacity(code.len());

    for (i, c) in code.char_indices() {
        if c == ',' {
            let next = code[i + 1..].trim_start().chars().next();
            if matches!(next, Some('}') | Some(']')) {
                continue;
            }
        }
        out.push(c);
    }
    out
}
