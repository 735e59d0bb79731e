//! Best-effort repair of near-valid JSON emitted by language models.
//!
//! Planning models frequently wrap their answer in Markdown fences, leave a
//! trailing comma behind, or get cut off mid-document when a stream is
//! interrupted. [`repair_json_output`] normalizes those cases so the result can
//! be handed to `serde_json`. It never panics and returns the input unchanged
//! when no JSON object or array can be recovered.

use serde_json::Value;

/// Repair `content` into a JSON object or array if possible.
///
/// Already-valid JSON passes through with the same parsed structure, so the
/// function is idempotent on its own output.
pub fn repair_json_output(content: &str) -> String {
    let trimmed = content.trim();

    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        if value.is_object() || value.is_array() {
            return trimmed.to_string();
        }
        return content.to_string();
    }

    let unfenced = strip_code_fence(trimmed);
    let Some(start) = unfenced.find(['{', '[']) else {
        return content.to_string();
    };

    let repaired = balance(&unfenced[start..]);
    match serde_json::from_str::<Value>(&repaired) {
        Ok(value) if value.is_object() || value.is_array() => {
            serde_json::to_string(&value).unwrap_or(repaired)
        }
        _ => content.to_string(),
    }
}

fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    // Drop the info string (```json, ```ts, ...) up to the first newline.
    let body = match rest.find('\n') {
        Some(idx) => &rest[idx + 1..],
        None => rest.trim_start_matches(|c: char| c.is_ascii_alphabetic()),
    };
    match body.rfind("```") {
        Some(end) => body[..end].trim(),
        None => body.trim(),
    }
}

/// Single pass over the text tracking string state and a stack of expected
/// closers. Stray closers are dropped, trailing commas removed, bare words
/// quoted, single-quoted strings rewritten with double quotes, and anything
/// left open at the end is closed.
fn balance(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len() + 8);
    let mut stack: Vec<char> = Vec::new();
    // Delimiter of the string being copied, if any
    let mut quote: Option<char> = None;
    let mut escaped = false;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];

        if let Some(delimiter) = quote {
            if escaped {
                escaped = false;
                if c == '\'' && delimiter == '\'' {
                    // `\'` is not a JSON escape
                    out.pop();
                }
                out.push(c);
            } else if c == '\\' {
                escaped = true;
                out.push(c);
            } else if c == delimiter {
                quote = None;
                out.push('"');
            } else if c == '"' {
                out.push_str("\\\"");
            } else if c == '\n' {
                out.push_str("\\n");
            } else if c == '\r' {
                out.push_str("\\r");
            } else if c == '\t' {
                out.push_str("\\t");
            } else {
                out.push(c);
            }
            i += 1;
            continue;
        }

        match c {
            '"' | '\'' => {
                quote = Some(c);
                out.push('"');
            }
            '{' => {
                stack.push('}');
                out.push(c);
            }
            '[' => {
                stack.push(']');
                out.push(c);
            }
            '}' | ']' => {
                if stack.contains(&c) {
                    while let Some(expected) = stack.pop() {
                        trim_trailing_comma(&mut out);
                        out.push(expected);
                        if expected == c {
                            break;
                        }
                    }
                    if stack.is_empty() {
                        return out;
                    }
                }
            }
            c if c.is_ascii_digit() || c == '-' => {
                // Numbers are copied whole so an exponent is not read as a bare word
                while i < chars.len() && is_number_char(chars[i]) {
                    out.push(chars[i]);
                    i += 1;
                }
                continue;
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let begin = i;
                while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                let word: String = chars[begin..i].iter().collect();
                out.push_str(&bare_word(&word));
                continue;
            }
            _ => out.push(c),
        }
        i += 1;
    }

    if quote.is_some() {
        if escaped {
            out.pop();
        }
        out.push('"');
    }

    let tail = out.trim_end();
    if tail.ends_with(':') {
        out.truncate(tail.len());
        out.push_str(" null");
    }

    while let Some(expected) = stack.pop() {
        trim_trailing_comma(&mut out);
        out.push(expected);
    }
    out
}

fn is_number_char(c: char) -> bool {
    c.is_ascii_digit() || matches!(c, '-' | '+' | '.' | 'e' | 'E')
}

fn bare_word(word: &str) -> String {
    match word {
        "true" | "false" | "null" => word.to_string(),
        "True" => "true".to_string(),
        "False" => "false".to_string(),
        "None" => "null".to_string(),
        other => format!("\"{}\"", other),
    }
}

fn trim_trailing_comma(out: &mut String) {
    let trimmed_len = out.trim_end().len();
    out.truncate(trimmed_len);
    if out.ends_with(',') {
        out.pop();
    }
}
