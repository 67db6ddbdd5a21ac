//! Sinks: how a formatted event line becomes the final message
//!
//! A sink is a pure function of its input line. It carries no state, so the
//! publisher never needs a sink instance.
//!
//! Lines are split into tokens at spaces outside double quotes. A quoted
//! value (see [`push_text`](crate::schema::push_text)) is always one token,
//! whatever it contains.

use crate::names;
use serde_json::{Map, Value};

/// Formatting strategy applied to every rendered line
pub trait Sink: 'static {
    /// Turn a rendered `key=value` line into the message to deliver
    fn format(line: &str) -> String;
}

/// Plain text sink
///
/// Copies the line verbatim except for the first `class_id=<n>` token and
/// the first `method_id=<n>` token, which are rewritten to the registered
/// class and method names. These are the header positions; later tokens
/// with the same keys are left alone. Unknown ids are kept as numbers.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextSink;

impl Sink for TextSink {
    fn format(line: &str) -> String {
        let mut out = String::with_capacity(line.len() + 16);
        let mut class_done = false;
        let mut method_done = false;

        for (token, separator) in Tokens::new(line) {
            let expanded = match token.split_once('=') {
                Some((key @ "class_id", value)) if !class_done => {
                    class_done = true;
                    resolve(value, names::class_name).map(|name| (key, name))
                }
                Some((key @ "method_id", value)) if !method_done => {
                    method_done = true;
                    resolve(value, names::method_name).map(|name| (key, name))
                }
                _ => None,
            };

            match expanded {
                Some((key, name)) => {
                    out.push_str(key);
                    out.push('=');
                    out.push_str(name);
                }
                None => out.push_str(token),
            }
            out.push_str(separator);
        }

        out
    }
}

fn resolve(value: &str, lookup: fn(u16) -> Option<&'static str>) -> Option<&'static str> {
    lookup(value.parse().ok()?)
}

/// JSON framing sink
///
/// Turns `[tag=N] key=value ...` into a JSON object with one member per token,
/// in line order. Unquoted unsigned integers become JSON numbers; quoted
/// values and everything else become strings. When a key repeats, the first
/// occurrence wins. Tokens without `=` are joined into a `"msg"` member.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonSink;

impl Sink for JsonSink {
    fn format(line: &str) -> String {
        let mut object = Map::new();
        let mut message: Vec<&str> = Vec::new();

        for (token, _) in Tokens::new(line) {
            if token.is_empty() {
                continue;
            }

            if let Some(tag) = token.strip_prefix("[tag=").and_then(|t| t.strip_suffix(']')) {
                object.entry("tag").or_insert_with(|| scalar(tag));
                continue;
            }

            match token.split_once('=') {
                Some((key, value)) if !key.is_empty() => {
                    object.entry(key).or_insert_with(|| member(value));
                }
                _ => message.push(token),
            }
        }

        if !message.is_empty() {
            object
                .entry("msg")
                .or_insert_with(|| Value::String(message.join(" ")));
        }

        Value::Object(object).to_string()
    }
}

fn member(value: &str) -> Value {
    match value.strip_prefix('"') {
        Some(quoted) => Value::String(unquote(quoted)),
        None => scalar(value),
    }
}

fn scalar(value: &str) -> Value {
    match value.parse::<u64>() {
        Ok(n) => Value::from(n),
        Err(_) => Value::String(value.to_string()),
    }
}

/// Undo the escaping of a quoted value; `quoted` starts after the open quote
fn unquote(quoted: &str) -> String {
    let mut text = String::with_capacity(quoted.len());
    let mut chars = quoted.chars();

    while let Some(c) = chars.next() {
        match c {
            '"' => break,
            '\\' => match chars.next() {
                Some('n') => text.push('\n'),
                Some('r') => text.push('\r'),
                Some('t') => text.push('\t'),
                Some(other) => text.push(other),
                None => break,
            },
            c => text.push(c),
        }
    }

    text
}

/// Iterator over `(token, following spaces)` pairs of a rendered line
struct Tokens<'a> {
    rest: &'a str,
}

impl<'a> Tokens<'a> {
    fn new(line: &'a str) -> Self {
        Self { rest: line }
    }
}

impl<'a> Iterator for Tokens<'a> {
    type Item = (&'a str, &'a str);

    fn next(&mut self) -> Option<Self::Item> {
        let rest = self.rest;
        if rest.is_empty() {
            return None;
        }

        let (token, tail) = rest.split_at(token_end(rest));
        let trimmed = tail.trim_start_matches(' ');
        let separator = &tail[..tail.len() - trimmed.len()];
        self.rest = trimmed;

        Some((token, separator))
    }
}

/// Byte offset of the first space outside double quotes
fn token_end(s: &str) -> usize {
    let mut in_quotes = false;
    let mut escaped = false;

    for (i, c) in s.char_indices() {
        if escaped {
            escaped = false;
        } else if in_quotes && c == '\\' {
            escaped = true;
        } else if c == '"' {
            in_quotes = !in_quotes;
        } else if c == ' ' && !in_quotes {
            return i;
        }
    }

    s.len()
}
