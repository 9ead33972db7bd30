//! Placeholder scanning (`__name__`), choice markers and the join rule.

/// Opens and closes an inline choice marker: `«name=value»`.
pub const MARKER_OPEN: char = '«';
pub const MARKER_CLOSE: char = '»';
/// Precedes a marker character or itself inside a marker value.
pub const MARKER_ESCAPE: char = '\\';

const SEPARATORS: [char; 4] = [',', ' ', '\n', '\t'];

fn is_name_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '-' | '/' | '.')
}

/// A `__name__` occurrence: byte range of the whole token and the name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token<'a> {
    pub start: usize,
    pub end: usize,
    pub name: &'a str,
}

/// All placeholder tokens in `text`, left to right, non-overlapping.
pub fn scan_tokens(text: &str) -> Vec<Token<'_>> {
    let bytes = text.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;
    while i + 1 < bytes.len() {
        if bytes[i] != b'_' || bytes[i + 1] != b'_' {
            i += 1;
            continue;
        }
        match closing_delimiter(text, i + 2) {
            Some(close) => {
                tokens.push(Token {
                    start: i,
                    end: close + 2,
                    name: &text[i + 2..close],
                });
                i = close + 2;
            }
            None => i += 1,
        }
    }
    tokens
}

// Byte offset of the `__` closing a name that starts at `from`.
fn closing_delimiter(text: &str, from: usize) -> Option<usize> {
    let rest = text.get(from..)?;
    for (offset, c) in rest.char_indices() {
        if !is_name_char(c) {
            return None;
        }
        if offset > 0 && rest[offset..].starts_with("__") {
            return Some(from + offset);
        }
    }
    None
}

/// Distinct token names in order of first appearance.
pub fn token_names(text: &str) -> Vec<&str> {
    let mut names: Vec<&str> = Vec::new();
    for token in scan_tokens(text) {
        if !names.contains(&token.name) {
            names.push(token.name);
        }
    }
    names
}

/// Rewrites every token through `replace`; tokens it declines stay verbatim.
pub fn substitute<'a>(text: &'a str, mut replace: impl FnMut(&'a str) -> Option<String>) -> String {
    let mut out = String::with_capacity(text.len());
    let mut cursor = 0;
    for token in scan_tokens(text) {
        out.push_str(&text[cursor..token.start]);
        match replace(token.name) {
            Some(value) => out.push_str(&value),
            None => out.push_str(&text[token.start..token.end]),
        }
        cursor = token.end;
    }
    out.push_str(&text[cursor..]);
    out
}

pub fn marker(name: &str, value: &str) -> String {
    let mut out = String::with_capacity(name.len() + value.len() + 6);
    out.push(MARKER_OPEN);
    out.push_str(name);
    out.push('=');
    for c in value.chars() {
        if matches!(c, MARKER_OPEN | MARKER_CLOSE | MARKER_ESCAPE) {
            out.push(MARKER_ESCAPE);
        }
        out.push(c);
    }
    out.push(MARKER_CLOSE);
    out
}

/// Removes markers, keeping the chosen values.
pub fn strip_markers(marked: &str) -> String {
    let mut out = String::with_capacity(marked.len());
    let mut rest = marked;
    while let Some(open) = rest.find(MARKER_OPEN) {
        out.push_str(&rest[..open]);
        let inner = &rest[open + MARKER_OPEN.len_utf8()..];
        match read_marker(inner) {
            Some((value, consumed)) => {
                out.push_str(&value);
                rest = &inner[consumed..];
            }
            None => {
                out.push(MARKER_OPEN);
                rest = inner;
            }
        }
    }
    out.push_str(rest);
    out
}

/// Value of the marker body at the start of `inner` and the bytes it spans,
/// closing character included. `None` if the marker never closes.
fn read_marker(inner: &str) -> Option<(String, usize)> {
    let mut body = String::new();
    let mut value_start = None;
    let mut chars = inner.char_indices();
    while let Some((i, c)) = chars.next() {
        match c {
            MARKER_ESCAPE => {
                let (_, escaped) = chars.next()?;
                body.push(escaped);
            }
            MARKER_CLOSE => {
                let value = match value_start {
                    Some(start) => body.split_off(start),
                    None => body,
                };
                return Some((value, i + c.len_utf8()));
            }
            '=' if value_start.is_none() => value_start = Some(body.len()),
            _ => body.push(c),
        }
    }
    None
}

/// Joins two fragments of prompt text.
///
/// An empty side yields the other side. If either edge already is a separator
/// the sides are concatenated as-is, otherwise exactly one space goes between.
pub fn join(left: &str, right: &str) -> String {
    if left.is_empty() {
        return right.to_string();
    }
    if right.is_empty() {
        return left.to_string();
    }
    let left_sep = left.ends_with(SEPARATORS);
    let right_sep = right.starts_with(SEPARATORS);
    if left_sep || right_sep {
        return format!("{left}{right}");
    }
    format!("{} {}", left.trim_end(), right.trim_start())
}
