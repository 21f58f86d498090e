//! Selector and declaration rewriting over printed CSS text.
//!
//! Works on the normalized output of the CSS printer: rule preludes are split
//! into selector parts, and declarations that can reference a font face or a
//! keyframes rule get those names replaced as whole identifiers.

use crate::style::scope_map::{ScopeMap, SelectorMap};

/// The kind of selector part being renamed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectorKind {
    /// `.name`
    Class,
    /// `#name`
    Id,
    /// A type selector or `*`, rewritten to a class.
    Element,
}

/// Source of scoped names while rewriting.
pub trait Renamer {
    /// The scoped name for a selector part, or `None` to leave it as written.
    fn rename(&mut self, kind: SelectorKind, original: &str) -> Option<String>;

    /// Names of font faces and keyframes known so far.
    fn map(&self) -> &ScopeMap;
}

/// Pseudo-classes whose arguments are selector lists.
const SELECTOR_PSEUDOS: &[&str] = &[
    "not",
    "is",
    "where",
    "has",
    "matches",
    "-webkit-any",
    "-moz-any",
    "host",
    "host-context",
    "slotted",
];

/// Pseudo-classes taking `An+B of <selector list>`.
const NTH_OF_PSEUDOS: &[&str] = &["nth-child", "nth-last-child"];

/// At-rules whose blocks hold more rules.
const GROUPING_AT_RULES: &[&str] = &[
    "media",
    "supports",
    "document",
    "-moz-document",
    "layer",
    "container",
    "scope",
    "starting-style",
];

/// Rewrites a whole stylesheet.
pub fn rewrite_stylesheet<R: Renamer>(css: &str, renamer: &mut R) -> String {
    let mut out = String::with_capacity(css.len() + css.len() / 4);
    rewrite_rule_list(css, renamer, &mut out);
    out
}

/// Rewrites a sequence of rules (a stylesheet or the inside of a grouping rule).
fn rewrite_rule_list<R: Renamer>(css: &str, renamer: &mut R, out: &mut String) {
    let mut pos = 0;
    while pos < css.len() {
        let (stop, found) = scan_until_block(css, pos);
        match found {
            Some(b'{') => {
                let close = matching_close(css, stop);
                let body_end = close.min(css.len());
                rewrite_rule(&css[pos..stop], &css[stop + 1..body_end], renamer, out);
                pos = (close + 1).min(css.len());
            }
            Some(_) => {
                out.push_str(&css[pos..=stop]);
                pos = stop + 1;
            }
            None => {
                out.push_str(&css[pos..]);
                pos = css.len();
            }
        }
    }
}

fn rewrite_rule<R: Renamer>(prelude: &str, body: &str, renamer: &mut R, out: &mut String) {
    let trimmed = prelude.trim_start();
    if let Some(at_rule) = trimmed.strip_prefix('@') {
        let name_len = ident_len(at_rule.as_bytes(), 0);
        let name = at_rule[..name_len].to_ascii_lowercase();
        if GROUPING_AT_RULES.contains(&name.as_str()) {
            out.push_str(prelude);
            out.push('{');
            rewrite_rule_list(body, renamer, out);
            out.push('}');
        } else if name.ends_with("keyframes") {
            let name_end = prelude.len() - at_rule.len() + name_len;
            out.push_str(&prelude[..name_end]);
            out.push_str(&replace_names(&prelude[name_end..], &renamer.map().keyframes));
            out.push('{');
            out.push_str(body);
            out.push('}');
        } else {
            // @font-face, @page and friends hold declarations.
            out.push_str(prelude);
            out.push('{');
            rewrite_declarations(body, renamer, out);
            out.push('}');
        }
    } else {
        out.push_str(&rewrite_selector_list(prelude, renamer));
        out.push('{');
        rewrite_declarations(body, renamer, out);
        out.push('}');
    }
}

/// Rewrites a declaration block, recursing into nested rules.
fn rewrite_declarations<R: Renamer>(body: &str, renamer: &mut R, out: &mut String) {
    let mut pos = 0;
    while pos < body.len() {
        let (stop, found) = scan_until_block(body, pos);
        match found {
            Some(b'{') => {
                let close = matching_close(body, stop);
                let body_end = close.min(body.len());
                rewrite_rule(&body[pos..stop], &body[stop + 1..body_end], renamer, out);
                pos = (close + 1).min(body.len());
            }
            Some(terminator) => {
                out.push_str(&rewrite_declaration(&body[pos..stop], renamer.map()));
                out.push(char::from(terminator));
                pos = stop + 1;
            }
            None => {
                out.push_str(&rewrite_declaration(&body[pos..], renamer.map()));
                pos = body.len();
            }
        }
    }
}

fn rewrite_declaration(declaration: &str, map: &ScopeMap) -> String {
    let Some(colon) = declaration.find(':') else {
        return declaration.to_string();
    };
    let property = declaration[..colon].trim().to_ascii_lowercase();
    let names = if property == "font-family" || property == "font" {
        &map.font_faces
    } else if property.ends_with("animation") || property.ends_with("animation-name") {
        &map.keyframes
    } else {
        return declaration.to_string();
    };
    let mut out = declaration[..=colon].to_string();
    out.push_str(&replace_names(&declaration[colon + 1..], names));
    out
}

/// Rewrites a comma-separated selector list.
pub fn rewrite_selector_list<R: Renamer>(selectors: &str, renamer: &mut R) -> String {
    let bytes = selectors.as_bytes();
    let mut out = String::with_capacity(selectors.len());
    // A type selector may only start a compound selector.
    let mut compound_start = true;
    let mut i = 0;

    while i < bytes.len() {
        let ch = bytes[i];
        match ch {
            b'"' | b'\'' => {
                let end = skip_string(bytes, i);
                out.push_str(&selectors[i..end]);
                i = end;
                compound_start = false;
            }
            b'[' => {
                let end = skip_brackets(bytes, i, b'[', b']');
                out.push_str(&selectors[i..end]);
                i = end;
                compound_start = false;
            }
            b'.' | b'#' if starts_ident(bytes, i + 1) => {
                let len = ident_len(bytes, i + 1);
                let raw = &selectors[i + 1..i + 1 + len];
                let kind = if ch == b'.' {
                    SelectorKind::Class
                } else {
                    SelectorKind::Id
                };
                out.push(char::from(ch));
                match renamer.rename(kind, &unescape(raw)) {
                    Some(scoped) => out.push_str(&scoped),
                    None => out.push_str(raw),
                }
                i += 1 + len;
                compound_start = false;
            }
            b':' => {
                let mut start = i + 1;
                if bytes.get(start) == Some(&b':') {
                    start += 1;
                }
                let len = ident_len(bytes, start);
                let name = selectors[start..start + len].to_ascii_lowercase();
                out.push_str(&selectors[i..start + len]);
                i = start + len;
                if bytes.get(i) == Some(&b'(') {
                    let end = skip_brackets(bytes, i, b'(', b')');
                    let inner_end = if bytes.get(end - 1) == Some(&b')') {
                        end - 1
                    } else {
                        end
                    };
                    let args = &selectors[i + 1..inner_end];
                    let selector_start = if SELECTOR_PSEUDOS.contains(&name.as_str()) {
                        Some(0)
                    } else if NTH_OF_PSEUDOS.contains(&name.as_str()) {
                        nth_selector_start(args)
                    } else {
                        None
                    };
                    out.push('(');
                    match selector_start {
                        Some(start) => {
                            out.push_str(&args[..start]);
                            out.push_str(&rewrite_selector_list(&args[start..], renamer));
                        }
                        None => out.push_str(args),
                    }
                    out.push_str(&selectors[inner_end..end]);
                    i = end;
                }
                compound_start = false;
            }
            b'*' if compound_start && bytes.get(i + 1) == Some(&b'|') => {
                let end = namespaced_end(bytes, i + 1);
                out.push_str(&selectors[i..end]);
                i = end;
                compound_start = false;
            }
            b'*' if compound_start => {
                match renamer.rename(SelectorKind::Element, "*") {
                    Some(scoped) => {
                        out.push('.');
                        out.push_str(&scoped);
                    }
                    None => out.push('*'),
                }
                i += 1;
                compound_start = false;
            }
            _ if compound_start && starts_ident(bytes, i) => {
                let len = ident_len(bytes, i);
                let raw = &selectors[i..i + len];
                if bytes.get(i + len) == Some(&b'|') {
                    // Namespaced type selectors are left as written.
                    let end = namespaced_end(bytes, i + len);
                    out.push_str(&selectors[i..end]);
                    i = end;
                } else {
                    let tag = unescape(raw).to_ascii_lowercase();
                    match renamer.rename(SelectorKind::Element, &tag) {
                        Some(scoped) => {
                            out.push('.');
                            out.push_str(&scoped);
                        }
                        None => out.push_str(raw),
                    }
                    i += len;
                }
                compound_start = false;
            }
            b' ' | b'\t' | b'\n' | b'\r' | b'>' | b'+' | b'~' | b',' | b'|' => {
                out.push(char::from(ch));
                i += 1;
                compound_start = true;
            }
            _ => {
                let len = utf8_len(ch);
                let end = (i + len).min(bytes.len());
                out.push_str(&selectors[i..end]);
                i = end;
                compound_start = false;
            }
        }
    }
    out
}

/// Where the selector list of `An+B of S` begins, just past `of`.
fn nth_selector_start(args: &str) -> Option<usize> {
    let bytes = args.as_bytes();
    (1..bytes.len().saturating_sub(2))
        .find(|&i| {
            bytes[i - 1].is_ascii_whitespace()
                && bytes[i].eq_ignore_ascii_case(&b'o')
                && bytes[i + 1].eq_ignore_ascii_case(&b'f')
                && bytes[i + 2].is_ascii_whitespace()
        })
        .map(|i| i + 2)
}

/// End of a `prefix|name` selector, given the index of its `|`.
fn namespaced_end(bytes: &[u8], bar: usize) -> usize {
    let name = bar + 1;
    if bytes.get(name) == Some(&b'*') {
        name + 1
    } else if starts_ident(bytes, name) {
        name + ident_len(bytes, name)
    } else {
        name
    }
}

/// Replaces each mapped name in `text` where it appears as a whole identifier.
pub fn replace_names(text: &str, names: &SelectorMap) -> String {
    let mut result = text.to_string();
    for (original, scoped) in names.iter() {
        if original.is_empty() || !result.contains(original) {
            continue;
        }
        let bytes = result.as_bytes();
        let mut out = String::with_capacity(result.len());
        let mut last = 0;
        for (start, found) in result.match_indices(original) {
            let end = start + found.len();
            let before_ok = start == 0 || !is_ident_byte(bytes[start - 1]);
            let after_ok = end == bytes.len() || !is_ident_byte(bytes[end]);
            if before_ok && after_ok {
                out.push_str(&result[last..start]);
                out.push_str(scoped);
                last = end;
            }
        }
        out.push_str(&result[last..]);
        result = out;
    }
    result
}

/// Scans from `pos` to the first top-level `{`, `;` or `}`, skipping strings,
/// comments and parenthesized groups.
fn scan_until_block(css: &str, pos: usize) -> (usize, Option<u8>) {
    let bytes = css.as_bytes();
    let mut i = pos;
    while i < bytes.len() {
        match bytes[i] {
            b'"' | b'\'' => i = skip_string(bytes, i),
            b'/' if bytes.get(i + 1) == Some(&b'*') => i = skip_comment(bytes, i),
            b'(' => i = skip_brackets(bytes, i, b'(', b')'),
            b'[' => i = skip_brackets(bytes, i, b'[', b']'),
            b'\\' => i += 2,
            ch @ (b'{' | b';' | b'}') => return (i, Some(ch)),
            _ => i += 1,
        }
    }
    (bytes.len(), None)
}

/// Index of the `}` closing the block opened at `open`, or the input length.
fn matching_close(css: &str, open: usize) -> usize {
    let bytes = css.as_bytes();
    let mut depth = 0usize;
    let mut i = open;
    while i < bytes.len() {
        match bytes[i] {
            b'"' | b'\'' => {
                i = skip_string(bytes, i);
                continue;
            }
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                i = skip_comment(bytes, i);
                continue;
            }
            b'\\' => {
                i += 2;
                continue;
            }
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return i;
                }
            }
            _ => {}
        }
        i += 1;
    }
    bytes.len()
}

/// Returns the index just past the string starting at `start`.
fn skip_string(bytes: &[u8], start: usize) -> usize {
    let quote = bytes[start];
    let mut i = start + 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            ch if ch == quote => return i + 1,
            _ => i += 1,
        }
    }
    bytes.len()
}

fn skip_comment(bytes: &[u8], start: usize) -> usize {
    let mut i = start + 2;
    while i + 1 < bytes.len() {
        if bytes[i] == b'*' && bytes[i + 1] == b'/' {
            return i + 2;
        }
        i += 1;
    }
    bytes.len()
}

/// Returns the index just past the bracket group opened at `start`.
fn skip_brackets(bytes: &[u8], start: usize, open: u8, close: u8) -> usize {
    let mut depth = 0usize;
    let mut i = start;
    while i < bytes.len() {
        match bytes[i] {
            b'"' | b'\'' => {
                i = skip_string(bytes, i);
                continue;
            }
            b'\\' => {
                i += 2;
                continue;
            }
            ch if ch == open => depth += 1,
            ch if ch == close => {
                depth -= 1;
                if depth == 0 {
                    return i + 1;
                }
            }
            _ => {}
        }
        i += 1;
    }
    bytes.len()
}

fn is_ident_byte(ch: u8) -> bool {
    ch.is_ascii_alphanumeric() || ch == b'-' || ch == b'_' || ch >= 0x80
}

fn starts_ident(bytes: &[u8], i: usize) -> bool {
    match bytes.get(i) {
        Some(&ch) if ch.is_ascii_alphabetic() || ch == b'_' || ch >= 0x80 || ch == b'\\' => true,
        Some(b'-') => matches!(
            bytes.get(i + 1),
            Some(&ch) if ch.is_ascii_alphabetic() || ch == b'_' || ch == b'-' || ch >= 0x80 || ch == b'\\'
        ),
        _ => false,
    }
}

/// Length in bytes of the identifier starting at `start` (escapes included).
fn ident_len(bytes: &[u8], start: usize) -> usize {
    let mut i = start;
    while i < bytes.len() {
        if bytes[i] == b'\\' {
            i = escape_end(bytes, i);
        } else if is_ident_byte(bytes[i]) {
            i += 1;
        } else {
            break;
        }
    }
    i - start
}

/// End of the escape starting at `backslash`. A hex escape owns up to six digits
/// and one whitespace terminator, as in `\31 0`.
fn escape_end(bytes: &[u8], backslash: usize) -> usize {
    let mut i = backslash + 1;
    let digits = bytes[i.min(bytes.len())..]
        .iter()
        .take(6)
        .take_while(|ch| ch.is_ascii_hexdigit())
        .count();
    if digits == 0 {
        let len = bytes.get(i).map_or(0, |&ch| utf8_len(ch));
        return (i + len).min(bytes.len());
    }
    i += digits;
    match bytes.get(i) {
        Some(b'\r') if bytes.get(i + 1) == Some(&b'\n') => i + 2,
        Some(b' ' | b'\t' | b'\n' | b'\r' | 0x0c) => i + 1,
        _ => i,
    }
}

fn utf8_len(first: u8) -> usize {
    match first {
        0xF0..=0xFF => 4,
        0xE0..=0xEF => 3,
        0xC0..=0xDF => 2,
        _ => 1,
    }
}

/// Resolves CSS escapes in an identifier, e.g. `md\:flex` to `md:flex`.
fn unescape(raw: &str) -> String {
    if !raw.contains('\\') {
        return raw.to_string();
    }
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        let mut hex = String::new();
        while let Some(&next) = chars.peek() {
            if hex.len() < 6 && next.is_ascii_hexdigit() {
                hex.push(next);
                chars.next();
            } else {
                break;
            }
        }
        if hex.is_empty() {
            if let Some(next) = chars.next() {
                out.push(next);
            }
        } else {
            match chars.peek() {
                Some('\r') => {
                    chars.next();
                    if chars.peek() == Some(&'\n') {
                        chars.next();
                    }
                }
                Some(' ' | '\t' | '\n' | '\x0c') => {
                    chars.next();
                }
                _ => {}
            }
            let code = u32::from_str_radix(&hex, 16).unwrap_or(0xFFFD);
            out.push(char::from_u32(code).unwrap_or('\u{FFFD}'));
        }
    }
    out
}
