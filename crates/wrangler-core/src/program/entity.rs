//! Textual `&name;` substitution from `<!ENTITY>` declarations.
//!
//! Runs before markup parsing. The document type block is blanked out (its
//! newlines are kept so line numbers stay put) and every reference to a
//! declared entity is replaced until nothing changes.

use std::collections::HashMap;
use std::sync::OnceLock;

use regex::Regex;

use crate::error::{Result, WranglerError};

const MAX_PASSES: usize = 16;
const BUILTIN: &[&str] = &["lt", "gt", "amp", "quot", "apos"];

static DECL_RE: OnceLock<Regex> = OnceLock::new();
static REF_RE: OnceLock<Regex> = OnceLock::new();

fn decl_re() -> &'static Regex {
    DECL_RE.get_or_init(|| {
        Regex::new(r#"<!ENTITY\s+([A-Za-z_][\w.\-]*)\s+(?:"([^"]*)"|'([^']*)')\s*>"#).unwrap()
    })
}

fn ref_re() -> &'static Regex {
    REF_RE.get_or_init(|| Regex::new(r"&([A-Za-z_][\w.\-]*);").unwrap())
}

pub fn expand_entities(text: &str, source_name: &str) -> Result<String> {
    let (body, entities) = strip_doctype(text, source_name)?;

    let mut current = body;
    let mut settled = false;
    for _ in 0..MAX_PASSES {
        let next = ref_re()
            .replace_all(&current, |caps: &regex::Captures<'_>| {
                entities
                    .get(&caps[1])
                    .cloned()
                    .unwrap_or_else(|| caps[0].to_string())
            })
            .into_owned();
        if next == current {
            settled = true;
            break;
        }
        current = next;
    }

    for caps in ref_re().captures_iter(&current) {
        let name = &caps[1];
        if BUILTIN.contains(&name) {
            continue;
        }
        if !settled && entities.contains_key(name) {
            return Err(WranglerError::Parse {
                source_name: source_name.to_string(),
                line: line_of(&current, caps.get(0).map_or(0, |m| m.start())),
                message: format!("entity '{name}' expands recursively"),
            });
        }
        return Err(WranglerError::UndefinedEntity(name.to_string()));
    }

    Ok(current)
}

/// Remove the `<!DOCTYPE ...>` block, returning the remaining text and the
/// entities it declared.
fn strip_doctype(text: &str, source_name: &str) -> Result<(String, HashMap<String, String>)> {
    let mut entities = HashMap::new();
    let Some(start) = find_ignore_case(text, "<!DOCTYPE") else {
        return Ok((text.to_string(), entities));
    };

    let rest = &text[start..];
    let Some(end) = doctype_end(rest) else {
        return Err(WranglerError::Parse {
            source_name: source_name.to_string(),
            line: line_of(text, start),
            message: "unterminated DOCTYPE".into(),
        });
    };

    let block = &rest[..=end];
    for caps in decl_re().captures_iter(block) {
        let value = caps.get(2).or_else(|| caps.get(3)).map_or("", |m| m.as_str());
        entities
            .entry(caps[1].to_string())
            .or_insert_with(|| value.to_string());
    }

    let newlines = "\n".repeat(block.matches('\n').count());
    let mut out = String::with_capacity(text.len());
    out.push_str(&text[..start]);
    out.push_str(&newlines);
    out.push_str(&rest[end + 1..]);
    Ok((out, entities))
}

/// Offset of the `>` closing the DOCTYPE that starts `decl`. Quoted strings
/// and comments are skipped, so `]` or `>` inside an entity value do not end
/// the internal subset early.
fn doctype_end(decl: &str) -> Option<usize> {
    let bytes = decl.as_bytes();
    let mut in_subset = false;
    let mut quote: Option<u8> = None;
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        if let Some(q) = quote {
            if b == q {
                quote = None;
            }
            i += 1;
            continue;
        }
        match b {
            b'"' | b'\'' => quote = Some(b),
            b'<' if in_subset && bytes[i..].starts_with(b"<!--") => {
                let close = decl[i + 4..].find("-->")?;
                i += 4 + close + 3;
                continue;
            }
            b'[' if !in_subset => in_subset = true,
            b']' if in_subset => in_subset = false,
            b'>' if !in_subset => return Some(i),
            _ => {}
        }
        i += 1;
    }
    None
}

fn find_ignore_case(haystack: &str, needle: &str) -> Option<usize> {
    let n = needle.len();
    haystack
        .as_bytes()
        .windows(n)
        .position(|w| w.eq_ignore_ascii_case(needle.as_bytes()))
}

pub(crate) fn line_of(text: &str, offset: usize) -> usize {
    text.as_bytes()[..offset.min(text.len())]
        .iter()
        .filter(|&&b| b == b'\n')
        .count()
        + 1
}
