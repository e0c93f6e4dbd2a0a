//! Recursive-descent reader for the step markup.
//!
//! Covers what step programs use: one root element, nested elements,
//! attributes in single or double quotes, self-closing tags, comments,
//! processing instructions, CDATA and character references. Namespaces and
//! DTD validation are not supported.

use super::entity::line_of;
use super::node::StepNode;
use crate::error::{Result, WranglerError};

pub fn parse_markup(text: &str, source_name: &str) -> Result<StepNode> {
    let mut parser = Parser {
        src: text,
        pos: 0,
        source_name,
    };
    parser.skip_misc()?;
    if parser.at_end() {
        return Err(parser.error("document has no root element"));
    }
    let root = parser.element()?;
    parser.skip_misc()?;
    if !parser.at_end() {
        return Err(parser.error("unexpected content after root element"));
    }
    Ok(root)
}

struct Parser<'a> {
    src: &'a str,
    pos: usize,
    source_name: &'a str,
}

impl<'a> Parser<'a> {
    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn at_end(&self) -> bool {
        self.pos >= self.src.len()
    }

    fn peek(&self) -> Option<u8> {
        self.src.as_bytes().get(self.pos).copied()
    }

    fn line(&self) -> usize {
        line_of(self.src, self.pos)
    }

    fn error(&self, message: impl Into<String>) -> WranglerError {
        WranglerError::Parse {
            source_name: self.source_name.to_string(),
            line: self.line(),
            message: message.into(),
        }
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(b) if b.is_ascii_whitespace()) {
            self.pos += 1;
        }
    }

    fn expect(&mut self, token: &str) -> Result<()> {
        if self.rest().starts_with(token) {
            self.pos += token.len();
            Ok(())
        } else {
            Err(self.error(format!("expected '{token}'")))
        }
    }

    /// Advance past the next `terminator`, returning the text before it.
    fn take_until(&mut self, terminator: &str, what: &str) -> Result<&'a str> {
        match self.rest().find(terminator) {
            Some(i) => {
                let out = &self.rest()[..i];
                self.pos += i + terminator.len();
                Ok(out)
            }
            None => Err(self.error(format!("unterminated {what}"))),
        }
    }

    /// Whitespace, comments, processing instructions and doctype outside
    /// the root element.
    fn skip_misc(&mut self) -> Result<()> {
        loop {
            self.skip_ws();
            let rest = self.rest();
            if rest.starts_with("<?") {
                self.take_until("?>", "processing instruction")?;
            } else if rest.starts_with("<!--") {
                self.take_until("-->", "comment")?;
            } else if rest.starts_with("<!") {
                self.take_until(">", "declaration")?;
            } else {
                return Ok(());
            }
        }
    }

    fn name(&mut self) -> Result<&'a str> {
        let start = self.pos;
        while let Some(b) = self.peek() {
            if b.is_ascii_alphanumeric() || matches!(b, b'_' | b'-' | b'.' | b':') {
                self.pos += 1;
            } else {
                break;
            }
        }
        if self.pos == start {
            return Err(self.error("expected a name"));
        }
        Ok(&self.src[start..self.pos])
    }

    fn element(&mut self) -> Result<StepNode> {
        let line = self.line();
        self.expect("<")?;
        let tag = self.name()?;
        let mut node = StepNode::new(tag, line);

        loop {
            self.skip_ws();
            match self.peek() {
                Some(b'/') => {
                    self.expect("/>")?;
                    return Ok(node);
                }
                Some(b'>') => {
                    self.pos += 1;
                    break;
                }
                Some(_) => {
                    let (key, value) = self.attribute()?;
                    if node.attributes.insert(key.to_string(), value).is_some() {
                        return Err(self.error(format!("duplicate attribute '{key}' on <{tag}>")));
                    }
                }
                None => return Err(self.error(format!("unterminated tag <{tag}>"))),
            }
        }

        self.content(&mut node)?;
        Ok(node)
    }

    fn attribute(&mut self) -> Result<(&'a str, String)> {
        let key = self.name()?;
        self.skip_ws();
        self.expect("=")?;
        self.skip_ws();
        let quote = match self.peek() {
            Some(q @ (b'"' | b'\'')) => q as char,
            _ => return Err(self.error(format!("attribute '{key}' value must be quoted"))),
        };
        self.pos += 1;
        let raw = self.take_until(&quote.to_string(), "attribute value")?;
        if raw.contains('<') {
            return Err(self.error(format!("'<' in value of attribute '{key}'")));
        }
        Ok((key, decode_text(raw)))
    }

    fn content(&mut self, node: &mut StepNode) -> Result<()> {
        loop {
            let rest = self.rest();
            if rest.is_empty() {
                return Err(self.error(format!("missing </{}>", node.tag)));
            }
            if rest.starts_with("</") {
                self.pos += 2;
                let close = self.name()?;
                if close != node.tag {
                    return Err(self.error(format!(
                        "mismatched closing tag </{close}>, expected </{}>",
                        node.tag
                    )));
                }
                self.skip_ws();
                self.expect(">")?;
                node.text = node.text.trim().to_string();
                return Ok(());
            }
            if rest.starts_with("<!--") {
                self.take_until("-->", "comment")?;
            } else if rest.starts_with("<![CDATA[") {
                self.pos += "<![CDATA[".len();
                let data = self.take_until("]]>", "CDATA section")?;
                node.text.push_str(data);
            } else if rest.starts_with("<?") {
                self.take_until("?>", "processing instruction")?;
            } else if rest.starts_with('<') {
                let child = self.element()?;
                node.children.push(child);
            } else {
                let end = rest.find('<').unwrap_or(rest.len());
                node.text.push_str(&decode_text(&rest[..end]));
                self.pos += end;
            }
        }
    }
}

/// Decode the predefined entities and numeric character references.
/// Anything unrecognised is kept verbatim.
pub fn decode_text(raw: &str) -> String {
    if !raw.contains('&') {
        return raw.to_string();
    }
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let tail = &rest[amp..];
        let decoded = tail.find(';').and_then(|semi| {
            let name = &tail[1..semi];
            let ch = match name {
                "lt" => Some('<'),
                "gt" => Some('>'),
                "amp" => Some('&'),
                "quot" => Some('"'),
                "apos" => Some('\''),
                _ => name
                    .strip_prefix("#x")
                    .or_else(|| name.strip_prefix("#X"))
                    .map(|hex| u32::from_str_radix(hex, 16))
                    .or_else(|| name.strip_prefix('#').map(str::parse::<u32>))
                    .and_then(|r| r.ok())
                    .and_then(char::from_u32),
            };
            ch.map(|c| (c, semi))
        });
        match decoded {
            Some((c, semi)) => {
                out.push(c);
                rest = &tail[semi + 1..];
            }
            None => {
                out.push('&');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}
