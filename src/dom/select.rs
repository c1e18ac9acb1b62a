//! Simple selectors for locating content regions and island markers.
//!
//! Only compound selectors are supported: an optional tag name followed by
//! any number of `#id`, `.class`, `[attr]` and `[attr=value]` parts.
//! Combinators (`>`, `+`, `~`, whitespace), selector lists and
//! pseudo-classes are rejected at parse time so misconfiguration surfaces
//! during config validation instead of at navigation time.

use super::DomError;
use std::{fmt, iter::Peekable, str::CharIndices};

/// One attribute condition inside a selector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttrMatch {
    pub name: String,
    pub value: Option<String>,
}

/// Parsed compound selector.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selector {
    pub tag: Option<String>,
    pub id: Option<String>,
    pub classes: Vec<String>,
    pub attrs: Vec<AttrMatch>,
}

impl Selector {
    /// Parse a compound selector such as `main#content.wide[data-region]`.
    pub fn parse(input: &str) -> Result<Self, DomError> {
        let source = input.trim();
        let fail = |reason: &str| DomError::Selector {
            selector: input.to_owned(),
            reason: reason.to_owned(),
        };

        if source.is_empty() {
            return Err(fail("empty selector"));
        }

        let mut selector = Self::default();
        let mut chars = source.char_indices().peekable();

        // Leading tag name (or `*`).
        let tag_end = source
            .find(|c: char| !is_ident_char(c) && c != '*')
            .unwrap_or(source.len());
        if tag_end > 0 {
            let tag = &source[..tag_end];
            if tag != "*" {
                if tag.contains('*') {
                    return Err(fail("`*` must stand alone"));
                }
                selector.tag = Some(tag.to_ascii_lowercase());
            }
            skip_to(&mut chars, tag_end);
        }

        while let Some((start, c)) = chars.next() {
            match c {
                '#' | '.' => {
                    let rest = &source[start + 1..];
                    let len = rest.find(|c: char| !is_ident_char(c)).unwrap_or(rest.len());
                    if len == 0 {
                        return Err(fail("expected a name after `#` or `.`"));
                    }
                    let name = rest[..len].to_owned();
                    if c == '#' {
                        if selector.id.is_some() {
                            return Err(fail("more than one id"));
                        }
                        selector.id = Some(name);
                    } else {
                        selector.classes.push(name);
                    }
                    skip_to(&mut chars, start + 1 + len);
                }
                '[' => {
                    let rest = &source[start + 1..];
                    let Some(close) = rest.find(']') else {
                        return Err(fail("unclosed `[`"));
                    };
                    selector.attrs.push(parse_attr(&rest[..close]).map_err(|r| fail(r))?);
                    skip_to(&mut chars, start + 1 + close + 1);
                }
                c if c.is_whitespace() || matches!(c, '>' | '+' | '~') => {
                    return Err(fail("combinators are not supported"));
                }
                ',' => return Err(fail("selector lists are not supported")),
                ':' => return Err(fail("pseudo-classes are not supported")),
                _ => return Err(fail("unexpected character")),
            }
        }

        Ok(selector)
    }
}

/// Advance past every char starting before byte offset `end`.
fn skip_to(chars: &mut Peekable<CharIndices<'_>>, end: usize) {
    while chars.next_if(|(i, _)| *i < end).is_some() {}
}

fn parse_attr(body: &str) -> Result<AttrMatch, &'static str> {
    let (name, value) = match body.split_once('=') {
        Some((name, value)) => {
            let value = value.trim();
            let unquoted = value
                .strip_prefix('"')
                .and_then(|v| v.strip_suffix('"'))
                .or_else(|| value.strip_prefix('\'').and_then(|v| v.strip_suffix('\'')))
                .unwrap_or(value);
            (name.trim(), Some(unquoted.to_owned()))
        }
        None => (body.trim(), None),
    };

    if name.is_empty() || !name.chars().all(is_ident_char) {
        return Err("invalid attribute name");
    }

    Ok(AttrMatch {
        name: name.to_ascii_lowercase(),
        value,
    })
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-' || c == '_'
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bare = self.id.is_none() && self.classes.is_empty() && self.attrs.is_empty();
        match &self.tag {
            Some(tag) => f.write_str(tag)?,
            None if bare => f.write_str("*")?,
            None => {}
        }
        if let Some(id) = &self.id {
            write!(f, "#{id}")?;
        }
        for class in &self.classes {
            write!(f, ".{class}")?;
        }
        for attr in &self.attrs {
            match &attr.value {
                Some(value) => write!(f, "[{}=\"{value}\"]", attr.name)?,
                None => write!(f, "[{}]", attr.name)?,
            }
        }
        Ok(())
    }
}
