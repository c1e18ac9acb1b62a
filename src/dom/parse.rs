//! Lenient HTML reader building a [`Document`] arena.
//!
//! Built on quick-xml with all well-formedness checks disabled: unmatched
//! end tags are tolerated, void elements never open a scope, and the
//! contents of `<script>`/`<style>` are taken verbatim.

use super::{Document, DomError, NodeId, NodeKind};
use quick_xml::{
    Reader,
    events::{BytesRef, BytesStart, Event},
};

/// Elements that never have content or an end tag.
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

/// Elements whose content is raw text.
pub(super) const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style"];

pub(super) fn is_void(tag: &str) -> bool {
    VOID_ELEMENTS.contains(&tag)
}

#[inline]
fn create_html_reader(content: &str) -> Reader<&[u8]> {
    let mut reader = Reader::from_str(content);
    let config = reader.config_mut();
    config.trim_text(false);
    config.enable_all_checks(false);
    config.allow_unmatched_ends = true;
    config.allow_dangling_amp = true;
    reader
}

/// Parse `html` and append the resulting nodes under `parent`.
pub(super) fn parse_into(doc: &mut Document, parent: NodeId, html: &str) -> Result<(), DomError> {
    let mut reader = create_html_reader(html);
    // Offset of the current reader's input within `html`.
    let mut base = 0usize;
    let mut stack = vec![parent];

    loop {
        let current = stack.last().copied().unwrap_or(parent);
        let event = reader.read_event().map_err(|err| DomError::Parse {
            position: base as u64 + reader.error_position(),
            message: err.to_string(),
        })?;

        match event {
            Event::Start(elem) => {
                let node = open_element(doc, current, &elem);
                let tag = doc.tag(node).unwrap_or_default().to_owned();
                if RAW_TEXT_ELEMENTS.contains(&tag.as_str()) {
                    // Raw text is not markup: take it verbatim up to the
                    // matching end tag and restart the reader after it.
                    let start = base + reader.buffer_position() as usize;
                    let (text, resume) = take_raw_text(html, start, &tag);
                    if !text.is_empty() {
                        let text_node = doc.create_text(text);
                        doc.append_child(node, text_node);
                    }
                    base = resume;
                    reader = create_html_reader(&html[resume..]);
                } else if !is_void(&tag) {
                    stack.push(node);
                }
            }
            Event::Empty(elem) => {
                open_element(doc, current, &elem);
            }
            Event::End(elem) => {
                let name = String::from_utf8_lossy(elem.name().as_ref()).to_ascii_lowercase();
                // Close the nearest open element with this name, if any.
                if let Some(pos) = stack
                    .iter()
                    .skip(1)
                    .rposition(|id| doc.tag(*id) == Some(name.as_str()))
                {
                    stack.truncate(pos + 1);
                }
            }
            Event::Text(text) => {
                let text = text.decode().map_err(|err| DomError::Parse {
                    position: base as u64 + reader.buffer_position(),
                    message: err.to_string(),
                })?;
                doc.push_text(current, &text);
            }
            Event::GeneralRef(reference) => {
                let text = resolve_reference(&reference);
                doc.push_text(current, &text);
            }
            Event::CData(data) => {
                doc.push_text(current, &String::from_utf8_lossy(&data));
            }
            Event::Comment(comment) => {
                let node = doc.alloc(NodeKind::Comment(
                    String::from_utf8_lossy(&comment).into_owned(),
                ));
                doc.append_child(current, node);
            }
            Event::DocType(doctype) => {
                let node = doc.alloc(NodeKind::Doctype(
                    String::from_utf8_lossy(&doctype).trim().to_owned(),
                ));
                doc.append_child(current, node);
            }
            Event::Decl(_) | Event::PI(_) => {}
            Event::Eof => break,
        }
    }

    Ok(())
}

/// Split off raw text starting at `start` up to `</tag`.
///
/// Returns the text and the offset just past the end tag. A missing end tag
/// takes the rest of the input.
fn take_raw_text<'a>(html: &'a str, start: usize, tag: &str) -> (&'a str, usize) {
    let rest = &html[start..];
    let needle = format!("</{tag}");
    let Some(close) = rest.to_ascii_lowercase().find(&needle) else {
        return (rest, html.len());
    };

    let after = &rest[close..];
    let end = after.find('>').map_or(after.len(), |i| i + 1);
    (&rest[..close], start + close + end)
}

fn open_element(doc: &mut Document, parent: NodeId, elem: &BytesStart<'_>) -> NodeId {
    let tag = String::from_utf8_lossy(elem.name().as_ref()).to_ascii_lowercase();
    let attrs = elem
        .html_attributes()
        .flatten()
        .map(|attr| {
            let key = String::from_utf8_lossy(attr.key.as_ref()).to_ascii_lowercase();
            let value = attr
                .unescape_value_with(resolve_named_entity)
                .map(|v| v.into_owned())
                .unwrap_or_else(|_| String::from_utf8_lossy(&attr.value).into_owned());
            (key, value)
        })
        .collect();

    let node = doc.alloc(NodeKind::Element { tag, attrs });
    doc.append_child(parent, node);
    node
}

/// Resolve `&name;` or `&#NN;`, keeping unknown references literally.
fn resolve_reference(reference: &BytesRef<'_>) -> String {
    if reference.is_char_ref()
        && let Ok(Some(ch)) = reference.resolve_char_ref()
    {
        return ch.to_string();
    }

    let name = String::from_utf8_lossy(reference);
    match resolve_named_entity(&name) {
        Some(value) => value.to_owned(),
        None => format!("&{name};"),
    }
}

fn resolve_named_entity(name: &str) -> Option<&'static str> {
    Some(match name {
        "amp" => "&",
        "lt" => "<",
        "gt" => ">",
        "quot" => "\"",
        "apos" => "'",
        "nbsp" => "\u{a0}",
        "copy" => "\u{a9}",
        "hellip" => "\u{2026}",
        "mdash" => "\u{2014}",
        "ndash" => "\u{2013}",
        _ => return None,
    })
}
