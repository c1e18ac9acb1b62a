//! In-memory document model used by the hydration runtime and the
//! navigation manager.
//!
//! A [`Document`] is an arena of nodes addressed by [`NodeId`]. Subtrees
//! dropped by `clear_children` or `set_inner_html` go back to a free list
//! and their slots are reused, so a long-lived document stays bounded by its
//! live size. Ids carry a generation: an id held across a swap never aliases
//! the node that later takes its slot (see [`Document::is_attached`]).
//!
//! ```text
//!   Document::parse(html) ──► arena ──► select_all(&Selector) ──► NodeId
//!                                 └──► set_inner_html / inner_html / to_html
//! ```

mod parse;
mod select;

pub use select::{AttrMatch, Selector};

use quick_xml::escape::{escape, partial_escape};
use std::str::FromStr;
use thiserror::Error;

/// Errors raised while parsing markup or selectors.
#[derive(Debug, Error)]
pub enum DomError {
    #[error("markup parse error at position {position}: {message}")]
    Parse { position: u64, message: String },

    #[error("invalid selector `{selector}`: {reason}")]
    Selector { selector: String, reason: String },
}

/// Handle to a node inside one [`Document`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId {
    index: usize,
    generation: u32,
}

#[derive(Debug, Clone)]
pub enum NodeKind {
    Root,
    Element {
        tag: String,
        attrs: Vec<(String, String)>,
    },
    Text(String),
    Comment(String),
    Doctype(String),
}

#[derive(Debug, Clone)]
struct Node {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    /// Bumped whenever the slot is freed.
    generation: u32,
}

#[derive(Debug, Clone)]
pub struct Document {
    nodes: Vec<Node>,
    free: Vec<usize>,
}

impl Default for Document {
    fn default() -> Self {
        Self {
            nodes: vec![Node {
                kind: NodeKind::Root,
                parent: None,
                children: Vec::new(),
                generation: 0,
            }],
            free: Vec::new(),
        }
    }
}

impl FromStr for Selector {
    type Err = DomError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Document {
    /// Parse a full document or fragment.
    pub fn parse(html: &str) -> Result<Self, DomError> {
        let mut doc = Self::default();
        let root = doc.root();
        parse::parse_into(&mut doc, root, html)?;
        Ok(doc)
    }

    #[inline]
    pub const fn root(&self) -> NodeId {
        NodeId {
            index: 0,
            generation: 0,
        }
    }

    /// Slots held by the arena, live or free.
    pub fn capacity(&self) -> usize {
        self.nodes.len()
    }

    /// Nodes currently allocated, attached or not.
    pub fn live_count(&self) -> usize {
        self.nodes.len() - self.free.len()
    }

    // ------------------------------------------------------------------------
    // Node construction
    // ------------------------------------------------------------------------

    fn alloc(&mut self, kind: NodeKind) -> NodeId {
        if let Some(index) = self.free.pop() {
            let slot = &mut self.nodes[index];
            slot.kind = kind;
            return NodeId {
                index,
                generation: slot.generation,
            };
        }
        self.nodes.push(Node {
            kind,
            parent: None,
            children: Vec::new(),
            generation: 0,
        });
        NodeId {
            index: self.nodes.len() - 1,
            generation: 0,
        }
    }

    /// Return `node` and everything below it to the free list.
    fn release(&mut self, node: NodeId) {
        let mut stack = vec![node.index];
        while let Some(index) = stack.pop() {
            let slot = &mut self.nodes[index];
            stack.extend(slot.children.drain(..).map(|child| child.index));
            slot.parent = None;
            slot.kind = NodeKind::Comment(String::new());
            slot.generation = slot.generation.wrapping_add(1);
            self.free.push(index);
        }
    }

    /// Create a detached element.
    pub fn create_element(&mut self, tag: &str) -> NodeId {
        self.alloc(NodeKind::Element {
            tag: tag.to_ascii_lowercase(),
            attrs: Vec::new(),
        })
    }

    /// Create a detached text node.
    pub fn create_text(&mut self, text: &str) -> NodeId {
        self.alloc(NodeKind::Text(text.to_owned()))
    }

    /// Append text under `parent`, merging with a trailing text node.
    fn push_text(&mut self, parent: NodeId, text: &str) {
        if text.is_empty() {
            return;
        }
        if let Some(&last) = self.nodes[parent.index].children.last()
            && let NodeKind::Text(existing) = &mut self.nodes[last.index].kind
        {
            existing.push_str(text);
            return;
        }
        let node = self.create_text(text);
        self.append_child(parent, node);
    }

    // ------------------------------------------------------------------------
    // Tree structure
    // ------------------------------------------------------------------------

    pub fn kind(&self, node: NodeId) -> &NodeKind {
        &self.nodes[node.index].kind
    }

    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.nodes[node.index].parent
    }

    pub fn children(&self, node: NodeId) -> &[NodeId] {
        &self.nodes[node.index].children
    }

    /// All nodes below `node` in document order, `node` excluded.
    pub fn descendants(&self, node: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.children(node).iter().rev().copied().collect();
        while let Some(id) = stack.pop() {
            out.push(id);
            stack.extend(self.children(id).iter().rev());
        }
        out
    }

    /// Whether `node` still refers to the node it was issued for.
    pub fn is_live(&self, node: NodeId) -> bool {
        self.nodes
            .get(node.index)
            .is_some_and(|slot| slot.generation == node.generation)
    }

    /// Whether `node` is live and reachable from the root.
    pub fn is_attached(&self, node: NodeId) -> bool {
        node == self.root() || (self.is_live(node) && self.contains(self.root(), node))
    }

    /// Whether `node` lies strictly inside `ancestor`.
    pub fn contains(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut current = self.parent(node);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.parent(id);
        }
        false
    }

    /// Move `child` to the end of `parent`'s children.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        self.detach(child);
        self.nodes[child.index].parent = Some(parent);
        self.nodes[parent.index].children.push(child);
    }

    /// Remove `node` from its parent. The node stays usable.
    pub fn detach(&mut self, node: NodeId) {
        if let Some(parent) = self.nodes[node.index].parent.take() {
            self.nodes[parent.index].children.retain(|id| *id != node);
        }
    }

    /// Detach `node` and free its subtree. Ids into it stop being live.
    pub fn remove(&mut self, node: NodeId) {
        if node == self.root() || !self.is_live(node) {
            return;
        }
        self.detach(node);
        self.release(node);
    }

    /// Drop every child of `node`, freeing their subtrees.
    pub fn clear_children(&mut self, node: NodeId) {
        let children = std::mem::take(&mut self.nodes[node.index].children);
        for child in children {
            self.nodes[child.index].parent = None;
            self.release(child);
        }
    }

    // ------------------------------------------------------------------------
    // Elements & attributes
    // ------------------------------------------------------------------------

    /// Tag name of an element node.
    pub fn tag(&self, node: NodeId) -> Option<&str> {
        match &self.nodes[node.index].kind {
            NodeKind::Element { tag, .. } => Some(tag),
            _ => None,
        }
    }

    pub fn attr(&self, node: NodeId, name: &str) -> Option<&str> {
        match &self.nodes[node.index].kind {
            NodeKind::Element { attrs, .. } => attrs
                .iter()
                .find(|(key, _)| key.eq_ignore_ascii_case(name))
                .map(|(_, value)| value.as_str()),
            _ => None,
        }
    }

    pub fn has_attr(&self, node: NodeId, name: &str) -> bool {
        self.attr(node, name).is_some()
    }

    /// Set an attribute, keeping its position if it already exists.
    /// Ignored on non-element nodes.
    pub fn set_attr(&mut self, node: NodeId, name: &str, value: impl Into<String>) {
        if let NodeKind::Element { attrs, .. } = &mut self.nodes[node.index].kind {
            let value = value.into();
            match attrs.iter_mut().find(|(key, _)| key.eq_ignore_ascii_case(name)) {
                Some((_, existing)) => *existing = value,
                None => attrs.push((name.to_ascii_lowercase(), value)),
            }
        }
    }

    pub fn remove_attr(&mut self, node: NodeId, name: &str) {
        if let NodeKind::Element { attrs, .. } = &mut self.nodes[node.index].kind {
            attrs.retain(|(key, _)| !key.eq_ignore_ascii_case(name));
        }
    }

    /// Concatenated text of all descendant text nodes.
    pub fn text_content(&self, node: NodeId) -> String {
        let mut out = String::new();
        if let NodeKind::Text(text) = self.kind(node) {
            out.push_str(text);
        }
        for id in self.descendants(node) {
            if let NodeKind::Text(text) = self.kind(id) {
                out.push_str(text);
            }
        }
        out
    }

    // ------------------------------------------------------------------------
    // Selection
    // ------------------------------------------------------------------------

    pub fn matches(&self, node: NodeId, selector: &Selector) -> bool {
        let NodeKind::Element { tag, .. } = self.kind(node) else {
            return false;
        };

        if selector.tag.as_deref().is_some_and(|t| t != tag) {
            return false;
        }
        if let Some(id) = &selector.id
            && self.attr(node, "id") != Some(id.as_str())
        {
            return false;
        }
        if !selector.classes.is_empty() {
            let class = self.attr(node, "class").unwrap_or_default();
            let has_all = selector
                .classes
                .iter()
                .all(|wanted| class.split_ascii_whitespace().any(|c| c == wanted));
            if !has_all {
                return false;
            }
        }
        selector.attrs.iter().all(|cond| {
            match (self.attr(node, &cond.name), cond.value.as_deref()) {
                (Some(actual), Some(expected)) => actual == expected,
                (Some(_), None) => true,
                (None, _) => false,
            }
        })
    }

    /// Every matching element in document order.
    pub fn select_all(&self, selector: &Selector) -> Vec<NodeId> {
        self.select_all_in(self.root(), selector)
    }

    /// Every matching element below `scope` in document order.
    pub fn select_all_in(&self, scope: NodeId, selector: &Selector) -> Vec<NodeId> {
        self.descendants(scope)
            .into_iter()
            .filter(|id| self.matches(*id, selector))
            .collect()
    }

    pub fn select_first(&self, selector: &Selector) -> Option<NodeId> {
        self.descendants(self.root())
            .into_iter()
            .find(|id| self.matches(*id, selector))
    }

    // ------------------------------------------------------------------------
    // Title
    // ------------------------------------------------------------------------

    fn title_element(&self) -> Option<NodeId> {
        self.descendants(self.root())
            .into_iter()
            .find(|id| self.tag(*id) == Some("title"))
    }

    /// Text of the first `<title>`, if any.
    pub fn title(&self) -> Option<String> {
        self.title_element().map(|id| self.text_content(id))
    }

    /// Replace the `<title>` text, creating the element inside `<head>`
    /// when missing. Documents without a head are left untouched.
    pub fn set_title(&mut self, title: &str) {
        let element = match self.title_element() {
            Some(id) => id,
            None => {
                let head = self
                    .descendants(self.root())
                    .into_iter()
                    .find(|id| self.tag(*id) == Some("head"));
                let Some(head) = head else {
                    return;
                };
                let element = self.create_element("title");
                self.append_child(head, element);
                element
            }
        };
        self.clear_children(element);
        let text = self.create_text(title);
        self.append_child(element, text);
    }

    // ------------------------------------------------------------------------
    // Serialization
    // ------------------------------------------------------------------------

    /// Parse `html` and make it the content of `node`.
    ///
    /// Parsing happens first: on error `node` keeps its current children.
    pub fn set_inner_html(&mut self, node: NodeId, html: &str) -> Result<(), DomError> {
        let fragment = Self::parse(html)?;
        self.clear_children(node);
        let children = fragment.children(fragment.root()).to_vec();
        for child in children {
            self.import(&fragment, child, node);
        }
        Ok(())
    }

    /// Deep-copy `src` from `other` under `parent`.
    fn import(&mut self, other: &Document, src: NodeId, parent: NodeId) {
        let node = self.alloc(other.kind(src).clone());
        self.append_child(parent, node);
        for child in other.children(src) {
            self.import(other, *child, node);
        }
    }

    pub fn inner_html(&self, node: NodeId) -> String {
        let mut out = String::new();
        for child in self.children(node) {
            self.write_node(*child, &mut out);
        }
        out
    }

    pub fn outer_html(&self, node: NodeId) -> String {
        let mut out = String::new();
        self.write_node(node, &mut out);
        out
    }

    /// Serialize the whole document.
    pub fn to_html(&self) -> String {
        self.inner_html(self.root())
    }

    fn write_node(&self, node: NodeId, out: &mut String) {
        match self.kind(node) {
            NodeKind::Root => {
                for child in self.children(node) {
                    self.write_node(*child, out);
                }
            }
            NodeKind::Element { tag, attrs } => {
                out.push('<');
                out.push_str(tag);
                for (key, value) in attrs {
                    out.push(' ');
                    out.push_str(key);
                    out.push_str("=\"");
                    out.push_str(&escape(value.as_str()));
                    out.push('"');
                }
                out.push('>');
                if parse::is_void(tag) {
                    return;
                }
                let raw = parse::RAW_TEXT_ELEMENTS.contains(&tag.as_str());
                for child in self.children(node) {
                    match self.kind(*child) {
                        NodeKind::Text(text) if raw => out.push_str(text),
                        _ => self.write_node(*child, out),
                    }
                }
                out.push_str("</");
                out.push_str(tag);
                out.push('>');
            }
            NodeKind::Text(text) => out.push_str(&partial_escape(text.as_str())),
            NodeKind::Comment(text) => {
                out.push_str("<!--");
                out.push_str(text);
                out.push_str("-->");
            }
            NodeKind::Doctype(text) => {
                out.push_str("<!DOCTYPE ");
                out.push_str(text);
                out.push('>');
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sel(s: &str) -> Selector {
        s.parse().unwrap()
    }

    const PAGE: &str = r#"<!DOCTYPE html><html><head><title>Home</title></head><body><main id="atoll-content"><h1 class="big title">Hi</h1><p>text</p></main></body></html>"#;

    #[test]
    fn test_parse_and_serialize() {
        let doc = Document::parse(PAGE).unwrap();
        assert_eq!(doc.to_html(), PAGE);
    }

    #[test]
    fn test_select_by_id_and_class() {
        let doc = Document::parse(PAGE).unwrap();
        let main = doc.select_first(&sel("#atoll-content")).unwrap();
        assert_eq!(doc.tag(main), Some("main"));
        let h1 = doc.select_first(&sel("h1.title")).unwrap();
        assert!(doc.contains(main, h1));
        assert!(doc.select_first(&sel("h1.missing")).is_none());
    }

    #[test]
    fn test_select_attr_value() {
        let doc = Document::parse(r#"<a data-x="1"></a><a data-x="2"></a><a></a>"#).unwrap();
        assert_eq!(doc.select_all(&sel("[data-x]")).len(), 2);
        assert_eq!(doc.select_all(&sel("a[data-x=2]")).len(), 1);
    }

    #[test]
    fn test_title_roundtrip() {
        let mut doc = Document::parse(PAGE).unwrap();
        assert_eq!(doc.title().as_deref(), Some("Home"));
        doc.set_title("About & More");
        assert_eq!(doc.title().as_deref(), Some("About & More"));
        assert!(doc.to_html().contains("<title>About &amp; More</title>"));
    }

    #[test]
    fn test_set_title_creates_element_in_head() {
        let mut doc = Document::parse("<html><head></head><body></body></html>").unwrap();
        assert_eq!(doc.title(), None);
        doc.set_title("New");
        assert_eq!(doc.title().as_deref(), Some("New"));
    }

    #[test]
    fn test_set_inner_html_replaces_children() {
        let mut doc = Document::parse(PAGE).unwrap();
        let main = doc.select_first(&sel("#atoll-content")).unwrap();
        doc.set_inner_html(main, "<p>swapped</p>").unwrap();
        assert_eq!(doc.inner_html(main), "<p>swapped</p>");
        assert!(doc.select_first(&sel("h1")).is_none());
    }

    #[test]
    fn test_repeated_swaps_reuse_slots() {
        let mut doc = Document::parse("<main></main>").unwrap();
        let main = doc.select_first(&sel("main")).unwrap();
        let content = "<p>a</p>".repeat(50);

        doc.set_inner_html(main, &content).unwrap();
        let settled = doc.capacity();
        for _ in 0..1000 {
            doc.set_inner_html(main, &content).unwrap();
        }

        assert_eq!(doc.capacity(), settled);
        assert_eq!(doc.live_count(), 2 + 100);
        assert_eq!(doc.inner_html(main), content);
    }

    #[test]
    fn test_stale_ids_are_not_live() {
        let mut doc = Document::parse("<div><b>x</b></div>").unwrap();
        let div = doc.select_first(&sel("div")).unwrap();
        let b = doc.select_first(&sel("b")).unwrap();
        assert!(doc.is_attached(b));

        doc.set_inner_html(div, "<i>y</i>").unwrap();
        let i = doc.select_first(&sel("i")).unwrap();

        assert!(!doc.is_live(b));
        assert!(!doc.is_attached(b));
        assert!(doc.is_attached(i));
        assert_ne!(b, i);
    }

    #[test]
    fn test_remove_frees_subtree() {
        let mut doc = Document::parse("<div><b>x</b><i>y</i></div>").unwrap();
        let b = doc.select_first(&sel("b")).unwrap();
        let before = doc.live_count();

        doc.remove(b);

        assert_eq!(doc.live_count(), before - 2);
        assert_eq!(doc.to_html(), "<div><i>y</i></div>");
        doc.remove(b);
        assert_eq!(doc.live_count(), before - 2);
    }

    #[test]
    fn test_detached_node_stays_usable() {
        let mut doc = Document::parse("<div><b>x</b></div><p></p>").unwrap();
        let b = doc.select_first(&sel("b")).unwrap();
        let p = doc.select_first(&sel("p")).unwrap();

        doc.detach(b);
        assert!(doc.is_live(b));
        assert!(!doc.is_attached(b));
        doc.append_child(p, b);
        assert_eq!(doc.to_html(), "<div></div><p><b>x</b></p>");
    }

    #[test]
    fn test_attributes() {
        let mut doc = Document::parse(r#"<div data-a="1"></div>"#).unwrap();
        let div = doc.select_first(&sel("div")).unwrap();
        assert_eq!(doc.attr(div, "data-a"), Some("1"));
        doc.set_attr(div, "data-a", "2");
        doc.set_attr(div, "data-b", "\"q\"");
        assert_eq!(doc.outer_html(div), r#"<div data-a="2" data-b="&quot;q&quot;"></div>"#);
        doc.remove_attr(div, "data-a");
        assert!(!doc.has_attr(div, "data-a"));
    }

    #[test]
    fn test_descendants_document_order() {
        let doc = Document::parse("<a><b></b><c><d></d></c></a><e></e>").unwrap();
        let tags: Vec<_> = doc
            .descendants(doc.root())
            .into_iter()
            .filter_map(|id| doc.tag(id))
            .collect();
        assert_eq!(tags, vec!["a", "b", "c", "d", "e"]);
    }
}
