//! Which link clicks become client-side navigations.

use crate::dom::{Document, NodeId};
use url::Url;

/// Opt-out attribute: links carrying it always reload the page.
pub const RELOAD_ATTR: &str = "data-atoll-reload";

/// A click on an anchor, as reported by the host.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkClick {
    /// Raw `href` attribute, possibly relative.
    pub href: String,
    /// Mouse button, `0` is the primary one.
    pub button: u16,
    pub ctrl: bool,
    pub meta: bool,
    pub shift: bool,
    pub alt: bool,
    /// Anchor has a `download` attribute.
    pub download: bool,
    /// Anchor `target` attribute.
    pub target: Option<String>,
    /// Anchor carries [`RELOAD_ATTR`].
    pub reload: bool,
}

impl LinkClick {
    /// Plain primary click on `href`.
    pub fn primary(href: impl Into<String>) -> Self {
        Self {
            href: href.into(),
            ..Self::default()
        }
    }

    /// Primary click on the anchor `node`, `None` without an `href`.
    pub fn from_anchor(doc: &Document, node: NodeId) -> Option<Self> {
        if doc.tag(node) != Some("a") {
            return None;
        }
        Some(Self {
            href: doc.attr(node, "href")?.to_owned(),
            download: doc.has_attr(node, "download"),
            target: doc.attr(node, "target").map(str::to_owned),
            reload: doc.has_attr(node, RELOAD_ATTR),
            ..Self::default()
        })
    }

    const fn has_modifier(&self) -> bool {
        self.ctrl || self.meta || self.shift || self.alt
    }
}

/// Resolve `click` against `current` and decide whether to intercept it.
///
/// Returns the absolute target when the click should be handled in-page,
/// `None` when the browser should follow it normally.
pub fn should_intercept(click: &LinkClick, current: &Url) -> Option<Url> {
    if click.button != 0 || click.has_modifier() || click.download || click.reload {
        return None;
    }
    if click
        .target
        .as_deref()
        .is_some_and(|target| !target.is_empty() && !target.eq_ignore_ascii_case("_self"))
    {
        return None;
    }

    let target = current.join(click.href.trim()).ok()?;
    if !matches!(target.scheme(), "http" | "https") || target.origin() != current.origin() {
        return None;
    }

    // Same document, only the fragment differs: let the browser scroll.
    if target.fragment().is_some()
        && target.path() == current.path()
        && target.query() == current.query()
    {
        return None;
    }

    Some(target)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn current() -> Url {
        Url::parse("https://example.com/docs/intro?lang=en").unwrap()
    }

    fn intercepted(click: LinkClick) -> Option<String> {
        should_intercept(&click, &current()).map(|url| url.to_string())
    }

    #[test]
    fn test_same_origin_links_are_intercepted() {
        assert_eq!(
            intercepted(LinkClick::primary("/about")).as_deref(),
            Some("https://example.com/about")
        );
        assert_eq!(
            intercepted(LinkClick::primary("usage")).as_deref(),
            Some("https://example.com/docs/usage")
        );
        assert_eq!(
            intercepted(LinkClick::primary("https://example.com/blog#top")).as_deref(),
            Some("https://example.com/blog#top")
        );
    }

    #[test]
    fn test_modified_clicks_are_ignored() {
        let base = LinkClick::primary("/about");
        assert!(intercepted(LinkClick { ctrl: true, ..base.clone() }).is_none());
        assert!(intercepted(LinkClick { meta: true, ..base.clone() }).is_none());
        assert!(intercepted(LinkClick { shift: true, ..base.clone() }).is_none());
        assert!(intercepted(LinkClick { alt: true, ..base.clone() }).is_none());
        assert!(intercepted(LinkClick { button: 1, ..base }).is_none());
    }

    #[test]
    fn test_anchor_attributes_opt_out() {
        let base = LinkClick::primary("/about");
        assert!(intercepted(LinkClick { download: true, ..base.clone() }).is_none());
        assert!(intercepted(LinkClick { reload: true, ..base.clone() }).is_none());
        assert!(intercepted(LinkClick { target: Some("_blank".into()), ..base.clone() }).is_none());
        assert!(intercepted(LinkClick { target: Some("_self".into()), ..base }).is_some());
    }

    #[test]
    fn test_foreign_origin_and_schemes() {
        assert!(intercepted(LinkClick::primary("https://other.org/about")).is_none());
        assert!(intercepted(LinkClick::primary("http://example.com/about")).is_none());
        assert!(intercepted(LinkClick::primary("mailto:hi@example.com")).is_none());
    }

    #[test]
    fn test_fragment_on_current_page_is_ignored() {
        assert!(intercepted(LinkClick::primary("#section")).is_none());
        assert!(intercepted(LinkClick::primary("/docs/intro?lang=en#x")).is_none());
        // different query: a real navigation
        assert!(intercepted(LinkClick::primary("/docs/intro#x")).is_some());
    }

    #[test]
    fn test_from_anchor() {
        let doc = Document::parse(
            r#"<a href="/a" target="_blank" download data-atoll-reload>A</a><a>no href</a><p>x</p>"#,
        )
        .unwrap();
        let nodes = doc.children(doc.root()).to_vec();

        let click = LinkClick::from_anchor(&doc, nodes[0]).unwrap();
        assert_eq!(click.href, "/a");
        assert_eq!(click.target.as_deref(), Some("_blank"));
        assert!(click.download && click.reload);

        assert!(LinkClick::from_anchor(&doc, nodes[1]).is_none());
        assert!(LinkClick::from_anchor(&doc, nodes[2]).is_none());
    }
}
