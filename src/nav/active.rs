//! Active navigation item resolution.
//!
//! Maps the current path to the menu entry that should be highlighted:
//! exact match first, then the nearest registered ancestor, then `/`.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use url::Url;

/// One entry of a navigation menu.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavItem {
    pub id: String,
    pub href: String,
}

impl NavItem {
    pub fn new(id: impl Into<String>, href: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            href: href.into(),
        }
    }
}

/// Normalize a path or URL for matching.
///
/// Drops the origin of absolute URLs, the query and the fragment, then a
/// single trailing slash unless the result is the root.
///
/// ```ignore
/// assert_eq!(normalize_path("/about/?lang=en#team"), "/about");
/// assert_eq!(normalize_path("https://example.com/docs/"), "/docs");
/// assert_eq!(normalize_path("/"), "/");
/// ```
pub fn normalize_path(path: &str) -> String {
    let path = path.trim();
    let path = match Url::parse(path) {
        Ok(url) if url.has_host() => url.path().to_owned(),
        _ => path.to_owned(),
    };

    let end = path.find(['?', '#']).unwrap_or(path.len());
    let path = &path[..end];

    let mut normalized = if path.starts_with('/') {
        path.to_owned()
    } else {
        format!("/{path}")
    };
    if normalized.len() > 1 && normalized.ends_with('/') {
        normalized.pop();
    }
    normalized
}

/// Parent of a normalized path, `None` at the root.
fn parent_path(path: &str) -> Option<&str> {
    if path == "/" {
        return None;
    }
    match path.rfind('/') {
        Some(0) | None => Some("/"),
        Some(pos) => Some(&path[..pos]),
    }
}

/// Normalized href → ids registered for it, in registration order.
///
/// Derived from one snapshot of the items; rebuild it when they change.
#[derive(Debug, Clone, Default)]
pub struct HrefIndex {
    by_href: FxHashMap<String, Vec<String>>,
}

impl HrefIndex {
    pub fn build(items: &[NavItem]) -> Self {
        let mut by_href: FxHashMap<String, Vec<String>> = FxHashMap::default();
        for item in items {
            by_href
                .entry(normalize_path(&item.href))
                .or_default()
                .push(item.id.clone());
        }
        Self { by_href }
    }

    /// Id of the item to mark active for `path`.
    pub fn resolve(&self, path: &str) -> Option<&str> {
        let normalized = normalize_path(path);
        let mut current = Some(normalized.as_str());

        while let Some(candidate) = current {
            if let Some(id) = self.first_for(candidate) {
                return Some(id);
            }
            current = parent_path(candidate);
        }
        None
    }

    fn first_for(&self, href: &str) -> Option<&str> {
        self.by_href
            .get(href)
            .and_then(|ids| ids.first())
            .map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.by_href.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_href.is_empty()
    }
}

/// One-shot form of [`HrefIndex::resolve`].
pub fn resolve_active(items: &[NavItem], path: &str) -> Option<String> {
    HrefIndex::build(items).resolve(path).map(str::to_owned)
}
