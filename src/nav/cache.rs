//! URL-keyed page cache for client-side navigation.

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use std::sync::Arc;
use url::Url;

/// What a navigation needs from a fetched page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageCacheEntry {
    /// Inner markup of the content region.
    pub html: String,
    /// `None` when the page had no `<title>`.
    pub title: Option<String>,
}

/// Cache key for `url`: path plus query.
///
/// The origin of absolute URLs, the fragment and a trailing slash (except
/// on the root) are dropped, so `/docs/#intro` and `/docs` share an entry.
pub fn cache_key(url: &str) -> String {
    let url = url.trim();
    let url = url.split_once('#').map_or(url, |(before, _)| before);

    let relative = match Url::parse(url) {
        Ok(parsed) if parsed.has_host() => match parsed.query() {
            Some(query) => format!("{}?{query}", parsed.path()),
            None => parsed.path().to_owned(),
        },
        _ => url.to_owned(),
    };

    let (path, query) = match relative.split_once('?') {
        Some((path, query)) => (path, Some(query)),
        None => (relative.as_str(), None),
    };
    let path = match path {
        "" => "/",
        "/" => path,
        _ => path.strip_suffix('/').unwrap_or(path),
    };

    match query {
        Some(query) if !query.is_empty() => format!("{path}?{query}"),
        _ => path.to_owned(),
    }
}

/// Pages fetched by navigations and prefetches.
///
/// Entries are never evicted; [`PageCache::clear`] drops all of them.
/// Cloning shares the underlying map.
#[derive(Debug, Clone, Default)]
pub struct PageCache {
    entries: Arc<Mutex<FxHashMap<String, PageCacheEntry>>>,
}

impl PageCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, url: &str) -> Option<PageCacheEntry> {
        self.entries.lock().get(&cache_key(url)).cloned()
    }

    pub fn contains(&self, url: &str) -> bool {
        self.entries.lock().contains_key(&cache_key(url))
    }

    /// Store `entry` for `url`, replacing any previous one.
    pub fn insert(&self, url: &str, entry: PageCacheEntry) {
        self.entries.lock().insert(cache_key(url), entry);
    }

    pub fn remove(&self, url: &str) -> Option<PageCacheEntry> {
        self.entries.lock().remove(&cache_key(url))
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}
