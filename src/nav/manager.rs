//! Single-flight client-side navigation.
//!
//! A navigation fetches the target page (or reads it from the cache), swaps
//! the content region of the live document, and re-activates islands. Any
//! failure falls back to a full browser navigation.

use super::{
    cache::{PageCache, PageCacheEntry},
    link::{LinkClick, should_intercept},
};
use crate::config::NavigationConfig;
use crate::dom::{Document, DomError, Selector};
use crate::hydrate::{HydrationReport, HydrationRuntime};
use crate::log;
use parking_lot::Mutex;
use std::{
    fmt,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};
use thiserror::Error;
use url::Url;

/// Response of a navigation fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResponse {
    pub status: u16,
    pub body: String,
}

impl FetchResponse {
    pub fn ok(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            body: body.into(),
        }
    }

    pub const fn is_ok(&self) -> bool {
        self.status >= 200 && self.status < 300
    }
}

/// Issues GET requests for page markup.
#[allow(async_fn_in_trait)]
pub trait Fetcher {
    async fn get(&self, url: &str, headers: &[(&str, &str)]) -> anyhow::Result<FetchResponse>;
}

/// The browser window around the live document.
pub trait BrowserHost {
    /// Current location, used to resolve relative targets.
    fn location(&self) -> Url;
    /// Full navigation to `url`.
    fn assign(&self, url: &str);
    fn push_state(&self, url: &str);
    fn replace_state(&self, url: &str);
    fn scroll_to_top(&self);
}

#[derive(Debug, Error)]
pub enum NavError {
    #[error("invalid navigation target `{url}`: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("failed to fetch {url}: {source:#}")]
    Fetch {
        url: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("{url} answered with status {status}")]
    Status { url: String, status: u16 },

    #[error("failed to parse {url}: {source}")]
    Parse {
        url: String,
        #[source]
        source: DomError,
    },

    #[error("{url} has no content region matching `{selector}`")]
    MissingFetchedRegion { url: String, selector: String },

    #[error("live document has no content region matching `{selector}`")]
    MissingLiveRegion { selector: String },
}

/// How a navigation request ended.
#[derive(Debug)]
pub enum NavOutcome {
    /// Content region swapped in place.
    Swapped {
        from_cache: bool,
        hydration: HydrationReport,
    },
    /// Another navigation was in flight; nothing happened.
    Dropped,
    /// Handed over to a full browser navigation.
    FullReload(NavError),
}

impl NavOutcome {
    pub const fn is_swapped(&self) -> bool {
        matches!(self, Self::Swapped { .. })
    }
}

type UrlHook = Box<dyn Fn(&str) + Send + Sync>;
type ErrorHook = Box<dyn Fn(&str, &NavError) + Send + Sync>;

#[derive(Default)]
struct Hooks {
    before: Option<UrlHook>,
    after: Option<UrlHook>,
    error: Option<ErrorHook>,
}

/// Clears the navigating flag however the navigation ends.
struct NavigatingGuard<'a>(&'a AtomicBool);

impl Drop for NavigatingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Long-lived navigation state of one page session.
///
/// `Idle -> Navigating -> Idle`. A navigation requested while another is
/// in flight is dropped, never queued. Prefetches ignore the flag.
pub struct NavigationManager<F, H> {
    fetcher: F,
    host: H,
    document: Arc<Mutex<Document>>,
    runtime: HydrationRuntime,
    cache: PageCache,
    content: Selector,
    header: String,
    navigating: AtomicBool,
    hooks: Hooks,
}

impl<F, H> fmt::Debug for NavigationManager<F, H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NavigationManager")
            .field("content", &self.content)
            .field("header", &self.header)
            .field("cached", &self.cache.len())
            .field("navigating", &self.navigating.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl<F: Fetcher, H: BrowserHost> NavigationManager<F, H> {
    pub fn new(
        fetcher: F,
        host: H,
        document: Arc<Mutex<Document>>,
        runtime: HydrationRuntime,
        config: &NavigationConfig,
    ) -> Result<Self, DomError> {
        Ok(Self {
            fetcher,
            host,
            document,
            runtime,
            cache: PageCache::new(),
            content: Selector::parse(&config.content_selector)?,
            header: config.header.clone(),
            navigating: AtomicBool::new(false),
            hooks: Hooks::default(),
        })
    }

    /// Share an existing cache, e.g. across managers of the same session.
    pub fn with_cache(mut self, cache: PageCache) -> Self {
        self.cache = cache;
        self
    }

    pub fn on_before(mut self, hook: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.hooks.before = Some(Box::new(hook));
        self
    }

    pub fn on_after(mut self, hook: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.hooks.after = Some(Box::new(hook));
        self
    }

    pub fn on_error(mut self, hook: impl Fn(&str, &NavError) + Send + Sync + 'static) -> Self {
        self.hooks.error = Some(Box::new(hook));
        self
    }

    pub fn document(&self) -> &Arc<Mutex<Document>> {
        &self.document
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn cache(&self) -> &PageCache {
        &self.cache
    }

    pub fn is_navigating(&self) -> bool {
        self.navigating.load(Ordering::Acquire)
    }

    pub fn cached_len(&self) -> usize {
        self.cache.len()
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    /// Navigate the live document to `url` without touching history.
    pub async fn navigate_to_url(&self, url: &str) -> NavOutcome {
        if self
            .navigating
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            log!("nav"; "navigation to {url} ignored, another one is in flight");
            return NavOutcome::Dropped;
        }
        let _guard = NavigatingGuard(&self.navigating);

        if let Some(hook) = &self.hooks.before {
            hook(url);
        }

        let target = match self.resolve(url) {
            Ok(target) => target,
            Err(err) => return self.fall_back(url, url, err),
        };
        match self.swap(&target).await {
            Ok((from_cache, hydration)) => {
                if let Some(hook) = &self.hooks.after {
                    hook(url);
                }
                NavOutcome::Swapped {
                    from_cache,
                    hydration,
                }
            }
            Err(err) => self.fall_back(url, target.as_str(), err),
        }
    }

    fn fall_back(&self, url: &str, assign_to: &str, err: NavError) -> NavOutcome {
        log!("nav"; "{err}, falling back to a full navigation");
        if let Some(hook) = &self.hooks.error {
            hook(url, &err);
        }
        self.host.assign(assign_to);
        NavOutcome::FullReload(err)
    }

    /// Push (or replace) the history entry for `url`, then navigate.
    pub async fn navigate(&self, url: &str, replace: bool) -> NavOutcome {
        if self.is_navigating() {
            log!("nav"; "navigation to {url} ignored, another one is in flight");
            return NavOutcome::Dropped;
        }
        if replace {
            self.host.replace_state(url);
        } else {
            self.host.push_state(url);
        }
        self.navigate_to_url(url).await
    }

    /// Back/forward: history already points at `url`.
    pub async fn handle_popstate(&self, url: &str) -> NavOutcome {
        self.navigate_to_url(url).await
    }

    /// Handle a link click in-page when it qualifies.
    ///
    /// Returns `true` when the click was taken over (the caller prevents the
    /// browser default), `false` when the browser should follow it.
    pub async fn handle_link_click(&self, click: &LinkClick) -> bool {
        let Some(target) = should_intercept(click, &self.host.location()) else {
            return false;
        };
        self.navigate(target.as_str(), false).await;
        true
    }

    /// Fetch `url` into the cache without touching the document.
    pub async fn prefetch(&self, url: &str) -> Result<(), NavError> {
        let target = self.resolve(url)?;
        if self.cache.contains(target.as_str()) {
            return Ok(());
        }
        let entry = self.fetch_page(&target).await?;
        self.cache.insert(target.as_str(), entry);
        Ok(())
    }

    /// Resolve `url` against the current location.
    fn resolve(&self, url: &str) -> Result<Url, NavError> {
        self.host
            .location()
            .join(url)
            .map_err(|source| NavError::InvalidUrl {
                url: url.to_owned(),
                source,
            })
    }

    async fn swap(&self, target: &Url) -> Result<(bool, HydrationReport), NavError> {
        let (entry, from_cache) = match self.cache.get(target.as_str()) {
            Some(entry) => (entry, true),
            None => (self.fetch_page(target).await?, false),
        };

        let hydration = self.apply(target.as_str(), &entry)?;
        if !from_cache {
            self.cache.insert(target.as_str(), entry);
        }
        Ok((from_cache, hydration))
    }

    /// Swap `entry` into the live document and re-activate islands.
    fn apply(&self, url: &str, entry: &PageCacheEntry) -> Result<HydrationReport, NavError> {
        let mut doc = self.document.lock();
        let region = doc
            .select_first(&self.content)
            .ok_or_else(|| NavError::MissingLiveRegion {
                selector: self.content.to_string(),
            })?;

        doc.set_inner_html(region, &entry.html)
            .map_err(|source| NavError::Parse {
                url: url.to_owned(),
                source,
            })?;
        if let Some(title) = &entry.title {
            doc.set_title(title);
        }
        self.host.scroll_to_top();

        Ok(self.runtime.hydrate_all(&mut doc))
    }

    async fn fetch_page(&self, target: &Url) -> Result<PageCacheEntry, NavError> {
        let url = target.as_str();
        let response = self
            .fetcher
            .get(url, &[(self.header.as_str(), "true")])
            .await
            .map_err(|source| NavError::Fetch {
                url: url.to_owned(),
                source,
            })?;
        if !response.is_ok() {
            return Err(NavError::Status {
                url: url.to_owned(),
                status: response.status,
            });
        }

        let page = Document::parse(&response.body).map_err(|source| NavError::Parse {
            url: url.to_owned(),
            source,
        })?;
        let region = page
            .select_first(&self.content)
            .ok_or_else(|| NavError::MissingFetchedRegion {
                url: url.to_owned(),
                selector: self.content.to_string(),
            })?;

        Ok(PageCacheEntry {
            html: page.inner_html(region),
            title: page.title(),
        })
    }
}
