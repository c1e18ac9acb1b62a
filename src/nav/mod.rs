//! Client-side navigation: page cache, link interception, the navigation
//! manager and active menu item resolution.

pub mod active;
mod cache;
mod link;
mod manager;

pub use active::{HrefIndex, NavItem, normalize_path, resolve_active};
pub use cache::{PageCache, PageCacheEntry, cache_key};
pub use link::{LinkClick, RELOAD_ATTR, should_intercept};
pub use manager::{BrowserHost, FetchResponse, Fetcher, NavError, NavOutcome, NavigationManager};
