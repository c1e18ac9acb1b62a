//! `[navigation]` section configuration.
//!
//! Shared by the dev server (which answers navigation requests) and the
//! client navigation manager (which sends them).

use super::defaults;
use educe::Educe;
use serde::{Deserialize, Serialize};

/// `[navigation]` section in atoll.toml.
///
/// # Example
/// ```toml
/// [navigation]
/// content_selector = "main"
/// ```
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(deny_unknown_fields)]
pub struct NavigationConfig {
    /// Selector of the region swapped on client-side navigation.
    /// Supports `#id`, `tag`, `.class`, `[attr]` and `[attr=value]`.
    #[serde(default = "defaults::navigation::content_selector")]
    #[educe(Default = defaults::navigation::content_selector())]
    pub content_selector: String,

    /// Request header marking a client-side navigation fetch.
    #[serde(default = "defaults::navigation::header")]
    #[educe(Default = defaults::navigation::header())]
    pub header: String,
}
