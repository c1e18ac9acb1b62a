//! `[island]` section configuration.
//!
//! Controls how client components are recognized in the component tree.

use super::defaults;
use educe::Educe;
use serde::{Deserialize, Serialize};

/// `[island]` section in atoll.toml.
///
/// # Example
/// ```toml
/// [island]
/// directive = "use client"
/// extensions = ["tsx", "jsx"]
/// ```
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(deny_unknown_fields)]
pub struct IslandConfig {
    /// Directive literal that must open a client component (without quotes).
    #[serde(default = "defaults::island::directive")]
    #[educe(Default = defaults::island::directive())]
    pub directive: String,

    /// Source file extensions considered during the scan.
    #[serde(default = "defaults::island::extensions")]
    #[educe(Default = defaults::island::extensions())]
    pub extensions: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::super::SiteConfig;

    #[test]
    fn test_island_config_defaults() {
        let config: SiteConfig = toml::from_str("").unwrap();
        assert_eq!(config.island.directive, "use client");
        assert!(config.island.extensions.iter().any(|e| e == "tsx"));
    }

    #[test]
    fn test_island_config_override() {
        let config: SiteConfig = toml::from_str(
            r#"
            [island]
            directive = "use island"
            extensions = ["jsx"]
        "#,
        )
        .unwrap();
        assert_eq!(config.island.directive, "use island");
        assert_eq!(config.island.extensions, vec!["jsx"]);
    }
}
