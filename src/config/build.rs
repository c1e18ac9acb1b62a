//! `[build]` section configuration.
//!
//! Contains source/output paths and the bundler setup for island bundles.

use super::defaults;
use educe::Educe;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

// ============================================================================
// Enums
// ============================================================================

/// UI library the island bundles hydrate with.
///
/// The library itself is never bundled: it is marked external and expected
/// to be loaded once by the page, shared across all island bundles.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UiFramework {
    /// `react` + `react-dom/client` (default).
    #[default]
    React,
    /// `preact`.
    Preact,
}

impl UiFramework {
    /// Module specifiers excluded from every island bundle.
    pub const fn externals(self) -> &'static [&'static str] {
        match self {
            Self::React => &["react", "react-dom", "react-dom/client", "react/jsx-runtime"],
            Self::Preact => &["preact", "preact/hooks", "preact/jsx-runtime"],
        }
    }
}

// ============================================================================
// Main BuildConfig
// ============================================================================

/// `[build]` section in atoll.toml.
///
/// # Example
/// ```toml
/// [build]
/// components = "src/components"
/// output = "dist"
///
/// [build.bundler]
/// command = ["npx", "esbuild"]
/// framework = "preact"
/// ```
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(default, deny_unknown_fields)]
pub struct BuildConfig {
    /// Project root directory (usually set via CLI `--root`).
    #[serde(default = "defaults::build::root")]
    #[educe(Default = defaults::build::root())]
    pub root: Option<PathBuf>,

    /// Component source tree scanned for client components.
    #[serde(default = "defaults::build::components")]
    #[educe(Default = defaults::build::components())]
    pub components: PathBuf,

    /// Server-rendered pages that get island scripts injected.
    #[serde(default = "defaults::build::pages")]
    #[educe(Default = defaults::build::pages())]
    pub pages: PathBuf,

    /// Build output directory.
    #[serde(default = "defaults::build::output")]
    #[educe(Default = defaults::build::output())]
    pub output: PathBuf,

    /// Island bundle directory, relative to `output`.
    #[serde(default = "defaults::build::islands")]
    #[educe(Default = defaults::build::islands())]
    pub islands: PathBuf,

    /// Public URL prefix the output directory is served under.
    #[serde(default = "defaults::build::public_prefix")]
    #[educe(Default = defaults::build::public_prefix())]
    pub public_prefix: String,

    /// Manifest file name, written inside the islands directory.
    #[serde(default = "defaults::build::manifest")]
    #[educe(Default = defaults::build::manifest())]
    pub manifest: String,

    /// Remove the output directory before building.
    #[serde(default = "defaults::r#false")]
    #[educe(Default = false)]
    pub clean: bool,

    /// Minify island bundles.
    #[serde(default = "defaults::r#true")]
    #[educe(Default = true)]
    pub minify: bool,

    /// Add `<link rel="modulepreload">` for each injected island bundle.
    #[serde(default = "defaults::r#false")]
    #[educe(Default = false)]
    pub modulepreload: bool,

    /// External bundler settings.
    #[serde(default)]
    pub bundler: BundlerConfig,
}

impl BuildConfig {
    /// Absolute directory island bundles are written to.
    pub fn islands_dir(&self) -> PathBuf {
        self.output.join(&self.islands)
    }

    /// Absolute manifest path.
    pub fn manifest_path(&self) -> PathBuf {
        self.islands_dir().join(&self.manifest)
    }

    /// Public URL of the islands directory, without trailing slash.
    pub fn islands_url(&self) -> String {
        let prefix = self.public_prefix.trim_end_matches('/');
        let islands = self.islands.to_string_lossy().replace('\\', "/");
        format!("{prefix}/{}", islands.trim_matches('/'))
    }
}

// ============================================================================
// Sub-configurations
// ============================================================================

/// `[build.bundler]` section - how a single island entry is compiled.
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(deny_unknown_fields)]
pub struct BundlerConfig {
    /// Bundler command, invoked once per island entry.
    #[serde(default = "defaults::build::bundler::command")]
    #[educe(Default = defaults::build::bundler::command())]
    pub command: Vec<String>,

    /// UI library used by the generated entry modules.
    #[serde(default = "defaults::build::bundler::framework")]
    #[educe(Default = defaults::build::bundler::framework())]
    pub framework: UiFramework,

    /// Extra module specifiers to leave out of every bundle.
    #[serde(default)]
    pub externals: Vec<String>,

    /// JavaScript language target passed to the bundler.
    #[serde(default = "defaults::build::bundler::target")]
    #[educe(Default = defaults::build::bundler::target())]
    pub target: String,

    /// Emit inline source maps.
    #[serde(default = "defaults::r#false")]
    #[educe(Default = false)]
    pub sourcemap: bool,
}

impl BundlerConfig {
    /// Framework externals followed by user-configured externals.
    pub fn all_externals(&self) -> Vec<String> {
        self.framework
            .externals()
            .iter()
            .map(|s| (*s).to_owned())
            .chain(self.externals.iter().cloned())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::super::SiteConfig;
    use super::*;

    #[test]
    fn test_build_config_defaults() {
        let config: SiteConfig = toml::from_str("").unwrap();

        assert_eq!(config.build.components, PathBuf::from("components"));
        assert_eq!(config.build.output, PathBuf::from("dist"));
        assert_eq!(config.build.manifest, "manifest.json");
        assert!(config.build.minify);
        assert!(!config.build.clean);
        assert!(!config.build.modulepreload);
        assert_eq!(config.build.bundler.command, vec!["esbuild"]);
        assert_eq!(config.build.bundler.framework, UiFramework::React);
    }

    #[test]
    fn test_bundler_framework_preact() {
        let config: SiteConfig = toml::from_str(
            r#"
            [build.bundler]
            framework = "preact"
            externals = ["htm"]
        "#,
        )
        .unwrap();

        let externals = config.build.bundler.all_externals();
        assert_eq!(externals.first().map(String::as_str), Some("preact"));
        assert_eq!(externals.last().map(String::as_str), Some("htm"));
    }

    #[test]
    fn test_islands_url() {
        let mut build = BuildConfig::default();
        assert_eq!(build.islands_url(), "/islands");

        build.public_prefix = "/blog/".into();
        build.islands = "static/islands/".into();
        assert_eq!(build.islands_url(), "/blog/static/islands");
    }

    #[test]
    fn test_manifest_path() {
        let build = BuildConfig {
            output: "/site/dist".into(),
            ..Default::default()
        };
        assert_eq!(
            build.manifest_path(),
            PathBuf::from("/site/dist/islands/manifest.json")
        );
    }

    #[test]
    fn test_unknown_bundler_field_rejection() {
        let result: Result<SiteConfig, _> = toml::from_str(
            r#"
            [build.bundler]
            loader = "swc"
        "#,
        );
        assert!(result.is_err());
    }
}
