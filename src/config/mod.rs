//! Project configuration management for `atoll.toml`.
//!
//! # Sections
//!
//! | Section          | Purpose                                          |
//! |------------------|--------------------------------------------------|
//! | `[build]`        | Component/page/output paths, bundler setup       |
//! | `[island]`       | Client directive and scanned source extensions   |
//! | `[navigation]`   | Swapped content region and navigation header     |
//! | `[serve]`        | Development server (port, interface, watch)      |
//!
//! # Example
//!
//! ```toml
//! [build]
//! components = "src/components"
//! output = "dist"
//!
//! [build.bundler]
//! framework = "preact"
//!
//! [navigation]
//! content_selector = "main"
//!
//! [serve]
//! port = 5277
//! ```

mod build;
pub mod defaults;
mod error;
mod handle;
mod island;
mod navigation;
mod serve;

pub use build::{BuildConfig, BundlerConfig, UiFramework};
pub use error::ConfigError;
pub use handle::{cfg, init_config, reload_config};
pub use island::IslandConfig;
pub use navigation::NavigationConfig;
pub use serve::ServeConfig;

use crate::cli::{Cli, Commands};
use crate::dom::Selector;
use anyhow::{Context, Result, bail};
use educe::Educe;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

// ============================================================================
// Root Configuration
// ============================================================================

/// Root configuration structure representing atoll.toml
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(deny_unknown_fields)]
pub struct SiteConfig {
    /// CLI arguments reference
    #[serde(skip)]
    pub cli: Option<&'static Cli>,

    /// Absolute path to the config file (set after loading)
    #[serde(skip)]
    pub config_path: PathBuf,

    /// Build settings
    #[serde(default)]
    pub build: BuildConfig,

    /// Client component detection
    #[serde(default)]
    pub island: IslandConfig,

    /// Client-side navigation
    #[serde(default)]
    pub navigation: NavigationConfig,

    /// Development server settings
    #[serde(default)]
    pub serve: ServeConfig,
}

impl SiteConfig {
    /// Parse configuration from TOML string
    pub fn from_str(content: &str) -> Result<Self> {
        let config: SiteConfig = toml::from_str(content).map_err(ConfigError::from)?;
        Ok(config)
    }

    /// Load configuration from file path
    pub fn from_path(path: &Path) -> Result<Self> {
        let content =
            fs::read_to_string(path).map_err(|err| ConfigError::Io(path.to_path_buf(), err))?;
        Self::from_str(&content)
    }

    /// Load configuration for the given CLI invocation.
    ///
    /// A missing config file is not an error: every section has defaults.
    pub fn load(cli: &'static Cli) -> Result<Self> {
        let root = cli.root.as_deref().unwrap_or(Path::new("./"));
        let config_path = root.join(&cli.config);

        let mut config = if config_path.exists() {
            Self::from_path(&config_path)
                .with_context(|| format!("Failed to load {}", config_path.display()))?
        } else {
            Self::default()
        };
        config.update_with_cli(cli);
        Ok(config)
    }

    /// Get the root directory path
    pub fn get_root(&self) -> &Path {
        self.build.root.as_deref().unwrap_or(Path::new("./"))
    }

    /// Set the root directory path
    pub fn set_root(&mut self, path: &Path) {
        self.build.root = Some(path.to_path_buf())
    }

    /// Update configuration with CLI arguments
    pub fn update_with_cli(&mut self, cli: &'static Cli) {
        self.cli = Some(cli);

        let root = cli
            .root
            .clone()
            .unwrap_or_else(|| self.get_root().to_owned());
        self.update_path_with_root(cli, &root);

        match &cli.command {
            Commands::Build { build_args } => {
                self.build.clean |= build_args.clean;
                Self::update_option(&mut self.build.minify, build_args.minify.as_ref());
            }
            Commands::Serve {
                build_args,
                interface,
                port,
                watch,
            } => {
                self.build.clean |= build_args.clean;
                Self::update_option(&mut self.build.minify, build_args.minify.as_ref());
                Self::update_option(&mut self.serve.interface, interface.as_ref());
                Self::update_option(&mut self.serve.port, port.as_ref());
                Self::update_option(&mut self.serve.watch, watch.as_ref());
            }
            Commands::Islands => {}
        }
    }

    /// Update config option if CLI value is provided
    fn update_option<T: Clone>(config_option: &mut T, cli_option: Option<&T>) {
        if let Some(option) = cli_option {
            *config_option = option.clone();
        }
    }

    /// Update all paths relative to root directory and normalize to absolute paths
    fn update_path_with_root(&mut self, cli: &Cli, root: &Path) {
        Self::update_option(&mut self.build.components, cli.components.as_ref());
        Self::update_option(&mut self.build.output, cli.output.as_ref());

        let root = Self::normalize_path(root);
        self.set_root(&root);

        self.config_path = Self::normalize_path(&root.join(&cli.config));
        self.build.components = Self::normalize_path(&root.join(&self.build.components));
        self.build.pages = Self::normalize_path(&root.join(&self.build.pages));
        self.build.output = Self::normalize_path(&root.join(&self.build.output));
    }

    /// Normalize a path to absolute, using canonicalize if the path exists
    fn normalize_path(path: &Path) -> PathBuf {
        path.canonicalize().unwrap_or_else(|_| {
            if path.is_absolute() {
                path.to_path_buf()
            } else {
                std::env::current_dir()
                    .map(|cwd| cwd.join(path))
                    .unwrap_or_else(|_| path.to_path_buf())
            }
        })
    }

    /// Validate configuration for the current command
    pub fn validate(&self) -> Result<()> {
        if self.island.directive.trim().is_empty() {
            bail!(ConfigError::Validation(
                "[island.directive] must not be empty".into()
            ));
        }

        if self.island.extensions.is_empty() {
            bail!(ConfigError::Validation(
                "[island.extensions] must have at least one element".into()
            ));
        }

        if !self.build.public_prefix.starts_with('/')
            && !self.build.public_prefix.starts_with("http")
        {
            bail!(ConfigError::Validation(
                "[build.public_prefix] must start with `/` or http(s)://".into()
            ));
        }

        if self.navigation.header.trim().is_empty() {
            bail!(ConfigError::Validation(
                "[navigation.header] must not be empty".into()
            ));
        }

        Selector::parse(&self.navigation.content_selector).map_err(|err| {
            ConfigError::Validation(format!("[navigation.content_selector] {err}"))
        })?;

        let needs_bundler = self
            .cli
            .is_none_or(|cli| !matches!(cli.command, Commands::Islands));
        if needs_bundler {
            Self::check_command_installed("[build.bundler.command]", &self.build.bundler.command)?;
        }

        Ok(())
    }

    /// Check if a command is installed and available
    fn check_command_installed(field: &str, command: &[String]) -> Result<()> {
        let Some(cmd) = command.first() else {
            bail!(ConfigError::Validation(format!(
                "{field} must have at least one element"
            )));
        };

        which::which(cmd)
            .with_context(|| format!("`{cmd}` not found. Please install it first."))?;

        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
