//! File system watcher for the dev server.
//!
//! Monitors component sources, pages and the config file, and rebuilds only
//! what changed.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                      Event Loop                              │
//! │                                                              │
//! │  ┌──────────┐    ┌──────────┐    ┌────────────────────────┐  │
//! │  │ notify   │───▶│ Debouncer│───▶│    handle_changes()    │  │
//! │  │ events   │    │ (300ms)  │    │                        │  │
//! │  └──────────┘    └──────────┘    │  config    → reload +  │  │
//! │                                  │              full build│  │
//! │                                  │  component → one bundle│  │
//! │                                  │              + manifest│  │
//! │                                  │  page      → one page  │  │
//! │                                  └────────────────────────┘  │
//! └──────────────────────────────────────────────────────────────┘
//! ```

use crate::{
    analyzer::{AnalyzerOptions, ComponentAnalyzer},
    build::{build_site, bundler_for, process_page, process_pages},
    bundle::{Bundler, GeneratorOptions, HydrationGenerator, Manifest, remove_bundles},
    config::{SiteConfig, cfg, reload_config},
    log,
};
use anyhow::{Context, Result};
use notify::{Event, EventKind, RecursiveMode, Watcher};
use rustc_hash::FxHashSet;
use std::{
    fs,
    path::{Path, PathBuf},
    time::{Duration, Instant},
};

// =============================================================================
// Constants
// =============================================================================

const DEBOUNCE_MS: u64 = 300;
const REBUILD_COOLDOWN_MS: u64 = 800;

// =============================================================================
// Path Utilities
// =============================================================================

/// What a changed path belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FileCategory {
    Config,
    Component,
    Page,
    Unknown,
}

fn categorize_path(path: &Path, config: &SiteConfig) -> FileCategory {
    if path == config.config_path {
        FileCategory::Config
    } else if path.starts_with(&config.build.components) {
        FileCategory::Component
    } else if path.starts_with(&config.build.pages) {
        FileCategory::Page
    } else {
        FileCategory::Unknown
    }
}

/// Check if path is a temp/backup file (editor artifacts).
fn is_temp_file(path: &Path) -> bool {
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");

    matches!(ext, "bck" | "bak" | "backup" | "swp" | "swo" | "tmp")
        || name.ends_with('~')
        || name.starts_with('.')
}

/// Format path as relative to root for log display.
fn rel_path(path: &Path, root: &Path) -> String {
    path.strip_prefix(root).unwrap_or(path).display().to_string()
}

/// Log a build failure with error details.
fn log_build_error(kind: &str, trigger: &str, err: &anyhow::Error) {
    match (kind.is_empty(), trigger.is_empty()) {
        (true, true) => log!("watch"; "build failed"),
        (true, false) => log!("watch"; "build failed ({trigger})"),
        (false, true) => log!("watch"; "{kind} build failed"),
        (false, false) => log!("watch"; "{kind} build failed ({trigger})"),
    }
    log!("watch"; "{err:#}");
}

// =============================================================================
// Debounce State
// =============================================================================

/// Batches rapid file events with debouncing and rebuild cooldown.
struct Debouncer {
    pending: FxHashSet<PathBuf>,
    last_event: Option<Instant>,
    last_rebuild: Option<Instant>,
}

impl Debouncer {
    fn new() -> Self {
        Self {
            pending: FxHashSet::default(),
            last_event: None,
            last_rebuild: None,
        }
    }

    fn in_cooldown(&self) -> bool {
        self.last_rebuild
            .is_some_and(|t| t.elapsed() < Duration::from_millis(REBUILD_COOLDOWN_MS))
    }

    fn add(&mut self, event: Event) {
        for path in event.paths {
            if !is_temp_file(&path) {
                self.pending.insert(path);
            }
        }
        self.last_event = Some(Instant::now());
    }

    fn ready(&self) -> bool {
        !self.pending.is_empty()
            && self
                .last_event
                .is_some_and(|t| t.elapsed() >= Duration::from_millis(DEBOUNCE_MS))
    }

    fn take(&mut self) -> Vec<PathBuf> {
        self.last_event = None;
        self.pending.drain().collect()
    }

    fn mark_rebuild(&mut self) {
        self.last_rebuild = Some(Instant::now());
    }

    fn timeout(&self) -> Duration {
        if self.pending.is_empty() {
            Duration::from_secs(60)
        } else {
            Duration::from_millis(DEBOUNCE_MS)
        }
    }
}

// =============================================================================
// Rebuild Strategies
// =============================================================================

/// Attempt a full rebuild, logging errors on failure.
/// Returns true if successful (for cooldown tracking).
fn try_full_rebuild(config: &SiteConfig, reason: &str) -> bool {
    log!("watch"; "{reason}");

    match build_site(config) {
        Ok(_) => true,
        Err(e) => {
            log_build_error("full", "", &e);
            false
        }
    }
}

/// Rebuild the bundles of changed component files and update the manifest.
///
/// A file that stopped being a client component (or was deleted) loses its
/// manifest entry and bundles. Pages are re-injected when the manifest
/// changed. Returns the number of manifest entries that changed.
fn rebuild_components(
    paths: &[PathBuf],
    config: &SiteConfig,
    analyzer: &ComponentAnalyzer,
    bundler: &dyn Bundler,
) -> Result<usize> {
    let islands_dir = config.build.islands_dir();
    let manifest_path = config.build.manifest_path();
    let mut manifest = Manifest::load_or_default(&manifest_path)?;
    let generator = HydrationGenerator::new(analyzer, bundler, GeneratorOptions::from(config));
    let root = config.get_root();
    let mut changed = 0;

    for path in paths {
        if !analyzer.has_scanned_extension(path) {
            continue;
        }
        analyzer.invalidate(path);
        let name = analyzer.component_name_for(path);

        match analyzer.describe(&config.build.components, path) {
            Some(descriptor) => match generator.build_one(&descriptor, &islands_dir) {
                Ok(public_path) => {
                    let previous = manifest.upsert(name, public_path.clone());
                    if previous.as_deref() != Some(public_path.as_str()) {
                        changed += 1;
                    }
                }
                Err(err) => {
                    log_build_error("island", &rel_path(path, root), &anyhow::Error::from(err));
                }
            },
            None => {
                if manifest.remove(&name).is_some() {
                    remove_bundles(&islands_dir, &name, None);
                    log!("watch"; "{name} is no longer an island");
                    changed += 1;
                }
            }
        }
    }
    generator.clean_scratch();

    if changed > 0 {
        manifest.write_atomic(&manifest_path)?;
        process_pages(config, &manifest)?;
    }
    Ok(changed)
}

/// Re-process changed pages; deleted pages are removed from the output.
fn rebuild_pages(paths: &[PathBuf], config: &SiteConfig) -> Result<usize> {
    let manifest = Manifest::load_or_default(&config.build.manifest_path())?;
    let mut count = 0;

    for path in paths {
        if path.is_file() {
            process_page(path, config, &manifest)?;
            count += 1;
        } else if let Ok(relative) = path.strip_prefix(&config.build.pages) {
            let target = config.build.output.join(relative);
            if target.is_file() {
                fs::remove_file(&target)
                    .with_context(|| format!("Failed to remove {}", target.display()))?;
            }
        }
    }
    Ok(count)
}

/// Long-lived watcher state.
struct WatchState {
    analyzer: ComponentAnalyzer,
}

impl WatchState {
    fn new(config: &SiteConfig) -> Self {
        Self {
            analyzer: ComponentAnalyzer::new(AnalyzerOptions::from(config)),
        }
    }
}

/// Process file changes. Returns true if a full rebuild succeeded (for cooldown).
fn handle_changes(paths: &[PathBuf], state: &mut WatchState) -> bool {
    if paths.is_empty() {
        return false;
    }

    let config = cfg();
    let root = config.get_root();

    let mut config_changed = false;
    let mut components = Vec::new();
    let mut pages = Vec::new();
    for path in paths {
        match categorize_path(path, &config) {
            FileCategory::Config => config_changed = true,
            FileCategory::Component => components.push(path.clone()),
            FileCategory::Page => pages.push(path.clone()),
            FileCategory::Unknown => {}
        }
    }

    if config_changed {
        match reload_config() {
            Ok(true) => {
                let config = cfg();
                *state = WatchState::new(&config);
                return try_full_rebuild(&config, "config changed, rebuilding...");
            }
            Ok(false) => {}
            Err(e) => log_build_error("config", "", &e),
        }
    }

    if !components.is_empty() {
        let bundler = bundler_for(&config);
        match rebuild_components(&components, &config, &state.analyzer, &bundler) {
            Ok(0) => {}
            Ok(count) => log!("watch"; "{count} islands updated"),
            Err(e) => {
                let trigger: Vec<_> = components.iter().map(|p| rel_path(p, root)).collect();
                log_build_error("island", &trigger.join(", "), &e);
            }
        }
    }

    if !pages.is_empty() {
        match rebuild_pages(&pages, &config) {
            Ok(count) if count > 1 => log!("watch"; "rebuilt {count} pages"),
            Ok(_) => {}
            Err(e) => {
                let trigger: Vec<_> = pages.iter().map(|p| rel_path(p, root)).collect();
                log_build_error("page", &trigger.join(", "), &e);
            }
        }
    }

    false
}

// =============================================================================
// Watcher Setup
// =============================================================================

fn setup_watchers(watcher: &mut impl Watcher, config: &SiteConfig) -> Result<()> {
    let root = config.get_root();
    let targets = [
        ("components", &config.build.components, RecursiveMode::Recursive),
        ("pages", &config.build.pages, RecursiveMode::Recursive),
        ("config", &config.config_path, RecursiveMode::NonRecursive),
    ];

    let mut watched = Vec::new();
    for (name, path, mode) in targets {
        if !path.exists() {
            continue;
        }
        watcher
            .watch(path, mode)
            .with_context(|| format!("Failed to watch {name}: {}", path.display()))?;
        watched.push(rel_path(path, root));
    }

    if !watched.is_empty() {
        log!("watch"; "watching {}", watched.join(", "));
    }
    Ok(())
}

const fn is_relevant(event: &Event) -> bool {
    matches!(
        event.kind,
        EventKind::Modify(_) | EventKind::Create(_) | EventKind::Remove(_)
    )
}

// =============================================================================
// Public API
// =============================================================================

/// Start blocking file watcher with debouncing and incremental rebuilds.
pub fn watch_for_changes_blocking() -> Result<()> {
    let config = cfg();
    if !config.serve.watch {
        return Ok(());
    }

    let (tx, rx) = std::sync::mpsc::channel();
    let mut watcher = notify::recommended_watcher(tx).context("Failed to create file watcher")?;
    setup_watchers(&mut watcher, &config)?;

    let mut state = WatchState::new(&config);
    let mut debouncer = Debouncer::new();

    loop {
        match rx.recv_timeout(debouncer.timeout()) {
            Ok(Ok(event)) if is_relevant(&event) && !debouncer.in_cooldown() => {
                debouncer.add(event);
            }
            Ok(Err(e)) => log!("watch"; "error: {e}"),
            Err(std::sync::mpsc::RecvTimeoutError::Timeout) if debouncer.ready() => {
                if handle_changes(&debouncer.take(), &mut state) {
                    debouncer.mark_rebuild();
                }
            }
            Err(std::sync::mpsc::RecvTimeoutError::Disconnected) => break,
            _ => {}
        }
    }

    Ok(())
}
