//! Build orchestration.
//!
//! # Architecture
//!
//! ```text
//! build_site()
//!     │
//!     ├── prepare_output()     ──► clean / create the output directory
//!     │
//!     ├── bundle_islands()     ──► analyzer scan → one bundle per island
//!     │       │                    → islands/manifest.json
//!     │       └── HydrationGenerator::generate()
//!     │
//!     └── process_pages()      ──► pages/ → output/ (parallel)
//!             │
//!             └── .html: inject one module script per island used
//!                 other: copied as is
//! ```

use crate::{
    analyzer::{AnalyzerOptions, ComponentAnalyzer},
    bundle::{EsbuildBundler, GeneratorOptions, HydrationGenerator, Manifest},
    config::SiteConfig,
    island::{InjectOptions, inject_island_scripts},
    log,
};
use anyhow::{Context, Result, anyhow};
use rayon::prelude::*;
use std::{
    fs,
    path::{Path, PathBuf},
    sync::atomic::{AtomicBool, Ordering},
};
use walkdir::WalkDir;

/// Result of one build.
#[derive(Debug)]
pub struct BuildSummary {
    pub manifest: Manifest,
    /// Pages written to the output directory.
    pub pages: usize,
}

/// Bundle every island and process every page.
///
/// If `config.build.clean` is true, clears the output directory first.
pub fn build_site(config: &SiteConfig) -> Result<BuildSummary> {
    prepare_output(&config.build.output, config.build.clean)?;

    let analyzer = ComponentAnalyzer::new(AnalyzerOptions::from(config));
    let manifest = bundle_islands(config, &analyzer)?;
    let pages = process_pages(config, &manifest)?;

    if manifest.is_empty() && pages == 0 {
        log!("warn"; "output is empty, check the components and pages directories");
    } else {
        log!("build"; "done: {} islands, {pages} pages", manifest.len());
    }

    Ok(BuildSummary { manifest, pages })
}

/// The bundler configured in `[build.bundler]`, run from the project root.
pub fn bundler_for(config: &SiteConfig) -> EsbuildBundler {
    EsbuildBundler::new(config.build.bundler.command.clone()).with_working_dir(config.get_root())
}

/// Bundle the islands of `[build.components]` and write the manifest.
pub fn bundle_islands(config: &SiteConfig, analyzer: &ComponentAnalyzer) -> Result<Manifest> {
    let bundler = bundler_for(config);
    let generator = HydrationGenerator::new(analyzer, &bundler, GeneratorOptions::from(config));

    log!("bundle"; "scanning {}", config.build.components.display());
    generator
        .generate(&config.build.components, &config.build.islands_dir())
        .context("Failed to generate island bundles")
}

/// Create the output directory, removing it first when `clean` is set.
fn prepare_output(output: &Path, clean: bool) -> Result<()> {
    if clean && output.exists() {
        fs::remove_dir_all(output)
            .with_context(|| format!("Failed to clear output directory: {}", output.display()))?;
    }
    fs::create_dir_all(output)
        .with_context(|| format!("Failed to create output directory: {}", output.display()))
}

/// Copy `[build.pages]` into the output directory, injecting island scripts
/// into every HTML page. Returns the number of HTML pages written.
pub fn process_pages(config: &SiteConfig, manifest: &Manifest) -> Result<usize> {
    let pages_dir = &config.build.pages;
    if !pages_dir.is_dir() {
        log!("warn"; "pages directory {} not found, skipping", pages_dir.display());
        return Ok(0);
    }

    let files = collect_files(pages_dir);
    let has_error = AtomicBool::new(false);

    let written: Vec<bool> = files
        .par_iter()
        .map(|path| {
            if has_error.load(Ordering::Relaxed) {
                return Err(anyhow!("Aborted"));
            }
            process_page(path, config, manifest).inspect_err(|e| {
                if !has_error.swap(true, Ordering::Relaxed) {
                    log!("error"; "{}: {:#}", path.display(), e);
                }
            })
        })
        .collect::<Result<_>>()
        .map_err(|_| anyhow!("Build failed"))?;

    Ok(written.into_iter().filter(|is_page| *is_page).count())
}

/// Write one file of the pages tree; `true` if it was an HTML page.
pub fn process_page(path: &Path, config: &SiteConfig, manifest: &Manifest) -> Result<bool> {
    let relative = path
        .strip_prefix(&config.build.pages)
        .with_context(|| format!("{} is outside the pages directory", path.display()))?;
    let target = config.build.output.join(relative);
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent)?;
    }

    if !is_html(path) {
        fs::copy(path, &target)
            .with_context(|| format!("Failed to copy {}", path.display()))?;
        return Ok(false);
    }

    let html = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let options = InjectOptions {
        modulepreload: config.build.modulepreload,
    };
    let html = inject_island_scripts(&html, manifest, options)
        .with_context(|| format!("Failed to parse {}", path.display()))?;
    fs::write(&target, html).with_context(|| format!("Failed to write {}", target.display()))?;
    Ok(true)
}

pub fn is_html(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("html") || ext.eq_ignore_ascii_case("htm"))
}

/// Every file below `dir`, hidden entries skipped.
fn collect_files(dir: &Path) -> Vec<PathBuf> {
    WalkDir::new(dir)
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !e.file_name().to_string_lossy().starts_with('.'))
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn site(dir: &Path) -> SiteConfig {
        let mut config = SiteConfig::default();
        config.set_root(dir);
        config.build.components = dir.join("components");
        config.build.pages = dir.join("pages");
        config.build.output = dir.join("dist");
        config
    }

    fn manifest() -> Manifest {
        let mut manifest = Manifest::default();
        manifest.upsert("Counter", "/islands/Counter.0123abcd.js");
        manifest
    }

    #[test]
    fn test_process_pages_injects_scripts_and_copies_assets() {
        let dir = TempDir::new().unwrap();
        let config = site(dir.path());
        let pages = &config.build.pages;
        fs::create_dir_all(pages.join("blog")).unwrap();
        fs::write(
            pages.join("index.html"),
            "<html><head><title>Home</title></head><body>\
             <div data-island=\"Counter\" data-island-id=\"a\" data-island-props=\"{}\">0</div>\
             </body></html>",
        )
        .unwrap();
        fs::write(pages.join("blog/post.html"), "<html><body><p>plain</p></body></html>").unwrap();
        fs::write(pages.join("style.css"), "p{}").unwrap();
        fs::write(pages.join(".draft.html"), "<p>hidden</p>").unwrap();

        let count = process_pages(&config, &manifest()).unwrap();

        assert_eq!(count, 2);
        let index = fs::read_to_string(config.build.output.join("index.html")).unwrap();
        assert!(index.contains("src=\"/islands/Counter.0123abcd.js\""));
        let post = fs::read_to_string(config.build.output.join("blog/post.html")).unwrap();
        assert!(!post.contains("<script"));
        assert!(config.build.output.join("style.css").is_file());
        assert!(!config.build.output.join(".draft.html").exists());
    }

    #[test]
    fn test_process_page_honors_modulepreload() {
        let dir = TempDir::new().unwrap();
        let mut config = site(dir.path());
        config.build.modulepreload = true;
        let page = config.build.pages.join("index.html");
        fs::create_dir_all(&config.build.pages).unwrap();
        fs::write(
            &page,
            "<html><head></head><body>\
             <div data-island=\"Counter\" data-island-id=\"a\" data-island-props=\"{}\">0</div>\
             </body></html>",
        )
        .unwrap();

        assert!(process_page(&page, &config, &manifest()).unwrap());

        let out = fs::read_to_string(config.build.output.join("index.html")).unwrap();
        assert!(out.contains("<link rel=\"modulepreload\" href=\"/islands/Counter.0123abcd.js\">"));
    }

    #[test]
    fn test_process_pages_without_pages_dir() {
        let dir = TempDir::new().unwrap();
        let config = site(dir.path());
        assert_eq!(process_pages(&config, &manifest()).unwrap(), 0);
    }

    #[test]
    fn test_prepare_output_clean() {
        let dir = TempDir::new().unwrap();
        let output = dir.path().join("dist");
        fs::create_dir_all(&output).unwrap();
        fs::write(output.join("stale.html"), "").unwrap();

        prepare_output(&output, false).unwrap();
        assert!(output.join("stale.html").exists());

        prepare_output(&output, true).unwrap();
        assert!(output.is_dir());
        assert!(!output.join("stale.html").exists());
    }

    #[test]
    fn test_is_html() {
        assert!(is_html(Path::new("a/index.html")));
        assert!(is_html(Path::new("a/INDEX.HTM")));
        assert!(!is_html(Path::new("a/app.js")));
        assert!(!is_html(Path::new("a/html")));
    }
}
