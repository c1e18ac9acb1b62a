//! Island bundle and manifest generation.
//!
//! Every client component is bundled on its own:
//!
//! ```text
//! components/about-counter.tsx
//!     │ analyzer flags it
//!     ▼
//! .atoll/AboutCounter.entry.js      (synthesized, imports the component)
//!     │ Bundler (esbuild by default), UI library external
//!     ▼
//! dist/islands/AboutCounter.3f2a91c0.js
//!     │
//!     ▼
//! dist/islands/manifest.json        { "AboutCounter": "/islands/AboutCounter.3f2a91c0.js" }
//! ```
//!
//! A failing component is logged and left out of the manifest; the others
//! are unaffected. The manifest is written once, atomically, at the end.

mod bundler;
mod entry;
mod manifest;

pub use bundler::{BundleRequest, Bundler, EsbuildBundler};
pub use entry::entry_source;
pub use manifest::Manifest;

use crate::analyzer::{ComponentAnalyzer, ComponentDescriptor};
use crate::config::{SiteConfig, UiFramework};
use crate::log;
use std::{
    fs, io,
    path::{Path, PathBuf},
};
use thiserror::Error;

/// Length of the content hash in bundle file names.
const HASH_LEN: usize = 8;

#[derive(Debug, Error)]
pub enum BundleError {
    #[error("IO error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid manifest {path}: {source}")]
    Manifest {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to bundle `{component}`: {diagnostics}")]
    Bundler {
        component: String,
        diagnostics: String,
    },

    #[error("bundler reported success but wrote no output for `{component}`")]
    MissingOutput { component: String },
}

impl BundleError {
    fn io(path: &Path) -> impl FnOnce(io::Error) -> Self + '_ {
        move |source| Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Settings shared by every bundle of one build.
#[derive(Debug, Clone)]
pub struct GeneratorOptions {
    /// Public URL of the output directory, without trailing slash.
    pub public_url: String,
    /// Directory for synthesized entry modules, removed after `generate`.
    pub scratch_dir: PathBuf,
    /// Manifest file name inside the output directory.
    pub manifest_name: String,
    pub framework: UiFramework,
    /// Module specifiers excluded from every bundle.
    pub externals: Vec<String>,
    pub target: String,
    pub minify: bool,
    pub sourcemap: bool,
}

impl From<&SiteConfig> for GeneratorOptions {
    fn from(config: &SiteConfig) -> Self {
        let bundler = &config.build.bundler;
        Self {
            public_url: config.build.islands_url(),
            scratch_dir: config.get_root().join(".atoll"),
            manifest_name: config.build.manifest.clone(),
            framework: bundler.framework,
            externals: bundler.all_externals(),
            target: bundler.target.clone(),
            minify: config.build.minify,
            sourcemap: bundler.sourcemap,
        }
    }
}

/// Turns client components into standalone bundles plus a manifest.
pub struct HydrationGenerator<'a> {
    analyzer: &'a ComponentAnalyzer,
    bundler: &'a dyn Bundler,
    options: GeneratorOptions,
}

impl<'a> HydrationGenerator<'a> {
    pub fn new(
        analyzer: &'a ComponentAnalyzer,
        bundler: &'a dyn Bundler,
        options: GeneratorOptions,
    ) -> Self {
        Self {
            analyzer,
            bundler,
            options,
        }
    }

    pub fn options(&self) -> &GeneratorOptions {
        &self.options
    }

    /// Bundle every client component below `source_root` into `output_dir`
    /// and write the manifest there.
    ///
    /// Only I/O failures around the manifest abort; per-component failures
    /// are logged and excluded.
    pub fn generate(&self, source_root: &Path, output_dir: &Path) -> Result<Manifest, BundleError> {
        fs::create_dir_all(output_dir).map_err(BundleError::io(output_dir))?;

        let descriptors = self.analyzer.scan(source_root);
        let mut manifest = Manifest::default();

        for descriptor in &descriptors {
            match self.build_one(descriptor, output_dir) {
                Ok(public_path) => {
                    manifest.upsert(&descriptor.component_name, public_path);
                }
                Err(err) => log!("error"; "{err}"),
            }
        }

        manifest.write_atomic(&self.manifest_path(output_dir))?;
        self.clean_scratch();

        log!("bundle"; "{} of {} islands bundled", manifest.len(), descriptors.len());
        Ok(manifest)
    }

    /// Bundle a single component and return its public path.
    ///
    /// On failure the entry module and any partial output are removed.
    pub fn build_one(
        &self,
        descriptor: &ComponentDescriptor,
        output_dir: &Path,
    ) -> Result<String, BundleError> {
        let name = &descriptor.component_name;
        let scratch = &self.options.scratch_dir;
        fs::create_dir_all(scratch).map_err(BundleError::io(scratch))?;
        fs::create_dir_all(output_dir).map_err(BundleError::io(output_dir))?;

        let entry = scratch.join(format!("{name}.entry.js"));
        let source = entry_source(self.options.framework, name, &descriptor.source_path);
        fs::write(&entry, source).map_err(BundleError::io(&entry))?;

        let partial = output_dir.join(format!(".{name}.partial.js"));
        let request = BundleRequest {
            entry: &entry,
            outfile: &partial,
            externals: &self.options.externals,
            target: &self.options.target,
            minify: self.options.minify,
            sourcemap: self.options.sourcemap,
        };

        let result = self.bundler.bundle(&request);
        let _ = fs::remove_file(&entry);
        if let Err(err) = result {
            let _ = fs::remove_file(&partial);
            return Err(BundleError::Bundler {
                component: name.clone(),
                diagnostics: format!("{err:#}"),
            });
        }

        let bytes = match fs::read(&partial) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Err(BundleError::MissingOutput {
                    component: name.clone(),
                });
            }
            Err(err) => return Err(BundleError::io(&partial)(err)),
        };

        let file_name = bundle_file_name(name, &bytes);
        let final_path = output_dir.join(&file_name);
        fs::rename(&partial, &final_path).map_err(BundleError::io(&final_path))?;
        remove_bundles(output_dir, name, Some(file_name.as_str()));

        log!("bundle"; "{} -> {file_name}", descriptor.relative_path.display());
        Ok(format!(
            "{}/{file_name}",
            self.options.public_url.trim_end_matches('/')
        ))
    }

    pub fn manifest_path(&self, output_dir: &Path) -> PathBuf {
        output_dir.join(&self.options.manifest_name)
    }

    /// Remove the scratch directory of synthesized entries.
    pub fn clean_scratch(&self) {
        if let Err(err) = fs::remove_dir_all(&self.options.scratch_dir)
            && err.kind() != io::ErrorKind::NotFound
        {
            log!("warn"; "failed to remove {}: {err}", self.options.scratch_dir.display());
        }
    }
}

/// `<Name>.<hash8>.js` from the bundle content.
pub fn bundle_file_name(component_name: &str, content: &[u8]) -> String {
    let hash = blake3::hash(content).to_hex();
    format!("{component_name}.{}.js", &hash.as_str()[..HASH_LEN])
}

/// Delete the hashed bundles of `component_name`, except `keep`.
pub fn remove_bundles(output_dir: &Path, component_name: &str, keep: Option<&str>) {
    let Ok(entries) = fs::read_dir(output_dir) else {
        return;
    };

    for entry in entries.flatten() {
        let file_name = entry.file_name();
        let file_name = file_name.to_string_lossy();
        if keep == Some(file_name.as_ref()) || !is_bundle_of(&file_name, component_name) {
            continue;
        }
        if let Err(err) = fs::remove_file(entry.path()) {
            log!("warn"; "failed to remove stale bundle {file_name}: {err}");
        }
    }
}

fn is_bundle_of(file_name: &str, component_name: &str) -> bool {
    file_name
        .strip_prefix(component_name)
        .and_then(|rest| rest.strip_prefix('.'))
        .and_then(|rest| rest.strip_suffix(".js"))
        .is_some_and(|hash| hash.len() == HASH_LEN && hash.bytes().all(|b| b.is_ascii_hexdigit()))
}
