//! The bundling primitive: compile one entry module for the browser.

use crate::utils::exec::{self, FilterRule};
use anyhow::Result;
use std::{ffi::OsString, path::Path};

/// One isolated bundle job.
#[derive(Debug, Clone)]
pub struct BundleRequest<'a> {
    /// Synthesized entry module.
    pub entry: &'a Path,
    /// Where the bundle must be written.
    pub outfile: &'a Path,
    /// Module specifiers left out of the bundle.
    pub externals: &'a [String],
    /// JavaScript language target, e.g. `es2020`.
    pub target: &'a str,
    pub minify: bool,
    pub sourcemap: bool,
}

/// Compiles a single entry module into an ESM browser bundle.
///
/// Errors carry the bundler diagnostics. Implementations must not leave a
/// usable `outfile` behind on failure; the caller removes it regardless.
pub trait Bundler: Send + Sync {
    fn bundle(&self, request: &BundleRequest<'_>) -> Result<()>;
}

/// esbuild's success summary on stderr.
const ESBUILD_FILTER: FilterRule = FilterRule::new(&["⚡ Done"]);

/// Runs an esbuild-compatible command line.
#[derive(Debug, Clone)]
pub struct EsbuildBundler {
    command: Vec<String>,
    working_dir: Option<std::path::PathBuf>,
}

impl EsbuildBundler {
    pub fn new(command: Vec<String>) -> Self {
        Self {
            command,
            working_dir: None,
        }
    }

    /// Run the bundler from `dir` (usually the project root, so a local
    /// `node_modules` is found).
    pub fn with_working_dir(mut self, dir: impl Into<std::path::PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    fn args(request: &BundleRequest<'_>) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            request.entry.into(),
            "--bundle".into(),
            "--format=esm".into(),
            "--platform=browser".into(),
            "--tree-shaking=true".into(),
            "--log-level=warning".into(),
            format!("--target={}", request.target).into(),
        ];

        let mut outfile = OsString::from("--outfile=");
        outfile.push(request.outfile);
        args.push(outfile);

        if request.minify {
            args.push("--minify".into());
        }
        if request.sourcemap {
            args.push("--sourcemap=inline".into());
        }
        args.extend(
            request
                .externals
                .iter()
                .map(|name| OsString::from(format!("--external:{name}"))),
        );
        args
    }
}

impl Bundler for EsbuildBundler {
    fn bundle(&self, request: &BundleRequest<'_>) -> Result<()> {
        exec::exec(
            self.working_dir.as_deref(),
            &self.command.iter().map(OsString::from).collect::<Vec<_>>(),
            &Self::args(request),
            &ESBUILD_FILTER,
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request<'a>(externals: &'a [String]) -> BundleRequest<'a> {
        BundleRequest {
            entry: Path::new("/tmp/.atoll/Counter.entry.js"),
            outfile: Path::new("/site/dist/islands/Counter.js"),
            externals,
            target: "es2020",
            minify: true,
            sourcemap: false,
        }
    }

    #[test]
    fn test_esbuild_args() {
        let externals = vec!["react".to_string(), "react-dom/client".to_string()];
        let args: Vec<String> = EsbuildBundler::args(&request(&externals))
            .into_iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();

        assert_eq!(args[0], "/tmp/.atoll/Counter.entry.js");
        assert!(args.contains(&"--bundle".to_string()));
        assert!(args.contains(&"--format=esm".to_string()));
        assert!(args.contains(&"--platform=browser".to_string()));
        assert!(args.contains(&"--outfile=/site/dist/islands/Counter.js".to_string()));
        assert!(args.contains(&"--minify".to_string()));
        assert!(args.contains(&"--external:react-dom/client".to_string()));
        assert!(!args.iter().any(|a| a.starts_with("--sourcemap")));
    }

    #[test]
    fn test_missing_bundler_binary_is_an_error() {
        let bundler = EsbuildBundler::new(vec!["atoll-no-such-bundler-binary".into()]);
        assert!(bundler.bundle(&request(&[])).is_err());
    }
}
