//! Command-line interface definitions.
//!
//! Defines all CLI arguments and subcommands using clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// atoll - island bundles, selective hydration and client navigation
#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None, arg_required_else_help = true)]
pub struct Cli {
    /// Project root directory
    #[arg(short, long)]
    pub root: Option<PathBuf>,

    /// Output directory path (relative to project root)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Component source directory (relative to project root)
    #[arg(short = 'c', long)]
    pub components: Option<PathBuf>,

    /// Config file name (default: atoll.toml)
    #[arg(short = 'C', long, default_value = "atoll.toml")]
    pub config: PathBuf,

    /// Also print debug messages
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// subcommands
    #[command(subcommand)]
    pub command: Commands,
}

/// Shared build arguments for Build and Serve commands
#[derive(clap::Args, Debug, Clone)]
pub struct BuildArgs {
    /// Clean output directory completely before building
    #[arg(long)]
    pub clean: bool,

    /// Minify island bundles
    #[arg(short, long, action = clap::ArgAction::Set, num_args = 0..=1, default_missing_value = "true", require_equals = false)]
    pub minify: Option<bool>,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Bundle every client component, write the manifest and inject scripts into pages
    Build {
        #[command(flatten)]
        build_args: BuildArgs,
    },

    /// Build, then serve the output. Rebuild changed islands automatically
    Serve {
        #[command(flatten)]
        build_args: BuildArgs,

        /// Interface to bind on
        #[arg(short, long)]
        interface: Option<String>,

        /// The port you should provide
        #[arg(short, long)]
        port: Option<u16>,

        /// enable watch
        #[arg(short, long, action = clap::ArgAction::Set, num_args = 0..=1, default_missing_value = "true", require_equals = false)]
        watch: Option<bool>,
    },

    /// List the components detected as client islands
    Islands,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_build() {
        let cli = Cli::try_parse_from(["atoll", "build", "--clean"]).unwrap();
        assert!(!cli.verbose);
        match cli.command {
            Commands::Build { build_args } => {
                assert!(build_args.clean);
                assert_eq!(build_args.minify, None);
            }
            _ => panic!("expected build"),
        }
        assert_eq!(cli.config, PathBuf::from("atoll.toml"));
    }

    #[test]
    fn test_parse_serve_overrides() {
        let cli =
            Cli::try_parse_from(["atoll", "-r", "site", "serve", "-p", "8080", "-w", "false"])
                .unwrap();
        assert_eq!(cli.root, Some(PathBuf::from("site")));
        match cli.command {
            Commands::Serve { port, watch, .. } => {
                assert_eq!(port, Some(8080));
                assert_eq!(watch, Some(false));
            }
            _ => panic!("expected serve"),
        }
    }

    #[test]
    fn test_parse_islands() {
        let cli = Cli::try_parse_from(["atoll", "islands"]).unwrap();
        assert!(matches!(cli.command, Commands::Islands));
    }

    #[test]
    fn test_verbose_after_subcommand() {
        let cli = Cli::try_parse_from(["atoll", "islands", "-v"]).unwrap();
        assert!(cli.verbose);
    }
}
