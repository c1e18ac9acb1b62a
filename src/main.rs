//! atoll - island bundles, selective hydration and client navigation.

use anyhow::Result;
use atoll::{
    analyzer::{AnalyzerOptions, ComponentAnalyzer},
    build::build_site,
    cli::{Cli, Commands},
    config::{SiteConfig, cfg, init_config},
    log,
    logger::set_verbose,
    serve::serve_site,
};
use clap::Parser;

fn main() -> Result<()> {
    let cli: &'static Cli = Box::leak(Box::new(Cli::parse()));
    set_verbose(cli.verbose);
    init_config(load_config(cli)?);

    match &cli.command {
        Commands::Build { .. } => build_site(&cfg()).map(|_| ()),
        Commands::Serve { .. } => {
            build_site(&cfg())?;
            serve_site()
        }
        Commands::Islands => list_islands(&cfg()),
    }
}

/// Load and validate configuration from CLI arguments
fn load_config(cli: &'static Cli) -> Result<SiteConfig> {
    let config = SiteConfig::load(cli)?;
    if !config.config_path.exists() {
        log!("warn"; "{} not found, using defaults", config.config_path.display());
    }
    config.validate()?;
    Ok(config)
}

/// Print the components detected as client islands.
fn list_islands(config: &SiteConfig) -> Result<()> {
    let analyzer = ComponentAnalyzer::new(AnalyzerOptions::from(config));
    let components = analyzer.scan(&config.build.components);

    if components.is_empty() {
        log!("islands"; "no client components in {}", config.build.components.display());
        return Ok(());
    }
    for descriptor in &components {
        log!("islands"; "{:<24} {}", descriptor.component_name, descriptor.relative_path.display());
    }
    log!("islands"; "{} found", components.len());
    Ok(())
}
