use anyhow::{Context, Result};
use std::path::Path;
use stemtool_core::config::Config;

pub async fn run(config_path: Option<&Path>) -> Result<()> {
    let config = Config::load(config_path)?;

    println!("# stemtool configuration\n");
    let rendered = toml::to_string_pretty(&config).context("Failed to render configuration")?;
    println!("{}", rendered);

    println!("# [paths] entries left out are auto-detected from PATH");

    // Show config file locations
    println!("\n# Config sources (later entries win):");
    if let Some(path) = Config::default_path() {
        println!("#   1. {}", path.display());
    }
    if let Some(p) = config_path {
        println!("#   2. {} (specified)", p.display());
    }
    println!("#   3. Environment variables (STEMTOOL_*, nested keys joined with __)");

    Ok(())
}
