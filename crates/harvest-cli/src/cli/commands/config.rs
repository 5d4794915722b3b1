//! `harvest config` – print the effective configuration.

use std::path::Path;

use anyhow::{Context, Result};
use harvest_core::config::{config_path, HarvestConfig};

pub fn run_config(cfg: &HarvestConfig, explicit: Option<&Path>) -> Result<()> {
    let source = match explicit {
        Some(p) => p.to_path_buf(),
        None => config_path()?,
    };
    let toml = toml::to_string_pretty(cfg).context("serialize config")?;
    println!("# {}", source.display());
    print!("{}", toml);
    Ok(())
}
