//! Config command handlers: show effective configuration.

use std::path::Path;

use anyhow::{Context, Result};
use aparts_core::config::load_config;

pub fn run_config_show_command(explicit: Option<&Path>) -> Result<()> {
    let loaded = load_config(explicit)?;
    let effective = loaded.config.validate()?;

    let resolved_path = loaded.path.as_ref().map_or_else(
        || "<unresolved>".to_string(),
        |path| path.display().to_string(),
    );
    println!("# config_path = {resolved_path}");
    println!(
        "# config_file = {}",
        if loaded.loaded_from_file {
            "loaded"
        } else {
            "not found (using defaults)"
        }
    );
    let rendered = effective
        .to_toml()
        .context("Failed to render effective configuration")?;
    print!("{rendered}");
    Ok(())
}
