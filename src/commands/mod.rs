//! CLI command handlers.

mod config;
mod tag;
mod vocab;

pub use config::run_config_show_command;
pub use tag::run_tag_command;
pub use vocab::run_vocab_command;

use std::path::Path;

use anyhow::Result;
use aparts_core::config::{RawConfig, TaggerConfig, load_config};

/// Loads the config file, applies `overrides` and validates the result.
///
/// Configuration errors are returned unwrapped so `main` can map them to
/// their own exit code.
fn resolve_config(
    explicit: Option<&Path>,
    overrides: impl FnOnce(&RawConfig) -> RawConfig,
) -> Result<TaggerConfig> {
    let loaded = load_config(explicit)?;
    let cli = overrides(&loaded.config);
    Ok(loaded.config.overridden_by(cli).validate()?)
}
