//! Clean command - remove output artifacts.

use anyhow::{Context, Result};
use std::fs;
use std::path::PathBuf;

use distill::config::EnvConfig;

/// Execute the clean command.
pub fn cmd_clean(env_config: &EnvConfig, output: Option<PathBuf>) -> Result<()> {
    let out_dir = output.unwrap_or_else(|| env_config.output_dir.clone());

    if !out_dir.exists() {
        println!("Nothing to clean: {}", out_dir.display());
        return Ok(());
    }

    fs::remove_dir_all(&out_dir)
        .with_context(|| format!("removing {}", out_dir.display()))?;
    println!("Removed {}", out_dir.display());

    Ok(())
}
