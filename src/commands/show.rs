//! Show command - display a written manifest.

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

use distill::image::ImageManifest;

/// Execute the show command.
pub fn cmd_show(manifest_path: &Path) -> Result<()> {
    let raw = fs::read_to_string(manifest_path)
        .with_context(|| format!("reading {}", manifest_path.display()))?;
    let manifest = ImageManifest::from_json(&raw)
        .with_context(|| format!("parsing {}", manifest_path.display()))?;

    println!("Image {}", manifest.id);
    println!("Layers:");
    for digest in &manifest.layers {
        println!("  {}", digest);
    }
    println!("Entrypoint: {}", manifest.config.entrypoint.join(" "));
    if let Some(dir) = &manifest.config.working_dir {
        println!("Working dir: {}", dir);
    }
    if let Some(user) = &manifest.config.user {
        println!("User: {}", user);
    }
    for (key, value) in &manifest.config.env {
        println!("Env: {}={}", key, value);
    }

    Ok(())
}
