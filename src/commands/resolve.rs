//! Resolve command - print a binary's runtime closure.

use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};

use distill::cache::AssemblyCache;
use distill::config::EnvConfig;
use distill::resolver::Resolver;

/// Execute the resolve command.
pub fn cmd_resolve(
    env_config: &EnvConfig,
    binary: &Path,
    require: &[String],
    roots: &[PathBuf],
) -> Result<()> {
    if !binary.exists() {
        bail!("binary not found: {}", binary.display());
    }

    let mut config = env_config.resolver_config();
    if !roots.is_empty() {
        config.search_roots = roots.to_vec();
    }

    let cache = AssemblyCache::new();
    let resolver = Resolver::new(&config, &cache);
    let closure = resolver
        .resolve(binary, require)
        .context("resolution failed")?;

    println!("Closure for {}:", binary.display());
    for artifact in closure.artifacts() {
        let marker = if artifact.dest() == closure.binary_dest() {
            " (binary)"
        } else {
            ""
        };
        println!(
            "  {}  {:>8} B  /{}{}",
            artifact.content_digest(),
            artifact.size(),
            artifact.dest().display(),
            marker
        );
    }
    println!("{} artifact(s)", closure.len());

    Ok(())
}
