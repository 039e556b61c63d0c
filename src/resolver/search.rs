//! Library lookup across the configured search path.
//!
//! The search path is a strict precedence list: the first root containing
//! any candidate for a name settles that name, and later roots are never
//! consulted. Within one root, two candidates with differing content are
//! ambiguous unless an override pins the name to an explicit path.

use std::path::{Path, PathBuf};

use crate::cache::hash_file;
use crate::config::ResolverConfig;
use crate::error::{AssemblyError, AssemblyResult};

/// A library located on the host, with its destination inside the image.
#[derive(Debug, Clone)]
pub struct FoundLibrary {
    pub name: String,
    /// Host path the content comes from.
    pub source: PathBuf,
    /// Image-relative destination, mirroring the library directory it was
    /// found under (e.g. `usr/lib64/libc.so.6`).
    pub dest: PathBuf,
}

/// Resolve one library name against the search path.
pub fn find_library(config: &ResolverConfig, name: &str) -> AssemblyResult<FoundLibrary> {
    if let Some(pinned) = config.overrides.get(name) {
        if !pinned.exists() {
            return Err(AssemblyError::unresolvable(
                name,
                vec![format!("override path {}", pinned.display())],
            ));
        }
        return Ok(FoundLibrary {
            name: name.to_string(),
            source: pinned.clone(),
            dest: dest_for_override(config, pinned, name),
        });
    }

    for root in &config.search_roots {
        let candidates: Vec<(PathBuf, PathBuf)> = config
            .lib_dirs
            .iter()
            .map(|dir| (dir.join(name), root.join(dir).join(name)))
            .filter(|(_, full)| full.exists())
            .collect();

        let Some((first_dest, first_source)) = candidates.first().cloned() else {
            continue;
        };

        // Same-root candidates must agree on content.
        let first_hash = hash_file(&first_source)?;
        for (_, other) in &candidates[1..] {
            if hash_file(other)? != first_hash {
                return Err(AssemblyError::ambiguous(
                    name,
                    candidates
                        .iter()
                        .map(|(_, p)| p.display().to_string())
                        .collect(),
                ));
            }
        }

        tracing::debug!(library = name, source = %first_source.display(), "resolved");
        return Ok(FoundLibrary {
            name: name.to_string(),
            source: first_source,
            dest: first_dest,
        });
    }

    Err(AssemblyError::unresolvable(name, searched_locations(config)))
}

/// Destination for an override: keep the root-relative location when the
/// pinned path lives under a search root, otherwise fall back to the first
/// configured library directory.
fn dest_for_override(config: &ResolverConfig, pinned: &Path, name: &str) -> PathBuf {
    for root in &config.search_roots {
        if let Ok(rel) = pinned.strip_prefix(root) {
            return rel.to_path_buf();
        }
    }
    config
        .lib_dirs
        .first()
        .cloned()
        .unwrap_or_else(|| PathBuf::from("usr/lib"))
        .join(name)
}

/// Render every probed location, for error reporting.
fn searched_locations(config: &ResolverConfig) -> Vec<String> {
    let mut searched = Vec::new();
    for root in &config.search_roots {
        for dir in &config.lib_dirs {
            searched.push(root.join(dir).display().to_string());
        }
    }
    if searched.is_empty() {
        searched.push("<empty search path>".to_string());
    }
    searched
}
