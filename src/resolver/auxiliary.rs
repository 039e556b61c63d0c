//! Declared auxiliary requirements.
//!
//! Named, non-code runtime needs: a binary that validates TLS peers needs a
//! certificate-authority bundle, one that formats local times needs the
//! timezone database. Neither appears in ELF metadata, so callers declare
//! them by name and configuration maps each name to a source path.

use std::path::Path;
use walkdir::WalkDir;

use crate::artifact::Artifact;
use crate::config::ResolverConfig;
use crate::error::{AssemblyError, AssemblyResult};

/// Resolve one named auxiliary requirement into artifacts.
///
/// The source path is probed under each search root in order; the first root
/// that has it wins. A file source yields a single artifact at the configured
/// destination; a directory source yields one artifact per regular file,
/// preserving relative paths under the destination.
pub fn resolve_auxiliary(config: &ResolverConfig, name: &str) -> AssemblyResult<Vec<Artifact>> {
    let Some(aux) = config.auxiliary.get(name) else {
        return Err(AssemblyError::unresolvable(
            name,
            vec!["<no configured source for this requirement>".to_string()],
        ));
    };

    let mut searched = Vec::new();
    for root in &config.search_roots {
        let source = root.join(&aux.source);
        if source.is_file() {
            tracing::debug!(requirement = name, source = %source.display(), "auxiliary file");
            return Ok(vec![Artifact::from_file(&source, &aux.dest)?]);
        }
        if source.is_dir() {
            tracing::debug!(requirement = name, source = %source.display(), "auxiliary tree");
            return collect_tree(&source, &aux.dest);
        }
        searched.push(source.display().to_string());
    }

    if searched.is_empty() {
        searched.push("<empty search path>".to_string());
    }
    Err(AssemblyError::unresolvable(name, searched))
}

/// Walk a directory source and produce one artifact per regular file.
fn collect_tree(source: &Path, dest: &Path) -> AssemblyResult<Vec<Artifact>> {
    let mut artifacts = Vec::new();

    for entry in WalkDir::new(source).sort_by_file_name() {
        let entry = entry.map_err(|e| AssemblyError::Io {
            context: format!("walking {}", source.display()),
            source: e.into(),
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let rel = entry
            .path()
            .strip_prefix(source)
            .expect("walkdir yields paths under its root");
        artifacts.push(Artifact::from_file(entry.path(), dest.join(rel))?);
    }

    Ok(artifacts)
}
