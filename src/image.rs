//! Image manifests and final assembly.
//!
//! A manifest is the ordered list of layer digests plus execution metadata.
//! Its identity hashes both, so two assemblies over identical inputs produce
//! the same manifest identity.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::artifact::normalize_dest;
use crate::error::{AssemblyError, AssemblyResult};
use crate::layer::{flatten, Layer};

/// How the image should be executed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecMetadata {
    /// Entrypoint argv; the first element is the in-image executable path.
    pub entrypoint: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_dir: Option<String>,
    /// Declared non-root user, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,
}

impl ExecMetadata {
    pub fn new(entrypoint: Vec<String>) -> Self {
        Self {
            entrypoint,
            working_dir: None,
            user: None,
            env: BTreeMap::new(),
        }
    }

    pub fn with_working_dir(mut self, dir: impl Into<String>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }
}

/// Ordered layer identifiers plus execution metadata. Immutable once
/// assembled.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageManifest {
    /// Manifest identity: hash over the ordered layer digests and the
    /// canonical metadata encoding.
    pub id: String,
    /// Layer digests, base first.
    pub layers: Vec<String>,
    pub config: ExecMetadata,
}

impl ImageManifest {
    pub fn to_json(&self) -> AssemblyResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(raw: &str) -> AssemblyResult<Self> {
        Ok(serde_json::from_str(raw)?)
    }
}

/// Compose layers and execution metadata into a manifest.
///
/// Verifies the entrypoint resolves to an executable file in the flattened
/// view, where later layers shadow earlier ones and whiteouts hide earlier
/// paths.
pub fn assemble_image(layers: &[Layer], metadata: &ExecMetadata) -> AssemblyResult<ImageManifest> {
    let view = flatten(layers);
    if view.is_empty() {
        return Err(AssemblyError::EmptyImage);
    }

    let entry = metadata.entrypoint.first().ok_or_else(|| {
        AssemblyError::InvalidEntrypoint {
            path: PathBuf::new(),
            reason: "entrypoint is empty".to_string(),
        }
    })?;
    let entry_dest = normalize_dest(Path::new(entry));

    match view.get(&entry_dest) {
        None => {
            return Err(AssemblyError::InvalidEntrypoint {
                path: entry_dest,
                reason: "not present in any layer".to_string(),
            });
        }
        Some(artifact) if !artifact.is_executable() => {
            return Err(AssemblyError::InvalidEntrypoint {
                path: entry_dest,
                reason: "not marked executable".to_string(),
            });
        }
        Some(_) => {}
    }

    let layer_digests: Vec<String> = layers.iter().map(|l| l.digest().to_string()).collect();

    let mut hasher = Sha256::new();
    for digest in &layer_digests {
        hasher.update(digest.as_bytes());
        hasher.update([0]);
    }
    hasher.update(serde_json::to_vec(metadata)?);
    let id = format!("sha256:{}", hex::encode(hasher.finalize()));

    tracing::info!(id = %id, layers = layer_digests.len(), "assembled manifest");
    Ok(ImageManifest {
        id,
        layers: layer_digests,
        config: metadata.clone(),
    })
}
