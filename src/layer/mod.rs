//! Immutable filesystem layers.
//!
//! A [`Layer`] is a deterministically ordered set of artifacts plus a
//! whiteout set hiding paths from earlier layers. Layers form a total
//! order; later layers shadow earlier ones at the same path.

pub mod tarball;

pub use tarball::{materialize, write_tar, WHITEOUT_PREFIX};

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use crate::artifact::{normalize_dest, Artifact, DependencyClosure};
use crate::cache::sha256_hex;
use crate::error::{AssemblyError, AssemblyResult};

/// An ordered, immutable filesystem delta.
#[derive(Debug, Clone)]
pub struct Layer {
    artifacts: Vec<Artifact>,
    whiteouts: BTreeSet<PathBuf>,
    digest: String,
}

impl Layer {
    /// Build a layer from artifacts and whiteout paths. Artifacts are sorted
    /// by destination; duplicate destinations with identical content merge,
    /// differing content is a collision.
    pub fn new(
        artifacts: Vec<Artifact>,
        whiteouts: BTreeSet<PathBuf>,
    ) -> AssemblyResult<Self> {
        let mut by_dest: BTreeMap<PathBuf, Artifact> = BTreeMap::new();
        for artifact in artifacts {
            match by_dest.get(artifact.dest()) {
                Some(existing) if existing.content_digest() == artifact.content_digest() => {}
                Some(existing) => {
                    return Err(AssemblyError::collision(
                        artifact.dest(),
                        existing.content_digest(),
                        artifact.content_digest(),
                    ));
                }
                None => {
                    by_dest.insert(artifact.dest().to_path_buf(), artifact);
                }
            }
        }

        let whiteouts: BTreeSet<PathBuf> =
            whiteouts.iter().map(|p| normalize_dest(p)).collect();

        let mut layer = Self {
            artifacts: by_dest.into_values().collect(),
            whiteouts,
            digest: String::new(),
        };
        layer.digest = format!("sha256:{}", sha256_hex(&tarball::serialize(&layer)));
        Ok(layer)
    }

    /// Content-addressable identity: the digest of the serialized stream.
    pub fn digest(&self) -> &str {
        &self.digest
    }

    /// Artifacts in destination order.
    pub fn artifacts(&self) -> &[Artifact] {
        &self.artifacts
    }

    pub fn whiteouts(&self) -> impl Iterator<Item = &PathBuf> {
        self.whiteouts.iter()
    }

    pub fn get(&self, dest: &Path) -> Option<&Artifact> {
        let dest = normalize_dest(dest);
        self.artifacts.iter().find(|a| a.dest() == dest)
    }

    pub fn contains(&self, dest: &Path) -> bool {
        self.get(dest).is_some()
    }

    pub fn len(&self) -> usize {
        self.artifacts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.artifacts.is_empty() && self.whiteouts.is_empty()
    }

    /// Serialize to tar bytes.
    pub fn to_tar(&self) -> Vec<u8> {
        tarball::serialize(self)
    }
}

/// Build a layer from a resolved closure plus caller-supplied extras.
///
/// The combined set is deduplicated by destination; two inputs targeting one
/// destination with differing content fail with `PathCollision`. When
/// `base_layers` is non-empty, a new artifact at a path already present in
/// any base layer is also a collision unless the artifact is explicitly
/// marked as an override, so binaries copied out of a build stage cannot
/// silently duplicate what the base already carries.
pub fn build_layer(
    closure: &DependencyClosure,
    extras: &[Artifact],
    base_layers: &[Layer],
) -> AssemblyResult<Layer> {
    let mut combined: Vec<Artifact> = closure.artifacts().cloned().collect();
    combined.extend(extras.iter().cloned());

    for artifact in &combined {
        if artifact.overrides_base() {
            continue;
        }
        for base in base_layers {
            if let Some(shadowed) = base.get(artifact.dest()) {
                return Err(AssemblyError::collision(
                    artifact.dest(),
                    format!("{} (base layer {})", shadowed.content_digest(), base.digest()),
                    artifact.content_digest(),
                ));
            }
        }
    }

    Layer::new(combined, BTreeSet::new())
}

/// Flatten a layer stack into its final view: later layers shadow earlier
/// ones at identical paths, and a whiteout hides the path (and anything
/// under it) from every earlier layer.
pub fn flatten(layers: &[Layer]) -> BTreeMap<PathBuf, Artifact> {
    let mut view: BTreeMap<PathBuf, Artifact> = BTreeMap::new();

    for layer in layers {
        for hidden in layer.whiteouts() {
            view.retain(|path, _| path != hidden && !path.starts_with(hidden));
        }
        for artifact in layer.artifacts() {
            view.insert(artifact.dest().to_path_buf(), artifact.clone());
        }
    }

    view
}
