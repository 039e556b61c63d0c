//! Assembly session cache - hash-keyed memoization.
//!
//! Uses SHA256 content hashes as keys, so a key collision implies identical
//! logical input and is safe to treat as a hit. Entries live for one assembly
//! session and are only removed by an explicit [`AssemblyCache::clear`].

use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::{Mutex, PoisonError};

use crate::artifact::DependencyClosure;
use crate::error::{AssemblyError, AssemblyResult};
use crate::layer::Layer;

/// Compute the hex SHA256 of a byte slice.
pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Compute the hex SHA256 of a file's content.
pub fn hash_file(path: &Path) -> AssemblyResult<String> {
    let content = fs::read(path)
        .map_err(|e| AssemblyError::io(format!("hashing {}", path.display()), e))?;
    Ok(sha256_hex(&content))
}

/// Cache key: content hash of the subject plus the hash of the configuration
/// it was computed under. A changed binary or changed config is a new key,
/// never a mutated entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    subject: String,
    config: String,
}

impl CacheKey {
    pub fn new(subject: impl Into<String>, config: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            config: config.into(),
        }
    }
}

/// Memoizes resolver and layer-builder outputs for one assembly session.
///
/// Concurrent reads and writes are safe; last writer wins on a key, which is
/// acceptable because values for a given key are always computed identically.
/// There is no process-wide instance: callers construct one and pass it to
/// each [`crate::assembler::Assembler`] that should share it.
#[derive(Default)]
pub struct AssemblyCache {
    closures: Mutex<HashMap<CacheKey, DependencyClosure>>,
    layers: Mutex<HashMap<CacheKey, Layer>>,
}

impl AssemblyCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_closure(&self, key: &CacheKey) -> Option<DependencyClosure> {
        self.closures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    pub fn put_closure(&self, key: CacheKey, closure: DependencyClosure) {
        self.closures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, closure);
    }

    pub fn get_layer(&self, key: &CacheKey) -> Option<Layer> {
        self.layers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    pub fn put_layer(&self, key: CacheKey, layer: Layer) {
        self.layers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, layer);
    }

    /// Number of entries across both stores.
    pub fn len(&self) -> usize {
        let closures = self
            .closures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len();
        let layers = self
            .layers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len();
        closures + layers
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every entry.
    pub fn clear(&self) {
        self.closures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        self.layers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}
