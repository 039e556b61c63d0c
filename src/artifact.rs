//! Filesystem artifacts and dependency closures.
//!
//! An [`Artifact`] is one immutable file destined for the assembled image:
//! destination path, content, permission bits, numeric owner. Identity is the
//! content hash plus the destination path.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use crate::cache::sha256_hex;
use crate::error::{AssemblyError, AssemblyResult};

/// Numeric file owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Owner {
    pub uid: u32,
    pub gid: u32,
}

impl Owner {
    pub const ROOT: Owner = Owner { uid: 0, gid: 0 };
}

impl Default for Owner {
    fn default() -> Self {
        Owner::ROOT
    }
}

/// Strip the leading slash so destinations are stored image-relative.
pub fn normalize_dest(path: &Path) -> PathBuf {
    match path.strip_prefix("/") {
        Ok(rel) => rel.to_path_buf(),
        Err(_) => path.to_path_buf(),
    }
}

/// One immutable file destined for the image filesystem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    dest: PathBuf,
    content: Vec<u8>,
    mode: u32,
    owner: Owner,
    override_base: bool,
}

impl Artifact {
    /// Create an artifact from in-memory content.
    pub fn new(dest: impl AsRef<Path>, content: Vec<u8>, mode: u32, owner: Owner) -> Self {
        Self {
            dest: normalize_dest(dest.as_ref()),
            content,
            mode,
            owner,
            override_base: false,
        }
    }

    /// Create an artifact by reading a file from the host filesystem.
    /// Mode is taken from the source file; owner defaults to root.
    pub fn from_file(src: &Path, dest: impl AsRef<Path>) -> AssemblyResult<Self> {
        let content = fs::read(src)
            .map_err(|e| AssemblyError::io(format!("reading {}", src.display()), e))?;
        let mode = fs::metadata(src)
            .map_err(|e| AssemblyError::io(format!("stat {}", src.display()), e))?
            .permissions()
            .mode()
            & 0o7777;
        Ok(Self::new(dest, content, mode, Owner::ROOT))
    }

    /// Mark this artifact as an explicit base-layer override.
    pub fn with_override(mut self) -> Self {
        self.override_base = true;
        self
    }

    pub fn dest(&self) -> &Path {
        &self.dest
    }

    pub fn content(&self) -> &[u8] {
        &self.content
    }

    pub fn size(&self) -> u64 {
        self.content.len() as u64
    }

    pub fn mode(&self) -> u32 {
        self.mode
    }

    pub fn owner(&self) -> Owner {
        self.owner
    }

    pub fn overrides_base(&self) -> bool {
        self.override_base
    }

    pub fn is_executable(&self) -> bool {
        self.mode & 0o111 != 0
    }

    /// Content-addressable digest of this artifact's bytes.
    pub fn content_digest(&self) -> String {
        format!("sha256:{}", sha256_hex(&self.content))
    }
}

/// The complete set of artifacts a binary requires to execute, plus the
/// binary itself. Deduplicated by destination path: two artifacts may not
/// claim the same path with different content.
#[derive(Debug, Clone)]
pub struct DependencyClosure {
    binary_dest: PathBuf,
    artifacts: BTreeMap<PathBuf, Artifact>,
}

impl DependencyClosure {
    /// Create a closure containing only the binary. This is the degenerate
    /// case for a fully self-contained executable.
    pub fn new(binary: Artifact) -> Self {
        let binary_dest = binary.dest().to_path_buf();
        let mut artifacts = BTreeMap::new();
        artifacts.insert(binary_dest.clone(), binary);
        Self {
            binary_dest,
            artifacts,
        }
    }

    /// Add an artifact. Identical content at an existing destination merges
    /// silently; differing content is a collision.
    pub fn insert(&mut self, artifact: Artifact) -> AssemblyResult<()> {
        match self.artifacts.get(artifact.dest()) {
            Some(existing) if existing.content_digest() == artifact.content_digest() => Ok(()),
            Some(existing) => Err(AssemblyError::collision(
                artifact.dest(),
                existing.content_digest(),
                artifact.content_digest(),
            )),
            None => {
                self.artifacts.insert(artifact.dest().to_path_buf(), artifact);
                Ok(())
            }
        }
    }

    /// Destination path of the binary inside the image.
    pub fn binary_dest(&self) -> &Path {
        &self.binary_dest
    }

    pub fn binary(&self) -> &Artifact {
        &self.artifacts[&self.binary_dest]
    }

    pub fn contains(&self, dest: &Path) -> bool {
        self.artifacts.contains_key(&normalize_dest(dest))
    }

    pub fn get(&self, dest: &Path) -> Option<&Artifact> {
        self.artifacts.get(&normalize_dest(dest))
    }

    /// All artifacts, ordered by destination path.
    pub fn artifacts(&self) -> impl Iterator<Item = &Artifact> {
        self.artifacts.values()
    }

    pub fn len(&self) -> usize {
        self.artifacts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.artifacts.is_empty()
    }

    /// Digest over (destination, content digest) pairs, in path order.
    /// Used as a cache key component for layer building.
    pub fn digest(&self) -> String {
        let mut acc = Vec::new();
        for (dest, artifact) in &self.artifacts {
            acc.extend_from_slice(dest.to_string_lossy().as_bytes());
            acc.push(0);
            acc.extend_from_slice(artifact.content_digest().as_bytes());
            acc.push(0);
        }
        sha256_hex(&acc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn artifact(dest: &str, content: &[u8]) -> Artifact {
        Artifact::new(dest, content.to_vec(), 0o644, Owner::ROOT)
    }

    #[test]
    fn dest_is_stored_without_leading_slash() {
        let a = artifact("/usr/bin/app", b"x");
        assert_eq!(a.dest(), Path::new("usr/bin/app"));
        let b = artifact("usr/bin/app", b"x");
        assert_eq!(b.dest(), Path::new("usr/bin/app"));
    }

    #[test]
    fn executable_bit_detection() {
        let a = Artifact::new("usr/bin/app", vec![], 0o755, Owner::ROOT);
        assert!(a.is_executable());
        let b = Artifact::new("etc/passwd", vec![], 0o644, Owner::ROOT);
        assert!(!b.is_executable());
    }

    #[test]
    fn closure_deduplicates_identical_content() {
        let mut closure = DependencyClosure::new(artifact("usr/bin/app", b"bin"));
        closure.insert(artifact("usr/lib/libc.so.6", b"libc")).unwrap();
        closure.insert(artifact("usr/lib/libc.so.6", b"libc")).unwrap();
        assert_eq!(closure.len(), 2);
    }

    #[test]
    fn closure_rejects_conflicting_content() {
        let mut closure = DependencyClosure::new(artifact("usr/bin/app", b"bin"));
        closure.insert(artifact("usr/lib/libc.so.6", b"one")).unwrap();
        let err = closure
            .insert(artifact("usr/lib/libc.so.6", b"two"))
            .unwrap_err();
        assert!(matches!(err, AssemblyError::PathCollision { .. }));
    }

    #[test]
    fn closure_digest_is_order_independent() {
        let mut a = DependencyClosure::new(artifact("usr/bin/app", b"bin"));
        a.insert(artifact("usr/lib/one.so", b"1")).unwrap();
        a.insert(artifact("usr/lib/two.so", b"2")).unwrap();

        let mut b = DependencyClosure::new(artifact("usr/bin/app", b"bin"));
        b.insert(artifact("usr/lib/two.so", b"2")).unwrap();
        b.insert(artifact("usr/lib/one.so", b"1")).unwrap();

        assert_eq!(a.digest(), b.digest());
    }
}
