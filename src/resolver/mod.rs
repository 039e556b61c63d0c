//! Dependency resolution.
//!
//! Turns a binary into a [`DependencyClosure`]: the binary itself, the
//! transitive set of shared libraries its ELF metadata declares, and any
//! named auxiliary requirements the caller declares.
//!
//! # Documented limitation
//!
//! A binary that validates TLS peers at run time but never declares the
//! `trust-anchors` requirement resolves and assembles successfully, then
//! fails inside the image when it first attempts certificate validation.
//! Static inspection cannot see into certificate usage; declare the
//! requirement.

pub mod auxiliary;
pub mod elf;
pub mod search;

use std::collections::HashSet;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::artifact::{Artifact, DependencyClosure, Owner};
use crate::cache::{hash_file, AssemblyCache, CacheKey};
use crate::config::ResolverConfig;
use crate::error::{AssemblyError, AssemblyResult};

/// Cooperative cancellation flag, checked between top-level closure entries
/// only, so partial values are never written to the cache.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    fn check(&self) -> AssemblyResult<()> {
        if self.is_cancelled() {
            Err(AssemblyError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Resolves binaries into dependency closures, memoized through the cache.
pub struct Resolver<'a> {
    config: &'a ResolverConfig,
    cache: &'a AssemblyCache,
}

impl<'a> Resolver<'a> {
    pub fn new(config: &'a ResolverConfig, cache: &'a AssemblyCache) -> Self {
        Self { config, cache }
    }

    /// Resolve a binary and its declared auxiliary requirements.
    ///
    /// The binary lands at `usr/bin/<file name>` with mode 0755. A binary
    /// with zero dynamic requirements and no declared auxiliaries yields a
    /// closure containing exactly the binary.
    pub fn resolve(
        &self,
        binary: &Path,
        declared: &[String],
    ) -> AssemblyResult<DependencyClosure> {
        self.resolve_with_cancel(binary, declared, &CancelToken::default())
    }

    pub fn resolve_with_cancel(
        &self,
        binary: &Path,
        declared: &[String],
        cancel: &CancelToken,
    ) -> AssemblyResult<DependencyClosure> {
        let binary_hash = hash_file(binary)?;
        let key = self.cache_key(&binary_hash, declared)?;

        if let Some(cached) = self.cache.get_closure(&key) {
            tracing::debug!(binary = %binary.display(), "closure cache hit");
            return Ok(cached);
        }

        let closure = self.compute(binary, declared, cancel)?;
        self.cache.put_closure(key, closure.clone());
        Ok(closure)
    }

    fn cache_key(&self, binary_hash: &str, declared: &[String]) -> AssemblyResult<CacheKey> {
        let mut names: Vec<&str> = declared.iter().map(String::as_str).collect();
        names.sort_unstable();
        names.dedup();
        let subject = format!("{}+{}", binary_hash, names.join(","));
        Ok(CacheKey::new(subject, self.config.content_hash()?))
    }

    fn compute(
        &self,
        binary: &Path,
        declared: &[String],
        cancel: &CancelToken,
    ) -> AssemblyResult<DependencyClosure> {
        let file_name = binary
            .file_name()
            .ok_or_else(|| {
                AssemblyError::io(
                    format!("binary path has no file name: {}", binary.display()),
                    std::io::Error::from(std::io::ErrorKind::InvalidInput),
                )
            })?
            .to_os_string();

        let content = fs::read(binary)
            .map_err(|e| AssemblyError::io(format!("reading {}", binary.display()), e))?;
        let mode = fs::metadata(binary)
            .map_err(|e| AssemblyError::io(format!("stat {}", binary.display()), e))?
            .permissions()
            .mode();
        // Entrypoints must be executable in the image even if the build
        // output lost its bits along the way.
        let mode = (mode & 0o7777) | 0o755;

        let dest = Path::new("usr/bin").join(&file_name);
        let mut closure =
            DependencyClosure::new(Artifact::new(&dest, content, mode, Owner::ROOT));

        // Shared libraries: depth-first over NEEDED edges. `stack` carries
        // the in-progress chain for cycle detection.
        let mut done: HashSet<String> = HashSet::new();
        for lib_name in elf::needed_libraries(binary)? {
            cancel.check()?;
            let mut stack = Vec::new();
            self.visit(&lib_name, &mut stack, &mut done, &mut closure)?;
        }

        // Declared auxiliary requirements.
        for requirement in declared {
            cancel.check()?;
            for artifact in auxiliary::resolve_auxiliary(self.config, requirement)? {
                closure.insert(artifact)?;
            }
        }

        tracing::info!(
            binary = %binary.display(),
            artifacts = closure.len(),
            "resolved closure"
        );
        Ok(closure)
    }

    fn visit(
        &self,
        name: &str,
        stack: &mut Vec<String>,
        done: &mut HashSet<String>,
        closure: &mut DependencyClosure,
    ) -> AssemblyResult<()> {
        if let Some(pos) = stack.iter().position(|n| n == name) {
            let mut chain: Vec<String> = stack[pos..].to_vec();
            chain.push(name.to_string());
            return Err(AssemblyError::ambiguous(name, chain));
        }
        if done.contains(name) {
            return Ok(());
        }

        let found = search::find_library(self.config, name)?;
        closure.insert(Artifact::from_file(&found.source, &found.dest)?)?;

        stack.push(name.to_string());
        for dep in elf::needed_libraries(&found.source)? {
            self.visit(&dep, stack, done, closure)?;
        }
        stack.pop();
        done.insert(name.to_string());

        Ok(())
    }
}
