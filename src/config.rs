//! Resolver configuration.
//!
//! Dependency resolution is a pure function of the binary and this structure.
//! Nothing is read from ambient host state that is not listed here, so two
//! hosts with identical search roots resolve identically.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::cache::sha256_hex;
use crate::error::AssemblyResult;

/// Library subdirectories probed inside each search root, in order.
pub const DEFAULT_LIB_DIRS: &[&str] = &["usr/lib64", "lib64", "usr/lib", "lib"];

/// Default source/destination for the certificate-authority bundle.
pub const TRUST_ANCHORS_PATH: &str = "etc/pki/tls/certs/ca-bundle.crt";

/// Default source/destination for the timezone database.
pub const TIMEZONE_DB_PATH: &str = "usr/share/zoneinfo";

/// Where one named auxiliary requirement comes from and where it lands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuxiliarySource {
    /// Source path, relative to each search root.
    pub source: PathBuf,
    /// Destination path inside the image.
    pub dest: PathBuf,
}

/// Explicit, versioned dependency-resolution configuration.
///
/// The search path is an ordered precedence list: the first root that
/// contains a candidate for a name wins, and later roots are never consulted
/// for that name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolverConfig {
    /// Ordered candidate root directories.
    pub search_roots: Vec<PathBuf>,
    /// Library subdirectories probed inside each root.
    pub lib_dirs: Vec<PathBuf>,
    /// Named auxiliary requirements (e.g. "trust-anchors", "timezone-db").
    pub auxiliary: BTreeMap<String, AuxiliarySource>,
    /// Per-library-name overrides: absolute host path that settles an
    /// otherwise ambiguous match.
    pub overrides: BTreeMap<String, PathBuf>,
}

impl ResolverConfig {
    /// Configuration with default library directories and the built-in
    /// auxiliary requirements.
    pub fn new(search_roots: Vec<PathBuf>) -> Self {
        let mut auxiliary = BTreeMap::new();
        auxiliary.insert(
            "trust-anchors".to_string(),
            AuxiliarySource {
                source: PathBuf::from(TRUST_ANCHORS_PATH),
                dest: PathBuf::from(TRUST_ANCHORS_PATH),
            },
        );
        auxiliary.insert(
            "timezone-db".to_string(),
            AuxiliarySource {
                source: PathBuf::from(TIMEZONE_DB_PATH),
                dest: PathBuf::from(TIMEZONE_DB_PATH),
            },
        );

        Self {
            search_roots,
            lib_dirs: DEFAULT_LIB_DIRS.iter().map(PathBuf::from).collect(),
            auxiliary,
            overrides: BTreeMap::new(),
        }
    }

    /// Register or replace an auxiliary requirement mapping.
    pub fn with_auxiliary(
        mut self,
        name: impl Into<String>,
        source: impl Into<PathBuf>,
        dest: impl Into<PathBuf>,
    ) -> Self {
        self.auxiliary.insert(
            name.into(),
            AuxiliarySource {
                source: source.into(),
                dest: dest.into(),
            },
        );
        self
    }

    /// Pin a library name to an explicit host path, settling ambiguity.
    pub fn with_override(mut self, name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        self.overrides.insert(name.into(), path.into());
        self
    }

    /// Stable content hash of this configuration, used in cache keys.
    /// Maps serialize in key order, so the hash does not depend on insertion
    /// order.
    pub fn content_hash(&self) -> AssemblyResult<String> {
        let bytes = serde_json::to_vec(self)?;
        Ok(sha256_hex(&bytes))
    }
}

/// Environment-derived defaults for the command-line front end.
///
/// The library API never reads the environment; only the CLI funnels these
/// into a [`ResolverConfig`].
#[derive(Debug, Clone)]
pub struct EnvConfig {
    /// Search roots from DISTILL_SEARCH_PATH (colon-separated), default "/".
    pub search_roots: Vec<PathBuf>,
    /// Output directory from DISTILL_OUTPUT_DIR, default `output/`.
    pub output_dir: PathBuf,
}

impl EnvConfig {
    /// Load configuration from environment variables. `.env` loading is the
    /// caller's concern (the CLI runs dotenvy before this).
    pub fn load(base_dir: &Path) -> Self {
        let search_roots = std::env::var("DISTILL_SEARCH_PATH")
            .ok()
            .map(|raw| {
                raw.split(':')
                    .filter(|s| !s.is_empty())
                    .map(PathBuf::from)
                    .collect::<Vec<_>>()
            })
            .filter(|roots| !roots.is_empty())
            .unwrap_or_else(|| vec![PathBuf::from("/")]);

        let output_dir = std::env::var("DISTILL_OUTPUT_DIR")
            .map(PathBuf::from)
            .map(|p| {
                if p.is_absolute() {
                    p
                } else {
                    base_dir.join(p)
                }
            })
            .unwrap_or_else(|_| base_dir.join("output"));

        Self {
            search_roots,
            output_dir,
        }
    }

    pub fn resolver_config(&self) -> ResolverConfig {
        ResolverConfig::new(self.search_roots.clone())
    }

    /// Print configuration for debugging.
    pub fn print(&self) {
        println!("Configuration:");
        let roots = self
            .search_roots
            .iter()
            .map(|p| p.display().to_string())
            .collect::<Vec<_>>()
            .join(":");
        println!("  DISTILL_SEARCH_PATH: {}", roots);
        println!("  DISTILL_OUTPUT_DIR: {}", self.output_dir.display());
    }
}
