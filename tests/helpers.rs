//! Shared test utilities for distill tests.

#![allow(dead_code)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use distill::config::ResolverConfig;

/// Test environment with a temporary search root and output directory.
pub struct TestEnv {
    /// Temporary directory (kept alive for lifetime of TestEnv)
    pub _temp_dir: TempDir,
    /// Mock search root (source of libraries and auxiliary data)
    pub root: PathBuf,
    /// Output directory
    pub out: PathBuf,
}

impl TestEnv {
    /// Create a new test environment with a populated mock search root.
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let base = temp_dir.path();

        let root = base.join("root");
        let out = base.join("out");
        create_mock_root(&root);
        fs::create_dir_all(&out).expect("Failed to create out dir");

        Self {
            _temp_dir: temp_dir,
            root,
            out,
        }
    }

    /// Resolver configuration pointing at the mock root.
    pub fn config(&self) -> ResolverConfig {
        ResolverConfig::new(vec![self.root.clone()])
    }

    /// Path of a scratch file inside the temp dir.
    pub fn scratch(&self, name: &str) -> PathBuf {
        self._temp_dir.path().join(name)
    }
}

/// Create a minimal mock search root with library directories, a trust
/// bundle, and a small timezone tree.
pub fn create_mock_root(root: &Path) {
    let dirs = [
        "usr/lib64",
        "lib64",
        "usr/lib",
        "lib",
        "usr/bin",
        "etc/pki/tls/certs",
        "usr/share/zoneinfo/America",
    ];
    for dir in dirs {
        fs::create_dir_all(root.join(dir)).expect("Failed to create mock root dir");
    }

    fs::write(
        root.join("etc/pki/tls/certs/ca-bundle.crt"),
        "-----BEGIN CERTIFICATE-----\nmock bundle\n-----END CERTIFICATE-----\n",
    )
    .expect("Failed to create trust bundle");

    fs::write(root.join("usr/share/zoneinfo/UTC"), b"TZif2-utc").expect("Failed to create UTC");
    fs::write(
        root.join("usr/share/zoneinfo/America/New_York"),
        b"TZif2-nyc",
    )
    .expect("Failed to create New_York");
}

/// Create a mock executable. A script, not an ELF binary: it declares zero
/// dynamic requirements, which is exactly the self-contained case.
pub fn create_mock_binary(path: &Path) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("Failed to create parent dir for binary");
    }
    fs::write(path, "#!/bin/sh\necho mock\n").expect("Failed to create mock binary");

    let mut perms = fs::metadata(path)
        .expect("Failed to get metadata")
        .permissions();
    perms.set_mode(0o755);
    fs::set_permissions(path, perms).expect("Failed to set permissions");
}

/// Create a mock shared library with the given content.
pub fn create_mock_library(path: &Path, content: &[u8]) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("Failed to create parent dir for library");
    }
    fs::write(path, content).expect("Failed to create mock library");
}

/// Assert that a file exists.
pub fn assert_file_exists(path: &Path) {
    assert!(path.exists(), "Expected file to exist: {}", path.display());
}

/// Assert that a file contains expected content.
pub fn assert_file_contains(path: &Path, expected: &str) {
    let content =
        fs::read_to_string(path).unwrap_or_else(|_| panic!("Failed to read: {}", path.display()));
    assert!(
        content.contains(expected),
        "File {} does not contain expected content.\nExpected to find: {}\nActual content: {}",
        path.display(),
        expected,
        content
    );
}

/// Assert that a file carries an executable permission bit.
pub fn assert_executable(path: &Path) {
    let mode = fs::metadata(path)
        .unwrap_or_else(|_| panic!("Failed to stat: {}", path.display()))
        .permissions()
        .mode();
    assert!(
        mode & 0o111 != 0,
        "Expected executable bit on {}, mode {:o}",
        path.display(),
        mode
    );
}
