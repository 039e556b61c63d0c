//! ELF dynamic-section inspection.
//!
//! Uses `readelf -d` instead of `ldd` to extract library requirements.
//! readelf reads the ELF headers directly without executing the binary,
//! so inspection works for foreign-architecture binaries and never runs
//! untrusted code through the host dynamic linker.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::error::{AssemblyError, AssemblyResult};

const ELF_MAGIC: [u8; 4] = [0x7f, b'E', b'L', b'F'];

/// Check the file's magic bytes. Short or non-ELF files return false.
pub fn is_elf(path: &Path) -> AssemblyResult<bool> {
    let mut file = File::open(path)
        .map_err(|e| AssemblyError::io(format!("opening {}", path.display()), e))?;
    let mut magic = [0u8; 4];
    match file.read_exact(&mut magic) {
        Ok(()) => Ok(magic == ELF_MAGIC),
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => Ok(false),
        Err(e) => Err(AssemblyError::io(format!("reading {}", path.display()), e)),
    }
}

/// Extract the names of shared libraries a binary declares it needs.
///
/// Non-ELF files and fully static ELF binaries yield an empty list - a
/// self-contained executable has no external requirements and that is not
/// an error.
pub fn needed_libraries(path: &Path) -> AssemblyResult<Vec<String>> {
    if !is_elf(path)? {
        tracing::debug!(binary = %path.display(), "not an ELF file, no dynamic requirements");
        return Ok(Vec::new());
    }

    let readelf = find_readelf()?;
    let output = Command::new(&readelf)
        .arg("-d")
        .arg(path)
        .output()
        .map_err(|e| AssemblyError::io(format!("running {}", readelf.display()), e))?;

    if !output.status.success() {
        // ELF without a dynamic section (static binary) - readelf still
        // exits zero for those, so a failure here means unreadable input.
        tracing::debug!(binary = %path.display(), "readelf -d reported no dynamic section");
        return Ok(Vec::new());
    }

    Ok(parse_needed(&String::from_utf8_lossy(&output.stdout)))
}

/// Parse `readelf -d` output into NEEDED library names.
///
/// Example:
/// ```text
/// Dynamic section at offset 0x2d0e0 contains 28 entries:
///   Tag        Type                         Name/Value
///  0x0000000000000001 (NEEDED)             Shared library: [libssl.so.3]
///  0x0000000000000001 (NEEDED)             Shared library: [libc.so.6]
/// ```
pub fn parse_needed(output: &str) -> Vec<String> {
    let mut libs = Vec::new();

    for line in output.lines() {
        if line.contains("(NEEDED)") && line.contains("Shared library:") {
            if let (Some(start), Some(end)) = (line.find('['), line.find(']')) {
                if start + 1 < end {
                    libs.push(line[start + 1..end].to_string());
                }
            }
        }
    }

    libs
}

/// Locate the readelf binary: DISTILL_READELF env var first, then PATH.
fn find_readelf() -> AssemblyResult<PathBuf> {
    if let Ok(path) = std::env::var("DISTILL_READELF") {
        let path = PathBuf::from(&path);
        if path.exists() {
            return Ok(path);
        }
    }

    which::which("readelf").map_err(|e| AssemblyError::ToolUnavailable {
        tool: "readelf".to_string(),
        reason: format!("{} (install binutils or set DISTILL_READELF)", e),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn parse_needed_extracts_library_names() {
        let output = r#"
Dynamic section at offset 0x2d0e0 contains 28 entries:
  Tag        Type                         Name/Value
 0x0000000000000001 (NEEDED)             Shared library: [libtinfo.so.6]
 0x0000000000000001 (NEEDED)             Shared library: [libc.so.6]
 0x000000000000000c (INIT)               0x5000
"#;
        assert_eq!(parse_needed(output), vec!["libtinfo.so.6", "libc.so.6"]);
    }

    #[test]
    fn parse_needed_ignores_non_needed_entries() {
        let output = r#"
 0x000000000000001d (RUNPATH)            Library runpath: [$ORIGIN/../lib]
 0x000000000000000c (INIT)               0x5000
"#;
        assert!(parse_needed(output).is_empty());
    }

    #[test]
    fn parse_needed_empty_output() {
        assert!(parse_needed("").is_empty());
        assert!(parse_needed("not an ELF file").is_empty());
    }

    #[test]
    fn is_elf_rejects_scripts_and_short_files() {
        let dir = tempfile::tempdir().unwrap();

        let script = dir.path().join("script.sh");
        std::fs::write(&script, "#!/bin/sh\necho hi\n").unwrap();
        assert!(!is_elf(&script).unwrap());

        let short = dir.path().join("short");
        std::fs::write(&short, [0x7f]).unwrap();
        assert!(!is_elf(&short).unwrap());
    }

    #[test]
    fn is_elf_accepts_elf_magic() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fake-elf");
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(&[0x7f, b'E', b'L', b'F', 2, 1, 1, 0]).unwrap();
        assert!(is_elf(&path).unwrap());
    }

    #[test]
    fn needed_libraries_of_non_elf_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plain.txt");
        std::fs::write(&path, "just text").unwrap();
        assert!(needed_libraries(&path).unwrap().is_empty());
    }
}
