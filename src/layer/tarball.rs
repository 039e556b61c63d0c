//! Deterministic layer serialization.
//!
//! Layers serialize to a plain USTAR stream with name-sorted entries, zeroed
//! timestamps, and numeric owners taken from each artifact, so identical
//! inputs produce byte-identical archives and therefore identical digests.
//! Whiteout markers serialize as empty `.wh.`-prefixed entries ahead of the
//! regular entries, so consumers apply deletions before additions.

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use crate::error::{AssemblyError, AssemblyResult};
use crate::layer::{flatten, Layer};

const BLOCK: usize = 512;

/// Marker prefix hiding a path from earlier layers in the flattened view.
pub const WHITEOUT_PREFIX: &str = ".wh.";

/// Serialize a layer to tar bytes. Deterministic: whiteouts first, then
/// artifacts, each set ordered by path.
pub fn serialize(layer: &Layer) -> Vec<u8> {
    let mut out = Vec::new();

    for path in layer.whiteouts() {
        let name = whiteout_entry_name(path);
        write_header(&mut out, &name, 0, 0o000, 0, 0);
    }

    for artifact in layer.artifacts() {
        write_header(
            &mut out,
            artifact.dest(),
            artifact.size(),
            artifact.mode(),
            artifact.owner().uid,
            artifact.owner().gid,
        );
        out.extend_from_slice(artifact.content());
        pad_to_block(&mut out);
    }

    // Archive trailer: two zero blocks.
    out.resize(out.len() + 2 * BLOCK, 0);
    out
}

/// Write a layer's tar stream to disk.
pub fn write_tar(layer: &Layer, path: &Path) -> AssemblyResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| AssemblyError::io(format!("creating {}", parent.display()), e))?;
    }
    fs::write(path, serialize(layer))
        .map_err(|e| AssemblyError::io(format!("writing {}", path.display()), e))
}

/// Materialize the flattened view of a layer stack into a host directory.
///
/// Permission bits are applied; ownership is recorded in the serialized
/// layers but materialized trees keep the invoking user, since chown needs
/// privileges this tool does not assume.
pub fn materialize(layers: &[Layer], dest_dir: &Path) -> AssemblyResult<()> {
    for (path, artifact) in flatten(layers) {
        let target = dest_dir.join(&path);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| AssemblyError::io(format!("creating {}", parent.display()), e))?;
        }
        fs::write(&target, artifact.content())
            .map_err(|e| AssemblyError::io(format!("writing {}", target.display()), e))?;
        fs::set_permissions(&target, fs::Permissions::from_mode(artifact.mode()))
            .map_err(|e| AssemblyError::io(format!("chmod {}", target.display()), e))?;
    }
    Ok(())
}

/// `etc/ssl` hidden by a whiteout serializes as `etc/.wh.ssl`.
fn whiteout_entry_name(path: &Path) -> PathBuf {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    match path.parent() {
        Some(parent) if parent != Path::new("") => {
            parent.join(format!("{}{}", WHITEOUT_PREFIX, file_name))
        }
        _ => PathBuf::from(format!("{}{}", WHITEOUT_PREFIX, file_name)),
    }
}

fn write_header(out: &mut Vec<u8>, path: &Path, size: u64, mode: u32, uid: u32, gid: u32) {
    let mut header = [0u8; BLOCK];
    let (name, prefix) = split_name(path);

    write_bytes(&mut header[0..100], name.as_bytes());
    write_octal(&mut header[100..108], mode as u64 & 0o7777, 7);
    write_octal(&mut header[108..116], uid as u64, 7);
    write_octal(&mut header[116..124], gid as u64, 7);
    write_octal(&mut header[124..136], size, 11);
    write_octal(&mut header[136..148], 0, 11); // mtime pinned to epoch
    header[148..156].fill(b' '); // checksum placeholder
    header[156] = b'0'; // regular file
    write_bytes(&mut header[257..263], b"ustar\0");
    write_bytes(&mut header[263..265], b"00");
    write_octal(&mut header[329..337], 0, 7);
    write_octal(&mut header[337..345], 0, 7);
    write_bytes(&mut header[345..500], prefix.as_bytes());

    let checksum: u64 = header.iter().map(|b| *b as u64).sum();
    write_octal(&mut header[148..155], checksum, 6);
    header[155] = b' ';

    out.extend_from_slice(&header);
}

/// Split a path into USTAR (name, prefix) fields. Paths up to 100 bytes fit
/// in the name field; longer ones split at a separator so the tail stays
/// within 100 bytes and the head within 155.
fn split_name(path: &Path) -> (String, String) {
    let full = path.to_string_lossy().to_string();
    if full.len() <= 100 {
        return (full, String::new());
    }

    let mut split_at = None;
    for (idx, ch) in full.char_indices() {
        if ch == '/' && full.len() - idx - 1 <= 100 && idx <= 155 {
            split_at = Some(idx);
            break;
        }
    }

    match split_at {
        Some(idx) => (full[idx + 1..].to_string(), full[..idx].to_string()),
        // Pathological name with no usable separator: truncate rather than
        // emit a corrupt header.
        None => (full[full.len() - 100..].to_string(), String::new()),
    }
}

fn write_bytes(field: &mut [u8], bytes: &[u8]) {
    let n = bytes.len().min(field.len());
    field[..n].copy_from_slice(&bytes[..n]);
}

/// NUL-terminated zero-padded octal, the USTAR numeric encoding.
fn write_octal(field: &mut [u8], value: u64, width: usize) {
    let text = format!("{:0width$o}", value, width = width);
    write_bytes(field, text.as_bytes());
    if width < field.len() {
        field[width] = 0;
    }
}

fn pad_to_block(out: &mut Vec<u8>) {
    let rem = out.len() % BLOCK;
    if rem != 0 {
        out.resize(out.len() + BLOCK - rem, 0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::{Artifact, Owner};
    use std::collections::BTreeSet;

    fn layer_of(artifacts: Vec<Artifact>) -> Layer {
        Layer::new(artifacts, BTreeSet::new()).unwrap()
    }

    fn read_field(header: &[u8], range: std::ops::Range<usize>) -> String {
        let raw = &header[range];
        let end = raw.iter().position(|b| *b == 0).unwrap_or(raw.len());
        String::from_utf8_lossy(&raw[..end]).to_string()
    }

    #[test]
    fn serialization_is_byte_identical_for_identical_input() {
        let make = || {
            layer_of(vec![
                Artifact::new("usr/bin/app", b"binary".to_vec(), 0o755, Owner::ROOT),
                Artifact::new("etc/app.conf", b"conf".to_vec(), 0o644, Owner::ROOT),
            ])
        };
        assert_eq!(serialize(&make()), serialize(&make()));
        assert_eq!(make().digest(), make().digest());
    }

    #[test]
    fn header_fields_roundtrip() {
        let layer = layer_of(vec![Artifact::new(
            "usr/bin/app",
            b"hello".to_vec(),
            0o755,
            Owner { uid: 1000, gid: 1000 },
        )]);
        let bytes = serialize(&layer);

        assert_eq!(read_field(&bytes, 0..100), "usr/bin/app");
        assert_eq!(read_field(&bytes, 100..108), "0000755");
        assert_eq!(read_field(&bytes, 108..116), "0001750"); // 1000 octal
        assert_eq!(read_field(&bytes, 124..136), "00000000005");
        assert_eq!(read_field(&bytes, 136..148), "00000000000");
        assert_eq!(&bytes[257..262], b"ustar");
        // Content in the following block, zero-padded.
        assert_eq!(&bytes[512..517], b"hello");
        assert_eq!(bytes[517], 0);
    }

    #[test]
    fn checksum_matches_recomputation() {
        let layer = layer_of(vec![Artifact::new(
            "usr/bin/app",
            b"x".to_vec(),
            0o755,
            Owner::ROOT,
        )]);
        let bytes = serialize(&layer);

        let mut header = [0u8; 512];
        header.copy_from_slice(&bytes[..512]);
        let stored = u64::from_str_radix(read_field(&header, 148..155).trim(), 8).unwrap();
        header[148..156].fill(b' ');
        let computed: u64 = header.iter().map(|b| *b as u64).sum();
        assert_eq!(stored, computed);
    }

    #[test]
    fn whiteouts_precede_regular_entries() {
        let mut whiteouts = BTreeSet::new();
        whiteouts.insert(PathBuf::from("etc/old.conf"));
        let layer = Layer::new(
            vec![Artifact::new("etc/new.conf", b"new".to_vec(), 0o644, Owner::ROOT)],
            whiteouts,
        )
        .unwrap();

        let bytes = serialize(&layer);
        assert_eq!(read_field(&bytes, 0..100), "etc/.wh.old.conf");
        assert_eq!(read_field(&bytes, 124..136), "00000000000"); // empty marker
        assert_eq!(read_field(&bytes, 512..612), "etc/new.conf");
    }

    #[test]
    fn long_paths_split_into_prefix() {
        let long_dir = "a".repeat(90);
        let dest = format!("{}/{}/file.bin", long_dir, "b".repeat(60));
        let layer = layer_of(vec![Artifact::new(&dest, b"x".to_vec(), 0o644, Owner::ROOT)]);
        let bytes = serialize(&layer);

        let name = read_field(&bytes, 0..100);
        let prefix = read_field(&bytes, 345..500);
        assert_eq!(format!("{}/{}", prefix, name), dest);
    }

    #[test]
    fn trailer_is_two_zero_blocks() {
        let layer = layer_of(vec![Artifact::new(
            "usr/bin/app",
            b"x".to_vec(),
            0o755,
            Owner::ROOT,
        )]);
        let bytes = serialize(&layer);
        assert_eq!(bytes.len() % 512, 0);
        assert!(bytes[bytes.len() - 1024..].iter().all(|b| *b == 0));
    }
}
