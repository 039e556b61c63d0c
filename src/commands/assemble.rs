//! Assemble command - full pipeline plus output writing.

use anyhow::{bail, Context, Result};
use std::fs;
use std::path::PathBuf;

use distill::assembler::{Assembler, AssemblyRequest};
use distill::cache::AssemblyCache;
use distill::config::EnvConfig;
use distill::image::ExecMetadata;
use distill::layer;
use distill::users::UserSpec;

pub struct AssembleOpts {
    pub binary: PathBuf,
    pub entrypoint: Vec<String>,
    pub require: Vec<String>,
    pub root: Vec<PathBuf>,
    pub user: Option<String>,
    pub workdir: Option<String>,
    pub env: Vec<String>,
    pub rootfs: bool,
    pub output: Option<PathBuf>,
}

/// Execute the assemble command.
pub fn cmd_assemble(env_config: &EnvConfig, opts: AssembleOpts) -> Result<()> {
    if !opts.binary.exists() {
        bail!("binary not found: {}", opts.binary.display());
    }

    let mut config = env_config.resolver_config();
    if !opts.root.is_empty() {
        config.search_roots = opts.root.clone();
    }

    let entrypoint = if opts.entrypoint.is_empty() {
        vec![default_entrypoint(&opts.binary)?]
    } else {
        opts.entrypoint.clone()
    };

    let mut metadata = ExecMetadata::new(entrypoint);
    if let Some(dir) = &opts.workdir {
        metadata = metadata.with_working_dir(dir.clone());
    }
    for pair in &opts.env {
        let (key, value) = pair
            .split_once('=')
            .with_context(|| format!("invalid --env '{}', expected KEY=VALUE", pair))?;
        metadata = metadata.with_env(key, value);
    }

    let mut request = AssemblyRequest::new(&opts.binary, metadata);
    for name in &opts.require {
        request = request.with_requirement(name.clone());
    }
    if let Some(raw) = &opts.user {
        request = request.with_user(parse_user(raw)?);
    }

    println!("Assembling {}...", opts.binary.display());

    let cache = AssemblyCache::new();
    let assembler = Assembler::new(&config, &cache);
    let output = assembler
        .assemble(&request)
        .context("assembly failed")?;

    let out_dir = opts.output.clone().unwrap_or_else(|| env_config.output_dir.clone());
    fs::create_dir_all(&out_dir)
        .with_context(|| format!("creating {}", out_dir.display()))?;

    let manifest_path = out_dir.join("manifest.json");
    fs::write(&manifest_path, output.manifest.to_json()?)
        .with_context(|| format!("writing {}", manifest_path.display()))?;

    let blobs_dir = out_dir.join("layers");
    for layer in &output.layers {
        let file_name = format!("{}.tar", layer.digest().replace(':', "-"));
        layer::write_tar(layer, &blobs_dir.join(file_name))?;
    }

    if opts.rootfs {
        let rootfs_dir = out_dir.join("rootfs");
        if rootfs_dir.exists() {
            fs::remove_dir_all(&rootfs_dir)?;
        }
        layer::materialize(&output.layers, &rootfs_dir)?;
        println!("  Rootfs: {}", rootfs_dir.display());
    }

    let total: u64 = output
        .layers
        .iter()
        .flat_map(|l| l.artifacts())
        .map(|a| a.size())
        .sum();
    println!("  Manifest: {}", manifest_path.display());
    println!("  Identity: {}", output.manifest.id);
    println!(
        "  {} layer(s), {} artifact(s), {:.2} MB",
        output.layers.len(),
        output.layers.iter().map(|l| l.len()).sum::<usize>(),
        total as f64 / 1024.0 / 1024.0
    );

    Ok(())
}

/// Default entrypoint mirrors where the resolver places the binary.
fn default_entrypoint(binary: &PathBuf) -> Result<String> {
    let name = binary
        .file_name()
        .with_context(|| format!("binary path has no file name: {}", binary.display()))?
        .to_string_lossy();
    Ok(format!("/usr/bin/{}", name))
}

/// Parse NAME:UID:GID into a UserSpec.
fn parse_user(raw: &str) -> Result<UserSpec> {
    let parts: Vec<&str> = raw.split(':').collect();
    if parts.len() != 3 {
        bail!("invalid --user '{}', expected NAME:UID:GID", raw);
    }
    let uid = parts[1]
        .parse()
        .with_context(|| format!("invalid uid in --user '{}'", raw))?;
    let gid = parts[2]
        .parse()
        .with_context(|| format!("invalid gid in --user '{}'", raw))?;
    Ok(UserSpec::new(parts[0], uid, gid))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_user_roundtrip() {
        let user = parse_user("svc:1000:985").unwrap();
        assert_eq!(user.name, "svc");
        assert_eq!(user.uid, 1000);
        assert_eq!(user.gid, 985);
    }

    #[test]
    fn parse_user_rejects_malformed_input() {
        assert!(parse_user("svc").is_err());
        assert!(parse_user("svc:abc:0").is_err());
    }

    #[test]
    fn default_entrypoint_uses_binary_name() {
        let ep = default_entrypoint(&PathBuf::from("/build/target/app")).unwrap();
        assert_eq!(ep, "/usr/bin/app");
    }
}
