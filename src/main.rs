//! distill - minimal runtime image assembler CLI.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use distill::config::EnvConfig;

#[derive(Parser)]
#[command(name = "distill")]
#[command(about = "Assemble a minimal runtime image from a compiled executable")]
#[command(
    after_help = "QUICK START:\n  distill resolve ./app              Show the runtime closure\n  distill assemble ./app             Assemble an image\n  distill show output/manifest.json  Inspect a manifest\n  distill clean                      Remove output artifacts"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve a binary's runtime closure and print it
    Resolve {
        /// Path to the compiled executable
        binary: PathBuf,
        /// Declare a named auxiliary requirement (repeatable)
        #[arg(long = "require")]
        require: Vec<String>,
        /// Search root (repeatable, ordered; overrides DISTILL_SEARCH_PATH)
        #[arg(long = "root")]
        root: Vec<PathBuf>,
    },

    /// Assemble an image: manifest, layer tarballs, optional rootfs tree
    Assemble {
        /// Path to the compiled executable
        binary: PathBuf,
        /// Entrypoint argv (default: the binary at its in-image path)
        #[arg(long)]
        entrypoint: Vec<String>,
        /// Declare a named auxiliary requirement (repeatable)
        #[arg(long = "require")]
        require: Vec<String>,
        /// Search root (repeatable, ordered; overrides DISTILL_SEARCH_PATH)
        #[arg(long = "root")]
        root: Vec<PathBuf>,
        /// Run as this non-root user, NAME:UID:GID
        #[arg(long)]
        user: Option<String>,
        /// Working directory inside the image
        #[arg(long)]
        workdir: Option<String>,
        /// Environment variable KEY=VALUE (repeatable)
        #[arg(long = "env")]
        env: Vec<String>,
        /// Also materialize the flattened rootfs tree
        #[arg(long)]
        rootfs: bool,
        /// Output directory (default: DISTILL_OUTPUT_DIR or output/)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show a previously written manifest
    Show {
        /// Path to manifest.json
        manifest: PathBuf,
    },

    /// Remove output artifacts
    Clean {
        /// Output directory (default: DISTILL_OUTPUT_DIR or output/)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    // Load .env if present; environment wins over file values.
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let base_dir = std::env::current_dir()?;
    let env_config = EnvConfig::load(&base_dir);

    match cli.command {
        Commands::Resolve {
            binary,
            require,
            root,
        } => commands::cmd_resolve(&env_config, &binary, &require, &root),

        Commands::Assemble {
            binary,
            entrypoint,
            require,
            root,
            user,
            workdir,
            env,
            rootfs,
            output,
        } => {
            let opts = commands::AssembleOpts {
                binary,
                entrypoint,
                require,
                root,
                user,
                workdir,
                env,
                rootfs,
                output,
            };
            commands::cmd_assemble(&env_config, opts)
        }

        Commands::Show { manifest } => commands::cmd_show(&manifest),

        Commands::Clean { output } => commands::cmd_clean(&env_config, output),
    }
}
