//! CLI command handlers.
//!
//! Each submodule handles a specific CLI command:
//! - `assemble` - Resolve, build layers, write manifest and blobs
//! - `resolve` - Print a binary's runtime closure
//! - `show` - Display a written manifest
//! - `clean` - Remove output artifacts

pub mod assemble;
pub mod clean;
pub mod resolve;
pub mod show;

pub use assemble::{cmd_assemble, AssembleOpts};
pub use clean::cmd_clean;
pub use resolve::cmd_resolve;
pub use show::cmd_show;
