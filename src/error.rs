//! Error types for distill.
//!
//! All library modules use `AssemblyResult<T>` as their return type. Every
//! failure here is deterministic in the inputs; nothing is retried.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for assembly operations.
pub type AssemblyResult<T> = Result<T, AssemblyError>;

/// All errors that can occur while assembling an image.
#[derive(Error, Debug)]
pub enum AssemblyError {
    /// A required shared object or auxiliary artifact could not be located.
    #[error("unresolvable dependency '{requirement}' (searched: {})", searched.join(", "))]
    UnresolvableDependency {
        requirement: String,
        searched: Vec<String>,
    },

    /// Multiple same-precedence candidates with differing content, or a
    /// dependency cycle. `candidates` lists every contender (for a cycle,
    /// the chain in walk order).
    #[error("ambiguous dependency '{name}': candidates {}", candidates.join(", "))]
    AmbiguousDependency {
        name: String,
        candidates: Vec<String>,
    },

    /// Two artifacts claim the same destination with different content.
    #[error("path collision at '{}': {existing} vs {incoming}", dest.display())]
    PathCollision {
        dest: PathBuf,
        existing: String,
        incoming: String,
    },

    /// No layers, or layers with no content at all.
    #[error("image would be empty: no layers with content")]
    EmptyImage,

    /// Entrypoint does not resolve to an executable in the flattened view.
    #[error("invalid entrypoint '{}': {reason}", path.display())]
    InvalidEntrypoint { path: PathBuf, reason: String },

    /// The caller cancelled the assembly between closure entries.
    #[error("assembly cancelled")]
    Cancelled,

    /// A required host tool could not be located or executed.
    #[error("host tool '{tool}' unavailable: {reason}")]
    ToolUnavailable { tool: String, reason: String },

    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl AssemblyError {
    /// Create an IO error with context.
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create an unresolvable-dependency error.
    pub fn unresolvable(requirement: impl Into<String>, searched: Vec<String>) -> Self {
        Self::UnresolvableDependency {
            requirement: requirement.into(),
            searched,
        }
    }

    /// Create an ambiguous-dependency error.
    pub fn ambiguous(name: impl Into<String>, candidates: Vec<String>) -> Self {
        Self::AmbiguousDependency {
            name: name.into(),
            candidates,
        }
    }

    /// Create a path-collision error from the two conflicting content digests.
    pub fn collision(
        dest: impl Into<PathBuf>,
        existing: impl Into<String>,
        incoming: impl Into<String>,
    ) -> Self {
        Self::PathCollision {
            dest: dest.into(),
            existing: existing.into(),
            incoming: incoming.into(),
        }
    }
}
