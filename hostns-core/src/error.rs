//! Error types for hostns

use std::path::{Path, PathBuf};

use nix::errno::Errno;
use thiserror::Error;

/// hostns error types
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Filesystem syscall failed
    ///
    /// Mirrors the kernel's error code, wrapped with the operation name and
    /// the path it was applied to.
    #[error("{op} {}: {source}", .path.display())]
    Fs {
        /// Operation name (`open`, `unlinkat`, ...)
        op: &'static str,
        /// Path the operation was applied to
        path: PathBuf,
        /// Kernel error code
        source: Errno,
    },

    /// Namespace operation failed
    #[error("Namespace error: {message}")]
    Namespace {
        /// Error message
        message: String,
    },

    /// Path cannot be handed to the kernel
    #[error("Invalid path: {message}")]
    InvalidPath {
        /// Error message
        message: String,
    },

    /// Malformed text read from procfs
    #[error("Parse error: {message}")]
    Parse {
        /// Error message
        message: String,
    },

    /// System error from nix
    #[error("System error: {0}")]
    System(#[from] nix::Error),

    /// Failure reported by a namespace child through the result channel
    #[error("{message}")]
    Remote {
        /// Message written by the child
        message: String,
    },

    /// The result channel carried something that is not a valid frame
    #[error("Unexpected response: {message}")]
    UnexpectedResponse {
        /// What was wrong with the frame
        message: String,
    },

    /// External command exited unsuccessfully
    #[error("{binary} failed ({}): {output}", describe_exit(.code))]
    CommandFailed {
        /// Binary that was run
        binary: String,
        /// Exit code, `None` when killed by a signal
        code: Option<i32>,
        /// Combined, trimmed output
        output: String,
    },

    /// JSON encoding or decoding failed
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// No process with the given name in the ancestry chain
    #[error("Process not found: {name}")]
    ProcessNotFound {
        /// Process name that was searched for
        name: String,
    },

    /// Task join error
    #[error("Task join error: {0}")]
    TaskJoin(#[from] tokio::task::JoinError),
}

#[allow(clippy::ref_option)]
fn describe_exit(code: &Option<i32>) -> String {
    code.map_or_else(
        || "killed by signal".to_string(),
        |code| format!("exit status {code}"),
    )
}

impl Error {
    /// Build a filesystem error for `op` applied to `path`
    pub fn fs(op: &'static str, path: impl AsRef<Path>, source: Errno) -> Self {
        Self::Fs {
            op,
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// Kernel error code, when the error came straight from a syscall
    #[must_use]
    pub const fn errno(&self) -> Option<Errno> {
        match self {
            Self::Fs { source, .. } | Self::System(source) => Some(*source),
            _ => None,
        }
    }

    /// Whether the error means "no such file or directory"
    ///
    /// Failures that crossed the result channel only carry text, so those
    /// are matched on the errno name the filesystem layer embeds.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::Fs { source, .. } | Self::System(source) => *source == Errno::ENOENT,
            Self::Io(e) => e.kind() == std::io::ErrorKind::NotFound,
            Self::Remote { message } => message.contains("ENOENT"),
            _ => false,
        }
    }
}

/// Result type alias for hostns operations
pub type Result<T> = std::result::Result<T, Error>;
