//! Named operations and the requests that carry them across a re-exec

use std::path::{Path, PathBuf};

use bytes::Bytes;
use hostns_core::{Error, ExecutionResult, Result};
use hostns_fs::{DirEntry, FileInfo};
use serde::{Deserialize, Serialize};

use crate::command::{self, CommandOutput};

/// A filesystem operation to run inside the target namespaces
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum NamespaceOp {
    /// Whole file contents
    ReadFile {
        /// File to read
        path: PathBuf,
    },
    /// Create or truncate a file
    WriteFile {
        /// File to write
        path: PathBuf,
        /// New contents
        data: Vec<u8>,
        /// Mode used when the file is created
        mode: u32,
    },
    /// Metadata, following symlinks
    Stat {
        /// Path to inspect
        path: PathBuf,
    },
    /// Metadata of the link itself
    Lstat {
        /// Path to inspect
        path: PathBuf,
    },
    /// Sorted directory listing
    ReadDir {
        /// Directory to list
        path: PathBuf,
    },
    /// Create a directory and its missing parents
    MkdirAll {
        /// Directory to create
        path: PathBuf,
        /// Mode for every created directory
        mode: u32,
    },
    /// Remove one file or empty directory
    Remove {
        /// Path to remove
        path: PathBuf,
    },
    /// Remove a tree; absent is success
    RemoveAll {
        /// Root of the tree
        path: PathBuf,
    },
    /// Check for existence without following a missing path into an error
    Exists {
        /// Path to check
        path: PathBuf,
    },
}

/// Result of a [`NamespaceOp`]
///
/// Each operation produces exactly one variant; the `into_*` accessors
/// check it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum OpOutput {
    /// From [`NamespaceOp::ReadFile`]
    Data(Vec<u8>),
    /// From [`NamespaceOp::Stat`] and [`NamespaceOp::Lstat`]
    Info(FileInfo),
    /// From [`NamespaceOp::ReadDir`]
    Entries(Vec<DirEntry>),
    /// From [`NamespaceOp::Exists`]
    Exists(bool),
    /// From operations without a value
    Done,
}

impl NamespaceOp {
    /// Operation name, as used in logs
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::ReadFile { .. } => "read_file",
            Self::WriteFile { .. } => "write_file",
            Self::Stat { .. } => "stat",
            Self::Lstat { .. } => "lstat",
            Self::ReadDir { .. } => "read_dir",
            Self::MkdirAll { .. } => "mkdir_all",
            Self::Remove { .. } => "remove",
            Self::RemoveAll { .. } => "remove_all",
            Self::Exists { .. } => "exists",
        }
    }

    /// Path the operation applies to
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            Self::ReadFile { path }
            | Self::WriteFile { path, .. }
            | Self::Stat { path }
            | Self::Lstat { path }
            | Self::ReadDir { path }
            | Self::MkdirAll { path, .. }
            | Self::Remove { path }
            | Self::RemoveAll { path }
            | Self::Exists { path } => path,
        }
    }

    /// Run the operation in the current namespaces
    ///
    /// Uses only the fork-safe filesystem layer.
    pub fn run(&self) -> Result<OpOutput> {
        match self {
            Self::ReadFile { path } => hostns_fs::read_file(path).map(OpOutput::Data),
            Self::WriteFile { path, data, mode } => {
                hostns_fs::write_file(path, data, *mode).map(|()| OpOutput::Done)
            }
            Self::Stat { path } => hostns_fs::stat(path).map(OpOutput::Info),
            Self::Lstat { path } => hostns_fs::lstat(path).map(OpOutput::Info),
            Self::ReadDir { path } => hostns_fs::read_dir(path).map(OpOutput::Entries),
            Self::MkdirAll { path, mode } => {
                hostns_fs::mkdir_all(path, *mode).map(|()| OpOutput::Done)
            }
            Self::Remove { path } => hostns_fs::remove(path).map(|()| OpOutput::Done),
            Self::RemoveAll { path } => hostns_fs::remove_all(path).map(|()| OpOutput::Done),
            Self::Exists { path } => hostns_fs::exists(path).map(OpOutput::Exists),
        }
    }
}

impl OpOutput {
    const fn kind(&self) -> &'static str {
        match self {
            Self::Data(_) => "data",
            Self::Info(_) => "info",
            Self::Entries(_) => "entries",
            Self::Exists(_) => "exists",
            Self::Done => "done",
        }
    }

    fn mismatch(&self, expected: &str) -> Error {
        Error::UnexpectedResponse {
            message: format!("expected {expected} output, got {}", self.kind()),
        }
    }

    /// File contents
    pub fn into_data(self) -> Result<Vec<u8>> {
        match self {
            Self::Data(data) => Ok(data),
            other => Err(other.mismatch("data")),
        }
    }

    /// File metadata
    pub fn into_info(self) -> Result<FileInfo> {
        match self {
            Self::Info(info) => Ok(info),
            other => Err(other.mismatch("info")),
        }
    }

    /// Directory listing
    pub fn into_entries(self) -> Result<Vec<DirEntry>> {
        match self {
            Self::Entries(entries) => Ok(entries),
            other => Err(other.mismatch("entries")),
        }
    }

    /// Existence flag
    pub fn into_exists(self) -> Result<bool> {
        match self {
            Self::Exists(exists) => Ok(exists),
            other => Err(other.mismatch("exists")),
        }
    }

    /// Completion of an operation without a value
    pub fn into_done(self) -> Result<()> {
        match self {
            Self::Done => Ok(()),
            other => Err(other.mismatch("done")),
        }
    }
}

/// Work sent to a re-exec child on its stdin
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "body", rename_all = "snake_case")]
pub enum ExecutionRequest {
    /// Run a binary and collect its combined output
    ExternalCommand {
        /// Binary to execute, looked up in `PATH` when not absolute
        binary: String,
        /// Arguments, in order
        args: Vec<String>,
    },
    /// Run a named filesystem operation
    Operation(NamespaceOp),
}

impl ExecutionRequest {
    /// Short description for logs
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Self::ExternalCommand { binary, .. } => format!("exec {binary}"),
            Self::Operation(op) => format!("{} {}", op.name(), op.path().display()),
        }
    }

    /// Run the request in the current namespaces and encode its frame
    ///
    /// A command reports [`CommandOutput`]; an operation reports
    /// [`OpOutput`].
    #[must_use]
    pub fn execute(&self) -> Bytes {
        match self {
            Self::ExternalCommand { binary, args } => {
                ExecutionResult::from_result(command::run_combined(binary, args, None)).encode()
            }
            Self::Operation(op) => ExecutionResult::from_result(op.run()).encode(),
        }
    }
}

/// Decode the output of [`ExecutionRequest::ExternalCommand`]
pub(crate) fn decode_command(frame: &[u8]) -> Result<CommandOutput> {
    ExecutionResult::<CommandOutput>::decode(frame)?.into_result()
}

/// Decode the output of [`ExecutionRequest::Operation`]
pub(crate) fn decode_op(frame: &[u8]) -> Result<OpOutput> {
    ExecutionResult::<OpOutput>::decode(frame)?.into_result()
}
