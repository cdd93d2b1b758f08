//! Run commands and filesystem operations in another process's namespaces

use std::fmt;
use std::path::{Path, PathBuf};

use hostns_core::{Error, Result};
use hostns_fs::{DirEntry, FileInfo};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::command::{self, CommandOutput};
use crate::config::{NamespaceSet, Strategy};
use crate::discovery::host_namespace_path;
use crate::fork;
use crate::ops::{self, ExecutionRequest, NamespaceOp, OpOutput};
use crate::reexec::{self, DEFAULT_HELPER};
use crate::switch::ResolvedNamespaces;

/// Entry point for namespace-switched execution
///
/// Built from a namespace directory such as `/proc/<pid>/ns`. An empty path
/// means "stay where we are": every call runs directly in the calling
/// process, with no child and no switch.
#[derive(Debug, Clone)]
pub struct NamespaceExecutor {
    ns_dir: PathBuf,
    namespaces: Option<ResolvedNamespaces>,
    strategy: Strategy,
    helper: PathBuf,
}

impl NamespaceExecutor {
    /// Create an executor for the namespaces under `ns_dir`
    ///
    /// # Errors
    /// Returns [`Error::InvalidPath`] if a namespace path holds a NUL byte
    pub fn new(ns_dir: impl Into<PathBuf>) -> Result<Self> {
        let ns_dir = ns_dir.into();
        let namespaces = if ns_dir.as_os_str().is_empty() {
            debug!("Created namespace executor in bypass mode");
            None
        } else {
            let set = NamespaceSet::from_dir(&ns_dir);
            debug!(
                ns_dir = %ns_dir.display(),
                kinds = ?set.kinds(),
                "Created namespace executor"
            );
            Some(set.resolve()?)
        };

        Ok(Self {
            ns_dir,
            namespaces,
            strategy: Strategy::default(),
            helper: PathBuf::from(DEFAULT_HELPER),
        })
    }

    /// Create an executor for the host's namespaces, found through the
    /// container runtime's process tree under `proc_root`
    pub fn for_host(proc_root: impl AsRef<Path>) -> Result<Self> {
        Self::new(host_namespace_path(proc_root.as_ref()))
    }

    /// Select how commands and named operations reach the namespaces
    ///
    /// Closures passed to [`run_operation`](Self::run_operation) always use
    /// fork.
    #[must_use]
    pub fn with_strategy(mut self, strategy: Strategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Executable started for [`Strategy::ReExec`]
    ///
    /// It must call [`reexec::maybe_run_child`] first thing in `main`.
    #[must_use]
    pub fn with_helper(mut self, helper: impl Into<PathBuf>) -> Self {
        self.helper = helper.into();
        self
    }

    /// Namespace directory, empty when bypassed
    #[must_use]
    pub fn namespace_dir(&self) -> &Path {
        &self.ns_dir
    }

    /// Check whether calls run in the caller's own namespaces
    #[must_use]
    pub const fn is_bypassed(&self) -> bool {
        self.namespaces.is_none()
    }

    /// Configured strategy
    #[must_use]
    pub const fn strategy(&self) -> Strategy {
        self.strategy
    }

    /// Configured re-exec helper
    #[must_use]
    pub fn helper(&self) -> &Path {
        &self.helper
    }

    /// Run `binary` with `args` and return its trimmed combined output
    ///
    /// # Errors
    /// Returns [`Error::CommandFailed`] with the output when the command
    /// exits non-zero, or the error that kept it from running
    pub fn run_command(&self, binary: &str, args: &[String]) -> Result<String> {
        debug!(
            binary,
            args = ?args,
            ns_dir = %self.ns_dir.display(),
            strategy = %self.strategy,
            "Running command in namespace"
        );

        self.command_output(binary, args)?.into_result(binary)
    }

    fn command_output(&self, binary: &str, args: &[String]) -> Result<CommandOutput> {
        match (&self.namespaces, self.strategy) {
            (None, _) => command::run_combined(binary, args, None),
            (Some(namespaces), Strategy::Fork) => command::run_combined(binary, args, Some(namespaces)),
            (Some(_), Strategy::ReExec) => {
                let request = ExecutionRequest::ExternalCommand {
                    binary: binary.to_string(),
                    args: args.to_vec(),
                };
                let frame = reexec::run_in_helper(&self.helper, &self.ns_dir, &request)?;
                ops::decode_command(&frame)
            }
        }
    }

    /// Run `op` inside the namespaces and return its value
    ///
    /// The closure runs in a forked child, so it must stick to the raw
    /// filesystem layer in `hostns_fs` and must not take locks. When
    /// bypassed it runs inline and its value is returned untouched.
    ///
    /// # Errors
    /// Returns [`Error::Remote`] with the closure's error message, or a
    /// transport error from the fork primitive
    pub fn run_operation<T, E, F>(&self, op: F) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
        E: fmt::Display,
        F: FnOnce() -> std::result::Result<T, E>,
    {
        match &self.namespaces {
            None => op().map_err(|e| Error::Remote {
                message: e.to_string(),
            }),
            Some(namespaces) => fork::fork_and_run(Some(namespaces), op),
        }
    }

    /// Run a named operation inside the namespaces
    pub fn run_op(&self, op: NamespaceOp) -> Result<OpOutput> {
        debug!(
            op = op.name(),
            path = %op.path().display(),
            ns_dir = %self.ns_dir.display(),
            strategy = %self.strategy,
            "Running operation in namespace"
        );

        match (&self.namespaces, self.strategy) {
            (None, _) => op.run(),
            (Some(namespaces), Strategy::Fork) => fork::fork_and_run(Some(namespaces), || op.run()),
            (Some(_), Strategy::ReExec) => {
                let frame = reexec::run_in_helper(
                    &self.helper,
                    &self.ns_dir,
                    &ExecutionRequest::Operation(op),
                )?;
                ops::decode_op(&frame)
            }
        }
    }

    /// Read a whole file
    pub fn read_file(&self, path: impl Into<PathBuf>) -> Result<Vec<u8>> {
        self.run_op(NamespaceOp::ReadFile { path: path.into() })?.into_data()
    }

    /// Create or truncate a file with `data`
    pub fn write_file(&self, path: impl Into<PathBuf>, data: &[u8], mode: u32) -> Result<()> {
        self.run_op(NamespaceOp::WriteFile {
            path: path.into(),
            data: data.to_vec(),
            mode,
        })?
        .into_done()
    }

    /// Metadata, following symlinks
    pub fn stat(&self, path: impl Into<PathBuf>) -> Result<FileInfo> {
        self.run_op(NamespaceOp::Stat { path: path.into() })?.into_info()
    }

    /// Metadata of a symlink itself
    pub fn lstat(&self, path: impl Into<PathBuf>) -> Result<FileInfo> {
        self.run_op(NamespaceOp::Lstat { path: path.into() })?.into_info()
    }

    /// Sorted directory listing
    pub fn read_dir(&self, path: impl Into<PathBuf>) -> Result<Vec<DirEntry>> {
        self.run_op(NamespaceOp::ReadDir { path: path.into() })?.into_entries()
    }

    /// Create a directory and its missing parents
    pub fn mkdir_all(&self, path: impl Into<PathBuf>, mode: u32) -> Result<()> {
        self.run_op(NamespaceOp::MkdirAll {
            path: path.into(),
            mode,
        })?
        .into_done()
    }

    /// Remove a file or an empty directory
    pub fn remove(&self, path: impl Into<PathBuf>) -> Result<()> {
        self.run_op(NamespaceOp::Remove { path: path.into() })?.into_done()
    }

    /// Remove a tree; a missing path is success
    pub fn remove_all(&self, path: impl Into<PathBuf>) -> Result<()> {
        self.run_op(NamespaceOp::RemoveAll { path: path.into() })?.into_done()
    }

    /// Check whether a path exists
    pub fn exists(&self, path: impl Into<PathBuf>) -> Result<bool> {
        self.run_op(NamespaceOp::Exists { path: path.into() })?.into_exists()
    }

    /// [`run_command`](Self::run_command) on the blocking thread pool
    pub async fn run_command_async(&self, binary: String, args: Vec<String>) -> Result<String> {
        let executor = self.clone();
        tokio::task::spawn_blocking(move || executor.run_command(&binary, &args)).await?
    }

    /// [`run_op`](Self::run_op) on the blocking thread pool
    pub async fn run_op_async(&self, op: NamespaceOp) -> Result<OpOutput> {
        let executor = self.clone();
        tokio::task::spawn_blocking(move || executor.run_op(op)).await?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_path_bypasses() {
        let executor = NamespaceExecutor::new("").unwrap();
        assert!(executor.is_bypassed());
        assert_eq!(executor.strategy(), Strategy::ReExec);
        assert_eq!(executor.helper(), Path::new(DEFAULT_HELPER));
    }

    #[test]
    fn test_bypass_returns_value_unchanged() {
        let executor = NamespaceExecutor::new("").unwrap();
        let pid = executor
            .run_operation(|| Ok::<_, String>(std::process::id()))
            .unwrap();
        assert_eq!(pid, std::process::id());
    }

    #[test]
    fn test_bypass_error_message() {
        let executor = NamespaceExecutor::new("").unwrap();
        let err = executor.run_operation(|| Err::<(), _>("nope")).unwrap_err();
        assert_eq!(err.to_string(), "nope");
    }

    #[test]
    fn test_builder() {
        let executor = NamespaceExecutor::new("/proc/1/ns")
            .unwrap()
            .with_strategy(Strategy::Fork)
            .with_helper("/usr/bin/hostns");

        assert!(!executor.is_bypassed());
        assert_eq!(executor.namespace_dir(), Path::new("/proc/1/ns"));
        assert_eq!(executor.strategy(), Strategy::Fork);
        assert_eq!(executor.helper(), Path::new("/usr/bin/hostns"));
    }

    #[test]
    fn test_run_command_bypass() {
        let executor = NamespaceExecutor::new("").unwrap();
        let out = executor
            .run_command("/bin/sh", &["-c".to_string(), "echo '  padded  '".to_string()])
            .unwrap();
        assert_eq!(out, "padded");
    }

    #[test]
    fn test_fork_strategy_missing_namespace() {
        let executor = NamespaceExecutor::new("/no/such/ns")
            .unwrap()
            .with_strategy(Strategy::Fork);

        assert!(executor.stat("/").unwrap_err().is_not_found());
        assert!(executor.run_command("/bin/true", &[]).unwrap_err().is_not_found());
        assert!(
            executor
                .run_operation(|| Ok::<_, String>(()))
                .unwrap_err()
                .is_not_found()
        );
    }

    #[tokio::test]
    async fn test_async_wrappers_bypass() {
        let executor = NamespaceExecutor::new("").unwrap();

        let out = executor
            .run_command_async("/bin/echo".to_string(), vec!["async".to_string()])
            .await
            .unwrap();
        assert_eq!(out, "async");

        let exists = executor
            .run_op_async(NamespaceOp::Exists {
                path: PathBuf::from("/"),
            })
            .await
            .unwrap()
            .into_exists()
            .unwrap();
        assert!(exists);
    }
}
