//! External commands with combined output
//!
//! The namespace switch runs in the spawned child between fork and exec, so
//! the parent never forks on its own and std keeps ownership of exec error
//! reporting.

#![allow(unsafe_code)]

use std::fs::File;
use std::io::Read;
use std::os::unix::process::CommandExt;
use std::process::{Command, Stdio};

use hostns_core::{Error, Result};
use hostns_fs::sys;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::switch::ResolvedNamespaces;

/// Exit code and interleaved stdout/stderr of a finished command
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandOutput {
    /// Exit code, `None` when the command was killed by a signal
    pub status: Option<i32>,

    /// Stdout and stderr in the order they were written
    pub output: String,
}

impl CommandOutput {
    /// Check whether the command exited with code 0
    #[must_use]
    pub const fn success(&self) -> bool {
        matches!(self.status, Some(0))
    }

    /// Trimmed output on success
    ///
    /// # Errors
    /// Returns [`Error::CommandFailed`] carrying the trimmed output when the
    /// command did not exit with code 0
    pub fn into_result(self, binary: &str) -> Result<String> {
        let output = self.output.trim().to_string();
        if self.success() {
            Ok(output)
        } else {
            Err(Error::CommandFailed {
                binary: binary.to_string(),
                code: self.status,
                output,
            })
        }
    }
}

/// Run `binary` with `args`, entering `namespaces` first when set
///
/// Both output streams go to the same pipe. Stdin is `/dev/null`.
///
/// # Errors
/// - [`Error::Io`] when the pipe cannot be set up, the namespace switch
///   fails or the binary cannot be executed
pub fn run_combined(
    binary: &str,
    args: &[String],
    namespaces: Option<&ResolvedNamespaces>,
) -> Result<CommandOutput> {
    let (rx, tx) = sys::pipe()?;

    let mut command = Command::new(binary);
    command
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::from(tx.try_clone()?))
        .stderr(Stdio::from(tx));

    if let Some(namespaces) = namespaces {
        let namespaces = namespaces.clone();
        // SAFETY: the hook only issues open, setns and close on C strings
        // that were built before spawning; it neither allocates nor locks.
        unsafe {
            command.pre_exec(move || namespaces.enter().map_err(Into::into));
        }
    }

    let mut child = command.spawn()?;
    // The command still holds our copies of the write end.
    drop(command);

    let mut raw = Vec::new();
    let read = File::from(rx).read_to_end(&mut raw);
    let status = child.wait()?;
    read?;

    debug!(binary, status = ?status.code(), bytes = raw.len(), "Command finished");

    Ok(CommandOutput {
        status: status.code(),
        output: String::from_utf8_lossy(&raw).into_owned(),
    })
}
