//! One-shot namespace child started by re-executing a helper binary
//!
//! A freshly exec'd process is single threaded and owns a clean heap, so it
//! can switch namespaces and run ordinary Rust code without the restrictions
//! that apply after fork.
//!
//! ```text
//! <helper> __hostns-child <namespace-dir>
//!   stdin:  ExecutionRequest as JSON, until EOF
//!   stdout: exactly one result frame
//! ```
//!
//! An empty namespace directory runs the request without switching.
//! Binaries that serve as helpers call [`maybe_run_child`] before anything
//! else in `main`.

use std::ffi::OsStr;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use bytes::Bytes;
use hostns_core::frame::read_frame;
use hostns_core::{Error, ExecutionResult, Result};
use tracing::{debug, warn};

use crate::config::NamespaceSet;
use crate::ops::ExecutionRequest;

/// Mode argument that selects the child role
pub const CHILD_ARG: &str = "__hostns-child";

/// Default helper: the running executable
pub const DEFAULT_HELPER: &str = "/proc/self/exe";

/// Serve a request and exit if this process was started as a namespace
/// child; return otherwise
pub fn maybe_run_child() {
    let mut args = std::env::args_os().skip(1);
    if args.next().as_deref() != Some(OsStr::new(CHILD_ARG)) {
        return;
    }
    let ns_dir = PathBuf::from(args.next().unwrap_or_default());
    std::process::exit(run_child(&ns_dir));
}

/// Child role: read the request from stdin, answer on stdout
///
/// Returns the process exit code. Every failure that can be described is
/// written as an `err:` frame and still exits 0; a non-zero code means the
/// frame itself could not be written.
#[must_use]
pub fn run_child(ns_dir: &Path) -> i32 {
    let frame = serve(ns_dir, &mut io::stdin().lock());

    let mut stdout = io::stdout().lock();
    match stdout.write_all(&frame).and_then(|()| stdout.flush()) {
        Ok(()) => 0,
        Err(_) => 1,
    }
}

fn serve(ns_dir: &Path, input: &mut impl Read) -> Bytes {
    let request = match read_request(input) {
        Ok(request) => request,
        Err(e) => return failure(&e),
    };

    if !ns_dir.as_os_str().is_empty() {
        let entered = NamespaceSet::from_dir(ns_dir)
            .resolve()
            .and_then(|resolved| resolved.enter().map_err(Error::from));
        if let Err(e) = entered {
            return failure(&e);
        }
    }

    request.execute()
}

fn read_request(input: &mut impl Read) -> Result<ExecutionRequest> {
    let mut payload = Vec::new();
    input.read_to_end(&mut payload)?;
    Ok(serde_json::from_slice(&payload)?)
}

fn failure(err: &Error) -> Bytes {
    ExecutionResult::<()>::Failure(err.to_string()).encode()
}

/// Parent role: run `request` in a child of `helper` and return its raw frame
///
/// The child is always reaped before this returns.
pub(crate) fn run_in_helper(helper: &Path, ns_dir: &Path, request: &ExecutionRequest) -> Result<Vec<u8>> {
    let payload = serde_json::to_vec(request)?;

    let mut child = Command::new(helper)
        .arg(CHILD_ARG)
        .arg(ns_dir)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::inherit())
        .spawn()?;
    debug!(
        helper = %helper.display(),
        child = child.id(),
        request = %request.describe(),
        "Spawned namespace helper"
    );

    // The child reads all of stdin before it writes anything, so there is
    // no need to interleave. A child that exits early closes the pipe; its
    // frame (or the lack of one) tells what happened.
    if let Some(mut stdin) = child.stdin.take() {
        if let Err(e) = stdin.write_all(&payload) {
            if e.kind() != io::ErrorKind::BrokenPipe {
                let _ = child.kill();
                let _ = child.wait();
                return Err(e.into());
            }
        }
    }

    let frame = match child.stdout.take() {
        Some(mut stdout) => read_frame(|buf| stdout.read(buf).map_err(Error::from)),
        None => Ok(Vec::new()),
    };

    let status = child.wait()?;
    if !status.success() {
        warn!(helper = %helper.display(), status = %status, "Namespace helper exited abnormally");
    }

    frame
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::{NamespaceOp, decode_command, decode_op};

    fn encode(request: &ExecutionRequest) -> Vec<u8> {
        serde_json::to_vec(request).unwrap()
    }

    #[test]
    fn test_serve_without_switch() {
        let dir = tempfile::tempdir().unwrap();
        hostns_fs::write_file(dir.path().join("hostname"), b"node-7\n", 0o644).unwrap();

        let request = ExecutionRequest::Operation(NamespaceOp::ReadFile {
            path: dir.path().join("hostname"),
        });
        let frame = serve(Path::new(""), &mut encode(&request).as_slice());

        let data = decode_op(&frame).unwrap().into_data().unwrap();
        assert_eq!(data, b"node-7\n");
    }

    #[test]
    fn test_serve_command() {
        let request = ExecutionRequest::ExternalCommand {
            binary: "/bin/sh".to_string(),
            args: vec!["-c".to_string(), "printf out; printf err >&2".to_string()],
        };
        let frame = serve(Path::new(""), &mut encode(&request).as_slice());

        let output = decode_command(&frame).unwrap();
        assert_eq!(output.output, "outerr");
    }

    #[test]
    fn test_serve_garbage_request() {
        let frame = serve(Path::new(""), &mut b"not json".as_slice());
        assert!(frame.starts_with(b"err:"));
        assert_eq!(frame.last(), Some(&0));
    }

    #[test]
    fn test_serve_missing_namespace_dir() {
        let request = ExecutionRequest::Operation(NamespaceOp::Exists {
            path: PathBuf::from("/"),
        });
        let frame = serve(Path::new("/no/such/ns"), &mut encode(&request).as_slice());

        let err = decode_op(&frame).unwrap_err();
        assert!(err.is_not_found());
        assert!(err.to_string().contains("mnt"));
    }

    #[test]
    fn test_helper_that_is_not_a_child() {
        // `/bin/true` ignores the protocol and prints nothing.
        let request = ExecutionRequest::Operation(NamespaceOp::Exists {
            path: PathBuf::from("/"),
        });
        let frame = run_in_helper(Path::new("/bin/true"), Path::new(""), &request).unwrap();
        let err = decode_op(&frame).unwrap_err();
        assert!(matches!(err, Error::UnexpectedResponse { .. }));
    }

    #[test]
    fn test_missing_helper() {
        let request = ExecutionRequest::Operation(NamespaceOp::Exists {
            path: PathBuf::from("/"),
        });
        let err = run_in_helper(Path::new("/no/such/helper"), Path::new(""), &request).unwrap_err();
        assert!(err.is_not_found());
    }
}
