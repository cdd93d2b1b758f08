//! Fork, switch namespaces in the child, run a closure, ship back the result
//!
//! This module uses `unsafe` for fork(). After fork in a threaded process
//! the child may only do async-signal-safe work until it leaves; the child
//! here restricts itself to the raw syscalls in `hostns_fs::sys`, the
//! caller's closure and JSON encoding, and it leaves through `_exit`.

#![allow(unsafe_code)]

use std::any::Any;
use std::fmt;
use std::os::fd::{AsFd, OwnedFd};
use std::panic::{AssertUnwindSafe, catch_unwind};

use hostns_core::frame::read_frame;
use hostns_core::{Error, ExecutionResult, Result};
use hostns_fs::sys;
use nix::errno::Errno;
use nix::sys::wait::{WaitStatus, waitpid};
use nix::unistd::{ForkResult, Pid, fork};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, error, warn};

use crate::config::NamespaceSet;
use crate::switch::ResolvedNamespaces;

/// Run `op` in a forked child that has entered `namespaces`
///
/// The child switches the mount namespace, then the network namespace if
/// its file exists, runs `op`, and reports the outcome as one frame. The
/// parent blocks until the frame has arrived and the child is reaped.
///
/// A failure returned by `op`, a failed switch and a panic in `op` all come
/// back as [`Error::Remote`] carrying the child's message.
///
/// # Errors
/// - [`Error::InvalidPath`] if a namespace path holds a NUL byte (no fork)
/// - [`Error::System`] if the pipe or fork fails
/// - [`Error::Remote`] for failures inside the child
/// - [`Error::UnexpectedResponse`] for a malformed or missing frame
pub fn fork_and_switch<T, E, F>(namespaces: &NamespaceSet, op: F) -> Result<T>
where
    T: Serialize + DeserializeOwned,
    E: fmt::Display,
    F: FnOnce() -> std::result::Result<T, E>,
{
    let resolved = namespaces.resolve()?;
    fork_and_run(Some(&resolved), op)
}

/// Fork and run `op` in the child, switching first when `namespaces` is set
pub(crate) fn fork_and_run<T, E, F>(namespaces: Option<&ResolvedNamespaces>, op: F) -> Result<T>
where
    T: Serialize + DeserializeOwned,
    E: fmt::Display,
    F: FnOnce() -> std::result::Result<T, E>,
{
    let (rx, tx) = sys::pipe()?;

    // SAFETY: the child only runs `child_process`, which never returns and
    // never touches locks held by other threads of the parent.
    match unsafe { fork() }? {
        ForkResult::Parent { child } => {
            drop(tx);
            debug!(child = %child, "Forked namespace child");
            parent_process(child, rx)
        }
        ForkResult::Child => {
            drop(rx);
            child_process(namespaces, op, tx)
        }
    }
}

/// Parent side: collect the frame, reap, decode
fn parent_process<T: DeserializeOwned>(child: Pid, rx: OwnedFd) -> Result<T> {
    let frame = read_frame(|buf| sys::read(rx.as_fd(), buf).map_err(Error::from));
    drop(rx);

    // Reap before looking at the frame so no error path leaves a zombie.
    if let Err(e) = reap(child) {
        error!(child = %child, error = %e, "Wait for namespace child failed");
    }

    let frame = frame?;
    let result = ExecutionResult::<T>::decode(&frame)?;
    debug!(
        child = %child,
        bytes = frame.len(),
        success = result.is_success(),
        "Received result frame"
    );
    result.into_result()
}

/// Wait for `child` to terminate
fn reap(child: Pid) -> Result<()> {
    loop {
        match waitpid(child, None) {
            Ok(WaitStatus::Exited(_, 0)) => return Ok(()),
            Ok(WaitStatus::Exited(_, code)) => {
                warn!(child = %child, code, "Namespace child exited with non-zero code");
                return Ok(());
            }
            Ok(WaitStatus::Signaled(_, signal, _)) => {
                warn!(child = %child, signal = ?signal, "Namespace child killed by signal");
                return Ok(());
            }
            Ok(status) => {
                debug!(child = %child, status = ?status, "Namespace child changed state");
            }
            Err(Errno::EINTR) => {}
            Err(Errno::ECHILD) => {
                warn!(child = %child, "Namespace child already reaped");
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        }
    }
}

/// Child side: switch, run, write one frame, `_exit`
fn child_process<T, E, F>(namespaces: Option<&ResolvedNamespaces>, op: F, tx: OwnedFd) -> !
where
    T: Serialize,
    E: fmt::Display,
    F: FnOnce() -> std::result::Result<T, E>,
{
    let result = match namespaces.map_or(Ok(()), ResolvedNamespaces::enter) {
        Ok(()) => run_guarded(op),
        Err(e) => ExecutionResult::Failure(e.to_string()),
    };

    let frame = result.encode();
    let code = match sys::write_all(tx.as_fd(), &frame).and_then(|()| sys::close(tx)) {
        Ok(()) => 0,
        Err(_) => 1,
    };
    sys::exit_immediately(code)
}

/// Run `op`, turning a panic into a failure
fn run_guarded<T, E, F>(op: F) -> ExecutionResult<T>
where
    E: fmt::Display,
    F: FnOnce() -> std::result::Result<T, E>,
{
    match catch_unwind(AssertUnwindSafe(op)) {
        Ok(result) => ExecutionResult::from_result(result),
        Err(payload) => ExecutionResult::Failure(format!(
            "operation panicked: {}",
            panic_message(payload.as_ref())
        )),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic payload")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_round_trip() {
        let value = fork_and_run(None, || Ok::<_, String>(vec!["a".to_string(), "b".to_string()])).unwrap();
        assert_eq!(value, ["a", "b"]);
    }

    #[test]
    fn test_child_error_comes_back() {
        let err = fork_and_run(None, || Err::<u32, _>("disk on fire")).unwrap_err();
        assert!(matches!(&err, Error::Remote { message } if message == "disk on fire"));
    }

    #[test]
    fn test_child_runs_in_other_process() {
        let parent = std::process::id();
        let child = fork_and_run(None, || Ok::<_, String>(std::process::id())).unwrap();
        assert_ne!(parent, child);
    }

    #[test]
    fn test_missing_mount_namespace() {
        let resolved = NamespaceSet::from_dir("/no/such/ns").resolve().unwrap();
        let err = fork_and_run(Some(&resolved), || Ok::<_, String>(1)).unwrap_err();

        assert!(err.is_not_found());
        assert!(err.to_string().contains("mnt"));
    }

    #[test]
    fn test_invalid_path_does_not_fork() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let set = NamespaceSet::new(std::path::Path::new(OsStr::from_bytes(b"/bad\0path")));
        let err = fork_and_switch(&set, || -> std::result::Result<(), String> {
            unreachable!("closure must not run")
        })
        .unwrap_err();
        assert!(matches!(err, Error::InvalidPath { .. }));
    }

    #[test]
    fn test_panic_message() {
        let payload: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(payload.as_ref()), "boom");
        let payload: Box<dyn Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(payload.as_ref()), "bang");
        let payload: Box<dyn Any + Send> = Box::new(42);
        assert_eq!(panic_message(payload.as_ref()), "unknown panic payload");
    }

    #[test]
    fn test_run_guarded_catches_panic() {
        let result = run_guarded(|| -> std::result::Result<u8, String> { panic!("kaboom") });
        assert_eq!(
            result,
            ExecutionResult::Failure("operation panicked: kaboom".to_string())
        );
    }
}
