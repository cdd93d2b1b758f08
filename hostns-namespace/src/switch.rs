//! The namespace switch itself
//!
//! [`ResolvedNamespaces::enter`] runs in places where allocation and locking
//! are off limits: a forked child of a threaded process and a pre-exec hook.
//! It only issues `open`, `setns` and `close` on C strings prepared earlier,
//! and its error type is `Copy`.

use std::ffi::{CStr, CString};
use std::fmt;
use std::os::fd::AsFd;

use hostns_fs::sys;
use nix::errno::Errno;

use crate::config::NamespaceKind;

/// A [`NamespaceSet`](crate::NamespaceSet) with its paths already converted
/// to C strings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedNamespaces {
    mount: CString,
    net: Option<CString>,
}

/// Which step of a switch failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwitchError {
    /// Namespace being entered
    pub kind: NamespaceKind,
    /// `open`, `setns` or `close`
    pub step: &'static str,
    /// Kernel error code
    pub errno: Errno,
}

impl fmt::Display for SwitchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "failed to {} {} namespace: {}",
            self.step, self.kind, self.errno
        )
    }
}

impl std::error::Error for SwitchError {}

impl From<SwitchError> for std::io::Error {
    fn from(err: SwitchError) -> Self {
        Self::from_raw_os_error(err.errno as i32)
    }
}

impl From<SwitchError> for hostns_core::Error {
    fn from(err: SwitchError) -> Self {
        Self::Namespace {
            message: err.to_string(),
        }
    }
}

impl ResolvedNamespaces {
    pub(crate) const fn new(mount: CString, net: Option<CString>) -> Self {
        Self { mount, net }
    }

    /// Mount namespace file
    #[must_use]
    pub fn mount(&self) -> &CStr {
        &self.mount
    }

    /// Network namespace file, if one is switched
    #[must_use]
    pub fn net(&self) -> Option<&CStr> {
        self.net.as_deref()
    }

    /// Move the calling thread into the mount namespace, then the network
    /// namespace
    ///
    /// The mount namespace file must exist. A missing network namespace
    /// file means there is nothing to switch. The kernel refuses to change
    /// the mount namespace of a thread that shares its filesystem context,
    /// so this only succeeds in a single-threaded process.
    ///
    /// # Errors
    /// Returns the first failing step
    pub fn enter(&self) -> Result<(), SwitchError> {
        enter_one(&self.mount, NamespaceKind::Mount, false)?;
        if let Some(net) = &self.net {
            enter_one(net, NamespaceKind::Net, true)?;
        }
        Ok(())
    }
}

fn enter_one(path: &CStr, kind: NamespaceKind, optional: bool) -> Result<(), SwitchError> {
    let fail = |step, errno| SwitchError { kind, step, errno };

    let fd = match sys::open(path, libc::O_RDONLY, 0) {
        Ok(fd) => fd,
        Err(Errno::ENOENT) if optional => return Ok(()),
        Err(e) => return Err(fail("open", e)),
    };
    sys::setns(fd.as_fd(), kind.clone_flag()).map_err(|e| fail("setns", e))?;
    sys::close(fd).map_err(|e| fail("close", e))
}
