//! Directory creation

use std::path::Path;

use hostns_core::{Error, Result};
use nix::errno::Errno;

use crate::path::to_cstring;
use crate::stat::{lstat, stat};
use crate::sys;

/// Create one directory with `mode`
///
/// `mode` may carry setuid/setgid/sticky bits in addition to the permission
/// bits; the process umask still applies.
pub fn mkdir(path: impl AsRef<Path>, mode: u32) -> Result<()> {
    let path = path.as_ref();
    let raw = to_cstring(path)?;
    sys::mkdir(&raw, mode).map_err(|e| Error::fs("mkdir", path, e))
}

/// Create `path` and any missing ancestors
///
/// An existing directory is success; an existing non-directory fails with
/// `ENOTDIR`.
pub fn mkdir_all(path: impl AsRef<Path>, mode: u32) -> Result<()> {
    let path = path.as_ref();

    match stat(path) {
        Ok(info) if info.is_dir() => return Ok(()),
        Ok(_) => return Err(Error::fs("mkdir", path, Errno::ENOTDIR)),
        Err(_) => {}
    }

    if let Some(parent) = parent_of(path) {
        mkdir_all(parent, mode)?;
    }

    match mkdir(path, mode) {
        Ok(()) => Ok(()),
        // Covers `foo/.` and a concurrent mkdir of the same path.
        Err(e) => match lstat(path) {
            Ok(info) if info.is_dir() => Ok(()),
            _ => Err(e),
        },
    }
}

/// Everything before the last element, or `None` at the top
fn parent_of(path: &Path) -> Option<&Path> {
    use std::os::unix::ffi::OsStrExt;

    let bytes = path.as_os_str().as_bytes();
    let mut end = bytes.len();
    while end > 0 && bytes[end - 1] == b'/' {
        end -= 1;
    }
    while end > 0 && bytes[end - 1] != b'/' {
        end -= 1;
    }
    // `end` now sits just past the separator before the last element.
    if end > 1 {
        Some(Path::new(std::ffi::OsStr::from_bytes(&bytes[..end - 1])))
    } else {
        None
    }
}
