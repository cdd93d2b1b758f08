//! Single and recursive removal

use std::ffi::{CStr, CString, OsStr};
use std::os::fd::{AsFd, BorrowedFd};
use std::os::unix::ffi::OsStrExt;
use std::path::Path;

use hostns_core::{Error, Result};
use nix::errno::Errno;

use crate::dir::DirReader;
use crate::path::{ends_with_dot, split_path, to_cstring};
use crate::sys;

/// Number of entries enumerated per pass over a directory being emptied
const REMOVE_BATCH: usize = 1024;

/// Remove a file, symlink or empty directory
///
/// Both `unlink` and `rmdir` are attempted. When both fail the `rmdir`
/// error is reported, unless it is `ENOTDIR`: `rmdir` on a non-directory
/// always says that, so the `unlink` error is the meaningful one.
pub fn remove(path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let raw = to_cstring(path)?;

    let Err(unlink_err) = sys::unlinkat(None, &raw, 0) else {
        return Ok(());
    };
    let Err(rmdir_err) = sys::unlinkat(None, &raw, libc::AT_REMOVEDIR) else {
        return Ok(());
    };

    let err = if rmdir_err == Errno::ENOTDIR {
        unlink_err
    } else {
        rmdir_err
    };
    Err(Error::fs("remove", path, err))
}

/// Remove `path` and everything below it
///
/// Removing something that is already gone is success, at the top and at
/// every level below, so a concurrent remover never causes a failure as
/// long as the end state is "absent". Symlinks are removed, never followed.
/// All entries are attempted; the first error met is returned.
///
/// A path whose last element is `.` is rejected with `EINVAL`, as `rmdir`
/// would.
pub fn remove_all(path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    if path.as_os_str().is_empty() {
        return Ok(());
    }
    if ends_with_dot(path) {
        return Err(Error::fs("remove_all", path, Errno::EINVAL));
    }

    match remove(path) {
        Ok(()) => return Ok(()),
        Err(e) if e.errno() == Some(Errno::ENOENT) => return Ok(()),
        Err(_) => {}
    }

    let (parent, base) = split_path(path);
    let parent_raw = to_cstring(parent)?;
    let parent_fd = match sys::open(&parent_raw, libc::O_RDONLY | libc::O_DIRECTORY, 0) {
        Ok(fd) => fd,
        Err(Errno::ENOENT) => return Ok(()),
        Err(e) => return Err(Error::fs("open", parent, e)),
    };

    let base_raw = to_cstring(base)?;
    remove_all_from(parent_fd.as_fd(), &base_raw).map_err(|e| under(parent, e))
}

/// Remove `base`, relative to the open directory `parent`
///
/// Everything is addressed through descriptors, so a directory swapped for a
/// symlink half way through cannot redirect the removal.
fn remove_all_from(parent: BorrowedFd<'_>, base: &CStr) -> Result<()> {
    let base_path = Path::new(OsStr::from_bytes(base.to_bytes()));

    let unlink_err = match sys::unlinkat(Some(parent), base, 0) {
        Ok(()) | Err(Errno::ENOENT) => return Ok(()),
        Err(e) => e,
    };

    // EISDIR means a directory that needs emptying first. EPERM and EACCES
    // may hide a directory too (unlink of a directory gives EPERM on some
    // filesystems), so look before giving up.
    if !matches!(unlink_err, Errno::EISDIR | Errno::EPERM | Errno::EACCES) {
        return Err(Error::fs("unlinkat", base_path, unlink_err));
    }

    let st = match sys::fstatat(Some(parent), base, libc::AT_SYMLINK_NOFOLLOW) {
        Ok(st) => st,
        Err(Errno::ENOENT) => return Ok(()),
        Err(e) => return Err(Error::fs("fstatat", base_path, e)),
    };
    if st.st_mode & libc::S_IFMT != libc::S_IFDIR {
        return Err(Error::fs("unlinkat", base_path, unlink_err));
    }

    let mut first_err = None;
    loop {
        let dir = match sys::openat(
            Some(parent),
            base,
            libc::O_RDONLY | libc::O_DIRECTORY | libc::O_NOFOLLOW,
            0,
        ) {
            Ok(fd) => fd,
            Err(Errno::ENOENT) => return Ok(()),
            Err(e) => {
                first_err = Some(Error::fs("openfdat", base_path, e));
                break;
            }
        };

        let mut reader = DirReader::new(dir.as_fd());
        let mut batch_len;
        loop {
            let batch = match reader.next_batch(REMOVE_BATCH) {
                Ok(batch) => batch,
                Err(Errno::ENOENT) => return Ok(()),
                Err(e) => return Err(Error::fs("readdirent", base_path, e)),
            };
            batch_len = batch.len();

            let mut failed = 0;
            for entry in batch {
                let Ok(name) = CString::new(entry.name) else {
                    continue;
                };
                if let Err(e) = remove_all_from(dir.as_fd(), &name) {
                    failed += 1;
                    first_err.get_or_insert_with(|| under(base_path, e));
                }
            }

            // A full batch that failed entirely would be read again after
            // reopening; move past it on the same descriptor instead.
            if failed != REMOVE_BATCH {
                break;
            }
        }

        if batch_len < REMOVE_BATCH {
            break;
        }
    }

    match sys::unlinkat(Some(parent), base, libc::AT_REMOVEDIR) {
        Ok(()) | Err(Errno::ENOENT) => Ok(()),
        Err(e) => Err(first_err.unwrap_or_else(|| Error::fs("unlinkat", base_path, e))),
    }
}

/// Prefix the path of a filesystem error with `dir`
fn under(dir: &Path, err: Error) -> Error {
    match err {
        Error::Fs { op, path, source } => Error::Fs {
            op,
            path: dir.join(path),
            source,
        },
        other => other,
    }
}
