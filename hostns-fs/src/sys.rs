//! Raw syscall primitives
//!
//! Thin wrappers over the libc syscall stubs. Each one returns the kernel's
//! error code untouched and retries `EINTR`. Descriptors are handed back as
//! [`OwnedFd`] so they are closed on every exit path.
//!
//! This module uses `unsafe` for the FFI calls themselves; every pointer
//! passed to the kernel comes from a live slice, `CStr` or `MaybeUninit`.

#![allow(unsafe_code)]

use std::ffi::CStr;
use std::mem::MaybeUninit;
use std::os::fd::{AsRawFd, BorrowedFd, FromRawFd, IntoRawFd, OwnedFd, RawFd};

use libc::{c_int, mode_t};
use nix::errno::Errno;

/// Run `f` until it fails with something other than `EINTR`
pub fn ignoring_eintr<T, F>(mut f: F) -> nix::Result<T>
where
    F: FnMut() -> nix::Result<T>,
{
    loop {
        match f() {
            Err(Errno::EINTR) => {}
            other => return other,
        }
    }
}

fn dirfd_raw(dirfd: Option<BorrowedFd<'_>>) -> RawFd {
    dirfd.map_or(libc::AT_FDCWD, |fd| fd.as_raw_fd())
}

/// `openat(2)`; `None` means relative to the current directory
///
/// `O_CLOEXEC` and `O_LARGEFILE` are always added.
pub fn openat(
    dirfd: Option<BorrowedFd<'_>>,
    path: &CStr,
    flags: c_int,
    mode: mode_t,
) -> nix::Result<OwnedFd> {
    let dirfd = dirfd_raw(dirfd);
    let flags = flags | libc::O_CLOEXEC | libc::O_LARGEFILE;
    let fd = ignoring_eintr(|| {
        // SAFETY: `path` is NUL-terminated and outlives the call.
        Errno::result(unsafe { libc::openat(dirfd, path.as_ptr(), flags, libc::c_uint::from(mode)) })
    })?;
    // SAFETY: the kernel just returned this descriptor and nothing else owns it.
    Ok(unsafe { OwnedFd::from_raw_fd(fd) })
}

/// `open(2)` relative to the current directory
pub fn open(path: &CStr, flags: c_int, mode: mode_t) -> nix::Result<OwnedFd> {
    openat(None, path, flags, mode)
}

/// `read(2)`; `Ok(0)` is end of stream
pub fn read(fd: BorrowedFd<'_>, buf: &mut [u8]) -> nix::Result<usize> {
    let n = ignoring_eintr(|| {
        // SAFETY: `buf` is valid for writes of `buf.len()` bytes.
        Errno::result(unsafe { libc::read(fd.as_raw_fd(), buf.as_mut_ptr().cast(), buf.len()) })
    })?;
    Ok(n.unsigned_abs())
}

/// `write(2)`; may write fewer bytes than requested
pub fn write(fd: BorrowedFd<'_>, buf: &[u8]) -> nix::Result<usize> {
    let n = ignoring_eintr(|| {
        // SAFETY: `buf` is valid for reads of `buf.len()` bytes.
        Errno::result(unsafe { libc::write(fd.as_raw_fd(), buf.as_ptr().cast(), buf.len()) })
    })?;
    Ok(n.unsigned_abs())
}

/// Write the whole buffer, looping on partial writes
pub fn write_all(fd: BorrowedFd<'_>, mut buf: &[u8]) -> nix::Result<()> {
    while !buf.is_empty() {
        let n = write(fd, buf)?;
        if n == 0 {
            return Err(Errno::EIO);
        }
        buf = &buf[n..];
    }
    Ok(())
}

/// `close(2)`, reporting the kernel's verdict
///
/// Dropping an [`OwnedFd`] also closes it but discards the result. `EINTR`
/// is not retried: on Linux the descriptor is released regardless.
pub fn close(fd: OwnedFd) -> nix::Result<()> {
    let raw = fd.into_raw_fd();
    // SAFETY: `raw` came from an `OwnedFd`, so we are its only owner.
    match Errno::result(unsafe { libc::close(raw) }) {
        Ok(_) | Err(Errno::EINTR) => Ok(()),
        Err(e) => Err(e),
    }
}

/// `fstatat(2)`; `None` means relative to the current directory
pub fn fstatat(
    dirfd: Option<BorrowedFd<'_>>,
    path: &CStr,
    flags: c_int,
) -> nix::Result<libc::stat> {
    let dirfd = dirfd_raw(dirfd);
    ignoring_eintr(|| {
        let mut st = MaybeUninit::<libc::stat>::uninit();
        // SAFETY: `st` has room for a `struct stat`; `path` is NUL-terminated.
        Errno::result(unsafe { libc::fstatat(dirfd, path.as_ptr(), st.as_mut_ptr(), flags) })?;
        // SAFETY: fstatat succeeded, so the kernel filled `st`.
        Ok(unsafe { st.assume_init() })
    })
}

/// `mkdir(2)`
pub fn mkdir(path: &CStr, mode: mode_t) -> nix::Result<()> {
    ignoring_eintr(|| {
        // SAFETY: `path` is NUL-terminated.
        Errno::result(unsafe { libc::mkdir(path.as_ptr(), mode) }).map(drop)
    })
}

/// `unlinkat(2)`; pass `libc::AT_REMOVEDIR` to remove a directory
pub fn unlinkat(dirfd: Option<BorrowedFd<'_>>, path: &CStr, flags: c_int) -> nix::Result<()> {
    let dirfd = dirfd_raw(dirfd);
    ignoring_eintr(|| {
        // SAFETY: `path` is NUL-terminated.
        Errno::result(unsafe { libc::unlinkat(dirfd, path.as_ptr(), flags) }).map(drop)
    })
}

/// `getdents64(2)`; fills `buf` with `linux_dirent64` records, `Ok(0)` at end
pub fn getdents64(fd: BorrowedFd<'_>, buf: &mut [u8]) -> nix::Result<usize> {
    let n = ignoring_eintr(|| {
        // SAFETY: `buf` is valid for writes of `buf.len()` bytes.
        Errno::result(unsafe {
            libc::syscall(
                libc::SYS_getdents64,
                fd.as_raw_fd(),
                buf.as_mut_ptr(),
                buf.len(),
            )
        })
    })?;
    Ok(usize::try_from(n).unwrap_or(0))
}

/// `setns(2)`: move the calling thread into the namespace behind `fd`
pub fn setns(fd: BorrowedFd<'_>, nstype: c_int) -> nix::Result<()> {
    ignoring_eintr(|| {
        // SAFETY: plain syscall on a borrowed descriptor.
        Errno::result(unsafe { libc::setns(fd.as_raw_fd(), nstype) }).map(drop)
    })
}

/// `pipe2(2)` with `O_CLOEXEC`; returns `(read end, write end)`
pub fn pipe() -> nix::Result<(OwnedFd, OwnedFd)> {
    let mut fds = [0 as c_int; 2];
    // SAFETY: `fds` has room for the two descriptors.
    Errno::result(unsafe { libc::pipe2(fds.as_mut_ptr(), libc::O_CLOEXEC) })?;
    // SAFETY: both descriptors were just created and are owned by nobody else.
    Ok(unsafe { (OwnedFd::from_raw_fd(fds[0]), OwnedFd::from_raw_fd(fds[1])) })
}

/// `_exit(2)`: terminate at once
///
/// No destructors, no atexit handlers, no stdio flushing. The only way a
/// forked child may leave.
pub fn exit_immediately(code: c_int) -> ! {
    // SAFETY: `_exit` has no preconditions.
    unsafe { libc::_exit(code) }
}
