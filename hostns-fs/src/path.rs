//! Byte-level path helpers
//!
//! These work on raw path bytes rather than [`Path`] components because
//! [`Path`] normalizes away trailing `.` and repeated separators, both of
//! which matter for removal semantics.

use std::ffi::{CString, OsStr};
use std::os::unix::ffi::OsStrExt;
use std::path::Path;

use hostns_core::{Error, Result};

/// Convert a path into a C string for the kernel
///
/// # Errors
/// Returns [`Error::InvalidPath`] if the path contains a NUL byte
pub fn to_cstring(path: &Path) -> Result<CString> {
    CString::new(path.as_os_str().as_bytes()).map_err(|_| Error::InvalidPath {
        message: format!("{} contains a NUL byte", path.display()),
    })
}

/// Last element of `path`, ignoring trailing slashes
#[must_use]
pub fn basename(path: &Path) -> String {
    let mut name = path.as_os_str().as_bytes();
    while name.len() > 1 && name.ends_with(b"/") {
        name = &name[..name.len() - 1];
    }
    if let Some(i) = name.iter().rposition(|b| *b == b'/') {
        if i + 1 < name.len() {
            name = &name[i + 1..];
        }
    }
    String::from_utf8_lossy(name).into_owned()
}

/// Whether the final element of `path` is `.`, trailing slashes ignored
#[must_use]
pub fn ends_with_dot(path: &Path) -> bool {
    let mut bytes = path.as_os_str().as_bytes();
    while bytes.len() > 1 && bytes.ends_with(b"/") {
        bytes = &bytes[..bytes.len() - 1];
    }
    bytes == b"." || bytes.ends_with(b"/.")
}

/// Split `path` into the directory that holds its last element and the
/// element itself
///
/// A path without a separator lives in `.`; an element directly under the
/// root lives in `/`. Trailing slashes and repeated leading slashes are
/// dropped first.
#[must_use]
pub fn split_path(path: &Path) -> (&Path, &Path) {
    let mut bytes = path.as_os_str().as_bytes();
    while bytes.starts_with(b"//") {
        bytes = &bytes[1..];
    }
    while bytes.len() > 1 && bytes.ends_with(b"/") {
        bytes = &bytes[..bytes.len() - 1];
    }

    match bytes.iter().rposition(|b| *b == b'/') {
        Some(0) => (Path::new("/"), as_path(&bytes[1..])),
        Some(i) => (as_path(&bytes[..i]), as_path(&bytes[i + 1..])),
        None => (Path::new("."), as_path(bytes)),
    }
}

fn as_path(bytes: &[u8]) -> &Path {
    Path::new(OsStr::from_bytes(bytes))
}
