//! Whole-file read and write

use std::os::fd::AsFd;
use std::path::Path;

use hostns_core::{Error, Result};

use crate::path::to_cstring;
use crate::sys;

const INITIAL_READ_SIZE: usize = 4096;

/// Read the whole file at `path`
///
/// The buffer starts at 4 KiB and doubles whenever it fills; a zero-length
/// read is end of file.
pub fn read_file(path: impl AsRef<Path>) -> Result<Vec<u8>> {
    let path = path.as_ref();
    let raw = to_cstring(path)?;
    let fd = sys::open(&raw, libc::O_RDONLY, 0).map_err(|e| Error::fs("open", path, e))?;

    let mut data = vec![0u8; INITIAL_READ_SIZE];
    let mut filled = 0;
    loop {
        if filled == data.len() {
            data.resize(data.len() * 2, 0);
        }
        let n = sys::read(fd.as_fd(), &mut data[filled..]).map_err(|e| Error::fs("read", path, e))?;
        if n == 0 {
            break;
        }
        filled += n;
    }

    data.truncate(filled);
    Ok(data)
}

/// Write `data` to `path`, creating it with `mode` or truncating it
pub fn write_file(path: impl AsRef<Path>, data: &[u8], mode: u32) -> Result<()> {
    let path = path.as_ref();
    let raw = to_cstring(path)?;
    let fd = sys::open(&raw, libc::O_WRONLY | libc::O_CREAT | libc::O_TRUNC, mode)
        .map_err(|e| Error::fs("open", path, e))?;

    sys::write_all(fd.as_fd(), data).map_err(|e| Error::fs("write", path, e))?;
    sys::close(fd).map_err(|e| Error::fs("close", path, e))
}
