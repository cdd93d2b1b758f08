//! Directory enumeration over `getdents64(2)`

use std::ffi::OsStr;
use std::os::fd::{AsFd, BorrowedFd};
use std::os::unix::ffi::OsStrExt;
use std::path::Path;

use hostns_core::{Error, Result};
use nix::errno::Errno;
use serde::{Deserialize, Serialize};

use crate::path::to_cstring;
use crate::stat::{FileType, lstat};
use crate::sys;

/// Size of the buffer handed to `getdents64`
const DIRENT_BUF_SIZE: usize = 8192;

// Field offsets inside a `struct linux_dirent64` record
const D_INO: usize = 0;
const D_RECLEN: usize = 16;
const D_TYPE: usize = 18;
const D_NAME: usize = 19;

/// One entry of a directory listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirEntry {
    /// Entry name; bytes that are not UTF-8 are replaced
    pub name: String,
    /// Kind of object
    pub file_type: FileType,
}

impl DirEntry {
    /// Check if this entry is a directory
    #[must_use]
    pub fn is_dir(&self) -> bool {
        self.file_type == FileType::Directory
    }
}

/// A directory record as the kernel reported it
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RawEntry {
    pub name: Vec<u8>,
    pub d_type: u8,
}

/// Incremental reader over an open directory descriptor
pub(crate) struct DirReader<'fd> {
    fd: BorrowedFd<'fd>,
    buf: Vec<u8>,
    len: usize,
    pos: usize,
    done: bool,
}

impl<'fd> DirReader<'fd> {
    pub fn new(fd: BorrowedFd<'fd>) -> Self {
        Self {
            fd,
            buf: vec![0; DIRENT_BUF_SIZE],
            len: 0,
            pos: 0,
            done: false,
        }
    }

    /// Up to `limit` further entries, skipping `.`, `..` and empty slots
    ///
    /// Fewer than `limit` entries means the end of the directory was reached.
    pub fn next_batch(&mut self, limit: usize) -> nix::Result<Vec<RawEntry>> {
        let mut entries = Vec::new();

        while entries.len() < limit && !self.done {
            if self.pos >= self.len {
                self.pos = 0;
                self.len = sys::getdents64(self.fd, &mut self.buf)?;
                if self.len == 0 {
                    self.done = true;
                    break;
                }
            }

            match decode_record(&self.buf[self.pos..self.len]) {
                Some((reclen, entry)) => {
                    self.pos += reclen;
                    if let Some(entry) = entry {
                        entries.push(entry);
                    }
                }
                None => {
                    // Truncated record; nothing sensible follows it.
                    self.done = true;
                }
            }
        }

        Ok(entries)
    }
}

/// Decode the record at the start of `buf`
///
/// Returns the record length and the entry, or `None` for the entry when the
/// record is a deleted slot or `.`/`..`. Returns `None` overall when `buf`
/// does not hold a complete record.
fn decode_record(buf: &[u8]) -> Option<(usize, Option<RawEntry>)> {
    let reclen = usize::from(u16::from_ne_bytes(
        buf.get(D_RECLEN..D_RECLEN + 2)?.try_into().ok()?,
    ));
    if reclen <= D_NAME || reclen > buf.len() {
        return None;
    }
    let rec = &buf[..reclen];

    let ino = u64::from_ne_bytes(rec.get(D_INO..D_INO + 8)?.try_into().ok()?);
    if ino == 0 {
        return Some((reclen, None));
    }

    let mut name = &rec[D_NAME..];
    if let Some(nul) = name.iter().position(|b| *b == 0) {
        name = &name[..nul];
    }
    if name == b"." || name == b".." {
        return Some((reclen, None));
    }

    Some((
        reclen,
        Some(RawEntry {
            name: name.to_vec(),
            d_type: rec[D_TYPE],
        }),
    ))
}

/// Entries of the directory at `path`, sorted by name
///
/// `.` and `..` are left out. When the filesystem does not report entry
/// types, the type comes from `lstat`; entries that disappear before that
/// `lstat` are skipped.
pub fn read_dir(path: impl AsRef<Path>) -> Result<Vec<DirEntry>> {
    let path = path.as_ref();
    let raw = to_cstring(path)?;
    let fd = sys::open(&raw, libc::O_RDONLY | libc::O_DIRECTORY, 0)
        .map_err(|e| Error::fs("open", path, e))?;

    let records = DirReader::new(fd.as_fd())
        .next_batch(usize::MAX)
        .map_err(|e| Error::fs("readdirent", path, e))?;
    drop(fd);

    let mut entries = Vec::with_capacity(records.len());
    for record in records {
        let file_type = match FileType::from_dirent(record.d_type) {
            Some(file_type) => file_type,
            None => match lstat(path.join(OsStr::from_bytes(&record.name))) {
                Ok(info) => info.file_type,
                Err(e) if e.errno() == Some(Errno::ENOENT) => continue,
                Err(e) => return Err(e),
            },
        };
        entries.push(DirEntry {
            name: String::from_utf8_lossy(&record.name).into_owned(),
            file_type,
        });
    }

    entries.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(entries)
}
