//! File status decoding

use std::path::Path;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use hostns_core::{Error, Result};
use nix::errno::Errno;
use serde::{Deserialize, Serialize};

use crate::path::{basename, to_cstring};
use crate::sys;

/// Kind of filesystem object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileType {
    /// Regular file
    Regular,
    /// Directory
    Directory,
    /// Symbolic link
    Symlink,
    /// Character device
    CharDevice,
    /// Block device
    BlockDevice,
    /// Named pipe
    Fifo,
    /// Unix domain socket
    Socket,
}

impl FileType {
    /// Decode the `S_IFMT` bits of a raw mode
    ///
    /// Unrecognized type bits decode as [`FileType::Regular`].
    #[must_use]
    pub const fn from_mode(mode: libc::mode_t) -> Self {
        match mode & libc::S_IFMT {
            libc::S_IFDIR => Self::Directory,
            libc::S_IFLNK => Self::Symlink,
            libc::S_IFCHR => Self::CharDevice,
            libc::S_IFBLK => Self::BlockDevice,
            libc::S_IFIFO => Self::Fifo,
            libc::S_IFSOCK => Self::Socket,
            _ => Self::Regular,
        }
    }

    /// Decode the `d_type` byte of a directory record
    ///
    /// Returns `None` for `DT_UNKNOWN`, which some filesystems always report.
    #[must_use]
    pub const fn from_dirent(d_type: u8) -> Option<Self> {
        match d_type {
            libc::DT_REG => Some(Self::Regular),
            libc::DT_DIR => Some(Self::Directory),
            libc::DT_LNK => Some(Self::Symlink),
            libc::DT_CHR => Some(Self::CharDevice),
            libc::DT_BLK => Some(Self::BlockDevice),
            libc::DT_FIFO => Some(Self::Fifo),
            libc::DT_SOCK => Some(Self::Socket),
            _ => None,
        }
    }

    /// Short name, as used in listings
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Regular => "file",
            Self::Directory => "dir",
            Self::Symlink => "symlink",
            Self::CharDevice => "char",
            Self::BlockDevice => "block",
            Self::Fifo => "fifo",
            Self::Socket => "socket",
        }
    }
}

/// Portable stat result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileInfo {
    /// Last element of the path that was stat'ed
    pub name: String,
    /// Size in bytes
    pub size: u64,
    /// Kind of object
    pub file_type: FileType,
    /// Permission bits (`0o777` mask)
    pub permissions: u32,
    /// Set-user-ID bit
    pub setuid: bool,
    /// Set-group-ID bit
    pub setgid: bool,
    /// Sticky bit
    pub sticky: bool,
    /// Last modification time
    #[serde(with = "unix_time")]
    pub modified: SystemTime,
}

impl FileInfo {
    /// Decode a raw `struct stat`
    #[must_use]
    pub fn from_stat(name: String, st: &libc::stat) -> Self {
        let mode = st.st_mode;
        Self {
            name,
            size: u64::try_from(st.st_size).unwrap_or(0),
            file_type: FileType::from_mode(mode),
            permissions: mode & 0o777,
            setuid: mode & libc::S_ISUID != 0,
            setgid: mode & libc::S_ISGID != 0,
            sticky: mode & libc::S_ISVTX != 0,
            modified: system_time(st.st_mtime, st.st_mtime_nsec),
        }
    }

    /// Check if this is a directory
    #[must_use]
    pub fn is_dir(&self) -> bool {
        self.file_type == FileType::Directory
    }

    /// Check if this is a regular file
    #[must_use]
    pub fn is_file(&self) -> bool {
        self.file_type == FileType::Regular
    }

    /// Check if this is a symbolic link
    #[must_use]
    pub fn is_symlink(&self) -> bool {
        self.file_type == FileType::Symlink
    }

    /// Permission bits plus setuid/setgid/sticky, as `chmod` takes them
    #[must_use]
    pub const fn mode(&self) -> u32 {
        let mut mode = self.permissions;
        if self.setuid {
            mode |= libc::S_ISUID;
        }
        if self.setgid {
            mode |= libc::S_ISGID;
        }
        if self.sticky {
            mode |= libc::S_ISVTX;
        }
        mode
    }
}

#[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
fn system_time(secs: i64, nanos: i64) -> SystemTime {
    let nanos = Duration::from_nanos(nanos.clamp(0, 999_999_999) as u64);
    if secs >= 0 {
        UNIX_EPOCH + Duration::from_secs(secs as u64) + nanos
    } else {
        UNIX_EPOCH - Duration::from_secs(secs.unsigned_abs()) + nanos
    }
}

fn stat_with(op: &'static str, path: &Path, flags: libc::c_int) -> Result<FileInfo> {
    let raw = to_cstring(path)?;
    let st = sys::fstatat(None, &raw, flags).map_err(|e| Error::fs(op, path, e))?;
    Ok(FileInfo::from_stat(basename(path), &st))
}

/// Status of `path`, following symlinks
pub fn stat(path: impl AsRef<Path>) -> Result<FileInfo> {
    stat_with("stat", path.as_ref(), 0)
}

/// Status of `path` itself, not following a final symlink
pub fn lstat(path: impl AsRef<Path>) -> Result<FileInfo> {
    stat_with("lstat", path.as_ref(), libc::AT_SYMLINK_NOFOLLOW)
}

/// Whether anything exists at `path` (a dangling symlink counts)
pub fn exists(path: impl AsRef<Path>) -> Result<bool> {
    match lstat(path) {
        Ok(_) => Ok(true),
        Err(e) if e.errno() == Some(Errno::ENOENT) => Ok(false),
        Err(e) => Err(e),
    }
}

// Seconds and nanoseconds since the epoch; seconds may be negative
mod unix_time {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::{SystemTime, UNIX_EPOCH};

    #[allow(clippy::cast_possible_wrap)]
    pub fn serialize<S>(time: &SystemTime, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let (secs, nanos) = match time.duration_since(UNIX_EPOCH) {
            Ok(d) => (d.as_secs() as i64, d.subsec_nanos()),
            Err(e) => {
                let before = e.duration();
                if before.subsec_nanos() == 0 {
                    (-(before.as_secs() as i64), 0)
                } else {
                    (-(before.as_secs() as i64) - 1, 1_000_000_000 - before.subsec_nanos())
                }
            }
        };
        serializer.collect_seq([secs, i64::from(nanos)])
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<SystemTime, D::Error>
    where
        D: Deserializer<'de>,
    {
        let [secs, nanos] = <[i64; 2]>::deserialize(deserializer)?;
        Ok(super::system_time(secs, nanos))
    }
}
