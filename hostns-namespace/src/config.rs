//! Namespace selection and execution strategy

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use hostns_core::{Error, Result};
use hostns_fs::path::to_cstring;
use serde::{Deserialize, Serialize};

use crate::switch::ResolvedNamespaces;

/// A namespace kind this crate can switch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NamespaceKind {
    /// Mount namespace
    Mount,
    /// Network namespace
    Net,
}

impl NamespaceKind {
    /// Entry name under `/proc/<pid>/ns/`
    #[must_use]
    pub const fn file_name(self) -> &'static str {
        match self {
            Self::Mount => "mnt",
            Self::Net => "net",
        }
    }

    /// `nstype` argument for setns(2)
    #[must_use]
    pub const fn clone_flag(self) -> libc::c_int {
        match self {
            Self::Mount => libc::CLONE_NEWNS,
            Self::Net => libc::CLONE_NEWNET,
        }
    }
}

impl fmt::Display for NamespaceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.file_name())
    }
}

/// The namespace files a child switches into
///
/// The mount namespace is mandatory. The network namespace is optional, and
/// even when set, a missing file is skipped at switch time rather than
/// treated as an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamespaceSet {
    /// Mount namespace file
    pub mount: PathBuf,

    /// Network namespace file
    pub net: Option<PathBuf>,
}

impl NamespaceSet {
    /// Switch the mount namespace only
    #[must_use]
    pub fn new(mount: impl Into<PathBuf>) -> Self {
        Self {
            mount: mount.into(),
            net: None,
        }
    }

    /// `<dir>/mnt` and `<dir>/net`
    #[must_use]
    pub fn from_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self::new(dir.join(NamespaceKind::Mount.file_name()))
            .with_net(dir.join(NamespaceKind::Net.file_name()))
    }

    /// Also switch the network namespace
    #[must_use]
    pub fn with_net(mut self, net: impl Into<PathBuf>) -> Self {
        self.net = Some(net.into());
        self
    }

    /// Kinds this set switches, in switch order
    #[must_use]
    pub fn kinds(&self) -> Vec<NamespaceKind> {
        let mut kinds = vec![NamespaceKind::Mount];
        if self.net.is_some() {
            kinds.push(NamespaceKind::Net);
        }
        kinds
    }

    /// Convert every path to a C string, ready to use after fork
    ///
    /// # Errors
    /// Returns [`Error::InvalidPath`] when a path holds a NUL byte
    pub fn resolve(&self) -> Result<ResolvedNamespaces> {
        let mount = to_cstring(&self.mount)?;
        let net = self.net.as_deref().map(to_cstring).transpose()?;
        Ok(ResolvedNamespaces::new(mount, net))
    }
}

/// How requests reach the target namespaces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    /// Spawn a fresh copy of the helper executable that switches and runs
    /// the request before doing anything else
    #[default]
    ReExec,

    /// Fork the current process and switch the child
    Fork,
}

impl Strategy {
    /// Name used on the command line
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ReExec => "reexec",
            Self::Fork => "fork",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Strategy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "reexec" | "re-exec" => Ok(Self::ReExec),
            "fork" => Ok(Self::Fork),
            other => Err(Error::Parse {
                message: format!("unknown strategy '{other}', expected 'reexec' or 'fork'"),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_dir_layout() {
        let set = NamespaceSet::from_dir("/proc/42/ns");
        assert_eq!(set.mount, Path::new("/proc/42/ns/mnt"));
        assert_eq!(set.net.as_deref(), Some(Path::new("/proc/42/ns/net")));
        assert_eq!(set.kinds(), [NamespaceKind::Mount, NamespaceKind::Net]);
    }

    #[test]
    fn test_mount_only() {
        let set = NamespaceSet::new("/proc/1/ns/mnt");
        assert!(set.net.is_none());
        assert_eq!(set.kinds(), [NamespaceKind::Mount]);
    }

    #[test]
    fn test_resolve_rejects_nul() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let set = NamespaceSet::new(Path::new(OsStr::from_bytes(b"/proc/1/ns/m\0nt")));
        assert!(matches!(set.resolve(), Err(Error::InvalidPath { .. })));

        let set = NamespaceSet::new("/proc/1/ns/mnt")
            .with_net(Path::new(OsStr::from_bytes(b"/proc/1/ns/n\0et")));
        assert!(matches!(set.resolve(), Err(Error::InvalidPath { .. })));
    }

    #[test]
    fn test_clone_flags() {
        assert_eq!(NamespaceKind::Mount.clone_flag(), libc::CLONE_NEWNS);
        assert_eq!(NamespaceKind::Net.clone_flag(), libc::CLONE_NEWNET);
        assert_eq!(NamespaceKind::Net.to_string(), "net");
    }

    #[test]
    fn test_strategy_parse() {
        assert_eq!("reexec".parse::<Strategy>().unwrap(), Strategy::ReExec);
        assert_eq!(" Fork ".parse::<Strategy>().unwrap(), Strategy::Fork);
        assert!("clone".parse::<Strategy>().is_err());
        assert_eq!(Strategy::default(), Strategy::ReExec);
    }
}
