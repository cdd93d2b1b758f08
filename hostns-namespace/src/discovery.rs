//! Locate the host's namespaces from inside a container
//!
//! With the host's procfs mounted into the container, the container runtime
//! daemon shows up as an ancestor of our own process in the host's process
//! tree. Its namespace directory is the host's.

use std::fmt;
use std::path::{Path, PathBuf};

use hostns_core::{Error, ProcessId, Result};
use tracing::{debug, warn};

/// Docker daemon process name
pub const DOCKERD: &str = "dockerd";

/// containerd daemon process name
pub const CONTAINERD: &str = "containerd";

/// containerd shim process name
pub const CONTAINERD_SHIM: &str = "containerd-shim";

/// Runtime processes tried, in order, when looking for the host
pub const HOST_RUNTIMES: [&str; 3] = [DOCKERD, CONTAINERD, CONTAINERD_SHIM];

/// The fields of `/proc/<pid>/status` used for the ancestor walk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessStatus {
    /// Command name (`Name:`)
    pub name: String,
    /// Process id (`Pid:`)
    pub pid: ProcessId,
    /// Parent process id (`PPid:`), 0 at the top of the tree
    pub ppid: ProcessId,
}

impl ProcessStatus {
    /// Parse the text of a status file
    ///
    /// # Errors
    /// Returns [`Error::Parse`] when `Name`, `Pid` or `PPid` is missing or
    /// malformed
    pub fn parse(text: &str) -> Result<Self> {
        let mut name = None;
        let mut pid = None;
        let mut ppid = None;

        for line in text.lines() {
            let Some((key, value)) = line.split_once(':') else {
                continue;
            };
            match key {
                "Name" => name = Some(value.trim().to_string()),
                "Pid" => pid = Some(value.parse::<ProcessId>()?),
                "PPid" => ppid = Some(value.parse::<ProcessId>()?),
                _ => {}
            }
        }

        let missing = |field: &str| Error::Parse {
            message: format!("status has no {field} field"),
        };
        Ok(Self {
            name: name.ok_or_else(|| missing("Name"))?,
            pid: pid.ok_or_else(|| missing("Pid"))?,
            ppid: ppid.ok_or_else(|| missing("PPid"))?,
        })
    }
}

/// Walks the process tree of one procfs mount
#[derive(Debug, Clone)]
pub struct ProcessFinder {
    proc_root: PathBuf,
}

impl ProcessFinder {
    /// Use the procfs mounted at `proc_root`
    #[must_use]
    pub fn new(proc_root: impl Into<PathBuf>) -> Self {
        Self {
            proc_root: proc_root.into(),
        }
    }

    /// Status of the calling process as seen by this procfs
    pub fn find_self(&self) -> Result<ProcessStatus> {
        Self::read_status(&self.proc_root.join("self/status"))
    }

    /// Status of `pid`
    pub fn find_pid(&self, pid: ProcessId) -> Result<ProcessStatus> {
        Self::read_status(&self.proc_root.join(pid.to_string()).join("status"))
    }

    fn read_status(path: &Path) -> Result<ProcessStatus> {
        let raw = hostns_fs::read_file(path)?;
        ProcessStatus::parse(&String::from_utf8_lossy(&raw))
    }

    /// Nearest process named `name`, starting with the caller itself
    ///
    /// # Errors
    /// Returns [`Error::ProcessNotFound`] when the walk reaches the top of
    /// the tree, or the error from reading a status file
    pub fn find_ancestor_by_name(&self, name: &str) -> Result<ProcessStatus> {
        let mut status = self.find_self()?;
        loop {
            if status.name == name {
                debug!(name, pid = %status.pid, "Found ancestor process");
                return Ok(status);
            }
            if status.ppid.is_none() {
                return Err(Error::ProcessNotFound {
                    name: name.to_string(),
                });
            }
            status = self.find_pid(status.ppid)?;
        }
    }

    /// PID of the first container runtime ancestor, tried in the order of
    /// [`HOST_RUNTIMES`]
    pub fn find_host_namespace_pid(&self) -> Result<ProcessId> {
        let mut failures = Vec::new();
        for name in HOST_RUNTIMES {
            match self.find_ancestor_by_name(name) {
                Ok(status) => return Ok(status.pid),
                Err(e) => failures.push(e.to_string()),
            }
        }
        Err(Error::ProcessNotFound {
            name: failures.join("; "),
        })
    }
}

/// Namespace directory of the host, as seen through `proc_root`
///
/// Falls back to PID 1 when no runtime ancestor can be found.
#[must_use]
pub fn host_namespace_path(proc_root: &Path) -> PathBuf {
    let finder = ProcessFinder::new(proc_root);
    let pid = finder.find_host_namespace_pid().unwrap_or_else(|e| {
        warn!(
            proc_root = %proc_root.display(),
            error = %e,
            "No container runtime ancestor found, using PID 1"
        );
        ProcessId::INIT
    });
    namespace_dir(proc_root, pid)
}

/// `<proc_root>/<pid>/ns/`
#[must_use]
pub fn namespace_dir(proc_root: &Path, pid: ProcessId) -> PathBuf {
    proc_root.join(pid.to_string()).join("ns/")
}

/// Namespace identifiers of one process, as `kind:[inode]` link targets
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NamespaceInfo {
    /// PID namespace ID
    pub pid: Option<String>,
    /// Network namespace ID
    pub net: Option<String>,
    /// Mount namespace ID
    pub mnt: Option<String>,
    /// UTS namespace ID
    pub uts: Option<String>,
    /// IPC namespace ID
    pub ipc: Option<String>,
    /// User namespace ID
    pub user: Option<String>,
    /// CGroup namespace ID
    pub cgroup: Option<String>,
}

impl NamespaceInfo {
    /// Read the links in a namespace directory; missing ones stay `None`
    ///
    /// # Errors
    /// Returns [`Error::Namespace`] when no link at all can be read
    pub fn from_dir(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        let read_ns = |name: &str| {
            std::fs::read_link(dir.join(name))
                .map(|p| p.to_string_lossy().into_owned())
                .ok()
        };

        let info = Self {
            pid: read_ns("pid"),
            net: read_ns("net"),
            mnt: read_ns("mnt"),
            uts: read_ns("uts"),
            ipc: read_ns("ipc"),
            user: read_ns("user"),
            cgroup: read_ns("cgroup"),
        };

        if info == Self::default() {
            return Err(Error::Namespace {
                message: format!("no namespace links readable under {}", dir.display()),
            });
        }
        Ok(info)
    }

    /// Namespaces of `pid` under `proc_root`
    pub fn for_pid(proc_root: &Path, pid: ProcessId) -> Result<Self> {
        Self::from_dir(namespace_dir(proc_root, pid))
    }

    /// Check whether the mount, network or PID namespace differs from
    /// PID 1's
    ///
    /// # Errors
    /// Returns error if PID 1's namespaces cannot be read
    pub fn is_isolated(&self, proc_root: &Path) -> Result<bool> {
        let init = Self::for_pid(proc_root, ProcessId::INIT)?;
        Ok(self.pid != init.pid || self.net != init.net || self.mnt != init.mnt)
    }
}

impl fmt::Display for NamespaceInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rows = [
            ("MNT", &self.mnt),
            ("NET", &self.net),
            ("PID", &self.pid),
            ("UTS", &self.uts),
            ("IPC", &self.ipc),
            ("USER", &self.user),
            ("CGROUP", &self.cgroup),
        ];
        for (label, value) in rows {
            if let Some(value) = value {
                writeln!(f, "{:<8}{value}", format!("{label}:"))?;
            }
        }
        Ok(())
    }
}
