//! Namespaces command implementation

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use hostns_core::ProcessId;
use hostns_namespace::NamespaceInfo;
use hostns_namespace::discovery::namespace_dir;

const PROC_ROOT: &str = "/proc";

pub fn execute(pid: Option<i32>, ns_dir: Option<&Path>) -> Result<()> {
    let dir = match (pid, ns_dir) {
        (Some(pid), _) => namespace_dir(Path::new(PROC_ROOT), ProcessId::from_raw(pid)),
        (None, Some(dir)) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
        (None, _) => PathBuf::from("/proc/self/ns"),
    };

    println!("Namespace information for {}", dir.display());
    println!("{:-<60}", "");

    let info = NamespaceInfo::from_dir(&dir).context("Failed to get namespace information")?;
    print!("{info}");

    match info.is_isolated(Path::new(PROC_ROOT)) {
        Ok(true) => println!("\nNamespaces differ from PID 1"),
        Ok(false) => println!("\nSame namespaces as PID 1"),
        Err(e) => println!("\nFailed to compare with PID 1: {e}"),
    }

    Ok(())
}
