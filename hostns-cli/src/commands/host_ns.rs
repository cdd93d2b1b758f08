//! Host namespace discovery command

use std::path::Path;

use anyhow::Result;
use hostns_namespace::host_namespace_path;

pub fn execute(proc_root: &Path) -> Result<()> {
    println!("{}", host_namespace_path(proc_root).display());
    Ok(())
}
