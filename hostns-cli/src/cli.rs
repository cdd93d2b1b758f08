//! CLI argument definitions

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use hostns_namespace::Strategy;

#[derive(Parser)]
#[command(name = "hostns")]
#[command(about = "Run commands and file operations in another process's namespaces", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Namespace directory to enter, e.g. /proc/1/ns
    #[arg(long = "ns", global = true, env = "HOSTNS_NS_DIR", value_name = "DIR")]
    pub ns_dir: Option<PathBuf>,

    /// Host procfs mount; the namespace directory is found through the
    /// container runtime's process tree
    #[arg(long, global = true, env = "HOSTNS_HOST_PROC", value_name = "ROOT")]
    pub host_proc: Option<PathBuf>,

    /// How to reach the namespaces: reexec or fork
    #[arg(long, global = true, default_value = "reexec", value_parser = parse_strategy)]
    pub strategy: Strategy,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a command and print its combined output
    Exec {
        /// Command to run
        #[arg(last = true, required = true)]
        command: Vec<String>,
    },

    /// Print a file
    Cat {
        /// File to read
        path: PathBuf,
    },

    /// Write a file from --data or stdin
    Write {
        /// File to write
        path: PathBuf,

        /// Contents; stdin is read when absent
        #[arg(long)]
        data: Option<String>,

        /// Octal mode used when the file is created
        #[arg(short, long, default_value = "644", value_parser = parse_mode)]
        mode: u32,
    },

    /// Show file metadata
    Stat {
        /// Path to inspect
        path: PathBuf,

        /// Describe a symlink itself instead of its target
        #[arg(long)]
        no_follow: bool,

        /// Print JSON
        #[arg(long)]
        json: bool,
    },

    /// List a directory
    Ls {
        /// Directory to list
        path: PathBuf,
    },

    /// Create a directory and its missing parents
    Mkdir {
        /// Directory to create
        path: PathBuf,

        /// Octal mode for created directories
        #[arg(short, long, default_value = "755", value_parser = parse_mode)]
        mode: u32,
    },

    /// Remove a file or empty directory
    Rm {
        /// Path to remove
        path: PathBuf,

        /// Remove a whole tree; a missing path is not an error
        #[arg(short, long)]
        recursive: bool,
    },

    /// Show namespace information
    Namespaces {
        /// Process ID (default: the --ns directory, or the current process)
        #[arg(short, long)]
        pid: Option<i32>,
    },

    /// Print the host namespace directory discovered under a procfs mount
    HostNs {
        /// procfs mount to search
        #[arg(long, default_value = "/proc")]
        proc_root: PathBuf,
    },
}

fn parse_strategy(s: &str) -> Result<Strategy, String> {
    s.parse().map_err(|e: hostns_core::Error| e.to_string())
}

fn parse_mode(s: &str) -> Result<u32, String> {
    let digits = s.strip_prefix("0o").unwrap_or(s);
    match u32::from_str_radix(digits, 8) {
        Ok(mode) if mode <= 0o7777 => Ok(mode),
        Ok(_) => Err(format!("mode {s} is out of range")),
        Err(e) => Err(format!("invalid octal mode {s}: {e}")),
    }
}
