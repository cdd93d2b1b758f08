//! Fork-safe filesystem layer
//!
//! Every operation in this crate is built directly on the syscalls in
//! [`sys`]: no buffered I/O, no internal locks, no threads, no logging. That
//! makes it usable both from ordinary code and from a child process in the
//! window between `fork(2)` and `_exit(2)`, where only raw syscalls are safe.
//!
//! Errors are [`hostns_core::Error::Fs`], carrying the syscall name, the
//! path and the kernel error code. `EINTR` is retried transparently.

#![warn(missing_docs, clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(
    clippy::module_name_repetitions,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod dir;
pub mod file;
pub mod mkdir;
pub mod path;
pub mod remove;
pub mod stat;
pub mod sys;

pub use dir::{DirEntry, read_dir};
pub use file::{read_file, write_file};
pub use mkdir::{mkdir, mkdir_all};
pub use remove::{remove, remove_all};
pub use stat::{FileInfo, FileType, exists, lstat, stat};
