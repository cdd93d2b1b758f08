//! hostns core - errors, identifiers and the result channel wire format
//!
//! This crate provides the types shared by the filesystem layer, the
//! namespace executor and the CLI.

#![warn(missing_docs, clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod frame;
pub mod types;

pub use error::{Error, Result};
pub use frame::ExecutionResult;
pub use types::ProcessId;
