//! Run commands and operations inside another process's namespaces
//!
//! This crate enters existing Linux namespaces, it never creates them:
//! - [`fork`] - fork, switch the child, run an in-process closure
//! - [`command`] - run an external binary with the switch in its pre-exec hook
//! - [`reexec`] - re-run the current executable as a one-shot namespace child
//! - [`executor`] - the [`NamespaceExecutor`] facade over all of the above
//! - [`discovery`] - find the host's namespace directory from inside a container

#![warn(missing_docs, clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]

pub mod command;
pub mod config;
pub mod discovery;
pub mod executor;
pub mod fork;
pub mod ops;
pub mod reexec;
pub mod switch;

pub use command::CommandOutput;
pub use config::{NamespaceKind, NamespaceSet, Strategy};
pub use discovery::{NamespaceInfo, ProcessFinder, ProcessStatus, host_namespace_path};
pub use executor::NamespaceExecutor;
pub use ops::{ExecutionRequest, NamespaceOp, OpOutput};
pub use switch::{ResolvedNamespaces, SwitchError};
