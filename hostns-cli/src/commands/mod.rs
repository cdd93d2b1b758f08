use anyhow::{Context, Result};
use hostns_namespace::NamespaceExecutor;

use crate::cli::{Cli, Commands};

pub mod exec;
pub mod files;
pub mod host_ns;
pub mod namespaces;

/// Dispatch command to appropriate handler
pub async fn dispatch(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Namespaces { pid } => return namespaces::execute(pid, cli.ns_dir.as_deref()),
        Commands::HostNs { ref proc_root } => return host_ns::execute(proc_root),
        _ => {}
    }

    let executor = build_executor(&cli)?;

    match cli.command {
        Commands::Exec { command } => exec::execute(&executor, command).await,
        Commands::Cat { path } => files::cat(&executor, path).await,
        Commands::Write { path, data, mode } => files::write(&executor, path, data, mode).await,
        Commands::Stat {
            path,
            no_follow,
            json,
        } => files::stat(&executor, path, no_follow, json).await,
        Commands::Ls { path } => files::ls(&executor, path).await,
        Commands::Mkdir { path, mode } => files::mkdir(&executor, path, mode).await,
        Commands::Rm { path, recursive } => files::rm(&executor, path, recursive).await,
        Commands::Namespaces { .. } | Commands::HostNs { .. } => Ok(()),
    }
}

/// `--ns` wins over `--host-proc`; neither means the current namespaces
fn build_executor(cli: &Cli) -> Result<NamespaceExecutor> {
    let executor = match (&cli.ns_dir, &cli.host_proc) {
        (Some(dir), _) => NamespaceExecutor::new(dir.clone())
            .with_context(|| format!("Invalid namespace directory {}", dir.display()))?,
        (None, Some(proc_root)) => NamespaceExecutor::for_host(proc_root)
            .with_context(|| format!("Failed to locate host namespaces under {}", proc_root.display()))?,
        (None, None) => NamespaceExecutor::new("")?,
    };

    tracing::debug!(
        ns_dir = %executor.namespace_dir().display(),
        strategy = %cli.strategy,
        "Using namespace executor"
    );

    Ok(executor.with_strategy(cli.strategy))
}
