//! Exec command implementation

use anyhow::{Context, Result};
use hostns_namespace::NamespaceExecutor;

pub async fn execute(executor: &NamespaceExecutor, mut command: Vec<String>) -> Result<()> {
    let binary = command.remove(0);
    tracing::debug!(binary = %binary, args = ?command, "Executing command");

    let output = executor
        .run_command_async(binary.clone(), command)
        .await
        .with_context(|| format!("Failed to run {binary}"))?;

    if !output.is_empty() {
        println!("{output}");
    }
    Ok(())
}
