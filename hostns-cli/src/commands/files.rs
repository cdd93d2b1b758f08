//! File commands: cat, write, stat, ls, mkdir, rm

use std::io::Write as _;
use std::path::PathBuf;
use std::time::UNIX_EPOCH;

use anyhow::{Context, Result};
use hostns_fs::FileInfo;
use hostns_namespace::{NamespaceExecutor, NamespaceOp};
use tokio::io::AsyncReadExt;

pub async fn cat(executor: &NamespaceExecutor, path: PathBuf) -> Result<()> {
    let data = executor
        .run_op_async(NamespaceOp::ReadFile { path: path.clone() })
        .await
        .and_then(|out| out.into_data())
        .with_context(|| format!("Failed to read {}", path.display()))?;

    let mut stdout = std::io::stdout().lock();
    stdout.write_all(&data)?;
    stdout.flush()?;
    Ok(())
}

pub async fn write(
    executor: &NamespaceExecutor,
    path: PathBuf,
    data: Option<String>,
    mode: u32,
) -> Result<()> {
    let data = match data {
        Some(data) => data.into_bytes(),
        None => {
            let mut buf = Vec::new();
            tokio::io::stdin()
                .read_to_end(&mut buf)
                .await
                .context("Failed to read stdin")?;
            buf
        }
    };
    let len = data.len();

    executor
        .run_op_async(NamespaceOp::WriteFile {
            path: path.clone(),
            data,
            mode,
        })
        .await
        .and_then(|out| out.into_done())
        .with_context(|| format!("Failed to write {}", path.display()))?;

    tracing::info!(path = %path.display(), bytes = len, "File written");
    Ok(())
}

pub async fn stat(
    executor: &NamespaceExecutor,
    path: PathBuf,
    no_follow: bool,
    json: bool,
) -> Result<()> {
    let op = if no_follow {
        NamespaceOp::Lstat { path: path.clone() }
    } else {
        NamespaceOp::Stat { path: path.clone() }
    };

    let info = executor
        .run_op_async(op)
        .await
        .and_then(|out| out.into_info())
        .with_context(|| format!("Failed to stat {}", path.display()))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&info)?);
    } else {
        print_info(&info);
    }
    Ok(())
}

fn print_info(info: &FileInfo) {
    let modified = info
        .modified
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_secs());

    println!("Name:     {}", info.name);
    println!("Type:     {}", info.file_type.as_str());
    println!("Size:     {}", info.size);
    println!("Mode:     {:04o}", info.mode());
    println!("Modified: {modified}");
}

pub async fn ls(executor: &NamespaceExecutor, path: PathBuf) -> Result<()> {
    let entries = executor
        .run_op_async(NamespaceOp::ReadDir { path: path.clone() })
        .await
        .and_then(|out| out.into_entries())
        .with_context(|| format!("Failed to list {}", path.display()))?;

    for entry in entries {
        println!("{:<10} {}", entry.file_type.as_str(), entry.name);
    }
    Ok(())
}

pub async fn mkdir(executor: &NamespaceExecutor, path: PathBuf, mode: u32) -> Result<()> {
    executor
        .run_op_async(NamespaceOp::MkdirAll {
            path: path.clone(),
            mode,
        })
        .await
        .and_then(|out| out.into_done())
        .with_context(|| format!("Failed to create {}", path.display()))?;

    tracing::info!(path = %path.display(), mode = %format!("{mode:o}"), "Directory created");
    Ok(())
}

pub async fn rm(executor: &NamespaceExecutor, path: PathBuf, recursive: bool) -> Result<()> {
    let op = if recursive {
        NamespaceOp::RemoveAll { path: path.clone() }
    } else {
        NamespaceOp::Remove { path: path.clone() }
    };

    executor
        .run_op_async(op)
        .await
        .and_then(|out| out.into_done())
        .with_context(|| format!("Failed to remove {}", path.display()))?;

    tracing::info!(path = %path.display(), recursive, "Removed");
    Ok(())
}
