use std::path::{Path, PathBuf};

use hostns_core::Error;
use hostns_namespace::fork::fork_and_switch;
use hostns_namespace::*;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}

#[test]
fn test_bypass_executor_end_to_end() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let executor = NamespaceExecutor::new("").unwrap();
    let target = dir.path().join("mnt/data/test");

    executor.mkdir_all(&target, 0o700).unwrap();
    let info = executor.stat(&target).unwrap();
    assert!(info.is_dir());
    assert_eq!(info.name, "test");
    assert_eq!(info.permissions, 0o700);

    executor.write_file(target.join("hostname"), b"node-1\n", 0o644).unwrap();
    assert_eq!(executor.read_file(target.join("hostname")).unwrap(), b"node-1\n");

    let names: Vec<String> = executor
        .read_dir(&target)
        .unwrap()
        .into_iter()
        .map(|e| e.name)
        .collect();
    assert_eq!(names, ["hostname"]);

    executor.remove_all(dir.path().join("mnt")).unwrap();
    executor.remove_all(dir.path().join("mnt")).unwrap();
    assert!(!executor.exists(dir.path().join("mnt")).unwrap());
}

#[test]
fn test_bypass_closure_identity() {
    let executor = NamespaceExecutor::new("").unwrap();
    let value = executor
        .run_operation(|| Ok::<_, String>(vec![(1u8, "one".to_string())]))
        .unwrap();
    assert_eq!(value, [(1u8, "one".to_string())]);
}

#[test]
fn test_missing_mount_namespace_is_not_found() {
    let set = NamespaceSet::from_dir("/no/such/ns");
    let err = fork_and_switch(&set, || Ok::<_, String>(())).unwrap_err();

    assert!(matches!(err, Error::Remote { .. }));
    assert!(err.is_not_found());
}

#[test]
fn test_reexec_with_missing_helper() {
    let executor = NamespaceExecutor::new("/proc/1/ns")
        .unwrap()
        .with_helper("/no/such/helper");

    let err = executor.stat("/").unwrap_err();
    assert!(matches!(err, Error::Io(_)));
}

#[test]
fn test_fork_strategy_read_error_crosses_channel() {
    init_tracing();
    let executor = NamespaceExecutor::new("/no/such/ns")
        .unwrap()
        .with_strategy(Strategy::Fork);

    let err = executor.read_file("/etc/hostname").unwrap_err();
    assert!(err.to_string().contains("mnt"));
}

#[test]
fn test_for_host_uses_discovery() {
    let proc = tempfile::tempdir().unwrap();
    hostns_fs::mkdir_all(proc.path().join("self"), 0o755).unwrap();
    hostns_fs::write_file(
        proc.path().join("self/status"),
        b"Name:\tagent\nPid:\t9\nPPid:\t0\n",
        0o644,
    )
    .unwrap();

    let executor = NamespaceExecutor::for_host(proc.path()).unwrap();
    assert_eq!(executor.namespace_dir(), proc.path().join("1/ns/"));
}

#[tokio::test]
async fn test_async_command_bypass() {
    let executor = NamespaceExecutor::new("").unwrap();
    let err = executor
        .run_command_async("/bin/sh".to_string(), vec!["-c".to_string(), "echo bad; exit 2".to_string()])
        .await
        .unwrap_err();

    assert!(matches!(err, Error::CommandFailed { code: Some(2), .. }));
    assert!(err.to_string().contains("bad"));
}

fn init_namespaces() -> PathBuf {
    PathBuf::from("/proc/1/ns")
}

#[test]
#[ignore] // Requires root
fn test_mount_only_switch() {
    let set = NamespaceSet::new(init_namespaces().join("mnt"));
    let own_net = std::fs::read_link("/proc/self/ns/net").unwrap();

    let (mnt, net) = fork_and_switch(&set, || {
        let read = |p: &str| {
            std::fs::read_link(p)
                .map(|l| l.to_string_lossy().into_owned())
                .map_err(|e| e.to_string())
        };
        Ok::<_, String>((read("/proc/self/ns/mnt")?, read("/proc/self/ns/net")?))
    })
    .unwrap();

    let init_mnt = std::fs::read_link("/proc/1/ns/mnt").unwrap();
    assert_eq!(Path::new(&mnt), init_mnt);
    assert_eq!(Path::new(&net), own_net);
}

#[test]
#[ignore] // Requires root
fn test_host_mkdir_then_stat() {
    let executor = NamespaceExecutor::new(init_namespaces())
        .unwrap()
        .with_strategy(Strategy::Fork);
    let target = "/tmp/hostns-it/mnt/data/test";

    executor.mkdir_all(target, 0o700).unwrap();
    let info = executor.stat(target).unwrap();
    assert!(info.is_dir());
    assert_eq!(info.permissions, 0o700);

    executor.remove_all("/tmp/hostns-it").unwrap();
    assert!(!executor.exists("/tmp/hostns-it").unwrap());
}

#[test]
#[ignore] // Requires root
fn test_host_read_hostname() {
    let executor = NamespaceExecutor::new(init_namespaces()).unwrap().with_strategy(Strategy::Fork);
    let data = executor.read_file("/etc/hostname").unwrap();
    assert!(!data.is_empty());

    let out = executor.run_command("cat", &["/etc/hostname".to_string()]).unwrap();
    assert_eq!(out, String::from_utf8_lossy(&data).trim());
}
