use std::ffi::OsStr;
use std::os::unix::ffi::OsStrExt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Barrier};

use hostns_fs::*;

/// Build a tree of the given depth where every directory holds `fanout`
/// files and `fanout` subdirectories; returns every leaf file path
fn build_tree(root: &Path, depth: usize, fanout: usize) -> Vec<PathBuf> {
    let mut leaves = Vec::new();
    mkdir_all(root, 0o755).unwrap();
    for i in 0..fanout {
        let file = root.join(format!("file-{i}"));
        write_file(&file, format!("leaf {i}").as_bytes(), 0o644).unwrap();
        leaves.push(file);
        if depth > 1 {
            leaves.extend(build_tree(&root.join(format!("dir-{i}")), depth - 1, fanout));
        }
    }
    leaves
}

#[test]
fn test_four_mib_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("blob");

    let data: Vec<u8> = (0..4 * 1024 * 1024).map(|i: u32| (i.wrapping_mul(31) >> 3) as u8).collect();
    write_file(&path, &data, 0o600).unwrap();

    let back = read_file(&path).unwrap();
    assert_eq!(back.len(), data.len());
    assert!(back == data);
    assert_eq!(stat(&path).unwrap().size, data.len() as u64);
}

#[test]
fn test_read_dir_sorted_without_dots() {
    let dir = tempfile::tempdir().unwrap();
    for name in ["zeta", "alpha", "mid", ".hidden"] {
        write_file(dir.path().join(name), b"", 0o644).unwrap();
    }
    mkdir(dir.path().join("beta"), 0o755).unwrap();
    std::os::unix::fs::symlink("alpha", dir.path().join("link")).unwrap();

    let entries = read_dir(dir.path()).unwrap();
    let names: Vec<&str> = entries.iter().map(|e| e.name.as_str()).collect();
    assert_eq!(names, [".hidden", "alpha", "beta", "link", "mid", "zeta"]);

    let beta = entries.iter().find(|e| e.name == "beta").unwrap();
    assert!(beta.is_dir());
    let link = entries.iter().find(|e| e.name == "link").unwrap();
    assert_eq!(link.file_type, FileType::Symlink);
}

#[test]
fn test_read_dir_many_entries() {
    let dir = tempfile::tempdir().unwrap();
    // Enough names to need several getdents64 calls
    for i in 0..2500 {
        write_file(dir.path().join(format!("entry-{i:05}")), b"", 0o644).unwrap();
    }

    let entries = read_dir(dir.path()).unwrap();
    assert_eq!(entries.len(), 2500);
    assert!(entries.windows(2).all(|w| w[0].name < w[1].name));
}

#[test]
fn test_remove_all_twice() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("tree");
    build_tree(&root, 2, 3);

    remove_all(&root).unwrap();
    remove_all(&root).unwrap();
    assert!(!exists(&root).unwrap());
}

#[test]
fn test_remove_all_missing_parent() {
    remove_all("/no/such/parent/child").unwrap();
}

#[test]
fn test_remove_all_depth_and_fanout() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("tree");
    let leaves = build_tree(&root, 4, 3);
    assert_eq!(leaves.len(), 3 + 9 + 27 + 81);

    remove_all(&root).unwrap();

    assert!(!exists(&root).unwrap());
    assert!(leaves.iter().all(|leaf| !exists(leaf).unwrap()));
    assert!(read_dir(dir.path()).unwrap().is_empty());
}

#[test]
fn test_remove_all_wide_directory() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("wide");
    mkdir(&root, 0o755).unwrap();
    // More than one removal batch
    for i in 0..2100 {
        write_file(root.join(format!("f{i}")), b"", 0o644).unwrap();
    }

    remove_all(&root).unwrap();
    assert!(!exists(&root).unwrap());
}

#[test]
fn test_remove_all_with_concurrent_unlink() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("tree");
    let leaves = build_tree(&root, 3, 4);
    let victim = leaves[leaves.len() / 2].clone();

    let barrier = Arc::new(Barrier::new(2));
    let racer = {
        let barrier = Arc::clone(&barrier);
        std::thread::spawn(move || {
            barrier.wait();
            // Either side may win; both outcomes leave the leaf absent.
            let _ = remove(&victim);
        })
    };

    barrier.wait();
    remove_all(&root).unwrap();
    racer.join().unwrap();

    assert!(!exists(&root).unwrap());
}

#[test]
fn test_remove_all_non_utf8_names() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("bytes");
    mkdir(&root, 0o755).unwrap();
    let odd = root.join(OsStr::from_bytes(b"caf\xe9"));
    write_file(&odd, b"x", 0o644).unwrap();

    let entries = read_dir(&root).unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].name, "caf\u{fffd}");

    remove_all(&root).unwrap();
    assert!(!exists(&root).unwrap());
}

#[test]
fn test_remove_all_reports_error_and_keeps_going() {
    // Root bypasses permission checks, so this only means something unprivileged.
    if nix::unistd::geteuid().is_root() {
        return;
    }

    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("tree");
    let locked = root.join("a-locked");
    mkdir_all(locked.join("inner"), 0o755).unwrap();
    write_file(locked.join("inner/file"), b"x", 0o644).unwrap();
    write_file(root.join("b-free"), b"x", 0o644).unwrap();
    std::fs::set_permissions(
        &locked,
        std::os::unix::fs::PermissionsExt::from_mode(0o555),
    )
    .unwrap();

    let err = remove_all(&root).unwrap_err();
    assert!(err.to_string().contains("a-locked"));
    assert!(!exists(root.join("b-free")).unwrap());

    std::fs::set_permissions(
        &locked,
        std::os::unix::fs::PermissionsExt::from_mode(0o755),
    )
    .unwrap();
}

#[test]
fn test_mkdir_all_then_stat_scenario() {
    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("mnt/data/test");

    // No group or other bits, so no umask can change the result
    mkdir_all(&target, 0o700).unwrap();

    let info = stat(&target).unwrap();
    assert!(info.is_dir());
    assert_eq!(info.name, "test");
    assert_eq!(info.permissions, 0o700);
}

#[test]
fn test_lstat_symlink() {
    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("target");
    write_file(&target, b"12345", 0o644).unwrap();
    let link = dir.path().join("link");
    std::os::unix::fs::symlink(&target, &link).unwrap();

    assert!(lstat(&link).unwrap().is_symlink());
    let followed = stat(&link).unwrap();
    assert!(followed.is_file());
    assert_eq!(followed.size, 5);
    assert_eq!(followed.name, "link");
}
