//! Direct (local filesystem) storage behaviour.

use telesync_core::RemoteError;
use telesync_storage::{LocalStorage, ProjectStorage};

fn storage() -> (tempfile::TempDir, LocalStorage) {
    let dir = tempfile::tempdir().unwrap();
    let storage = LocalStorage::new(dir.path());
    (dir, storage)
}

#[test]
fn read_and_write_roundtrip() {
    let (_dir, storage) = storage();
    storage.write_file("test.yaml", "key: value\n").unwrap();
    assert_eq!(storage.read_file("test.yaml").unwrap(), "key: value\n");
}

#[test]
fn write_creates_parent_directories() {
    let (dir, storage) = storage();
    storage
        .write_file("config/sub/deep.yaml", "nested: true\n")
        .unwrap();
    assert!(dir.path().join("config/sub/deep.yaml").is_file());
}

#[test]
fn read_missing_file_is_not_found() {
    let (_dir, storage) = storage();
    assert!(matches!(
        storage.read_file("missing.yaml"),
        Err(RemoteError::NotFound(_))
    ));
}

#[test]
fn list_dir_names_files_and_dirs() {
    let (dir, storage) = storage();
    std::fs::write(dir.path().join("file1.yaml"), "").unwrap();
    std::fs::write(dir.path().join("file2.yaml"), "").unwrap();
    std::fs::create_dir(dir.path().join("subdir")).unwrap();

    let items = storage.list_dir("").unwrap();
    assert_eq!(items, vec!["file1.yaml", "file2.yaml", "subdir"]);
}

#[test]
fn list_missing_dir_is_empty() {
    let (_dir, storage) = storage();
    assert!(storage.list_dir("nope").unwrap().is_empty());
}

#[test]
fn exists_checks_files_and_dirs() {
    let (dir, storage) = storage();
    std::fs::write(dir.path().join("exists.yaml"), "").unwrap();

    assert!(storage.exists("exists.yaml"));
    assert!(storage.exists(""));
    assert!(!storage.exists("missing.yaml"));
}

#[test]
fn glob_returns_root_relative_matches() {
    let (dir, storage) = storage();
    std::fs::create_dir(dir.path().join("config")).unwrap();
    std::fs::write(dir.path().join("config/main.yaml"), "").unwrap();
    std::fs::write(dir.path().join("config/ref.yaml"), "").unwrap();
    std::fs::write(dir.path().join("config/other.txt"), "").unwrap();

    let matches = storage.glob("config/*.yaml").unwrap();
    assert_eq!(matches, vec!["config/main.yaml", "config/ref.yaml"]);
}

#[test]
fn mkdir_and_delete() {
    let (dir, storage) = storage();
    storage.mkdir("a/b/c").unwrap();
    assert!(dir.path().join("a/b/c").is_dir());

    storage.write_file("a/b/c/f.yaml", "x\n").unwrap();
    storage.delete("a/b/c/f.yaml").unwrap();
    assert!(!dir.path().join("a/b/c/f.yaml").exists());

    // Empty directory goes too; deleting a missing path is a no-op.
    storage.delete("a/b/c").unwrap();
    assert!(!dir.path().join("a/b/c").exists());
    storage.delete("a/b/c").unwrap();
}

#[test]
fn escaping_paths_are_rejected() {
    let (_dir, storage) = storage();
    assert!(storage.read_file("../outside.yaml").is_err());
    assert!(storage.write_file("/absolute.yaml", "x").is_err());
    assert!(!storage.exists("../outside.yaml"));
}

// Callers hold the capability set, not a concrete variant.
fn roundtrip_through(storage: &dyn ProjectStorage) {
    storage.write_file("poly.yaml", "via trait\n").unwrap();
    assert_eq!(storage.read_file("poly.yaml").unwrap(), "via trait\n");
    assert!(storage.exists("poly.yaml"));
}

#[test]
fn works_behind_the_trait_object() {
    let (_dir, storage) = storage();
    roundtrip_through(&storage);
}
