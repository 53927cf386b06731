//! End-to-end validation of the VFS over both index backends.
//!
//! Exercises the full facade the way the CLI and benchmark harness use it:
//! building trees, reading them back, removing subtrees, and snapshotting,
//! with the directory index swapped between backends to confirm the choice
//! never changes observable results.

use arbor_common::{FsError, IndexBackend, IndexConfig, NodeKind};
use arbor_fs::{Vfs, snapshot};
use bytes::Bytes;

fn both_backends() -> [Vfs; 2] {
    [
        Vfs::new(IndexConfig::for_backend(IndexBackend::BTree)),
        Vfs::new(IndexConfig::for_backend(IndexBackend::RbTree)),
    ]
}

#[test]
fn test_mkdir_touch_write_read_ls() {
    for mut fs in both_backends() {
        let root = fs.root();
        fs.mkdir(root, "/docs", false).unwrap();
        fs.touch(root, "/docs/hello.txt").unwrap();
        fs.write(root, "/docs/hello.txt", b"hi").unwrap();

        assert_eq!(fs.read(root, "/docs/hello.txt").unwrap(), Bytes::from_static(b"hi"));

        let top: Vec<_> = fs.ls(root, "/").unwrap().into_iter().map(|e| e.name).collect();
        assert_eq!(top, ["docs"]);
        let inner: Vec<_> = fs
            .ls(root, "/docs")
            .unwrap()
            .into_iter()
            .map(|e| e.name)
            .collect();
        assert_eq!(inner, ["hello.txt"]);
    }
}

#[test]
fn test_resolve_after_nested_creation() {
    for mut fs in both_backends() {
        let root = fs.root();
        fs.mkdir(root, "/a", false).unwrap();
        fs.mkdir(root, "/a/b", false).unwrap();
        let c = fs.touch(root, "/a/b/c").unwrap();

        let resolved = fs.resolve(root, "/a/b/c").unwrap();
        assert_eq!(resolved, c);
        assert_eq!(fs.metadata(root, "/a/b/c").unwrap().kind, NodeKind::File);
    }
}

#[test]
fn test_recursive_rm_policy() {
    for mut fs in both_backends() {
        let root = fs.root();
        fs.mkdir(root, "/a", false).unwrap();
        fs.mkdir(root, "/a/b", false).unwrap();
        fs.touch(root, "/a/b/c").unwrap();

        let err = fs.rm(root, "/a/b", false).unwrap_err();
        assert!(matches!(err, FsError::DirectoryNotEmpty(_)));

        fs.rm(root, "/a/b", true).unwrap();
        assert!(matches!(
            fs.resolve(root, "/a/b"),
            Err(FsError::NotFound(_))
        ));
        // Parent survives with its entry count back at zero.
        assert_eq!(fs.metadata(root, "/a").unwrap().size, 0);
    }
}

#[test]
fn test_ls_lexicographic_contract() {
    for mut fs in both_backends() {
        let root = fs.root();
        fs.mkdir(root, "/a", false).unwrap();
        for name in ["z", "a", "m"] {
            fs.touch(root, &format!("/a/{}", name)).unwrap();
        }
        let names: Vec<_> = fs.ls(root, "/a").unwrap().into_iter().map(|e| e.name).collect();
        assert_eq!(names, ["a", "m", "z"]);
    }
}

#[test]
fn test_backends_agree_on_identical_history() {
    let [mut btree_fs, mut rb_fs] = both_backends();

    for fs in [&mut btree_fs, &mut rb_fs] {
        let root = fs.root();
        fs.mkdir(root, "/projects", false).unwrap();
        for i in 0..40 {
            fs.write(
                root,
                &format!("/projects/file_{:02}.txt", (i * 7) % 40),
                format!("payload {}", i).as_bytes(),
            )
            .unwrap();
        }
        for i in (0..40).step_by(3) {
            fs.rm(root, &format!("/projects/file_{:02}.txt", i), false)
                .unwrap();
        }
    }

    let listing = |fs: &Vfs| -> Vec<(String, u64)> {
        fs.ls(fs.root(), "/projects")
            .unwrap()
            .into_iter()
            .map(|e| (e.name, e.size))
            .collect()
    };
    assert_eq!(listing(&btree_fs), listing(&rb_fs));
}

#[test]
fn test_dir_scaling() {
    let mut fs = Vfs::default();
    let root = fs.root();
    fs.mkdir(root, "/big", false).unwrap();
    for i in 0..10_000 {
        fs.touch(root, &format!("/big/f{:05}", i)).unwrap();
    }
    assert_eq!(fs.read(root, "/big/f00000").unwrap(), Bytes::new());
    assert_eq!(fs.ls(root, "/big").unwrap().len(), 10_000);
    assert_eq!(fs.metadata(root, "/big").unwrap().size, 10_000);
}

#[test]
fn test_snapshot_roundtrip_through_both_backends() {
    for backend in [IndexBackend::BTree, IndexBackend::RbTree] {
        let mut fs = Vfs::new(IndexConfig::for_backend(backend));
        let root = fs.root();
        fs.mkdir(root, "/state", false).unwrap();
        fs.write(root, "/state/a.bin", &[1, 2, 3]).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snap.bin.gz");
        snapshot::save(&fs, &path).unwrap();

        let restored = snapshot::load(&path).unwrap();
        assert_eq!(restored.index_config().backend, backend);
        assert_eq!(
            restored.read(restored.root(), "/state/a.bin").unwrap(),
            Bytes::from_static(&[1, 2, 3])
        );
    }
}
