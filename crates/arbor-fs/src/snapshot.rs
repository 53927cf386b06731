//! Snapshot persistence for the VFS tree.
//!
//! A snapshot is a structurally complete recursive serialization of the
//! tree: per node its metadata plus either ordered child entries or the
//! file payload, along with the index configuration the tree was built
//! with — so a reloaded tree uses the backend it was saved with. The blob
//! on disk is bincode-encoded and gzip-compressed.
//!
//! Prototype-format caveat: there is no versioning or checksum; a snapshot
//! is only as trustworthy as the process that wrote it.

use std::fs;
use std::io::{self, BufReader, BufWriter, Write};
use std::path::Path;

use arbor_common::{FsError, IndexConfig, InodeId, NodeKind, Result};
use arbor_index::build_index;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use serde::{Deserialize, Serialize};

use crate::inode::{DirNode, FileNode, InodeTable, Meta, Node};
use crate::vfs::Vfs;

/// Per-node metadata carried through a snapshot. Kind and size are implied
/// by the node shape; parent links are rebuilt during restore.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotMeta {
    pub id: InodeId,
    pub created: DateTime<Utc>,
    pub modified: DateTime<Utc>,
}

/// One node of the serialized tree.
#[derive(Debug, Serialize, Deserialize)]
pub enum SnapshotNode {
    Directory {
        meta: SnapshotMeta,
        /// Child entries in ascending name order.
        entries: Vec<(String, SnapshotNode)>,
    },
    File {
        meta: SnapshotMeta,
        content: Vec<u8>,
    },
}

/// A complete serialized tree plus the config needed to rebuild it.
#[derive(Debug, Serialize, Deserialize)]
pub struct Snapshot {
    pub config: IndexConfig,
    pub root: SnapshotNode,
}

impl Snapshot {
    /// Captures the full tree rooted at the VFS root.
    pub fn capture(vfs: &Vfs) -> Result<Snapshot> {
        Ok(Snapshot {
            config: vfs.index_config(),
            root: encode_node(vfs, vfs.root())?,
        })
    }

    /// Rebuilds a VFS from this snapshot, preserving inode ids; freshly
    /// allocated ids resume past the largest preserved one.
    pub fn restore(self) -> Result<Vfs> {
        let config = self.config;
        let mut table = InodeTable::new();
        let root = restore_node(&mut table, &config, None, self.root)?;
        let is_dir = table.get(root).map(|n| n.kind().is_dir()).unwrap_or(false);
        if !is_dir {
            return Err(FsError::SnapshotCorrupted(
                "root node is not a directory".to_string(),
            ));
        }
        Ok(Vfs::from_parts(table, root, config))
    }
}

fn encode_node(vfs: &Vfs, id: InodeId) -> Result<SnapshotNode> {
    let node = vfs
        .node(id)
        .ok_or_else(|| FsError::NotFound(format!("inode {}", id)))?;
    let meta = SnapshotMeta {
        id: node.meta().id,
        created: node.meta().created,
        modified: node.meta().modified,
    };
    match node {
        Node::Directory(dir) => {
            let mut entries = Vec::with_capacity(dir.entry_count());
            for (name, child) in dir.entries() {
                entries.push((name, encode_node(vfs, child)?));
            }
            Ok(SnapshotNode::Directory { meta, entries })
        }
        Node::File(file) => Ok(SnapshotNode::File {
            meta,
            content: file.read().to_vec(),
        }),
    }
}

fn restore_node(
    table: &mut InodeTable,
    config: &IndexConfig,
    parent: Option<InodeId>,
    node: SnapshotNode,
) -> Result<InodeId> {
    match node {
        SnapshotNode::Directory { meta, entries } => {
            let id = meta.id;
            let mut index = build_index(config);
            let count = entries.len();
            for (name, child) in entries {
                let child_id = restore_node(table, config, Some(id), child)?;
                index.insert(name, child_id);
            }
            let dir = DirNode::from_parts(
                Meta {
                    id,
                    kind: NodeKind::Directory,
                    parent,
                    created: meta.created,
                    modified: meta.modified,
                    size: count as u64,
                },
                index,
            );
            if !table.insert_restored(Node::Directory(dir)) {
                return Err(FsError::SnapshotCorrupted(format!(
                    "duplicate inode id {}",
                    id
                )));
            }
            Ok(id)
        }
        SnapshotNode::File { meta, content } => {
            let id = meta.id;
            let file = FileNode::from_parts(
                Meta {
                    id,
                    kind: NodeKind::File,
                    parent,
                    created: meta.created,
                    modified: meta.modified,
                    size: content.len() as u64,
                },
                Bytes::from(content),
            );
            if !table.insert_restored(Node::File(file)) {
                return Err(FsError::SnapshotCorrupted(format!(
                    "duplicate inode id {}",
                    id
                )));
            }
            Ok(id)
        }
    }
}

/// Serializes `vfs` to `path`, overwriting any existing file.
pub fn save(vfs: &Vfs, path: &Path) -> Result<()> {
    let snapshot = Snapshot::capture(vfs)?;
    let file = fs::File::create(path)?;
    let mut encoder = GzEncoder::new(BufWriter::new(file), Compression::default());
    bincode::serialize_into(&mut encoder, &snapshot).map_err(|e| FsError::Io(io::Error::other(e)))?;
    encoder.finish()?.flush()?;
    Ok(())
}

/// Loads a VFS from the snapshot at `path`.
pub fn load(path: &Path) -> Result<Vfs> {
    let file = fs::File::open(path)?;
    let decoder = GzDecoder::new(BufReader::new(file));
    let snapshot: Snapshot = bincode::deserialize_from(decoder)
        .map_err(|e| FsError::SnapshotCorrupted(e.to_string()))?;
    snapshot.restore()
}

/// Loads the snapshot at `path`, or returns a fresh VFS built with
/// `config` if no snapshot exists yet.
pub fn load_or_default(path: &Path, config: IndexConfig) -> Result<Vfs> {
    if !path.exists() {
        return Ok(Vfs::new(config));
    }
    load(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use arbor_common::IndexBackend;

    fn populate() -> Vfs {
        let mut fs = Vfs::new(IndexConfig::for_backend(IndexBackend::RbTree));
        let root = fs.root();
        fs.mkdir(root, "/docs", false).unwrap();
        fs.mkdir(root, "/docs/drafts", false).unwrap();
        fs.write(root, "/docs/hello.txt", b"hi there").unwrap();
        fs.write(root, "/docs/drafts/wip.txt", b"unfinished").unwrap();
        fs.mkdir(root, "/empty", false).unwrap();
        fs
    }

    #[test]
    fn test_roundtrip_preserves_structure() {
        let fs = populate();
        let dir = tempfile::tempdir().unwrap();
        let state = dir.path().join("state.bin.gz");

        save(&fs, &state).unwrap();
        let restored = load(&state).unwrap();
        let root = restored.root();

        assert_eq!(
            restored.read(root, "/docs/hello.txt").unwrap(),
            Bytes::from_static(b"hi there")
        );
        assert_eq!(
            restored.read(root, "/docs/drafts/wip.txt").unwrap(),
            Bytes::from_static(b"unfinished")
        );
        let names: Vec<_> = restored
            .ls(root, "/")
            .unwrap()
            .into_iter()
            .map(|e| e.name)
            .collect();
        assert_eq!(names, ["docs", "empty"]);
        assert_eq!(restored.node_count(), fs.node_count());
    }

    #[test]
    fn test_roundtrip_preserves_ids_and_metadata() {
        let fs = populate();
        let root = fs.root();
        let before = fs.metadata(root, "/docs/hello.txt").unwrap();

        let dir = tempfile::tempdir().unwrap();
        let state = dir.path().join("state.bin.gz");
        save(&fs, &state).unwrap();
        let restored = load(&state).unwrap();

        let after = restored.metadata(restored.root(), "/docs/hello.txt").unwrap();
        assert_eq!(after.id, before.id);
        assert_eq!(after.created, before.created);
        assert_eq!(after.modified, before.modified);
        assert_eq!(after.size, before.size);

        // Fresh allocations resume past the preserved ids.
        let mut restored = restored;
        let root = restored.root();
        let new_id = restored.touch(root, "/fresh").unwrap();
        assert!(new_id > before.id);
    }

    #[test]
    fn test_roundtrip_preserves_backend_choice() {
        let fs = populate();
        assert_eq!(fs.index_config().backend, IndexBackend::RbTree);

        let dir = tempfile::tempdir().unwrap();
        let state = dir.path().join("state.bin.gz");
        save(&fs, &state).unwrap();
        let restored = load(&state).unwrap();
        assert_eq!(restored.index_config().backend, IndexBackend::RbTree);
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let state = dir.path().join("nope.bin.gz");
        let fs = load_or_default(&state, IndexConfig::default()).unwrap();
        assert_eq!(fs.node_count(), 1); // just the root
    }

    #[test]
    fn test_load_corrupt_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let state = dir.path().join("garbage.bin.gz");
        std::fs::write(&state, b"not a gzip stream at all").unwrap();
        assert!(matches!(
            load(&state),
            Err(FsError::SnapshotCorrupted(_)) | Err(FsError::Io(_))
        ));
    }

    #[test]
    fn test_save_overwrites() {
        let mut fs = populate();
        let dir = tempfile::tempdir().unwrap();
        let state = dir.path().join("state.bin.gz");
        save(&fs, &state).unwrap();

        let root = fs.root();
        fs.rm(root, "/docs", true).unwrap();
        save(&fs, &state).unwrap();

        let restored = load(&state).unwrap();
        assert!(matches!(
            restored.resolve(restored.root(), "/docs"),
            Err(FsError::NotFound(_))
        ));
    }
}
