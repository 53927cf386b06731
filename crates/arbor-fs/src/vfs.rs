//! High-level virtual file-system facade.
//!
//! Implements mkdir/touch/write/read/ls/rm on top of the inode table and
//! the pluggable directory index. Absolute paths resolve from the root;
//! relative paths resolve from a caller-supplied starting directory (the
//! REPL threads its current directory through that parameter rather than
//! keeping process-wide state).

use arbor_common::{FsError, IndexConfig, InodeId, NodeKind, Result};
use arbor_index::build_index;
use bytes::Bytes;

use crate::inode::{DirNode, InodeTable, Meta, Node};
use crate::path;

/// One row of a directory listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    pub kind: NodeKind,
    /// Payload bytes for a file, entry count for a directory.
    pub size: u64,
}

/// A single-user, in-memory virtual file system.
pub struct Vfs {
    table: InodeTable,
    root: InodeId,
    config: IndexConfig,
}

impl Vfs {
    /// Creates an empty tree whose directories are indexed per `config`.
    pub fn new(config: IndexConfig) -> Self {
        let mut table = InodeTable::new();
        let root = table.allocate_dir(None, build_index(&config));
        Self {
            table,
            root,
            config,
        }
    }

    pub(crate) fn from_parts(table: InodeTable, root: InodeId, config: IndexConfig) -> Self {
        Self {
            table,
            root,
            config,
        }
    }

    /// Id of the root directory.
    pub fn root(&self) -> InodeId {
        self.root
    }

    /// The index configuration every directory was built with.
    pub fn index_config(&self) -> IndexConfig {
        self.config
    }

    /// Direct node access by id (benchmarks and the REPL prompt use this;
    /// path-based callers go through [`Vfs::resolve`]).
    pub fn node(&self, id: InodeId) -> Option<&Node> {
        self.table.get(id)
    }

    /// Number of live nodes, root included.
    pub fn node_count(&self) -> usize {
        self.table.len()
    }

    // =========================================================================
    // Resolution
    // =========================================================================

    fn node_ref(&self, id: InodeId, ctx: &str) -> Result<&Node> {
        self.table
            .get(id)
            .ok_or_else(|| FsError::NotFound(ctx.to_string()))
    }

    fn dir_ref(&self, id: InodeId, ctx: &str) -> Result<&DirNode> {
        self.node_ref(id, ctx)?
            .as_dir()
            .ok_or_else(|| FsError::NotADirectory(ctx.to_string()))
    }

    fn dir_mut(&mut self, id: InodeId, ctx: &str) -> Result<&mut DirNode> {
        self.table
            .get_mut(id)
            .ok_or_else(|| FsError::NotFound(ctx.to_string()))?
            .as_dir_mut()
            .ok_or_else(|| FsError::NotADirectory(ctx.to_string()))
    }

    /// Walks `path` segment by segment, failing `NotFound` on the first
    /// missing entry and `NotADirectory` when a non-terminal segment
    /// resolves to a file.
    pub fn resolve(&self, start: InodeId, path: &str) -> Result<InodeId> {
        let parsed = path::parse(path)?;
        let mut cur = if parsed.absolute { self.root } else { start };
        let mut at = "/";
        for seg in &parsed.segments {
            let dir = self
                .node_ref(cur, at)?
                .as_dir()
                .ok_or_else(|| FsError::NotADirectory(at.to_string()))?;
            cur = dir
                .lookup_child(seg)
                .ok_or_else(|| FsError::NotFound((*seg).to_string()))?;
            at = seg;
        }
        Ok(cur)
    }

    /// Resolves the directory containing the final segment of `path`,
    /// returning it together with that segment.
    fn resolve_parent<'p>(&self, start: InodeId, path: &'p str) -> Result<(InodeId, &'p str)> {
        let parsed = path::parse(path)?;
        let name = parsed
            .last()
            .ok_or_else(|| FsError::InvalidPath(path.to_string()))?;
        let mut cur = if parsed.absolute { self.root } else { start };
        let mut at = "/";
        for seg in &parsed.segments[..parsed.segments.len() - 1] {
            let dir = self
                .node_ref(cur, at)?
                .as_dir()
                .ok_or_else(|| FsError::NotADirectory(at.to_string()))?;
            cur = dir
                .lookup_child(seg)
                .ok_or_else(|| FsError::NotFound((*seg).to_string()))?;
            at = seg;
        }
        Ok((cur, name))
    }

    // =========================================================================
    // Mutating operations
    // =========================================================================

    fn create_dir_in(&mut self, parent: InodeId, name: &str) -> Result<InodeId> {
        let dir = self.dir_ref(parent, name)?;
        if dir.lookup_child(name).is_some() {
            return Err(FsError::AlreadyExists(name.to_string()));
        }
        let index = build_index(&self.config);
        let id = self.table.allocate_dir(Some(parent), index);
        self.dir_mut(parent, name)?.add_child(name, id)?;
        Ok(id)
    }

    /// Creates a directory. Without `parents`, every intermediate segment
    /// must already exist; with it, missing ancestors are created one
    /// segment at a time, treating already-present directories as no-ops.
    pub fn mkdir(&mut self, start: InodeId, path: &str, parents: bool) -> Result<InodeId> {
        if parents {
            return self.mkdir_all(start, path);
        }
        let (parent, name) = self.resolve_parent(start, path)?;
        self.create_dir_in(parent, name)
    }

    fn mkdir_all(&mut self, start: InodeId, path: &str) -> Result<InodeId> {
        let parsed = path::parse(path)?;
        let mut cur = if parsed.absolute { self.root } else { start };
        let count = parsed.segments.len();
        for (i, seg) in parsed.segments.iter().enumerate() {
            let existing = self.dir_ref(cur, seg)?.lookup_child(seg);
            match existing {
                Some(existing) => {
                    if self.node_ref(existing, seg)?.kind().is_file() {
                        return Err(if i + 1 == count {
                            FsError::AlreadyExists((*seg).to_string())
                        } else {
                            FsError::NotADirectory((*seg).to_string())
                        });
                    }
                    cur = existing;
                }
                None => {
                    cur = self.create_dir_in(cur, seg)?;
                }
            }
        }
        Ok(cur)
    }

    /// Creates an empty file.
    pub fn touch(&mut self, start: InodeId, path: &str) -> Result<InodeId> {
        let (parent, name) = self.resolve_parent(start, path)?;
        let dir = self.dir_ref(parent, name)?;
        if dir.lookup_child(name).is_some() {
            return Err(FsError::AlreadyExists(name.to_string()));
        }
        let id = self.table.allocate_file(Some(parent));
        self.dir_mut(parent, name)?.add_child(name, id)?;
        Ok(id)
    }

    /// Writes `data` to the file at `path`, creating the file if the final
    /// segment does not exist. The parent directory must exist.
    pub fn write(&mut self, start: InodeId, path: &str, data: &[u8]) -> Result<InodeId> {
        let (parent, name) = self.resolve_parent(start, path)?;
        let existing = self.dir_ref(parent, name)?.lookup_child(name);
        match existing {
            Some(id) => {
                let file = self
                    .table
                    .get_mut(id)
                    .ok_or_else(|| FsError::NotFound(name.to_string()))?
                    .as_file_mut()
                    .ok_or_else(|| FsError::IsADirectory(name.to_string()))?;
                file.write(Bytes::copy_from_slice(data));
                Ok(id)
            }
            None => {
                let id = self.table.allocate_file(Some(parent));
                let file = self
                    .table
                    .get_mut(id)
                    .and_then(Node::as_file_mut)
                    .ok_or_else(|| FsError::NotFound(name.to_string()))?;
                file.write(Bytes::copy_from_slice(data));
                self.dir_mut(parent, name)?.add_child(name, id)?;
                Ok(id)
            }
        }
    }

    /// Returns the payload of the file at `path`.
    pub fn read(&self, start: InodeId, path: &str) -> Result<Bytes> {
        let id = self.resolve(start, path)?;
        let file = self
            .node_ref(id, path)?
            .as_file()
            .ok_or_else(|| FsError::IsADirectory(path.to_string()))?;
        Ok(file.read())
    }

    /// Lists the directory at `path` in ascending name order.
    pub fn ls(&self, start: InodeId, path: &str) -> Result<Vec<DirEntry>> {
        let id = self.resolve(start, path)?;
        let dir = self.dir_ref(id, path)?;
        let mut out = Vec::with_capacity(dir.entry_count());
        for (name, child) in dir.entries() {
            let node = self.node_ref(child, &name)?;
            out.push(DirEntry {
                name,
                kind: node.kind(),
                size: node.meta().size,
            });
        }
        Ok(out)
    }

    /// Removes the entry at `path`. A non-empty directory requires
    /// `recursive`; the root cannot be removed.
    pub fn rm(&mut self, start: InodeId, path: &str, recursive: bool) -> Result<()> {
        let (parent, name) = self.resolve_parent(start, path)?;
        let target = self
            .dir_ref(parent, name)?
            .lookup_child(name)
            .ok_or_else(|| FsError::NotFound(name.to_string()))?;
        if let Some(dir) = self.node_ref(target, name)?.as_dir()
            && !recursive
            && !dir.is_empty()
        {
            return Err(FsError::DirectoryNotEmpty(path.to_string()));
        }
        let doomed = self.collect_subtree(target);
        self.dir_mut(parent, name)?.remove_child(name)?;
        for id in doomed {
            self.table.remove(id);
        }
        Ok(())
    }

    fn collect_subtree(&self, id: InodeId) -> Vec<InodeId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(cur) = stack.pop() {
            out.push(cur);
            if let Some(dir) = self.table.get(cur).and_then(Node::as_dir) {
                stack.extend(dir.entries().into_iter().map(|(_, child)| child));
            }
        }
        out
    }

    // =========================================================================
    // Introspection
    // =========================================================================

    /// Stat-style metadata for the entry at `path`.
    pub fn metadata(&self, start: InodeId, path: &str) -> Result<Meta> {
        let id = self.resolve(start, path)?;
        Ok(self.node_ref(id, path)?.meta().clone())
    }

    /// Reconstructs the absolute path of `id` by walking parent
    /// back-references up to the root and recovering each segment name
    /// from the parent's index.
    pub fn display_path(&self, id: InodeId) -> Result<String> {
        if id == self.root {
            return Ok("/".to_string());
        }
        let mut segments = Vec::new();
        let mut cur = id;
        while cur != self.root {
            let ctx = format!("inode {}", cur);
            let parent = self
                .node_ref(cur, &ctx)?
                .meta()
                .parent
                .ok_or_else(|| FsError::NotFound(ctx.clone()))?;
            let name = self
                .dir_ref(parent, &ctx)?
                .name_of(cur)
                .ok_or_else(|| FsError::NotFound(ctx.clone()))?;
            segments.push(name);
            cur = parent;
        }
        segments.reverse();
        Ok(format!("/{}", segments.join("/")))
    }
}

impl Default for Vfs {
    fn default() -> Self {
        Self::new(IndexConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vfs() -> Vfs {
        Vfs::default()
    }

    #[test]
    fn test_mkdir_and_resolve() {
        let mut fs = vfs();
        let root = fs.root();
        let docs = fs.mkdir(root, "/docs", false).unwrap();
        assert_eq!(fs.resolve(root, "/docs").unwrap(), docs);
        assert_eq!(fs.metadata(root, "/docs").unwrap().kind, NodeKind::Directory);
    }

    #[test]
    fn test_mkdir_missing_intermediate() {
        let mut fs = vfs();
        let root = fs.root();
        assert!(matches!(
            fs.mkdir(root, "/a/b/c", false),
            Err(FsError::NotFound(_))
        ));
    }

    #[test]
    fn test_mkdir_parents_creates_chain() {
        let mut fs = vfs();
        let root = fs.root();
        let c = fs.mkdir(root, "/a/b/c", true).unwrap();
        assert_eq!(fs.resolve(root, "/a/b/c").unwrap(), c);
        // Existing prefix tolerated as a no-op.
        assert_eq!(fs.mkdir(root, "/a/b/c", true).unwrap(), c);
    }

    #[test]
    fn test_mkdir_parents_through_file_fails() {
        let mut fs = vfs();
        let root = fs.root();
        fs.touch(root, "/blocker").unwrap();
        assert!(matches!(
            fs.mkdir(root, "/blocker/sub", true),
            Err(FsError::NotADirectory(_))
        ));
        assert!(matches!(
            fs.mkdir(root, "/blocker", true),
            Err(FsError::AlreadyExists(_))
        ));
    }

    #[test]
    fn test_mkdir_duplicate() {
        let mut fs = vfs();
        let root = fs.root();
        fs.mkdir(root, "/docs", false).unwrap();
        assert!(matches!(
            fs.mkdir(root, "/docs", false),
            Err(FsError::AlreadyExists(_))
        ));
    }

    #[test]
    fn test_touch_and_duplicate() {
        let mut fs = vfs();
        let root = fs.root();
        fs.touch(root, "/a.txt").unwrap();
        assert!(matches!(
            fs.touch(root, "/a.txt"),
            Err(FsError::AlreadyExists(_))
        ));
    }

    #[test]
    fn test_write_read_roundtrip() {
        let mut fs = vfs();
        let root = fs.root();
        fs.mkdir(root, "/a", false).unwrap();
        fs.mkdir(root, "/a/b", false).unwrap();
        fs.touch(root, "/a/b/c").unwrap();
        fs.write(root, "/a/b/c", b"hello").unwrap();
        assert_eq!(fs.read(root, "/a/b/c").unwrap(), Bytes::from_static(b"hello"));
        assert_eq!(fs.metadata(root, "/a/b/c").unwrap().size, 5);
    }

    #[test]
    fn test_write_creates_missing_file() {
        let mut fs = vfs();
        let root = fs.root();
        fs.mkdir(root, "/docs", false).unwrap();
        fs.write(root, "/docs/new.txt", b"content").unwrap();
        assert_eq!(
            fs.read(root, "/docs/new.txt").unwrap(),
            Bytes::from_static(b"content")
        );
    }

    #[test]
    fn test_write_requires_parent() {
        let mut fs = vfs();
        let root = fs.root();
        assert!(matches!(
            fs.write(root, "/missing/file.txt", b"x"),
            Err(FsError::NotFound(_))
        ));
    }

    #[test]
    fn test_write_to_directory_fails() {
        let mut fs = vfs();
        let root = fs.root();
        fs.mkdir(root, "/docs", false).unwrap();
        assert!(matches!(
            fs.write(root, "/docs", b"x"),
            Err(FsError::IsADirectory(_))
        ));
        assert!(matches!(
            fs.read(root, "/docs"),
            Err(FsError::IsADirectory(_))
        ));
    }

    #[test]
    fn test_resolve_through_file_fails() {
        let mut fs = vfs();
        let root = fs.root();
        fs.touch(root, "/file").unwrap();
        assert!(matches!(
            fs.resolve(root, "/file/deeper"),
            Err(FsError::NotADirectory(_))
        ));
    }

    #[test]
    fn test_ls_ordered() {
        let mut fs = vfs();
        let root = fs.root();
        fs.mkdir(root, "/a", false).unwrap();
        for name in ["z", "a", "m"] {
            fs.touch(root, &format!("/a/{}", name)).unwrap();
        }
        let names: Vec<_> = fs.ls(root, "/a").unwrap().into_iter().map(|e| e.name).collect();
        assert_eq!(names, ["a", "m", "z"]);
    }

    #[test]
    fn test_ls_root_and_sizes() {
        let mut fs = vfs();
        let root = fs.root();
        fs.mkdir(root, "/docs", false).unwrap();
        fs.write(root, "/docs/f.txt", b"12345").unwrap();
        let listing = fs.ls(root, "/").unwrap();
        assert_eq!(listing.len(), 1);
        assert_eq!(listing[0].name, "docs");
        assert_eq!(listing[0].kind, NodeKind::Directory);
        assert_eq!(listing[0].size, 1);

        let inner = fs.ls(root, "/docs").unwrap();
        assert_eq!(inner[0].size, 5);
        assert_eq!(inner[0].kind, NodeKind::File);
    }

    #[test]
    fn test_rm_file() {
        let mut fs = vfs();
        let root = fs.root();
        fs.touch(root, "/a.txt").unwrap();
        let nodes_before = fs.node_count();
        fs.rm(root, "/a.txt", false).unwrap();
        assert!(matches!(fs.resolve(root, "/a.txt"), Err(FsError::NotFound(_))));
        assert_eq!(fs.node_count(), nodes_before - 1);
    }

    #[test]
    fn test_rm_nonempty_requires_recursive() {
        let mut fs = vfs();
        let root = fs.root();
        fs.mkdir(root, "/a", false).unwrap();
        fs.mkdir(root, "/a/b", false).unwrap();
        fs.touch(root, "/a/b/c").unwrap();

        assert!(matches!(
            fs.rm(root, "/a/b", false),
            Err(FsError::DirectoryNotEmpty(_))
        ));
        fs.rm(root, "/a/b", true).unwrap();
        assert!(matches!(fs.resolve(root, "/a/b"), Err(FsError::NotFound(_))));
        // The whole subtree is destroyed, not just unlinked.
        assert_eq!(fs.node_count(), 2); // root + /a
    }

    #[test]
    fn test_rm_empty_dir_without_recursive() {
        let mut fs = vfs();
        let root = fs.root();
        fs.mkdir(root, "/empty", false).unwrap();
        fs.rm(root, "/empty", false).unwrap();
        assert!(matches!(fs.resolve(root, "/empty"), Err(FsError::NotFound(_))));
    }

    #[test]
    fn test_rm_root_rejected() {
        let mut fs = vfs();
        let root = fs.root();
        assert!(matches!(fs.rm(root, "/", true), Err(FsError::InvalidPath(_))));
    }

    #[test]
    fn test_rm_missing() {
        let mut fs = vfs();
        let root = fs.root();
        assert!(matches!(
            fs.rm(root, "/ghost", false),
            Err(FsError::NotFound(_))
        ));
    }

    #[test]
    fn test_relative_resolution() {
        let mut fs = vfs();
        let root = fs.root();
        let docs = fs.mkdir(root, "/docs", false).unwrap();
        fs.touch(root, "/docs/note").unwrap();

        let id = fs.resolve(docs, "note").unwrap();
        assert_eq!(id, fs.resolve(root, "/docs/note").unwrap());

        // Absolute paths ignore the starting directory.
        assert_eq!(fs.resolve(docs, "/docs").unwrap(), docs);
    }

    #[test]
    fn test_display_path() {
        let mut fs = vfs();
        let root = fs.root();
        let c = fs.mkdir(root, "/a/b/c", true).unwrap();
        assert_eq!(fs.display_path(c).unwrap(), "/a/b/c");
        assert_eq!(fs.display_path(root).unwrap(), "/");
    }

    #[test]
    fn test_entry_count_tracks_size() {
        let mut fs = vfs();
        let root = fs.root();
        fs.mkdir(root, "/d", false).unwrap();
        for i in 0..5 {
            fs.touch(root, &format!("/d/f{}", i)).unwrap();
        }
        assert_eq!(fs.metadata(root, "/d").unwrap().size, 5);
        fs.rm(root, "/d/f0", false).unwrap();
        assert_eq!(fs.metadata(root, "/d").unwrap().size, 4);
    }

    #[test]
    fn test_invalid_paths() {
        let mut fs = vfs();
        let root = fs.root();
        assert!(matches!(fs.resolve(root, ""), Err(FsError::InvalidPath(_))));
        assert!(matches!(
            fs.mkdir(root, "/", false),
            Err(FsError::InvalidPath(_))
        ));
    }

    #[test]
    fn test_resolve_root() {
        let fs = vfs();
        let root = fs.root();
        assert_eq!(fs.resolve(root, "/").unwrap(), root);
    }
}
