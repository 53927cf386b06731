//! Inode metadata, directory/file nodes, and the table that owns them.
//!
//! The [`InodeTable`] is the single owner of every node; directories refer
//! to their children by [`InodeId`] through an ordered index, and each node
//! carries a non-owning parent id for path reconstruction. This keeps the
//! hierarchy a tree in the ownership sense: dropping an entry from the
//! table destroys the node, and no reference to it can outlive that.

use std::collections::HashMap;

use arbor_common::{FsError, InodeId, NodeKind, Result};
use arbor_index::OrderedIndex;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Metadata record shared by files and directories.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Meta {
    pub id: InodeId,
    pub kind: NodeKind,
    /// Non-owning back-reference to the containing directory; `None` for
    /// the root.
    pub parent: Option<InodeId>,
    pub created: DateTime<Utc>,
    pub modified: DateTime<Utc>,
    /// Payload bytes for a file, entry count for a directory.
    pub size: u64,
}

impl Meta {
    fn new(id: InodeId, kind: NodeKind, parent: Option<InodeId>) -> Self {
        let now = Utc::now();
        Self {
            id,
            kind,
            parent,
            created: now,
            modified: now,
            size: 0,
        }
    }

    /// Bumps the modification timestamp.
    pub fn touch_modified(&mut self) {
        self.modified = Utc::now();
    }
}

/// A directory: metadata plus an ordered child index (name -> inode id).
pub struct DirNode {
    pub meta: Meta,
    children: Box<dyn OrderedIndex>,
}

impl DirNode {
    fn new(id: InodeId, parent: Option<InodeId>, index: Box<dyn OrderedIndex>) -> Self {
        Self {
            meta: Meta::new(id, NodeKind::Directory, parent),
            children: index,
        }
    }

    /// Rebuilds a directory from snapshot parts, bypassing timestamp
    /// updates.
    pub(crate) fn from_parts(meta: Meta, children: Box<dyn OrderedIndex>) -> Self {
        Self { meta, children }
    }

    /// Returns the child id stored under `name`.
    pub fn lookup_child(&self, name: &str) -> Option<InodeId> {
        self.children.lookup(name)
    }

    /// Links `id` under `name`, updating the entry-count size and the
    /// modification time. Fails if the name is already taken.
    pub fn add_child(&mut self, name: &str, id: InodeId) -> Result<()> {
        if self.children.lookup(name).is_some() {
            return Err(FsError::AlreadyExists(name.to_string()));
        }
        self.children.insert(name.to_string(), id);
        self.meta.size = self.children.len() as u64;
        self.meta.touch_modified();
        Ok(())
    }

    /// Unlinks `name`, returning the child id it mapped to. Fails if the
    /// name is absent.
    pub fn remove_child(&mut self, name: &str) -> Result<InodeId> {
        let removed = self
            .children
            .delete(name)
            .ok_or_else(|| FsError::NotFound(name.to_string()))?;
        self.meta.size = self.children.len() as u64;
        self.meta.touch_modified();
        Ok(removed)
    }

    /// Number of entries.
    pub fn entry_count(&self) -> usize {
        self.children.len()
    }

    /// Returns true if the directory has no entries.
    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    /// Child entries in ascending name order.
    pub fn entries(&self) -> Vec<(String, InodeId)> {
        self.children
            .iter()
            .map(|(name, id)| (name.to_string(), id))
            .collect()
    }

    /// Reverse lookup: the name `id` is linked under, if any. Linear in the
    /// entry count; only used for path display.
    pub fn name_of(&self, id: InodeId) -> Option<String> {
        self.children
            .iter()
            .find(|&(_, child)| child == id)
            .map(|(name, _)| name.to_string())
    }
}

/// A regular file holding an opaque byte payload.
pub struct FileNode {
    pub meta: Meta,
    content: Bytes,
}

impl FileNode {
    fn new(id: InodeId, parent: Option<InodeId>) -> Self {
        Self {
            meta: Meta::new(id, NodeKind::File, parent),
            content: Bytes::new(),
        }
    }

    pub(crate) fn from_parts(meta: Meta, content: Bytes) -> Self {
        Self { meta, content }
    }

    /// Replaces the payload, updating size and modification time.
    pub fn write(&mut self, data: Bytes) {
        self.meta.size = data.len() as u64;
        self.content = data;
        self.meta.touch_modified();
    }

    /// Returns the current payload. Cheap clone; no side effects.
    pub fn read(&self) -> Bytes {
        self.content.clone()
    }
}

/// One file-system node.
pub enum Node {
    Directory(DirNode),
    File(FileNode),
}

impl Node {
    pub fn meta(&self) -> &Meta {
        match self {
            Node::Directory(d) => &d.meta,
            Node::File(f) => &f.meta,
        }
    }

    pub fn meta_mut(&mut self) -> &mut Meta {
        match self {
            Node::Directory(d) => &mut d.meta,
            Node::File(f) => &mut f.meta,
        }
    }

    pub fn kind(&self) -> NodeKind {
        self.meta().kind
    }

    pub fn as_dir(&self) -> Option<&DirNode> {
        match self {
            Node::Directory(d) => Some(d),
            Node::File(_) => None,
        }
    }

    pub fn as_dir_mut(&mut self) -> Option<&mut DirNode> {
        match self {
            Node::Directory(d) => Some(d),
            Node::File(_) => None,
        }
    }

    pub fn as_file(&self) -> Option<&FileNode> {
        match self {
            Node::File(f) => Some(f),
            Node::Directory(_) => None,
        }
    }

    pub fn as_file_mut(&mut self) -> Option<&mut FileNode> {
        match self {
            Node::File(f) => Some(f),
            Node::Directory(_) => None,
        }
    }
}

/// Global registry owning every node, keyed by id.
///
/// Ids are handed out monotonically and never reused within a session, so
/// a stale id can never alias a newer node.
pub struct InodeTable {
    nodes: HashMap<InodeId, Node>,
    next_id: InodeId,
}

impl InodeTable {
    pub fn new() -> Self {
        Self {
            nodes: HashMap::new(),
            next_id: InodeId::FIRST,
        }
    }

    fn take_next_id(&mut self) -> InodeId {
        let id = self.next_id;
        self.next_id = id.next();
        id
    }

    /// Allocates a fresh directory node backed by `index`.
    pub fn allocate_dir(
        &mut self,
        parent: Option<InodeId>,
        index: Box<dyn OrderedIndex>,
    ) -> InodeId {
        let id = self.take_next_id();
        self.nodes
            .insert(id, Node::Directory(DirNode::new(id, parent, index)));
        id
    }

    /// Allocates a fresh empty file node.
    pub fn allocate_file(&mut self, parent: Option<InodeId>) -> InodeId {
        let id = self.take_next_id();
        self.nodes.insert(id, Node::File(FileNode::new(id, parent)));
        id
    }

    /// Inserts a node restored from a snapshot under its preserved id.
    /// Returns false if the id is already taken.
    pub(crate) fn insert_restored(&mut self, node: Node) -> bool {
        let id = node.meta().id;
        if self.nodes.contains_key(&id) {
            return false;
        }
        if id >= self.next_id {
            self.next_id = id.next();
        }
        self.nodes.insert(id, node);
        true
    }

    pub fn get(&self, id: InodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    pub fn get_mut(&mut self, id: InodeId) -> Option<&mut Node> {
        self.nodes.get_mut(&id)
    }

    /// Removes and destroys the node. Callers unlink it from its parent
    /// first; after this no reference to the node survives.
    pub fn remove(&mut self, id: InodeId) -> Option<Node> {
        self.nodes.remove(&id)
    }

    /// Number of live nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

impl Default for InodeTable {
    fn default() -> Self {
        Self::new()
    }
}
