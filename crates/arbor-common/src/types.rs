//! Core identifiers for ArborFS nodes.

use serde::{Deserialize, Serialize};

/// Unique identifier for one file-system node.
///
/// Ids are allocated monotonically by the inode table and are never reused
/// within a session. Parent back-references and directory index values are
/// ids, not owning references.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct InodeId(pub u64);

impl InodeId {
    /// First id handed out by a fresh inode table (the root directory).
    pub const FIRST: InodeId = InodeId(0);

    /// Returns the id following this one.
    pub fn next(&self) -> Self {
        Self(self.0 + 1)
    }
}

impl std::fmt::Display for InodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Kind of a file-system node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum NodeKind {
    Directory = 0,
    File = 1,
}

impl NodeKind {
    /// Returns true if this is a directory.
    pub fn is_dir(&self) -> bool {
        matches!(self, NodeKind::Directory)
    }

    /// Returns true if this is a regular file.
    pub fn is_file(&self) -> bool {
        matches!(self, NodeKind::File)
    }
}

impl std::fmt::Display for NodeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            NodeKind::Directory => "dir",
            NodeKind::File => "file",
        };
        write!(f, "{}", name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inode_id_ordering() {
        assert!(InodeId(1) < InodeId(2));
        assert_eq!(InodeId::FIRST, InodeId(0));
        assert_eq!(InodeId(41).next(), InodeId(42));
    }

    #[test]
    fn test_inode_id_display() {
        assert_eq!(InodeId(7).to_string(), "7");
    }

    #[test]
    fn test_node_kind_predicates() {
        assert!(NodeKind::Directory.is_dir());
        assert!(!NodeKind::Directory.is_file());
        assert!(NodeKind::File.is_file());
        assert!(!NodeKind::File.is_dir());
    }

    #[test]
    fn test_node_kind_display() {
        assert_eq!(NodeKind::Directory.to_string(), "dir");
        assert_eq!(NodeKind::File.to_string(), "file");
    }

    #[test]
    fn test_serde_roundtrip() {
        let original = InodeId(1234);
        let serialized = serde_json::to_string(&original).unwrap();
        let deserialized: InodeId = serde_json::from_str(&serialized).unwrap();
        assert_eq!(original, deserialized);

        for kind in [NodeKind::Directory, NodeKind::File] {
            let serialized = serde_json::to_string(&kind).unwrap();
            let deserialized: NodeKind = serde_json::from_str(&serialized).unwrap();
            assert_eq!(kind, deserialized);
        }
    }

    #[test]
    fn test_hash() {
        use std::collections::HashSet;

        let mut set = HashSet::new();
        set.insert(InodeId(1));
        set.insert(InodeId(2));
        set.insert(InodeId(1));
        assert_eq!(set.len(), 2);
    }
}
