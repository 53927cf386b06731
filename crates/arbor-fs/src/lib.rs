//! In-memory hierarchical file-system model for ArborFS.
//!
//! This crate provides:
//! - Inode metadata and the table that owns every node
//! - Directory and file node types over a pluggable ordered index
//! - The VFS facade: path resolution, mkdir/touch/write/read/ls/rm
//! - Snapshot persistence (compressed recursive serialization)

pub mod inode;
pub mod path;
pub mod snapshot;
pub mod vfs;

pub use inode::{DirNode, FileNode, InodeTable, Meta, Node};
pub use snapshot::{Snapshot, load, load_or_default, save};
pub use vfs::{DirEntry, Vfs};
