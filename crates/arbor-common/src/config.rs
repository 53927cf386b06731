//! Configuration structures for ArborFS.

use serde::{Deserialize, Serialize};

/// Default minimum degree for the B-tree directory index.
pub const DEFAULT_MIN_DEGREE: usize = 8;

/// Directory index backend selection.
///
/// Both backends expose identical externally observable ordering and error
/// behavior; swapping backends changes only performance characteristics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum IndexBackend {
    /// Hand-rolled multi-way B-tree.
    #[default]
    BTree,
    /// Red-black binary search tree.
    RbTree,
}

impl std::str::FromStr for IndexBackend {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "btree" => Ok(IndexBackend::BTree),
            "rbtree" => Ok(IndexBackend::RbTree),
            other => Err(format!("unknown index backend: {}", other)),
        }
    }
}

impl std::fmt::Display for IndexBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            IndexBackend::BTree => "btree",
            IndexBackend::RbTree => "rbtree",
        };
        write!(f, "{}", name)
    }
}

/// Configuration for directory index construction.
///
/// Every directory in a tree is built from the same config; snapshots record
/// it so a reloaded tree uses the backend it was built with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexConfig {
    /// Which ordered-index implementation backs each directory.
    pub backend: IndexBackend,
    /// Minimum degree `t` for the B-tree backend (ignored by the red-black
    /// backend). Nodes hold between `t-1` and `2t-1` keys.
    pub btree_min_degree: usize,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            backend: IndexBackend::BTree,
            btree_min_degree: DEFAULT_MIN_DEGREE,
        }
    }
}

impl IndexConfig {
    /// Builds a config for the given backend with default parameters.
    pub fn for_backend(backend: IndexBackend) -> Self {
        Self {
            backend,
            ..Default::default()
        }
    }
}

/// Parameters for the synthetic VFS benchmark workload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchConfig {
    /// Number of top-level directories to create.
    pub dirs: usize,
    /// Number of files created inside each directory.
    pub files_per_dir: usize,
    /// Number of timed random read operations.
    pub ops: usize,
    /// Payload size in bytes for each generated file.
    pub payload_size: usize,
    /// RNG seed for repeatable workloads.
    pub seed: u64,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            dirs: 50,
            files_per_dir: 200,
            ops: 20_000,
            payload_size: 256,
            seed: 42,
        }
    }
}
