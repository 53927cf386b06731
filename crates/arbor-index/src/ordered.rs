//! The ordered-index contract shared by every directory backend.

use arbor_common::{IndexBackend, IndexConfig, InodeId};

use crate::btree::BTreeIndex;
use crate::rbtree::RbTreeIndex;

/// An ordered map from entry name to inode id, backing one directory.
///
/// Both implementations keep keys unique, yield ascending in-order
/// traversal, and bound their height logarithmically in the key count so
/// lookup/insert/delete stay O(log n). Externally observable ordering and
/// error behavior are identical across backends; only performance differs.
pub trait OrderedIndex {
    /// Inserts `value` under `key`, overwriting in place. Returns the
    /// previous value when the key was already present; an overwrite never
    /// changes the key count.
    fn insert(&mut self, key: String, value: InodeId) -> Option<InodeId>;

    /// Returns the value stored under `key`, if any. Does not mutate.
    fn lookup(&self, key: &str) -> Option<InodeId>;

    /// Removes `key`, rebalancing to restore the backend's structural
    /// invariant. Returns the removed value, or `None` if absent.
    fn delete(&mut self, key: &str) -> Option<InodeId>;

    /// Lazy in-order traversal, ascending by key. Restartable: each call
    /// yields a fresh iterator over the current contents.
    fn iter(&self) -> Box<dyn Iterator<Item = (&str, InodeId)> + '_>;

    /// Number of keys currently stored.
    fn len(&self) -> usize;

    /// Returns true if the index holds no keys.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Current tree height (0 for an empty index).
    fn height(&self) -> usize;

    /// Validates the backend's structural invariant, returning a
    /// description of the first violation found. Used by tests after
    /// mutation batches; not called on any hot path.
    fn check_invariants(&self) -> std::result::Result<(), String>;
}

/// Constructs an index of the configured backend.
///
/// Backend selection is a construction-time strategy: every directory in a
/// tree is built through this factory from one shared config.
pub fn build_index(config: &IndexConfig) -> Box<dyn OrderedIndex> {
    match config.backend {
        IndexBackend::BTree => Box::new(BTreeIndex::new(config.btree_min_degree)),
        IndexBackend::RbTree => Box::new(RbTreeIndex::new()),
    }
}
