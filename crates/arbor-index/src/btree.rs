//! Hand-rolled multi-way B-tree directory index.
//!
//! Nodes live in a single arena (`Vec`) with a free list, so the tree is a
//! flat allocation rather than a web of boxed nodes. A node holds up to
//! `2t-1` keys and `2t` children for minimum degree `t`:
//!
//! ```text
//! internal:  [ k0  k1  k2 ]          leaf:  [ k0 k1 k2 ]
//!           /    |   |    \                 (no children)
//!          c0    c1  c2    c3
//! ```
//!
//! Insertion splits full children on the way down (median promoted to the
//! parent); a root split grows the tree by one level. Deletion repairs
//! underfull children while descending, borrowing from a richer sibling or
//! merging with one, and pulls internal hits down to a leaf via the
//! predecessor/successor; an empty root with a single child shrinks the
//! tree by one level.

use std::cmp::Ordering;

use arbor_common::{DEFAULT_MIN_DEGREE, InodeId};

use crate::ordered::OrderedIndex;

/// One arena slot. `vals` parallels `keys` in every node; `children` is
/// empty exactly when the node is a leaf.
#[derive(Debug, Default)]
struct BTreeNode {
    keys: Vec<String>,
    vals: Vec<InodeId>,
    children: Vec<usize>,
    leaf: bool,
}

impl BTreeNode {
    fn new_leaf() -> Self {
        Self {
            leaf: true,
            ..Default::default()
        }
    }

    fn new_internal() -> Self {
        Self {
            leaf: false,
            ..Default::default()
        }
    }

    #[inline]
    fn search(&self, key: &str) -> std::result::Result<usize, usize> {
        self.keys.binary_search_by(|k| k.as_str().cmp(key))
    }
}

/// Multi-way B-tree mapping entry name to inode id.
pub struct BTreeIndex {
    nodes: Vec<BTreeNode>,
    free: Vec<usize>,
    root: usize,
    /// Minimum degree `t`; nodes hold between `t-1` and `2t-1` keys.
    t: usize,
    len: usize,
}

impl BTreeIndex {
    /// Creates an empty tree with the given minimum degree (clamped to 2,
    /// the smallest degree for which split and merge are defined).
    pub fn new(min_degree: usize) -> Self {
        Self {
            nodes: vec![BTreeNode::new_leaf()],
            free: Vec::new(),
            root: 0,
            t: min_degree.max(2),
            len: 0,
        }
    }

    /// Returns the minimum degree this tree was built with.
    pub fn min_degree(&self) -> usize {
        self.t
    }

    #[inline]
    fn max_keys(&self) -> usize {
        2 * self.t - 1
    }

    fn alloc(&mut self, node: BTreeNode) -> usize {
        if let Some(idx) = self.free.pop() {
            self.nodes[idx] = node;
            idx
        } else {
            self.nodes.push(node);
            self.nodes.len() - 1
        }
    }

    fn release(&mut self, idx: usize) {
        self.nodes[idx] = BTreeNode::default();
        self.free.push(idx);
    }

    // =========================================================================
    // Insert
    // =========================================================================

    /// Splits the full child at `parent.children[i]` around its median key,
    /// promoting the median into `parent`.
    fn split_child(&mut self, parent: usize, i: usize) {
        let t = self.t;
        let child = self.nodes[parent].children[i];

        let (median_key, median_val, right) = {
            let node = &mut self.nodes[child];
            let right_keys = node.keys.split_off(t);
            let right_vals = node.vals.split_off(t);
            let right_children = if node.leaf {
                Vec::new()
            } else {
                node.children.split_off(t)
            };
            // Median sits at t-1 after the split-off.
            let median_key = node.keys.pop().expect("full node has 2t-1 keys");
            let median_val = node.vals.pop().expect("full node has 2t-1 vals");
            let leaf = node.leaf;
            (
                median_key,
                median_val,
                BTreeNode {
                    keys: right_keys,
                    vals: right_vals,
                    children: right_children,
                    leaf,
                },
            )
        };

        let right_idx = self.alloc(right);
        let parent_node = &mut self.nodes[parent];
        parent_node.keys.insert(i, median_key);
        parent_node.vals.insert(i, median_val);
        parent_node.children.insert(i + 1, right_idx);
    }

    fn insert_non_full(&mut self, mut node: usize, key: String, value: InodeId) -> Option<InodeId> {
        loop {
            match self.nodes[node].search(&key) {
                Ok(i) => {
                    return Some(std::mem::replace(&mut self.nodes[node].vals[i], value));
                }
                Err(i) => {
                    if self.nodes[node].leaf {
                        self.nodes[node].keys.insert(i, key);
                        self.nodes[node].vals.insert(i, value);
                        return None;
                    }
                    let mut idx = i;
                    let child = self.nodes[node].children[idx];
                    if self.nodes[child].keys.len() == self.max_keys() {
                        self.split_child(node, idx);
                        // The promoted median may be the key itself, or may
                        // shift the descent one child to the right.
                        match key.as_str().cmp(self.nodes[node].keys[idx].as_str()) {
                            Ordering::Equal => {
                                return Some(std::mem::replace(
                                    &mut self.nodes[node].vals[idx],
                                    value,
                                ));
                            }
                            Ordering::Greater => idx += 1,
                            Ordering::Less => {}
                        }
                    }
                    node = self.nodes[node].children[idx];
                }
            }
        }
    }

    // =========================================================================
    // Delete
    // =========================================================================

    /// Largest (key, value) in the subtree rooted at `node`.
    fn max_entry(&self, mut node: usize) -> (String, InodeId) {
        loop {
            let n = &self.nodes[node];
            if n.leaf {
                // Invariant: every node reached here holds at least one key.
                return (
                    n.keys.last().expect("non-empty leaf").clone(),
                    *n.vals.last().expect("non-empty leaf"),
                );
            }
            node = *n.children.last().expect("internal node has children");
        }
    }

    /// Smallest (key, value) in the subtree rooted at `node`.
    fn min_entry(&self, mut node: usize) -> (String, InodeId) {
        loop {
            let n = &self.nodes[node];
            if n.leaf {
                return (
                    n.keys.first().expect("non-empty leaf").clone(),
                    *n.vals.first().expect("non-empty leaf"),
                );
            }
            node = *n.children.first().expect("internal node has children");
        }
    }

    /// Moves the last entry of `children[k]` up to separator `k` and the old
    /// separator down into the front of `children[k+1]`.
    fn rotate_right(&mut self, parent: usize, k: usize) {
        let left = self.nodes[parent].children[k];
        let right = self.nodes[parent].children[k + 1];

        let (donated_key, donated_val, donated_child) = {
            let node = &mut self.nodes[left];
            let dk = node.keys.pop().expect("donor has spare keys");
            let dv = node.vals.pop().expect("donor has spare vals");
            let dc = if node.leaf { None } else { node.children.pop() };
            (dk, dv, dc)
        };

        let (sep_key, sep_val) = {
            let node = &mut self.nodes[parent];
            (
                std::mem::replace(&mut node.keys[k], donated_key),
                std::mem::replace(&mut node.vals[k], donated_val),
            )
        };

        let node = &mut self.nodes[right];
        node.keys.insert(0, sep_key);
        node.vals.insert(0, sep_val);
        if let Some(c) = donated_child {
            node.children.insert(0, c);
        }
    }

    /// Mirror image of [`rotate_right`]: first entry of `children[k+1]` up,
    /// separator `k` down onto the back of `children[k]`.
    fn rotate_left(&mut self, parent: usize, k: usize) {
        let left = self.nodes[parent].children[k];
        let right = self.nodes[parent].children[k + 1];

        let (donated_key, donated_val, donated_child) = {
            let node = &mut self.nodes[right];
            let dk = node.keys.remove(0);
            let dv = node.vals.remove(0);
            let dc = if node.leaf {
                None
            } else {
                Some(node.children.remove(0))
            };
            (dk, dv, dc)
        };

        let (sep_key, sep_val) = {
            let node = &mut self.nodes[parent];
            (
                std::mem::replace(&mut node.keys[k], donated_key),
                std::mem::replace(&mut node.vals[k], donated_val),
            )
        };

        let node = &mut self.nodes[left];
        node.keys.push(sep_key);
        node.vals.push(sep_val);
        if let Some(c) = donated_child {
            node.children.push(c);
        }
    }

    /// Folds separator `k` and `children[k+1]` into `children[k]`, releasing
    /// the right node. Both children hold `t-1` keys when this is called, so
    /// the merged node holds exactly `2t-1`.
    fn merge_children(&mut self, parent: usize, k: usize) {
        let (sep_key, sep_val, right_idx) = {
            let node = &mut self.nodes[parent];
            let sep_key = node.keys.remove(k);
            let sep_val = node.vals.remove(k);
            let right_idx = node.children.remove(k + 1);
            (sep_key, sep_val, right_idx)
        };

        let (right_keys, right_vals, right_children) = {
            let node = &mut self.nodes[right_idx];
            (
                std::mem::take(&mut node.keys),
                std::mem::take(&mut node.vals),
                std::mem::take(&mut node.children),
            )
        };

        let left = self.nodes[parent].children[k];
        let node = &mut self.nodes[left];
        node.keys.push(sep_key);
        node.vals.push(sep_val);
        node.keys.extend(right_keys);
        node.vals.extend(right_vals);
        node.children.extend(right_children);

        self.release(right_idx);
    }

    /// Brings `parent.children[i]` up to at least `t` keys before a descent,
    /// borrowing from a sibling when one has keys to spare, else merging.
    /// Returns the child position to descend into (merging with the left
    /// sibling shifts it down by one).
    fn fix_child(&mut self, parent: usize, i: usize) -> usize {
        let t = self.t;

        if i > 0 {
            let left_sibling = self.nodes[parent].children[i - 1];
            if self.nodes[left_sibling].keys.len() >= t {
                self.rotate_right(parent, i - 1);
                return i;
            }
        }
        if i + 1 < self.nodes[parent].children.len() {
            let right_sibling = self.nodes[parent].children[i + 1];
            if self.nodes[right_sibling].keys.len() >= t {
                self.rotate_left(parent, i);
                return i;
            }
        }

        if i > 0 {
            self.merge_children(parent, i - 1);
            i - 1
        } else {
            self.merge_children(parent, i);
            i
        }
    }

    fn delete_from(&mut self, node: usize, key: &str) -> Option<InodeId> {
        let t = self.t;
        match self.nodes[node].search(key) {
            Ok(i) => {
                if self.nodes[node].leaf {
                    self.nodes[node].keys.remove(i);
                    return Some(self.nodes[node].vals.remove(i));
                }
                let left = self.nodes[node].children[i];
                let right = self.nodes[node].children[i + 1];
                if self.nodes[left].keys.len() >= t {
                    // Replace the hit with its in-order predecessor, then
                    // delete the predecessor from the left subtree.
                    let (pred_key, pred_val) = self.max_entry(left);
                    self.nodes[node].keys[i] = pred_key.clone();
                    let old = std::mem::replace(&mut self.nodes[node].vals[i], pred_val);
                    self.delete_from(left, &pred_key);
                    Some(old)
                } else if self.nodes[right].keys.len() >= t {
                    let (succ_key, succ_val) = self.min_entry(right);
                    self.nodes[node].keys[i] = succ_key.clone();
                    let old = std::mem::replace(&mut self.nodes[node].vals[i], succ_val);
                    self.delete_from(right, &succ_key);
                    Some(old)
                } else {
                    // Both neighbors are minimal: fold the key and the right
                    // child into the left child, then delete from the merge.
                    self.merge_children(node, i);
                    let merged = self.nodes[node].children[i];
                    self.delete_from(merged, key)
                }
            }
            Err(i) => {
                if self.nodes[node].leaf {
                    return None;
                }
                let child = self.nodes[node].children[i];
                let pos = if self.nodes[child].keys.len() < t {
                    self.fix_child(node, i)
                } else {
                    i
                };
                let target = self.nodes[node].children[pos];
                self.delete_from(target, key)
            }
        }
    }

    // =========================================================================
    // Validation
    // =========================================================================

    fn check_node(
        &self,
        node: usize,
        is_root: bool,
        lower: Option<&str>,
        upper: Option<&str>,
        count: &mut usize,
    ) -> std::result::Result<usize, String> {
        let n = &self.nodes[node];

        if n.keys.len() != n.vals.len() {
            return Err(format!(
                "node {}: {} keys but {} vals",
                node,
                n.keys.len(),
                n.vals.len()
            ));
        }
        if n.keys.len() > self.max_keys() {
            return Err(format!("node {}: overfull ({} keys)", node, n.keys.len()));
        }
        if !is_root && n.keys.len() < self.t - 1 {
            return Err(format!("node {}: underfull ({} keys)", node, n.keys.len()));
        }

        for pair in n.keys.windows(2) {
            if pair[0] >= pair[1] {
                return Err(format!("node {}: keys out of order", node));
            }
        }
        if let Some(low) = lower
            && n.keys.first().is_some_and(|k| k.as_str() <= low)
        {
            return Err(format!("node {}: key below subtree lower bound", node));
        }
        if let Some(high) = upper
            && n.keys.last().is_some_and(|k| k.as_str() >= high)
        {
            return Err(format!("node {}: key above subtree upper bound", node));
        }

        *count += n.keys.len();

        if n.leaf {
            if !n.children.is_empty() {
                return Err(format!("leaf {}: has children", node));
            }
            return Ok(1);
        }

        if n.children.len() != n.keys.len() + 1 {
            return Err(format!(
                "node {}: {} keys but {} children",
                node,
                n.keys.len(),
                n.children.len()
            ));
        }

        let mut depth = None;
        for (c, &child) in n.children.iter().enumerate() {
            let child_lower = if c == 0 {
                lower
            } else {
                Some(n.keys[c - 1].as_str())
            };
            let child_upper = if c == n.keys.len() {
                upper
            } else {
                Some(n.keys[c].as_str())
            };
            let d = self.check_node(child, false, child_lower, child_upper, count)?;
            match depth {
                None => depth = Some(d),
                Some(prev) if prev != d => {
                    return Err(format!("node {}: uneven leaf depth", node));
                }
                _ => {}
            }
        }
        Ok(depth.unwrap_or(0) + 1)
    }
}

impl Default for BTreeIndex {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_DEGREE)
    }
}

impl OrderedIndex for BTreeIndex {
    fn insert(&mut self, key: String, value: InodeId) -> Option<InodeId> {
        if self.nodes[self.root].keys.len() == self.max_keys() {
            // Root split: the tree grows by one level.
            let old_root = self.root;
            let new_root = self.alloc(BTreeNode::new_internal());
            self.nodes[new_root].children.push(old_root);
            self.root = new_root;
            self.split_child(new_root, 0);
        }
        let old = self.insert_non_full(self.root, key, value);
        if old.is_none() {
            self.len += 1;
        }
        old
    }

    fn lookup(&self, key: &str) -> Option<InodeId> {
        let mut node = self.root;
        loop {
            let n = &self.nodes[node];
            match n.search(key) {
                Ok(i) => return Some(n.vals[i]),
                Err(i) => {
                    if n.leaf {
                        return None;
                    }
                    node = n.children[i];
                }
            }
        }
    }

    fn delete(&mut self, key: &str) -> Option<InodeId> {
        let removed = self.delete_from(self.root, key);
        if removed.is_some() {
            self.len -= 1;
            // A propagated merge can leave an empty internal root holding a
            // single child; the tree shrinks by one level.
            if self.nodes[self.root].keys.is_empty() && !self.nodes[self.root].leaf {
                let old_root = self.root;
                self.root = self.nodes[old_root].children[0];
                self.release(old_root);
            }
        }
        removed
    }

    fn iter(&self) -> Box<dyn Iterator<Item = (&str, InodeId)> + '_> {
        Box::new(BTreeIter::new(self))
    }

    fn len(&self) -> usize {
        self.len
    }

    fn height(&self) -> usize {
        if self.len == 0 {
            return 0;
        }
        let mut height = 1;
        let mut node = self.root;
        while !self.nodes[node].leaf {
            node = self.nodes[node].children[0];
            height += 1;
        }
        height
    }

    fn check_invariants(&self) -> std::result::Result<(), String> {
        let root = &self.nodes[self.root];
        if !root.leaf && root.keys.is_empty() {
            return Err("internal root with no keys".to_string());
        }
        let mut count = 0;
        self.check_node(self.root, true, None, None, &mut count)?;
        if count != self.len {
            return Err(format!("len {} but counted {} keys", self.len, count));
        }
        Ok(())
    }
}

/// In-order traversal driven by an explicit stack of (node, next key).
/// A stack frame at (n, k) means children `0..=k` of `n` are done and key
/// `k` is the next to emit.
struct BTreeIter<'a> {
    tree: &'a BTreeIndex,
    stack: Vec<(usize, usize)>,
}

impl<'a> BTreeIter<'a> {
    fn new(tree: &'a BTreeIndex) -> Self {
        let mut iter = Self {
            tree,
            stack: Vec::new(),
        };
        if tree.len > 0 {
            iter.push_leftmost(tree.root);
        }
        iter
    }

    fn push_leftmost(&mut self, mut node: usize) {
        loop {
            self.stack.push((node, 0));
            let n = &self.tree.nodes[node];
            if n.leaf {
                break;
            }
            node = n.children[0];
        }
    }
}

impl<'a> Iterator for BTreeIter<'a> {
    type Item = (&'a str, InodeId);

    fn next(&mut self) -> Option<Self::Item> {
        let tree = self.tree;
        loop {
            let (node, k) = *self.stack.last()?;
            let n = &tree.nodes[node];
            if k >= n.keys.len() {
                self.stack.pop();
                continue;
            }
            self.stack.last_mut().expect("stack is non-empty").1 = k + 1;
            if !n.leaf {
                let child = n.children[k + 1];
                self.push_leftmost(child);
            }
            return Some((n.keys[k].as_str(), n.vals[k]));
        }
    }
}
