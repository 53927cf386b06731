//! Red-black tree directory index.
//!
//! The comparative baseline for the multi-way B-tree: a binary search tree
//! whose nodes carry one of two colors, maintained so that
//!
//! - the root and every nil leaf are black,
//! - no red node has a red child,
//! - every path from a node to a descendant nil passes the same number of
//!   black nodes.
//!
//! Nodes live in an arena (`Vec`) with a free list; slot 0 is a shared nil
//! sentinel, which lets the delete fixup treat "no child" like any other
//! (black) node, exactly as the textbook formulation assumes.

use arbor_common::InodeId;

use crate::ordered::OrderedIndex;

/// Shared sentinel slot standing in for every absent child.
const NIL: usize = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Color {
    Red,
    Black,
}

#[derive(Debug)]
struct RbNode {
    key: String,
    val: InodeId,
    left: usize,
    right: usize,
    parent: usize,
    color: Color,
}

impl RbNode {
    fn sentinel() -> Self {
        Self {
            key: String::new(),
            val: InodeId(0),
            left: NIL,
            right: NIL,
            parent: NIL,
            color: Color::Black,
        }
    }
}

/// Red-black binary search tree mapping entry name to inode id.
pub struct RbTreeIndex {
    nodes: Vec<RbNode>,
    free: Vec<usize>,
    root: usize,
    len: usize,
}

impl RbTreeIndex {
    pub fn new() -> Self {
        Self {
            nodes: vec![RbNode::sentinel()],
            free: Vec::new(),
            root: NIL,
            len: 0,
        }
    }

    fn alloc(&mut self, node: RbNode) -> usize {
        if let Some(idx) = self.free.pop() {
            self.nodes[idx] = node;
            idx
        } else {
            self.nodes.push(node);
            self.nodes.len() - 1
        }
    }

    fn release(&mut self, idx: usize) {
        self.nodes[idx] = RbNode::sentinel();
        self.free.push(idx);
    }

    #[inline]
    fn color(&self, n: usize) -> Color {
        self.nodes[n].color
    }

    fn find(&self, key: &str) -> usize {
        let mut x = self.root;
        while x != NIL {
            match key.cmp(self.nodes[x].key.as_str()) {
                std::cmp::Ordering::Equal => return x,
                std::cmp::Ordering::Less => x = self.nodes[x].left,
                std::cmp::Ordering::Greater => x = self.nodes[x].right,
            }
        }
        NIL
    }

    fn minimum(&self, mut n: usize) -> usize {
        while self.nodes[n].left != NIL {
            n = self.nodes[n].left;
        }
        n
    }

    // =========================================================================
    // Rotations
    // =========================================================================

    fn left_rotate(&mut self, x: usize) {
        let y = self.nodes[x].right;
        let y_left = self.nodes[y].left;

        self.nodes[x].right = y_left;
        if y_left != NIL {
            self.nodes[y_left].parent = x;
        }

        let x_parent = self.nodes[x].parent;
        self.nodes[y].parent = x_parent;
        if x_parent == NIL {
            self.root = y;
        } else if self.nodes[x_parent].left == x {
            self.nodes[x_parent].left = y;
        } else {
            self.nodes[x_parent].right = y;
        }

        self.nodes[y].left = x;
        self.nodes[x].parent = y;
    }

    fn right_rotate(&mut self, x: usize) {
        let y = self.nodes[x].left;
        let y_right = self.nodes[y].right;

        self.nodes[x].left = y_right;
        if y_right != NIL {
            self.nodes[y_right].parent = x;
        }

        let x_parent = self.nodes[x].parent;
        self.nodes[y].parent = x_parent;
        if x_parent == NIL {
            self.root = y;
        } else if self.nodes[x_parent].right == x {
            self.nodes[x_parent].right = y;
        } else {
            self.nodes[x_parent].left = y;
        }

        self.nodes[y].right = x;
        self.nodes[x].parent = y;
    }

    // =========================================================================
    // Insert fixup
    // =========================================================================

    fn insert_fixup(&mut self, mut z: usize) {
        while self.color(self.nodes[z].parent) == Color::Red {
            let parent = self.nodes[z].parent;
            let grandparent = self.nodes[parent].parent;
            if parent == self.nodes[grandparent].left {
                let uncle = self.nodes[grandparent].right;
                if self.color(uncle) == Color::Red {
                    // Recolor and continue two levels up.
                    self.nodes[parent].color = Color::Black;
                    self.nodes[uncle].color = Color::Black;
                    self.nodes[grandparent].color = Color::Red;
                    z = grandparent;
                } else {
                    if z == self.nodes[parent].right {
                        z = parent;
                        self.left_rotate(z);
                    }
                    let parent = self.nodes[z].parent;
                    let grandparent = self.nodes[parent].parent;
                    self.nodes[parent].color = Color::Black;
                    self.nodes[grandparent].color = Color::Red;
                    self.right_rotate(grandparent);
                }
            } else {
                let uncle = self.nodes[grandparent].left;
                if self.color(uncle) == Color::Red {
                    self.nodes[parent].color = Color::Black;
                    self.nodes[uncle].color = Color::Black;
                    self.nodes[grandparent].color = Color::Red;
                    z = grandparent;
                } else {
                    if z == self.nodes[parent].left {
                        z = parent;
                        self.right_rotate(z);
                    }
                    let parent = self.nodes[z].parent;
                    let grandparent = self.nodes[parent].parent;
                    self.nodes[parent].color = Color::Black;
                    self.nodes[grandparent].color = Color::Red;
                    self.left_rotate(grandparent);
                }
            }
        }
        let root = self.root;
        self.nodes[root].color = Color::Black;
    }

    // =========================================================================
    // Delete
    // =========================================================================

    /// Replaces the subtree rooted at `u` with the one rooted at `v`.
    /// `v` may be the sentinel; its parent pointer is still set, which is
    /// what lets the delete fixup walk upward from a nil position.
    fn transplant(&mut self, u: usize, v: usize) {
        let u_parent = self.nodes[u].parent;
        if u_parent == NIL {
            self.root = v;
        } else if self.nodes[u_parent].left == u {
            self.nodes[u_parent].left = v;
        } else {
            self.nodes[u_parent].right = v;
        }
        self.nodes[v].parent = u_parent;
    }

    fn delete_fixup(&mut self, mut x: usize) {
        while x != self.root && self.color(x) == Color::Black {
            let parent = self.nodes[x].parent;
            if x == self.nodes[parent].left {
                let mut w = self.nodes[parent].right;
                if self.color(w) == Color::Red {
                    self.nodes[w].color = Color::Black;
                    self.nodes[parent].color = Color::Red;
                    self.left_rotate(parent);
                    w = self.nodes[parent].right;
                }
                if self.color(self.nodes[w].left) == Color::Black
                    && self.color(self.nodes[w].right) == Color::Black
                {
                    self.nodes[w].color = Color::Red;
                    x = parent;
                } else {
                    if self.color(self.nodes[w].right) == Color::Black {
                        let w_left = self.nodes[w].left;
                        self.nodes[w_left].color = Color::Black;
                        self.nodes[w].color = Color::Red;
                        self.right_rotate(w);
                        w = self.nodes[parent].right;
                    }
                    self.nodes[w].color = self.nodes[parent].color;
                    self.nodes[parent].color = Color::Black;
                    let w_right = self.nodes[w].right;
                    self.nodes[w_right].color = Color::Black;
                    self.left_rotate(parent);
                    x = self.root;
                }
            } else {
                let mut w = self.nodes[parent].left;
                if self.color(w) == Color::Red {
                    self.nodes[w].color = Color::Black;
                    self.nodes[parent].color = Color::Red;
                    self.right_rotate(parent);
                    w = self.nodes[parent].left;
                }
                if self.color(self.nodes[w].right) == Color::Black
                    && self.color(self.nodes[w].left) == Color::Black
                {
                    self.nodes[w].color = Color::Red;
                    x = parent;
                } else {
                    if self.color(self.nodes[w].left) == Color::Black {
                        let w_right = self.nodes[w].right;
                        self.nodes[w_right].color = Color::Black;
                        self.nodes[w].color = Color::Red;
                        self.left_rotate(w);
                        w = self.nodes[parent].left;
                    }
                    self.nodes[w].color = self.nodes[parent].color;
                    self.nodes[parent].color = Color::Black;
                    let w_left = self.nodes[w].left;
                    self.nodes[w_left].color = Color::Black;
                    self.right_rotate(parent);
                    x = self.root;
                }
            }
        }
        self.nodes[x].color = Color::Black;
        // Fixup may have written to the sentinel's links; keep it pristine.
        self.nodes[NIL].parent = NIL;
        self.nodes[NIL].color = Color::Black;
    }

    // =========================================================================
    // Validation
    // =========================================================================

    /// Returns the black-height of the subtree, checking colors and key
    /// ordering along the way.
    fn check_node(
        &self,
        node: usize,
        lower: Option<&str>,
        upper: Option<&str>,
        count: &mut usize,
    ) -> std::result::Result<usize, String> {
        if node == NIL {
            return Ok(1);
        }
        let n = &self.nodes[node];

        if let Some(low) = lower
            && n.key.as_str() <= low
        {
            return Err(format!("node {}: key below subtree lower bound", node));
        }
        if let Some(high) = upper
            && n.key.as_str() >= high
        {
            return Err(format!("node {}: key above subtree upper bound", node));
        }

        if n.color == Color::Red
            && (self.color(n.left) == Color::Red || self.color(n.right) == Color::Red)
        {
            return Err(format!("node {}: red node with red child", node));
        }

        *count += 1;

        let left_height = self.check_node(n.left, lower, Some(n.key.as_str()), count)?;
        let right_height = self.check_node(n.right, Some(n.key.as_str()), upper, count)?;
        if left_height != right_height {
            return Err(format!(
                "node {}: black-height mismatch ({} vs {})",
                node, left_height, right_height
            ));
        }

        Ok(left_height + if n.color == Color::Black { 1 } else { 0 })
    }

    fn depth(&self, node: usize) -> usize {
        if node == NIL {
            return 0;
        }
        1 + self
            .depth(self.nodes[node].left)
            .max(self.depth(self.nodes[node].right))
    }
}

impl Default for RbTreeIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl OrderedIndex for RbTreeIndex {
    fn insert(&mut self, key: String, value: InodeId) -> Option<InodeId> {
        let mut parent = NIL;
        let mut x = self.root;
        while x != NIL {
            parent = x;
            match key.as_str().cmp(self.nodes[x].key.as_str()) {
                std::cmp::Ordering::Equal => {
                    return Some(std::mem::replace(&mut self.nodes[x].val, value));
                }
                std::cmp::Ordering::Less => x = self.nodes[x].left,
                std::cmp::Ordering::Greater => x = self.nodes[x].right,
            }
        }

        let goes_left = parent != NIL && key.as_str() < self.nodes[parent].key.as_str();
        let z = self.alloc(RbNode {
            key,
            val: value,
            left: NIL,
            right: NIL,
            parent,
            color: Color::Red,
        });

        if parent == NIL {
            self.root = z;
        } else if goes_left {
            self.nodes[parent].left = z;
        } else {
            self.nodes[parent].right = z;
        }

        self.len += 1;
        self.insert_fixup(z);
        None
    }

    fn lookup(&self, key: &str) -> Option<InodeId> {
        let n = self.find(key);
        if n == NIL { None } else { Some(self.nodes[n].val) }
    }

    fn delete(&mut self, key: &str) -> Option<InodeId> {
        let z = self.find(key);
        if z == NIL {
            return None;
        }
        let removed = self.nodes[z].val;

        let mut fix_needed_color = self.nodes[z].color;
        let x;

        if self.nodes[z].left == NIL {
            x = self.nodes[z].right;
            self.transplant(z, x);
        } else if self.nodes[z].right == NIL {
            x = self.nodes[z].left;
            self.transplant(z, x);
        } else {
            // Two children: splice in the successor, which has no left child.
            let y = self.minimum(self.nodes[z].right);
            fix_needed_color = self.nodes[y].color;
            x = self.nodes[y].right;
            if self.nodes[y].parent == z {
                self.nodes[x].parent = y;
            } else {
                let y_right = self.nodes[y].right;
                self.transplant(y, y_right);
                let z_right = self.nodes[z].right;
                self.nodes[y].right = z_right;
                self.nodes[z_right].parent = y;
            }
            self.transplant(z, y);
            let z_left = self.nodes[z].left;
            self.nodes[y].left = z_left;
            self.nodes[z_left].parent = y;
            self.nodes[y].color = self.nodes[z].color;
        }

        if fix_needed_color == Color::Black {
            self.delete_fixup(x);
        } else {
            self.nodes[NIL].parent = NIL;
        }

        self.release(z);
        self.len -= 1;
        Some(removed)
    }

    fn iter(&self) -> Box<dyn Iterator<Item = (&str, InodeId)> + '_> {
        Box::new(RbTreeIter::new(self))
    }

    fn len(&self) -> usize {
        self.len
    }

    fn height(&self) -> usize {
        self.depth(self.root)
    }

    fn check_invariants(&self) -> std::result::Result<(), String> {
        if self.color(NIL) != Color::Black {
            return Err("sentinel is not black".to_string());
        }
        if self.root != NIL && self.color(self.root) != Color::Black {
            return Err("root is not black".to_string());
        }
        let mut count = 0;
        self.check_node(self.root, None, None, &mut count)?;
        if count != self.len {
            return Err(format!("len {} but counted {} nodes", self.len, count));
        }
        Ok(())
    }
}

/// In-order traversal over an explicit stack of ancestors.
struct RbTreeIter<'a> {
    tree: &'a RbTreeIndex,
    stack: Vec<usize>,
}

impl<'a> RbTreeIter<'a> {
    fn new(tree: &'a RbTreeIndex) -> Self {
        let mut iter = Self {
            tree,
            stack: Vec::new(),
        };
        iter.push_left_spine(tree.root);
        iter
    }

    fn push_left_spine(&mut self, mut node: usize) {
        while node != NIL {
            self.stack.push(node);
            node = self.tree.nodes[node].left;
        }
    }
}

impl<'a> Iterator for RbTreeIter<'a> {
    type Item = (&'a str, InodeId);

    fn next(&mut self) -> Option<Self::Item> {
        let tree = self.tree;
        let node = self.stack.pop()?;
        let n = &tree.nodes[node];
        self.push_left_spine(n.right);
        Some((n.key.as_str(), n.val))
    }
}
