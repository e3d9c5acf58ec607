//! Tree traversal along both orderings.
//!
//! Every iterator here borrows the [`Tree`] immutably, so the borrow checker
//! statically rules out mutating the tree while a traversal is live. All
//! iterators exclude their start node; all are lazy.
//!
//! The document-order chains (`next_elements` / `prev_elements`) cross subtree
//! boundaries: from a node they continue into its descendants, then out into
//! later siblings of its ancestors. The sibling chains stay under one parent.

use crate::tree::{NodeId, Tree};

impl Tree {
    /// Everything after this node in document order, to the end of the tree.
    pub fn next_elements(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(self.next_element(id), move |&n| self.next_element(n))
    }

    /// Everything before this node in document order, back to the root.
    pub fn prev_elements(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(self.prev_element(id), move |&n| self.prev_element(n))
    }

    /// Later siblings under the same parent, nearest first.
    pub fn next_siblings(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(self.next_sibling(id), move |&n| self.next_sibling(n))
    }

    /// Earlier siblings under the same parent, nearest first.
    pub fn prev_siblings(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(self.prev_sibling(id), move |&n| self.prev_sibling(n))
    }

    /// Parents up to (and including) the hidden document root, nearest first.
    pub fn ancestors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(self.parent(id), move |&n| self.parent(n))
    }

    /// Direct children, in sibling order.
    pub fn children(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.contents(id).iter().copied()
    }

    /// Whole subtree below this node, in document order (pre-order). This is
    /// the bounded slice of the `next_element` chain that belongs to the
    /// subtree, so it costs one chain walk with no recursion.
    pub fn descendants(&self, id: NodeId) -> Descendants<'_> {
        let cur = self.contents(id).first().copied();
        let stop = self.next_element(self.last_descendant(id));
        Descendants {
            tree: self,
            cur,
            stop,
        }
    }
}

/// See [`Tree::descendants`].
pub struct Descendants<'a> {
    tree: &'a Tree,
    cur: Option<NodeId>,
    stop: Option<NodeId>,
}

impl Iterator for Descendants<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let cur = self.cur?;
        let next = self.tree.next_element(cur);
        self.cur = if next == self.stop { None } else { next };
        Some(cur)
    }
}
