//! A diagnostic trace type identifying a step of a descent through the tree.
//!
//! Earlier revisions of this lineage bitpacked a scale index and a point index into a single
//! `u64` to use as a hashmap key into per-layer node storage. This tree has no such storage —
//! nodes are addressed directly by `Arc`, so the only remaining use for a `(level, index)` pair
//! is to describe *where in the descent* a query passed, for tests and diagnostics.

use std::fmt;

use serde::{Deserialize, Serialize};

/// `(level, child_index)`: the level of the node visited, and the index into its parent's
/// child list that was taken to reach it (`0` for the root, which has no parent).
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeAddress {
    level: i64,
    child_index: usize,
}

impl NodeAddress {
    /// Builds a trace entry for a node at `level`, reached via `child_index` of its parent.
    pub fn new(level: i64, child_index: usize) -> Self {
        NodeAddress { level, child_index }
    }

    /// The level of the node this entry describes.
    pub fn level(&self) -> i64 {
        self.level
    }

    /// The index into the parent's child list used to reach this node.
    pub fn child_index(&self) -> usize {
        self.child_index
    }
}

impl From<(i64, usize)> for NodeAddress {
    fn from(n: (i64, usize)) -> NodeAddress {
        NodeAddress::new(n.0, n.1)
    }
}

impl From<NodeAddress> for (i64, usize) {
    fn from(n: NodeAddress) -> (i64, usize) {
        (n.level, n.child_index)
    }
}

impl fmt::Display for NodeAddress {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "({}, {})", self.level, self.child_index)
    }
}
