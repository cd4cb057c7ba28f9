/*
* Licensed to Elasticsearch B.V. under one or more contributor
* license agreements. See the NOTICE file distributed with
* this work for additional information regarding copyright
* ownership. Elasticsearch B.V. licenses this file to you under
* the Apache License, Version 2.0 (the "License"); you may
* not use this file except in compliance with the License.
* You may obtain a copy of the License at
*
*  http://www.apache.org/licenses/LICENSE-2.0
*
* Unless required by applicable law or agreed to in writing,
* software distributed under the License is distributed on an
* "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
* KIND, either express or implied.  See the License for the
* specific language governing permissions and limitations
* under the License.
*/

//! # The Node
//! This is the workhorse of the library. Each node owns a point, a level, and a lock-guarded
//! set of children. Traversal takes a node's read lock; attaching a new child takes its write
//! lock; nothing else touches a node.

use std::sync::{Arc, RwLock};

use smallvec::SmallVec;

use sgtree_points::{Metric, Point, L2};

/// Most nodes have a handful of children; inlining a few of them avoids a heap allocation for
/// the common case.
type Children = SmallVec<[Arc<Node>; 4]>;

/// The mutable part of a node, behind a single `RwLock` so traversal and attachment never
/// race each other on this node's own state.
#[derive(Debug, Default)]
struct NodeInner {
    children: Children,
    /// Upper bound on the distance from this node's point to any descendant's point. `0` until
    /// `calc_maxdist` tightens it.
    maxdist_ub: f64,
    /// Opaque caller-attached payload.
    ext_prop: Vec<u8>,
}

/// A single cover tree vertex.
#[derive(Debug)]
pub struct Node {
    point: Point,
    level: i64,
    /// Internal identifier, assigned from the tree's atomic counter at insertion time. Not
    /// renumbered by anything in this revision; kept mutable per the original contract even
    /// though nothing currently writes it after creation.
    id: u64,
    uid: u64,
    inner: RwLock<NodeInner>,
}

impl Node {
    /// Builds a new, childless node.
    pub fn new(point: Point, level: i64, id: u64, uid: u64) -> Self {
        Node {
            point,
            level,
            id,
            uid,
            inner: RwLock::new(NodeInner::default()),
        }
    }

    /// The point stored at this node.
    pub fn point(&self) -> &Point {
        &self.point
    }

    /// The level this node sits at. Every child has `level - 1`.
    pub fn level(&self) -> i64 {
        self.level
    }

    /// The internal id assigned at insertion.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// The caller-supplied unique identifier.
    pub fn uid(&self) -> u64 {
        self.uid
    }

    /// The L2 distance from this node's point to `point`.
    pub fn dist(&self, point: &Point) -> f64 {
        L2::dist(self.point.as_slice(), point.as_slice())
    }

    /// The L2 distance from this node's point to `other`'s point.
    pub fn dist_to(&self, other: &Node) -> f64 {
        self.dist(&other.point)
    }

    /// The cached upper bound on distance to any descendant.
    pub fn maxdist_ub(&self) -> f64 {
        self.inner.read().unwrap().maxdist_ub
    }

    /// Overwrites the cached descendant-distance bound. Called only by `calc_maxdist`.
    pub(crate) fn set_maxdist_ub(&self, bound: f64) {
        self.inner.write().unwrap().maxdist_ub = bound;
    }

    /// The caller-attached opaque payload.
    pub fn ext_prop(&self) -> Vec<u8> {
        self.inner.read().unwrap().ext_prop.clone()
    }

    /// Replaces the caller-attached opaque payload.
    pub fn set_ext_prop(&self, ext_prop: Vec<u8>) {
        self.inner.write().unwrap().ext_prop = ext_prop;
    }

    /// A snapshot clone of the current children. Cheap: each element is an `Arc` clone.
    pub fn children(&self) -> Vec<Arc<Node>> {
        self.inner.read().unwrap().children.to_vec()
    }

    /// The number of children currently attached.
    pub fn children_len(&self) -> usize {
        self.inner.read().unwrap().children.len()
    }

    /// Builds a new child at `level - 1` and appends it under this node's write lock.
    pub(crate) fn add_child(&self, point: Point, uid: u64, id: u64) -> Arc<Node> {
        let child = Arc::new(Node::new(point, self.level - 1, id, uid));
        self.inner.write().unwrap().children.push(Arc::clone(&child));
        child
    }

    /// Attaches `point` as a child, but re-scans for a covering child under this node's write
    /// lock first — a writer may have raced one in since the caller's read-locked scan. Returns
    /// the child to recurse into (existing or newly built) and whether it already existed.
    pub(crate) fn attach_or_find_covering_child(
        &self,
        point: &Point,
        covdist: f64,
        uid: u64,
        id: u64,
    ) -> (Arc<Node>, bool) {
        let mut inner = self.inner.write().unwrap();
        for child in inner.children.iter() {
            if child.dist(point) <= covdist {
                return (Arc::clone(child), true);
            }
        }
        let child = Arc::new(Node::new(point.clone(), self.level - 1, id, uid));
        inner.children.push(Arc::clone(&child));
        (child, false)
    }

    /// Attaches `point` as a child without descent (used at the truncation floor, where the
    /// tree deliberately stops materializing further levels). Re-scans under the write lock for
    /// an exact (distance-zero) duplicate first, since a truncated node can't rely on covering
    /// descent to have caught it. Returns `None` for a duplicate.
    pub(crate) fn attach_or_reject_duplicate(
        &self,
        point: &Point,
        uid: u64,
        id: u64,
    ) -> Option<Arc<Node>> {
        let mut inner = self.inner.write().unwrap();
        if inner.children.iter().any(|c| c.dist(point) == 0.0) {
            return None;
        }
        let child = Arc::new(Node::new(point.clone(), self.level - 1, id, uid));
        inner.children.push(Arc::clone(&child));
        Some(child)
    }

    /// Removes the child with the given `uid`, if present. Declared for contract completeness;
    /// unreachable on the insert-only path this revision implements (see Non-goals).
    pub(crate) fn remove_child(&self, uid: u64) -> bool {
        let mut inner = self.inner.write().unwrap();
        let before = inner.children.len();
        inner.children.retain(|c| c.uid != uid);
        inner.children.len() != before
    }

    /// Attaches an already-constructed node as a child, used only during root promotion where
    /// the old root (with its own already-built subtree) becomes the sole child of a fresh node
    /// one level up.
    pub(crate) fn attach_existing_child(&self, child: Arc<Node>) {
        self.inner.write().unwrap().children.push(child);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pt(values: &[f64]) -> Point {
        Point::from(values)
    }

    #[test]
    fn dist_is_symmetric_l2() {
        let a = Node::new(pt(&[0.0, 0.0]), 0, 0, 1);
        let b = pt(&[3.0, 4.0]);
        assert_eq!(a.dist(&b), 5.0);
    }

    #[test]
    fn add_child_appends_one_level_down() {
        let parent = Node::new(pt(&[0.0]), 2, 0, 1);
        let child = parent.add_child(pt(&[1.0]), 2, 1);
        assert_eq!(child.level(), 1);
        assert_eq!(parent.children_len(), 1);
        assert_eq!(parent.children()[0].uid(), 2);
    }

    #[test]
    fn remove_child_drops_matching_uid() {
        let parent = Node::new(pt(&[0.0]), 1, 0, 1);
        parent.add_child(pt(&[1.0]), 2, 1);
        parent.add_child(pt(&[2.0]), 3, 2);
        assert!(parent.remove_child(2));
        assert_eq!(parent.children_len(), 1);
        assert!(!parent.remove_child(2));
    }

    #[test]
    fn maxdist_ub_defaults_to_zero() {
        let n = Node::new(pt(&[0.0]), 0, 0, 1);
        assert_eq!(n.maxdist_ub(), 0.0);
        n.set_maxdist_ub(4.5);
        assert_eq!(n.maxdist_ub(), 4.5);
    }
}
