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

//! # The Cover Tree
//! The tree owns its root behind a single `RwLock`, which doubles as the "global lock" for
//! root-identity and scale-extremum changes. Everything below the root is guarded node-by-node,
//! so concurrent inserts only contend with each other at the root (when it needs to be
//! promoted) and at whichever node they're both trying to attach a child to.

use std::sync::atomic::{AtomicI64, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};

use sgtree_points::Point;

use crate::errors::{SgTreeError, SgTreeResult};
use crate::powertable::PowerTable;

use super::node::Node;

fn cas_max(cell: &AtomicI64, candidate: i64) {
    let mut current = cell.load(Ordering::SeqCst);
    while candidate > current {
        match cell.compare_exchange_weak(current, candidate, Ordering::SeqCst, Ordering::SeqCst) {
            Ok(_) => break,
            Err(observed) => current = observed,
        }
    }
}

fn cas_min(cell: &AtomicI64, candidate: i64) {
    let mut current = cell.load(Ordering::SeqCst);
    while candidate < current {
        match cell.compare_exchange_weak(current, candidate, Ordering::SeqCst, Ordering::SeqCst) {
            Ok(_) => break,
            Err(observed) => current = observed,
        }
    }
}

/// A scapegoat-style cover tree: a leveled, geometrically-invariant spatial index supporting
/// concurrent insertion and branch-and-bound proximity queries.
#[derive(Debug)]
pub struct CoverTree {
    pub(crate) root: RwLock<Option<Arc<Node>>>,
    pub(crate) base: f64,
    pub(crate) powers: PowerTable,
    pub(crate) min_scale: AtomicI64,
    pub(crate) max_scale: AtomicI64,
    pub(crate) truncate_level: Option<i64>,
    pub(crate) count: AtomicUsize,
    pub(crate) dim: usize,
    pub(crate) next_id: AtomicU64,
}

/// Default base for covering/separation distances, per the source lineage's own default.
pub const DEFAULT_BASE: f64 = 1.3;

impl CoverTree {
    fn new_inner(dim: usize, base: f64, truncate_level: Option<i64>) -> Self {
        CoverTree {
            root: RwLock::new(None),
            base,
            powers: PowerTable::new(base),
            min_scale: AtomicI64::new(0),
            max_scale: AtomicI64::new(0),
            truncate_level,
            count: AtomicUsize::new(0),
            dim,
            next_id: AtomicU64::new(0),
        }
    }

    /// An empty tree fixed to `dim`-dimensional points. The first `insert` seeds the root.
    pub fn new_empty(dim: usize, base: f64, truncate_level: Option<i64>) -> Self {
        Self::new_inner(dim, base, truncate_level)
    }

    /// A tree containing exactly one point, at level 0.
    pub fn new_singleton(point: Point, uid: u64, base: f64, truncate_level: Option<i64>) -> Self {
        let tree = Self::new_inner(point.dim(), base, truncate_level);
        let root = Arc::new(Node::new(point, 0, 0, uid));
        *tree.root.write().unwrap() = Some(root);
        tree.count.store(1, Ordering::SeqCst);
        tree.next_id.store(1, Ordering::SeqCst);
        tree
    }

    /// The number of points in the tree.
    pub fn len(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }

    /// Whether the tree has any points.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The fixed dimension every inserted point must match.
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// The covering/separation base.
    pub fn base(&self) -> f64 {
        self.base
    }

    /// The lowest level currently materialized in the tree.
    pub fn min_scale(&self) -> i64 {
        self.min_scale.load(Ordering::SeqCst)
    }

    /// The highest level currently materialized in the tree (the root's level).
    pub fn max_scale(&self) -> i64 {
        self.max_scale.load(Ordering::SeqCst)
    }

    /// A clone of the root `Arc`, or `None` for an empty tree.
    pub fn root(&self) -> Option<Arc<Node>> {
        self.root.read().unwrap().clone()
    }

    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::SeqCst)
    }

    /// Inserts `point` under `uid`. Returns `Ok(true)` if a new node was attached, `Ok(false)` if
    /// an existing point at distance zero was found (a duplicate), and `Err` on dimension
    /// mismatch.
    pub fn insert(&self, point: Point, uid: u64) -> SgTreeResult<bool> {
        if point.dim() != self.dim {
            return Err(SgTreeError::DimensionMismatch {
                expected: self.dim,
                found: point.dim(),
            });
        }

        // Empty tree: seed the root under the write lock.
        {
            let mut root_guard = self.root.write().unwrap();
            if root_guard.is_none() {
                let id = self.next_id();
                *root_guard = Some(Arc::new(Node::new(point, 0, id, uid)));
                self.min_scale.store(0, Ordering::SeqCst);
                self.max_scale.store(0, Ordering::SeqCst);
                self.count.store(1, Ordering::SeqCst);
                return Ok(true);
            }
        }

        let mut root = self.root.read().unwrap().clone().unwrap();
        let mut d0 = root.dist(&point);

        // Root promotion: lift the root until it covers `point`.
        while d0 > self.powers.covdist(root.level()) {
            let mut root_guard = self.root.write().unwrap();
            let current_root = root_guard.clone().unwrap();
            // Re-verify under the lock: another thread may already have promoted far enough.
            let current_d0 = current_root.dist(&point);
            if current_d0 <= self.powers.covdist(current_root.level()) {
                root = current_root;
                d0 = current_d0;
                continue;
            }
            let new_level = current_root.level() + 1;
            let new_root = Arc::new(Node::new(current_root.point().clone(), new_level, current_root.id(), current_root.uid()));
            // Same point as the old root, so its bound on descendant distance carries over
            // unchanged rather than starting understated at 0.
            new_root.set_maxdist_ub(current_root.maxdist_ub());
            new_root.attach_existing_child(Arc::clone(&current_root));
            *root_guard = Some(Arc::clone(&new_root));
            cas_max(&self.max_scale, new_level);
            log::debug!("promoted root to level {}", new_level);
            root = new_root;
            d0 = root.dist(&point);
        }

        let mut path = vec![Arc::clone(&root)];
        if self.insert_at(&root, &point, uid, d0, &mut path)? {
            // Every ancestor on the path just gained a new descendant at a known distance.
            // Bumping each one's bound here (rather than waiting for `calc_maxdist`) keeps
            // `maxdist_ub` a valid upper bound at all times, per its invariant — it only ever
            // grows, so this can't make a previously-correct bound unsafe, and it means query
            // pruning is sound even for a tree that has never had `calc_maxdist` run on it.
            for ancestor in &path {
                let d = ancestor.dist(&point);
                if d > ancestor.maxdist_ub() {
                    ancestor.set_maxdist_ub(d);
                }
            }
            self.count.fetch_add(1, Ordering::SeqCst);
            Ok(true)
        } else {
            Ok(false)
        }
    }

    /// Recursively descends from `current` (holding a conceptual read lock on it — Rust's
    /// `RwLock` is released as soon as the guard drops, so we re-acquire per node rather than
    /// threading a guard through the recursion). `path` accumulates the ancestor chain so the
    /// caller can fix up `maxdist_ub` bounds after a successful attach.
    fn insert_at(
        &self,
        current: &Arc<Node>,
        point: &Point,
        uid: u64,
        curr_dist: f64,
        path: &mut Vec<Arc<Node>>,
    ) -> SgTreeResult<bool> {
        if curr_dist == 0.0 {
            return Ok(false);
        }

        let level = current.level();

        // Truncation floor: `current` already sits as deep below `max_scale` as `truncate_level`
        // allows, so don't look for (or create) a covering child one level further down — attach
        // directly here instead. A child still lands one level below `current`, same as any
        // other attachment; the floor bounds how many such levels the tree ever materializes.
        if let Some(floor) = self.truncate_level {
            if self.max_scale() - level >= floor {
                let id = self.next_id();
                return match current.attach_or_reject_duplicate(point, uid, id) {
                    Some(child) => {
                        cas_min(&self.min_scale, child.level());
                        log::debug!(
                            "truncation floor reached, attached uid {} at level {}",
                            uid,
                            child.level()
                        );
                        Ok(true)
                    }
                    None => Ok(false),
                };
            }
        }

        let children = current.children();
        for child in &children {
            let d = child.dist(point);
            if d <= self.powers.covdist(level - 1) {
                path.push(Arc::clone(child));
                return self.insert_at(child, point, uid, d, path);
            }
        }

        // No covering child found under the read-locked scan above: re-scan under `current`'s
        // write lock in case another writer raced one in, and if still none, allocate the child.
        let id = self.next_id();
        let (child, existed) =
            current.attach_or_find_covering_child(point, self.powers.covdist(level - 1), uid, id);
        if existed {
            path.push(Arc::clone(&child));
            let d = child.dist(point);
            return self.insert_at(&child, point, uid, d, path);
        }
        cas_min(&self.min_scale, child.level());
        log::debug!("attached uid {} at level {}", uid, child.level());
        Ok(true)
    }

    /// Post-order recompute of every node's `maxdist_ub`. Must run after bulk construction, and
    /// again after any batch of inserts whose query pruning needs tight bounds.
    pub fn calc_maxdist(&self) {
        if let Some(root) = self.root() {
            Self::calc_maxdist_at(&root);
        }
    }

    fn calc_maxdist_at(node: &Arc<Node>) -> f64 {
        let children = node.children();
        let bound = children
            .iter()
            .map(|c| node.dist_to(c) + Self::calc_maxdist_at(c))
            .fold(0.0_f64, f64::max);
        node.set_maxdist_ub(bound);
        bound
    }

    /// Verifies the covering and separation invariants for every internal node.
    pub fn check_covering(&self) -> bool {
        match self.root() {
            Some(root) => self.check_covering_at(&root),
            None => true,
        }
    }

    fn check_covering_at(&self, node: &Arc<Node>) -> bool {
        let level = node.level();
        let children = node.children();
        for c in &children {
            if node.dist_to(c) > self.powers.covdist(level) {
                return false;
            }
        }
        for i in 0..children.len() {
            for j in (i + 1)..children.len() {
                if children[i].dist_to(&children[j]) <= self.powers.sepdist(level - 1) {
                    return false;
                }
            }
        }
        children.iter().all(|c| self.check_covering_at(c))
    }

    /// Breadth-first UIDs from the root down, up to `k` of them — seeds for downstream
    /// clustering that wants a spread of well-separated representative points.
    pub fn best_initial_points(&self, k: usize) -> Vec<u64> {
        let mut out = Vec::new();
        let mut frontier = match self.root() {
            Some(root) => vec![root],
            None => return out,
        };
        while !frontier.is_empty() && out.len() < k {
            let mut next = Vec::new();
            for node in frontier {
                if out.len() >= k {
                    break;
                }
                out.push(node.uid());
                next.extend(node.children());
            }
            frontier = next;
        }
        out.truncate(k);
        out
    }

    /// Fanout per level: `(level, node_count)` pairs, for tests and cheap structural summaries.
    pub fn level_histogram(&self) -> Vec<(i64, usize)> {
        use std::collections::BTreeMap;
        let mut counts: BTreeMap<i64, usize> = BTreeMap::new();
        if let Some(root) = self.root() {
            let mut stack = vec![root];
            while let Some(node) = stack.pop() {
                *counts.entry(node.level()).or_insert(0) += 1;
                stack.extend(node.children());
            }
        }
        counts.into_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pt(values: &[f64]) -> Point {
        Point::from(values)
    }

    #[test]
    fn insert_into_empty_tree_seeds_root() {
        let tree = CoverTree::new_empty(2, 2.0, None);
        assert!(tree.insert(pt(&[0.0, 0.0]), 1).unwrap());
        assert_eq!(tree.len(), 1);
        assert_eq!(tree.root().unwrap().level(), 0);
    }

    #[test]
    fn duplicate_point_is_rejected() {
        let tree = CoverTree::new_empty(1, 2.0, None);
        assert!(tree.insert(pt(&[0.0]), 1).unwrap());
        assert!(!tree.insert(pt(&[0.0]), 2).unwrap());
        assert_eq!(tree.len(), 1);
    }

    #[test]
    fn dimension_mismatch_is_an_error() {
        let tree = CoverTree::new_empty(2, 2.0, None);
        tree.insert(pt(&[0.0, 0.0]), 1).unwrap();
        let err = tree.insert(pt(&[0.0]), 2).unwrap_err();
        match err {
            SgTreeError::DimensionMismatch { expected, found } => {
                assert_eq!(expected, 2);
                assert_eq!(found, 1);
            }
            _ => panic!("wrong error variant"),
        }
    }

    #[test]
    fn root_promotes_to_cover_a_distant_point() {
        let tree = CoverTree::new_empty(1, 2.0, None);
        tree.insert(pt(&[0.0]), 1).unwrap();
        let level_before = tree.root().unwrap().level();
        tree.insert(pt(&[1000.0]), 2).unwrap();
        assert!(tree.root().unwrap().level() > level_before);
        assert_eq!(tree.len(), 2);
    }

    #[test]
    fn calc_maxdist_bounds_every_descendant() {
        let tree = CoverTree::new_empty(1, 2.0, None);
        for (i, x) in [0.0, 1.0, -1.0, 2.0, -2.0].iter().enumerate() {
            tree.insert(pt(&[*x]), i as u64).unwrap();
        }
        tree.calc_maxdist();
        let root = tree.root().unwrap();
        fn max_descendant_dist(node: &Arc<Node>) -> f64 {
            node.children()
                .iter()
                .map(|c| node.dist_to(c) + max_descendant_dist(c))
                .fold(0.0, f64::max)
        }
        assert!(root.maxdist_ub() >= max_descendant_dist(&root) - 1e-9);
    }
}
