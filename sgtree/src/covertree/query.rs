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

//! # Branch-and-bound queries
//! Every query here shares the same frame: a priority queue over `(node, lower_bound)` pairs,
//! where `lower_bound = max(0, dist(node, p) - node.maxdist_ub)` is the closest any descendant
//! of `node` could possibly be to `p`. Pop the smallest lower bound, fold the node's own
//! distance into the running result, then push its children with their own lower bounds. Prune
//! (drop, never push) a node whose lower bound already exceeds the admissibility threshold.
//!
//! `furthest` runs the mirror-image search: an upper-bound priority queue, expanding by
//! `dist(node, p) + node.maxdist_ub`, looking for the largest true distance instead of the
//! smallest.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::Arc;

use sgtree_points::Point;

use super::node::Node;
use super::tree::CoverTree;
use crate::node_address::NodeAddress;

/// Wraps a node with its branch-and-bound priority so it can live in a `BinaryHeap`. `BinaryHeap`
/// is a max-heap, so `lower_bound` ordering is reversed to get a min-heap by lower bound.
struct Candidate {
    node: Arc<Node>,
    lower_bound: f64,
    child_index: usize,
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.lower_bound == other.lower_bound
    }
}
impl Eq for Candidate {}
impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed: smaller lower_bound sorts "greater" so BinaryHeap pops it first.
        other
            .lower_bound
            .partial_cmp(&self.lower_bound)
            .unwrap_or(Ordering::Equal)
    }
}

/// A result slot in a bounded k-NN heap: ordered so the *worst* (largest) distance sorts to the
/// top, making `BinaryHeap::pop` evict it when the heap overflows `k`.
struct ResultSlot {
    node: Arc<Node>,
    dist: f64,
}

impl PartialEq for ResultSlot {
    fn eq(&self, other: &Self) -> bool {
        self.dist == other.dist
    }
}
impl Eq for ResultSlot {}
impl PartialOrd for ResultSlot {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for ResultSlot {
    fn cmp(&self, other: &Self) -> Ordering {
        self.dist.partial_cmp(&other.dist).unwrap_or(Ordering::Equal)
    }
}

fn lower_bound(node: &Node, p: &Point) -> f64 {
    (node.dist(p) - node.maxdist_ub()).max(0.0)
}

fn upper_bound(node: &Node, p: &Point) -> f64 {
    node.dist(p) + node.maxdist_ub()
}

impl CoverTree {
    /// The single nearest node to `p`, or `None` for an empty tree.
    pub fn nearest(&self, p: &Point) -> Option<(Arc<Node>, f64)> {
        self.nearest_inner(p).map(|(result, _)| result)
    }

    /// Same as `nearest`, plus a `(level, child_index)` trace of the path the winning descent
    /// actually walked, for diagnostics.
    pub fn nearest_with_trace(&self, p: &Point) -> Option<((Arc<Node>, f64), Vec<NodeAddress>)> {
        self.nearest_inner(p)
    }

    fn nearest_inner(&self, p: &Point) -> Option<((Arc<Node>, f64), Vec<NodeAddress>)> {
        let root = self.root()?;
        let mut heap = BinaryHeap::new();
        heap.push(Candidate {
            lower_bound: lower_bound(&root, p),
            node: root,
            child_index: 0,
        });

        let mut best: Option<(Arc<Node>, f64)> = None;
        let mut trace = Vec::new();

        while let Some(Candidate { node, lower_bound: lb, child_index }) = heap.pop() {
            if let Some((_, best_dist)) = &best {
                if lb > *best_dist {
                    break;
                }
            }
            let d = node.dist(p);
            let is_better = match &best {
                Some((_, best_dist)) => d < *best_dist,
                None => true,
            };
            if is_better {
                trace.push(NodeAddress::new(node.level(), child_index));
                best = Some((Arc::clone(&node), d));
            }
            for (i, child) in node.children().into_iter().enumerate() {
                let child_lb = lower_bound(&child, p);
                let admissible = match &best {
                    Some((_, best_dist)) => child_lb <= *best_dist,
                    None => true,
                };
                if admissible {
                    heap.push(Candidate {
                        lower_bound: child_lb,
                        node: child,
                        child_index: i,
                    });
                }
            }
        }

        best.map(|b| (b, trace))
    }

    /// The `k` nearest nodes to `p`, sorted ascending by distance. Fewer than `k` are returned
    /// if the tree has fewer than `k` points.
    pub fn knn(&self, p: &Point, k: usize) -> Vec<(Arc<Node>, f64)> {
        self.knn_inner(p, k, None)
    }

    /// Like `knn`, but the per-level frontier considered is capped at `beam_size` candidates
    /// (smallest lower bound kept) — an intentionally approximate, cheaper query for large
    /// fanout trees.
    pub fn knn_beam(&self, p: &Point, k: usize, beam_size: usize) -> Vec<(Arc<Node>, f64)> {
        self.knn_inner(p, k, Some(beam_size))
    }

    fn knn_inner(&self, p: &Point, k: usize, beam_size: Option<usize>) -> Vec<(Arc<Node>, f64)> {
        if k == 0 {
            return Vec::new();
        }
        let root = match self.root() {
            Some(root) => root,
            None => return Vec::new(),
        };

        let mut frontier = BinaryHeap::new();
        frontier.push(Candidate {
            lower_bound: lower_bound(&root, p),
            node: root,
            child_index: 0,
        });
        let mut results: BinaryHeap<ResultSlot> = BinaryHeap::new();

        while let Some(Candidate { node, lower_bound: lb, .. }) = frontier.pop() {
            let threshold = if results.len() < k {
                f64::INFINITY
            } else {
                results.peek().map(|r| r.dist).unwrap_or(f64::INFINITY)
            };
            if lb > threshold {
                break;
            }

            let d = node.dist(p);
            results.push(ResultSlot {
                node: Arc::clone(&node),
                dist: d,
            });
            if results.len() > k {
                results.pop();
            }

            let next_threshold = if results.len() < k {
                f64::INFINITY
            } else {
                results.peek().map(|r| r.dist).unwrap_or(f64::INFINITY)
            };

            let mut pushed: Vec<Candidate> = node
                .children()
                .into_iter()
                .enumerate()
                .filter_map(|(i, child)| {
                    let child_lb = lower_bound(&child, p);
                    if child_lb <= next_threshold {
                        Some(Candidate {
                            lower_bound: child_lb,
                            node: child,
                            child_index: i,
                        })
                    } else {
                        None
                    }
                })
                .collect();

            if let Some(cap) = beam_size {
                pushed.sort_by(|a, b| a.lower_bound.partial_cmp(&b.lower_bound).unwrap_or(Ordering::Equal));
                pushed.truncate(cap);
            }
            for c in pushed {
                frontier.push(c);
            }
        }

        let mut out: Vec<(Arc<Node>, f64)> = results.into_iter().map(|r| (r.node, r.dist)).collect();
        out.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(Ordering::Equal));
        out
    }

    /// All nodes within radius `r` of `p`. Order is unspecified.
    pub fn range(&self, p: &Point, r: f64) -> Vec<(Arc<Node>, f64)> {
        let root = match self.root() {
            Some(root) => root,
            None => return Vec::new(),
        };
        let mut out = Vec::new();
        let mut stack = vec![root];
        while let Some(node) = stack.pop() {
            if lower_bound(&node, p) > r {
                continue;
            }
            let d = node.dist(p);
            if d <= r {
                out.push((Arc::clone(&node), d));
            }
            stack.extend(node.children());
        }
        out
    }

    /// The single furthest node from `p`, or `None` for an empty tree. Mirror-image
    /// branch-and-bound: expands by `dist(node, p) + node.maxdist_ub`, an upper bound on how far
    /// any descendant of `node` could possibly be.
    pub fn furthest(&self, p: &Point) -> Option<(Arc<Node>, f64)> {
        let root = self.root()?;

        let mut heap = BinaryHeap::new();
        heap.push(UpperBoundCandidate {
            upper_bound: upper_bound(&root, p),
            node: root,
        });

        let mut best: Option<(Arc<Node>, f64)> = None;

        while let Some(UpperBoundCandidate { node, upper_bound: ub }) = heap.pop() {
            if let Some((_, best_dist)) = &best {
                if ub < *best_dist {
                    break;
                }
            }
            let d = node.dist(p);
            let is_better = match &best {
                Some((_, best_dist)) => d > *best_dist,
                None => true,
            };
            if is_better {
                best = Some((Arc::clone(&node), d));
            }
            for child in node.children() {
                heap.push(UpperBoundCandidate {
                    upper_bound: upper_bound(&child, p),
                    node: child,
                });
            }
        }

        best
    }
}

struct UpperBoundCandidate {
    node: Arc<Node>,
    upper_bound: f64,
}

impl PartialEq for UpperBoundCandidate {
    fn eq(&self, other: &Self) -> bool {
        self.upper_bound == other.upper_bound
    }
}
impl Eq for UpperBoundCandidate {}
impl PartialOrd for UpperBoundCandidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for UpperBoundCandidate {
    fn cmp(&self, other: &Self) -> Ordering {
        self.upper_bound.partial_cmp(&other.upper_bound).unwrap_or(Ordering::Equal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pt(values: &[f64]) -> Point {
        Point::from(values)
    }

    fn line_tree() -> CoverTree {
        let tree = CoverTree::new_empty(1, 2.0, None);
        for (i, x) in [0.0, 1.0, -1.0, 5.0, -5.0, 10.0].iter().enumerate() {
            tree.insert(pt(&[*x]), i as u64).unwrap();
        }
        tree.calc_maxdist();
        tree
    }

    #[test]
    fn nearest_finds_the_closest_point() {
        let tree = line_tree();
        let (node, d) = tree.nearest(&pt(&[0.9])).unwrap();
        assert_eq!(node.point().as_slice(), &[1.0]);
        assert!((d - 0.1).abs() < 1e-9);
    }

    #[test]
    fn knn_returns_k_sorted_ascending() {
        let tree = line_tree();
        let results = tree.knn(&pt(&[0.0]), 3);
        assert_eq!(results.len(), 3);
        for w in results.windows(2) {
            assert!(w[0].1 <= w[1].1);
        }
    }

    #[test]
    fn knn_caps_at_tree_size() {
        let tree = line_tree();
        let results = tree.knn(&pt(&[0.0]), 1000);
        assert_eq!(results.len(), 6);
    }

    #[test]
    fn range_finds_everything_within_radius() {
        let tree = line_tree();
        let results = tree.range(&pt(&[0.0]), 1.5);
        let mut xs: Vec<f64> = results.iter().map(|(n, _)| n.point().as_slice()[0]).collect();
        xs.sort_by(|a, b| a.partial_cmp(b).unwrap());
        assert_eq!(xs, vec![-1.0, 0.0, 1.0]);
    }

    #[test]
    fn furthest_finds_the_most_distant_point() {
        let tree = line_tree();
        let (node, _) = tree.furthest(&pt(&[0.0])).unwrap();
        assert_eq!(node.point().as_slice(), &[10.0]);
    }

    #[test]
    fn self_nn_holds_without_an_explicit_calc_maxdist_call() {
        // maxdist_ub is maintained incrementally during insert, so pruning stays sound even if
        // the caller never runs the maintenance sweep.
        let tree = CoverTree::new_empty(2, 1.3, None);
        let pts = [
            [0.0, 0.0],
            [50.0, 0.0],
            [0.0, 50.0],
            [3.0, 4.0],
            [-20.0, -20.0],
            [1.0, 1.0],
            [100.0, 100.0],
        ];
        for (i, p) in pts.iter().enumerate() {
            tree.insert(pt(p), i as u64).unwrap();
        }
        for p in &pts {
            let (node, d) = tree.nearest(&pt(p)).unwrap();
            assert_eq!(node.point().as_slice(), p);
            assert!(d.abs() < 1e-9);
        }
    }

    #[test]
    fn empty_tree_queries_return_nothing() {
        let tree = CoverTree::new_empty(1, 2.0, None);
        assert!(tree.nearest(&pt(&[0.0])).is_none());
        assert!(tree.knn(&pt(&[0.0]), 5).is_empty());
        assert!(tree.range(&pt(&[0.0]), 5.0).is_empty());
        assert!(tree.furthest(&pt(&[0.0])).is_none());
    }
}
