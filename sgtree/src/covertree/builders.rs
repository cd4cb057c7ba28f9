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

//! # Bulk construction
//! `CoverTreeBuilder` turns a dense `PointMatrix` into a tree in one shot: row 0 seeds the root,
//! then every remaining row is handed to `rayon` for parallel insertion through the same
//! `insert` engine a caller would use one point at a time. There's no separate splitting
//! algorithm here — concurrent single-point insertion *is* the bulk build, which is the point of
//! having made single-point insertion safe to call from many threads at once.

use rayon::prelude::*;

use sgtree_points::PointMatrix;

use crate::errors::SgTreeResult;

use super::tree::{CoverTree, DEFAULT_BASE};

/// Builds a `CoverTree` from a `PointMatrix`, configuring the knobs a caller might want to set
/// before construction (base, truncation floor, thread count) ahead of the actual build.
#[derive(Debug, Clone)]
pub struct CoverTreeBuilder {
    base: f64,
    truncate_level: Option<i64>,
    num_threads: Option<usize>,
}

impl Default for CoverTreeBuilder {
    fn default() -> Self {
        CoverTreeBuilder {
            base: DEFAULT_BASE,
            truncate_level: None,
            num_threads: None,
        }
    }
}

impl CoverTreeBuilder {
    /// A builder with the library's default base and no truncation floor.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the covering/separation base. Must be `> 1.0`.
    pub fn base(&mut self, base: f64) -> &mut Self {
        self.base = base;
        self
    }

    /// Sets the minimum level the tree will materialize nodes at; points that would resolve
    /// below it attach at the floor instead (see `CoverTree::insert`).
    pub fn truncate_level(&mut self, level: i64) -> &mut Self {
        self.truncate_level = Some(level);
        self
    }

    /// Caps the number of threads `build` uses for the parallel insert phase. Uses rayon's
    /// global pool (and its default thread count) if unset.
    pub fn num_threads(&mut self, num_threads: usize) -> &mut Self {
        self.num_threads = Some(num_threads);
        self
    }

    /// Builds a tree from `matrix`. Row 0 seeds the root; every other row is inserted under
    /// `uids[row]` in parallel. `uids` must have exactly `matrix.rows()` entries.
    ///
    /// `calc_maxdist` runs once, after every row has been inserted, so the returned tree is
    /// immediately ready for pruned queries.
    pub fn build(&self, matrix: PointMatrix, uids: Vec<u64>) -> SgTreeResult<CoverTree> {
        assert_eq!(
            uids.len(),
            matrix.rows(),
            "builder requires one uid per matrix row"
        );

        let tree = CoverTree::new_empty(matrix.dim(), self.base, self.truncate_level);
        if matrix.rows() == 0 {
            return Ok(tree);
        }

        let root_point = matrix.point(0)?;
        tree.insert(root_point, uids[0])?;

        let insert_tail = || -> SgTreeResult<()> {
            matrix
                .tail_points()
                .collect::<Vec<_>>()
                .into_par_iter()
                .try_for_each(|(i, point)| tree.insert(point, uids[i]).map(|_| ()))
        };

        if let Some(n) = self.num_threads {
            rayon::ThreadPoolBuilder::new()
                .num_threads(n)
                .build()
                .expect("valid thread pool configuration")
                .install(insert_tail)?;
        } else {
            insert_tail()?;
        }

        tree.calc_maxdist();
        Ok(tree)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sgtree_points::PointMatrix;

    #[test]
    fn builds_a_tree_covering_every_row() {
        let matrix = PointMatrix::new(vec![0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 5.0, 5.0], 2).unwrap();
        let uids = vec![10, 11, 12, 13];
        let tree = CoverTreeBuilder::new().build(matrix, uids).unwrap();
        assert_eq!(tree.len(), 4);
        assert!(tree.check_covering());
    }

    #[test]
    fn empty_matrix_builds_an_empty_tree() {
        let matrix = PointMatrix::new(Vec::new(), 3).unwrap();
        let tree = CoverTreeBuilder::new().build(matrix, Vec::new()).unwrap();
        assert!(tree.is_empty());
    }

    #[test]
    fn respects_a_custom_base() {
        let matrix = PointMatrix::new(vec![0.0, 1.0, 2.0], 1).unwrap();
        let uids = vec![0, 1, 2];
        let tree = CoverTreeBuilder::new()
            .base(1.5)
            .build(matrix, uids)
            .unwrap();
        assert_eq!(tree.base(), 1.5);
    }
}
