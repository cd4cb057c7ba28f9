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

//! A precomputed table of `base^level` so covering/separation checks and query pruning never
//! call `powi`/`powf` in the hot path.

/// Levels are biased by this much before indexing into the table, so levels in
/// `[-BIAS, BIAS]` are representable.
pub const BIAS: i64 = 1024;

/// `powers[i] = base^(i - BIAS)` for `i` in `[0, 2*BIAS]`.
#[derive(Debug, Clone)]
pub struct PowerTable {
    base: f64,
    powers: Vec<f64>,
}

impl PowerTable {
    /// Builds a new table for `base`. Rebuilding only happens at tree construction, since `base`
    /// is fixed for the lifetime of a tree.
    pub fn new(base: f64) -> Self {
        let powers = (0..=(2 * BIAS)).map(|i| base.powi((i - BIAS) as i32)).collect();
        PowerTable { base, powers }
    }

    /// The base this table was built from.
    pub fn base(&self) -> f64 {
        self.base
    }

    fn index(level: i64) -> usize {
        (level + BIAS).max(0).min(2 * BIAS) as usize
    }

    /// `base^level`, the plain power at `level`.
    #[inline]
    pub fn power(&self, level: i64) -> f64 {
        self.powers[Self::index(level)]
    }

    /// The covering distance of a node at `level`: the radius within which its children must
    /// sit. `covdist(L) = base^(L+1)`.
    #[inline]
    pub fn covdist(&self, level: i64) -> f64 {
        self.power(level + 1)
    }

    /// The separation distance at `level`: the minimum required distance between any two
    /// children of a node at `level`. `sepdist(L) = base^L`.
    #[inline]
    pub fn sepdist(&self, level: i64) -> f64 {
        self.power(level)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn covdist_is_one_level_above_sepdist() {
        let table = PowerTable::new(2.0);
        assert_approx_eq!(table.covdist(3), 2f64.powi(4));
        assert_approx_eq!(table.sepdist(3), 2f64.powi(3));
        assert_approx_eq!(table.covdist(3), table.sepdist(4));
    }

    #[test]
    fn handles_negative_levels() {
        let table = PowerTable::new(1.3);
        assert_approx_eq!(table.sepdist(-5), 1.3f64.powi(-5));
    }

    #[test]
    fn clamps_out_of_range_levels_instead_of_panicking() {
        let table = PowerTable::new(1.3);
        let _ = table.sepdist(-(BIAS) - 10);
        let _ = table.sepdist(BIAS + 10);
    }
}
