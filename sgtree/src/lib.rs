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

#![allow(dead_code)]
#![deny(warnings)]
#![doc(test(attr(allow(unused_variables), deny(warnings))))]

//! # sgtree
//! A concurrent, scapegoat-style cover tree: a leveled spatial index that supports inserting
//! points from many threads at once and running nearest/k-nearest/range/furthest queries by
//! branch-and-bound over cached subtree-radius bounds.
//!
//! ## Parameter guide
//! A tree is fixed at construction to one dimension and one covering/separation base. The base
//! should sit between about 1.2 and 2 — [`DEFAULT_BASE`] is `1.3`. A
//! higher base widens the gap between consecutive levels, which shortens the tree and speeds up
//! bulk construction, at the cost of looser pruning bounds during queries. Go much above 2 and
//! query cost starts to dominate; there's rarely a reason to.
//!
//! An optional truncation floor bounds how many levels below the root a tree will ever
//! materialize a node — points that would resolve further down attach at the floor instead of
//! growing the tree deeper. This trades true-nearest-neighbor accuracy for a hard memory cap.

pub mod errors;
pub use errors::{SgTreeError, SgTreeResult};

pub mod node_address;
pub use node_address::NodeAddress;

pub mod powertable;

mod covertree;
pub use covertree::{CoverTree, CoverTreeBuilder, Node, DEFAULT_BASE};
