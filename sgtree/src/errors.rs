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

//! The errors that can occur when building, inserting into, querying, or (de)serializing a
//! cover tree. Most errors are floated up from `sgtree-points`, as that's the data-access layer.

use sgtree_points::PointsError;
use std::error::Error;
use std::fmt;

/// Helper type for a call that could go wrong.
pub type SgTreeResult<T> = Result<T, SgTreeError>;

/// Error type for `sgtree`.
#[derive(Debug)]
pub enum SgTreeError {
    /// Propagated from the points crate, almost always a dimension mismatch.
    PointsError(PointsError),
    /// An inserted point's dimension disagreed with the tree's fixed dimension.
    DimensionMismatch {
        /// Dimension the tree was built with.
        expected: usize,
        /// Dimension of the point that was rejected.
        found: usize,
    },
    /// A UID was already present in the tree. Not raised by `insert` (which reports a duplicate
    /// by returning `false`), kept for callers who want a hard error instead.
    DuplicateUid(u64),
    /// The byte stream handed to `deserialize` didn't describe a valid tree.
    Corrupt(String),
}

impl fmt::Display for SgTreeError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SgTreeError::PointsError(e) => write!(f, "{}", e),
            SgTreeError::DimensionMismatch { expected, found } => write!(
                f,
                "dimension mismatch: tree has dimension {}, point has dimension {}",
                expected, found
            ),
            SgTreeError::DuplicateUid(uid) => write!(f, "uid {} is already present in the tree", uid),
            SgTreeError::Corrupt(msg) => write!(f, "corrupt serialization stream: {}", msg),
        }
    }
}

impl Error for SgTreeError {
    fn cause(&self) -> Option<&dyn Error> {
        match self {
            SgTreeError::PointsError(e) => Some(e),
            _ => None,
        }
    }
}

impl From<PointsError> for SgTreeError {
    fn from(err: PointsError) -> Self {
        SgTreeError::PointsError(err)
    }
}