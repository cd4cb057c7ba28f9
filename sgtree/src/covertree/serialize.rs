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

//! # Flat buffer serialization
//! A single contiguous byte buffer, little-endian throughout, `f64`s as raw IEEE-754 bits. This
//! is a memory-layout contract for this revision of the crate, not a portable cross-architecture
//! format — there is no schema versioning and no attempt to handle a foreign endianness.
//!
//! Layout: a fixed header, then a pre-order stream of node records, then a post-order stream of
//! child counts. `deserialize` decodes the child-count stream into a bare shape (children only,
//! no data) with a stack: a count of `n` collects the `n` most-recently-completed shells as this
//! node's children and pushes a new shell for it, exactly the standard way to invert a post-order
//! traversal recorded as one count per node. That shape's pre-order walk then lines up with the
//! pre-order stream of point records exactly as written, and the two are paired up one node at a
//! time to rebuild the real tree.

use std::sync::Arc;

use sgtree_points::Point;

use crate::errors::{SgTreeError, SgTreeResult};

use super::node::Node;
use super::tree::CoverTree;

const HEADER_LEN: usize = 4 + 8 + 8 + 8 + 8; // dim(u32) + base(f64) + min_scale(i64) + max_scale(i64) + count(u64)

impl CoverTree {
    /// The exact size in bytes `serialize` will produce, computed by a dry traversal.
    pub fn msg_size(&self) -> usize {
        let mut size = HEADER_LEN;
        if let Some(root) = self.root() {
            Self::msg_size_at(&root, &mut size);
        }
        size
    }

    fn msg_size_at(node: &Arc<Node>, size: &mut usize) {
        // point + level(i64) + uid(u64) + ext_prop_len(u32) + ext_prop bytes
        *size += node.point().dim() * 8 + 8 + 8 + 4 + node.ext_prop().len();
        *size += 4; // child count, written in the post-order stream
        for child in node.children() {
            Self::msg_size_at(&child, size);
        }
    }

    /// Serializes the tree into a single flat byte buffer.
    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.msg_size());

        buf.extend_from_slice(&(self.dim as u32).to_le_bytes());
        buf.extend_from_slice(&self.base.to_le_bytes());
        buf.extend_from_slice(&self.min_scale().to_le_bytes());
        buf.extend_from_slice(&self.max_scale().to_le_bytes());
        buf.extend_from_slice(&(self.len() as u64).to_le_bytes());

        let mut child_counts = Vec::new();
        if let Some(root) = self.root() {
            Self::write_preorder(&root, &mut buf);
            Self::write_postorder_counts(&root, &mut child_counts);
        }
        buf.extend_from_slice(&child_counts);
        buf
    }

    fn write_preorder(node: &Arc<Node>, buf: &mut Vec<u8>) {
        for x in node.point().as_slice() {
            buf.extend_from_slice(&x.to_le_bytes());
        }
        buf.extend_from_slice(&node.level().to_le_bytes());
        buf.extend_from_slice(&node.uid().to_le_bytes());
        let ext_prop = node.ext_prop();
        buf.extend_from_slice(&(ext_prop.len() as u32).to_le_bytes());
        buf.extend_from_slice(&ext_prop);
        for child in node.children() {
            Self::write_preorder(&child, buf);
        }
    }

    fn write_postorder_counts(node: &Arc<Node>, buf: &mut Vec<u8>) {
        for child in node.children() {
            Self::write_postorder_counts(&child, buf);
        }
        buf.extend_from_slice(&(node.children_len() as u32).to_le_bytes());
    }

    /// Reconstructs a tree from a buffer produced by `serialize`, then re-runs `calc_maxdist` so
    /// query pruning has tight bounds immediately.
    pub fn deserialize(buf: &[u8]) -> SgTreeResult<CoverTree> {
        let mut cursor = Cursor::new(buf);
        let dim = cursor.read_u32()? as usize;
        let base = cursor.read_f64()?;
        let min_scale = cursor.read_i64()?;
        let max_scale = cursor.read_i64()?;
        let count = cursor.read_u64()? as usize;

        let mut records = Vec::with_capacity(count);
        let mut next_id = 0u64;
        for _ in 0..count {
            let mut values = Vec::with_capacity(dim);
            for _ in 0..dim {
                values.push(cursor.read_f64()?);
            }
            let level = cursor.read_i64()?;
            let uid = cursor.read_u64()?;
            let ext_len = cursor.read_u32()? as usize;
            let ext_prop = cursor.read_bytes(ext_len)?.to_vec();
            records.push((Point::from(values), level, uid, ext_prop));
            next_id += 1;
        }

        let mut child_counts = Vec::with_capacity(count);
        for _ in 0..count {
            child_counts.push(cursor.read_u32()? as usize);
        }

        let tree = CoverTree::new_empty(dim, base, None);
        tree.min_scale.store(min_scale, std::sync::atomic::Ordering::SeqCst);
        tree.max_scale.store(max_scale, std::sync::atomic::Ordering::SeqCst);
        tree.count.store(count, std::sync::atomic::Ordering::SeqCst);
        tree.next_id.store(next_id, std::sync::atomic::Ordering::SeqCst);

        if count > 0 {
            let shape = Self::shape_from_postorder_counts(&child_counts)?;
            let mut record_cursor = 0usize;
            let root = Self::attach_records(&shape, &records, &mut record_cursor)?;
            *tree.root.write().unwrap() = Some(root);
        }

        tree.calc_maxdist();
        Ok(tree)
    }

    /// Reconstructs the tree's shape (child counts only, no point data yet) from a post-order
    /// child-count stream: process counts left to right, maintaining a stack of completed
    /// subtree shells; a count of `n` pops the `n` most-recently-completed shells (which are, in
    /// stack order, exactly that node's children left-to-right) and pushes a new shell wrapping
    /// them. Exactly one shell remains once the whole stream is consumed.
    fn shape_from_postorder_counts(counts: &[usize]) -> SgTreeResult<Shape> {
        let mut stack: Vec<Shape> = Vec::new();
        for &n_children in counts {
            if n_children > stack.len() {
                return Err(SgTreeError::Corrupt(
                    "child-count stream is inconsistent with itself".to_string(),
                ));
            }
            let children = stack.split_off(stack.len() - n_children);
            stack.push(Shape { children });
        }
        if stack.len() != 1 {
            return Err(SgTreeError::Corrupt(
                "child-count stream did not reduce to a single root".to_string(),
            ));
        }
        Ok(stack.pop().unwrap())
    }

    /// Walks `shape` pre-order, pairing each node with the next unconsumed record — the same
    /// order `write_preorder` wrote them in, since `shape`'s children are in original
    /// left-to-right order at every level.
    fn attach_records(
        shape: &Shape,
        records: &[(Point, i64, u64, Vec<u8>)],
        record_cursor: &mut usize,
    ) -> SgTreeResult<Arc<Node>> {
        let (point, level, uid, ext_prop) = records
            .get(*record_cursor)
            .cloned()
            .ok_or_else(|| SgTreeError::Corrupt("record stream ended early".to_string()))?;
        *record_cursor += 1;

        let node = Arc::new(Node::new(point, level, 0, uid));
        node.set_ext_prop(ext_prop);

        for child_shape in &shape.children {
            let child = Self::attach_records(child_shape, records, record_cursor)?;
            node.attach_existing_child(child);
        }
        Ok(node)
    }
}

/// The tree's structure with no point data attached yet — just how many children each node has,
/// in original left-to-right order. An intermediate step between decoding the post-order
/// child-count stream and pairing it up with the pre-order record stream.
struct Shape {
    children: Vec<Shape>,
}

struct Cursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Cursor { buf, pos: 0 }
    }

    fn take(&mut self, n: usize) -> SgTreeResult<&'a [u8]> {
        if self.pos + n > self.buf.len() {
            return Err(SgTreeError::Corrupt(format!(
                "expected {} more bytes at offset {}, buffer has {}",
                n,
                self.pos,
                self.buf.len()
            )));
        }
        let slice = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn read_bytes(&mut self, n: usize) -> SgTreeResult<&'a [u8]> {
        self.take(n)
    }

    fn read_u32(&mut self) -> SgTreeResult<u32> {
        let bytes: [u8; 4] = self.take(4)?.try_into().unwrap();
        Ok(u32::from_le_bytes(bytes))
    }

    fn read_u64(&mut self) -> SgTreeResult<u64> {
        let bytes: [u8; 8] = self.take(8)?.try_into().unwrap();
        Ok(u64::from_le_bytes(bytes))
    }

    fn read_i64(&mut self) -> SgTreeResult<i64> {
        let bytes: [u8; 8] = self.take(8)?.try_into().unwrap();
        Ok(i64::from_le_bytes(bytes))
    }

    fn read_f64(&mut self) -> SgTreeResult<f64> {
        let bytes: [u8; 8] = self.take(8)?.try_into().unwrap();
        Ok(f64::from_le_bytes(bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pt(values: &[f64]) -> Point {
        Point::from(values)
    }

    #[test]
    fn msg_size_matches_actual_serialized_length() {
        let tree = CoverTree::new_empty(2, 2.0, None);
        for (i, xy) in [[0.0, 0.0], [1.0, 0.0], [0.0, 1.0], [5.0, 5.0]].iter().enumerate() {
            tree.insert(pt(xy), i as u64).unwrap();
        }
        let buf = tree.serialize();
        assert_eq!(buf.len(), tree.msg_size());
    }

    /// Collects `(uid, level, sorted child uids)` for every node, depth-first — a full structural
    /// fingerprint that a shape-corrupting bug (like a miscounted child stream) can't slip past.
    fn structure_fingerprint(tree: &CoverTree) -> Vec<(u64, i64, Vec<u64>)> {
        let mut out = Vec::new();
        if let Some(root) = tree.root() {
            let mut stack = vec![root];
            while let Some(node) = stack.pop() {
                let mut child_uids: Vec<u64> = node.children().iter().map(|c| c.uid()).collect();
                child_uids.sort_unstable();
                out.push((node.uid(), node.level(), child_uids));
                stack.extend(node.children());
            }
        }
        out.sort_unstable();
        out
    }

    #[test]
    fn round_trips_points_and_structure() {
        let tree = CoverTree::new_empty(1, 2.0, None);
        for (i, x) in [0.0, 1.0, -1.0, 5.0, -5.0].iter().enumerate() {
            tree.insert(pt(&[*x]), i as u64).unwrap();
        }
        tree.calc_maxdist();
        let buf = tree.serialize();
        let restored = CoverTree::deserialize(&buf).unwrap();

        assert_eq!(restored.len(), tree.len());
        assert_eq!(restored.dim(), tree.dim());
        assert_eq!(restored.min_scale(), tree.min_scale());
        assert_eq!(restored.max_scale(), tree.max_scale());
        assert_eq!(structure_fingerprint(&restored), structure_fingerprint(&tree));

        let mut original_uids: Vec<u64> = tree.best_initial_points(100);
        let mut restored_uids: Vec<u64> = restored.best_initial_points(100);
        original_uids.sort_unstable();
        restored_uids.sort_unstable();
        assert_eq!(original_uids, restored_uids);
    }

    #[test]
    fn round_trips_a_multi_child_multi_level_tree() {
        // Root with two children, one of which has two of its own children — enough branching
        // for a broken child-count/record pairing to misplace a subtree.
        let tree = CoverTree::new_empty(2, 2.0, None);
        for (i, xy) in [[0.0, 0.0], [1.0, 0.0], [0.5, 0.2], [0.5, -0.2], [10.0, 10.0]]
            .iter()
            .enumerate()
        {
            tree.insert(pt(xy), i as u64).unwrap();
        }
        tree.calc_maxdist();
        assert!(tree.check_covering());

        let buf = tree.serialize();
        let restored = CoverTree::deserialize(&buf).unwrap();

        assert_eq!(restored.len(), tree.len());
        assert!(restored.check_covering());
        assert_eq!(structure_fingerprint(&restored), structure_fingerprint(&tree));
        assert_eq!(restored.level_histogram(), tree.level_histogram());
    }

    #[test]
    fn rejects_truncated_buffer() {
        let tree = CoverTree::new_empty(1, 2.0, None);
        tree.insert(pt(&[0.0]), 0).unwrap();
        tree.insert(pt(&[1.0]), 1).unwrap();
        let mut buf = tree.serialize();
        buf.truncate(buf.len() - 2);
        assert!(CoverTree::deserialize(&buf).is_err());
    }

    #[test]
    fn rejects_inconsistent_child_count_stream() {
        // A count claiming more children than there are completed subtrees on the stack can
        // never correspond to a real post-order traversal.
        let shape = CoverTree::shape_from_postorder_counts(&[5]);
        assert!(shape.is_err());
    }
}
