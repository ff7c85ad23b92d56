//! Compressed per-edge geometry.
//!
//! Each directed edge maps to the ordered points along the road: every
//! intermediate point plus the target node, the source excluded. Forward
//! and reverse halves of the same road store mirrored sequences of equal
//! length. The bucket index doubles as the stable "geometry position"
//! written into the original-edge-data records.

use std::collections::HashMap;

use super::{EdgeId, EdgeWeight, NodeId};

/// One sub-segment endpoint: the node reached and the weight to reach it
/// from the previous point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentNode {
    pub node_id: NodeId,
    pub weight: EdgeWeight,
}

#[derive(Debug, Default)]
pub struct CompressedEdgeContainer {
    bucket_for_edge: HashMap<EdgeId, u32>,
    buckets: Vec<Vec<SegmentNode>>,
}

impl CompressedEdgeContainer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the geometry of `edge`. Last entry must be the edge
    /// target; the sequence must be non-empty.
    pub fn insert(&mut self, edge: EdgeId, nodes: Vec<SegmentNode>) {
        debug_assert!(!nodes.is_empty());
        let position = self.buckets.len() as u32;
        self.bucket_for_edge.insert(edge, position);
        self.buckets.push(nodes);
    }

    pub fn has_entry(&self, edge: EdgeId) -> bool {
        self.bucket_for_edge.contains_key(&edge)
    }

    pub fn bucket(&self, edge: EdgeId) -> &[SegmentNode] {
        let position = self.bucket_for_edge[&edge];
        &self.buckets[position as usize]
    }

    /// Stable back-reference for `edge`, usable across runs on the same
    /// input.
    pub fn position_of(&self, edge: EdgeId) -> u32 {
        self.bucket_for_edge[&edge]
    }
}
