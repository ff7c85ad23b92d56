//! Node-based graph: the input topology of the expansion.
//!
//! Nodes are map points, directed edges are road segments. Bidirectional
//! roads appear as two directed edges; the half that may not be traversed
//! carries `reversed = true` but stays in the adjacency for topology and
//! geometry lookups. Edge data is mutable because renumbering stamps the
//! expanded-node id into each forward edge in place.

pub mod compressed;
pub mod restrictions;

use crate::geo::Coordinate;

pub type NodeId = u32;
pub type EdgeId = u32;
pub type EdgeWeight = i32;

/// Sentinel for "no node" / "no expanded-node id assigned".
pub const INVALID_NODE_ID: NodeId = u32::MAX;
/// Sentinel for "no such edge".
pub const INVALID_EDGE_ID: EdgeId = u32::MAX;
/// Weight of an expanded node that must never be relaxed.
pub const INVALID_EDGE_WEIGHT: EdgeWeight = EdgeWeight::MAX;
/// Component id placeholder until the component analysis runs downstream.
pub const INVALID_COMPONENT_ID: u32 = u32::MAX;

/// Functional road classification of a segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum RoadClass {
    Motorway = 0,
    MotorwayLink = 1,
    Trunk = 2,
    TrunkLink = 3,
    Primary = 4,
    PrimaryLink = 5,
    Secondary = 6,
    SecondaryLink = 7,
    Tertiary = 8,
    TertiaryLink = 9,
    Unclassified = 10,
    Residential = 11,
    LivingStreet = 12,
    Service = 13,
    Track = 14,
}

impl RoadClass {
    /// On/off-ramps and other link roads.
    pub fn is_ramp(self) -> bool {
        matches!(
            self,
            RoadClass::MotorwayLink
                | RoadClass::TrunkLink
                | RoadClass::PrimaryLink
                | RoadClass::SecondaryLink
                | RoadClass::TertiaryLink
        )
    }

    /// Minor roads that lose against a through road of any other class.
    pub fn is_low_priority(self) -> bool {
        matches!(
            self,
            RoadClass::Residential | RoadClass::LivingStreet | RoadClass::Service | RoadClass::Track
        )
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }

    pub fn from_u8(value: u8) -> Option<Self> {
        use RoadClass::*;
        Some(match value {
            0 => Motorway,
            1 => MotorwayLink,
            2 => Trunk,
            3 => TrunkLink,
            4 => Primary,
            5 => PrimaryLink,
            6 => Secondary,
            7 => SecondaryLink,
            8 => Tertiary,
            9 => TertiaryLink,
            10 => Unclassified,
            11 => Residential,
            12 => LivingStreet,
            13 => Service,
            14 => Track,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum TravelMode {
    Inaccessible = 0,
    Driving = 1,
    Cycling = 2,
    Walking = 3,
    Ferry = 4,
}

impl TravelMode {
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    pub fn from_u8(value: u8) -> Option<Self> {
        use TravelMode::*;
        Some(match value {
            0 => Inaccessible,
            1 => Driving,
            2 => Cycling,
            3 => Walking,
            4 => Ferry,
            _ => return None,
        })
    }
}

/// Per-edge payload of the node-based graph.
#[derive(Debug, Clone, Copy)]
pub struct EdgeData {
    /// Expanded-node id assigned by renumbering; `INVALID_EDGE_ID` on
    /// reversed halves.
    pub edge_id: EdgeId,
    pub reversed: bool,
    pub distance: EdgeWeight,
    pub name_id: u32,
    pub road_class: RoadClass,
    pub travel_mode: TravelMode,
    pub roundabout: bool,
    pub startpoint: bool,
}

/// A directed edge before graph construction.
#[derive(Debug, Clone, Copy)]
pub struct InputEdge {
    pub source: NodeId,
    pub target: NodeId,
    pub data: EdgeData,
}

/// A map point with its upstream id (written into the segment lookup).
#[derive(Debug, Clone, Copy)]
pub struct QueryNode {
    pub coordinate: Coordinate,
    pub external_id: u32,
}

/// Adjacency-array graph over directed edges.
///
/// Edges are grouped by source node; within a node the input order is
/// preserved, which fixes the deterministic emission order of the whole
/// expansion.
#[derive(Debug)]
pub struct NodeBasedGraph {
    first_edge: Vec<u32>,
    targets: Vec<NodeId>,
    edge_data: Vec<EdgeData>,
}

impl NodeBasedGraph {
    pub fn from_edges(num_nodes: u32, edges: &[InputEdge]) -> Self {
        // stable sort keeps per-node input order, which fixes emission order
        let mut order: Vec<u32> = (0..edges.len() as u32).collect();
        order.sort_by_key(|&i| edges[i as usize].source);

        let mut first_edge = vec![0u32; num_nodes as usize + 1];
        for edge in edges {
            debug_assert!(edge.source < num_nodes && edge.target < num_nodes);
            first_edge[edge.source as usize + 1] += 1;
        }
        for i in 1..first_edge.len() {
            first_edge[i] += first_edge[i - 1];
        }

        let targets = order.iter().map(|&i| edges[i as usize].target).collect();
        let edge_data = order.iter().map(|&i| edges[i as usize].data).collect();

        Self {
            first_edge,
            targets,
            edge_data,
        }
    }

    pub fn num_nodes(&self) -> u32 {
        (self.first_edge.len() - 1) as u32
    }

    pub fn num_edges(&self) -> u32 {
        self.targets.len() as u32
    }

    /// Edge ids adjacent to `node`, in deterministic order.
    pub fn edge_range(&self, node: NodeId) -> std::ops::Range<EdgeId> {
        self.first_edge[node as usize]..self.first_edge[node as usize + 1]
    }

    pub fn target(&self, edge: EdgeId) -> NodeId {
        self.targets[edge as usize]
    }

    pub fn edge_data(&self, edge: EdgeId) -> &EdgeData {
        &self.edge_data[edge as usize]
    }

    pub fn edge_data_mut(&mut self, edge: EdgeId) -> &mut EdgeData {
        &mut self.edge_data[edge as usize]
    }

    /// Number of adjacent directed edges, reversed halves included.
    pub fn out_degree(&self, node: NodeId) -> usize {
        self.edge_range(node).len()
    }

    /// Number of adjacent edges that can actually be traversed outward.
    pub fn directed_out_degree(&self, node: NodeId) -> usize {
        self.edge_range(node)
            .filter(|&e| !self.edge_data(e).reversed)
            .count()
    }

    /// First edge `from -> to`, if any.
    pub fn find_edge(&self, from: NodeId, to: NodeId) -> Option<EdgeId> {
        self.edge_range(from).find(|&e| self.target(e) == to)
    }
}
