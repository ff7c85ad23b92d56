//! Edge expansion: node-based graph in, edge-expanded graph out.
//!
//! Every directed road segment becomes a node of the expanded graph and
//! every legal turn at a junction becomes a weighted edge between two
//! such nodes. The run is single-threaded and deterministic: expanded
//! edges are emitted in node order, per-node adjacency order, and each
//! gets its emission index as serial id.
//!
//! The driver works in three phases, mirrored by the timing log lines:
//! renumber forward edges, generate one expanded node per geometric
//! sub-segment, then walk every intersection through the candidate /
//! optimize / suppress pipeline and emit the surviving turns.

pub mod candidates;
pub mod optimize;
pub mod suppress;

use std::collections::HashSet;
use std::time::Instant;

use anyhow::{ensure, Context, Result};
use log::{info, warn};

use crate::formats::edge_lookup::EdgeLookupWriter;
use crate::formats::original_edges::{OriginalEdgeData, OriginalEdgeWriter};
use crate::geo::STRAIGHT_ANGLE;
use crate::nbg::compressed::CompressedEdgeContainer;
use crate::nbg::restrictions::RestrictionMap;
use crate::nbg::{
    EdgeId, EdgeWeight, NodeBasedGraph, NodeId, QueryNode, TravelMode, INVALID_COMPONENT_ID,
    INVALID_EDGE_ID, INVALID_EDGE_WEIGHT, INVALID_NODE_ID,
};

pub use crate::formats::edge_lookup::EdgeLookupPaths;
pub use candidates::TurnCandidate;

/// Fixed penalties applied while weighting expanded edges.
#[derive(Debug, Clone, Copy)]
pub struct SpeedProfile {
    pub u_turn_penalty: EdgeWeight,
    pub traffic_signal_penalty: EdgeWeight,
}

/// User-supplied turn cost, a pure function of the deviation from going
/// straight. Failures are logged and count as zero.
pub type TurnPenaltyFn = dyn Fn(f64) -> Result<f64>;

/// Advisory progress callback `(nodes done, nodes total)`.
pub type ProgressFn = dyn Fn(u64, u64);

/// One node of the expanded graph: a directed sub-segment of a road.
#[derive(Debug, Clone, Copy)]
pub struct EdgeBasedNode {
    pub forward_edge_id: EdgeId,
    pub reverse_edge_id: EdgeId,
    pub u: NodeId,
    pub v: NodeId,
    pub name_id: u32,
    pub forward_geometry_position: u32,
    pub reverse_geometry_position: u32,
    pub component_id: u32,
    pub segment_index: u32,
    pub forward_travel_mode: TravelMode,
    pub reverse_travel_mode: TravelMode,
}

/// One edge of the expanded graph: a legal turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EdgeBasedEdge {
    pub source: EdgeId,
    pub target: EdgeId,
    pub serial_id: u32,
    pub weight: EdgeWeight,
    pub forward: bool,
    pub backward: bool,
}

/// Where the streamed artifacts go.
#[derive(Debug, Clone)]
pub struct OutputConfig {
    pub original_edge_data: std::path::PathBuf,
    pub edge_lookup: Option<EdgeLookupPaths>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ExpansionStats {
    pub node_based_edges: u64,
    pub restricted_turns: u64,
    pub skipped_uturns: u64,
    pub skipped_barrier_turns: u64,
    pub original_edges_written: u64,
}

/// Everything the expansion produces in memory; ownership moves to the
/// caller, the streamed files are already on disk and closed.
#[derive(Debug)]
pub struct ExpansionOutput {
    pub nodes: Vec<EdgeBasedNode>,
    pub node_is_startpoint: Vec<bool>,
    pub node_weights: Vec<EdgeWeight>,
    pub edges: Vec<EdgeBasedEdge>,
    pub max_edge_id: EdgeId,
    pub stats: ExpansionStats,
}

pub struct EdgeExpander<'a> {
    graph: &'a mut NodeBasedGraph,
    geometry: &'a CompressedEdgeContainer,
    coordinates: &'a [QueryNode],
    restrictions: &'a RestrictionMap,
    barrier_nodes: &'a HashSet<NodeId>,
    traffic_signals: &'a HashSet<NodeId>,
    profile: SpeedProfile,
    turn_penalty_function: Option<Box<TurnPenaltyFn>>,
    progress: Option<Box<ProgressFn>>,

    max_edge_id: EdgeId,
    edge_based_nodes: Vec<EdgeBasedNode>,
    node_is_startpoint: Vec<bool>,
    node_weights: Vec<EdgeWeight>,
    edge_based_edges: Vec<EdgeBasedEdge>,
    stats: ExpansionStats,
}

impl<'a> EdgeExpander<'a> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        graph: &'a mut NodeBasedGraph,
        geometry: &'a CompressedEdgeContainer,
        coordinates: &'a [QueryNode],
        restrictions: &'a RestrictionMap,
        barrier_nodes: &'a HashSet<NodeId>,
        traffic_signals: &'a HashSet<NodeId>,
        profile: SpeedProfile,
    ) -> Self {
        Self {
            graph,
            geometry,
            coordinates,
            restrictions,
            barrier_nodes,
            traffic_signals,
            profile,
            turn_penalty_function: None,
            progress: None,
            max_edge_id: 0,
            edge_based_nodes: Vec::new(),
            node_is_startpoint: Vec::new(),
            node_weights: Vec::new(),
            edge_based_edges: Vec::new(),
            stats: ExpansionStats::default(),
        }
    }

    pub fn with_turn_penalty_function(mut self, function: Box<TurnPenaltyFn>) -> Self {
        self.turn_penalty_function = Some(function);
        self
    }

    pub fn with_progress(mut self, progress: Box<ProgressFn>) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Runs the full expansion and streams the output files. A returned
    /// error means the partial output must be discarded.
    pub fn run(mut self, output: &OutputConfig) -> Result<ExpansionOutput> {
        let timer = Instant::now();
        let numbered_edges = self.renumber_edges()?;
        ensure!(numbered_edges > 0, "node-based graph has no traversable edges");
        self.max_edge_id = numbered_edges - 1;
        let renumber_seconds = timer.elapsed().as_secs_f64();

        let timer = Instant::now();
        self.generate_edge_expanded_nodes()?;
        let node_seconds = timer.elapsed().as_secs_f64();

        let timer = Instant::now();
        self.generate_edge_expanded_edges(output)?;
        let edge_seconds = timer.elapsed().as_secs_f64();

        info!("timing statistics for edge-expanded graph:");
        info!("  renumbering edges: {:.3}s", renumber_seconds);
        info!("  generating nodes: {:.3}s", node_seconds);
        info!("  generating edges: {:.3}s", edge_seconds);

        Ok(ExpansionOutput {
            nodes: self.edge_based_nodes,
            node_is_startpoint: self.node_is_startpoint,
            node_weights: self.node_weights,
            edges: self.edge_based_edges,
            max_edge_id: self.max_edge_id,
            stats: self.stats,
        })
    }

    /// Assigns sequential expanded-node ids to all forward edges, in node
    /// order. Any unique numbering would do; this one is reproducible.
    fn renumber_edges(&mut self) -> Result<u32> {
        let mut numbered_edges = 0u32;
        for node in 0..self.graph.num_nodes() {
            for edge in self.graph.edge_range(node) {
                if self.graph.edge_data(edge).reversed {
                    continue;
                }

                // oneway streets always need this self-loop weight; other
                // streets only if a u-turn plus traversal beats the loop
                let distance = self.graph.edge_data(edge).distance;
                self.node_weights
                    .push(distance.saturating_add(self.profile.u_turn_penalty));

                ensure!(
                    numbered_edges < self.graph.num_edges(),
                    "renumbered more edges than the graph contains"
                );
                self.graph.edge_data_mut(edge).edge_id = numbered_edges;
                numbered_edges += 1;
            }
        }
        Ok(numbered_edges)
    }

    /// One expanded node per geometric sub-segment of every road, each
    /// undirected road visited once from its smaller endpoint.
    fn generate_edge_expanded_nodes(&mut self) -> Result<()> {
        let total_nodes = self.graph.num_nodes();
        for node_u in 0..total_nodes {
            self.tick_progress(node_u as u64, total_nodes as u64);
            for edge in self.graph.edge_range(node_u) {
                let node_v = self.graph.target(edge);
                ensure!(node_v != INVALID_NODE_ID, "edge with invalid target");
                // each road shows up as an outgoing and an incoming edge;
                // pick only one of the two sightings
                if node_u > node_v {
                    continue;
                }
                ensure!(node_u != node_v, "self loop at node {}", node_u);

                if self.graph.edge_data(edge).edge_id == INVALID_EDGE_ID {
                    self.insert_edge_based_node(node_v, node_u)?;
                } else {
                    self.insert_edge_based_node(node_u, node_v)?;
                }
            }
        }

        ensure!(
            self.edge_based_nodes.len() == self.node_is_startpoint.len(),
            "startpoint markers out of sync with expanded nodes"
        );
        ensure!(
            self.node_weights.len() == self.max_edge_id as usize + 1,
            "expanded node weights out of sync with renumbering"
        );
        info!(
            "generated {} nodes in edge-expanded graph",
            self.edge_based_nodes.len()
        );
        Ok(())
    }

    /// Walks the geometry of the road `node_u -> node_v` and emits one
    /// expanded node per sub-segment.
    fn insert_edge_based_node(&mut self, node_u: NodeId, node_v: NodeId) -> Result<()> {
        let forward_edge = self
            .graph
            .find_edge(node_u, node_v)
            .with_context(|| format!("road {}-{} has no forward edge", node_u, node_v))?;
        let forward_data = *self.graph.edge_data(forward_edge);

        let reverse_edge = self
            .graph
            .find_edge(node_v, node_u)
            .with_context(|| format!("road {}-{} has no reverse edge", node_u, node_v))?;
        let reverse_data = *self.graph.edge_data(reverse_edge);

        if forward_data.edge_id == INVALID_EDGE_ID && reverse_data.edge_id == INVALID_EDGE_ID {
            return Ok(());
        }

        if forward_data.edge_id != INVALID_EDGE_ID && reverse_data.edge_id == INVALID_EDGE_ID {
            self.node_weights[forward_data.edge_id as usize] = INVALID_EDGE_WEIGHT;
        }

        ensure!(
            self.geometry.has_entry(forward_edge) && self.geometry.has_entry(reverse_edge),
            "road {}-{} has no compressed geometry",
            node_u,
            node_v
        );
        let forward_geometry = self.geometry.bucket(forward_edge);
        let reverse_geometry = self.geometry.bucket(reverse_edge);
        ensure!(
            forward_geometry.len() == reverse_geometry.len(),
            "geometry length mismatch on road {}-{}",
            node_u,
            node_v
        );
        let geometry_size = forward_geometry.len();
        ensure!(geometry_size != 0, "empty geometry on road {}-{}", node_u, node_v);

        let mut current_source = node_u;
        for i in 0..geometry_size {
            ensure!(
                current_source == reverse_geometry[geometry_size - 1 - i].node_id,
                "reverse geometry does not mirror forward geometry on road {}-{}",
                node_u,
                node_v
            );
            let current_target = forward_geometry[i].node_id;
            ensure!(
                current_target != current_source,
                "degenerate geometry segment on road {}-{}",
                node_u,
                node_v
            );
            ensure!(
                self.coordinates[current_source as usize].coordinate.is_valid()
                    && self.coordinates[current_target as usize].coordinate.is_valid(),
                "invalid coordinate on road {}-{}",
                node_u,
                node_v
            );

            self.edge_based_nodes.push(EdgeBasedNode {
                forward_edge_id: forward_data.edge_id,
                reverse_edge_id: reverse_data.edge_id,
                u: current_source,
                v: current_target,
                name_id: forward_data.name_id,
                forward_geometry_position: self.geometry.position_of(forward_edge),
                reverse_geometry_position: self.geometry.position_of(reverse_edge),
                component_id: INVALID_COMPONENT_ID,
                segment_index: i as u32,
                forward_travel_mode: forward_data.travel_mode,
                reverse_travel_mode: reverse_data.travel_mode,
            });
            self.node_is_startpoint
                .push(forward_data.startpoint || reverse_data.startpoint);
            current_source = current_target;
        }
        ensure!(
            current_source == node_v,
            "geometry of road {}-{} does not end at its target",
            node_u,
            node_v
        );
        Ok(())
    }

    /// The intersection loop: classify turns, then emit an original-edge
    /// record and an expanded edge for every valid candidate.
    fn generate_edge_expanded_edges(&mut self, output: &OutputConfig) -> Result<()> {
        info!("generating edge-expanded edges");

        let mut edge_data_writer = OriginalEdgeWriter::create(&output.original_edge_data)?;
        let mut lookup_writer = match &output.edge_lookup {
            Some(paths) => Some(EdgeLookupWriter::create(paths)?),
            None => None,
        };

        let total_nodes = self.graph.num_nodes();
        for node_u in 0..total_nodes {
            self.tick_progress(node_u as u64, total_nodes as u64);
            for edge_from_u in self.graph.edge_range(node_u) {
                if self.graph.edge_data(edge_from_u).reversed {
                    continue;
                }
                self.stats.node_based_edges += 1;

                let candidates = self.turn_candidates(node_u, edge_from_u);
                let candidates = self.optimize_candidates(edge_from_u, candidates);
                let candidates = self.suppress_turns(edge_from_u, candidates);

                let node_v = self.graph.target(edge_from_u);

                for turn in &candidates {
                    if !turn.valid {
                        continue;
                    }

                    let edge_data_in = *self.graph.edge_data(edge_from_u);
                    let edge_data_out = *self.graph.edge_data(turn.edge);
                    ensure!(
                        edge_data_in.edge_id != edge_data_out.edge_id,
                        "turn between identically numbered edges"
                    );
                    ensure!(
                        !edge_data_in.reversed && !edge_data_out.reversed,
                        "turn onto a reversed edge survived filtering"
                    );
                    ensure!(
                        edge_data_in.edge_id != INVALID_EDGE_ID
                            && edge_data_out.edge_id != INVALID_EDGE_ID,
                        "turn between unnumbered edges"
                    );

                    let mut weight = edge_data_in.distance;
                    if self.traffic_signals.contains(&node_v) {
                        weight = weight.saturating_add(self.profile.traffic_signal_penalty);
                    }
                    if turn.instruction.is_uturn() {
                        weight = weight.saturating_add(self.profile.u_turn_penalty);
                    }
                    weight = weight.saturating_add(self.turn_penalty(turn.angle));

                    ensure!(
                        self.geometry.has_entry(edge_from_u),
                        "emitting edge without compressed geometry"
                    );
                    edge_data_writer.push(OriginalEdgeData {
                        geometry_position: self.geometry.position_of(edge_from_u),
                        name_id: edge_data_in.name_id,
                        instruction: turn.instruction,
                        travel_mode: edge_data_in.travel_mode,
                    })?;

                    ensure!(
                        self.edge_based_edges.len() < u32::MAX as usize,
                        "expanded edge id overflow"
                    );
                    let serial_id = self.edge_based_edges.len() as u32;
                    self.edge_based_edges.push(EdgeBasedEdge {
                        source: edge_data_in.edge_id,
                        target: edge_data_out.edge_id,
                        serial_id,
                        weight,
                        forward: true,
                        backward: false,
                    });

                    // the expanded edge weight is based on the source
                    // node-based edge, so the lookup maps its individual
                    // segments to this expanded edge id
                    if let Some(writer) = lookup_writer.as_mut() {
                        let fixed_penalty = (weight - edge_data_in.distance) as u32;
                        writer.write_penalty(fixed_penalty)?;
                        writer.write_segments(
                            node_u,
                            self.geometry.bucket(edge_from_u),
                            self.coordinates,
                        )?;
                    }
                }
            }
        }

        self.stats.original_edges_written = edge_data_writer.finish()? as u64;
        if let Some(writer) = lookup_writer {
            writer.finish()?;
        }

        info!("generated {} edge based nodes", self.edge_based_nodes.len());
        info!(
            "node-based graph contains {} edges",
            self.stats.node_based_edges
        );
        info!("edge-expanded graph:");
        info!("  contains {} edges", self.edge_based_edges.len());
        info!(
            "  skips {} turns, defined by {} restrictions",
            self.stats.restricted_turns,
            self.restrictions.len()
        );
        info!("  skips {} u-turns", self.stats.skipped_uturns);
        info!(
            "  skips {} turns over barriers",
            self.stats.skipped_barrier_turns
        );
        Ok(())
    }

    fn turn_penalty(&self, angle: f64) -> EdgeWeight {
        if let Some(function) = &self.turn_penalty_function {
            match function(STRAIGHT_ANGLE - angle) {
                Ok(penalty) => return penalty as EdgeWeight,
                Err(error) => warn!("turn penalty function failed: {:#}", error),
            }
        }
        0
    }

    fn tick_progress(&self, done: u64, total: u64) {
        if let Some(progress) = &self.progress {
            progress(done, total);
        }
    }
}
