//! Switchback: turn-aware edge expansion for road networks.
//!
//! Converts a node-based directed multigraph (nodes are map points,
//! edges are road segments) into an edge-expanded graph for shortest
//! path routing with accurate turn semantics:
//! - every directed road segment becomes a node of the expanded graph
//! - every legal turn at a junction becomes a weighted edge, carrying a
//!   turn instruction for later guidance
//!
//! The pipeline per incoming edge at each junction:
//! 1. candidate building: enumerate outgoing edges, filter restrictions,
//!    barriers, and u-turns, compute angles, assign raw instructions
//! 2. optimization: fork / end-of-road detection, ramp retargeting,
//!    conflict resolution between geometrically close turns
//! 3. suppression: stop announcing obvious continuations
//!
//! The run streams three artifacts: the length-prefixed original edge
//! data, and optionally the edge segment lookup and fixed penalty files.

pub mod cli;
pub mod ebg;
pub mod formats;
pub mod geo;
pub mod guidance;
pub mod nbg;

pub use ebg::{
    EdgeBasedEdge, EdgeBasedNode, EdgeExpander, ExpansionOutput, ExpansionStats, OutputConfig,
    SpeedProfile, TurnCandidate,
};
pub use formats::snapshot::{NetworkData, NetworkSnapshot};
pub use guidance::{DirectionModifier, TurnInstruction, TurnType};
