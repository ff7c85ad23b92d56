//! Per-intersection turn candidates.
//!
//! For one incoming edge, every adjacent outgoing edge becomes a
//! candidate: restriction, barrier, and u-turn filters decide validity,
//! the analyzer assigns a raw instruction, and the result is sorted by
//! angle. Invalid candidates that are geometrically indistinguishable
//! from a valid neighbor are dropped so they cannot distort the later
//! conflict resolution.

use crate::geo::{angular_deviation, compute_angle, Coordinate, NARROW_TURN_ANGLE};
use crate::guidance::{
    enters_roundabout, is_basic, turn_direction, DirectionModifier, TurnInstruction, TurnType,
};
use crate::nbg::compressed::CompressedEdgeContainer;
use crate::nbg::{EdgeId, NodeId, QueryNode};

use super::EdgeExpander;

#[derive(Debug, Clone, Copy)]
pub struct TurnCandidate {
    pub edge: EdgeId,
    pub valid: bool,
    /// Turn angle in `[0, 360)`, 180 straight through, 0 u-turn.
    pub angle: f64,
    pub instruction: TurnInstruction,
    /// Tie-breaker in `(0, 1]` for conflict resolution.
    pub confidence: f64,
}

/// Picks the point next to the junction on `via_edge`, so the computed
/// angle reflects the road shape at the junction rather than its far end.
/// `invert` selects the target-side end of the edge.
pub fn representative_coordinate(
    from_node: NodeId,
    to_node: NodeId,
    via_edge: EdgeId,
    invert: bool,
    geometry: &CompressedEdgeContainer,
    coordinates: &[QueryNode],
) -> Coordinate {
    if geometry.has_entry(via_edge) {
        let bucket = geometry.bucket(via_edge);
        if invert {
            if bucket.len() >= 2 {
                return coordinates[bucket[bucket.len() - 2].node_id as usize].coordinate;
            }
            coordinates[from_node as usize].coordinate
        } else {
            coordinates[bucket[0].node_id as usize].coordinate
        }
    } else if invert {
        coordinates[from_node as usize].coordinate
    } else {
        coordinates[to_node as usize].coordinate
    }
}

/// How well the angle matches the announced direction. Instructions the
/// later passes never relabel are fully trusted.
fn turn_confidence(angle: f64, instruction: TurnInstruction) -> f64 {
    if !is_basic(instruction.kind) || instruction.is_uturn() {
        return 1.0;
    }
    use DirectionModifier::*;
    let center = match instruction.modifier {
        UTurn => 0.0,
        SharpRight => 45.0,
        Right => 90.0,
        SlightRight => 150.0,
        Straight => 180.0,
        SlightLeft => 210.0,
        Left => 270.0,
        SharpLeft => 315.0,
    };
    (1.0 - angular_deviation(angle, center) / 180.0).max(0.1)
}

fn is_invalid_equivalent(candidates: &[TurnCandidate], this: usize, valid: usize) -> bool {
    if !candidates[valid].valid || candidates[this].valid {
        return false;
    }
    angular_deviation(candidates[this].angle, candidates[valid].angle) < NARROW_TURN_ANGLE
}

impl<'a> EdgeExpander<'a> {
    /// Classifies the turn `node_u --edge1--> node_v --edge2--> node_w`.
    pub(super) fn analyze_turn(
        &self,
        node_u: NodeId,
        edge1: EdgeId,
        node_v: NodeId,
        edge2: EdgeId,
        node_w: NodeId,
        angle: f64,
    ) -> TurnInstruction {
        let data1 = self.graph.edge_data(edge1);
        let data2 = self.graph.edge_data(edge2);

        if node_u == node_w {
            return TurnInstruction::new(TurnType::Turn, DirectionModifier::UTurn);
        }

        // roundabouts need explicit handling
        if data1.roundabout && data2.roundabout {
            if self.graph.directed_out_degree(node_v) == 1 {
                // no turn possible
                return TurnInstruction::NO_TURN;
            }
            return TurnInstruction::new(TurnType::RemainRoundabout, turn_direction(angle));
        }
        if !data1.roundabout && data2.roundabout {
            return TurnInstruction::new(TurnType::EnterRoundabout, turn_direction(angle));
        }
        if data1.roundabout && !data2.roundabout {
            return TurnInstruction::new(TurnType::ExitRoundabout, turn_direction(angle));
        }

        if !data1.road_class.is_ramp() && data2.road_class.is_ramp() {
            return TurnInstruction::new(TurnType::Ramp, turn_direction(angle));
        }

        TurnInstruction::new(TurnType::Turn, turn_direction(angle))
    }

    /// Builds the sorted candidate list for the incoming `via_edge`.
    pub(super) fn turn_candidates(
        &mut self,
        from_node: NodeId,
        via_edge: EdgeId,
    ) -> Vec<TurnCandidate> {
        let turn_node = self.graph.target(via_edge);
        let only_restriction_to = self.restrictions.only_turn_target(from_node, turn_node);
        let is_barrier_node = self.barrier_nodes.contains(&turn_node);

        let mut has_non_roundabout = false;
        let mut has_roundabout_entry = false;

        let mut candidates = Vec::with_capacity(self.graph.out_degree(turn_node));
        for onto_edge in self.graph.edge_range(turn_node) {
            let mut turn_is_valid = !self.graph.edge_data(onto_edge).reversed;
            let to_node = self.graph.target(onto_edge);

            if turn_is_valid {
                if let Some(required_target) = only_restriction_to {
                    if to_node != required_target {
                        // an only_-restriction pins the turn elsewhere
                        self.stats.restricted_turns += 1;
                        turn_is_valid = false;
                    }
                }
            }

            if turn_is_valid {
                if is_barrier_node {
                    if from_node != to_node {
                        self.stats.skipped_barrier_turns += 1;
                        turn_is_valid = false;
                    }
                } else if from_node == to_node && self.graph.out_degree(turn_node) > 1 {
                    // u-turns are allowed only at the end of dead-end streets
                    let mut emitting_bidirectional_edges = 0;
                    for edge in self.graph.edge_range(turn_node) {
                        let target = self.graph.target(edge);
                        if let Some(reverse_edge) = self.graph.find_edge(target, turn_node) {
                            if !self.graph.edge_data(reverse_edge).reversed {
                                emitting_bidirectional_edges += 1;
                            }
                        }
                    }
                    if emitting_bidirectional_edges > 1 {
                        self.stats.skipped_uturns += 1;
                        turn_is_valid = false;
                    }
                }
            }

            if turn_is_valid && self.restrictions.is_restricted(from_node, turn_node, to_node) {
                self.stats.restricted_turns += 1;
                turn_is_valid = false;
            }

            // the exact zero keeps the u-turn at index 0 after sorting
            let angle = if from_node == to_node {
                0.0
            } else {
                let first_coordinate = representative_coordinate(
                    from_node,
                    turn_node,
                    via_edge,
                    true,
                    self.geometry,
                    self.coordinates,
                );
                let third_coordinate = representative_coordinate(
                    turn_node,
                    to_node,
                    onto_edge,
                    false,
                    self.geometry,
                    self.coordinates,
                );
                compute_angle(
                    first_coordinate,
                    self.coordinates[turn_node as usize].coordinate,
                    third_coordinate,
                )
            };

            let instruction = self.analyze_turn(from_node, via_edge, turn_node, onto_edge, to_node, angle);

            if turn_is_valid && !enters_roundabout(instruction) {
                has_non_roundabout = true;
            } else if turn_is_valid {
                has_roundabout_entry = true;
            }

            let mut confidence = turn_confidence(angle, instruction);
            if !turn_is_valid {
                // invalid turns should lose conflicts more often
                confidence *= 0.8;
            }

            candidates.push(TurnCandidate {
                edge: onto_edge,
                valid: turn_is_valid,
                angle,
                instruction,
                confidence,
            });
        }

        // passing through this junction both enters and exits the roundabout
        if has_non_roundabout && has_roundabout_entry {
            for candidate in &mut candidates {
                if enters_roundabout(candidate.instruction) {
                    candidate.instruction.kind = match candidate.instruction.kind {
                        TurnType::EnterRotary => TurnType::EnterRotaryAtExit,
                        TurnType::EnterRoundabout => TurnType::EnterRoundaboutAtExit,
                        other => other,
                    };
                }
            }
        }

        candidates.sort_by(|left, right| {
            left.angle
                .partial_cmp(&right.angle)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let mut index = 0;
        while index < candidates.len() {
            let len = candidates.len();
            let left = (index + 1) % len;
            let right = (index + len - 1) % len;
            if is_invalid_equivalent(&candidates, index, right)
                || is_invalid_equivalent(&candidates, index, left)
            {
                candidates.remove(index);
            } else {
                index += 1;
            }
        }

        candidates
    }
}
