//! Candidate optimization: fork and end-of-road detection, ramp
//! retargeting, and conflict resolution between geometrically close
//! turns.
//!
//! All passes require the candidates sorted by angle and only mutate
//! instruction fields; the sort order and validity flags survive
//! untouched. Conflicts that cannot be resolved are logged at debug and
//! left alone, downstream routing tolerates coarse modifiers.

use log::debug;

use crate::geo::{angular_deviation, NARROW_TURN_ANGLE, STRAIGHT_ANGLE};
use crate::guidance::{
    is_basic, is_conflict, is_on_roundabout, is_sharp_turn, is_slight_modifier, is_slight_turn,
    shifted_modifier, DirectionModifier, TurnType,
};
use crate::nbg::EdgeId;

use super::{EdgeExpander, TurnCandidate};

const RESOLVE_TO_RIGHT: bool = true;
const RESOLVE_TO_LEFT: bool = false;

pub(super) fn is_angle_sorted(candidates: &[TurnCandidate]) -> bool {
    candidates.windows(2).all(|pair| pair[0].angle <= pair[1].angle)
}

/// Steps the modifier of `index` one notch toward `to_right` unless its
/// neighbor already holds that slot or the scale ends.
fn resolve(
    candidates: &mut [TurnCandidate],
    index: usize,
    neighbor: usize,
    to_right: bool,
) -> bool {
    let Some(next) = shifted_modifier(candidates[index].instruction.modifier, to_right) else {
        return false;
    };
    if candidates[neighbor].instruction.modifier == next {
        return false;
    }
    candidates[index].instruction.modifier = next;
    true
}

/// Steps the neighbor out of the way first, then takes its slot.
fn resolve_transitive(
    candidates: &mut [TurnCandidate],
    index: usize,
    neighbor: usize,
    beyond: usize,
    to_right: bool,
) -> bool {
    let Some(next) = shifted_modifier(candidates[index].instruction.modifier, to_right) else {
        return false;
    };
    if !resolve(candidates, neighbor, beyond, to_right) {
        return false;
    }
    candidates[index].instruction.modifier = next;
    true
}

fn keep_straight(angle: f64) -> bool {
    (angle - STRAIGHT_ANGLE).abs() < 5.0
}

fn handle_fork_and_end(kind: TurnType, mut candidates: Vec<TurnCandidate>) -> Vec<TurnCandidate> {
    candidates[1].instruction.kind = kind;
    candidates[1].instruction.modifier = if kind == TurnType::Fork {
        DirectionModifier::SlightRight
    } else {
        DirectionModifier::Right
    };
    candidates[2].instruction.kind = kind;
    candidates[2].instruction.modifier = if kind == TurnType::Fork {
        DirectionModifier::SlightLeft
    } else {
        DirectionModifier::Left
    };
    candidates
}

/// Resolves a two-candidate conflict region `[begin, end]`.
fn resolve_conflict_pair(candidates: &mut [TurnCandidate], begin: usize, end: usize) {
    let len = candidates.len();
    let left_of_end = (end + 1) % len;
    let right_of_begin = (begin + len - 1) % len;

    if candidates[begin].instruction.modifier == DirectionModifier::Straight
        && candidates[left_of_end].instruction.modifier != DirectionModifier::SlightLeft
        && candidates[right_of_begin].instruction.modifier != DirectionModifier::SlightRight
    {
        // both claim straight: push the region apart outward
        let mut resolved_count = 0;
        if !keep_straight(candidates[end].angle)
            && !resolve(candidates, end, left_of_end, RESOLVE_TO_LEFT)
        {
            debug!("failed to resolve conflict");
        } else {
            resolved_count += 1;
        }
        if !keep_straight(candidates[begin].angle)
            && !resolve(candidates, begin, right_of_begin, RESOLVE_TO_RIGHT)
        {
            debug!("failed to resolve conflict");
        } else {
            resolved_count += 1;
        }
        if resolved_count >= 1
            && (!keep_straight(candidates[begin].angle) || !keep_straight(candidates[end].angle))
        {
            return;
        }
    }

    if candidates[begin].confidence < candidates[end].confidence {
        // right shift is cheaper, or the only option
        if resolve(candidates, begin, right_of_begin, RESOLVE_TO_RIGHT)
            || resolve(candidates, end, left_of_end, RESOLVE_TO_LEFT)
        {
            return;
        }
    } else if resolve(candidates, end, left_of_end, RESOLVE_TO_LEFT)
        || resolve(candidates, begin, right_of_begin, RESOLVE_TO_RIGHT)
    {
        return;
    }

    let instruction = candidates[begin].instruction;
    if is_slight_turn(instruction) || is_sharp_turn(instruction) {
        let resolve_direction = if matches!(
            instruction.modifier,
            DirectionModifier::SlightRight | DirectionModifier::SharpLeft
        ) {
            RESOLVE_TO_RIGHT
        } else {
            RESOLVE_TO_LEFT
        };
        if resolve_direction == RESOLVE_TO_RIGHT {
            resolve_transitive(
                candidates,
                begin,
                right_of_begin,
                (begin + len - 2) % len,
                RESOLVE_TO_RIGHT,
            );
        } else {
            resolve_transitive(
                candidates,
                end,
                left_of_end,
                (end + 2) % len,
                RESOLVE_TO_LEFT,
            );
        }
    }
}

/// Best-effort resolution of a conflict region of three or more.
fn resolve_conflict_region(candidates: &mut [TurnCandidate], begin: usize, end: usize) {
    let len = candidates.len();
    let left_of_end = (end + 1) % len;
    let right_of_begin = (begin + len - 1) % len;

    if !resolve(candidates, begin, right_of_begin, RESOLVE_TO_RIGHT) {
        if is_slight_turn(candidates[begin].instruction) {
            resolve_transitive(
                candidates,
                begin,
                right_of_begin,
                (begin + len - 2) % len,
                RESOLVE_TO_RIGHT,
            );
        } else if is_sharp_turn(candidates[begin].instruction) {
            resolve_transitive(
                candidates,
                end,
                left_of_end,
                (end + 2) % len,
                RESOLVE_TO_LEFT,
            );
        }
    }
    if !resolve(candidates, end, left_of_end, RESOLVE_TO_LEFT) {
        if is_slight_turn(candidates[begin].instruction) {
            resolve_transitive(
                candidates,
                end,
                left_of_end,
                (end + 2) % len,
                RESOLVE_TO_LEFT,
            );
        } else if is_sharp_turn(candidates[begin].instruction) {
            resolve_transitive(
                candidates,
                begin,
                right_of_begin,
                (begin + len - 2) % len,
                RESOLVE_TO_RIGHT,
            );
        }
    }
}

impl<'a> EdgeExpander<'a> {
    /// Fork / end-of-road special case: exactly three candidates with the
    /// u-turn in front.
    fn check_fork_and_end(&self, via_edge: EdgeId, candidates: &[TurnCandidate]) -> TurnType {
        if candidates.len() != 3
            || candidates[0].instruction.modifier != DirectionModifier::UTurn
        {
            return TurnType::Invalid;
        }

        if is_on_roundabout(candidates[1].instruction)
            || is_on_roundabout(candidates[2].instruction)
        {
            return TurnType::Invalid;
        }

        let class_in = self.graph.edge_data(via_edge).road_class;
        let class_left = self.graph.edge_data(candidates[1].edge).road_class;
        let class_right = self.graph.edge_data(candidates[2].edge).road_class;

        if angular_deviation(candidates[1].angle, STRAIGHT_ANGLE) < NARROW_TURN_ANGLE
            && angular_deviation(candidates[2].angle, STRAIGHT_ANGLE) < NARROW_TURN_ANGLE
        {
            if class_in != class_left || class_left != class_right {
                return TurnType::Invalid;
            }
            if candidates[1].valid && candidates[2].valid {
                return TurnType::Fork;
            }
        } else if angular_deviation(candidates[1].angle, 90.0) < NARROW_TURN_ANGLE
            && angular_deviation(candidates[2].angle, 270.0) < NARROW_TURN_ANGLE
        {
            return TurnType::EndOfRoad;
        }

        TurnType::Invalid
    }

    /// Suppresses a ramp's same-name continuation and re-aims other ramp
    /// candidates relative to it.
    fn optimize_ramps(
        &self,
        via_edge: EdgeId,
        mut candidates: Vec<TurnCandidate>,
    ) -> Vec<TurnCandidate> {
        let in_data = *self.graph.edge_data(via_edge);
        let mut continue_edge = None;
        for candidate in &mut candidates {
            if candidate.instruction.modifier == DirectionModifier::UTurn {
                continue;
            }
            let out_data = self.graph.edge_data(candidate.edge);
            if out_data.name_id == in_data.name_id {
                continue_edge = Some(candidate.edge);
                if angular_deviation(candidate.angle, STRAIGHT_ANGLE) < NARROW_TURN_ANGLE
                    && in_data.road_class.is_ramp()
                {
                    candidate.instruction.kind = TurnType::Suppressed;
                }
                break;
            }
        }

        if let Some(continue_edge) = continue_edge {
            let mut to_the_right = true;
            for candidate in &mut candidates {
                if candidate.edge == continue_edge {
                    to_the_right = false;
                    continue;
                }
                if candidate.instruction.kind != TurnType::Ramp {
                    continue;
                }
                if is_slight_modifier(candidate.instruction.modifier) {
                    candidate.instruction.modifier = if to_the_right {
                        DirectionModifier::SlightRight
                    } else {
                        DirectionModifier::SlightLeft
                    };
                }
            }
        }
        candidates
    }

    /// Reworks sorted candidates: fork/end special case, ramps, repeated
    /// u-turns, then same-direction conflicts between angle neighbors.
    pub(super) fn optimize_candidates(
        &self,
        via_edge: EdgeId,
        mut candidates: Vec<TurnCandidate>,
    ) -> Vec<TurnCandidate> {
        debug_assert!(
            is_angle_sorted(&candidates),
            "turn candidates not sorted by angle"
        );
        if candidates.len() <= 1 {
            return candidates;
        }

        let fork_or_end = self.check_fork_and_end(via_edge, &candidates);
        if fork_or_end != TurnType::Invalid {
            return handle_fork_and_end(fork_or_end, candidates);
        }

        candidates = self.optimize_ramps(via_edge, candidates);

        let len = candidates.len();
        let get_left = |index: usize| (index + 1) % len;
        let get_right = |index: usize| (index + len - 1) % len;

        // several u-turn-angle candidates happen on divided roads with
        // separated parking loops
        if candidates[0].instruction.is_uturn() && candidates[0].angle == 0.0 {
            if candidates[get_left(0)].instruction.is_uturn() {
                candidates[get_left(0)].instruction.modifier = DirectionModifier::SharpLeft;
            }
            if candidates[get_right(0)].instruction.is_uturn() {
                candidates[get_right(0)].instruction.modifier = DirectionModifier::SharpRight;
            }
        }

        let mut turn_index = 0;
        while turn_index < len {
            let turn_instruction = candidates[turn_index].instruction;
            if !is_basic(turn_instruction.kind)
                || turn_instruction.is_uturn()
                || is_on_roundabout(turn_instruction)
            {
                turn_index += 1;
                continue;
            }

            let left_index = get_left(turn_index);
            if candidates[turn_index].angle == candidates[left_index].angle {
                let location = self.coordinates[self.graph.target(via_edge) as usize].coordinate;
                debug!(
                    "conflicting turn angles, identical road duplicated? {} {}",
                    location.lat, location.lon
                );
            }

            if !is_conflict(candidates[turn_index].instruction, candidates[left_index].instruction)
            {
                turn_index += 1;
                continue;
            }

            // maximal contiguous region sharing the contested modifier
            let conflict_begin = turn_index;
            let mut conflict_end = left_index;
            let mut conflict_size = 2;
            while is_conflict(
                candidates[get_left(conflict_end)].instruction,
                turn_instruction,
            ) && conflict_size < len
            {
                conflict_end = get_left(conflict_end);
                conflict_size += 1;
            }

            if conflict_size == 2 {
                resolve_conflict_pair(&mut candidates, conflict_begin, conflict_end);
            } else {
                if conflict_size > 3 {
                    // cannot be modeled; resolve the ends, keep the rest
                    let location =
                        self.coordinates[self.graph.target(via_edge) as usize].coordinate;
                    debug!(
                        "found conflict larger than size three at {}, {}",
                        location.lat, location.lon
                    );
                }
                resolve_conflict_region(&mut candidates, conflict_begin, conflict_end);
            }

            turn_index = if conflict_end < conflict_begin {
                len
            } else {
                conflict_end + 1
            };
        }

        candidates
    }
}
