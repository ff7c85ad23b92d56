//! Turn suppression: stop announcing the obvious.
//!
//! A continuation on the same road becomes `Suppressed`, a continuation
//! onto a renamed road becomes `NewName`, a ramp flowing into a through
//! road becomes `Merge`. Anything involving a travel-mode change is
//! always announced.

use crate::geo::{
    angular_deviation, DISTINCTION_RATIO, FUZZY_STRAIGHT_ANGLE,
    MAXIMAL_ALLOWED_NO_TURN_DEVIATION, NARROW_TURN_ANGLE, STRAIGHT_ANGLE,
};
use crate::guidance::{
    can_be_suppressed, is_basic, is_slight_modifier, mirror_modifier, turn_direction,
    DirectionModifier, TurnInstruction, TurnType,
};
use crate::nbg::EdgeId;

use super::optimize::is_angle_sorted;
use super::{EdgeExpander, TurnCandidate};

impl<'a> EdgeExpander<'a> {
    /// A turn so clearly the way to go that announcing it is noise.
    pub(super) fn is_obvious_choice(
        &self,
        via_edge: EdgeId,
        turn_index: usize,
        candidates: &[TurnCandidate],
    ) -> bool {
        let len = candidates.len();
        let get_left = |index: usize| (index + 1) % len;
        let get_right = |index: usize| (index + len - 1) % len;

        let candidate = &candidates[turn_index];
        let in_data = self.graph.edge_data(via_edge);
        let out_data = self.graph.edge_data(candidate.edge);
        let candidate_to_the_left = &candidates[get_left(turn_index)];
        let candidate_to_the_right = &candidates[get_right(turn_index)];

        // nearly straight and both neighbors bend away at least twice as far
        let has_valid_ratio =
            |left: &TurnCandidate, center: &TurnCandidate, right: &TurnCandidate| {
                let angle_left = if left.angle > STRAIGHT_ANGLE {
                    angular_deviation(left.angle, STRAIGHT_ANGLE)
                } else {
                    180.0
                };
                let angle_right = if right.angle < STRAIGHT_ANGLE {
                    angular_deviation(right.angle, STRAIGHT_ANGLE)
                } else {
                    180.0
                };
                let self_angle = angular_deviation(center.angle, STRAIGHT_ANGLE);
                self_angle < NARROW_TURN_ANGLE
                    && if center.angle < STRAIGHT_ANGLE {
                        angle_right > self_angle && angle_left / self_angle > DISTINCTION_RATIO
                    } else {
                        angle_left > self_angle && angle_right / self_angle > DISTINCTION_RATIO
                    }
            };

        // the only real road among side streets
        if !out_data.road_class.is_low_priority() {
            let mut is_only_normal_road = true;
            for (index, other) in candidates.iter().enumerate() {
                if index == turn_index || other.angle == 0.0 {
                    continue;
                }
                if !self.graph.edge_data(other.edge).road_class.is_low_priority() {
                    is_only_normal_road = false;
                    break;
                }
            }
            if is_only_normal_road {
                return true;
            }
        }

        len == 1
            || (len == 2 && candidate_to_the_left.instruction.is_uturn())
            || angular_deviation(candidate.angle, STRAIGHT_ANGLE)
                < MAXIMAL_ALLOWED_NO_TURN_DEVIATION
            || has_valid_ratio(candidate_to_the_left, candidate, candidate_to_the_right)
            || (in_data.name_id != 0
                && in_data.name_id == out_data.name_id
                && angular_deviation(candidate.angle, STRAIGHT_ANGLE) < NARROW_TURN_ANGLE / 2.0)
    }

    /// Marks obvious continuations as suppressed, renames same-direction
    /// continuations onto other roads, demotes low-priority side roads.
    pub(super) fn suppress_turns(
        &self,
        via_edge: EdgeId,
        mut candidates: Vec<TurnCandidate>,
    ) -> Vec<TurnCandidate> {
        // plain three-way junction where a side road leaves a through road
        if candidates.len() == 3 {
            debug_assert!(candidates[0].instruction.modifier == DirectionModifier::UTurn);
            let class_first = self.graph.edge_data(candidates[1].edge).road_class;
            let class_second = self.graph.edge_data(candidates[2].edge).road_class;
            let in_name = self.graph.edge_data(via_edge).name_id;

            if class_first.is_low_priority() && !class_second.is_low_priority() {
                if angular_deviation(candidates[2].angle, STRAIGHT_ANGLE) < NARROW_TURN_ANGLE {
                    if self.graph.edge_data(candidates[2].edge).name_id == in_name {
                        candidates[2].instruction = TurnInstruction::NO_TURN;
                    } else {
                        candidates[2].instruction.kind = TurnType::NewName;
                    }
                    return candidates;
                }
            } else if class_second.is_low_priority()
                && !class_first.is_low_priority()
                && angular_deviation(candidates[1].angle, STRAIGHT_ANGLE) < NARROW_TURN_ANGLE
            {
                if self.graph.edge_data(candidates[1].edge).name_id == in_name {
                    candidates[1].instruction = TurnInstruction::NO_TURN;
                } else {
                    candidates[1].instruction.kind = TurnType::NewName;
                }
                return candidates;
            }
        }

        debug_assert!(
            is_angle_sorted(&candidates),
            "turn candidates not sorted by angle"
        );

        let len = candidates.len();
        let get_left = |index: usize| (index + 1) % len;
        let get_right = |index: usize| (index + len - 1) % len;

        let in_data = *self.graph.edge_data(via_edge);

        let mut has_obvious_with_same_name = false;
        let mut obvious_with_same_name_angle = 0.0;
        for turn_index in 0..len {
            if self.graph.edge_data(candidates[turn_index].edge).name_id == in_data.name_id
                && self.is_obvious_choice(via_edge, turn_index, &candidates)
            {
                has_obvious_with_same_name = true;
                obvious_with_same_name_angle = candidates[turn_index].angle;
                break;
            }
        }

        for turn_index in 0..len {
            if !is_basic(candidates[turn_index].instruction.kind) {
                continue;
            }

            let out_data = *self.graph.edge_data(candidates[turn_index].edge);
            if out_data.name_id == in_data.name_id
                && in_data.name_id != 0
                && candidates[turn_index].instruction.modifier != DirectionModifier::UTurn
                && !has_obvious_with_same_name
            {
                candidates[turn_index].instruction.kind = TurnType::Continue;
            }

            if !candidates[turn_index].valid || candidates[turn_index].instruction.is_uturn() {
                continue;
            }

            let left = candidates[get_left(turn_index)];
            let right = candidates[get_right(turn_index)];
            let angle = candidates[turn_index].angle;

            // very slight instructions become straight if they are the
            // only valid choice going at most slightly sideways
            if (!is_slight_modifier(turn_direction(left.angle)) || !left.valid)
                && (!is_slight_modifier(turn_direction(right.angle)) || !right.valid)
                && angular_deviation(angle, STRAIGHT_ANGLE) < FUZZY_STRAIGHT_ANGLE
            {
                candidates[turn_index].instruction.modifier = DirectionModifier::Straight;
            }

            // mode changes are always announced
            if in_data.travel_mode != out_data.travel_mode {
                continue;
            }

            if self.is_obvious_choice(via_edge, turn_index, &candidates) {
                if in_data.name_id == out_data.name_id {
                    // same road
                    candidates[turn_index].instruction.kind = TurnType::Suppressed;
                } else if !has_obvious_with_same_name {
                    if in_data.road_class.is_ramp() && !out_data.road_class.is_ramp() {
                        candidates[turn_index].instruction.kind = TurnType::Merge;
                        candidates[turn_index].instruction.modifier =
                            mirror_modifier(candidates[turn_index].instruction.modifier);
                    } else if can_be_suppressed(candidates[turn_index].instruction.kind) {
                        candidates[turn_index].instruction.kind = TurnType::NewName;
                    }
                } else if angle < obvious_with_same_name_angle {
                    candidates[turn_index].instruction.modifier = DirectionModifier::SlightRight;
                } else {
                    candidates[turn_index].instruction.modifier = DirectionModifier::SlightLeft;
                }
            } else if candidates[turn_index].instruction.modifier == DirectionModifier::Straight
                && has_obvious_with_same_name
            {
                if angle < obvious_with_same_name_angle {
                    candidates[turn_index].instruction.modifier = DirectionModifier::SlightRight;
                } else {
                    candidates[turn_index].instruction.modifier = DirectionModifier::SlightLeft;
                }
            }
        }

        candidates
    }
}
