//! Turn restrictions.
//!
//! Two kinds of rules restrict the turns at a junction: an "only" rule
//! fixes the single legal continuation for a `(from, via)` pair, a "no"
//! rule forbids one specific `(from, via, to)` triple. Both queries hash
//! on their key; the map is immutable once built.

use std::collections::{HashMap, HashSet};

use super::NodeId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TurnRestriction {
    pub from: NodeId,
    pub via: NodeId,
    pub to: NodeId,
    pub is_only: bool,
}

#[derive(Debug, Default)]
pub struct RestrictionMap {
    only_turns: HashMap<(NodeId, NodeId), NodeId>,
    forbidden_turns: HashSet<(NodeId, NodeId, NodeId)>,
}

impl RestrictionMap {
    pub fn from_restrictions(restrictions: &[TurnRestriction]) -> Self {
        let mut map = Self::default();
        for restriction in restrictions {
            if restriction.is_only {
                map.only_turns
                    .insert((restriction.from, restriction.via), restriction.to);
            } else {
                map.forbidden_turns
                    .insert((restriction.from, restriction.via, restriction.to));
            }
        }
        map
    }

    /// The forced continuation of an only-restriction at `(from, via)`.
    pub fn only_turn_target(&self, from: NodeId, via: NodeId) -> Option<NodeId> {
        self.only_turns.get(&(from, via)).copied()
    }

    /// Whether a no-restriction forbids `(from, via, to)`.
    pub fn is_restricted(&self, from: NodeId, via: NodeId, to: NodeId) -> bool {
        self.forbidden_turns.contains(&(from, via, to))
    }

    pub fn len(&self) -> usize {
        self.only_turns.len() + self.forbidden_turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
