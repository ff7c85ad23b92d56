//! Turn instruction vocabulary.
//!
//! A turn instruction is a `(type, direction modifier)` pair. The type
//! says what kind of maneuver a turn is (plain turn, ramp, fork, entering
//! a roundabout, ...), the modifier quantizes its direction into eight
//! buckets. The expansion pipeline assigns a raw instruction per turn and
//! then reworks it in the optimize/suppress passes.

/// Maneuver kind carried on an expanded edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum TurnType {
    Invalid = 0,
    NoTurn = 1,
    Suppressed = 2,
    NewName = 3,
    Continue = 4,
    Turn = 5,
    Merge = 6,
    Ramp = 7,
    Fork = 8,
    EndOfRoad = 9,
    EnterRoundabout = 10,
    EnterRoundaboutAtExit = 11,
    EnterRotary = 12,
    EnterRotaryAtExit = 13,
    RemainRoundabout = 14,
    ExitRoundabout = 15,
}

impl TurnType {
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    pub fn from_u8(value: u8) -> Option<Self> {
        use TurnType::*;
        Some(match value {
            0 => Invalid,
            1 => NoTurn,
            2 => Suppressed,
            3 => NewName,
            4 => Continue,
            5 => Turn,
            6 => Merge,
            7 => Ramp,
            8 => Fork,
            9 => EndOfRoad,
            10 => EnterRoundabout,
            11 => EnterRoundaboutAtExit,
            12 => EnterRotary,
            13 => EnterRotaryAtExit,
            14 => RemainRoundabout,
            15 => ExitRoundabout,
            _ => return None,
        })
    }
}

/// Quantized turn direction, symmetric about straight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum DirectionModifier {
    UTurn = 0,
    SharpRight = 1,
    Right = 2,
    SlightRight = 3,
    Straight = 4,
    SlightLeft = 5,
    Left = 6,
    SharpLeft = 7,
}

impl DirectionModifier {
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    pub fn from_u8(value: u8) -> Option<Self> {
        use DirectionModifier::*;
        Some(match value {
            0 => UTurn,
            1 => SharpRight,
            2 => Right,
            3 => SlightRight,
            4 => Straight,
            5 => SlightLeft,
            6 => Left,
            7 => SharpLeft,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TurnInstruction {
    pub kind: TurnType,
    pub modifier: DirectionModifier,
}

impl TurnInstruction {
    pub const NO_TURN: TurnInstruction = TurnInstruction {
        kind: TurnType::NoTurn,
        modifier: DirectionModifier::UTurn,
    };

    pub fn new(kind: TurnType, modifier: DirectionModifier) -> Self {
        Self { kind, modifier }
    }

    /// Announced as a full turn-around, whatever the maneuver kind: a
    /// ramp or roundabout exit whose angle buckets next to 0 counts too.
    pub fn is_uturn(self) -> bool {
        self.modifier == DirectionModifier::UTurn
    }
}

/// Maps an angle in `[0, 360)` to its direction modifier. The partition
/// is symmetric about 180 (straight); angles near 0/360 read as u-turns.
pub fn turn_direction(angle: f64) -> DirectionModifier {
    use DirectionModifier::*;
    if angle > 0.0 && angle < 60.0 {
        SharpRight
    } else if (60.0..140.0).contains(&angle) {
        Right
    } else if (140.0..160.0).contains(&angle) {
        SlightRight
    } else if (160.0..=200.0).contains(&angle) {
        Straight
    } else if angle > 200.0 && angle < 220.0 {
        SlightLeft
    } else if (220.0..300.0).contains(&angle) {
        Left
    } else if (300.0..340.0).contains(&angle) {
        SharpLeft
    } else {
        UTurn
    }
}

/// Raw analyzer output that the later passes are allowed to rework.
pub fn is_basic(kind: TurnType) -> bool {
    matches!(kind, TurnType::Turn | TurnType::Ramp)
}

/// Types that may be silently folded into a name change.
pub fn can_be_suppressed(kind: TurnType) -> bool {
    matches!(kind, TurnType::Turn | TurnType::Ramp | TurnType::Continue)
}

pub fn enters_roundabout(instruction: TurnInstruction) -> bool {
    matches!(
        instruction.kind,
        TurnType::EnterRoundabout
            | TurnType::EnterRoundaboutAtExit
            | TurnType::EnterRotary
            | TurnType::EnterRotaryAtExit
    )
}

pub fn is_on_roundabout(instruction: TurnInstruction) -> bool {
    enters_roundabout(instruction)
        || matches!(
            instruction.kind,
            TurnType::RemainRoundabout | TurnType::ExitRoundabout
        )
}

/// Two instructions claim the same announced direction.
pub fn is_conflict(first: TurnInstruction, second: TurnInstruction) -> bool {
    first.modifier == second.modifier && first.modifier != DirectionModifier::UTurn
}

pub fn is_slight_modifier(modifier: DirectionModifier) -> bool {
    matches!(
        modifier,
        DirectionModifier::SlightRight | DirectionModifier::Straight | DirectionModifier::SlightLeft
    )
}

pub fn is_slight_turn(instruction: TurnInstruction) -> bool {
    (is_basic(instruction.kind) || instruction.kind == TurnType::NoTurn)
        && is_slight_modifier(instruction.modifier)
}

pub fn is_sharp_turn(instruction: TurnInstruction) -> bool {
    (is_basic(instruction.kind) || instruction.kind == TurnType::NoTurn)
        && matches!(
            instruction.modifier,
            DirectionModifier::SharpRight | DirectionModifier::SharpLeft
        )
}

/// Swaps the left and right sides of the modifier scale.
pub fn mirror_modifier(modifier: DirectionModifier) -> DirectionModifier {
    use DirectionModifier::*;
    match modifier {
        UTurn => UTurn,
        SharpRight => SharpLeft,
        Right => Left,
        SlightRight => SlightLeft,
        Straight => Straight,
        SlightLeft => SlightRight,
        Left => Right,
        SharpLeft => SharpRight,
    }
}

/// One step along the modifier scale toward the right (`true`) or left
/// (`false`). `None` past the sharp ends; u-turns never shift.
pub fn shifted_modifier(modifier: DirectionModifier, to_right: bool) -> Option<DirectionModifier> {
    use DirectionModifier::*;
    let shifted = match (modifier, to_right) {
        (SlightRight, true) => Right,
        (Right, true) => SharpRight,
        (Straight, true) => SlightRight,
        (SlightLeft, true) => Straight,
        (Left, true) => SlightLeft,
        (SharpLeft, true) => Left,
        (SharpRight, false) => Right,
        (Right, false) => SlightRight,
        (SlightRight, false) => Straight,
        (Straight, false) => SlightLeft,
        (SlightLeft, false) => Left,
        (Left, false) => SharpLeft,
        _ => return None,
    };
    Some(shifted)
}
