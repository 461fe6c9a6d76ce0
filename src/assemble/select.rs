use crate::classify::{Classification, FragmentState};

/// The requested boolean operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BooleanOp {
    /// Union of all operands.
    Fuse,
    /// Intersection of all operands.
    Common,
    /// Objects minus tools.
    Cut,
    /// Tools minus objects.
    CutReverse,
    /// Intersection edges only.
    Section,
}

/// Which side of a cut an operand belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperandGroup {
    Object,
    Tool,
}

/// Decision about a split element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeepDecision {
    Keep,
    KeepFlipped,
    Discard,
}

/// A fragment's state against the union of all other operands.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CombinedState {
    In,
    Out,
    /// On a coincident boundary; `same` compares outward normals,
    /// `partner` is the coincident operand's index.
    On { same: bool, partner: usize },
}

/// Folds per-operand classifications into one state: containment in
/// any other operand dominates, then the lowest coincident partner,
/// then Out.
#[must_use]
pub fn combine_states(states: &[(usize, Classification)]) -> CombinedState {
    if states
        .iter()
        .any(|(_, c)| c.state == FragmentState::In)
    {
        return CombinedState::In;
    }
    for (partner, c) in states {
        match c.state {
            FragmentState::OnSame => {
                return CombinedState::On {
                    same: true,
                    partner: *partner,
                }
            }
            FragmentState::OnOpposite => {
                return CombinedState::On {
                    same: false,
                    partner: *partner,
                }
            }
            FragmentState::In | FragmentState::Out => {}
        }
    }
    CombinedState::Out
}

/// The fixed truth table over (operation, operand group, state).
///
/// Coincident duplicates are resolved by operand priority: of two
/// same-oriented On fragments, only the one from the lower operand
/// index survives (the same rule paves use).
///
/// | state        | Fuse            | Common          | Cut (object)   | Cut (tool)   |
/// |--------------|-----------------|-----------------|----------------|--------------|
/// | Out          | keep            | discard         | keep           | discard      |
/// | In           | discard         | keep            | discard        | keep flipped |
/// | On, same     | keep if lowest  | keep if lowest  | discard        | discard      |
/// | On, opposed  | discard         | discard         | keep           | discard      |
#[must_use]
pub fn decide(
    op: BooleanOp,
    group: OperandGroup,
    state: CombinedState,
    operand: usize,
) -> KeepDecision {
    match op {
        BooleanOp::Fuse => match state {
            CombinedState::Out => KeepDecision::Keep,
            CombinedState::In => KeepDecision::Discard,
            CombinedState::On { same: true, partner } => {
                if operand < partner {
                    KeepDecision::Keep
                } else {
                    KeepDecision::Discard
                }
            }
            CombinedState::On { same: false, .. } => KeepDecision::Discard,
        },
        BooleanOp::Common => match state {
            CombinedState::In => KeepDecision::Keep,
            CombinedState::Out => KeepDecision::Discard,
            CombinedState::On { same: true, partner } => {
                if operand < partner {
                    KeepDecision::Keep
                } else {
                    KeepDecision::Discard
                }
            }
            CombinedState::On { same: false, .. } => KeepDecision::Discard,
        },
        BooleanOp::Cut | BooleanOp::CutReverse => match (group, state) {
            (OperandGroup::Object, CombinedState::Out) => KeepDecision::Keep,
            (OperandGroup::Object, CombinedState::On { same: false, .. }) => KeepDecision::Keep,
            (OperandGroup::Object, _) => KeepDecision::Discard,
            (OperandGroup::Tool, CombinedState::In) => KeepDecision::KeepFlipped,
            (OperandGroup::Tool, _) => KeepDecision::Discard,
        },
        BooleanOp::Section => KeepDecision::Discard,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fuse_keeps_outside_discards_inside() {
        assert_eq!(
            decide(BooleanOp::Fuse, OperandGroup::Object, CombinedState::Out, 0),
            KeepDecision::Keep
        );
        assert_eq!(
            decide(BooleanOp::Fuse, OperandGroup::Object, CombinedState::In, 1),
            KeepDecision::Discard
        );
    }

    #[test]
    fn coincident_duplicates_keep_only_the_lower_operand() {
        let on = CombinedState::On {
            same: true,
            partner: 1,
        };
        assert_eq!(
            decide(BooleanOp::Fuse, OperandGroup::Object, on, 0),
            KeepDecision::Keep
        );
        let on_from_b = CombinedState::On {
            same: true,
            partner: 0,
        };
        assert_eq!(
            decide(BooleanOp::Fuse, OperandGroup::Object, on_from_b, 1),
            KeepDecision::Discard
        );
    }

    #[test]
    fn cut_flips_tool_fragments_inside_objects() {
        assert_eq!(
            decide(BooleanOp::Cut, OperandGroup::Tool, CombinedState::In, 1),
            KeepDecision::KeepFlipped
        );
        assert_eq!(
            decide(BooleanOp::Cut, OperandGroup::Tool, CombinedState::Out, 1),
            KeepDecision::Discard
        );
    }

    #[test]
    fn cut_drops_same_oriented_coincident_object_faces() {
        let on_same = CombinedState::On {
            same: true,
            partner: 1,
        };
        let on_opposed = CombinedState::On {
            same: false,
            partner: 1,
        };
        assert_eq!(
            decide(BooleanOp::Cut, OperandGroup::Object, on_same, 0),
            KeepDecision::Discard
        );
        assert_eq!(
            decide(BooleanOp::Cut, OperandGroup::Object, on_opposed, 0),
            KeepDecision::Keep
        );
    }

    #[test]
    fn combine_prefers_containment_over_boundary() {
        let states = [
            (
                1,
                Classification {
                    state: FragmentState::OnSame,
                    ambiguous: false,
                },
            ),
            (
                2,
                Classification {
                    state: FragmentState::In,
                    ambiguous: false,
                },
            ),
        ];
        assert_eq!(combine_states(&states), CombinedState::In);
    }
}
