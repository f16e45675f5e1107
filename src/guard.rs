//! Commitment guard: tier adjustment versus new commitment.

use crate::lean::RoleLean;

/// Decide whether accepting `new_lean` is only a tier adjustment.
///
/// Returns `true` (keep the existing commitment timestamp) when both leans are
/// set and fall into the same category, e.g. moving between two dominant-leaning
/// roles. Returns `false` when either side is [`RoleLean::None`] or the
/// categories differ, which starts a fresh commitment.
pub fn prevent_timer_restart(new_lean: RoleLean, current_their_status: RoleLean) -> bool {
    match (new_lean.category(), current_their_status.category()) {
        (Some(new), Some(current)) => new == current,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lean::RoleLean::*;

    // This rule decides whether a commitment timestamp survives a status change.
    // It is inferred from how the accept flow uses it; if the boundary ever moves,
    // these cases are the ones to revisit first.

    #[test]
    fn test_same_dominant_category_prevents_restart() {
        assert!(prevent_timer_restart(Master, Owner));
        assert!(prevent_timer_restart(Owner, Mistress));
        assert!(prevent_timer_restart(Mistress, Mistress));
    }

    #[test]
    fn test_same_submissive_category_prevents_restart() {
        assert!(prevent_timer_restart(Pet, Slave));
        assert!(prevent_timer_restart(AbsoluteSlave, Submissive));
    }

    #[test]
    fn test_category_change_restarts() {
        assert!(!prevent_timer_restart(Owner, Pet));
        assert!(!prevent_timer_restart(Submissive, Master));
    }

    #[test]
    fn test_none_on_either_side_restarts() {
        assert!(!prevent_timer_restart(Master, None));
        assert!(!prevent_timer_restart(None, Owner));
        assert!(!prevent_timer_restart(None, None));
    }

    #[test]
    fn test_exhaustive_against_category_table() {
        for new in RoleLean::ALL {
            for current in RoleLean::ALL {
                assert_eq!(
                    prevent_timer_restart(new, current),
                    new.category() == current.category(),
                    "{new} vs {current}"
                );
            }
        }
    }
}
