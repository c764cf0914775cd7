//! Legal status transitions for access requests.
//!
//! `pending -> granted | rejected` and `granted -> revoked`. Nothing leaves
//! `rejected` or `revoked`.

use medvault_core::AccessStatus;

use crate::error::{PermsError, Result};

/// Every allowed `(from, to)` pair.
pub const LEGAL_TRANSITIONS: &[(AccessStatus, AccessStatus)] = &[
    (AccessStatus::Pending, AccessStatus::Granted),
    (AccessStatus::Pending, AccessStatus::Rejected),
    (AccessStatus::Granted, AccessStatus::Revoked),
];

/// Whether `from -> to` appears in the transition table.
pub fn is_legal(from: AccessStatus, to: AccessStatus) -> bool {
    LEGAL_TRANSITIONS.contains(&(from, to))
}

/// Check a transition, returning `InvalidTransition` if it is not legal.
pub fn check_transition(from: AccessStatus, to: AccessStatus) -> Result<()> {
    if is_legal(from, to) {
        Ok(())
    } else {
        Err(PermsError::InvalidTransition { from, to })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_matches_lifecycle() {
        use AccessStatus::*;

        assert!(is_legal(Pending, Granted));
        assert!(is_legal(Pending, Rejected));
        assert!(is_legal(Granted, Revoked));

        assert!(!is_legal(Pending, Revoked));
        assert!(!is_legal(Granted, Rejected));
        assert!(!is_legal(Granted, Pending));
        assert!(!is_legal(Pending, Pending));
    }

    #[test]
    fn test_terminal_statuses_have_no_exits() {
        for from in AccessStatus::ALL.into_iter().filter(|s| s.is_terminal()) {
            for to in AccessStatus::ALL {
                assert!(
                    check_transition(from, to).is_err(),
                    "{from} -> {to} should be illegal"
                );
            }
        }
    }
}
