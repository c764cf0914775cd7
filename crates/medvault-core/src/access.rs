//! Access request data model.
//!
//! The legal transitions between statuses are enforced by the access
//! engine; this module only describes the rows.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::types::{Principal, RecordId, RequestId};

/// Lifecycle status of an access request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessStatus {
    Pending,
    Granted,
    Revoked,
    Rejected,
}

impl AccessStatus {
    pub const ALL: [AccessStatus; 4] = [
        AccessStatus::Pending,
        AccessStatus::Granted,
        AccessStatus::Revoked,
        AccessStatus::Rejected,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AccessStatus::Pending => "pending",
            AccessStatus::Granted => "granted",
            AccessStatus::Revoked => "revoked",
            AccessStatus::Rejected => "rejected",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(AccessStatus::Pending),
            "granted" => Some(AccessStatus::Granted),
            "revoked" => Some(AccessStatus::Revoked),
            "rejected" => Some(AccessStatus::Rejected),
            _ => None,
        }
    }

    /// `rejected` and `revoked` never change again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, AccessStatus::Revoked | AccessStatus::Rejected)
    }
}

impl fmt::Display for AccessStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Conditions that may limit a grant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Conditions {
    /// When the grant expires (Unix ms). `None` means permanent.
    pub expires_at: Option<i64>,
}

impl Conditions {
    /// No restrictions.
    pub fn permanent() -> Self {
        Self { expires_at: None }
    }

    /// Expire at the given timestamp.
    pub fn expires_at(timestamp: i64) -> Self {
        Self {
            expires_at: Some(timestamp),
        }
    }

    /// Whether the conditions still hold at `now`.
    pub fn is_valid(&self, now: i64) -> bool {
        match self.expires_at {
            Some(expires) => now <= expires,
            None => true,
        }
    }
}

/// A request by a non-owner to view a specific record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessRequest {
    pub id: RequestId,

    /// The requesting principal.
    pub address: Principal,

    /// Target record. May dangle after the record is deleted.
    pub record_id: RecordId,

    pub status: AccessStatus,

    /// Unix ms.
    pub created_at: i64,

    /// Unix ms of the last status change.
    pub updated_at: i64,

    /// Limits attached when the request was granted.
    pub conditions: Option<Conditions>,
}

impl AccessRequest {
    /// A new `pending` request with a generated id.
    pub fn pending(address: Principal, record_id: RecordId, now: i64) -> Self {
        Self {
            id: RequestId::generate(),
            address,
            record_id,
            status: AccessStatus::Pending,
            created_at: now,
            updated_at: now,
            conditions: None,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == AccessStatus::Pending
    }

    /// Granted and not expired at `now`.
    pub fn is_active(&self, now: i64) -> bool {
        self.status == AccessStatus::Granted
            && self.conditions.map_or(true, |c| c.is_valid(now))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_wire_names() {
        for status in AccessStatus::ALL {
            assert_eq!(AccessStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(AccessStatus::parse("approved"), None);
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(!AccessStatus::Pending.is_terminal());
        assert!(!AccessStatus::Granted.is_terminal());
        assert!(AccessStatus::Revoked.is_terminal());
        assert!(AccessStatus::Rejected.is_terminal());
    }

    #[test]
    fn test_conditions_expiration() {
        let cond = Conditions::expires_at(1000);
        assert!(cond.is_valid(500));
        assert!(cond.is_valid(1000));
        assert!(!cond.is_valid(1001));
        assert!(Conditions::permanent().is_valid(i64::MAX));
    }

    #[test]
    fn test_active_requires_granted_and_unexpired() {
        let mut req = AccessRequest::pending(
            Principal::new("0xb0b").unwrap(),
            RecordId::generate(),
            0,
        );
        assert!(!req.is_active(0));

        req.status = AccessStatus::Granted;
        assert!(req.is_active(0));

        req.conditions = Some(Conditions::expires_at(10));
        assert!(req.is_active(10));
        assert!(!req.is_active(11));

        req.status = AccessStatus::Revoked;
        req.conditions = None;
        assert!(!req.is_active(0));
    }
}
