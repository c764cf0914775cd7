//! The access control engine.
//!
//! The engine is pure: callers load a consistent snapshot of the record and
//! its requests, ask the engine for a decision, and persist the returned
//! rows. Every ownership check and every status change happens here.

use serde::{Deserialize, Serialize};

use medvault_core::{
    AccessRequest, AccessStatus, Conditions, Principal, Record, RecordId, ValidationError,
};

use crate::error::{PermsError, Result};
use crate::grant::AccessDuration;
use crate::transition::check_transition;

/// What to do when a principal asks again while a request is still pending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DuplicatePolicy {
    /// Create another pending row.
    Allow,
    /// Return the existing pending row.
    #[default]
    Deduplicate,
    /// Fail with `DuplicatePending`.
    Reject,
}

/// Why a request-access call did nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    UnknownRecord,
    OwnRecord,
}

/// Result of a request-access call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestOutcome {
    /// A new pending request that the caller must persist.
    Created(AccessRequest),
    /// An equivalent pending request already exists.
    Existing(AccessRequest),
    /// Silent no-op.
    Ignored(IgnoreReason),
}

impl RequestOutcome {
    /// The request row, if any.
    pub fn request(&self) -> Option<&AccessRequest> {
        match self {
            RequestOutcome::Created(r) | RequestOutcome::Existing(r) => Some(r),
            RequestOutcome::Ignored(_) => None,
        }
    }

    pub fn is_created(&self) -> bool {
        matches!(self, RequestOutcome::Created(_))
    }
}

/// A request joined with the name of its target record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestView {
    pub request: AccessRequest,
    /// Record name, or `"Unknown Record"` if the record is gone.
    pub record_name: String,
}

impl RequestView {
    fn resolve(request: &AccessRequest, records: &[Record]) -> Self {
        let record = records.iter().find(|r| r.id == request.record_id);
        Self {
            request: request.clone(),
            record_name: Record::display_name(record).to_string(),
        }
    }
}

/// Stateless access control decisions.
#[derive(Debug, Clone, Copy, Default)]
pub struct AccessEngine {
    duplicates: DuplicatePolicy,
}

impl AccessEngine {
    pub fn new(duplicates: DuplicatePolicy) -> Self {
        Self { duplicates }
    }

    pub fn duplicate_policy(&self) -> DuplicatePolicy {
        self.duplicates
    }

    /// Decide what a request-access call does.
    ///
    /// `existing` holds the requests already stored for the record. Unknown
    /// records and self-requests are ignored, never errors.
    pub fn request_access(
        &self,
        principal: &Principal,
        record: Option<&Record>,
        existing: &[AccessRequest],
        now: i64,
    ) -> Result<RequestOutcome> {
        let Some(record) = record else {
            return Ok(RequestOutcome::Ignored(IgnoreReason::UnknownRecord));
        };
        if record.is_owned_by(principal) {
            return Ok(RequestOutcome::Ignored(IgnoreReason::OwnRecord));
        }

        let pending = existing
            .iter()
            .find(|r| r.is_pending() && r.record_id == record.id && &r.address == principal);

        match (self.duplicates, pending) {
            (DuplicatePolicy::Deduplicate, Some(req)) => Ok(RequestOutcome::Existing(req.clone())),
            (DuplicatePolicy::Reject, Some(req)) => Err(PermsError::DuplicatePending(req.id)),
            _ => Ok(RequestOutcome::Created(AccessRequest::pending(
                principal.clone(),
                record.id,
                now,
            ))),
        }
    }

    /// Require `actor` to own `record`.
    pub fn authorize_owner(
        &self,
        actor: &Principal,
        record: Option<&Record>,
        record_id: &RecordId,
    ) -> Result<()> {
        let record = record.ok_or(PermsError::RecordNotFound(*record_id))?;
        if !record.is_owned_by(actor) {
            return Err(PermsError::PermissionDenied(format!(
                "{} does not own record {}",
                actor.short(),
                record.id
            )));
        }
        Ok(())
    }

    /// The single entry point for status changes.
    ///
    /// Checks that `actor` owns the target record, then that the move is in
    /// the transition table. Granting attaches `conditions` (permanent if
    /// none). Returns the updated row for the caller to persist.
    pub fn transition(
        &self,
        actor: &Principal,
        record: Option<&Record>,
        request: &AccessRequest,
        desired: AccessStatus,
        conditions: Option<Conditions>,
        now: i64,
    ) -> Result<AccessRequest> {
        self.authorize_owner(actor, record, &request.record_id)?;
        check_transition(request.status, desired)?;

        let mut updated = request.clone();
        updated.status = desired;
        updated.updated_at = now;
        if desired == AccessStatus::Granted {
            updated.conditions = Some(conditions.unwrap_or_default());
        }
        Ok(updated)
    }

    /// Grant a recipient access without a prior request.
    ///
    /// Builds a pending row and moves it to `granted` through
    /// [`transition`](Self::transition).
    pub fn manual_grant(
        &self,
        actor: &Principal,
        record: Option<&Record>,
        record_id: &RecordId,
        recipient: &str,
        duration: AccessDuration,
        now: i64,
    ) -> Result<AccessRequest> {
        let recipient = recipient.trim();
        if recipient.is_empty() {
            return Err(ValidationError::Empty { field: "recipient" }.into());
        }
        let recipient = Principal::new(recipient)?;

        self.authorize_owner(actor, record, record_id)?;
        if &recipient == actor {
            return Err(PermsError::OwnRecord);
        }

        let request = AccessRequest::pending(recipient, *record_id, now);
        self.transition(
            actor,
            record,
            &request,
            AccessStatus::Granted,
            Some(duration.conditions(now)),
            now,
        )
    }

    /// Whether `principal` may read `record` at `now`.
    ///
    /// Owners always can; others need an unexpired `granted` request.
    pub fn can_read(
        &self,
        principal: &Principal,
        record: &Record,
        requests: &[AccessRequest],
        now: i64,
    ) -> bool {
        record.is_owned_by(principal)
            || requests.iter().any(|r| {
                r.record_id == record.id && &r.address == principal && r.is_active(now)
            })
    }

    /// [`can_read`](Self::can_read) as a `Result`.
    pub fn authorize_read(
        &self,
        principal: &Principal,
        record: &Record,
        requests: &[AccessRequest],
        now: i64,
    ) -> Result<()> {
        if self.can_read(principal, record, requests, now) {
            Ok(())
        } else {
            Err(PermsError::PermissionDenied(format!(
                "{} has no active grant for record {}",
                principal.short(),
                record.id
            )))
        }
    }

    /// Pending requests targeting records owned by `owner`, newest first.
    pub fn pending_inbox(
        &self,
        owner: &Principal,
        records: &[Record],
        requests: &[AccessRequest],
    ) -> Vec<RequestView> {
        owned_views(owner, records, requests, |r| r.is_pending())
    }

    /// Unexpired grants on records owned by `owner`, newest first.
    pub fn active_grants(
        &self,
        owner: &Principal,
        records: &[Record],
        requests: &[AccessRequest],
        now: i64,
    ) -> Vec<RequestView> {
        owned_views(owner, records, requests, |r| r.is_active(now))
    }

    /// Requests made by `principal`, with record names resolved.
    pub fn outgoing(
        &self,
        principal: &Principal,
        records: &[Record],
        requests: &[AccessRequest],
    ) -> Vec<RequestView> {
        let mut views: Vec<_> = requests
            .iter()
            .filter(|r| &r.address == principal)
            .map(|r| RequestView::resolve(r, records))
            .collect();
        sort_newest_first(&mut views);
        views
    }
}

fn owned_views(
    owner: &Principal,
    records: &[Record],
    requests: &[AccessRequest],
    keep: impl Fn(&AccessRequest) -> bool,
) -> Vec<RequestView> {
    let mut views: Vec<_> = requests
        .iter()
        .filter(|r| keep(r))
        .filter(|r| {
            records
                .iter()
                .any(|rec| rec.id == r.record_id && rec.is_owned_by(owner))
        })
        .map(|r| RequestView::resolve(r, records))
        .collect();
    sort_newest_first(&mut views);
    views
}

fn sort_newest_first(views: &mut [RequestView]) {
    views.sort_by(|a, b| b.request.created_at.cmp(&a.request.created_at));
}
