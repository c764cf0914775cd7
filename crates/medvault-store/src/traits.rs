//! Store trait: the abstract interface for MedVault state persistence.
//!
//! This trait keeps the vault storage-agnostic. Implementations include
//! SQLite (durable) and in-memory (tests and the reference behavior).

use async_trait::async_trait;
use medvault_core::{
    AccessRequest, ActivityEntry, Principal, Record, RecordId, RequestId, VaccinationEntry,
    UNKNOWN_RECORD,
};

use crate::error::Result;

/// Result of inserting a row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertResult {
    /// Row was inserted.
    Inserted,
    /// A row with the same id already exists (idempotent, not an error).
    AlreadyExists,
}

/// The Store trait: async interface for state persistence.
///
/// All methods are async to support both blocking (SQLite) and async
/// backends. For SQLite, `spawn_blocking` keeps the runtime responsive.
///
/// # Design Notes
///
/// - The store performs no authorization. Ownership is checked by callers
///   before any mutation reaches it.
/// - Deleting a record never cascades to access requests; dangling
///   references are expected and resolve to "Unknown Record".
/// - Listings are newest first.
#[async_trait]
pub trait Store: Send + Sync {
    // ─────────────────────────────────────────────────────────────────────────
    // Record Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Insert a record.
    async fn insert_record(&self, record: &Record) -> Result<InsertResult>;

    /// Get a record by id.
    async fn get_record(&self, id: &RecordId) -> Result<Option<Record>>;

    /// Remove a record. Returns whether a row was removed.
    async fn delete_record(&self, id: &RecordId) -> Result<bool>;

    /// All records, newest upload first.
    async fn list_records(&self) -> Result<Vec<Record>>;

    /// Records owned by `owner`, newest upload first.
    async fn records_by_owner(&self, owner: &Principal) -> Result<Vec<Record>>;

    // ─────────────────────────────────────────────────────────────────────────
    // Access Request Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Insert an access request.
    async fn insert_request(&self, request: &AccessRequest) -> Result<InsertResult>;

    /// Get an access request by id.
    async fn get_request(&self, id: &RequestId) -> Result<Option<AccessRequest>>;

    /// Overwrite an existing access request.
    ///
    /// Fails with `NotFound` if no row has the request's id.
    async fn update_request(&self, request: &AccessRequest) -> Result<()>;

    /// All access requests, newest first.
    async fn list_requests(&self) -> Result<Vec<AccessRequest>>;

    /// Access requests targeting `record_id`, newest first.
    async fn requests_for_record(&self, record_id: &RecordId) -> Result<Vec<AccessRequest>>;

    /// Access requests made by `address`, newest first.
    async fn requests_by_address(&self, address: &Principal) -> Result<Vec<AccessRequest>>;

    // ─────────────────────────────────────────────────────────────────────────
    // Verification Ledger Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Get the persisted ledger rows for `principal`.
    async fn get_ledger(&self, principal: &Principal) -> Result<Option<Vec<VaccinationEntry>>>;

    /// Replace the ledger rows for `principal`.
    async fn put_ledger(&self, principal: &Principal, entries: &[VaccinationEntry]) -> Result<()>;

    // ─────────────────────────────────────────────────────────────────────────
    // Activity Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Prepend an activity entry, keeping at most `capacity` entries.
    async fn append_activity(&self, entry: &ActivityEntry, capacity: usize) -> Result<()>;

    /// The newest `limit` activity entries, newest first.
    async fn recent_activity(&self, limit: usize) -> Result<Vec<ActivityEntry>>;
}

/// Extension trait for common read patterns.
pub trait StoreExt: Store {
    /// Name of a record, or "Unknown Record" if it no longer exists.
    fn record_name(
        &self,
        id: &RecordId,
    ) -> impl std::future::Future<Output = Result<String>> + Send;
}

impl<S: Store + ?Sized> StoreExt for S {
    async fn record_name(&self, id: &RecordId) -> Result<String> {
        Ok(self
            .get_record(id)
            .await?
            .map(|r| r.name)
            .unwrap_or_else(|| UNKNOWN_RECORD.to_string()))
    }
}
